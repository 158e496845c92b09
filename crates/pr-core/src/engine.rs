use crate::digest::{content_digest, short_digest};
use crate::diff::{diff_lines, DiffResult};
use crate::error::ReviewError;
use crate::store::ReviewStore;
use crate::types::enums::{PositionStatus, QuestionType, ReviewStatus, VersionAuthor};
use crate::types::event::{
    EventBody, QuestionEntry, QuestionsUpdated, ResolvedComment, StatusChanged, VersionInfo,
    VersionUpdated,
};
use crate::types::ids::{CommentId, ReviewId};
use crate::types::io::{
    AnswerInput, ApproveInput, CreateCommentInput, CreateReviewInput, QuestionInput,
    RollbackInput, UpdateCommentInput, UpdatePlanInput,
};
use crate::types::review::{
    Comment, CommentQuestion, DocumentVersion, Review, ReviewSummary, VersionSummary,
};
use crate::validation;
use chrono::Utc;
use pr_events::ReviewBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Resolution recorded on comments swept up by an agent revision, unless the
/// caller supplied an override.
pub const DEFAULT_REVISION_RESOLUTION: &str = "已在修订版本中处理";

const ACCEPTED_RESOLUTION: &str = "Accepted";

/// Result of applying `ask_questions`: the updated review plus how many of
/// the posted questions still await a human answer.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub review: Review,
    pub pending_questions: usize,
}

struct Mutation<T> {
    value: T,
    events: Vec<EventBody>,
    dirty: bool,
}

/// The authoritative state machine and sole mutator of reviews.
///
/// Every mutation runs under the review's lock: load from the store,
/// validate the transition, mutate in memory, write back, then publish.
/// Events are published only after the save succeeds, so subscribers never
/// observe an effect that is not yet durable.
pub struct Engine<S: ReviewStore> {
    store: S,
    bus: ReviewBus,
    locks: Mutex<HashMap<ReviewId, Arc<Mutex<()>>>>,
}

impl<S: ReviewStore> Engine<S> {
    pub fn new(store: S, bus: ReviewBus) -> Self {
        Self {
            store,
            bus,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &ReviewBus {
        &self.bus
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create(&self, input: CreateReviewInput) -> Result<Review, ReviewError> {
        let now = Utc::now();
        let digest = content_digest(&input.plan);
        let review = Review {
            id: ReviewId::generate(),
            created_at: now,
            project_path: input.project_path.filter(|path| !path.trim().is_empty()),
            status: ReviewStatus::Open,
            plan_content: input.plan.clone(),
            comments: Vec::new(),
            document_versions: vec![DocumentVersion {
                version_hash: digest.clone(),
                content: input.plan,
                created_at: now,
                change_description: None,
                author: VersionAuthor::Agent,
                parent_hash: None,
            }],
            current_version: digest,
            approved_directly: None,
            approval_note: None,
        };
        self.store.save(&review)?;
        tracing::info!(review_id = %review.id, "review created");
        Ok(review)
    }

    pub fn get(&self, id: &ReviewId, project_path: Option<&str>) -> Result<Review, ReviewError> {
        self.store
            .load(id, project_path)?
            .ok_or(ReviewError::ReviewNotFound)
    }

    pub fn latest(&self, project_path: Option<&str>) -> Result<Option<Review>, ReviewError> {
        Ok(self.store.latest(project_path)?.map(|stored| stored.review))
    }

    pub fn list_pending(&self, project_path: &str) -> Result<Vec<ReviewSummary>, ReviewError> {
        Ok(self
            .store
            .list_pending(project_path)?
            .iter()
            .map(|stored| stored.review.summary(stored.modified_at))
            .collect())
    }

    /// The freshest pending review for a project, in full.
    pub fn current_pending(&self, project_path: &str) -> Result<Option<Review>, ReviewError> {
        Ok(self
            .store
            .list_pending(project_path)?
            .into_iter()
            .next()
            .map(|stored| stored.review))
    }

    pub fn add_comment(
        &self,
        id: &ReviewId,
        input: CreateCommentInput,
    ) -> Result<Comment, ReviewError> {
        self.with_review(id, |review| {
            ensure_human_editable(review)?;
            validation::validate_position(&input.position, &review.plan_content)?;
            let comment = Comment {
                id: CommentId::generate(),
                created_at: Utc::now(),
                quote: input.quote,
                comment: input.comment,
                position: input.position,
                original_position: None,
                document_version: review.current_version.clone(),
                position_status: PositionStatus::Valid,
                question: None,
                answer: None,
                resolved: false,
                resolved_at: None,
                resolved_in_version: None,
                resolution: None,
            };
            review.comments.push(comment.clone());
            Ok(Mutation {
                value: comment,
                events: Vec::new(),
                dirty: true,
            })
        })
    }

    pub fn update_comment(
        &self,
        id: &ReviewId,
        comment_id: &CommentId,
        input: UpdateCommentInput,
    ) -> Result<Comment, ReviewError> {
        self.with_review(id, |review| {
            ensure_human_editable(review)?;
            let comment = review
                .comment_mut(comment_id)
                .ok_or(ReviewError::CommentNotFound)?;
            comment.comment = input.comment;
            Ok(Mutation {
                value: comment.clone(),
                events: Vec::new(),
                dirty: true,
            })
        })
    }

    pub fn delete_comment(&self, id: &ReviewId, comment_id: &CommentId) -> Result<(), ReviewError> {
        self.with_review(id, |review| {
            ensure_human_editable(review)?;
            let index = review
                .comments
                .iter()
                .position(|comment| &comment.id == comment_id)
                .ok_or(ReviewError::CommentNotFound)?;
            review.comments.remove(index);
            Ok(Mutation {
                value: (),
                events: Vec::new(),
                dirty: true,
            })
        })
    }

    /// Human submits feedback: requires at least one unresolved comment.
    pub fn request_changes(&self, id: &ReviewId) -> Result<Review, ReviewError> {
        self.with_review(id, |review| {
            validation::validate_status_transition(review.status, ReviewStatus::ChangesRequested)?;
            if !review.has_unresolved_comments() {
                return Err(ReviewError::invalid_input(
                    "at least one unresolved comment is required to request changes",
                ));
            }
            let previous = review.status;
            review.status = ReviewStatus::ChangesRequested;
            Ok(Mutation {
                value: review.clone(),
                events: vec![EventBody::StatusChanged(StatusChanged {
                    status: review.status,
                    previous_status: previous,
                    plan_content: None,
                })],
                dirty: true,
            })
        })
    }

    /// Approval succeeds from every non-terminal state and carries the final
    /// plan text in the emitted event.
    pub fn approve(&self, id: &ReviewId, input: ApproveInput) -> Result<Review, ReviewError> {
        self.with_review(id, |review| {
            if review.status.is_terminal() {
                return Err(ReviewError::InvalidTransition {
                    from: review.status,
                    to: ReviewStatus::Approved,
                });
            }
            let previous = review.status;
            review.status = ReviewStatus::Approved;
            if previous == ReviewStatus::Open {
                review.approved_directly = Some(true);
            }
            review.approval_note = input.note.filter(|note| !note.trim().is_empty());
            Ok(Mutation {
                value: review.clone(),
                events: vec![EventBody::StatusChanged(StatusChanged {
                    status: ReviewStatus::Approved,
                    previous_status: previous,
                    plan_content: Some(review.plan_content.clone()),
                })],
                dirty: true,
            })
        })
    }

    /// Append a new document version. Identical content is a no-op that
    /// emits nothing. Agent-authored versions auto-resolve every still-open
    /// comment and move the review to `updated`.
    pub fn update_plan(&self, id: &ReviewId, input: UpdatePlanInput) -> Result<Review, ReviewError> {
        self.with_review(id, |review| {
            let (events, dirty) = apply_plan_update(review, input)?;
            Ok(Mutation {
                value: review.clone(),
                events,
                dirty,
            })
        })
    }

    /// Rollback appends a new version with the target's content; history is
    /// never rewritten. Rolling back to the current version is a no-op.
    pub fn rollback(&self, id: &ReviewId, input: RollbackInput) -> Result<Review, ReviewError> {
        self.with_review(id, |review| {
            let content = review
                .version(&input.version_hash)
                .ok_or(ReviewError::VersionNotFound)?
                .content
                .clone();
            let update = UpdatePlanInput {
                content,
                author: VersionAuthor::Human,
                change_description: Some(format!(
                    "Rollback to {}",
                    short_digest(&input.version_hash)
                )),
                resolved_comments: None,
            };
            let (events, dirty) = apply_plan_update(review, update)?;
            Ok(Mutation {
                value: review.clone(),
                events,
                dirty,
            })
        })
    }

    /// Agent posts questions. Every unresolved comment must be covered;
    /// `accepted` questions resolve their comment on the spot. When at least
    /// one question awaits an answer the review moves to `discussing`.
    pub fn ask_questions(
        &self,
        id: &ReviewId,
        questions: Vec<QuestionInput>,
    ) -> Result<AskOutcome, ReviewError> {
        self.with_review(id, |review| {
            if review.status != ReviewStatus::ChangesRequested {
                return Err(ReviewError::InvalidTransition {
                    from: review.status,
                    to: ReviewStatus::Discussing,
                });
            }
            validation::validate_questions(review, &questions)?;

            let now = Utc::now();
            let mut entries = Vec::new();
            let mut pending = 0usize;
            for input in questions {
                let question = CommentQuestion {
                    question_type: input.question_type,
                    message: input.message,
                    options: input.options,
                };
                let comment = review
                    .comment_mut(&input.comment_id)
                    .ok_or(ReviewError::CommentNotFound)?;
                comment.question = Some(question.clone());
                comment.answer = None;
                if question.question_type == QuestionType::Accepted {
                    if !comment.resolved {
                        comment.resolved = true;
                        comment.resolved_at = Some(now);
                        comment.resolution = Some(if question.message.trim().is_empty() {
                            ACCEPTED_RESOLUTION.to_string()
                        } else {
                            question.message.clone()
                        });
                    }
                } else {
                    pending += 1;
                }
                entries.push(QuestionEntry {
                    comment_id: input.comment_id,
                    question,
                });
            }

            let mut events = vec![EventBody::QuestionsUpdated(QuestionsUpdated {
                questions: entries,
            })];
            if pending > 0 {
                let previous = review.status;
                review.status = ReviewStatus::Discussing;
                events.push(EventBody::StatusChanged(StatusChanged {
                    status: ReviewStatus::Discussing,
                    previous_status: previous,
                    plan_content: None,
                }));
            }
            Ok(Mutation {
                value: AskOutcome {
                    review: review.clone(),
                    pending_questions: pending,
                },
                events,
                dirty: true,
            })
        })
    }

    /// Human answers one question. Once no question is left waiting, the
    /// review returns to `changes_requested`, which wakes any agent call
    /// suspended on the discussion.
    pub fn answer(
        &self,
        id: &ReviewId,
        comment_id: &CommentId,
        input: AnswerInput,
    ) -> Result<Review, ReviewError> {
        self.with_review(id, |review| {
            if review.status != ReviewStatus::Discussing {
                return Err(ReviewError::invalid_input(
                    "answers are only accepted while the review is in discussion",
                ));
            }
            let comment = review
                .comment_mut(comment_id)
                .ok_or(ReviewError::CommentNotFound)?;
            match &comment.question {
                Some(question) if question.question_type != QuestionType::Accepted => {}
                _ => {
                    return Err(ReviewError::invalid_input(
                        "comment has no question awaiting an answer",
                    ))
                }
            }
            comment.answer = Some(input.answer);

            let mut events = Vec::new();
            if !review.has_pending_questions() {
                let previous = review.status;
                review.status = ReviewStatus::ChangesRequested;
                events.push(EventBody::StatusChanged(StatusChanged {
                    status: review.status,
                    previous_status: previous,
                    plan_content: None,
                }));
            }
            Ok(Mutation {
                value: review.clone(),
                events,
                dirty: true,
            })
        })
    }

    pub fn versions(&self, id: &ReviewId) -> Result<Vec<VersionSummary>, ReviewError> {
        let review = self.get(id, None)?;
        Ok(review.document_versions.iter().map(Into::into).collect())
    }

    pub fn version(&self, id: &ReviewId, hash: &str) -> Result<DocumentVersion, ReviewError> {
        let review = self.get(id, None)?;
        review
            .version(hash)
            .cloned()
            .ok_or(ReviewError::VersionNotFound)
    }

    pub fn diff(&self, id: &ReviewId, from: &str, to: &str) -> Result<DiffResult, ReviewError> {
        let review = self.get(id, None)?;
        let from_version = review.version(from).ok_or(ReviewError::VersionNotFound)?;
        let to_version = review.version(to).ok_or(ReviewError::VersionNotFound)?;
        Ok(diff_lines(&from_version.content, &to_version.content))
    }

    fn with_review<T>(
        &self,
        id: &ReviewId,
        f: impl FnOnce(&mut Review) -> Result<Mutation<T>, ReviewError>,
    ) -> Result<T, ReviewError> {
        let lock = self.review_lock(id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut review = self
            .store
            .load(id, None)?
            .ok_or(ReviewError::ReviewNotFound)?;
        let Mutation {
            value,
            events,
            dirty,
        } = f(&mut review)?;
        if dirty {
            self.store.save(&review)?;
        }
        for body in events {
            self.bus.publish(body.into_record(id));
        }
        Ok(value)
    }

    fn review_lock(&self, id: &ReviewId) -> Arc<Mutex<()>> {
        let mut locks: MutexGuard<'_, _> =
            self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.clone()).or_default().clone()
    }
}

fn ensure_human_editable(review: &Review) -> Result<(), ReviewError> {
    if review.status.is_human_editable() {
        Ok(())
    } else {
        Err(ReviewError::invalid_input(
            "comments can only be modified while the review awaits human feedback",
        ))
    }
}

fn apply_plan_update(
    review: &mut Review,
    input: UpdatePlanInput,
) -> Result<(Vec<EventBody>, bool), ReviewError> {
    let new_digest = content_digest(&input.content);
    if new_digest == review.current_version {
        return Ok((Vec::new(), false));
    }
    if review.status.is_terminal() {
        return Err(ReviewError::InvalidTransition {
            from: review.status,
            to: ReviewStatus::Updated,
        });
    }
    if input.author == VersionAuthor::Agent {
        validation::validate_status_transition(review.status, ReviewStatus::Updated)?;
    }

    let now = Utc::now();
    let version = DocumentVersion {
        version_hash: new_digest.clone(),
        content: input.content.clone(),
        created_at: now,
        change_description: input.change_description,
        author: input.author,
        parent_hash: Some(review.current_version.clone()),
    };
    review.document_versions.push(version.clone());
    review.current_version = new_digest.clone();
    review.plan_content = input.content;

    let mut resolved = Vec::new();
    if input.author == VersionAuthor::Agent {
        let overrides = input.resolved_comments.unwrap_or_default();
        for comment in review.comments.iter_mut().filter(|comment| !comment.resolved) {
            let resolution = overrides
                .get(comment.id.as_str())
                .cloned()
                .unwrap_or_else(|| DEFAULT_REVISION_RESOLUTION.to_string());
            comment.resolved = true;
            comment.resolved_at = Some(now);
            comment.resolved_in_version = Some(new_digest.clone());
            comment.resolution = Some(resolution.clone());
            resolved.push(ResolvedComment {
                comment_id: comment.id.clone(),
                resolution,
            });
        }
    }

    let mut events = vec![EventBody::VersionUpdated(VersionUpdated {
        version: VersionInfo {
            digest: new_digest,
            created_at: now,
            description: version.change_description.clone(),
            author: version.author,
        },
        content: review.plan_content.clone(),
        resolved_comments: resolved,
    })];
    if input.author == VersionAuthor::Agent {
        let previous = review.status;
        review.status = ReviewStatus::Updated;
        events.push(EventBody::StatusChanged(StatusChanged {
            status: ReviewStatus::Updated,
            previous_status: previous,
            plan_content: None,
        }));
    }
    Ok((events, true))
}
