use crate::error::ReviewError;
use crate::types::enums::{QuestionType, ReviewStatus};
use crate::types::io::QuestionInput;
use crate::types::review::{Review, TextPosition};
use std::collections::HashSet;

/// The review state machine. Any pair outside this table is rejected;
/// re-entering the current state is not a transition.
pub fn validate_status_transition(
    from: ReviewStatus,
    to: ReviewStatus,
) -> Result<(), ReviewError> {
    use ReviewStatus::{Approved, ChangesRequested, Discussing, Open, Updated};

    let valid = match (from, to) {
        (Open, Approved) => true,
        (Open, ChangesRequested) => true,
        (ChangesRequested, Approved) => true,
        (ChangesRequested, Discussing) => true,
        (ChangesRequested, Updated) => true,
        (Discussing, ChangesRequested) => true,
        (Discussing, Approved) => true,
        (Discussing, Updated) => true,
        (Updated, Approved) => true,
        (Updated, ChangesRequested) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ReviewError::InvalidTransition { from, to })
    }
}

/// Offsets are character indices into `content`; the end is exclusive and may
/// sit one past the last character.
pub fn validate_position(position: &TextPosition, content: &str) -> Result<(), ReviewError> {
    if position.start_offset > position.end_offset {
        return Err(ReviewError::invalid_input(
            "startOffset must not exceed endOffset",
        ));
    }
    let char_count = content.chars().count();
    if position.end_offset > char_count {
        return Err(ReviewError::invalid_input(format!(
            "endOffset {} is out of range for a document of {} characters",
            position.end_offset, char_count
        )));
    }
    Ok(())
}

/// `ask_questions` preconditions: every unresolved comment must be covered,
/// every referenced comment must exist, and choice-style questions need
/// options to choose from.
pub fn validate_questions(review: &Review, questions: &[QuestionInput]) -> Result<(), ReviewError> {
    let mut covered: HashSet<&str> = HashSet::new();
    for question in questions {
        let comment = review
            .comment(&question.comment_id)
            .ok_or(ReviewError::CommentNotFound)?;
        if comment.resolved && question.question_type != QuestionType::Accepted {
            return Err(ReviewError::invalid_input(format!(
                "comment {} is already resolved",
                comment.id
            )));
        }
        if question.question_type.requires_options()
            && question
                .options
                .as_ref()
                .map(|options| options.is_empty())
                .unwrap_or(true)
        {
            return Err(ReviewError::invalid_input(format!(
                "question for comment {} requires options",
                question.comment_id
            )));
        }
        covered.insert(question.comment_id.as_str());
    }

    for comment in review.unresolved_comments() {
        if !covered.contains(comment.id.as_str()) {
            return Err(ReviewError::invalid_input(format!(
                "unresolved comment {} is not covered by any question",
                comment.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [ReviewStatus; 5] = [
        ReviewStatus::Open,
        ReviewStatus::ChangesRequested,
        ReviewStatus::Discussing,
        ReviewStatus::Updated,
        ReviewStatus::Approved,
    ];

    #[test]
    fn edge_set_is_exact() {
        let allowed = [
            (ReviewStatus::Open, ReviewStatus::Approved),
            (ReviewStatus::Open, ReviewStatus::ChangesRequested),
            (ReviewStatus::ChangesRequested, ReviewStatus::Approved),
            (ReviewStatus::ChangesRequested, ReviewStatus::Discussing),
            (ReviewStatus::ChangesRequested, ReviewStatus::Updated),
            (ReviewStatus::Discussing, ReviewStatus::ChangesRequested),
            (ReviewStatus::Discussing, ReviewStatus::Approved),
            (ReviewStatus::Discussing, ReviewStatus::Updated),
            (ReviewStatus::Updated, ReviewStatus::Approved),
            (ReviewStatus::Updated, ReviewStatus::ChangesRequested),
        ];
        for from in STATES {
            for to in STATES {
                let result = validate_status_transition(from, to);
                if allowed.contains(&(from, to)) {
                    assert!(result.is_ok(), "{from:?} -> {to:?} should be allowed");
                } else {
                    assert!(
                        matches!(result, Err(ReviewError::InvalidTransition { .. })),
                        "{from:?} -> {to:?} should be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn nothing_leaves_approved() {
        for to in STATES {
            assert!(validate_status_transition(ReviewStatus::Approved, to).is_err());
        }
    }

    #[test]
    fn position_bounds() {
        let content = "line one";
        assert!(validate_position(
            &TextPosition {
                start_offset: 0,
                end_offset: 8
            },
            content
        )
        .is_ok());
        assert!(validate_position(
            &TextPosition {
                start_offset: 0,
                end_offset: 9
            },
            content
        )
        .is_err());
        assert!(validate_position(
            &TextPosition {
                start_offset: 5,
                end_offset: 2
            },
            content
        )
        .is_err());
    }

    #[test]
    fn position_counts_characters_not_bytes() {
        // Four characters, twelve bytes.
        let content = "计划文档";
        assert!(validate_position(
            &TextPosition {
                start_offset: 0,
                end_offset: 4
            },
            content
        )
        .is_ok());
        assert!(validate_position(
            &TextPosition {
                start_offset: 0,
                end_offset: 5
            },
            content
        )
        .is_err());
    }
}
