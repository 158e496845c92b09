use crate::types::enums::{PositionStatus, QuestionType, ReviewStatus, VersionAuthor};
use crate::types::ids::{CommentId, ReviewId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Character range into the document version a comment was attached to.
/// Offsets count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextPosition {
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Immutable snapshot of the plan at one point in its history.
/// `version_hash` is the SHA-256 hex digest of `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub version_hash: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
    pub author: VersionAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
}

/// Version metadata without the (potentially large) content body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub version_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
    pub author: VersionAuthor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
}

impl From<&DocumentVersion> for VersionSummary {
    fn from(version: &DocumentVersion) -> Self {
        Self {
            version_hash: version.version_hash.clone(),
            created_at: version.created_at,
            change_description: version.change_description.clone(),
            author: version.author,
            parent_hash: version.parent_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuestion {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub created_at: DateTime<Utc>,
    /// The text span as it read when the comment was made. Display only.
    pub quote: String,
    pub comment: String,
    pub position: TextPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_position: Option<TextPosition>,
    /// Digest of the version the comment was attached to.
    pub document_version: String,
    #[serde(default)]
    pub position_status: PositionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<CommentQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_in_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Comment {
    /// True when the comment carries a question that still awaits a human
    /// answer. `accepted` questions never wait.
    pub fn has_pending_question(&self) -> bool {
        match &self.question {
            Some(question) => {
                question.question_type != QuestionType::Accepted && self.answer.is_none()
            }
            None => false,
        }
    }
}

/// The review aggregate. Versions and comments keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub status: ReviewStatus,
    /// Materialized content of `current_version`.
    pub plan_content: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub document_versions: Vec<DocumentVersion>,
    pub current_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_directly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_note: Option<String>,
}

impl Review {
    pub fn version(&self, hash: &str) -> Option<&DocumentVersion> {
        self.document_versions
            .iter()
            .find(|version| version.version_hash == hash)
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == id)
    }

    pub fn comment_mut(&mut self, id: &CommentId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|comment| &comment.id == id)
    }

    pub fn unresolved_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|comment| !comment.resolved)
    }

    pub fn has_unresolved_comments(&self) -> bool {
        self.unresolved_comments().next().is_some()
    }

    /// True while some question posted by the agent still lacks an answer.
    pub fn has_pending_questions(&self) -> bool {
        self.comments.iter().any(Comment::has_pending_question)
    }

    pub fn summary(&self, modified_at: DateTime<Utc>) -> ReviewSummary {
        ReviewSummary {
            id: self.id.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: modified_at,
            comment_count: self.comments.len(),
            unresolved_count: self.unresolved_comments().count(),
            version_count: self.document_versions.len(),
            project_path: self.project_path.clone(),
        }
    }
}

/// Listing shape used by the pending-review resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub id: ReviewId,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comment_count: usize,
    pub unresolved_count: usize,
    pub version_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}
