use crate::types::enums::{ReviewStatus, VersionAuthor};
use crate::types::ids::{CommentId, ReviewId};
use crate::types::review::CommentQuestion;
use chrono::{DateTime, Utc};
use pr_events::EventRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Version metadata carried by `version_updated` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub digest: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: VersionAuthor,
}

/// A comment that flipped from unresolved to resolved in one transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComment {
    pub comment_id: CommentId,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub comment_id: CommentId,
    pub question: CommentQuestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub status: ReviewStatus,
    pub previous_status: ReviewStatus,
    /// Present iff the new status is `approved`, so the waiting submitter
    /// can relay the final text without another fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpdated {
    pub version: VersionInfo,
    pub content: String,
    /// Exactly the comments this revision moved from unresolved to resolved.
    pub resolved_comments: Vec<ResolvedComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsUpdated {
    pub questions: Vec<QuestionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub timestamp: i64,
}

/// Typed payloads for the event stream. Serializes to the bare payload
/// object; the event name travels separately in the stream frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    StatusChanged(StatusChanged),
    VersionUpdated(VersionUpdated),
    QuestionsUpdated(QuestionsUpdated),
    Heartbeat(Heartbeat),
}

impl EventBody {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "status_changed",
            Self::VersionUpdated(_) => "version_updated",
            Self::QuestionsUpdated(_) => "questions_updated",
            Self::Heartbeat(_) => "heartbeat",
        }
    }

    pub fn into_record(self, review_id: &ReviewId) -> EventRecord {
        let event = self.event_type().to_string();
        let data = serde_json::to_value(&self).unwrap_or(Value::Null);
        EventRecord {
            review_id: review_id.to_string(),
            event,
            at: Utc::now(),
            data,
        }
    }

    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self::Heartbeat(Heartbeat {
            timestamp: now.timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_changed_payload_shape() {
        let body = EventBody::StatusChanged(StatusChanged {
            status: ReviewStatus::Approved,
            previous_status: ReviewStatus::Open,
            plan_content: Some("# Step 1\nDo X".to_string()),
        });
        assert_eq!(body.event_type(), "status_changed");
        let record = body.into_record(&ReviewId::generate());
        assert_eq!(record.event, "status_changed");
        assert_eq!(record.data["previousStatus"], "open");
        assert_eq!(record.data["status"], "approved");
        assert_eq!(record.data["planContent"], "# Step 1\nDo X");
    }

    #[test]
    fn plan_content_absent_unless_approved() {
        let body = EventBody::StatusChanged(StatusChanged {
            status: ReviewStatus::ChangesRequested,
            previous_status: ReviewStatus::Open,
            plan_content: None,
        });
        let record = body.into_record(&ReviewId::generate());
        assert!(record.data.get("planContent").is_none());
    }
}
