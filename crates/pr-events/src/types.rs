use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One published event, addressed to a single review's subscribers.
///
/// `event` is the wire-level event name (`status_changed`, `version_updated`,
/// `questions_updated`, `heartbeat`); `data` is the already-serialized payload
/// so the bus stays agnostic of the domain types that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub review_id: String,
    pub event: String,
    pub at: DateTime<Utc>,
    pub data: Value,
}

impl EventRecord {
    /// Millisecond timestamp used as the stream frame id.
    pub fn frame_id(&self) -> i64 {
        self.at.timestamp_millis()
    }
}
