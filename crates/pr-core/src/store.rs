use crate::error::ReviewError;
use crate::types::ids::ReviewId;
use crate::types::review::Review;
use chrono::{DateTime, Utc};

/// A review record together with its last-modified time, which listings use
/// as the recency order.
#[derive(Debug, Clone)]
pub struct StoredReview {
    pub review: Review,
    pub modified_at: DateTime<Utc>,
}

/// Durable persistence of review records, one record per review, partitioned
/// by project path with a global fallback namespace for legacy records.
///
/// Implementations do not serialize access: the engine owns write ordering
/// through its per-review locks.
pub trait ReviewStore: Send + Sync {
    /// Atomic whole-record write, creating the target directory on demand.
    fn save(&self, review: &Review) -> Result<(), ReviewError>;

    /// Search order: explicit project directory, global directory, then a
    /// scan of all project directories. First hit wins.
    fn load(&self, id: &ReviewId, project_path: Option<&str>)
        -> Result<Option<Review>, ReviewError>;

    /// Records in one project directory with non-terminal status, most
    /// recently modified first.
    fn list_pending(&self, project_path: &str) -> Result<Vec<StoredReview>, ReviewError>;

    /// The single most recently modified record in scope, any status.
    fn latest(&self, project_path: Option<&str>) -> Result<Option<StoredReview>, ReviewError>;
}
