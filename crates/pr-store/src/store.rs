use crate::paths::encode_project_path;
use chrono::{DateTime, Utc};
use pr_core::store::StoredReview;
use pr_core::types::{Review, ReviewId};
use pr_core::{ReviewError, ReviewStore};
use std::fs;
use std::path::{Path, PathBuf};

const PROJECTS_DIR: &str = "projects";

/// File-backed review store: one JSON record per review.
///
/// Layout: `<root>/<id>.json` for legacy un-partitioned records and
/// `<root>/projects/<encodedPath>/<id>.json` for project-scoped ones.
/// Writes go through a sibling tmp file and a rename, so a crashed write
/// never leaves a half-serialized record behind. Cross-process contention is
/// not handled; only one server instance runs per host.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_path: &str) -> PathBuf {
        self.root
            .join(PROJECTS_DIR)
            .join(encode_project_path(project_path))
    }

    fn record_path(dir: &Path, id: &ReviewId) -> PathBuf {
        dir.join(format!("{id}.json"))
    }

    fn read_record(path: &Path) -> Result<Review, ReviewError> {
        let bytes = fs::read(path)
            .map_err(|err| ReviewError::store(format!("read {}: {err}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| ReviewError::store(format!("decode {}: {err}", path.display())))
    }

    fn read_if_present(path: &Path) -> Result<Option<Review>, ReviewError> {
        if path.is_file() {
            Self::read_record(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// All records in one directory with their modification times. Entries
    /// that fail to parse are skipped so one corrupt file cannot take down
    /// every listing.
    fn scan_dir(dir: &Path) -> Result<Vec<StoredReview>, ReviewError> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(err) => {
                return Err(ReviewError::store(format!(
                    "read dir {}: {err}",
                    dir.display()
                )))
            }
        };
        for entry in entries {
            let entry = entry
                .map_err(|err| ReviewError::store(format!("read dir {}: {err}", dir.display())))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let review = match Self::read_record(&path) {
                Ok(review) => review,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable record");
                    continue;
                }
            };
            let modified_at = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| review.created_at);
            records.push(StoredReview {
                review,
                modified_at,
            });
        }
        Ok(records)
    }

    fn project_dirs(&self) -> Result<Vec<PathBuf>, ReviewError> {
        let projects = self.root.join(PROJECTS_DIR);
        let mut dirs = Vec::new();
        let entries = match fs::read_dir(&projects) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(err) => {
                return Err(ReviewError::store(format!(
                    "read dir {}: {err}",
                    projects.display()
                )))
            }
        };
        for entry in entries {
            let entry = entry.map_err(|err| {
                ReviewError::store(format!("read dir {}: {err}", projects.display()))
            })?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

impl ReviewStore for FileStore {
    fn save(&self, review: &Review) -> Result<(), ReviewError> {
        let dir = match review.project_path.as_deref() {
            Some(project_path) => self.project_dir(project_path),
            None => self.root.clone(),
        };
        fs::create_dir_all(&dir)
            .map_err(|err| ReviewError::store(format!("create {}: {err}", dir.display())))?;

        let json = serde_json::to_vec_pretty(review)
            .map_err(|err| ReviewError::store(format!("encode review: {err}")))?;
        let path = Self::record_path(&dir, &review.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|err| ReviewError::store(format!("write {}: {err}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|err| ReviewError::store(format!("rename {}: {err}", path.display())))?;
        Ok(())
    }

    fn load(
        &self,
        id: &ReviewId,
        project_path: Option<&str>,
    ) -> Result<Option<Review>, ReviewError> {
        if let Some(project_path) = project_path {
            let path = Self::record_path(&self.project_dir(project_path), id);
            if let Some(review) = Self::read_if_present(&path)? {
                return Ok(Some(review));
            }
        }
        let global = Self::record_path(&self.root, id);
        if let Some(review) = Self::read_if_present(&global)? {
            return Ok(Some(review));
        }
        for dir in self.project_dirs()? {
            let path = Self::record_path(&dir, id);
            if let Some(review) = Self::read_if_present(&path)? {
                return Ok(Some(review));
            }
        }
        Ok(None)
    }

    fn list_pending(&self, project_path: &str) -> Result<Vec<StoredReview>, ReviewError> {
        let mut records = Self::scan_dir(&self.project_dir(project_path))?;
        records.retain(|stored| !stored.review.status.is_terminal());
        records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(records)
    }

    fn latest(&self, project_path: Option<&str>) -> Result<Option<StoredReview>, ReviewError> {
        let mut records = match project_path {
            Some(project_path) => Self::scan_dir(&self.project_dir(project_path))?,
            None => {
                let mut all = Self::scan_dir(&self.root)?;
                for dir in self.project_dirs()? {
                    all.extend(Self::scan_dir(&dir)?);
                }
                all
            }
        };
        records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(records.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pr_core::digest::content_digest;
    use pr_core::types::enums::{ReviewStatus, VersionAuthor};
    use pr_core::types::review::DocumentVersion;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    fn sample_review(project_path: Option<&str>, plan: &str) -> Review {
        let digest = content_digest(plan);
        Review {
            id: ReviewId::generate(),
            created_at: Utc::now(),
            project_path: project_path.map(str::to_string),
            status: ReviewStatus::Open,
            plan_content: plan.to_string(),
            comments: Vec::new(),
            document_versions: vec![DocumentVersion {
                version_hash: digest.clone(),
                content: plan.to_string(),
                created_at: Utc::now(),
                change_description: None,
                author: VersionAuthor::Agent,
                parent_hash: None,
            }],
            current_version: digest,
            approved_directly: None,
            approval_note: None,
        }
    }

    #[test]
    fn save_and_load_partitioned() {
        let (_dir, store) = setup_store();
        let review = sample_review(Some("/home/dev/app"), "plan");
        store.save(&review).unwrap();

        let expected = store
            .root()
            .join("projects/home_dev_app")
            .join(format!("{}.json", review.id));
        assert!(expected.is_file());

        let loaded = store.load(&review.id, Some("/home/dev/app")).unwrap();
        assert_eq!(loaded, Some(review));
    }

    #[test]
    fn load_falls_back_to_global_then_scan() {
        let (_dir, store) = setup_store();
        let global = sample_review(None, "legacy plan");
        store.save(&global).unwrap();
        let scoped = sample_review(Some("/home/dev/app"), "scoped plan");
        store.save(&scoped).unwrap();

        // Global record found without any project hint.
        let loaded = store.load(&global.id, None).unwrap().unwrap();
        assert_eq!(loaded.plan_content, "legacy plan");

        // Wrong hint still finds the record through the full scan.
        let loaded = store.load(&scoped.id, Some("/other/project")).unwrap();
        assert_eq!(loaded.unwrap().plan_content, "scoped plan");
    }

    #[test]
    fn missing_review_is_none() {
        let (_dir, store) = setup_store();
        assert_eq!(store.load(&ReviewId::generate(), None).unwrap(), None);
    }

    #[test]
    fn save_overwrites_atomically() {
        let (_dir, store) = setup_store();
        let mut review = sample_review(Some("/home/dev/app"), "v1");
        store.save(&review).unwrap();
        review.plan_content = "v2".to_string();
        store.save(&review).unwrap();

        let loaded = store
            .load(&review.id, Some("/home/dev/app"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.plan_content, "v2");

        // No tmp leftovers.
        let dir = store.root().join("projects/home_dev_app");
        let leftovers: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn list_pending_filters_terminal_and_orders_by_recency() {
        let (_dir, store) = setup_store();
        let older = sample_review(Some("/home/dev/app"), "older");
        store.save(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut approved = sample_review(Some("/home/dev/app"), "approved");
        approved.status = ReviewStatus::Approved;
        store.save(&approved).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let newer = sample_review(Some("/home/dev/app"), "newer");
        store.save(&newer).unwrap();

        let pending = store.list_pending("/home/dev/app").unwrap();
        let ids: Vec<_> = pending
            .iter()
            .map(|stored| stored.review.id.clone())
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn latest_spans_all_namespaces_without_hint() {
        let (_dir, store) = setup_store();
        let global = sample_review(None, "global");
        store.save(&global).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut scoped = sample_review(Some("/home/dev/app"), "scoped");
        scoped.status = ReviewStatus::Approved;
        store.save(&scoped).unwrap();

        // Regardless of status, the most recently written record wins.
        let latest = store.latest(None).unwrap().unwrap();
        assert_eq!(latest.review.id, scoped.id);

        let latest = store.latest(Some("/home/dev/app")).unwrap().unwrap();
        assert_eq!(latest.review.id, scoped.id);
    }

    #[test]
    fn corrupt_records_are_skipped_in_listings() {
        let (_dir, store) = setup_store();
        let review = sample_review(Some("/home/dev/app"), "good");
        store.save(&review).unwrap();
        let dir = store.root().join("projects/home_dev_app");
        fs::write(dir.join("broken.json"), b"{ not json").unwrap();

        let pending = store.list_pending("/home/dev/app").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].review.id, review.id);
    }

    #[test]
    fn encoded_project_path_is_accepted_directly() {
        let (_dir, store) = setup_store();
        let review = sample_review(Some("/home/dev/app"), "plan");
        store.save(&review).unwrap();

        let pending = store.list_pending("home_dev_app").unwrap();
        assert_eq!(pending.len(), 1);
    }
}
