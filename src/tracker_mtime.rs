//! Mtime-based change tracking.
//!
//! Walks the documents directory, fingerprints every eligible file by
//! (mtime, size), and diffs the result against the previous snapshot:
//! unseen files are additions, fingerprint mismatches are modifications,
//! and snapshot entries missing from the walk are deletions.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::warn;
use walkdir::WalkDir;

use crate::changeset::ChangeSet;
use crate::config::TrackingConfig;
use crate::models::Fingerprint;

/// Output of one planning walk: the mutations to apply and the snapshot to
/// persist once they have been attempted.
#[derive(Debug)]
pub struct MtimePlan {
    pub changes: ChangeSet,
    pub snapshot: BTreeMap<String, Fingerprint>,
}

/// Walk `root` and diff observed fingerprints against `previous`.
///
/// The caller is responsible for checking that `root` exists; a vanished
/// file or unreadable entry mid-walk is skipped with a warning, never
/// fatal.
pub fn plan(
    root: &Path,
    previous: &BTreeMap<String, Fingerprint>,
    tracking: &TrackingConfig,
) -> MtimePlan {
    let mut changes = ChangeSet::new();
    let mut snapshot = BTreeMap::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !tracking.is_eligible(path) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative.to_string_lossy().to_string();

        // Fresh stat: the walk itself may race against deletions.
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "file disappeared during walk, skipping"
                );
                continue;
            }
        };

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let fingerprint = Fingerprint {
            mtime,
            size: metadata.len(),
        };

        match previous.get(&id) {
            None => changes.record_added(&id),
            Some(prev) if *prev != fingerprint => changes.record_modified(&id),
            Some(_) => {}
        }
        snapshot.insert(id, fingerprint);
    }

    // Anything tracked before but not observed now was deleted.
    for id in previous.keys() {
        if !snapshot.contains_key(id) {
            changes.record_removed(id);
        }
    }

    MtimePlan { changes, snapshot }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tracking() -> TrackingConfig {
        TrackingConfig::default()
    }

    #[test]
    fn new_files_are_additions() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/b.md"), "beta").unwrap();

        let plan = plan(tmp.path(), &BTreeMap::new(), &tracking());

        assert!(plan.changes.to_remove.is_empty());
        assert_eq!(plan.changes.to_add.len(), 2);
        assert!(plan.changes.to_add.contains("a.md"));
        assert!(plan.changes.to_add.contains("sub/b.md"));
        assert_eq!(plan.snapshot.len(), 2);
    }

    #[test]
    fn unchanged_files_produce_no_changes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();

        let first = plan(tmp.path(), &BTreeMap::new(), &tracking());
        let second = plan(tmp.path(), &first.snapshot, &tracking());

        assert!(second.changes.is_empty());
        assert_eq!(second.snapshot, first.snapshot);
    }

    #[test]
    fn size_change_is_a_modification() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        let first = plan(tmp.path(), &BTreeMap::new(), &tracking());

        fs::write(tmp.path().join("a.md"), "alpha, but longer now").unwrap();
        let second = plan(tmp.path(), &first.snapshot, &tracking());

        assert!(second.changes.to_add.contains("a.md"));
        assert!(second.changes.to_remove.contains("a.md"));
    }

    #[test]
    fn missing_files_are_deletions() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("b.md"), "beta").unwrap();
        let first = plan(tmp.path(), &BTreeMap::new(), &tracking());

        fs::remove_file(tmp.path().join("b.md")).unwrap();
        let second = plan(tmp.path(), &first.snapshot, &tracking());

        assert!(second.changes.to_add.is_empty());
        assert_eq!(second.changes.to_remove.len(), 1);
        assert!(second.changes.to_remove.contains("b.md"));
        assert!(!second.snapshot.contains_key("b.md"));
    }

    #[test]
    fn ineligible_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("b.txt"), "not a document").unwrap();

        let plan = plan(tmp.path(), &BTreeMap::new(), &tracking());

        assert_eq!(plan.changes.to_add.len(), 1);
        assert!(!plan.snapshot.contains_key("b.txt"));
    }

    #[test]
    fn git_metadata_directory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git/objects")).unwrap();
        fs::write(tmp.path().join(".git/HEAD.md"), "not a note").unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();

        let plan = plan(tmp.path(), &BTreeMap::new(), &tracking());

        assert_eq!(plan.snapshot.len(), 1);
        assert!(plan.snapshot.contains_key("a.md"));
    }
}
