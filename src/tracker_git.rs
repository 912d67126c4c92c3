//! Git-based change tracking.
//!
//! Instead of per-file fingerprints, this strategy keeps a single cursor:
//! the last fully-processed commit. Each pass diffs the cursor against the
//! current HEAD and classifies the changed paths by edit type. An absent
//! or unresolvable cursor falls back to reseeding every tracked document.
//!
//! All repository access shells out to the `git` binary.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::changeset::ChangeSet;
use crate::config::TrackingConfig;

/// One parsed entry from `git diff --name-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    Added(String),
    Modified(String),
    Deleted(String),
    TypeChanged(String),
    Renamed { old: String, new: String },
}

/// Outcome of planning one git-mode pass.
#[derive(Debug)]
pub enum GitPlan {
    /// The root is not a usable repository (missing, bare, no commits, or
    /// a failed git invocation). The pass reports no changes.
    Unavailable,
    /// The cursor already points at HEAD.
    UpToDate,
    /// Mutations to apply, plus the commit to persist once they have been
    /// attempted. `reseed` is set when the plan came from a full listing
    /// of tracked files rather than a commit diff.
    Diff {
        changes: ChangeSet,
        head: String,
        reseed: bool,
    },
}

/// Plan one pass against the repository at `root`.
pub fn plan(root: &Path, cursor: Option<&str>, tracking: &TrackingConfig) -> GitPlan {
    if !repo_available(root) {
        return GitPlan::Unavailable;
    }

    let head = match head_commit(root) {
        Some(head) => head,
        None => {
            warn!(
                root = %root.display(),
                "repository has no commits yet, nothing to sync"
            );
            return GitPlan::Unavailable;
        }
    };

    let mut cursor = cursor.map(str::to_string);
    if cursor.as_deref() == Some(head.as_str()) {
        debug!("no new commits since last sync");
        return GitPlan::UpToDate;
    }
    if let Some(last) = cursor.take() {
        if commit_exists(root, &last) {
            cursor = Some(last);
        } else {
            warn!(
                commit = %last,
                "last processed commit not found in history, reprocessing all files"
            );
        }
    }

    match cursor {
        Some(last) => {
            let entries = match diff_name_status(root, &last, &head) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, "git diff failed, skipping this pass");
                    return GitPlan::Unavailable;
                }
            };
            GitPlan::Diff {
                changes: classify(&entries, tracking),
                head,
                reseed: false,
            }
        }
        None => {
            let tracked = match tracked_files(root) {
                Ok(tracked) => tracked,
                Err(err) => {
                    warn!(error = %err, "could not list tracked files, skipping this pass");
                    return GitPlan::Unavailable;
                }
            };
            let mut changes = ChangeSet::new();
            for path in tracked {
                if tracking.is_eligible(Path::new(&path)) {
                    changes.record_added(path);
                }
            }
            GitPlan::Diff {
                changes,
                head,
                reseed: true,
            }
        }
    }
}

/// Classify diff entries into index mutations.
///
/// Deletions purge, additions add, modifications do both. A type change is
/// treated as a fresh write. Renames split into a removal of the old
/// identity and an addition of the new one. Ineligible paths are ignored
/// regardless of edit type.
pub fn classify(entries: &[DiffEntry], tracking: &TrackingConfig) -> ChangeSet {
    let eligible = |path: &str| tracking.is_eligible(Path::new(path));
    let mut changes = ChangeSet::new();

    for entry in entries {
        match entry {
            DiffEntry::Added(path) if eligible(path) => changes.record_added(path.clone()),
            DiffEntry::Modified(path) if eligible(path) => changes.record_modified(path.clone()),
            DiffEntry::Deleted(path) if eligible(path) => changes.record_removed(path.clone()),
            DiffEntry::TypeChanged(path) if eligible(path) => changes.record_added(path.clone()),
            DiffEntry::Renamed { old, new } => {
                if eligible(old) {
                    changes.record_removed(old.clone());
                }
                if eligible(new) {
                    changes.record_added(new.clone());
                }
            }
            _ => {}
        }
    }

    changes
}

/// Parse `git diff --name-status` output. Fields are tab-separated; rename
/// and copy statuses carry a similarity score suffix (`R100`).
pub fn parse_name_status(output: &str) -> Vec<DiffEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let mut fields = line.split('\t');
        let status = fields.next().unwrap_or("").trim();
        let first = fields.next();
        let second = fields.next();

        match (status.chars().next(), first, second) {
            (Some('A'), Some(path), _) => entries.push(DiffEntry::Added(path.to_string())),
            (Some('M'), Some(path), _) => entries.push(DiffEntry::Modified(path.to_string())),
            (Some('D'), Some(path), _) => entries.push(DiffEntry::Deleted(path.to_string())),
            (Some('T'), Some(path), _) => entries.push(DiffEntry::TypeChanged(path.to_string())),
            (Some('R'), Some(old), Some(new)) => entries.push(DiffEntry::Renamed {
                old: old.to_string(),
                new: new.to_string(),
            }),
            // A copy leaves the source untouched; only the new path matters.
            (Some('C'), Some(_), Some(new)) => entries.push(DiffEntry::Added(new.to_string())),
            (None, _, _) => {}
            _ => debug!(entry = line, "ignoring unrecognized diff entry"),
        }
    }

    entries
}

fn repo_available(root: &Path) -> bool {
    match git(root, &["rev-parse", "--is-bare-repository"]) {
        Ok(out) if out.trim() == "true" => {
            warn!(
                root = %root.display(),
                "directory is a bare repository, cannot track files"
            );
            false
        }
        Ok(_) => match git(root, &["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.trim() == "true" => true,
            _ => {
                warn!(
                    root = %root.display(),
                    "directory is not inside a git work tree; \
                     ensure documents_dir points at a repository root"
                );
                false
            }
        },
        Err(err) => {
            warn!(
                root = %root.display(),
                error = %err,
                "directory is not a valid git repository"
            );
            false
        }
    }
}

fn head_commit(root: &Path) -> Option<String> {
    git(root, &["rev-parse", "HEAD"])
        .ok()
        .map(|out| out.trim().to_string())
}

fn commit_exists(root: &Path, commit: &str) -> bool {
    let rev = format!("{commit}^{{commit}}");
    git(root, &["cat-file", "-e", rev.as_str()]).is_ok()
}

fn diff_name_status(root: &Path, old: &str, new: &str) -> Result<Vec<DiffEntry>> {
    let output = git(root, &["diff", "--name-status", "-M", old, new])?;
    Ok(parse_name_status(&output))
}

fn tracked_files(root: &Path) -> Result<Vec<String>> {
    let output = git(root, &["ls-files"])?;
    Ok(output.lines().map(str::to_string).collect())
}

fn git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .with_context(|| "Failed to execute 'git'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking() -> TrackingConfig {
        TrackingConfig::default()
    }

    #[test]
    fn parses_plain_statuses() {
        let output = "A\tnotes/new.md\nM\tnotes/edited.md\nD\tnotes/gone.md\nT\tnotes/link.md\n";
        let entries = parse_name_status(output);
        assert_eq!(
            entries,
            vec![
                DiffEntry::Added("notes/new.md".to_string()),
                DiffEntry::Modified("notes/edited.md".to_string()),
                DiffEntry::Deleted("notes/gone.md".to_string()),
                DiffEntry::TypeChanged("notes/link.md".to_string()),
            ]
        );
    }

    #[test]
    fn parses_rename_with_score() {
        let entries = parse_name_status("R100\told.md\tnew.md\n");
        assert_eq!(
            entries,
            vec![DiffEntry::Renamed {
                old: "old.md".to_string(),
                new: "new.md".to_string(),
            }]
        );
    }

    #[test]
    fn parses_paths_with_spaces() {
        let entries = parse_name_status("M\tmy notes/daily log.md\n");
        assert_eq!(
            entries,
            vec![DiffEntry::Modified("my notes/daily log.md".to_string())]
        );
    }

    #[test]
    fn classify_modified_purges_then_adds() {
        let entries = vec![DiffEntry::Modified("a.md".to_string())];
        let changes = classify(&entries, &tracking());
        assert!(changes.to_remove.contains("a.md"));
        assert!(changes.to_add.contains("a.md"));
    }

    #[test]
    fn classify_type_change_is_add_only() {
        let entries = vec![DiffEntry::TypeChanged("a.md".to_string())];
        let changes = classify(&entries, &tracking());
        assert!(changes.to_remove.is_empty());
        assert!(changes.to_add.contains("a.md"));
    }

    #[test]
    fn classify_rename_splits_identities() {
        let entries = vec![DiffEntry::Renamed {
            old: "old.md".to_string(),
            new: "new.md".to_string(),
        }];
        let changes = classify(&entries, &tracking());
        assert!(changes.to_remove.contains("old.md"));
        assert!(changes.to_add.contains("new.md"));
        assert!(!changes.to_add.contains("old.md"));
    }

    #[test]
    fn classify_rename_to_ineligible_only_removes() {
        let entries = vec![DiffEntry::Renamed {
            old: "old.md".to_string(),
            new: "new.txt".to_string(),
        }];
        let changes = classify(&entries, &tracking());
        assert!(changes.to_remove.contains("old.md"));
        assert!(changes.to_add.is_empty());
    }

    #[test]
    fn classify_ignores_ineligible_paths() {
        let entries = vec![
            DiffEntry::Added("script.sh".to_string()),
            DiffEntry::Modified("README.txt".to_string()),
            DiffEntry::Deleted("image.png".to_string()),
        ];
        let changes = classify(&entries, &tracking());
        assert!(changes.is_empty());
    }
}
