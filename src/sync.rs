//! Sync facade: the single entry point surrounding code is allowed to
//! call.
//!
//! Selects the change-tracking strategy from configuration, runs one pass,
//! and reports whether any change was detected. State is persisted only
//! after all index mutations have been attempted, so an interrupted pass
//! is recomputed from the old state on the next run.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index::IndexClient;
use crate::models::Fingerprint;
use crate::reconcile;
use crate::state::StateFile;
use crate::tracker_git::{self, GitPlan};
use crate::tracker_mtime;

/// Change-tracking strategy, selected once at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMethod {
    Mtime,
    Git,
}

impl TrackingMethod {
    /// Never fails: an unrecognized value degrades to mtime with a logged
    /// warning.
    pub fn from_config(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "mtime" => Self::Mtime,
            "git" => Self::Git,
            other => {
                warn!(method = other, "unknown tracking method, falling back to mtime");
                Self::Mtime
            }
        }
    }
}

/// Run one sync pass. Returns whether any change was detected and applied.
///
/// With `full` set, prior state is ignored for this pass and every
/// eligible document is treated as new.
pub async fn run(
    config: &Config,
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
    full: bool,
) -> Result<bool> {
    let root = config.files.documents_dir.as_path();
    if !root.is_dir() {
        warn!(
            root = %root.display(),
            "documents directory does not exist, nothing to sync"
        );
        return Ok(false);
    }

    let state = StateFile::new(&config.files.state_file);

    match TrackingMethod::from_config(&config.tracking.method) {
        TrackingMethod::Mtime => sync_mtime(config, root, &state, index, embedder, full).await,
        TrackingMethod::Git => sync_git(config, root, &state, index, embedder, full).await,
    }
}

async fn sync_mtime(
    config: &Config,
    root: &Path,
    state: &StateFile,
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
    full: bool,
) -> Result<bool> {
    let previous = if full {
        BTreeMap::new()
    } else {
        state.load_fingerprints()
    };

    let plan = tracker_mtime::plan(root, &previous, &config.tracking);

    if plan.changes.is_empty() {
        persist_fingerprints(state, &plan.snapshot);
        info!("no document changes detected");
        return Ok(false);
    }

    info!(
        add = plan.changes.to_add.len(),
        remove = plan.changes.to_remove.len(),
        "applying detected changes"
    );
    let stats = reconcile::apply(&plan.changes, root, index, embedder).await;
    persist_fingerprints(state, &plan.snapshot);
    info!(
        added = stats.added,
        removed = stats.removed,
        skipped = stats.skipped,
        "sync pass complete"
    );
    Ok(true)
}

async fn sync_git(
    config: &Config,
    root: &Path,
    state: &StateFile,
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
    full: bool,
) -> Result<bool> {
    let cursor = if full { None } else { state.load_cursor() };

    match tracker_git::plan(root, cursor.as_deref(), &config.tracking) {
        GitPlan::Unavailable => Ok(false),
        GitPlan::UpToDate => {
            info!("no new commits, index is up to date");
            Ok(false)
        }
        GitPlan::Diff {
            changes,
            head,
            reseed,
        } => {
            if changes.is_empty() {
                info!("no relevant document changes in new commits");
                // A reseed of an empty repository still advances the
                // cursor; a plain empty diff leaves it for the next run.
                if reseed {
                    persist_cursor(state, &head);
                }
                return Ok(false);
            }

            info!(
                add = changes.to_add.len(),
                remove = changes.to_remove.len(),
                head = %head,
                "applying detected changes"
            );
            let stats = reconcile::apply(&changes, root, index, embedder).await;
            persist_cursor(state, &head);
            info!(
                added = stats.added,
                removed = stats.removed,
                skipped = stats.skipped,
                "sync pass complete"
            );
            Ok(true)
        }
    }
}

// State write failures never roll back applied mutations: the next run's
// diff against the stale state reprocesses the affected files, and
// re-adding an unchanged document is idempotent.

fn persist_fingerprints(state: &StateFile, snapshot: &BTreeMap<String, Fingerprint>) {
    if let Err(err) = state.save_fingerprints(snapshot) {
        warn!(error = %err, "failed to persist sync state");
    }
}

fn persist_cursor(state: &StateFile, head: &str) {
    if let Err(err) = state.save_cursor(head) {
        warn!(error = %err, "failed to persist sync state");
    }
}
