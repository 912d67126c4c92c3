//! Persisted sync state: fingerprint snapshots and the Git sync cursor.
//!
//! The state file is read once at the start of a pass and rewritten only
//! after all index mutations have been attempted, so a crash mid-pass
//! leaves the old state in place and the next run recomputes the diff.
//! A missing, empty, or unparseable file degrades to "no prior state"
//! rather than failing the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::Fingerprint;

/// On-disk layout: a fingerprint map in mtime mode, a single commit
/// reference in git mode. Both fields default so either shape parses.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    files: BTreeMap<String, Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_processed_commit: Option<String>,
}

/// Accessor for the JSON state file.
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous fingerprint snapshot, or an empty map if there is
    /// no usable prior state.
    pub fn load_fingerprints(&self) -> BTreeMap<String, Fingerprint> {
        self.read().files
    }

    /// Persist the full current fingerprint snapshot.
    pub fn save_fingerprints(&self, files: &BTreeMap<String, Fingerprint>) -> Result<()> {
        self.write(&PersistedState {
            files: files.clone(),
            last_processed_commit: None,
        })
    }

    /// Load the last fully-processed commit reference, if any.
    pub fn load_cursor(&self) -> Option<String> {
        self.read().last_processed_commit
    }

    /// Persist the latest fully-processed commit reference.
    pub fn save_cursor(&self, commit: &str) -> Result<()> {
        self.write(&PersistedState {
            files: BTreeMap::new(),
            last_processed_commit: Some(commit.to_string()),
        })
    }

    fn read(&self) -> PersistedState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return PersistedState::default();
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "could not read state file, starting fresh"
                );
                return PersistedState::default();
            }
        };

        if content.trim().is_empty() {
            return PersistedState::default();
        }

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "state file is corrupted, starting fresh"
                );
                PersistedState::default()
            }
        }
    }

    fn write(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))
    }
}
