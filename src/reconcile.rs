//! Applies a [`ChangeSet`] to the index.
//!
//! Every removal is issued before any addition, so for a given identity
//! the stale vector is always purged before its replacement is written —
//! a failed add can never leave two live vectors for one document.
//! Per-document failures (unreadable file, empty content, embedding or
//! index errors) are logged and skipped; the rest of the batch proceeds.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::changeset::ChangeSet;
use crate::embedding::EmbeddingProvider;
use crate::index::IndexClient;
use crate::models::IndexEntry;

/// Counters for one apply pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub removed: u64,
    pub added: u64,
    pub skipped: u64,
}

const UNTITLED: &str = "Untitled";

/// Title heuristic: the first non-empty line of the content, stripped of
/// leading markup, or a fixed placeholder.
pub fn derive_title(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            line.trim_start_matches(|c: char| {
                matches!(c, '#' | '>' | '*' | '-') || c.is_whitespace()
            })
            .trim_end()
        })
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Apply `changes` to the index: removals first, then additions.
pub async fn apply(
    changes: &ChangeSet,
    root: &Path,
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
) -> ApplyStats {
    let mut stats = ApplyStats::default();

    for id in &changes.to_remove {
        match index.remove(id).await {
            Ok(true) => {
                debug!(id = %id, "removed stale document");
                stats.removed += 1;
            }
            Ok(false) => debug!(id = %id, "document was not in the index"),
            Err(err) => warn!(id = %id, error = %err, "failed to remove document, continuing"),
        }
    }

    for id in &changes.to_add {
        match add_document(id, root, index, embedder).await {
            Ok(()) => {
                debug!(id = %id, "indexed document");
                stats.added += 1;
            }
            Err(err) => {
                warn!(id = %id, error = %err, "skipping document");
                stats.skipped += 1;
            }
        }
    }

    stats
}

async fn add_document(
    id: &str,
    root: &Path,
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
) -> Result<()> {
    let path = root.join(id);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if content.trim().is_empty() {
        bail!("document is empty");
    }

    let embedding = embedder
        .embed(std::slice::from_ref(&content))
        .await?
        .into_iter()
        .next()
        .context("empty embedding response")?;

    let mut metadata = BTreeMap::new();
    metadata.insert("title".to_string(), derive_title(&content));

    index
        .upsert(&IndexEntry {
            id: id.to_string(),
            embedding,
            content,
            metadata,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchHit;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32; 4]).collect())
        }
    }

    /// Records the order of index mutations.
    #[derive(Default)]
    struct RecordingIndex {
        ops: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IndexClient for RecordingIndex {
        async fn upsert(&self, entry: &IndexEntry) -> Result<()> {
            self.ops.lock().unwrap().push(format!("add {}", entry.id));
            Ok(())
        }
        async fn remove(&self, id: &str) -> Result<bool> {
            self.ops.lock().unwrap().push(format!("remove {id}"));
            Ok(true)
        }
        async fn query(&self, _vector: &[f32], _limit: usize) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn title_is_first_non_empty_line() {
        assert_eq!(derive_title("# Heading\n\nBody"), "Heading");
        assert_eq!(derive_title("\n\n  plain text first\nmore"), "plain text first");
        assert_eq!(derive_title("> quoted lead-in\n"), "quoted lead-in");
    }

    #[test]
    fn title_falls_back_to_placeholder() {
        assert_eq!(derive_title(""), UNTITLED);
        assert_eq!(derive_title("###\n---\n"), UNTITLED);
    }

    #[tokio::test]
    async fn removes_before_adds_for_same_identity() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "# Alpha\ncontent").unwrap();

        let mut changes = ChangeSet::new();
        changes.record_modified("a.md");

        let index = RecordingIndex::default();
        let stats = apply(&changes, tmp.path(), &index, &FakeEmbedder).await;

        let ops = index.ops.lock().unwrap().clone();
        assert_eq!(ops, vec!["remove a.md".to_string(), "add a.md".to_string()]);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.added, 1);
    }

    #[tokio::test]
    async fn unreadable_document_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ok.md"), "# Fine").unwrap();

        let mut changes = ChangeSet::new();
        changes.record_added("ok.md");
        changes.record_added("missing.md");

        let index = RecordingIndex::default();
        let stats = apply(&changes, tmp.path(), &index, &FakeEmbedder).await;

        assert_eq!(stats.added, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn empty_document_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.md"), "  \n\n").unwrap();

        let mut changes = ChangeSet::new();
        changes.record_added("empty.md");

        let index = RecordingIndex::default();
        let stats = apply(&changes, tmp.path(), &index, &FakeEmbedder).await;

        assert_eq!(stats.added, 0);
        assert_eq!(stats.skipped, 1);
        assert!(index.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_carries_title_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "# The Title\n\nBody text").unwrap();

        let mut changes = ChangeSet::new();
        changes.record_added("a.md");

        let index = crate::index::MemoryIndex::new();
        apply(&changes, tmp.path(), &index, &FakeEmbedder).await;

        let entry = index.get("a.md").unwrap();
        assert_eq!(entry.metadata.get("title").unwrap(), "The Title");
        assert!(entry.content.contains("Body text"));
    }
}
