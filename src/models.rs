//! Core data types shared by the sync engine and the retrieval layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cheap change proxy for one document: modification time and byte size.
///
/// Two fingerprints are equal iff both fields match exactly; any mismatch
/// means the document is treated as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Modification time as seconds since the Unix epoch.
    pub mtime: i64,
    /// File size in bytes.
    pub size: u64,
}

/// A document as stored in the vector index.
///
/// The `id` is the document's path relative to the documents directory and
/// doubles as the index primary key.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

/// One ranked result from a semantic query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub score: f64,
}
