//! Vector index clients.
//!
//! [`IndexClient`] is the boundary the reconciler and the query layer talk
//! to. [`SqliteIndex`] is the persistent backend; [`MemoryIndex`] backs
//! tests and ephemeral runs. Ranking is brute-force cosine similarity over
//! all stored vectors.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;

use crate::models::{IndexEntry, SearchHit};

/// The index operations the sync engine depends on.
///
/// Constructed once at process start and passed explicitly into the
/// reconciler and the query layer.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Insert or replace the document stored under `entry.id`.
    async fn upsert(&self, entry: &IndexEntry) -> Result<()>;

    /// Remove a document. Returns `false` when the id was not present;
    /// removing a missing id is not an error.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Rank stored documents against `vector`, best first.
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>>;
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id            TEXT PRIMARY KEY,
    content       TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    embedding     BLOB NOT NULL,
    updated_at    INTEGER NOT NULL
)
"#;

/// SQLite-backed index. One row per document, keyed by document identity,
/// with the embedding stored as a little-endian f32 BLOB.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if needed) the database at `db_path` and ensure the
    /// schema exists.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl IndexClient for SqliteIndex {
    async fn upsert(&self, entry: &IndexEntry) -> Result<()> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO documents (id, content, metadata_json, embedding, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.content)
        .bind(&metadata_json)
        .bind(vec_to_blob(&entry.embedding))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let rows: Vec<(String, String, Vec<u8>)> =
            sqlx::query_as("SELECT id, content, embedding FROM documents")
                .fetch_all(&self.pool)
                .await?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|(id, content, blob)| {
                let score = cosine_similarity(vector, &blob_to_vec(&blob)) as f64;
                SearchHit { id, content, score }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

/// In-memory index for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryIndex {
    docs: RwLock<BTreeMap<String, IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs.read().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.docs.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IndexClient for MemoryIndex {
    async fn upsert(&self, entry: &IndexEntry) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.docs.write().unwrap().remove(id).is_some())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let docs = self.docs.read().unwrap();
        let mut hits: Vec<SearchHit> = docs
            .values()
            .map(|entry| SearchHit {
                id: entry.id.clone(),
                content: entry.content.clone(),
                score: cosine_similarity(vector, &entry.embedding) as f64,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}
