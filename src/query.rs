//! Semantic query glue for the CLI.

use anyhow::Result;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::IndexClient;

/// Embed `text`, rank the index against it, and print the results.
pub async fn run_search(
    index: &dyn IndexClient,
    embedder: &dyn EmbeddingProvider,
    text: &str,
    limit: usize,
) -> Result<()> {
    let vector = embed_query(embedder, text).await?;
    let hits = index.query(&vector, limit).await?;

    if hits.is_empty() {
        println!("No relevant documents found.");
        return Ok(());
    }

    for hit in hits {
        let snippet: String = hit.content.chars().take(240).collect();
        println!("{:.3}  {}", hit.score, hit.id);
        println!("       {}", snippet.replace('\n', " ").trim());
    }

    Ok(())
}
