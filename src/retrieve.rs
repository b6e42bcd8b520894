//! Retrieval engine: nearest-neighbor search over a bot's vector partition.
//!
//! The query is embedded with the same shared model as indexing, compared
//! against only the owning bot's vectors by cosine similarity, and the
//! top-k passage texts come back best-first. An empty result is a normal
//! outcome (a bot with no knowledge yet), never an error.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, embed_one, Embedder};

/// Retrieve up to `top_k` passages for `query`, restricted to `bot_id`'s
/// partition, ordered by descending cosine similarity.
///
/// The `bot_id` filter is the cross-bot isolation boundary: a query for one
/// bot must never surface another bot's content, no matter how similar.
pub async fn retrieve(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    query: &str,
    bot_id: &str,
    top_k: usize,
) -> Result<Vec<String>> {
    let query_vec = embed_one(embedder, query).await?;

    let rows = sqlx::query("SELECT text, embedding FROM vectors WHERE bot_id = ?")
        .bind(bot_id)
        .fetch_all(pool)
        .await?;

    let mut scored: Vec<(f32, String)> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
            (similarity, row.get("text"))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    tracing::debug!(bot_id, passages = scored.len(), "retrieved context");
    Ok(scored.into_iter().map(|(_, text)| text).collect())
}
