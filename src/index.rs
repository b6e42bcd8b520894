//! Embedding & indexing engine.
//!
//! Turns a chunk batch into vectors and upserts them into the shared index
//! under the owning bot's partition. Every vector carries its source text
//! and `bot_id`; the `bot_id` column is the isolation mechanism, so it is
//! written here unconditionally and filtered on unconditionally at read time.
//!
//! There is no dedup: indexing the same text twice yields two retrievable
//! rows. Vectors are immutable once written; the only delete path is the
//! full partition teardown when a bot is removed.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::embedding::{vec_to_blob, Embedder};

/// Embed `chunks` and index them under `bot_id`. Returns the number of
/// vectors written.
///
/// Any failing step aborts the remainder of the batch; vectors already
/// written stay (no cross-vector transaction).
pub async fn embed_and_index(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    chunks: &[String],
    bot_id: &str,
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    // Providers cap inputs per request; submit the chunks in batch_size groups.
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(embedder.batch_size().max(1)) {
        embeddings.extend(embedder.embed(batch).await?);
    }
    if embeddings.len() != chunks.len() {
        anyhow::bail!(
            "embedding count mismatch: {} chunks, {} vectors",
            chunks.len(),
            embeddings.len()
        );
    }

    let now = chrono::Utc::now().timestamp();
    let mut written = 0usize;

    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
        // Embedding-space consistency: a vector of the wrong length would
        // poison every nearest-neighbor comparison, so it aborts the batch.
        if embedding.len() != embedder.dims() {
            anyhow::bail!(
                "embedding dimensionality mismatch: expected {}, got {}",
                embedder.dims(),
                embedding.len()
            );
        }

        sqlx::query(
            "INSERT INTO vectors (id, bot_id, text, embedding, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(bot_id)
        .bind(chunk)
        .bind(vec_to_blob(embedding))
        .bind(now)
        .execute(pool)
        .await?;

        written += 1;
    }

    tracing::debug!(bot_id, count = written, "indexed chunk batch");
    Ok(written)
}

/// Remove every vector owned by `bot_id` (partition teardown).
pub async fn drop_partition(pool: &SqlitePool, bot_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM vectors WHERE bot_id = ?")
        .bind(bot_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_pool, FixtureEmbedder};

    #[tokio::test]
    async fn indexes_every_chunk_under_the_bot() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();

        let chunks = vec!["one".to_string(), "two".to_string()];
        let count = embed_and_index(&pool, &embedder, &chunks, "bot-a")
            .await
            .unwrap();
        assert_eq!(count, 2);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE bot_id = 'bot-a'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn empty_batch_indexes_nothing() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();
        let count = embed_and_index(&pool, &embedder, &[], "bot-a").await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn same_text_twice_yields_two_rows() {
        // No dedup by design: re-ingesting content is visible as duplicates.
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();

        let chunk = vec!["repeated".to_string()];
        embed_and_index(&pool, &embedder, &chunk, "bot-a").await.unwrap();
        embed_and_index(&pool, &embedder, &chunk, "bot-a").await.unwrap();

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE text = 'repeated'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn large_inputs_are_embedded_in_batch_size_groups() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::with_batch_size(2);

        let chunks: Vec<String> = (0..5).map(|i| format!("chunk {}", i)).collect();
        let count = embed_and_index(&pool, &embedder, &chunks, "bot-a")
            .await
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(embedder.batch_sizes(), vec![2, 2, 1]);

        // Order survives the split: each stored text keeps its own vector.
        let stored: Vec<String> =
            sqlx::query_scalar("SELECT text FROM vectors ORDER BY rowid")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(stored, chunks);
    }

    #[tokio::test]
    async fn wrong_dimensionality_aborts() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::with_dims_lie(8);

        let err = embed_and_index(&pool, &embedder, &["x".to_string()], "bot-a")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimensionality"));
    }

    #[tokio::test]
    async fn drop_partition_removes_only_that_bot() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();

        embed_and_index(&pool, &embedder, &["a".to_string()], "bot-a")
            .await
            .unwrap();
        embed_and_index(&pool, &embedder, &["b".to_string()], "bot-b")
            .await
            .unwrap();

        assert_eq!(drop_partition(&pool, "bot-a").await.unwrap(), 1);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
