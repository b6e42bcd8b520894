//! Session-keyed staging store for ingested-but-not-yet-indexed chunks.
//!
//! Ingestion adapters put a chunk batch here and hand the returned session id
//! back to the caller, who later claims it during bot creation. Batches live
//! for a fixed retention window (30 minutes by default); expiry is enforced
//! by the store itself — expired rows are invisible to reads and purged on
//! access — never by caller polling. A batch may be read any number of times
//! until it expires.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Store a non-empty chunk batch; returns the opaque session id.
pub async fn put(pool: &SqlitePool, chunks: &[String], retention_secs: i64) -> Result<String> {
    if chunks.is_empty() {
        anyhow::bail!("refusing to stage an empty chunk batch");
    }

    purge_expired(pool, retention_secs).await?;

    let session_id = Uuid::new_v4().to_string();
    let chunks_json = serde_json::to_string(chunks)?;
    let now = chrono::Utc::now().timestamp();

    sqlx::query("INSERT INTO staged_batches (session_id, chunks_json, created_at) VALUES (?, ?, ?)")
        .bind(&session_id)
        .bind(&chunks_json)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(session_id)
}

/// Fetch a staged batch by session id. Returns `None` for unknown or
/// expired sessions.
pub async fn get(
    pool: &SqlitePool,
    session_id: &str,
    retention_secs: i64,
) -> Result<Option<Vec<String>>> {
    purge_expired(pool, retention_secs).await?;

    let cutoff = chrono::Utc::now().timestamp() - retention_secs;
    let row: Option<String> = sqlx::query_scalar(
        "SELECT chunks_json FROM staged_batches WHERE session_id = ? AND created_at > ?",
    )
    .bind(session_id)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

async fn purge_expired(pool: &SqlitePool, retention_secs: i64) -> Result<()> {
    let cutoff = chrono::Utc::now().timestamp() - retention_secs;
    sqlx::query("DELETE FROM staged_batches WHERE created_at <= ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    const RETENTION: i64 = 1800;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps the in-memory database shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply_schema(&pool).await.unwrap();
        pool
    }

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let pool = test_pool().await;
        let batch = chunks(&["alpha", "beta", "gamma"]);

        let session = put(&pool, &batch, RETENTION).await.unwrap();
        let got = get(&pool, &session, RETENTION).await.unwrap();
        assert_eq!(got, Some(batch));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let pool = test_pool().await;
        assert!(put(&pool, &[], RETENTION).await.is_err());
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let pool = test_pool().await;
        assert_eq!(get(&pool, "no-such-session", RETENTION).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batches_survive_multiple_reads() {
        let pool = test_pool().await;
        let batch = chunks(&["reusable"]);

        let session = put(&pool, &batch, RETENTION).await.unwrap();
        for _ in 0..3 {
            assert_eq!(
                get(&pool, &session, RETENTION).await.unwrap(),
                Some(batch.clone())
            );
        }
    }

    #[tokio::test]
    async fn expired_batches_are_invisible_and_purged() {
        let pool = test_pool().await;
        let session = put(&pool, &chunks(&["old"]), RETENTION).await.unwrap();

        // Backdate past the retention window.
        let stale = chrono::Utc::now().timestamp() - RETENTION - 1;
        sqlx::query("UPDATE staged_batches SET created_at = ? WHERE session_id = ?")
            .bind(stale)
            .bind(&session)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(get(&pool, &session, RETENTION).await.unwrap(), None);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staged_batches")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
