use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation. Safe to run on every startup.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Bot personas
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bots (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            language TEXT NOT NULL DEFAULT 'English',
            system_prompt TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Staged chunk batches awaiting a claim. Rows older than the retention
    // window are treated as nonexistent and purged on access.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_batches (
            session_id TEXT PRIMARY KEY,
            chunks_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The shared vector index. bot_id is the owner partition: every read
    // must filter on it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            bot_id TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only conversation log, one row per completed round-trip.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_history (
            id TEXT PRIMARY KEY,
            bot_id TEXT NOT NULL,
            query TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_bot_id ON vectors(bot_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staged_created_at ON staged_batches(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_bot_id ON chat_history(bot_id)")
        .execute(pool)
        .await?;

    Ok(())
}
