//! Bot persistence and the claim step that turns a staged batch into a
//! bot's searchable knowledge.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::history;
use crate::index;
use crate::models::{Bot, BotDraft, BotPatch};
use crate::staging;

/// Why a claim could not run. Callers surface `BotNotFound` and
/// `SessionNotFound` as rejected requests rather than hard failures.
#[derive(Debug)]
pub enum ClaimError {
    BotNotFound(String),
    SessionNotFound(String),
    Internal(anyhow::Error),
}

impl std::fmt::Display for ClaimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimError::BotNotFound(id) => write!(f, "no bot with id {}", id),
            ClaimError::SessionNotFound(id) => {
                write!(f, "staged session {} not found or expired", id)
            }
            ClaimError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ClaimError {}

impl From<anyhow::Error> for ClaimError {
    fn from(e: anyhow::Error) -> Self {
        ClaimError::Internal(e)
    }
}

pub async fn create_bot(pool: &SqlitePool, draft: &BotDraft) -> Result<Bot> {
    let bot = Bot {
        id: Uuid::new_v4().to_string(),
        name: draft.name.clone(),
        language: draft.language.clone(),
        system_prompt: draft.system_prompt.clone(),
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        "INSERT INTO bots (id, name, language, system_prompt, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&bot.id)
    .bind(&bot.name)
    .bind(&bot.language)
    .bind(&bot.system_prompt)
    .bind(bot.created_at.timestamp())
    .execute(pool)
    .await?;

    tracing::info!(bot_id = %bot.id, name = %bot.name, "created bot");
    Ok(bot)
}

pub async fn get_bot(pool: &SqlitePool, bot_id: &str) -> Result<Option<Bot>> {
    let row = sqlx::query(
        "SELECT id, name, language, system_prompt, created_at FROM bots WHERE id = ?",
    )
    .bind(bot_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| bot_from_row(&row)))
}

pub async fn list_bots(pool: &SqlitePool) -> Result<Vec<Bot>> {
    let rows = sqlx::query(
        "SELECT id, name, language, system_prompt, created_at FROM bots ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(bot_from_row).collect())
}

/// Apply a patch to a bot. Only the fields present in [`BotPatch`] can ever
/// change; there is no by-name field assignment.
pub async fn update_bot(pool: &SqlitePool, bot_id: &str, patch: &BotPatch) -> Result<Option<Bot>> {
    if patch.is_empty() {
        anyhow::bail!("update contains no fields");
    }

    let Some(mut bot) = get_bot(pool, bot_id).await? else {
        return Ok(None);
    };

    if let Some(name) = &patch.name {
        bot.name = name.clone();
    }
    if let Some(language) = &patch.language {
        bot.language = language.clone();
    }
    if let Some(system_prompt) = &patch.system_prompt {
        bot.system_prompt = system_prompt.clone();
    }

    sqlx::query("UPDATE bots SET name = ?, language = ?, system_prompt = ? WHERE id = ?")
        .bind(&bot.name)
        .bind(&bot.language)
        .bind(&bot.system_prompt)
        .bind(bot_id)
        .execute(pool)
        .await?;

    Ok(Some(bot))
}

/// Delete a bot and everything it owns: its vector partition and its chat
/// history. This is the only path that removes vectors. Returns whether the
/// bot existed.
pub async fn delete_bot(pool: &SqlitePool, bot_id: &str) -> Result<bool> {
    let vectors = index::drop_partition(pool, bot_id).await?;
    let messages = history::delete_for_bot(pool, bot_id).await?;

    let result = sqlx::query("DELETE FROM bots WHERE id = ?")
        .bind(bot_id)
        .execute(pool)
        .await?;

    let existed = result.rows_affected() > 0;
    if existed {
        tracing::info!(bot_id, vectors, messages, "deleted bot");
    }
    Ok(existed)
}

/// Claim a staged batch for a bot: read the chunks staged under the
/// caller-supplied `session_id` and index them into the bot's partition.
/// Returns the number of vectors indexed.
pub async fn materialize_bot_knowledge(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    bot_id: &str,
    session_id: &str,
    retention_secs: i64,
) -> Result<usize, ClaimError> {
    if get_bot(pool, bot_id).await?.is_none() {
        return Err(ClaimError::BotNotFound(bot_id.to_string()));
    }

    let chunks = staging::get(pool, session_id, retention_secs)
        .await?
        .ok_or_else(|| ClaimError::SessionNotFound(session_id.to_string()))?;

    let indexed = index::embed_and_index(pool, embedder, &chunks, bot_id).await?;
    tracing::info!(bot_id, session_id, indexed, "claimed staged batch");
    Ok(indexed)
}

fn bot_from_row(row: &sqlx::sqlite::SqliteRow) -> Bot {
    Bot {
        id: row.get("id"),
        name: row.get("name"),
        language: row.get("language"),
        system_prompt: row.get("system_prompt"),
        created_at: history::timestamp_to_datetime(row.get("created_at")),
    }
}
