//! Append-only chat history, one row per completed ask round-trip.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::ChatMessage;

pub async fn append(pool: &SqlitePool, bot_id: &str, query: &str, response: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO chat_history (id, bot_id, query, response, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(bot_id)
    .bind(query)
    .bind(response)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// All messages for a bot, oldest first.
pub async fn list(pool: &SqlitePool, bot_id: &str) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        "SELECT id, bot_id, query, response, created_at FROM chat_history \
         WHERE bot_id = ? ORDER BY created_at ASC, id ASC",
    )
    .bind(bot_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ChatMessage {
            id: row.get("id"),
            bot_id: row.get("bot_id"),
            query: row.get("query"),
            response: row.get("response"),
            created_at: timestamp_to_datetime(row.get("created_at")),
        })
        .collect())
}

pub async fn delete_for_bot(pool: &SqlitePool, bot_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM chat_history WHERE bot_id = ?")
        .bind(bot_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn appended_messages_list_oldest_first() {
        let pool = test_pool().await;

        append(&pool, "bot-a", "first question", "first answer").await.unwrap();
        append(&pool, "bot-a", "second question", "second answer").await.unwrap();

        let messages = list(&pool, "bot-a").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].query, "first question");
        assert_eq!(messages[1].response, "second answer");
    }

    #[tokio::test]
    async fn history_is_per_bot() {
        let pool = test_pool().await;

        append(&pool, "bot-a", "q", "a").await.unwrap();
        append(&pool, "bot-b", "q", "a").await.unwrap();

        assert_eq!(list(&pool, "bot-a").await.unwrap().len(), 1);
        assert_eq!(list(&pool, "bot-b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_for_bot_clears_only_that_bot() {
        let pool = test_pool().await;

        append(&pool, "bot-a", "q", "a").await.unwrap();
        append(&pool, "bot-b", "q", "a").await.unwrap();

        assert_eq!(delete_for_bot(&pool, "bot-a").await.unwrap(), 1);
        assert!(list(&pool, "bot-a").await.unwrap().is_empty());
        assert_eq!(list(&pool, "bot-b").await.unwrap().len(), 1);
    }
}
