//! The query path: retrieve grounding passages, call the generative model,
//! and record the round-trip.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::bots;
use crate::embedding::Embedder;
use crate::generate::{compose_system_instruction, GenerativeClient};
use crate::history;
use crate::retrieve::retrieve;

/// Answer `query` as `bot_id`: retrieve the bot's top passages (an empty set
/// is fine, the model falls back per its instruction), generate a grounded
/// response, and append the exchange to chat history.
pub async fn ask(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    client: &dyn GenerativeClient,
    bot_id: &str,
    query: &str,
    top_k: usize,
) -> Result<String> {
    let bot = bots::get_bot(pool, bot_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no bot with id {}", bot_id))?;

    let passages = retrieve(pool, embedder, query, bot_id, top_k).await?;
    let instruction = compose_system_instruction(&bot.system_prompt, &bot.language, &passages);

    let response = client.generate(&instruction, query).await?;

    history::append(pool, bot_id, query, &response).await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::NO_CONTEXT_FALLBACK;
    use crate::index::embed_and_index;
    use crate::models::BotDraft;
    use crate::testutil::{test_pool, FixtureEmbedder};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures the instruction it was called with and echoes a canned reply.
    struct RecordingClient {
        reply: String,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl RecordingClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeClient for RecordingClient {
        async fn generate(&self, system_instruction: &str, user_query: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system_instruction.to_string(), user_query.to_string()));
            Ok(self.reply.clone())
        }
    }

    async fn make_bot(pool: &SqlitePool) -> String {
        let bot = bots::create_bot(
            pool,
            &BotDraft {
                name: "support".to_string(),
                language: "German".to_string(),
                system_prompt: "You are the support bot.".to_string(),
            },
        )
        .await
        .unwrap();
        bot.id
    }

    #[tokio::test]
    async fn grounds_the_model_on_retrieved_passages() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();
        let client = RecordingClient::new("Alles klar.");
        let bot_id = make_bot(&pool).await;

        embed_and_index(&pool, &embedder, &["delivery takes 3 days".to_string()], &bot_id)
            .await
            .unwrap();

        let response = ask(&pool, &embedder, &client, &bot_id, "how long is delivery?", 5)
            .await
            .unwrap();
        assert_eq!(response, "Alles klar.");

        let seen = client.seen.lock().unwrap();
        let (instruction, query) = &seen[0];
        assert!(instruction.contains("You are the support bot."));
        assert!(instruction.contains("delivery takes 3 days"));
        assert!(instruction.contains("Respond in German only."));
        assert_eq!(query, "how long is delivery?");
    }

    #[tokio::test]
    async fn zero_knowledge_bot_still_answers() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();
        let client = RecordingClient::new(NO_CONTEXT_FALLBACK);
        let bot_id = make_bot(&pool).await;

        let response = ask(&pool, &embedder, &client, &bot_id, "anything", 5)
            .await
            .unwrap();
        assert_eq!(response, NO_CONTEXT_FALLBACK);
    }

    #[tokio::test]
    async fn each_ask_is_recorded_in_history() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();
        let client = RecordingClient::new("ok");
        let bot_id = make_bot(&pool).await;

        ask(&pool, &embedder, &client, &bot_id, "first", 5).await.unwrap();
        ask(&pool, &embedder, &client, &bot_id, "second", 5).await.unwrap();

        let messages = history::list(&pool, &bot_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].query, "first");
        assert_eq!(messages[0].response, "ok");
    }

    #[tokio::test]
    async fn unknown_bot_is_an_error() {
        let pool = test_pool().await;
        let embedder = FixtureEmbedder::default();
        let client = RecordingClient::new("ok");

        assert!(ask(&pool, &embedder, &client, "ghost", "q", 5).await.is_err());
        assert!(client.seen.lock().unwrap().is_empty());
    }
}
