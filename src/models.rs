//! Core data types flowing through the ingestion and query pipeline.

use chrono::{DateTime, Utc};

/// A bot persona. Only `id`, `system_prompt`, and `language` are consumed
/// by the answer path; `name` is display metadata.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub language: String,
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a bot.
#[derive(Debug, Clone)]
pub struct BotDraft {
    pub name: String,
    pub language: String,
    pub system_prompt: String,
}

/// Allow-listed mutable fields for bot updates. Anything not representable
/// here cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct BotPatch {
    pub name: Option<String>,
    pub language: Option<String>,
    pub system_prompt: Option<String>,
}

impl BotPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.language.is_none() && self.system_prompt.is_none()
    }
}

/// Result of an ingestion call: how much was produced and the staging
/// session the caller must pass on to the claim step.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub pages_crawled: usize,
    pub chunk_count: usize,
    pub session_id: String,
}

/// One page produced by the crawl adapter.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub text: String,
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub pages_crawled: usize,
    pub total_chars: usize,
    pub pages: Vec<CrawledPage>,
}

/// One completed query/response round-trip.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub bot_id: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}
