//! Generative model abstraction and the Gemini implementation.
//!
//! The answer path talks to the model through [`GenerativeClient`], so the
//! orchestration is testable with a scripted stub. [`GeminiClient`] calls the
//! `generateContent` endpoint with the same retry policy as the embedding
//! providers: retry 429/5xx/network with exponential backoff, fail fast on
//! other 4xx.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Sentence the model is instructed to answer with when the supplied
/// passages do not cover the query.
pub const NO_CONTEXT_FALLBACK: &str =
    "The data that you have provided does not contain any information regarding your query. Please try again!!";

/// A generative text backend.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Produce a response to `user_query` under `system_instruction`.
    async fn generate(&self, system_instruction: &str, user_query: &str) -> Result<String>;
}

/// Construct the configured generative provider.
///
/// Fails at startup when the provider is unknown or its credentials are
/// missing from the environment.
pub fn create_generative_client(config: &GenerationConfig) -> Result<Box<dyn GenerativeClient>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiClient::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Build the grounded system instruction for one ask round-trip: the bot's
/// persona, the grounding rules, the response language, and the retrieved
/// passages as the only permitted source material.
pub fn compose_system_instruction(
    system_prompt: &str,
    language: &str,
    passages: &[String],
) -> String {
    let context = if passages.is_empty() {
        "(no relevant data found)".to_string()
    } else {
        passages.join("\n\n---\n\n")
    };

    format!(
        "{system_prompt}\n\n\
         Answer the user's query using ONLY the data provided below. \
         If the data does not contain the answer, reply exactly: \
         \"{NO_CONTEXT_FALLBACK}\"\n\
         Respond in {language} only.\n\n\
         Data:\n{context}"
    )
}

// ============ Gemini provider ============

/// Generative provider backed by the Gemini `generateContent` API.
pub struct GeminiClient {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, system_instruction: &str, user_query: &str) -> Result<String> {
        let body = serde_json::json!({
            "system_instruction": {
                "parts": [{ "text": system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": user_query }]
            }],
        });

        let endpoint = format!("{}/models/{}:generateContent", self.url, self.model);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_gemini_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(attempt, %status, "Gemini call failed, retrying");
                        last_err =
                            Some(anyhow::anyhow!("Gemini API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("generation failed after retries")))
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let text = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate text"))?;

    Ok(text.to_string())
}
