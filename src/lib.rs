//! # Botforge
//!
//! A pipeline for building retrieval-grounded chat bots from web and file
//! content.
//!
//! Botforge ingests a website crawl or a batch of uploaded documents, chunks
//! the text, stages it under a short-lived session, and, once a bot claims
//! the session, embeds the chunks into that bot's private vector partition.
//! Questions are answered by retrieving the bot's closest passages and
//! handing them to a generative model as the only permitted source material.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Crawl/Upload │──▶│ Chunk+Stage  │──▶│ Claim: Embed  │
//! │  (ingest)    │   │ (30 min TTL) │   │ into bot      │
//! └──────────────┘   └──────────────┘   └──────┬────────┘
//!                                              │
//!                   ┌──────────────────────────┤
//!                   ▼                          ▼
//!             ┌──────────┐             ┌──────────────┐
//!             │ Retrieve │────────────▶│  Generate    │
//!             │ (top-k)  │  passages   │  (grounded)  │
//!             └──────────┘             └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! botforge init                               # create database
//! botforge crawl https://docs.example.com/    # stage a site's content
//! botforge bot create "Support" English "You are the support bot."
//! botforge claim <bot-id> <session-id>        # index the staged chunks
//! botforge ask <bot-id> "How do refunds work?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`crawl`] | Depth-bounded breadth-first crawler |
//! | [`extract`] | Per-format file text extraction |
//! | [`chunk`] | Text chunking |
//! | [`staging`] | Session-keyed staging store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Embedding & indexing engine |
//! | [`retrieve`] | Per-bot nearest-neighbor retrieval |
//! | [`ingest`] | Crawl/upload orchestration |
//! | [`bots`] | Bot persistence and the claim step |
//! | [`generate`] | Generative model abstraction |
//! | [`answer`] | Grounded query answering |
//! | [`history`] | Chat history |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod bots;
pub mod chunk;
pub mod config;
pub mod crawl;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod history;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod staging;

#[cfg(test)]
pub mod testutil;
