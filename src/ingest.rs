//! Ingestion orchestration: crawl or upload, then chunk, then stage.
//!
//! Both paths end at the staging store and hand back an [`IngestReport`]
//! carrying the session id the caller must pass to the claim step. Producing
//! no usable content is a rejected request ([`IngestError::NoUsableContent`]),
//! not a hard failure; per-file extraction errors are logged and skipped.

use std::sync::Arc;

use crate::chunk::split_chunks;
use crate::config::ChunkingConfig;
use crate::crawl::{self, CrawlLimits, PageFetcher};
use crate::extract::{extract_file, Extracted};
use crate::models::IngestReport;
use crate::staging;
use sqlx::SqlitePool;

#[derive(Debug)]
pub enum IngestError {
    /// Nothing stage-worthy came out of the input. Distinct from failure:
    /// the pipeline ran, there was just nothing to keep.
    NoUsableContent,
    Internal(anyhow::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::NoUsableContent => write!(f, "no usable content was extracted"),
            IngestError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<anyhow::Error> for IngestError {
    fn from(e: anyhow::Error) -> Self {
        IngestError::Internal(e)
    }
}

/// Crawl `url`, chunk every fetched page's text, and stage the batch.
pub async fn ingest_crawl(
    pool: &SqlitePool,
    fetcher: Arc<dyn PageFetcher>,
    url: &str,
    limits: &CrawlLimits,
    chunking: &ChunkingConfig,
    retention_secs: i64,
) -> Result<IngestReport, IngestError> {
    let outcome = crawl::crawl(fetcher, &[url.to_string()], limits).await?;
    tracing::info!(
        pages = outcome.pages_crawled,
        chars = outcome.total_chars,
        "crawl finished"
    );

    let texts: Vec<String> = outcome.pages.into_iter().map(|p| p.text).collect();
    let chunks = split_chunks(&texts, chunking.chunk_size, chunking.overlap);
    if chunks.is_empty() {
        return Err(IngestError::NoUsableContent);
    }

    let session_id = staging::put(pool, &chunks, retention_secs).await?;
    Ok(IngestReport {
        pages_crawled: outcome.pages_crawled,
        chunk_count: chunks.len(),
        session_id,
    })
}

/// Extract and chunk a batch of uploaded files, staging everything together.
/// Files that fail extraction are skipped with a warning; CSV batches keep
/// their pre-formed chunks and never pass through the chunker.
pub async fn ingest_files(
    pool: &SqlitePool,
    files: &[(String, Vec<u8>)],
    chunking: &ChunkingConfig,
    retention_secs: i64,
) -> Result<IngestReport, IngestError> {
    let mut chunks: Vec<String> = Vec::new();

    for (name, bytes) in files {
        match extract_file(name, bytes, chunking.csv_rows_per_chunk) {
            Ok(Extracted::Text(text)) => {
                chunks.extend(split_chunks(
                    std::slice::from_ref(&text),
                    chunking.chunk_size,
                    chunking.overlap,
                ));
            }
            Ok(Extracted::Chunks(batches)) => chunks.extend(batches),
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "skipping file, nothing extracted");
            }
        }
    }

    if chunks.is_empty() {
        return Err(IngestError::NoUsableContent);
    }

    let session_id = staging::put(pool, &chunks, retention_secs).await?;
    Ok(IngestReport {
        pages_crawled: 0,
        chunk_count: chunks.len(),
        session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::FetchedPage;
    use crate::testutil::test_pool;
    use anyhow::Result;
    use async_trait::async_trait;

    const RETENTION: i64 = 1800;

    struct OnePageFetcher {
        text: String,
    }

    #[async_trait]
    impl PageFetcher for OnePageFetcher {
        async fn fetch_page(&self, _url: &str) -> Result<FetchedPage> {
            Ok(FetchedPage {
                text: self.text.clone(),
                links: Vec::new(),
            })
        }
    }

    fn limits() -> CrawlLimits {
        CrawlLimits {
            max_depth: 1,
            max_concurrency: 1,
            page_limit: 10,
            memory_threshold_percent: 100.0,
        }
    }

    #[tokio::test]
    async fn crawl_ingest_stages_chunked_page_text() {
        let pool = test_pool().await;
        let fetcher = Arc::new(OnePageFetcher {
            text: "a".repeat(3000),
        });

        let report = ingest_crawl(
            &pool,
            fetcher,
            "https://x.test/docs/",
            &limits(),
            &ChunkingConfig::default(),
            RETENTION,
        )
        .await
        .unwrap();

        assert_eq!(report.pages_crawled, 1);
        assert_eq!(report.chunk_count, 3);

        let staged = staging::get(&pool, &report.session_id, RETENTION)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged.len(), 3);
    }

    #[tokio::test]
    async fn crawl_with_only_empty_pages_is_rejected() {
        let pool = test_pool().await;
        let fetcher = Arc::new(OnePageFetcher {
            text: String::new(),
        });

        let err = ingest_crawl(
            &pool,
            fetcher,
            "https://x.test/docs/",
            &limits(),
            &ChunkingConfig::default(),
            RETENTION,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::NoUsableContent));
    }

    #[tokio::test]
    async fn file_ingest_stages_text_and_csv_chunks() {
        let pool = test_pool().await;

        let files = vec![
            ("notes.txt".to_string(), b"short note".to_vec()),
            (
                "scores.csv".to_string(),
                b"name,score\nalice,10\nbob,20\n".to_vec(),
            ),
        ];

        let report = ingest_files(&pool, &files, &ChunkingConfig::default(), RETENTION)
            .await
            .unwrap();
        assert_eq!(report.pages_crawled, 0);
        assert_eq!(report.chunk_count, 2);

        let staged = staging::get(&pool, &report.session_id, RETENTION)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged[0], "short note");
        assert!(staged[1].starts_with("name, score\n"));
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped_not_fatal() {
        let pool = test_pool().await;

        let files = vec![
            ("photo.png".to_string(), vec![0u8; 16]),
            ("keep.txt".to_string(), b"kept".to_vec()),
        ];

        let report = ingest_files(&pool, &files, &ChunkingConfig::default(), RETENTION)
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 1);
    }

    #[tokio::test]
    async fn batch_with_nothing_extractable_is_rejected() {
        let pool = test_pool().await;

        let files = vec![("photo.png".to_string(), vec![0u8; 16])];
        let err = ingest_files(&pool, &files, &ChunkingConfig::default(), RETENTION)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoUsableContent));
    }
}
