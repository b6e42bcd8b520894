//! Depth-bounded breadth-first web crawler.
//!
//! The crawl is scoped to the first seed's URL subtree: a discovered link is
//! followed only if its normalized form is prefixed by the normalized seed.
//! Each depth level is fetched concurrently under a semaphore whose permit
//! count adapts to memory pressure, and the whole level completes before the
//! next one is scheduled. The page budget counts every attempted fetch, so a
//! failing page still consumes budget.
//!
//! Fetching sits behind [`PageFetcher`] so the traversal logic is testable
//! without a network.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::models::{CrawlOutcome, CrawledPage};

/// Hard cap on concurrent fetches regardless of configuration.
pub const MAX_CONCURRENCY_CAP: usize = 50;

/// Bounds for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlLimits {
    pub max_depth: usize,
    pub max_concurrency: usize,
    pub page_limit: usize,
    /// Used-memory percentage above which admission is halved.
    pub memory_threshold_percent: f64,
}

/// One successfully fetched page: rendered text plus outbound links.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub text: String,
    pub links: Vec<String>,
}

/// Abstraction over page fetching so the BFS walk can be driven by an HTTP
/// client in production and an in-memory site map in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage>;
}

/// Normalize a URL for dedup and scope checks: drop the fragment and force
/// exactly one trailing slash.
pub fn normalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    format!("{}/", without_fragment.trim_end_matches('/'))
}

/// A URL is in scope iff its normalized form lives under the normalized base.
pub fn in_scope(base: &str, url: &str) -> bool {
    normalize_url(url).starts_with(base)
}

/// Effective permit count for one depth level: the configured concurrency
/// (capped), halved when used memory exceeds the threshold. Never below 1.
fn effective_concurrency(max_concurrency: usize, memory_threshold_percent: f64) -> usize {
    let cap = max_concurrency.clamp(1, MAX_CONCURRENCY_CAP);

    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return cap;
    }
    let used_percent = 100.0 * (total.saturating_sub(sys.available_memory())) as f64 / total as f64;

    if used_percent > memory_threshold_percent {
        tracing::warn!(
            used_percent = format!("{:.1}", used_percent),
            "memory pressure high, halving crawl admission"
        );
        (cap / 2).max(1)
    } else {
        cap
    }
}

/// Breadth-first crawl from `seed_urls`, bounded by depth, concurrency, and
/// page budget. Per-page fetch failures are logged and skipped; they count
/// toward the budget but contribute no output.
pub async fn crawl(
    fetcher: Arc<dyn PageFetcher>,
    seed_urls: &[String],
    limits: &CrawlLimits,
) -> Result<CrawlOutcome> {
    let Some(first_seed) = seed_urls.first() else {
        anyhow::bail!("at least one seed URL is required");
    };
    let base = normalize_url(first_seed);

    let mut visited: HashSet<String> = HashSet::new();
    let mut outcome = CrawlOutcome::default();

    // Seed frontier, restricted to the base scope, deduped in order.
    let mut frontier: Vec<String> = Vec::new();
    let mut enqueued: HashSet<String> = HashSet::new();
    for seed in seed_urls {
        let norm = normalize_url(seed);
        if in_scope(&base, &norm) && enqueued.insert(norm.clone()) {
            frontier.push(norm);
        }
    }

    for depth in 0..limits.max_depth {
        if outcome.pages_crawled >= limits.page_limit {
            break;
        }

        let mut level: Vec<String> = frontier
            .iter()
            .filter(|u| !visited.contains(*u) && in_scope(&base, u))
            .cloned()
            .collect();
        if level.is_empty() {
            break;
        }

        let remaining = limits.page_limit - outcome.pages_crawled;
        level.truncate(remaining);

        let permits = effective_concurrency(limits.max_concurrency, limits.memory_threshold_percent);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks: JoinSet<(String, Result<FetchedPage>)> = JoinSet::new();

        for url in &level {
            let url = url.clone();
            let fetcher = Arc::clone(&fetcher);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // Holding the permit for the whole fetch bounds in-flight pages.
                let _permit = semaphore.acquire_owned().await;
                let page = fetcher.fetch_page(&url).await;
                (url, page)
            });
        }

        let mut next_frontier: Vec<String> = Vec::new();
        let mut next_enqueued: HashSet<String> = HashSet::new();

        while let Some(joined) = tasks.join_next().await {
            let (url, fetched) = joined?;
            visited.insert(url.clone());
            outcome.pages_crawled += 1;

            match fetched {
                Ok(page) => {
                    outcome.total_chars += page.text.chars().count();
                    for link in &page.links {
                        let norm = normalize_url(link);
                        if !visited.contains(&norm)
                            && in_scope(&base, &norm)
                            && next_enqueued.insert(norm.clone())
                        {
                            next_frontier.push(norm);
                        }
                    }
                    outcome.pages.push(CrawledPage { url, text: page.text });
                }
                Err(e) => {
                    tracing::warn!(url = %url, depth, error = %e, "page fetch failed, skipping");
                }
            }
        }

        frontier = next_frontier;
    }

    Ok(outcome)
}

// ============ HTTP fetcher ============

/// Production fetcher: reqwest GET plus HTML text/link extraction.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("botforge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = Url::parse(response.url().as_str())?;
        let body = response.text().await?;

        // scraper's Html is !Send; keep parsing out of the await span.
        let (text, links) = parse_page(&final_url, &body);
        Ok(FetchedPage { text, links })
    }
}

/// Extract the rendered body text and absolute http(s) links from a page.
fn parse_page(page_url: &Url, body: &str) -> (String, Vec<String>) {
    let document = Html::parse_document(body);

    let body_selector = Selector::parse("body").expect("static selector");
    let text = match document.select(&body_selector).next() {
        Some(el) => el
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    };

    let link_selector = Selector::parse("a[href]").expect("static selector");
    let links = document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
        .collect();

    (text, links)
}
