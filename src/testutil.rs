//! Shared fixtures for unit tests: an in-memory database and a
//! deterministic embedder that needs no network.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use crate::embedding::Embedder;

/// In-memory SQLite pool with the schema applied. A single connection keeps
/// the `:memory:` database shared across queries.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::migrate::apply_schema(&pool).await.unwrap();
    pool
}

/// Deterministic offline embedder. Texts registered via [`with_mapping`]
/// get exactly the vector given; everything else gets a stable
/// hash-derived vector. Lets tests script similarity orderings precisely.
///
/// [`with_mapping`]: FixtureEmbedder::with_mapping
pub struct FixtureEmbedder {
    dims: usize,
    claimed_dims: usize,
    batch_size: usize,
    mapping: HashMap<String, Vec<f32>>,
    batch_log: Mutex<Vec<usize>>,
}

impl Default for FixtureEmbedder {
    fn default() -> Self {
        Self {
            dims: 4,
            claimed_dims: 4,
            batch_size: usize::MAX,
            mapping: HashMap::new(),
            batch_log: Mutex::new(Vec::new()),
        }
    }
}

impl FixtureEmbedder {
    /// Fixed text -> vector assignments; vectors must have length 4.
    pub fn with_mapping(pairs: &[(&str, [f32; 4])]) -> Self {
        let mapping = pairs
            .iter()
            .map(|(text, vec)| (text.to_string(), vec.to_vec()))
            .collect();
        Self {
            mapping,
            ..Self::default()
        }
    }

    /// An embedder whose advertised dimensionality disagrees with the
    /// vectors it produces, for exercising the consistency check.
    pub fn with_dims_lie(claimed_dims: usize) -> Self {
        Self {
            claimed_dims,
            ..Self::default()
        }
    }

    /// An embedder that advertises a small per-request input cap.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Input counts of every `embed` call received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_log.lock().unwrap().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.mapping.get(text) {
            return v.clone();
        }
        (0..self.dims)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                (text, i).hash(&mut hasher);
                // Spread into (0, 1] so no vector is all-zero.
                (hasher.finish() % 1000 + 1) as f32 / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for FixtureEmbedder {
    fn model_name(&self) -> &str {
        "fixture"
    }

    fn dims(&self) -> usize {
        self.claimed_dims
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batch_log.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
