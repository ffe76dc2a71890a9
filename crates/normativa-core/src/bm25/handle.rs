//! Published, swappable handle to the current lexical index.
//!
//! Readers clone the inner `Arc` and search without holding the lock, so a
//! rebuild never blocks queries and a query never sees a partial index.
//! Rebuilds are serialized: the index is constructed outside the publish
//! lock and then swapped in.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use tracing::{debug, info};

use super::index::Bm25Index;
use super::Bm25Config;
use crate::errors::NormativaError;
use crate::types::{Document, ScoredDocument};

/// Shared slot holding the currently published [`Bm25Index`], if any.
#[derive(Debug, Default)]
pub struct SharedBm25Index {
    current: RwLock<Option<Arc<Bm25Index>>>,
    build_lock: Mutex<()>,
}

impl SharedBm25Index {
    /// Create an empty, not-yet-built handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an index has been published.
    pub fn is_ready(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The currently published index.
    pub fn current(&self) -> Option<Arc<Bm25Index>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The currently published index, or `IndexNotReady`.
    pub fn get(&self) -> Result<Arc<Bm25Index>, NormativaError> {
        self.current().ok_or(NormativaError::IndexNotReady)
    }

    /// Number of documents in the published index (0 when not built).
    pub fn len(&self) -> usize {
        self.current().map(|index| index.len()).unwrap_or(0)
    }

    /// Whether the published index is missing or empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish an already-built index, replacing the previous one.
    pub fn publish(&self, index: Bm25Index) {
        let index = Arc::new(index);
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(index);
    }

    /// Build a new index from `documents` and publish it.
    ///
    /// Returns the number of indexed documents.
    pub fn rebuild(&self, config: &Bm25Config, documents: Vec<Arc<Document>>) -> usize {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        let index = Bm25Index::build(config, documents);
        let count = index.len();
        debug!(
            "Built lexical index: {} documents, {} terms in {:?}",
            count,
            index.stats().vocabulary_size,
            start.elapsed()
        );

        self.publish(index);
        info!("Lexical index published with {} documents", count);
        count
    }

    /// Search the published index, returning raw lexical scores.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDocument>, NormativaError> {
        let index = self.get()?;
        Ok(index.search_documents(query, top_k))
    }
}
