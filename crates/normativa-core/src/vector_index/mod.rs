//! Vector index abstraction and the similarity adapter.
//!
//! This module provides:
//! - [`VectorMetric`] - distance/similarity metrics for vector search
//! - [`VectorConfig`] - `vector:` section of config.yaml
//! - [`VectorIndexBackend`] - trait for nearest-neighbour indexes
//! - [`InMemoryVectorIndex`] - exact linear scan over an embedded snapshot
//! - [`VectorSearcher`] - embedder + index, producing relevance in [0, 1]
//!
//! ## Score Adaptation
//!
//! Backends return raw scores in their own metric. The searcher converts
//! them so that higher always means more relevant and the value lies in
//! [0, 1]:
//!
//! | Metric | Raw | Adapted |
//! |--------|-----|---------|
//! | cosine | similarity in [-1, 1] | `(1 + s) / 2` |
//! | dot | unbounded similarity | `1 / (1 + e^-s)` |
//! | l2 | distance, lower is better | `1 / (1 + d)` |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{EmbeddingBackend, DEFAULT_DIMENSION};
use crate::errors::NormativaError;
use crate::types::{Document, ScoreOrigin, ScoredDocument};

/// Documents embedded per rayon task when building the in-memory index.
const EMBED_BATCH_SIZE: usize = 32;

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance/similarity metric for vector search.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,

    /// Dot product similarity.
    Dot,

    /// Euclidean (L2) distance.
    L2,
}

impl VectorMetric {
    /// Whether lower raw scores are better.
    pub fn is_distance(&self) -> bool {
        matches!(self, Self::L2)
    }

    /// Raw score of `query` against `vector` in this metric.
    pub fn raw_score(&self, query: &[f32], vector: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, vector),
            Self::Dot => dot_product(query, vector),
            Self::L2 => euclidean_distance(query, vector),
        }
    }

    /// Convert a raw score into a relevance in [0, 1], higher is better.
    pub fn to_similarity(&self, raw: f32) -> f32 {
        let adapted = match self {
            Self::Cosine => (1.0 + raw) / 2.0,
            Self::Dot => 1.0 / (1.0 + (-raw).exp()),
            Self::L2 => 1.0 / (1.0 + raw.max(0.0)),
        };
        if adapted.is_nan() {
            0.0
        } else {
            adapted.clamp(0.0, 1.0)
        }
    }
}

impl fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

impl FromStr for VectorMetric {
    type Err = NormativaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(NormativaError::InvalidConfiguration {
                message: format!("unknown vector.metric `{}`", other),
                hint: "Use `cosine`, `dot` or `l2`".to_string(),
            }),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// VectorConfig
// ============================================================================

/// Vector index configuration (`vector:` in config.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorConfig {
    /// Similarity metric of the index. Default: cosine
    #[serde(default)]
    pub metric: VectorMetric,

    /// Dimension of the built-in hashing embedder. Default: 256
    #[serde(default = "default_dimension")]
    pub dimension: u32,
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            metric: VectorMetric::default(),
            dimension: default_dimension(),
        }
    }
}

impl VectorConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - `dimension == 0`
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        let mut warnings = Vec::new();
        if self.dimension == 0 {
            return Err(NormativaError::InvalidConfiguration {
                message: "vector.dimension must be at least 1".to_string(),
                hint: "Set dimension to a positive value (recommended: 256)".to_string(),
            });
        }
        if self.dimension < 32 {
            warnings.push(format!(
                "vector.dimension={} is small; hashing collisions will blur similarity",
                self.dimension
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// A raw nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    /// Position of the document in the indexed snapshot.
    pub doc_idx: usize,
    /// Raw score in the backend's metric.
    pub raw_score: f32,
}

/// Trait for nearest-neighbour indexes over a corpus snapshot.
pub trait VectorIndexBackend: Send + Sync {
    /// Metric of the raw scores returned by [`search`](Self::search).
    fn metric(&self) -> VectorMetric;

    /// Number of indexed documents.
    fn len(&self) -> usize;

    /// Whether the index holds no documents.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The indexed snapshot, addressable by `doc_idx`.
    fn documents(&self) -> &[Arc<Document>];

    /// Top-k hits, best first (highest similarity, or lowest distance).
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>, NormativaError>;
}

// ============================================================================
// InMemoryVectorIndex
// ============================================================================

/// Exact linear-scan index held in memory.
pub struct InMemoryVectorIndex {
    metric: VectorMetric,
    dimension: usize,
    documents: Vec<Arc<Document>>,
    vectors: Vec<Vec<f32>>,
}

impl InMemoryVectorIndex {
    /// Create an index from pre-computed vectors aligned with `documents`.
    ///
    /// # Errors
    /// `InvalidArgument` if the counts differ or vectors disagree on dimension.
    pub fn new(
        metric: VectorMetric,
        documents: Vec<Arc<Document>>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, NormativaError> {
        if documents.len() != vectors.len() {
            return Err(NormativaError::InvalidArgument(format!(
                "{} documents but {} vectors",
                documents.len(),
                vectors.len()
            )));
        }
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(pos) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(NormativaError::InvalidArgument(format!(
                "vector {} has dimension {}, expected {}",
                pos,
                vectors[pos].len(),
                dimension
            )));
        }
        Ok(Self {
            metric,
            dimension,
            documents,
            vectors,
        })
    }

    /// Embed `documents` in parallel and index them.
    pub fn build(
        embedder: &dyn EmbeddingBackend,
        metric: VectorMetric,
        documents: Vec<Arc<Document>>,
    ) -> Result<Self, NormativaError> {
        let start = Instant::now();

        let batches: Vec<Vec<Vec<f32>>> = documents
            .par_chunks(EMBED_BATCH_SIZE)
            .map(|chunk| {
                let texts: Vec<String> = chunk.iter().map(|d| d.content.clone()).collect();
                embedder.embed_batch(&texts)
            })
            .collect::<Result<_, _>>()?;
        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        debug!(
            "Embedded {} documents with {} in {:?}",
            documents.len(),
            embedder.model_id(),
            start.elapsed()
        );

        Self::new(metric, documents, vectors)
    }

    /// Vector dimension (0 when empty).
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl VectorIndexBackend for InMemoryVectorIndex {
    fn metric(&self) -> VectorMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>, NormativaError> {
        if self.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(NormativaError::backend_unavailable(
                "vector",
                format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    self.dimension
                ),
            ));
        }

        let mut hits: Vec<VectorHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(doc_idx, vector)| VectorHit {
                doc_idx,
                raw_score: self.metric.raw_score(query, vector),
            })
            .collect();

        let distance = self.metric.is_distance();
        hits.sort_by(|a, b| {
            let ord = if distance {
                a.raw_score.partial_cmp(&b.raw_score)
            } else {
                b.raw_score.partial_cmp(&a.raw_score)
            };
            ord.unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_idx.cmp(&b.doc_idx))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

// ============================================================================
// VectorSearcher
// ============================================================================

/// Embedder plus index: the vector retrieval path of the orchestrator.
pub struct VectorSearcher {
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndexBackend>,
    similarity_threshold: f32,
}

impl VectorSearcher {
    /// Pair an embedder with an index. The threshold defaults to 0 (keep all).
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, index: Arc<dyn VectorIndexBackend>) -> Self {
        Self {
            embedder,
            index,
            similarity_threshold: 0.0,
        }
    }

    /// Drop candidates whose adapted similarity is below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// The configured similarity threshold.
    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// The embedding backend.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.embedder
    }

    /// The indexed snapshot.
    pub fn documents(&self) -> &[Arc<Document>] {
        self.index.documents()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Top-k documents by adapted similarity in [0, 1], best first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, NormativaError> {
        let query_vec = self.embedder.embed(query)?;
        let metric = self.index.metric();
        let documents = self.index.documents();

        let hits = self.index.search(&query_vec, k)?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(doc) = documents.get(hit.doc_idx) else {
                return Err(NormativaError::backend_unavailable(
                    "vector",
                    format!("index returned unknown document {}", hit.doc_idx),
                ));
            };
            let similarity = metric.to_similarity(hit.raw_score);
            if similarity < self.similarity_threshold {
                continue;
            }
            results.push(ScoredDocument::new(
                Arc::clone(doc),
                similarity,
                ScoreOrigin::Vector,
            ));
        }

        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
