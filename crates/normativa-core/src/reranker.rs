//! Pairwise reranking of the fused shortlist.
//!
//! The reranker scores every `(query, document)` pair and its score
//! **replaces** the fused score. Model-based cross-encoders plug in through
//! [`RerankerBackend`]; the crate ships [`TermOverlapReranker`], a
//! lightweight lexical scorer used when reranking is enabled without an
//! injected model.
//!
//! # Degraded Mode
//!
//! Without a backend the stage is a no-op that keeps the fused order and
//! assigns every candidate a uniform score of 1.0.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::errors::NormativaError;
use crate::types::{ScoreOrigin, ScoredDocument};

// ============================================================================
// RerankerProviderKind
// ============================================================================

/// Enum representing the available reranker providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RerankerProviderKind {
    /// Built-in query term coverage scorer.
    #[default]
    TermOverlap,
    /// Externally provided cross-encoder or service.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for RerankerProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TermOverlap => write!(f, "term_overlap"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for RerankerProviderKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "term_overlap" => Ok(Self::TermOverlap),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

// ============================================================================
// RerankerModelId
// ============================================================================

/// Newtype wrapper for reranker model identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RerankerModelId(pub String);

impl fmt::Display for RerankerModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RerankerModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RerankerModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// RerankerBackend Trait
// ============================================================================

/// Trait for pairwise reranker backends.
pub trait RerankerBackend: Send + Sync {
    /// Get the provider kind for this backend.
    fn provider_kind(&self) -> RerankerProviderKind;

    /// Get the model ID this backend uses.
    fn model_id(&self) -> &RerankerModelId;

    /// Score each document against the query; one score per document.
    fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, NormativaError>;
}

// ============================================================================
// Rerank Stage
// ============================================================================

/// Rerank `candidates` and keep the best `top_k`.
///
/// With a backend, candidates are ordered by the raw backend scores (equal
/// scores keep the incoming order, NaN sorts last) and the scores are then
/// mapped into [0, 1] by [`bounded_scores`]. Without a backend every
/// candidate gets 1.0 and the incoming order is kept.
///
/// # Errors
///
/// Propagates backend failures, and returns `BackendUnavailable` when the
/// backend returns a different number of scores than candidates.
pub fn rerank(
    query: &str,
    candidates: Vec<ScoredDocument>,
    top_k: usize,
    backend: Option<&dyn RerankerBackend>,
) -> Result<Vec<ScoredDocument>, NormativaError> {
    let Some(backend) = backend else {
        return Ok(uniform_scores(candidates, top_k));
    };

    if candidates.is_empty() {
        return Ok(candidates);
    }

    let texts: Vec<String> = candidates
        .iter()
        .map(|c| c.document.content.clone())
        .collect();
    let scores = backend.score_batch(query, &texts)?;

    if scores.len() != candidates.len() {
        return Err(NormativaError::backend_unavailable(
            "reranker",
            format!(
                "{} returned {} scores for {} documents",
                backend.model_id(),
                scores.len(),
                candidates.len()
            ),
        ));
    }

    let bounded = bounded_scores(&scores);
    let mut ranked: Vec<(ScoredDocument, f32, f32)> = candidates
        .into_iter()
        .zip(scores)
        .zip(bounded)
        .map(|((candidate, raw), score)| {
            let raw = if raw.is_nan() { f32::NEG_INFINITY } else { raw };
            (candidate, raw, score)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_k);

    Ok(ranked
        .into_iter()
        .map(|(candidate, _, score)| {
            ScoredDocument::new(candidate.document, score, ScoreOrigin::Reranked)
        })
        .collect())
}

/// Map raw backend scores into [0, 1] without changing their order.
///
/// A batch already inside [0, 1] is kept as is. Otherwise the backend is
/// taken to return logits and every score goes through the logistic
/// function. NaN maps to 0.
pub fn bounded_scores(raw: &[f32]) -> Vec<f32> {
    let in_unit_range = raw
        .iter()
        .all(|s| s.is_nan() || (0.0..=1.0).contains(s));

    raw.iter()
        .map(|&s| {
            if s.is_nan() {
                0.0
            } else if in_unit_range {
                s
            } else {
                1.0 / (1.0 + (-s).exp())
            }
        })
        .collect()
}

/// Degraded rerank: keep order, score every candidate 1.0, truncate.
pub fn uniform_scores(candidates: Vec<ScoredDocument>, top_k: usize) -> Vec<ScoredDocument> {
    candidates
        .into_iter()
        .take(top_k)
        .map(|c| ScoredDocument::new(c.document, 1.0, ScoreOrigin::Reranked))
        .collect()
}

// ============================================================================
// TermOverlapReranker
// ============================================================================

/// Scores a document by the share of distinct query terms it contains.
///
/// A document containing the whole query as a phrase scores 1.0.
#[derive(Debug, Clone)]
pub struct TermOverlapReranker {
    model_id: RerankerModelId,
    min_term_chars: usize,
}

impl TermOverlapReranker {
    /// Create the scorer. Query terms shorter than 3 chars are ignored.
    pub fn new() -> Self {
        Self {
            model_id: RerankerModelId::from("term-overlap-v1"),
            min_term_chars: 3,
        }
    }

    fn query_terms(&self, query: &str) -> HashSet<String> {
        query
            .unicode_words()
            .map(str::to_lowercase)
            .filter(|w| w.chars().count() >= self.min_term_chars)
            .collect()
    }

    fn score_one(&self, query_lower: &str, terms: &HashSet<String>, document: &str) -> f32 {
        let doc_lower = document.to_lowercase();
        if !query_lower.is_empty() && doc_lower.contains(query_lower) {
            return 1.0;
        }
        if terms.is_empty() {
            return 0.0;
        }
        let doc_terms: HashSet<String> = doc_lower.unicode_words().map(str::to_string).collect();
        let hits = terms.iter().filter(|t| doc_terms.contains(*t)).count();
        hits as f32 / terms.len() as f32
    }
}

impl Default for TermOverlapReranker {
    fn default() -> Self {
        Self::new()
    }
}

impl RerankerBackend for TermOverlapReranker {
    fn provider_kind(&self) -> RerankerProviderKind {
        RerankerProviderKind::TermOverlap
    }

    fn model_id(&self) -> &RerankerModelId {
        &self.model_id
    }

    fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, NormativaError> {
        let query_lower = query.trim().to_lowercase();
        let terms = self.query_terms(query);
        Ok(documents
            .iter()
            .map(|d| self.score_one(&query_lower, &terms, d))
            .collect())
    }
}

/// Create the built-in reranker backend.
pub fn create_default_backend() -> Arc<dyn RerankerBackend> {
    Arc::new(TermOverlapReranker::new())
}

// ============================================================================
// Test-only Mock Backends
// ============================================================================

/// Reranker returning fixed scores, for tests.
#[cfg(test)]
pub struct FixedScoreReranker {
    model_id: RerankerModelId,
    scores: Vec<f32>,
}

#[cfg(test)]
impl FixedScoreReranker {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            model_id: RerankerModelId::from("fixed"),
            scores,
        }
    }
}

#[cfg(test)]
impl RerankerBackend for FixedScoreReranker {
    fn provider_kind(&self) -> RerankerProviderKind {
        RerankerProviderKind::Other("mock".to_string())
    }

    fn model_id(&self) -> &RerankerModelId {
        &self.model_id
    }

    fn score_batch(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, NormativaError> {
        Ok(self.scores.clone())
    }
}

/// Reranker that always fails, for degradation tests.
#[cfg(test)]
pub struct FailingReranker {
    model_id: RerankerModelId,
}

#[cfg(test)]
impl FailingReranker {
    pub fn new() -> Self {
        Self {
            model_id: RerankerModelId::from("failing"),
        }
    }
}

#[cfg(test)]
impl RerankerBackend for FailingReranker {
    fn provider_kind(&self) -> RerankerProviderKind {
        RerankerProviderKind::Other("mock".to_string())
    }

    fn model_id(&self) -> &RerankerModelId {
        &self.model_id
    }

    fn score_batch(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, NormativaError> {
        Err(NormativaError::backend_unavailable("reranker", "mock failure"))
    }
}
