//! Score normalization and weighted fusion.
//!
//! Lexical scores are unbounded and vector similarities live on their own
//! scale, so each list is min-max normalized to [0, 1] before the weighted
//! combination.
//!
//! ## Fusion Rule
//!
//! Documents are keyed by [`DocumentId`](crate::types::DocumentId):
//!
//! ```text
//! in both lists:   v * vector_weight + b * bm25_weight
//! vector only:     v * vector_weight
//! lexical only:    b * bm25_weight
//! ```
//!
//! A document found by one method gets no credit for the other.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::NormativaError;
use crate::types::{Document, DocumentId, ScoreOrigin, ScoredDocument};

// ============================================================================
// Normalization
// ============================================================================

/// Min-max normalize scores to [0, 1], preserving order.
///
/// A constant list maps to all 1.0; an empty list stays empty.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let (min, max) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(*s), hi.max(*s))
        });

    let range = max - min;
    if range <= f32::EPSILON || !range.is_finite() {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|s| ((s - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Normalize the scores of a ranked list in place, keeping its order.
pub fn normalize_scored(mut documents: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
    let scores: Vec<f32> = documents.iter().map(|d| d.score).collect();
    for (doc, score) in documents.iter_mut().zip(normalize_scores(&scores)) {
        doc.score = score;
    }
    documents
}

// ============================================================================
// Weights
// ============================================================================

/// Fusion weights for the vector and lexical lists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionWeights {
    /// Weight of the normalized vector similarity.
    pub vector_weight: f32,
    /// Weight of the normalized BM25 score.
    pub bm25_weight: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector_weight: 0.5,
            bm25_weight: 0.5,
        }
    }
}

impl FusionWeights {
    /// Create weights without validation.
    pub fn new(vector_weight: f32, bm25_weight: f32) -> Self {
        Self {
            vector_weight,
            bm25_weight,
        }
    }

    /// Validate that both weights are in [0, 1] and sum to 1.0 ± 0.01.
    pub fn validate(&self) -> Result<(), NormativaError> {
        for (name, value) in [
            ("vectorWeight", self.vector_weight),
            ("bm25Weight", self.bm25_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(NormativaError::InvalidConfiguration {
                    message: format!("retrieval.{} must be between 0 and 1 (got {})", name, value),
                    hint: "Use weights in [0, 1] that sum to 1.0 (recommended: 0.5 / 0.5)"
                        .to_string(),
                });
            }
        }

        let sum = self.vector_weight + self.bm25_weight;
        if !(0.99..=1.01).contains(&sum) {
            return Err(NormativaError::InvalidConfiguration {
                message: format!(
                    "retrieval weights sum to {} (vectorWeight={}, bm25Weight={})",
                    sum, self.vector_weight, self.bm25_weight
                ),
                hint: "vectorWeight + bm25Weight must equal 1.0".to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Weighted Fusion
// ============================================================================

struct FusionEntry {
    document: Arc<Document>,
    vector: Option<f32>,
    lexical: Option<f32>,
}

/// Combine normalized vector and lexical lists into one top-k ranking.
///
/// Both inputs must already be normalized. Equal fused scores keep
/// first-seen order: vector-list order first, then lexical-only documents in
/// lexical order. When a key repeats inside one list, its first occurrence
/// is kept.
pub fn weighted_fusion(
    vector: &[ScoredDocument],
    lexical: &[ScoredDocument],
    weights: FusionWeights,
    k: usize,
) -> Vec<ScoredDocument> {
    let mut entries: Vec<FusionEntry> = Vec::with_capacity(vector.len() + lexical.len());
    let mut positions: HashMap<DocumentId, usize> = HashMap::new();

    for hit in vector {
        let id = hit.document.id();
        if positions.contains_key(&id) {
            continue;
        }
        positions.insert(id, entries.len());
        entries.push(FusionEntry {
            document: Arc::clone(&hit.document),
            vector: Some(hit.score),
            lexical: None,
        });
    }

    for hit in lexical {
        let id = hit.document.id();
        match positions.get(&id) {
            Some(&pos) => {
                let entry = &mut entries[pos];
                if entry.lexical.is_none() {
                    entry.lexical = Some(hit.score);
                }
            }
            None => {
                positions.insert(id, entries.len());
                entries.push(FusionEntry {
                    document: Arc::clone(&hit.document),
                    vector: None,
                    lexical: Some(hit.score),
                });
            }
        }
    }

    let mut fused: Vec<ScoredDocument> = entries
        .into_iter()
        .map(|entry| {
            let score = entry.vector.map_or(0.0, |v| v * weights.vector_weight)
                + entry.lexical.map_or(0.0, |b| b * weights.bm25_weight);
            ScoredDocument::new(entry.document, score, ScoreOrigin::Fused)
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    fused.truncate(k);
    fused
}
