//! Embedding provider abstraction.
//!
//! This module provides:
//! - [`EmbeddingProviderKind`] - enum of embedding providers
//! - [`EmbeddingModelId`] - newtype for embedding model identifiers
//! - [`EmbeddingBackend`] - trait for embedding providers
//! - [`HashingEmbeddingBackend`] - deterministic feature-hashing embedder
//!
//! ## Backends
//!
//! Model-based embedders live outside this crate and plug in through
//! [`EmbeddingBackend`]. The built-in [`HashingEmbeddingBackend`] needs no
//! model files: it hashes lowercase word tokens with FNV-1a into a fixed
//! number of buckets and L2-normalizes the counts. It captures lexical
//! overlap only, which is enough to run hybrid retrieval end to end.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::errors::NormativaError;

// ============================================================================
// Constants
// ============================================================================

/// Model ID reported by the hashing embedder.
pub const HASHING_MODEL_ID: &str = "fnv1a-hashing-v1";

/// Default embedding dimension for the hashing embedder.
pub const DEFAULT_DIMENSION: u32 = 256;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// ============================================================================
// EmbeddingProviderKind
// ============================================================================

/// Supported embedding provider backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Built-in feature hashing.
    #[default]
    Hashing,

    /// Externally provided backend.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashing => write!(f, "hashing"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for EmbeddingProviderKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "hashing" => Self::Hashing,
            other => Self::Other(other.to_string()),
        })
    }
}

// ============================================================================
// EmbeddingModelId
// ============================================================================

/// Identifier for an embedding model version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingModelId(pub String);

impl EmbeddingModelId {
    /// Create a new model ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the model ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmbeddingModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EmbeddingModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// EmbeddingBackend Trait
// ============================================================================

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a given model version: the
/// same text always maps to the same vector.
pub trait EmbeddingBackend: Send + Sync {
    /// Get the provider kind for this backend.
    fn provider_kind(&self) -> EmbeddingProviderKind;

    /// Get the model ID this backend uses.
    fn model_id(&self) -> &EmbeddingModelId;

    /// Get the embedding dimension.
    fn dimension(&self) -> u32;

    /// Embed a batch of text inputs.
    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, NormativaError>;

    /// Embed a single text input.
    fn embed(&self, input: &str) -> Result<Vec<f32>, NormativaError> {
        let results = self.embed_batch(&[input.to_string()])?;
        results.into_iter().next().ok_or_else(|| {
            NormativaError::backend_unavailable("embedding", "embed_batch returned no vector")
        })
    }
}

// ============================================================================
// HashingEmbeddingBackend
// ============================================================================

/// Deterministic feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingBackend {
    model_id: EmbeddingModelId,
    dimension: u32,
}

impl HashingEmbeddingBackend {
    /// Create a hashing embedder with `dimension` buckets (at least 1).
    pub fn new(dimension: u32) -> Self {
        Self {
            model_id: EmbeddingModelId::new(HASHING_MODEL_ID),
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension as usize];

        for word in text.unicode_words() {
            let token = word.to_lowercase();
            let bucket = (fnv1a(token.as_bytes()) % u64::from(self.dimension)) as usize;
            embedding[bucket] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        embedding
    }
}

impl Default for HashingEmbeddingBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingBackend for HashingEmbeddingBackend {
    fn provider_kind(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::Hashing
    }

    fn model_id(&self) -> &EmbeddingModelId {
        &self.model_id
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, NormativaError> {
        Ok(inputs.iter().map(|s| self.embed_text(s)).collect())
    }
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

// ============================================================================
// Test-only Mock Backend
// ============================================================================

/// Embedding backend that always fails, for degradation tests.
#[cfg(test)]
pub struct FailingEmbeddingBackend {
    model_id: EmbeddingModelId,
}

#[cfg(test)]
impl FailingEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            model_id: EmbeddingModelId::new("failing"),
        }
    }
}

#[cfg(test)]
impl EmbeddingBackend for FailingEmbeddingBackend {
    fn provider_kind(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::Other("mock".to_string())
    }

    fn model_id(&self) -> &EmbeddingModelId {
        &self.model_id
    }

    fn dimension(&self) -> u32 {
        DEFAULT_DIMENSION
    }

    fn embed_batch(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, NormativaError> {
        Err(NormativaError::backend_unavailable("embedding", "mock failure"))
    }
}

// ============================================================================
// Tests
// ============================================================================
