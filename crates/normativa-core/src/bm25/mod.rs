//! BM25 lexical retrieval.
//!
//! The lexical half of hybrid retrieval. Raw BM25 scores are unbounded; the
//! retriever min-max normalizes them before fusion.
//!
//! ## Architecture
//!
//! ```text
//! CorpusSnapshot ──► Bm25Index::build ──► SharedBm25Index (Arc swap)
//!                                              │
//! Query ──► Tokenizer ──► inverted index ──► top-k (score desc, snapshot order)
//! ```
//!
//! ## Key Components
//!
//! - [`tokenizer`]: lowercase + whitespace split, optional Unicode segmentation,
//!   Portuguese stemming and stop words
//! - [`index`]: immutable inverted index and query-time scoring
//! - [`scorer`]: Okapi BM25 (k1=1.2, b=0.75, smoothed IDF)
//! - [`handle`]: published index slot, rebuilt outside the lock and swapped in

mod handle;
mod index;
mod scorer;
mod tokenizer;

pub use handle::SharedBm25Index;
pub use index::{Bm25Index, Bm25SearchResult, Bm25Stats};
pub use scorer::{bm25_term_score, idf, Bm25Params};
pub use tokenizer::{Tokenizer, TokenizerConfig, TokenizerKind};

use serde::{Deserialize, Serialize};

use crate::errors::NormativaError;

// ============================================================================
// Configuration
// ============================================================================

/// BM25 configuration (`bm25:` in config.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Config {
    /// Term frequency saturation. Default: 1.2
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document length normalization, 0 = none, 1 = full. Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Token splitting strategy. Default: whitespace
    #[serde(default)]
    pub tokenizer: TokenizerKind,

    /// Apply Portuguese stemming. Default: false
    #[serde(default)]
    pub stemming: bool,

    /// Remove Portuguese stop words. Default: false
    #[serde(default)]
    pub remove_stopwords: bool,

    /// Minimum token length in characters. Default: 1
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_min_token_length() -> usize {
    1
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            tokenizer: TokenizerKind::default(),
            stemming: false,
            remove_stopwords: false,
            min_token_length: default_min_token_length(),
        }
    }
}

impl Bm25Config {
    /// Validate scoring parameters, returning warnings for questionable values.
    ///
    /// # Errors
    /// - `k1 <= 0`
    /// - `b` outside [0, 1]
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        let mut warnings = Vec::new();

        if self.k1.is_nan() || self.k1 <= 0.0 {
            return Err(NormativaError::InvalidConfiguration {
                message: format!("bm25.k1 must be positive (got {})", self.k1),
                hint: "Set k1 to a positive value (recommended: 1.2)".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.b) {
            return Err(NormativaError::InvalidConfiguration {
                message: format!("bm25.b must be between 0 and 1 (got {})", self.b),
                hint: "Set b within [0, 1] (recommended: 0.75)".to_string(),
            });
        }

        if self.k1 > 3.0 {
            warnings.push(format!(
                "bm25.k1={} is unusually high; term frequency will dominate (recommended: 1.2)",
                self.k1
            ));
        }

        if self.min_token_length > 3 {
            warnings.push(format!(
                "bm25.minTokenLength={} drops short legal tokens such as article numbers",
                self.min_token_length
            ));
        }

        Ok(warnings)
    }
}
