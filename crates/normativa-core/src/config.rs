//! Configuration types for Normativa.
//!
//! This module provides the configuration structures used by the engine:
//! - [`NormativaConfig`]: User-level configuration stored in `~/.normativa/config.yaml`
//! - [`RetrievalConfig`]: Fusion weights, k limits, reranker toggle and filter defaults
//! - [`AnswerConfig`]: Evidence excerpt length and system prompt override
//!
//! Index, vector and validator sections reuse the configuration types of
//! their modules ([`Bm25Config`], [`VectorConfig`], [`ValidatorConfig`]).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bm25::Bm25Config;
use crate::constants::{
    CONFIG_FILENAME, DEFAULT_DOCUMENT_STATUS, EVIDENCE_EXCERPT_CHARS, NORMATIVA_HOME_DIR,
};
use crate::errors::NormativaError;
use crate::fusion::FusionWeights;
use crate::query_expansion::{QueryExpander, QueryExpansionRule};
use crate::validator::ValidatorConfig;
use crate::vector_index::VectorConfig;

// ============================================================================
// Retrieval Constants
// ============================================================================

/// Default number of documents returned per request.
pub const DEFAULT_K: usize = 5;

/// Default cap on a requested k.
pub const DEFAULT_MAX_K: usize = 20;

/// Upper bound accepted for `retrieval.defaultK`.
const DEFAULT_K_LIMIT: usize = 50;

/// Upper bound accepted for `retrieval.maxK`.
const MAX_K_LIMIT: usize = 100;

/// Default minimum adapted similarity for vector candidates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

// ============================================================================
// NormativaConfig
// ============================================================================

/// User-level configuration.
///
/// Stored at `~/.normativa/config.yaml`. Every section is optional; a
/// missing file yields the defaults.
///
/// # Example YAML
///
/// ```yaml
/// corpus: ./corpus.jsonl
/// retrieval:
///   vectorWeight: 0.5
///   bm25Weight: 0.5
///   useReranker: false
///   defaultK: 5
///   maxK: 20
///   similarityThreshold: 0.5
///   statusFilterDefault: Vigente
/// bm25:
///   k1: 1.2
///   b: 0.75
/// vector:
///   metric: cosine
///   dimension: 256
/// answer:
///   excerptChars: 800
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormativaConfig {
    /// Corpus snapshot (JSONL). Relative paths resolve against the config
    /// file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus: Option<PathBuf>,

    /// Retrieval orchestration settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Lexical index settings.
    #[serde(default)]
    pub bm25: Bm25Config,

    /// Vector index settings.
    #[serde(default)]
    pub vector: VectorConfig,

    /// Confidence validator marker patterns.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Answer assembly settings.
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Query expansion rules, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_expansion: Vec<QueryExpansionRule>,
}

impl NormativaConfig {
    /// Load the configuration from the default location (`~/.normativa/config.yaml`).
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NormativaError::InvalidConfigFile`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, NormativaError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns the default configuration. A
    /// relative `corpus` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`NormativaError::InvalidConfigFile`] if the file exists but cannot be parsed.
    /// Returns [`NormativaError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, NormativaError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            NormativaError::InvalidConfigFile(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config: Self = serde_yaml::from_str(&content).map_err(|e| {
            NormativaError::InvalidConfigFile(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if let (Some(corpus), Some(dir)) = (config.corpus.as_ref(), path.parent()) {
            if corpus.is_relative() {
                config.corpus = Some(dir.join(corpus));
            }
        }

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Get the default config directory (`~/.normativa`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(NORMATIVA_HOME_DIR))
    }

    /// Get the default config file path (`~/.normativa/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Replace the corpus path.
    pub fn with_corpus(mut self, corpus: impl Into<PathBuf>) -> Self {
        self.corpus = Some(corpus.into());
        self
    }

    /// Validate every section.
    ///
    /// Returns the first critical error as `InvalidConfiguration`; non-fatal
    /// issues are returned as warnings for the caller to log.
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.bm25.validate()?);
        all_warnings.extend(self.vector.validate()?);
        all_warnings.extend(self.validator.validate()?);
        all_warnings.extend(self.answer.validate()?);

        QueryExpander::new(&self.query_expansion)?;

        if self.corpus.is_none() {
            all_warnings.push(
                "corpus is not set; retrieval needs documents from --corpus or NORMATIVA_CORPUS"
                    .to_string(),
            );
        }

        Ok(all_warnings)
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Retrieval orchestration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Weight of the vector score in fusion. Default: 0.5
    #[serde(default = "default_weight")]
    pub vector_weight: f32,

    /// Weight of the lexical score in fusion. Default: 0.5
    #[serde(default = "default_weight")]
    pub bm25_weight: f32,

    /// Whether to attach the built-in reranker. Default: false
    #[serde(default)]
    pub use_reranker: bool,

    /// k used when a request has none. Default: 5
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Requested k is capped here. Default: 20
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Minimum adapted vector similarity. Default: 0.5
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Status required when a request does not name one. Default: "Vigente"
    #[serde(default = "default_status_filter")]
    pub status_filter_default: String,
}

fn default_weight() -> f32 {
    0.5
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_max_k() -> usize {
    DEFAULT_MAX_K
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_status_filter() -> String {
    DEFAULT_DOCUMENT_STATUS.to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_weight(),
            bm25_weight: default_weight(),
            use_reranker: false,
            default_k: default_k(),
            max_k: default_max_k(),
            similarity_threshold: default_similarity_threshold(),
            status_filter_default: default_status_filter(),
        }
    }
}

impl RetrievalConfig {
    /// Fusion weights.
    pub fn weights(&self) -> FusionWeights {
        FusionWeights::new(self.vector_weight, self.bm25_weight)
    }

    /// Validates the retrieval configuration.
    ///
    /// # Errors
    /// - weights outside [0, 1] or not summing to 1.0 (±0.01)
    /// - `defaultK` outside [1, 50], `maxK` outside [1, 100]
    /// - `similarityThreshold` outside [0, 1]
    ///
    /// # Warnings
    /// - `defaultK > maxK`: requests without k are capped
    /// - empty `statusFilterDefault`: every document with a status is filtered out
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        let mut warnings = Vec::new();

        self.weights().validate()?;

        if !(1..=DEFAULT_K_LIMIT).contains(&self.default_k) {
            return Err(NormativaError::InvalidConfiguration {
                message: format!(
                    "retrieval.defaultK must be between 1 and {} (got {})",
                    DEFAULT_K_LIMIT, self.default_k
                ),
                hint: "Set defaultK to a small positive value (recommended: 5)".to_string(),
            });
        }

        if !(1..=MAX_K_LIMIT).contains(&self.max_k) {
            return Err(NormativaError::InvalidConfiguration {
                message: format!(
                    "retrieval.maxK must be between 1 and {} (got {})",
                    MAX_K_LIMIT, self.max_k
                ),
                hint: "Set maxK to at least defaultK (recommended: 20)".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(NormativaError::InvalidConfiguration {
                message: format!(
                    "retrieval.similarityThreshold must be between 0 and 1 (got {})",
                    self.similarity_threshold
                ),
                hint: "Similarity is normalized to [0, 1] (recommended: 0.5)".to_string(),
            });
        }

        if self.default_k > self.max_k {
            warnings.push(format!(
                "retrieval.defaultK={} exceeds maxK={}; requests without k will be capped",
                self.default_k, self.max_k
            ));
        }

        if self.status_filter_default.trim().is_empty() {
            warnings.push(
                "retrieval.statusFilterDefault is empty; only documents without status pass filters"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

// ============================================================================
// AnswerConfig
// ============================================================================

/// Answer assembly configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerConfig {
    /// Characters kept from each document in its evidence excerpt. Default: 800
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// System prompt override; the built-in prompt is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_excerpt_chars() -> usize {
    EVIDENCE_EXCERPT_CHARS
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: default_excerpt_chars(),
            system_prompt: None,
        }
    }
}

impl AnswerConfig {
    /// Validates the answer configuration.
    ///
    /// # Errors
    /// - `excerptChars == 0`
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        let mut warnings = Vec::new();

        if self.excerpt_chars == 0 {
            return Err(NormativaError::InvalidConfiguration {
                message: "answer.excerptChars cannot be 0".to_string(),
                hint: "Set excerptChars to a positive value (recommended: 800)".to_string(),
            });
        }

        if self
            .system_prompt
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            warnings.push("answer.systemPrompt is empty; the generator gets no system prompt".to_string());
        }

        Ok(warnings)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = NormativaConfig::default();
        assert_eq!(config.retrieval.default_k, 5);
        assert_eq!(config.retrieval.max_k, 20);
        assert!(!config.retrieval.use_reranker);
        assert_eq!(config.retrieval.status_filter_default, "Vigente");
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
        assert_eq!(config.answer.excerpt_chars, 800);
        assert!(config.query_expansion.is_empty());
    }

    #[test]
    fn test_parse_camel_case_yaml() {
        let yaml = r#"
corpus: data/corpus.jsonl
retrieval:
  vectorWeight: 0.7
  bm25Weight: 0.3
  useReranker: true
  defaultK: 3
bm25:
  k1: 1.5
  stemming: true
vector:
  metric: dot
queryExpansion:
  - patterns: ['\bprazo\b']
    append: entregas
"#;
        let config: NormativaConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retrieval.vector_weight, 0.7);
        assert!(config.retrieval.use_reranker);
        assert_eq!(config.retrieval.default_k, 3);
        assert_eq!(config.retrieval.max_k, 20);
        assert_eq!(config.bm25.k1, 1.5);
        assert_eq!(config.bm25.b, 0.75);
        assert_eq!(config.query_expansion.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = NormativaConfig::from_path(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.retrieval.default_k, DEFAULT_K);
        assert!(config.corpus.is_none());
    }

    #[test]
    fn test_relative_corpus_resolves_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "corpus: corpus.jsonl\n").unwrap();

        let config = NormativaConfig::from_path(&path).unwrap();
        assert_eq!(config.corpus, Some(dir.path().join("corpus.jsonl")));
    }

    #[test]
    fn test_malformed_file_is_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "retrieval: [not, a, map]\n").unwrap();

        let err = NormativaConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, NormativaError::InvalidConfigFile(_)));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut config = NormativaConfig::default();
        config.retrieval.vector_weight = 0.8;
        config.retrieval.bm25_weight = 0.8;
        assert!(matches!(
            config.validate(),
            Err(NormativaError::InvalidConfiguration { .. })
        ));

        config.retrieval.vector_weight = 1.2;
        config.retrieval.bm25_weight = -0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weight_sum_tolerance() {
        let config = RetrievalConfig {
            vector_weight: 0.6,
            bm25_weight: 0.405,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_k_bounds() {
        let config = RetrievalConfig {
            default_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            default_k: 51,
            max_k: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            max_k: 101,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            default_k: 30,
            max_k: 20,
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("defaultK=30")));
    }

    #[test]
    fn test_similarity_threshold_bounds() {
        let config = RetrievalConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_expansion_rule_rejected() {
        let mut config = NormativaConfig::default().with_corpus("c.jsonl");
        config.query_expansion = vec![QueryExpansionRule::new(vec!["(".to_string()], "x")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_corpus_is_warning() {
        let warnings = NormativaConfig::default().validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("corpus")));
    }

    #[test]
    fn test_zero_excerpt_chars_rejected() {
        let config = AnswerConfig {
            excerpt_chars: 0,
            system_prompt: None,
        };
        assert!(config.validate().is_err());
    }
}
