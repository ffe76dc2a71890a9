//! Error types for normativa-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for retrieval, fusion and answer assembly.
///
/// An empty result set is never an error: zero documents after filtering is a
/// valid terminal state that the answer stage reports as "no evidence".
#[derive(Error, Debug)]
pub enum NormativaError {
    // =========================================================================
    // Retrieval Errors
    // =========================================================================
    /// Lexical search was requested before the index was built.
    ///
    /// Recoverable by calling `initialize_lexical_index`.
    #[error("Lexical index not ready. Call `initialize_lexical_index` before BM25 retrieval.")]
    IndexNotReady,

    /// An external backend (vector index, embedder, reranker) is missing or failed.
    #[error("Backend `{backend}` unavailable: {reason}")]
    BackendUnavailable {
        /// Which backend failed (e.g. "vector", "reranker").
        backend: String,
        /// Description of the failure.
        reason: String,
    },

    /// Unknown retrieval strategy value.
    #[error("Invalid retrieval strategy `{0}`. Valid values: vector_only, bm25_only, hybrid, hybrid_rerank.")]
    InvalidStrategy(String),

    /// The request was cancelled between two stages.
    #[error("Retrieval cancelled before stage `{stage}`")]
    Cancelled {
        /// The stage that did not start.
        stage: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Configuration file exists but could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfigFile(String),

    // =========================================================================
    // Corpus Errors
    // =========================================================================
    /// The corpus snapshot file was not found.
    #[error("Corpus snapshot not found at {0}")]
    CorpusNotFound(PathBuf),

    /// No corpus snapshot was configured.
    #[error("No corpus configured. Pass --corpus, set NORMATIVA_CORPUS, or set `corpus` in config.yaml.")]
    CorpusNotConfigured,

    /// A line of the corpus snapshot could not be parsed.
    #[error("Invalid corpus entry at {path}:{line}: {reason}")]
    InvalidCorpus {
        /// Path to the snapshot file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Description of the failure.
        reason: String,
    },

    // =========================================================================
    // Answer Errors
    // =========================================================================
    /// The answer generator failed.
    #[error("Answer generation failed: {reason}")]
    Generation {
        /// Description of the failure.
        reason: String,
    },

    /// Invalid argument provided by the caller.
    #[error("{0}")]
    InvalidArgument(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NormativaError {
    /// Shorthand for a [`NormativaError::BackendUnavailable`].
    pub fn backend_unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Whether a hybrid strategy may degrade instead of failing on this error.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. } | Self::IndexNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unavailable_message() {
        let err = NormativaError::backend_unavailable("reranker", "model missing");
        assert_eq!(
            err.to_string(),
            "Backend `reranker` unavailable: model missing"
        );
        assert!(err.is_degradable());
    }

    #[test]
    fn test_invalid_strategy_is_not_degradable() {
        let err = NormativaError::InvalidStrategy("fuzzy".to_string());
        assert!(err.to_string().contains("fuzzy"));
        assert!(!err.is_degradable());
    }
}
