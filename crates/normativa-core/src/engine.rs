//! Normativa Engine – wires the corpus, retriever and answer service together.
//!
//! The [`NormativaEngine`] is the main entry point for library consumers and
//! the `normativa` CLI. It owns the loaded configuration and corpus snapshot,
//! builds the lexical and vector indexes once, and hands out the retriever
//! and answer service.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::answer::{AnswerGenerator, AnswerResult, AnswerService, AskRequest, Evaluation};
use crate::config::NormativaConfig;
use crate::corpus::CorpusSnapshot;
use crate::embedding::{EmbeddingBackend, HashingEmbeddingBackend};
use crate::errors::NormativaError;
use crate::query_expansion::QueryExpander;
use crate::reranker::create_default_backend;
use crate::retriever::HybridRetriever;
use crate::types::{RetrievalDiagnostics, RetrievalRequest, RetrievalResult};
use crate::validator::ConfidenceValidator;
use crate::vector_index::{InMemoryVectorIndex, VectorSearcher};

// ============================================================================
// NormativaEngine
// ============================================================================

/// The main engine for Normativa operations.
///
/// # Construction
///
/// Use [`NormativaEngine::with_defaults`] to load `~/.normativa/config.yaml`,
/// [`NormativaEngine::with_config`] for an explicit file, or
/// [`NormativaEngine::from_snapshot`] with an in-memory corpus.
///
/// # Example
///
/// ```ignore
/// use normativa_core::{AskRequest, NormativaEngine};
///
/// let engine = NormativaEngine::with_defaults()?;
/// let result = engine.ask(&AskRequest::new("Qual o prazo de entrega do relatório?"))?;
/// println!("{} ({})", result.answer, result.confidence);
/// ```
#[derive(Debug)]
pub struct NormativaEngine {
    config: NormativaConfig,
    corpus: Arc<CorpusSnapshot>,
    retriever: Arc<HybridRetriever>,
    answers: AnswerService,
}

impl NormativaEngine {
    /// Create an engine from a configuration, loading the configured corpus.
    ///
    /// Configuration warnings are logged; configuration errors fail.
    ///
    /// # Errors
    ///
    /// - `CorpusNotConfigured` if `corpus` is unset
    /// - `CorpusNotFound` / `InvalidCorpus` if the snapshot cannot be loaded
    /// - `InvalidConfiguration` for out-of-range settings
    pub fn from_config(config: NormativaConfig) -> anyhow::Result<Self> {
        let path = config
            .corpus
            .clone()
            .ok_or(NormativaError::CorpusNotConfigured)?;
        let snapshot = CorpusSnapshot::from_jsonl(&path)?;
        Ok(Self::from_snapshot(config, snapshot)?)
    }

    /// Create an engine using the default configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or if the
    /// corpus cannot be loaded.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let config = NormativaConfig::load_default()?;
        Self::from_config(config)
    }

    /// Create an engine from a specific config file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config.yaml file
    pub fn with_config(path: &Path) -> anyhow::Result<Self> {
        let config = NormativaConfig::from_path(path)?;
        Self::from_config(config)
    }

    /// Create an engine over an already loaded corpus.
    ///
    /// Embeds the corpus with the hashing embedder, builds both indexes and
    /// attaches the default reranker when `retrieval.useReranker` is set.
    pub fn from_snapshot(
        config: NormativaConfig,
        snapshot: CorpusSnapshot,
    ) -> Result<Self, NormativaError> {
        let start = Instant::now();
        for warning in config.validate()? {
            tracing::warn!("Config warning: {}", warning);
        }

        let corpus = Arc::new(snapshot);
        let embedder: Arc<dyn EmbeddingBackend> =
            Arc::new(HashingEmbeddingBackend::new(config.vector.dimension));
        let index = InMemoryVectorIndex::build(
            embedder.as_ref(),
            config.vector.metric,
            corpus.shared_documents(),
        )?;
        let searcher = VectorSearcher::new(embedder, Arc::new(index));

        let mut retriever = HybridRetriever::new(config.retrieval.clone(), config.bm25.clone())?
            .with_vector_searcher(searcher)
            .with_corpus(Arc::clone(&corpus));
        if config.retrieval.use_reranker {
            retriever = retriever.with_reranker(create_default_backend());
        }
        let indexed = retriever.initialize_lexical_index(None)?;
        let retriever = Arc::new(retriever);

        let validator = ConfidenceValidator::new(&config.validator)?;
        let expander = QueryExpander::new(&config.query_expansion)?;
        let answers = AnswerService::new(
            Arc::clone(&retriever),
            validator,
            expander,
            config.answer.clone(),
        );

        info!(
            "Engine ready: {} documents indexed in {:?}",
            indexed,
            start.elapsed()
        );

        Ok(Self {
            config,
            corpus,
            retriever,
            answers,
        })
    }

    /// Replace the answer generator.
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.answers = self.answers.with_generator(generator);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The configuration the engine was built from.
    pub fn config(&self) -> &NormativaConfig {
        &self.config
    }

    /// The loaded corpus.
    pub fn corpus(&self) -> &CorpusSnapshot {
        &self.corpus
    }

    /// Shared handle to the retriever.
    pub fn retriever(&self) -> &Arc<HybridRetriever> {
        &self.retriever
    }

    /// The answer service.
    pub fn answers(&self) -> &AnswerService {
        &self.answers
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Readiness snapshot of the retriever.
    pub fn diagnostics(&self) -> RetrievalDiagnostics {
        self.retriever.get_diagnostics()
    }

    /// Run a retrieval request.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult, NormativaError> {
        self.retriever.retrieve(request)
    }

    /// Answer a question.
    pub fn ask(&self, request: &AskRequest) -> Result<AnswerResult, NormativaError> {
        self.answers.answer(request)
    }

    /// Grade an externally produced answer against freshly retrieved evidence.
    pub fn evaluate(&self, request: &AskRequest, answer: &str) -> Result<Evaluation, NormativaError> {
        self.answers.evaluate(request, answer)
    }

    /// Rebuild the lexical index from the loaded corpus.
    ///
    /// Readers keep the previous index until the rebuilt one is published.
    pub fn reindex(&self) -> Result<usize, NormativaError> {
        let count = self
            .retriever
            .initialize_lexical_index(Some(self.corpus.shared_documents()))?;
        debug!("Reindexed {} documents", count);
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::types::{Document, DocumentMetadata, RetrievalStrategy};

    const CORPUS: &str = r#"{"content":"O relatório mensal de avanço físico deve ser entregue até o dia 10.","metadata":{"source":"Resolução 1","page":2,"type":"Resolução","precedence":1}}
{"content":"O verificador independente emite parecer trimestral.","metadata":{"source":"Portaria 7","status":"Vigente"}}

{"content":"O relatório anual revogado era entregue até o dia 30.","metadata":{"source":"Resolução 0","status":"Revogado"}}
"#;

    fn write_corpus(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("corpus.jsonl");
        fs::write(&path, CORPUS).unwrap();
        path
    }

    fn create_engine() -> NormativaEngine {
        let snapshot = CorpusSnapshot::from_documents(vec![
            Document::new(
                "O relatório mensal de avanço físico deve ser entregue até o dia 10.",
                DocumentMetadata::default().with_source("Resolução 1"),
            ),
            Document::new(
                "O verificador independente emite parecer trimestral.",
                DocumentMetadata::default().with_source("Portaria 7"),
            ),
        ]);
        NormativaEngine::from_snapshot(NormativaConfig::default(), snapshot).unwrap()
    }

    #[test]
    fn test_from_config_without_corpus_fails() {
        let err = NormativaEngine::from_config(NormativaConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NormativaError>(),
            Some(NormativaError::CorpusNotConfigured)
        ));
    }

    #[test]
    fn test_with_config_loads_relative_corpus() {
        let temp = TempDir::new().unwrap();
        write_corpus(&temp);
        let config_path = temp.path().join("config.yaml");
        fs::write(&config_path, "corpus: corpus.jsonl\n").unwrap();

        let engine = NormativaEngine::with_config(&config_path).unwrap();
        assert_eq!(engine.corpus().len(), 3);

        let diagnostics = engine.diagnostics();
        assert!(diagnostics.lexical_ready);
        assert!(diagnostics.vector_ready);
        assert!(!diagnostics.reranker_enabled);
        assert_eq!(diagnostics.corpus_size, 3);
    }

    #[test]
    fn test_missing_corpus_file() {
        let temp = TempDir::new().unwrap();
        let config = NormativaConfig::default().with_corpus(temp.path().join("absent.jsonl"));
        let err = NormativaEngine::from_config(config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NormativaError>(),
            Some(NormativaError::CorpusNotFound(_))
        ));
    }

    #[test]
    fn test_reranker_attached_when_enabled() {
        let mut config = NormativaConfig::default();
        config.retrieval.use_reranker = true;
        let engine = NormativaEngine::from_snapshot(config, CorpusSnapshot::default()).unwrap();
        assert!(engine.diagnostics().reranker_enabled);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = NormativaConfig::default();
        config.retrieval.vector_weight = 2.0;
        assert!(NormativaEngine::from_snapshot(config, CorpusSnapshot::default()).is_err());
    }

    #[test]
    fn test_governance_excludes_revoked() {
        let temp = TempDir::new().unwrap();
        let config = NormativaConfig::default().with_corpus(write_corpus(&temp));
        let engine = NormativaEngine::from_config(config).unwrap();

        let result = engine
            .retrieve(
                &RetrievalRequest::new("relatório entregue")
                    .with_strategy(RetrievalStrategy::Bm25Only),
            )
            .unwrap();
        assert!(!result.is_empty());
        assert!(result
            .documents
            .iter()
            .all(|d| d.metadata.source.as_deref() != Some("Resolução 0")));
    }

    #[test]
    fn test_ask_end_to_end() {
        let engine = create_engine();
        let result = engine
            .ask(&AskRequest::new("Quando o relatório deve ser entregue?"))
            .unwrap();
        assert!(!result.evidence.is_empty());
        assert_eq!(result.evidence[0].source, "Resolução 1");
        assert!(result.answer.contains("[1]"));
        assert_eq!(result.component_scores.len(), 3);
    }

    #[test]
    fn test_reindex_keeps_size() {
        let engine = create_engine();
        assert_eq!(engine.reindex().unwrap(), 2);
        assert_eq!(engine.diagnostics().corpus_size, 2);
    }
}
