//! Retrieval orchestrator.
//!
//! [`HybridRetriever`] is the application context for retrieval: it is built
//! once at startup, shared by reference, and dispatches each request to one
//! of four strategies.
//!
//! ## Strategies
//!
//! | Strategy | Pipeline |
//! |----------|----------|
//! | `vector_only` | vector search, top-k |
//! | `bm25_only` | lexical search, top-k, min-max normalized |
//! | `hybrid` | both paths with `2k` candidates in parallel, normalize, fuse, top-k |
//! | `hybrid_rerank` | hybrid keeping `2k` fused candidates, rerank to k |
//!
//! Governance filters run after the strategy when criteria are supplied.
//! They never reach the search paths, so the scores of surviving documents
//! do not depend on which filters were sent.
//!
//! ## Degradation
//!
//! Hybrid strategies never fail because one side is missing: an unbuilt
//! lexical index or a missing/failing vector backend falls back to the other
//! side with a warning, and a failing reranker falls back to uniform 1.0
//! scores. Only when both sides are unavailable does the request fail with
//! `IndexNotReady`. The single-path strategies fail instead of degrading.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bm25::{Bm25Config, SharedBm25Index};
use crate::cancel::CancellationToken;
use crate::config::RetrievalConfig;
use crate::corpus::CorpusSnapshot;
use crate::errors::NormativaError;
use crate::fusion::{normalize_scored, weighted_fusion, FusionWeights};
use crate::governance::GovernancePipeline;
use crate::reranker::{rerank, uniform_scores, RerankerBackend};
use crate::types::{
    Document, RetrievalDiagnostics, RetrievalRequest, RetrievalResult, RetrievalStrategy,
    ScoredDocument, StageDiagnostics,
};
use crate::vector_index::VectorSearcher;

/// Hybrid strategies fetch this many candidates per requested document.
const CANDIDATE_MULTIPLIER: usize = 2;

// ============================================================================
// HybridRetriever
// ============================================================================

/// Retrieval application context.
pub struct HybridRetriever {
    config: RetrievalConfig,
    bm25_config: Bm25Config,
    weights: FusionWeights,
    lexical: SharedBm25Index,
    vector: Option<VectorSearcher>,
    reranker: Option<Arc<dyn RerankerBackend>>,
    governance: GovernancePipeline,
    corpus: Option<Arc<CorpusSnapshot>>,
}

impl HybridRetriever {
    /// Create a retriever with no backends attached.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the retrieval configuration is invalid.
    pub fn new(config: RetrievalConfig, bm25_config: Bm25Config) -> Result<Self, NormativaError> {
        for warning in config.validate()? {
            warn!("Config warning: {}", warning);
        }
        let weights = config.weights();
        let governance = GovernancePipeline::new(config.status_filter_default.clone());

        Ok(Self {
            config,
            bm25_config,
            weights,
            lexical: SharedBm25Index::new(),
            vector: None,
            reranker: None,
            governance,
            corpus: None,
        })
    }

    /// Attach the vector adapter, applying the configured similarity threshold.
    pub fn with_vector_searcher(mut self, searcher: VectorSearcher) -> Self {
        self.vector = Some(searcher.with_similarity_threshold(self.config.similarity_threshold));
        self
    }

    /// Attach a reranker backend.
    pub fn with_reranker(mut self, reranker: Arc<dyn RerankerBackend>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Attach the corpus snapshot used for lexical (re)builds.
    pub fn with_corpus(mut self, corpus: Arc<CorpusSnapshot>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Retrieval configuration in use.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Shared lexical index handle.
    pub fn lexical_index(&self) -> &SharedBm25Index {
        &self.lexical
    }

    // ------------------------------------------------------------------------
    // Lexical index lifecycle
    // ------------------------------------------------------------------------

    /// Build the lexical index and publish it.
    ///
    /// Without `documents`, indexes the vector adapter's snapshot, or the
    /// attached corpus when no vector adapter is present. Concurrent readers
    /// keep using the previous index until the new one is published.
    ///
    /// Returns the number of indexed documents.
    ///
    /// # Errors
    ///
    /// `CorpusNotConfigured` when no documents are given and none are attached.
    pub fn initialize_lexical_index(
        &self,
        documents: Option<Vec<Arc<Document>>>,
    ) -> Result<usize, NormativaError> {
        let documents = match documents {
            Some(documents) => documents,
            None => {
                if let Some(vector) = &self.vector {
                    vector.documents().to_vec()
                } else if let Some(corpus) = &self.corpus {
                    corpus.shared_documents()
                } else {
                    return Err(NormativaError::CorpusNotConfigured);
                }
            }
        };

        Ok(self.lexical.rebuild(&self.bm25_config, documents))
    }

    /// Readiness snapshot.
    pub fn get_diagnostics(&self) -> RetrievalDiagnostics {
        RetrievalDiagnostics {
            lexical_ready: self.lexical.is_ready(),
            vector_ready: self.vector.is_some(),
            reranker_enabled: self.reranker.is_some(),
            corpus_size: self.lexical.len(),
            weights: self.weights,
        }
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// Run a retrieval request.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult, NormativaError> {
        self.retrieve_with_cancel(request, &CancellationToken::new())
    }

    /// Run a retrieval request, checking `cancel` between stages.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty query or `k == 0`
    /// - `IndexNotReady` / `BackendUnavailable` per strategy
    /// - `Cancelled` when the token fires; no partial results are returned
    pub fn retrieve_with_cancel(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult, NormativaError> {
        let start = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(NormativaError::InvalidArgument(
                "Query cannot be empty".to_string(),
            ));
        }

        let mut diagnostics = StageDiagnostics {
            query: query.to_string(),
            ..Default::default()
        };
        let k = self.effective_k(request.k, &mut diagnostics)?;
        diagnostics.k = k;

        let strategy = request.strategy;
        cancel.check("search")?;

        let scored = match strategy {
            RetrievalStrategy::VectorOnly => {
                let vector = self.vector_search(query, k, &mut diagnostics)?;
                diagnostics.vector_candidates = Some(vector.len());
                vector
            }
            RetrievalStrategy::Bm25Only => {
                let lexical = self.lexical_search(query, k, &mut diagnostics)?;
                diagnostics.lexical_candidates = Some(lexical.len());
                normalize_scored(lexical)
            }
            RetrievalStrategy::Hybrid => self.hybrid(query, k, k, &mut diagnostics, cancel)?,
            RetrievalStrategy::HybridRerank => {
                let shortlist = k * CANDIDATE_MULTIPLIER;
                let fused = self.hybrid(query, k, shortlist, &mut diagnostics, cancel)?;
                cancel.check("rerank")?;
                self.rerank_stage(query, fused, k, &mut diagnostics)
            }
        };

        let scored = match &request.filters {
            Some(criteria) => {
                cancel.check("governance")?;
                let (kept, report) = self.governance.apply(scored, criteria);
                debug!(
                    "Governance filters removed {} of {} documents",
                    report.removed(),
                    report.input
                );
                diagnostics.governance = Some(report);
                kept
            }
            None => scored,
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Retrieved {} documents with {} in {:.1}ms",
            scored.len(),
            strategy,
            elapsed_ms
        );

        Ok(RetrievalResult::from_scored(
            scored,
            strategy,
            elapsed_ms,
            diagnostics,
        ))
    }

    /// Resolve the request's k against `defaultK` and `maxK`.
    fn effective_k(
        &self,
        requested: Option<usize>,
        diagnostics: &mut StageDiagnostics,
    ) -> Result<usize, NormativaError> {
        let k = requested.unwrap_or(self.config.default_k);
        if k == 0 {
            return Err(NormativaError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        if k > self.config.max_k {
            let message = format!("k={} exceeds maxK={}; capped", k, self.config.max_k);
            warn!("{}", message);
            diagnostics.warnings.push(message);
            return Ok(self.config.max_k);
        }
        Ok(k)
    }

    fn lexical_search(
        &self,
        query: &str,
        top_k: usize,
        diagnostics: &mut StageDiagnostics,
    ) -> Result<Vec<ScoredDocument>, NormativaError> {
        let start = Instant::now();
        let results = self.lexical.search(query, top_k)?;
        diagnostics.lexical_time_ms = Some(start.elapsed().as_millis() as u64);
        Ok(results)
    }

    fn vector_search(
        &self,
        query: &str,
        top_k: usize,
        diagnostics: &mut StageDiagnostics,
    ) -> Result<Vec<ScoredDocument>, NormativaError> {
        let start = Instant::now();
        let results = self.search_vector_backend(query, top_k)?;
        diagnostics.vector_time_ms = Some(start.elapsed().as_millis() as u64);
        Ok(results)
    }

    fn search_vector_backend(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, NormativaError> {
        match &self.vector {
            Some(searcher) => searcher.search(query, top_k),
            None => Err(NormativaError::backend_unavailable(
                "vector",
                "no vector backend attached",
            )),
        }
    }

    /// Run both paths concurrently, normalize, fuse, keep `keep` documents.
    fn hybrid(
        &self,
        query: &str,
        k: usize,
        keep: usize,
        diagnostics: &mut StageDiagnostics,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredDocument>, NormativaError> {
        let fetch = k * CANDIDATE_MULTIPLIER;

        let ((lexical, lexical_ms), (vector, vector_ms)) = rayon::join(
            || {
                let start = Instant::now();
                let result = self.lexical.search(query, fetch);
                (result, start.elapsed().as_millis() as u64)
            },
            || {
                let start = Instant::now();
                let result = self.search_vector_backend(query, fetch);
                (result, start.elapsed().as_millis() as u64)
            },
        );
        diagnostics.lexical_time_ms = Some(lexical_ms);
        diagnostics.vector_time_ms = Some(vector_ms);

        let lexical = degrade("Lexical index", lexical, diagnostics)?;
        let vector = degrade("Vector backend", vector, diagnostics)?;
        diagnostics.lexical_candidates = lexical.as_ref().map(Vec::len);
        diagnostics.vector_candidates = vector.as_ref().map(Vec::len);

        cancel.check("fusion")?;

        let fused = match (vector, lexical) {
            (Some(vector), Some(lexical)) => weighted_fusion(
                &normalize_scored(vector),
                &normalize_scored(lexical),
                self.weights,
                keep,
            ),
            (Some(mut vector), None) => {
                vector.truncate(keep);
                vector
            }
            (None, Some(lexical)) => {
                let mut lexical = normalize_scored(lexical);
                lexical.truncate(keep);
                lexical
            }
            (None, None) => return Err(NormativaError::IndexNotReady),
        };

        diagnostics.fused_candidates = Some(fused.len());
        Ok(fused)
    }

    /// Rerank the shortlist down to k, degrading to uniform scores on failure.
    ///
    /// The backend runs on the rayon pool, like the two search paths.
    fn rerank_stage(
        &self,
        query: &str,
        candidates: Vec<ScoredDocument>,
        k: usize,
        diagnostics: &mut StageDiagnostics,
    ) -> Vec<ScoredDocument> {
        let start = Instant::now();

        let reranked = match self.reranker.as_deref() {
            Some(backend) => match rerank_on_pool(query, &candidates, k, backend) {
                Ok(reranked) => {
                    diagnostics.reranker_used = true;
                    reranked
                }
                Err(e) => {
                    let message = format!("Reranking failed, keeping fused order: {}", e);
                    warn!("{}", message);
                    diagnostics.warnings.push(message);
                    diagnostics.reranker_degraded = true;
                    uniform_scores(candidates, k)
                }
            },
            None => {
                let message = "No reranker attached, keeping fused order".to_string();
                debug!("{}", message);
                diagnostics.warnings.push(message);
                diagnostics.reranker_degraded = true;
                uniform_scores(candidates, k)
            }
        };

        diagnostics.rerank_time_ms = Some(start.elapsed().as_millis() as u64);
        reranked
    }
}

/// Run the reranker backend on a rayon worker and wait for it.
fn rerank_on_pool(
    query: &str,
    candidates: &[ScoredDocument],
    k: usize,
    backend: &dyn RerankerBackend,
) -> Result<Vec<ScoredDocument>, NormativaError> {
    let mut outcome = Err(NormativaError::backend_unavailable(
        "reranker",
        "rerank task did not run",
    ));
    rayon::scope(|scope| {
        scope.spawn(|_| outcome = rerank(query, candidates.to_vec(), k, Some(backend)));
    });
    outcome
}

/// Turn a degradable failure into `None` with a warning; propagate the rest.
fn degrade(
    side: &str,
    result: Result<Vec<ScoredDocument>, NormativaError>,
    diagnostics: &mut StageDiagnostics,
) -> Result<Option<Vec<ScoredDocument>>, NormativaError> {
    match result {
        Ok(documents) => Ok(Some(documents)),
        Err(e) if e.is_degradable() => {
            let message = format!("{} unavailable, continuing without it: {}", side, e);
            warn!("{}", message);
            diagnostics.warnings.push(message);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("config", &self.config)
            .field("lexical_ready", &self.lexical.is_ready())
            .field("vector", &self.vector.is_some())
            .field("reranker", &self.reranker.as_ref().map(|r| r.model_id().to_string()))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
