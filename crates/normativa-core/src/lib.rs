//! # normativa-core
//!
//! **Normativa** – hybrid retrieval, relevance fusion and confidence
//! validation for question answering over regulatory documents.
//!
//! This crate provides the retrieval engine, the answer pipeline and the
//! confidence validator. It is designed to be consumed by the `normativa`
//! CLI and other Rust tools.
//!
//! ## Main Types
//!
//! - [`NormativaEngine`] – the main entry point, built from configuration
//! - [`HybridRetriever`] – BM25 + vector retrieval with fusion, reranking and governance
//! - [`ConfidenceValidator`] – grades generated answers into confidence levels
//! - [`NormativaError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`bm25`] – lexical index
//! - [`vector_index`] / [`embedding`] – vector search adapter
//! - [`fusion`] – min-max normalization and weighted fusion
//! - [`reranker`] – optional cross-encoder style reranking
//! - [`governance`] – status, precedence, validity and type filters
//! - [`retriever`] – strategy orchestration
//! - [`validator`] – answer confidence scoring
//! - [`answer`] – retrieval → generation → validation pipeline
//!
//! ## Example
//!
//! ```ignore
//! use normativa_core::{NormativaEngine, RetrievalRequest, RetrievalStrategy};
//!
//! let engine = NormativaEngine::with_defaults()?;
//! let result = engine.retrieve(
//!     &RetrievalRequest::new("prazo do relatório mensal")
//!         .with_k(5)
//!         .with_strategy(RetrievalStrategy::Hybrid),
//! )?;
//! for (doc, score) in result.iter() {
//!     println!("{:.3} {:?}", score, doc.metadata.source);
//! }
//! ```

// Modules
pub mod answer;
pub mod bm25;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod governance;
pub mod prompt;
pub mod query_expansion;
pub mod reranker;
pub mod retriever;
pub mod types;
pub mod validator;
pub mod vector_index;

// Re-exports for convenience

pub use answer::{
    evidence_from_document, normalize_question, prepare_evidence, AnswerGenerator, AnswerMetadata,
    AnswerResult, AnswerService, AskRequest, Evaluation, ExtractiveAnswerGenerator,
    GeneratedAnswer, GenerationRequest,
};
pub use bm25::{Bm25Config, Bm25Index, Bm25SearchResult, SharedBm25Index};
pub use cancel::CancellationToken;
pub use config::{AnswerConfig, NormativaConfig, RetrievalConfig};
pub use constants::{CONFIG_FILENAME, DEFAULT_DOCUMENT_STATUS, NORMATIVA_HOME_DIR};
pub use corpus::CorpusSnapshot;
pub use embedding::{EmbeddingBackend, HashingEmbeddingBackend};
pub use engine::NormativaEngine;
pub use errors::NormativaError;
pub use fusion::{normalize_scored, normalize_scores, weighted_fusion, FusionWeights};
pub use governance::{GovernanceCriteria, GovernancePipeline, GovernanceReport};
pub use prompt::{build_context, extract_reasoning, format_answer_prompt, DEFAULT_SYSTEM_PROMPT};
pub use query_expansion::{QueryExpander, QueryExpansionRule};
pub use reranker::{create_default_backend, RerankerBackend, TermOverlapReranker};
pub use retriever::HybridRetriever;
pub use types::{
    ConfidenceLevel, Document, DocumentId, DocumentMetadata, Evidence, RetrievalDiagnostics,
    RetrievalRequest, RetrievalResult, RetrievalStrategy, ScoreOrigin, ScoredDocument,
    StageDiagnostics, ValidationResult,
};
pub use validator::{ConfidenceValidator, QuestionValidation, ValidatorConfig};
pub use vector_index::{
    InMemoryVectorIndex, VectorConfig, VectorHit, VectorIndexBackend, VectorMetric, VectorSearcher,
};
