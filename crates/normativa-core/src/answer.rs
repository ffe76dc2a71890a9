//! Answer assembly: retrieval, evidence, generation and validation.
//!
//! [`AnswerService::answer`] turns a question into an [`AnswerResult`]:
//!
//! 1. Normalize and length-check the question
//! 2. Expand the query and retrieve documents
//! 3. Convert documents into [`Evidence`]
//! 4. Build the prompt and call the [`AnswerGenerator`]
//! 5. Grade the answer with the [`ConfidenceValidator`]
//! 6. Emit an audit event
//!
//! Fixed refusal answers (invalid question, no documents, generation
//! failure) are returned as results with `INSUFICIENTE` confidence, not as
//! errors. Retrieval errors are propagated.
//!
//! The generation model is an external collaborator behind
//! [`AnswerGenerator`]; [`ExtractiveAnswerGenerator`] is the built-in
//! deterministic implementation.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AnswerConfig;
use crate::constants::{
    DEFAULT_EVIDENCE_TYPE, FEW_DOCUMENTS_WARNING, GENERATION_ERROR_PREFIX,
    INVALID_QUESTION_ANSWER, INVALID_QUESTION_WARNING, MAX_QUESTION_CHARS, MIN_QUESTION_CHARS,
    NO_DOCUMENTS_ANSWER, NO_DOCUMENTS_WARNING, UNKNOWN_SOURCE,
};
use crate::errors::NormativaError;
use crate::governance::GovernanceCriteria;
use crate::prompt::{build_context, extract_reasoning, format_answer_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::query_expansion::QueryExpander;
use crate::retriever::HybridRetriever;
use crate::types::{
    ConfidenceLevel, Document, Evidence, RetrievalRequest, RetrievalResult, RetrievalStrategy,
    ValidationResult,
};
use crate::validator::ConfidenceValidator;

/// Longest sentence quoted by the extractive generator, in characters.
const MAX_QUOTE_CHARS: usize = 300;

// ============================================================================
// Generation Contract
// ============================================================================

/// Input to an [`AnswerGenerator`].
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user's question.
    pub question: String,
    /// System prompt.
    pub system_prompt: String,
    /// Fully formatted user prompt.
    pub prompt: String,
    /// Numbered evidence the prompt was built from.
    pub evidence: Vec<Evidence>,
    /// Whether a reasoning section was requested.
    pub include_reasoning: bool,
}

/// Output of an [`AnswerGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAnswer {
    /// Answer text.
    pub text: String,
    /// Model that produced it.
    pub model: String,
    /// Tokens consumed, when the model reports them.
    pub tokens: usize,
}

/// Trait for answer generation backends.
///
/// Implementations must be thread-safe.
pub trait AnswerGenerator: Send + Sync {
    /// Identifier of the generating model.
    fn model_id(&self) -> &str;

    /// Produce an answer for a prepared prompt.
    fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAnswer, NormativaError>;
}

// ============================================================================
// ExtractiveAnswerGenerator
// ============================================================================

/// Deterministic generator quoting the first sentence of each evidence.
///
/// Every quote carries its `[n]` citation, so its output is always grounded
/// in the context it was given.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveAnswerGenerator;

impl ExtractiveAnswerGenerator {
    /// Model identifier reported in answer metadata.
    pub const MODEL_ID: &'static str = "extractive-v1";

    /// Create the generator.
    pub fn new() -> Self {
        Self
    }
}

impl AnswerGenerator for ExtractiveAnswerGenerator {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAnswer, NormativaError> {
        let quotes: Vec<String> = request
            .evidence
            .iter()
            .enumerate()
            .filter_map(|(i, e)| first_sentence(&e.excerpt).map(|s| format!("- {} [{}]", s, i + 1)))
            .collect();

        if quotes.is_empty() {
            return Err(NormativaError::Generation {
                reason: "evidence has no quotable text".to_string(),
            });
        }

        let mut text = format!(
            "Com base nos documentos consultados:\n\n{}",
            quotes.join("\n")
        );

        if request.include_reasoning {
            let sources: Vec<String> = request
                .evidence
                .iter()
                .enumerate()
                .map(|(i, e)| format!("[{}] {}", i + 1, e.source))
                .collect();
            text.push_str(&format!(
                "\n\nRaciocínio: Trechos extraídos literalmente de {}.",
                sources.join(", ")
            ));
        }

        let tokens = text.split_whitespace().count();
        Ok(GeneratedAnswer {
            text,
            model: Self::MODEL_ID.to_string(),
            tokens,
        })
    }
}

/// First sentence of `text`, whitespace-collapsed and capped.
fn first_sentence(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let end = collapsed
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | ';' | '!' | '?') && collapsed[i + c.len_utf8()..].starts_with(' ')
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(collapsed.len());

    let sentence = &collapsed[..end];
    if sentence.chars().count() > MAX_QUOTE_CHARS {
        let cut: String = sentence.chars().take(MAX_QUOTE_CHARS).collect();
        Some(format!("{}…", cut.trim_end()))
    } else {
        Some(sentence.to_string())
    }
}

// ============================================================================
// Requests and Results
// ============================================================================

/// A question to answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The question.
    pub question: String,

    /// Documents to retrieve; `None` uses `defaultK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,

    /// Retrieval strategy. Takes precedence over `method`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<RetrievalStrategy>,

    /// Legacy method name (`vector`, `bm25`, `hybrid`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Governance criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<GovernanceCriteria>,

    /// Ask the generator for a reasoning section.
    #[serde(default)]
    pub include_reasoning: bool,
}

impl AskRequest {
    /// Create a request with default options.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// Set the number of documents.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set the retrieval strategy.
    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the legacy method name.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set governance criteria.
    pub fn with_filters(mut self, filters: GovernanceCriteria) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Request a reasoning section.
    pub fn with_reasoning(mut self, include: bool) -> Self {
        self.include_reasoning = include;
        self
    }

    /// Strategy to use: `strategy`, else the legacy `method`, else `hybrid_rerank`.
    ///
    /// # Errors
    ///
    /// `InvalidStrategy` for an unknown `method`.
    pub fn resolve_strategy(&self) -> Result<RetrievalStrategy, NormativaError> {
        match (&self.strategy, &self.method) {
            (Some(strategy), _) => Ok(*strategy),
            (None, Some(method)) => RetrievalStrategy::from_legacy_method(method)
                .ok_or_else(|| NormativaError::InvalidStrategy(method.clone())),
            (None, None) => Ok(RetrievalStrategy::default()),
        }
    }
}

/// Processing details attached to a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMetadata {
    /// Strategy used for retrieval.
    pub retrieval_strategy: RetrievalStrategy,
    /// Documents returned by retrieval.
    pub documents_retrieved: usize,
    /// Generating model.
    pub model: String,
    /// Tokens consumed by generation.
    pub tokens: usize,
    /// Retrieval time in milliseconds.
    pub retrieval_ms: f64,
    /// Generation time in milliseconds.
    pub generation_ms: f64,
    /// Whether query expansion changed the retrieval query.
    pub query_expanded: bool,
}

/// A graded answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    /// Unique answer ID.
    pub id: Uuid,
    /// The normalized question.
    pub question: String,
    /// Answer text.
    pub answer: String,
    /// Confidence classification.
    pub confidence: ConfidenceLevel,
    /// Supporting evidence, numbered as cited.
    pub evidence: Vec<Evidence>,
    /// Reasoning section, when requested and present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Ordered warnings.
    pub warnings: Vec<String>,
    /// Validator component scores; empty for fixed refusals.
    #[serde(default)]
    pub component_scores: std::collections::BTreeMap<String, f32>,
    /// Processing details; absent for fixed refusals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnswerMetadata>,
    /// When the answer was produced.
    pub answered_at: DateTime<Utc>,
    /// Total processing time in milliseconds.
    pub processing_ms: f64,
}

impl AnswerResult {
    fn refusal(question: &str, answer: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.into(),
            confidence: ConfidenceLevel::Insuficiente,
            evidence: Vec::new(),
            reasoning: None,
            warnings: vec![warning.into()],
            component_scores: Default::default(),
            metadata: None,
            answered_at: Utc::now(),
            processing_ms: 0.0,
        }
    }
}

/// Grading of a caller-supplied answer against retrieved evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Evidence the answer was graded against.
    pub evidence: Vec<Evidence>,
    /// Validator outcome.
    pub validation: ValidationResult,
}

// ============================================================================
// Evidence Preparation
// ============================================================================

/// Convert a retrieved document into evidence.
///
/// The excerpt keeps the first `excerpt_chars` characters of the content.
pub fn evidence_from_document(document: &Document, score: f32, excerpt_chars: usize) -> Evidence {
    let meta = &document.metadata;
    Evidence {
        source: meta
            .source
            .clone()
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        page: meta.page,
        document_type: meta
            .document_type
            .clone()
            .unwrap_or_else(|| DEFAULT_EVIDENCE_TYPE.to_string()),
        excerpt: document.content.chars().take(excerpt_chars).collect(),
        score,
        precedence: meta.precedence,
    }
}

/// Convert a whole retrieval result into numbered evidence.
pub fn prepare_evidence(result: &RetrievalResult, excerpt_chars: usize) -> Vec<Evidence> {
    result
        .iter()
        .map(|(doc, score)| evidence_from_document(doc, score, excerpt_chars))
        .collect()
}

/// Collapse runs of whitespace and trim.
pub fn normalize_question(question: &str) -> String {
    question.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// AnswerService
// ============================================================================

/// Orchestrates retrieval, generation and validation.
pub struct AnswerService {
    retriever: Arc<HybridRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    validator: ConfidenceValidator,
    expander: QueryExpander,
    config: AnswerConfig,
}

impl AnswerService {
    /// Create a service with the built-in extractive generator.
    pub fn new(
        retriever: Arc<HybridRetriever>,
        validator: ConfidenceValidator,
        expander: QueryExpander,
        config: AnswerConfig,
    ) -> Self {
        Self {
            retriever,
            generator: Arc::new(ExtractiveAnswerGenerator::new()),
            validator,
            expander,
            config,
        }
    }

    /// Replace the answer generator.
    pub fn with_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// The validator in use.
    pub fn validator(&self) -> &ConfidenceValidator {
        &self.validator
    }

    /// The generator in use.
    pub fn generator(&self) -> &Arc<dyn AnswerGenerator> {
        &self.generator
    }

    fn system_prompt(&self) -> &str {
        self.config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Answer a question.
    ///
    /// # Errors
    ///
    /// Retrieval errors (`IndexNotReady`, `BackendUnavailable`,
    /// `InvalidStrategy`, `InvalidArgument`) are propagated.
    pub fn answer(&self, request: &AskRequest) -> Result<AnswerResult, NormativaError> {
        let start = Instant::now();
        let question = normalize_question(&request.question);

        let length = question.chars().count();
        if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&length) {
            debug!("Rejected question of {} characters", length);
            let result =
                AnswerResult::refusal(&question, INVALID_QUESTION_ANSWER, INVALID_QUESTION_WARNING);
            self.audit(&result);
            return Ok(result);
        }

        let strategy = request.resolve_strategy()?;
        let query = self.expander.expand(&question);
        let query_expanded = query != question;
        if query_expanded {
            debug!("Expanded query: {}", query);
        }

        let mut retrieval_request = RetrievalRequest::new(query).with_strategy(strategy);
        retrieval_request.k = request.k;
        retrieval_request.filters = request.filters.clone();
        let retrieval = self.retriever.retrieve(&retrieval_request)?;

        if retrieval.is_empty() {
            let mut result =
                AnswerResult::refusal(&question, NO_DOCUMENTS_ANSWER, NO_DOCUMENTS_WARNING);
            result.processing_ms = start.elapsed().as_secs_f64() * 1000.0;
            self.audit(&result);
            return Ok(result);
        }

        let mut warnings = Vec::new();
        if retrieval.len() < 2 {
            warnings.push(FEW_DOCUMENTS_WARNING.to_string());
        }
        warnings.extend(retrieval.diagnostics.warnings.iter().cloned());

        let evidence = prepare_evidence(&retrieval, self.config.excerpt_chars);
        let context = build_context(&evidence);
        let generation_request = GenerationRequest {
            question: question.clone(),
            system_prompt: self.system_prompt().to_string(),
            prompt: format_answer_prompt(&question, &context, request.include_reasoning, ""),
            evidence: evidence.clone(),
            include_reasoning: request.include_reasoning,
        };

        let generation_start = Instant::now();
        let generated = match self.generator.generate(&generation_request) {
            Ok(generated) => generated,
            Err(e) => {
                let reason = match e {
                    NormativaError::Generation { reason } => reason,
                    other => other.to_string(),
                };
                warn!("Answer generation failed: {}", reason);
                let mut result = AnswerResult::refusal(
                    &question,
                    format!("{}: {}", GENERATION_ERROR_PREFIX, reason),
                    format!("Erro técnico: {}", reason),
                );
                result.processing_ms = start.elapsed().as_secs_f64() * 1000.0;
                self.audit(&result);
                return Ok(result);
            }
        };
        let generation_ms = generation_start.elapsed().as_secs_f64() * 1000.0;

        let validation = self.validator.validate_response(
            &question,
            &generated.text,
            &evidence,
            retrieval.average_score(),
        );
        warnings.extend(validation.warnings.iter().cloned());

        let reasoning = if request.include_reasoning {
            extract_reasoning(&generated.text)
        } else {
            None
        };

        let result = AnswerResult {
            id: Uuid::new_v4(),
            question,
            answer: generated.text,
            confidence: validation.confidence,
            evidence,
            reasoning,
            warnings,
            component_scores: validation.component_scores,
            metadata: Some(AnswerMetadata {
                retrieval_strategy: strategy,
                documents_retrieved: retrieval.len(),
                model: generated.model,
                tokens: generated.tokens,
                retrieval_ms: retrieval.elapsed_ms,
                generation_ms,
                query_expanded,
            }),
            answered_at: Utc::now(),
            processing_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        self.audit(&result);
        Ok(result)
    }

    /// Grade a caller-supplied answer against freshly retrieved evidence.
    ///
    /// # Errors
    ///
    /// Retrieval errors are propagated.
    pub fn evaluate(&self, request: &AskRequest, answer: &str) -> Result<Evaluation, NormativaError> {
        let question = normalize_question(&request.question);
        let strategy = request.resolve_strategy()?;

        let mut retrieval_request =
            RetrievalRequest::new(self.expander.expand(&question)).with_strategy(strategy);
        retrieval_request.k = request.k;
        retrieval_request.filters = request.filters.clone();
        let retrieval = self.retriever.retrieve(&retrieval_request)?;

        let evidence = prepare_evidence(&retrieval, self.config.excerpt_chars);
        let validation =
            self.validator
                .validate_response(&question, answer, &evidence, retrieval.average_score());

        Ok(Evaluation {
            evidence,
            validation,
        })
    }

    /// Emit the audit event for an answer.
    fn audit(&self, result: &AnswerResult) {
        let sources: Vec<&str> = result.evidence.iter().map(|e| e.source.as_str()).collect();
        info!(
            target: "normativa_core::audit",
            id = %result.id,
            confidence = %result.confidence,
            evidence = result.evidence.len(),
            sources = ?sources,
            warnings = result.warnings.len(),
            processing_ms = result.processing_ms,
            "Answered question: {}",
            result.question
        );
    }
}

impl std::fmt::Debug for AnswerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerService")
            .field("generator", &self.generator.model_id())
            .field("expander", &self.expander)
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
