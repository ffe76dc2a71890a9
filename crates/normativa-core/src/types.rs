//! Shared data model for retrieval, validation and answer assembly.
//!
//! Both the validator and the answer service depend on [`Evidence`] and
//! [`ConfidenceLevel`] from here, so neither has to import the other.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::NormativaError;
use crate::fusion::FusionWeights;
use crate::governance::{GovernanceCriteria, GovernanceReport};

// ============================================================================
// DocumentMetadata
// ============================================================================

/// Governance metadata attached to a corpus document.
///
/// Deserialization accepts both the English keys and the Portuguese keys
/// used by the ingestion pipeline (`fonte`, `pagina`, `tipo`, `precedencia`,
/// `vigencia_inicio`, `vigencia_fim`). When both spellings are present the
/// English key wins. Unknown keys are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct DocumentMetadata {
    /// Source document name (file or act identifier).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Page number within the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Normative type (e.g. "Resolução", "Portaria").
    #[serde(rename = "tipo", skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,

    /// Legal precedence; lower means higher authority.
    #[serde(rename = "precedencia", skip_serializing_if = "Option::is_none")]
    pub precedence: Option<u32>,

    /// Lifecycle status (e.g. "Vigente", "Revogado").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// First day of validity, ISO `YYYY-MM-DD`.
    #[serde(rename = "vigencia_inicio", skip_serializing_if = "Option::is_none")]
    pub validity_start: Option<String>,

    /// Last day of validity, ISO `YYYY-MM-DD`.
    #[serde(rename = "vigencia_fim", skip_serializing_if = "Option::is_none")]
    pub validity_end: Option<String>,

    /// Any other metadata keys, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<Map<String, Value>> for DocumentMetadata {
    fn from(mut map: Map<String, Value>) -> Self {
        let source = take_string(&mut map, &["source", "fonte"]);
        let page = take_u32(&mut map, &["page", "pagina"]);
        let document_type = take_string(&mut map, &["tipo", "document_type", "type"]);
        let precedence = take_u32(&mut map, &["precedencia", "precedence"]);
        let status = take_string(&mut map, &["status"]);
        let validity_start = take_string(&mut map, &["vigencia_inicio", "validity_start"]);
        let validity_end = take_string(&mut map, &["vigencia_fim", "validity_end"]);

        Self {
            source,
            page,
            document_type,
            precedence,
            status,
            validity_start,
            validity_end,
            extra: map.into_iter().collect(),
        }
    }
}

/// Remove every alias from the map and return the first usable string value.
fn take_string(map: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        let value = match map.remove(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if found.is_none() {
            found = value;
        }
    }
    found
}

/// Remove every alias from the map and return the first value readable as `u32`.
///
/// Accepts JSON integers and numeric strings (`"12"`).
fn take_u32(map: &mut Map<String, Value>, keys: &[&str]) -> Option<u32> {
    let mut found = None;
    for key in keys {
        let value = match map.remove(*key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        if found.is_none() {
            found = value;
        }
    }
    found
}

impl DocumentMetadata {
    /// Builder: set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builder: set the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Builder: set the document type.
    pub fn with_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Builder: set the precedence.
    pub fn with_precedence(mut self, precedence: u32) -> Self {
        self.precedence = Some(precedence);
        self
    }

    /// Builder: set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Builder: set the validity window bounds.
    pub fn with_validity(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.validity_start = start.map(str::to_string);
        self.validity_end = end.map(str::to_string);
        self
    }
}

// ============================================================================
// Document
// ============================================================================

/// Immutable unit of retrievable content owned by the corpus snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Passage text.
    #[serde(alias = "page_content")]
    pub content: String,

    /// Governance metadata.
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document from content and metadata.
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Identity used to merge the lexical and vector result lists.
    pub fn id(&self) -> DocumentId {
        DocumentId::from_metadata(&self.metadata)
    }
}

// ============================================================================
// DocumentId
// ============================================================================

/// Document identity derived from `(source, page)`, formatted `"{source}_{page}"`.
///
/// Missing source renders as empty, missing page as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Derive the identity from document metadata.
    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        Self(format!(
            "{}_{}",
            metadata.source.as_deref().unwrap_or(""),
            metadata.page.unwrap_or(0)
        ))
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ScoredDocument
// ============================================================================

/// Which stage produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreOrigin {
    /// BM25 lexical ranking.
    Lexical,
    /// Vector similarity.
    Vector,
    /// Weighted fusion of both.
    Fused,
    /// Pairwise reranker (or its degraded uniform score).
    Reranked,
}

impl fmt::Display for ScoreOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Vector => write!(f, "vector"),
            Self::Fused => write!(f, "fused"),
            Self::Reranked => write!(f, "reranked"),
        }
    }
}

/// A document paired with the score of the stage that ranked it.
///
/// Transient: created per query and dropped with the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The shared corpus document.
    pub document: Arc<Document>,
    /// Stage score.
    pub score: f32,
    /// Stage that produced `score`.
    pub origin: ScoreOrigin,
}

impl ScoredDocument {
    /// Pair a document with a score.
    pub fn new(document: Arc<Document>, score: f32, origin: ScoreOrigin) -> Self {
        Self {
            document,
            score,
            origin,
        }
    }
}

// ============================================================================
// RetrievalStrategy
// ============================================================================

/// Retrieval strategy, dispatched exhaustively by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Vector similarity only.
    VectorOnly,
    /// BM25 lexical ranking only.
    Bm25Only,
    /// Weighted fusion of vector and BM25.
    Hybrid,
    /// Hybrid over `2k` candidates, reranked down to `k`.
    #[default]
    HybridRerank,
}

impl RetrievalStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [RetrievalStrategy; 4] = [
        Self::VectorOnly,
        Self::Bm25Only,
        Self::Hybrid,
        Self::HybridRerank,
    ];

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorOnly => "vector_only",
            Self::Bm25Only => "bm25_only",
            Self::Hybrid => "hybrid",
            Self::HybridRerank => "hybrid_rerank",
        }
    }

    /// Map a legacy `method` value (`vector`, `bm25`, `hybrid`).
    pub fn from_legacy_method(method: &str) -> Option<Self> {
        match method.trim().to_lowercase().as_str() {
            "vector" => Some(Self::VectorOnly),
            "bm25" => Some(Self::Bm25Only),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = NormativaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "vector_only" => Ok(Self::VectorOnly),
            "bm25_only" => Ok(Self::Bm25Only),
            "hybrid" => Ok(Self::Hybrid),
            "hybrid_rerank" => Ok(Self::HybridRerank),
            other => Self::from_legacy_method(other)
                .ok_or_else(|| NormativaError::InvalidStrategy(s.to_string())),
        }
    }
}

// ============================================================================
// RetrievalRequest
// ============================================================================

/// A single retrieval call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRequest {
    /// Query text.
    pub query: String,

    /// Number of results; `None` uses the configured `defaultK`.
    #[serde(default)]
    pub k: Option<usize>,

    /// Strategy to dispatch.
    #[serde(default)]
    pub strategy: RetrievalStrategy,

    /// Governance criteria; `None` skips the filter pipeline.
    #[serde(default)]
    pub filters: Option<GovernanceCriteria>,
}

impl RetrievalRequest {
    /// Create a request for a query with default k, strategy and no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the number of results.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set the strategy.
    pub fn with_strategy(mut self, strategy: RetrievalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set governance criteria.
    pub fn with_filters(mut self, filters: GovernanceCriteria) -> Self {
        self.filters = Some(filters);
        self
    }
}

// ============================================================================
// RetrievalResult
// ============================================================================

/// Per-stage counts, timings and degradation notes for one retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDiagnostics {
    /// The query as executed.
    pub query: String,

    /// Effective k after defaulting and capping.
    pub k: usize,

    /// Candidates returned by the lexical path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_candidates: Option<usize>,

    /// Candidates returned by the vector path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_candidates: Option<usize>,

    /// Documents after fusion and truncation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_candidates: Option<usize>,

    /// Whether a reranker backend scored the shortlist.
    #[serde(default)]
    pub reranker_used: bool,

    /// Whether the reranker stage ran in degraded uniform-score mode.
    #[serde(default)]
    pub reranker_degraded: bool,

    /// Governance report, present when criteria were supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<GovernanceReport>,

    /// Lexical search time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_time_ms: Option<u64>,

    /// Vector search time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_time_ms: Option<u64>,

    /// Rerank time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_time_ms: Option<u64>,

    /// Soft degradations that did not fail the request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Output of the retrieval orchestrator.
///
/// `documents` and `scores` are always the same length and never longer
/// than the effective k.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    /// Ranked documents.
    pub documents: Vec<Arc<Document>>,
    /// Scores aligned with `documents`, each in [0, 1].
    pub scores: Vec<f32>,
    /// Strategy that produced the ranking.
    pub strategy: RetrievalStrategy,
    /// Wall-clock time of the whole retrieval.
    pub elapsed_ms: f64,
    /// Per-stage diagnostics.
    pub diagnostics: StageDiagnostics,
}

impl RetrievalResult {
    /// Split aligned scored documents into the parallel result lists.
    pub fn from_scored(
        scored: Vec<ScoredDocument>,
        strategy: RetrievalStrategy,
        elapsed_ms: f64,
        diagnostics: StageDiagnostics,
    ) -> Self {
        let (documents, scores) = scored
            .into_iter()
            .map(|sd| (sd.document, sd.score))
            .unzip();
        Self {
            documents,
            scores,
            strategy,
            elapsed_ms,
            diagnostics,
        }
    }

    /// Number of documents returned.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document survived retrieval and filtering.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Mean of the scores, 0.0 when empty.
    pub fn average_score(&self) -> f32 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.scores.iter().sum::<f32>() / self.scores.len() as f32
        }
    }

    /// Iterate `(document, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Document>, f32)> {
        self.documents.iter().zip(self.scores.iter().copied())
    }
}

/// Readiness snapshot of the retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalDiagnostics {
    /// Lexical index built and published.
    pub lexical_ready: bool,
    /// Vector backend attached.
    pub vector_ready: bool,
    /// Reranker backend attached.
    pub reranker_enabled: bool,
    /// Documents in the lexical index (0 when not built).
    pub corpus_size: usize,
    /// Fusion weights in use.
    pub weights: FusionWeights,
}

// ============================================================================
// Evidence
// ============================================================================

/// Presentation view of a retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Source label.
    pub source: String,
    /// Page, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Normative type label.
    pub document_type: String,
    /// Leading excerpt of the passage.
    pub excerpt: String,
    /// Retrieval score.
    pub score: f32,
    /// Legal precedence, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedence: Option<u32>,
}

// ============================================================================
// ConfidenceLevel
// ============================================================================

/// Confidence classification of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// Strong support.
    #[serde(rename = "ALTA")]
    Alta,
    /// Moderate support.
    #[serde(rename = "MÉDIA", alias = "MEDIA")]
    Media,
    /// Weak support.
    #[serde(rename = "BAIXA")]
    Baixa,
    /// Not supported by the evidence.
    #[serde(rename = "INSUFICIENTE")]
    Insuficiente,
}

impl ConfidenceLevel {
    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alta => "ALTA",
            Self::Media => "MÉDIA",
            Self::Baixa => "BAIXA",
            Self::Insuficiente => "INSUFICIENTE",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = std::convert::Infallible;

    /// Unknown labels map to `Insuficiente`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "ALTA" => Self::Alta,
            "MEDIA" | "MÉDIA" => Self::Media,
            "BAIXA" => Self::Baixa,
            _ => Self::Insuficiente,
        })
    }
}

// ============================================================================
// ValidationResult
// ============================================================================

/// Outcome of the confidence validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Confidence classification.
    pub confidence: ConfidenceLevel,
    /// Component scores by name (`citations`, `completeness`, `evidence_quality`).
    pub component_scores: BTreeMap<String, f32>,
    /// Ordered warnings.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_portuguese_aliases() {
        let json = r#"{"fonte": "Resolucao 12", "pagina": "3", "tipo": "Resolução",
            "precedencia": 2, "status": "Vigente", "vigencia_inicio": "2020-01-01",
            "tema": "acreditação"}"#;
        let meta: DocumentMetadata = serde_json::from_str(json).unwrap();

        assert_eq!(meta.source.as_deref(), Some("Resolucao 12"));
        assert_eq!(meta.page, Some(3));
        assert_eq!(meta.document_type.as_deref(), Some("Resolução"));
        assert_eq!(meta.precedence, Some(2));
        assert_eq!(meta.validity_start.as_deref(), Some("2020-01-01"));
        assert_eq!(meta.validity_end, None);
        assert_eq!(meta.extra.get("tema"), Some(&Value::from("acreditação")));
    }

    #[test]
    fn test_metadata_english_key_wins() {
        let json = r#"{"source": "a.pdf", "fonte": "b.pdf", "page": 4}"#;
        let meta: DocumentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.source.as_deref(), Some("a.pdf"));
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_metadata_serializes_canonical_keys() {
        let meta = DocumentMetadata::default()
            .with_source("a.pdf")
            .with_type("Portaria")
            .with_precedence(3);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["source"], "a.pdf");
        assert_eq!(value["tipo"], "Portaria");
        assert_eq!(value["precedencia"], 3);

        let back: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_document_accepts_page_content() {
        let doc: Document =
            serde_json::from_str(r#"{"page_content": "texto", "metadata": {"source": "x"}}"#)
                .unwrap();
        assert_eq!(doc.content, "texto");
        assert_eq!(doc.id().as_str(), "x_0");
    }

    #[test]
    fn test_document_id_format() {
        let meta = DocumentMetadata::default().with_source("Res 1").with_page(7);
        assert_eq!(DocumentId::from_metadata(&meta).as_str(), "Res 1_7");
        assert_eq!(
            DocumentId::from_metadata(&DocumentMetadata::default()).as_str(),
            "_0"
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "hybrid_rerank".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::HybridRerank
        );
        assert_eq!(
            "BM25_ONLY".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::Bm25Only
        );
        assert_eq!(
            "vector".parse::<RetrievalStrategy>().unwrap(),
            RetrievalStrategy::VectorOnly
        );
        let err = "semantic".parse::<RetrievalStrategy>().unwrap_err();
        assert!(matches!(err, NormativaError::InvalidStrategy(s) if s == "semantic"));
    }

    #[test]
    fn test_strategy_display_round_trip() {
        for strategy in RetrievalStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<RetrievalStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_legacy_method_map() {
        assert_eq!(
            RetrievalStrategy::from_legacy_method("Hybrid"),
            Some(RetrievalStrategy::Hybrid)
        );
        assert_eq!(RetrievalStrategy::from_legacy_method("rerank"), None);
    }

    #[test]
    fn test_confidence_labels() {
        assert_eq!(ConfidenceLevel::Media.to_string(), "MÉDIA");
        assert_eq!("media".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::Media);
        assert_eq!("???".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::Insuficiente);
        assert_eq!(
            serde_json::to_string(&ConfidenceLevel::Media).unwrap(),
            "\"MÉDIA\""
        );
    }

    #[test]
    fn test_result_from_scored_keeps_alignment() {
        let a = Arc::new(Document::new("a", DocumentMetadata::default().with_source("a")));
        let b = Arc::new(Document::new("b", DocumentMetadata::default().with_source("b")));
        let result = RetrievalResult::from_scored(
            vec![
                ScoredDocument::new(a, 0.9, ScoreOrigin::Fused),
                ScoredDocument::new(b, 0.1, ScoreOrigin::Fused),
            ],
            RetrievalStrategy::Hybrid,
            1.0,
            StageDiagnostics::default(),
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.documents[1].content, "b");
        assert!((result.scores[1] - 0.1).abs() < 1e-6);
        assert!((result.average_score() - 0.5).abs() < 1e-6);
    }
}
