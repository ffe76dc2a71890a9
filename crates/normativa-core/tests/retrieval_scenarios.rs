//! End-to-end retrieval scenarios over a small regulatory corpus.

use std::sync::Arc;

use normativa_core::reranker::{RerankerModelId, RerankerProviderKind};
use normativa_core::{
    Bm25Config, CancellationToken, CorpusSnapshot, Document, DocumentMetadata,
    GovernanceCriteria, HybridRetriever, NormativaConfig, NormativaEngine, NormativaError,
    RerankerBackend, RetrievalConfig, RetrievalRequest, RetrievalStrategy,
};

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "O relatório mensal deve ser entregue até o dia 10 de cada mês ao órgão regulador.",
            DocumentMetadata::default()
                .with_source("Resolução 5.000")
                .with_page(4)
                .with_type("Resolução")
                .with_precedence(1)
                .with_status("Vigente"),
        ),
        Document::new(
            "O relatório anual era entregue até o dia 10 de março.",
            DocumentMetadata::default()
                .with_source("Resolução 1.200")
                .with_page(2)
                .with_type("Resolução")
                .with_status("Revogado"),
        ),
        Document::new(
            "Tarifas de pedágio são reajustadas anualmente.",
            DocumentMetadata::default()
                .with_source("Portaria 30")
                .with_page(1)
                .with_type("Portaria"),
        ),
        Document::new(
            "Relatório curto: dia 10.",
            DocumentMetadata::default()
                .with_source("Deliberação 8")
                .with_page(1)
                .with_type("Deliberação"),
        ),
    ]
}

fn engine(config: NormativaConfig) -> NormativaEngine {
    NormativaEngine::from_snapshot(config, CorpusSnapshot::from_documents(corpus())).unwrap()
}

fn lexical_only_retriever() -> HybridRetriever {
    let retriever = HybridRetriever::new(RetrievalConfig::default(), Bm25Config::default()).unwrap();
    let documents = corpus().into_iter().map(Arc::new).collect();
    retriever.initialize_lexical_index(Some(documents)).unwrap();
    retriever
}

fn source(doc: &Document) -> &str {
    doc.metadata.source.as_deref().unwrap_or("")
}

/// Prefers shorter passages.
struct ShortestFirst {
    model_id: RerankerModelId,
}

impl ShortestFirst {
    fn new() -> Self {
        Self {
            model_id: RerankerModelId::from("shortest-first"),
        }
    }
}

impl RerankerBackend for ShortestFirst {
    fn provider_kind(&self) -> RerankerProviderKind {
        RerankerProviderKind::Other("test".to_string())
    }

    fn model_id(&self) -> &RerankerModelId {
        &self.model_id
    }

    fn score_batch(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, NormativaError> {
        Ok(documents
            .iter()
            .map(|d| 1.0 - d.chars().count() as f32 / 1000.0)
            .collect())
    }
}

#[test]
fn test_deadline_question_finds_current_rule() {
    let engine = engine(NormativaConfig::default());
    let result = engine
        .retrieve(
            &RetrievalRequest::new("relatório dia 10")
                .with_strategy(RetrievalStrategy::Bm25Only)
                .with_filters(GovernanceCriteria::new()),
        )
        .unwrap();

    assert!(!result.is_empty());
    assert!(result
        .documents
        .iter()
        .any(|d| source(d) == "Resolução 5.000"));
    assert!(result
        .documents
        .iter()
        .all(|d| source(d) != "Resolução 1.200"));
    assert_eq!(result.documents.len(), result.scores.len());
    assert!(result.scores.iter().all(|s| (0.0..=1.0).contains(s)));

    let report = result.diagnostics.governance.unwrap();
    assert_eq!(report.removed_by_status, 1);
}

#[test]
fn test_hybrid_results_are_ranked_and_bounded() {
    let mut config = NormativaConfig::default();
    config.retrieval.similarity_threshold = 0.0;
    let engine = engine(config);

    let result = engine
        .retrieve(
            &RetrievalRequest::new("relatório dia 10")
                .with_k(2)
                .with_strategy(RetrievalStrategy::Hybrid),
        )
        .unwrap();

    assert!(result.len() <= 2);
    assert!(!result.is_empty());
    for pair in result.scores.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    assert!(result.diagnostics.lexical_candidates.is_some());
    assert!(result.diagnostics.vector_candidates.is_some());
}

#[test]
fn test_rerank_without_backend_degrades_to_uniform_scores() {
    let mut config = NormativaConfig::default();
    config.retrieval.similarity_threshold = 0.0;
    let engine = engine(config);

    let result = engine
        .retrieve(
            &RetrievalRequest::new("relatório dia 10")
                .with_k(2)
                .with_strategy(RetrievalStrategy::HybridRerank),
        )
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.scores.iter().all(|s| *s == 1.0));
    assert!(result.diagnostics.reranker_degraded);
    assert!(!result.diagnostics.reranker_used);
    assert!(!result.diagnostics.warnings.is_empty());
}

#[test]
fn test_rerank_with_backend_reorders() {
    let retriever = lexical_only_retriever().with_reranker(Arc::new(ShortestFirst::new()));
    let result = retriever
        .retrieve(
            &RetrievalRequest::new("relatório dia 10")
                .with_k(2)
                .with_strategy(RetrievalStrategy::HybridRerank),
        )
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(source(&result.documents[0]), "Deliberação 8");
    assert!(result.diagnostics.reranker_used);
    assert!(result.diagnostics.warnings.iter().any(|w| w.contains("Vector backend")));
}

#[test]
fn test_lexical_fallback_is_normalized() {
    let retriever = lexical_only_retriever();
    let result = retriever
        .retrieve(&RetrievalRequest::new("relatório dia 10").with_strategy(RetrievalStrategy::Hybrid))
        .unwrap();

    assert_eq!(result.scores[0], 1.0);
    assert_eq!(result.diagnostics.vector_candidates, None);
}

#[test]
fn test_vector_only_without_backend_fails() {
    let err = lexical_only_retriever()
        .retrieve(&RetrievalRequest::new("relatório").with_strategy(RetrievalStrategy::VectorOnly))
        .unwrap_err();
    assert!(matches!(err, NormativaError::BackendUnavailable { .. }));
}

#[test]
fn test_nothing_ready_is_index_not_ready() {
    let retriever = HybridRetriever::new(RetrievalConfig::default(), Bm25Config::default()).unwrap();
    let err = retriever
        .retrieve(&RetrievalRequest::new("relatório").with_strategy(RetrievalStrategy::Hybrid))
        .unwrap_err();
    assert!(matches!(err, NormativaError::IndexNotReady));
}

#[test]
fn test_cancelled_request_returns_no_results() {
    let retriever = lexical_only_retriever();
    let token = CancellationToken::new();
    token.cancel();

    let err = retriever
        .retrieve_with_cancel(&RetrievalRequest::new("relatório dia 10"), &token)
        .unwrap_err();
    assert!(matches!(err, NormativaError::Cancelled { .. }));
}

#[test]
fn test_bm25_scores_come_from_lexical_stage() {
    let retriever = lexical_only_retriever();
    let result = retriever
        .retrieve(&RetrievalRequest::new("pedágio").with_strategy(RetrievalStrategy::Bm25Only))
        .unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(source(&result.documents[0]), "Portaria 30");
    assert_eq!(result.scores[0], 1.0);
    assert!(result.scores[1..].iter().all(|s| *s == 0.0));
    assert_eq!(result.strategy, RetrievalStrategy::Bm25Only);
}
