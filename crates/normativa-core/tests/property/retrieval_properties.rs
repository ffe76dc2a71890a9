use std::sync::Arc;

use normativa_core::{
    normalize_scored, normalize_scores, weighted_fusion, Bm25Config, Bm25Index, Document,
    DocumentMetadata, FusionWeights, GovernanceCriteria, GovernancePipeline, ScoreOrigin,
    ScoredDocument,
};
use proptest::prelude::*;

fn scored(i: usize, score: f32, meta: DocumentMetadata) -> ScoredDocument {
    let metadata = meta.with_source(format!("doc-{}", i)).with_page(1);
    ScoredDocument::new(
        Arc::new(Document::new(format!("conteúdo {}", i), metadata)),
        score,
        ScoreOrigin::Vector,
    )
}

fn ranked(scores: &[f32]) -> Vec<ScoredDocument> {
    ranked_from(0, scores)
}

/// Documents `doc-{first}`, `doc-{first + 1}`, ... carrying `scores`.
fn ranked_from(first: usize, scores: &[f32]) -> Vec<ScoredDocument> {
    scores
        .iter()
        .enumerate()
        .map(|(i, s)| scored(first + i, *s, DocumentMetadata::default()))
        .collect()
}

fn words() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!["prazo", "relatório", "taxa", "dia", "10", "vigente"]),
        0..8,
    )
    .prop_map(|w| w.join(" "))
}

fn metadata() -> impl Strategy<Value = DocumentMetadata> {
    (
        prop::option::of(prop::sample::select(vec!["Vigente", "Revogado", "vigente"])),
        prop::option::of(0u32..20),
        prop::option::of(prop::sample::select(vec!["2019-01-01", "2021-06-30", "2024-12-31"])),
        prop::option::of(prop::sample::select(vec!["Resolução", "Portaria", "Deliberação"])),
    )
        .prop_map(|(status, precedence, start, doc_type)| {
            let mut meta = DocumentMetadata::default();
            if let Some(status) = status {
                meta = meta.with_status(status);
            }
            if let Some(precedence) = precedence {
                meta = meta.with_precedence(precedence);
            }
            if let Some(doc_type) = doc_type {
                meta = meta.with_type(doc_type);
            }
            meta.with_validity(start, None)
        })
}

proptest! {
    #[test]
    fn normalized_scores_stay_in_unit_range(scores in prop::collection::vec(-1000.0f32..1000.0, 0..50)) {
        let normalized = normalize_scores(&scores);
        prop_assert_eq!(normalized.len(), scores.len());
        for s in &normalized {
            prop_assert!((0.0..=1.0).contains(s));
        }
    }

    #[test]
    fn normalization_preserves_order(scores in prop::collection::vec(-100.0f32..100.0, 2..40)) {
        let normalized = normalize_scores(&scores);
        for i in 0..scores.len() {
            for j in 0..scores.len() {
                if scores[i] > scores[j] {
                    prop_assert!(normalized[i] >= normalized[j]);
                }
            }
        }
    }

    #[test]
    fn constant_scores_normalize_to_one(value in -50.0f32..50.0, len in 1usize..20) {
        let normalized = normalize_scores(&vec![value; len]);
        prop_assert!(normalized.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn fused_list_is_sorted_and_bounded(
        vector in prop::collection::vec(0.0f32..10.0, 0..15),
        lexical in prop::collection::vec(0.0f32..10.0, 0..15),
        vector_weight in 0.0f32..=1.0,
        k in 1usize..20,
    ) {
        let weights = FusionWeights::new(vector_weight, 1.0 - vector_weight);
        let vector = normalize_scored(ranked(&vector));
        let lexical = normalize_scored(ranked(&lexical));
        let fused = weighted_fusion(&vector, &lexical, weights, k);

        prop_assert!(fused.len() <= k);
        prop_assert!(fused.len() <= vector.len().max(lexical.len()));
        for pair in fused.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for doc in &fused {
            prop_assert!(doc.score >= 0.0 && doc.score <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn vector_weight_one_keeps_vector_ranking(scores in prop::collection::vec(0.0f32..10.0, 1..15)) {
        let vector = normalize_scored(ranked(&scores));
        let fused = weighted_fusion(&vector, &[], FusionWeights::new(1.0, 0.0), scores.len());

        let mut expected = vector.clone();
        expected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let fused_ids: Vec<_> = fused.iter().map(|d| d.document.id()).collect();
        let expected_ids: Vec<_> = expected.iter().map(|d| d.document.id()).collect();
        prop_assert_eq!(fused_ids, expected_ids);
    }

    #[test]
    fn vector_weight_one_ignores_lexical_hits(
        vector_scores in prop::collection::vec(0.0f32..10.0, 1..15),
        lexical_scores in prop::collection::vec(0.0f32..10.0, 1..15),
        overlap in 0usize..15,
    ) {
        let vector = normalize_scored(ranked(&vector_scores));
        let lexical = normalize_scored(ranked_from(overlap, &lexical_scores));
        let fused = weighted_fusion(&vector, &lexical, FusionWeights::new(1.0, 0.0), vector.len());

        let mut expected = vector.clone();
        expected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let fused_ids: Vec<_> = fused.iter().map(|d| d.document.id()).collect();
        let expected_ids: Vec<_> = expected.iter().map(|d| d.document.id()).collect();
        prop_assert_eq!(fused_ids, expected_ids);
    }

    #[test]
    fn single_method_documents_get_no_credit_for_the_other(
        vector_scores in prop::collection::vec(0.0f32..10.0, 1..12),
        lexical_scores in prop::collection::vec(0.0f32..10.0, 1..12),
        overlap in 0usize..12,
    ) {
        let vector = normalize_scored(ranked(&vector_scores));
        let lexical = normalize_scored(ranked_from(overlap, &lexical_scores));
        let total = vector.len() + lexical.len();
        let fused = weighted_fusion(&vector, &lexical, FusionWeights::new(0.5, 0.5), total);

        for doc in &fused {
            let id = doc.document.id();
            let v = vector.iter().find(|d| d.document.id() == id).map(|d| d.score);
            let b = lexical.iter().find(|d| d.document.id() == id).map(|d| d.score);
            let expected = v.unwrap_or(0.0) * 0.5 + b.unwrap_or(0.0) * 0.5;
            prop_assert!((doc.score - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn bm25_returns_min_of_k_and_corpus(
        texts in prop::collection::vec(words(), 1..12),
        query in words(),
        k in 1usize..20,
    ) {
        let documents: Vec<Arc<Document>> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let metadata = DocumentMetadata::default().with_source(format!("doc-{}", i));
                Arc::new(Document::new(t.clone(), metadata))
            })
            .collect();
        let index = Bm25Index::build(&Bm25Config::default(), documents);
        let results = index.search(&query, k);

        prop_assert_eq!(results.len(), k.min(texts.len()));
        for pair in results.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].doc_idx < pair[1].doc_idx);
            }
        }
        prop_assert!(results.iter().all(|r| r.score >= 0.0));
    }

    #[test]
    fn governance_is_idempotent(
        metas in prop::collection::vec(metadata(), 0..25),
        max_precedence in prop::option::of(0u32..20),
        valid_from in prop::option::of(prop::sample::select(vec!["2020-01-01", "2022-01-01"])),
    ) {
        let docs: Vec<ScoredDocument> = metas
            .into_iter()
            .enumerate()
            .map(|(i, m)| scored(i, 0.5, m))
            .collect();

        let mut criteria = GovernanceCriteria::new().with_validity(valid_from, None);
        if let Some(max) = max_precedence {
            criteria = criteria.with_max_precedence(max);
        }

        let pipeline = GovernancePipeline::default();
        let (once, report) = pipeline.apply(docs, &criteria);
        let (twice, second) = pipeline.apply(once.clone(), &criteria);

        let once_ids: Vec<_> = once.iter().map(|d| d.document.id()).collect();
        let twice_ids: Vec<_> = twice.iter().map(|d| d.document.id()).collect();
        prop_assert_eq!(once_ids, twice_ids);
        prop_assert_eq!(report.output, once.len());
        prop_assert_eq!(second.removed(), 0);
    }
}

#[test]
fn single_list_documents_split_evenly() {
    let a = scored(1, 1.0, DocumentMetadata::default());
    let b = scored(2, 1.0, DocumentMetadata::default());
    let fused = weighted_fusion(&[a], &[b], FusionWeights::new(0.5, 0.5), 10);

    assert_eq!(fused.len(), 2);
    assert!(fused.iter().all(|d| (d.score - 0.5).abs() < 1e-6));
    assert_eq!(fused[0].document.metadata.source.as_deref(), Some("doc-1"));
}
