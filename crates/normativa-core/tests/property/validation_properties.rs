use normativa_core::validator::{aggregate_score, citation_score, evidence_quality_score};
use normativa_core::{ConfidenceLevel, ConfidenceValidator, Evidence};
use proptest::prelude::*;

fn evidence_list() -> impl Strategy<Value = Vec<Evidence>> {
    prop::collection::vec(
        (0.0f32..=1.0, prop::option::of(0u32..100)).prop_map(|(score, precedence)| Evidence {
            source: "Resolução 1".to_string(),
            page: Some(1),
            document_type: "Resolução".to_string(),
            excerpt: "O prazo é de 30 dias.".to_string(),
            score,
            precedence,
        }),
        0..8,
    )
}

proptest! {
    #[test]
    fn validation_is_deterministic(
        answer in "[A-Za-z0-9 .\\[\\]]{0,200}",
        evidence in evidence_list(),
        avg in 0.0f32..=1.0,
    ) {
        let validator = ConfidenceValidator::default();
        let first = validator.validate_response("Qual o prazo?", &answer, &evidence, avg);
        let second = validator.validate_response("Qual o prazo?", &answer, &evidence, avg);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn zero_evidence_is_always_insuficiente(answer in "[A-Za-z0-9 .\\[\\]]{0,200}", avg in -1.0f32..2.0) {
        let result = ConfidenceValidator::default().validate_response("Qual o prazo?", &answer, &[], avg);
        prop_assert_eq!(result.confidence, ConfidenceLevel::Insuficiente);
    }

    #[test]
    fn component_scores_are_bounded(
        answer in "[A-Za-z0-9 .\\[\\]]{0,300}",
        evidence in evidence_list(),
        avg in -5.0f32..5.0,
    ) {
        let result = ConfidenceValidator::default().validate_response("Qual o prazo?", &answer, &evidence, avg);
        for score in result.component_scores.values() {
            prop_assert!((0.0..=1.0).contains(score));
        }
        prop_assert!((0.0..=1.0).contains(&aggregate_score(&result.component_scores, evidence.len())));
    }

    #[test]
    fn out_of_range_citations_never_count(n in 1usize..10, extra in 1usize..10) {
        let answer = format!("O prazo é de 30 dias [{}].", n + extra);
        prop_assert_eq!(citation_score(&answer, n), 0.0);
    }

    #[test]
    fn evidence_quality_is_bounded(evidence in evidence_list(), avg in -10.0f32..10.0) {
        let score = evidence_quality_score(&evidence, avg);
        prop_assert!((0.0..=1.0).contains(&score));
    }
}

#[test]
fn nan_average_counts_as_zero_relevance() {
    let evidence = vec![Evidence {
        source: "Resolução 1".to_string(),
        page: None,
        document_type: "Resolução".to_string(),
        excerpt: "O prazo é de 30 dias.".to_string(),
        score: 0.0,
        precedence: None,
    }];
    assert_eq!(
        evidence_quality_score(&evidence, f32::NAN),
        evidence_quality_score(&evidence, 0.0)
    );
}
