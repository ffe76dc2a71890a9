//! Integration tests for `normativa retrieve` and `normativa diagnostics`.

mod common;

use predicates::prelude::*;

use common::Fixture;

#[test]
fn test_diagnostics_reports_ready_indexes() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .arg("diagnostics")
        .assert()
        .success()
        .stdout(predicate::str::contains("Documents: 3"))
        .stdout(predicate::str::contains("Lexical index: yes"))
        .stdout(predicate::str::contains("Reranker: no"));
}

#[test]
fn test_diagnostics_json() {
    let fixture = Fixture::new();
    let output = fixture
        .cmd()
        .args(["diagnostics", "--json"])
        .output()
        .expect("run diagnostics");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["lexicalReady"], true);
    assert_eq!(value["corpusSize"], 3);
}

#[test]
fn test_retrieve_bm25_excludes_revoked() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["retrieve", "relatório dia 10", "--strategy", "bm25_only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolução 5.000"))
        .stdout(predicate::str::contains("Resolução 1.200").not());
}

#[test]
fn test_retrieve_revoked_on_request() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args([
            "retrieve",
            "relatório dia 10",
            "--strategy",
            "bm25_only",
            "--status",
            "Revogado",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolução 1.200"))
        .stdout(predicate::str::contains("Resolução 5.000").not());
}

#[test]
fn test_retrieve_json_scores_are_aligned() {
    let fixture = Fixture::new();
    let output = fixture
        .cmd()
        .args(["retrieve", "relatório dia 10", "-k", "2", "--json"])
        .output()
        .expect("run retrieve");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let documents = value["documents"].as_array().expect("documents array");
    let scores = value["scores"].as_array().expect("scores array");
    assert_eq!(documents.len(), scores.len());
    assert!(documents.len() <= 2);
    assert_eq!(value["strategy"], "hybrid_rerank");
}

#[test]
fn test_retrieve_unknown_strategy_fails_with_hint() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["retrieve", "relatório", "--strategy", "semantic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[err]"))
        .stderr(predicate::str::contains("Valid strategies"));
}

#[test]
fn test_missing_corpus_configuration() {
    let fixture = Fixture::with_config("retrieval:\n  defaultK: 3\n");
    fixture
        .cmd()
        .arg("diagnostics")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--corpus"));
}

#[test]
fn test_corpus_flag_overrides_config() {
    let fixture = Fixture::with_config("retrieval:\n  defaultK: 3\n");
    fixture
        .cmd()
        .arg("--corpus")
        .arg(fixture.path().join("corpus.jsonl"))
        .args(["retrieve", "pedágio", "--strategy", "bm25_only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Portaria 30"));
}
