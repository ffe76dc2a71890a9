//! Confidence validation of generated answers.
//!
//! [`ConfidenceValidator::validate_response`] grades an answer against the
//! evidence it was generated from and returns a [`ConfidenceLevel`] with
//! per-component scores and warnings. It is pure: same input, same output,
//! and it never fails on malformed input.
//!
//! ## Pipeline
//!
//! 1. No-answer markers in the answer → `INSUFICIENTE`, no scores
//! 2. `citations`: valid `[n]` markers (coverage and density)
//! 3. `completeness`: length and sentence structure
//! 4. `evidence_quality`: evidence count, retrieval score, precedence
//! 5. Conflict markers → `BAIXA` with the scores so far
//! 6. Mean of the three components, adjusted by evidence count, bucketed
//!
//! An answer with zero evidence is always `INSUFICIENTE`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{MAX_QUESTION_CHARS, MIN_QUESTION_CHARS};
use crate::errors::NormativaError;
use crate::types::{ConfidenceLevel, Evidence, ValidationResult};

// ============================================================================
// Component Names and Messages
// ============================================================================

/// Component score key for citation quality.
pub const CITATIONS: &str = "citations";
/// Component score key for answer completeness.
pub const COMPLETENESS: &str = "completeness";
/// Component score key for evidence quality.
pub const EVIDENCE_QUALITY: &str = "evidence_quality";

const NO_ANSWER_WARNING: &str = "Resposta indica informação insuficiente";
const FEW_CITATIONS_WARNING: &str = "Poucas citações encontradas na resposta";
const INCOMPLETE_WARNING: &str = "Resposta pode estar incompleta";
const LOW_EVIDENCE_WARNING: &str = "Qualidade das evidências é baixa";
const CONFLICT_WARNING: &str = "Possível conflito normativo detectado";
const NOT_A_QUESTION_WARNING: &str = "Texto não parece ser uma pergunta";

const MIN_ANSWER_CHARS: usize = 100;
const IDEAL_ANSWER_CHARS: usize = 500;
const IDEAL_EVIDENCE_COUNT: f32 = 5.0;
const NEUTRAL_PRECEDENCE_SCORE: f32 = 0.5;

const QUESTION_INDICATORS: [&str; 8] =
    ["?", "qual", "como", "quando", "onde", "quem", "por que", "o que"];

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation regex is valid"));
static STRUCTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s+[A-Z]").expect("structure regex is valid"));
static MEANINGFUL_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]{3,}").expect("word regex is valid"));

// ============================================================================
// Configuration
// ============================================================================

/// Validator configuration (`validator:` in config.yaml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Regexes marking an answer that declares missing information.
    #[serde(default = "default_no_answer_patterns")]
    pub no_answer_patterns: Vec<String>,

    /// Regexes marking an answer that reports a normative conflict.
    #[serde(default = "default_conflict_patterns")]
    pub conflict_patterns: Vec<String>,
}

fn default_no_answer_patterns() -> Vec<String> {
    [
        "não localizado",
        "não foi encontrad[oa]",
        "insuficiente",
        "não há informação",
        "não consta",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_conflict_patterns() -> Vec<String> {
    [
        "conflito normativo",
        "interpretações conflitantes",
        "divergência",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            no_answer_patterns: default_no_answer_patterns(),
            conflict_patterns: default_conflict_patterns(),
        }
    }
}

impl ValidatorConfig {
    /// Check that every pattern compiles.
    pub fn validate(&self) -> Result<Vec<String>, NormativaError> {
        compile_patterns("validator.noAnswerPatterns", &self.no_answer_patterns)?;
        compile_patterns("validator.conflictPatterns", &self.conflict_patterns)?;

        let mut warnings = Vec::new();
        if self.no_answer_patterns.is_empty() {
            warnings.push(
                "validator.noAnswerPatterns is empty; refusals will be graded as answers"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

fn compile_patterns(field: &str, patterns: &[String]) -> Result<Vec<Regex>, NormativaError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| NormativaError::InvalidConfiguration {
                message: format!("{} entry `{}` is not a valid regex: {}", field, p, e),
                hint: "Fix the regular expression syntax".to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Question Validation
// ============================================================================

/// Outcome of [`ConfidenceValidator::validate_question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionValidation {
    /// Whether there are no errors.
    pub is_valid: bool,
    /// Blocking problems.
    pub errors: Vec<String>,
    /// Non-blocking remarks.
    pub warnings: Vec<String>,
}

// ============================================================================
// ConfidenceValidator
// ============================================================================

/// Grades answers against their evidence.
#[derive(Debug, Clone)]
pub struct ConfidenceValidator {
    no_answer: Vec<Regex>,
    conflict: Vec<Regex>,
}

impl Default for ConfidenceValidator {
    fn default() -> Self {
        let config = ValidatorConfig::default();
        Self {
            no_answer: compile_patterns("", &config.no_answer_patterns).unwrap_or_default(),
            conflict: compile_patterns("", &config.conflict_patterns).unwrap_or_default(),
        }
    }
}

impl ConfidenceValidator {
    /// Build a validator from configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if a pattern is not a valid regex.
    pub fn new(config: &ValidatorConfig) -> Result<Self, NormativaError> {
        Ok(Self {
            no_answer: compile_patterns("validator.noAnswerPatterns", &config.no_answer_patterns)?,
            conflict: compile_patterns("validator.conflictPatterns", &config.conflict_patterns)?,
        })
    }

    /// Grade an answer.
    ///
    /// `avg_score` is the mean retrieval score of the evidence; values
    /// outside [0, 1] are clamped and NaN counts as 0.
    pub fn validate_response(
        &self,
        question: &str,
        answer: &str,
        evidence: &[Evidence],
        avg_score: f32,
    ) -> ValidationResult {
        let answer_lower = answer.to_lowercase();

        if self.no_answer.iter().any(|re| re.is_match(&answer_lower)) {
            return ValidationResult {
                confidence: ConfidenceLevel::Insuficiente,
                component_scores: BTreeMap::new(),
                warnings: vec![NO_ANSWER_WARNING.to_string()],
            };
        }

        let mut warnings = Vec::new();
        let mut scores = BTreeMap::new();

        let citations = citation_score(answer, evidence.len());
        scores.insert(CITATIONS.to_string(), citations);
        if citations < 0.5 {
            warnings.push(FEW_CITATIONS_WARNING.to_string());
        }

        let completeness = completeness_score(answer, question);
        scores.insert(COMPLETENESS.to_string(), completeness);
        if completeness < 0.5 {
            warnings.push(INCOMPLETE_WARNING.to_string());
        }

        let quality = evidence_quality_score(evidence, avg_score);
        scores.insert(EVIDENCE_QUALITY.to_string(), quality);
        if quality < 0.5 {
            warnings.push(LOW_EVIDENCE_WARNING.to_string());
        }

        let has_conflict = self.conflict.iter().any(|re| re.is_match(&answer_lower));
        if has_conflict {
            warnings.push(CONFLICT_WARNING.to_string());
        }

        let confidence = if evidence.is_empty() {
            ConfidenceLevel::Insuficiente
        } else if has_conflict {
            ConfidenceLevel::Baixa
        } else {
            classify(&scores, evidence.len())
        };

        debug!(
            "Validated answer: {} (citations={:.2}, completeness={:.2}, evidence_quality={:.2})",
            confidence, citations, completeness, quality
        );

        ValidationResult {
            confidence,
            component_scores: scores,
            warnings,
        }
    }

    /// Check that a question is long enough, short enough and has words.
    pub fn validate_question(&self, question: &str) -> QuestionValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let length = question.chars().count();

        if length < MIN_QUESTION_CHARS {
            errors.push(format!(
                "Pergunta muito curta (mínimo {} caracteres)",
                MIN_QUESTION_CHARS
            ));
        }
        if length > MAX_QUESTION_CHARS {
            errors.push(format!(
                "Pergunta muito longa (máximo {} caracteres)",
                MAX_QUESTION_CHARS
            ));
        }
        if !MEANINGFUL_WORD_RE.is_match(question) {
            errors.push("Pergunta não contém palavras significativas".to_string());
        }

        let lower = question.to_lowercase();
        if !QUESTION_INDICATORS.iter().any(|i| lower.contains(i)) {
            warnings.push(NOT_A_QUESTION_WARNING.to_string());
        }

        QuestionValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

// ============================================================================
// Component Scores
// ============================================================================

/// Citation quality in [0, 1].
///
/// Only `[n]` with `1 <= n <= evidence_count` count. Combines coverage of
/// distinct evidence (70%) with citation density per word (30%).
pub fn citation_score(answer: &str, evidence_count: usize) -> f32 {
    let valid: Vec<usize> = CITATION_RE
        .captures_iter(answer)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<usize>().ok()))
        .filter(|n| (1..=evidence_count).contains(n))
        .collect();

    if valid.is_empty() {
        return 0.0;
    }

    let mut unique = valid.clone();
    unique.sort_unstable();
    unique.dedup();

    let coverage = unique.len() as f32 / evidence_count as f32;
    let words = answer.split_whitespace().count().max(1);
    let density = (valid.len() as f32 / words as f32 * 100.0).min(1.0);

    (coverage * 0.7 + density * 0.3).min(1.0)
}

/// Completeness in [0, 1] from answer length (chars) and sentence structure.
pub fn completeness_score(answer: &str, _question: &str) -> f32 {
    let length = answer.chars().count();
    if length < MIN_ANSWER_CHARS {
        return 0.3;
    }

    let length_score = (length as f32 / IDEAL_ANSWER_CHARS as f32).min(1.0);
    let structure_score = if STRUCTURE_RE.is_match(answer) {
        1.0
    } else {
        0.7
    };

    (length_score * 0.6 + structure_score * 0.4).min(1.0)
}

/// Evidence quality in [0, 1] from count, mean retrieval score and precedence.
pub fn evidence_quality_score(evidence: &[Evidence], avg_score: f32) -> f32 {
    if evidence.is_empty() {
        return 0.0;
    }

    let quantity = (evidence.len() as f32 / IDEAL_EVIDENCE_COUNT).min(1.0);
    let relevance = if avg_score.is_nan() {
        0.0
    } else {
        avg_score.clamp(0.0, 1.0)
    };

    let precedences: Vec<f32> = evidence
        .iter()
        .filter_map(|e| e.precedence)
        .map(|p| 1.0 - p as f32 / 100.0)
        .collect();
    let precedence = if precedences.is_empty() {
        NEUTRAL_PRECEDENCE_SCORE
    } else {
        precedences.iter().sum::<f32>() / precedences.len() as f32
    };

    (quantity * 0.3 + relevance * 0.5 + precedence * 0.2).clamp(0.0, 1.0)
}

// ============================================================================
// Classification
// ============================================================================

/// Overall score: mean of the components, ×0.7 below 2 evidence, ×1.1 at 5
/// or more, capped at 1.
pub fn aggregate_score(scores: &BTreeMap<String, f32>, evidence_count: usize) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }

    let mut score = scores.values().sum::<f32>() / scores.len() as f32;
    if evidence_count < 2 {
        score *= 0.7;
    } else if evidence_count >= 5 {
        score *= 1.1;
    }
    score.min(1.0)
}

/// Map component scores to a confidence level.
///
/// `>= 0.8` ALTA, `>= 0.6` MÉDIA, `>= 0.4` BAIXA, otherwise INSUFICIENTE.
pub fn classify(scores: &BTreeMap<String, f32>, evidence_count: usize) -> ConfidenceLevel {
    let score = aggregate_score(scores, evidence_count);
    if score >= 0.8 {
        ConfidenceLevel::Alta
    } else if score >= 0.6 {
        ConfidenceLevel::Media
    } else if score >= 0.4 {
        ConfidenceLevel::Baixa
    } else {
        ConfidenceLevel::Insuficiente
    }
}
