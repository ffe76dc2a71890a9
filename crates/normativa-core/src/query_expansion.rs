//! Rule-based query expansion for improving lexical recall.
//!
//! Regulatory questions often name a deliverable by a short label ("Produto
//! D") while the governing text describes it at length ("relatório mensal de
//! avanço físico de obras"). A rule appends the descriptive terms to the
//! retrieval query when every one of its patterns matches the question.
//!
//! ## Example
//!
//! ```yaml
//! queryExpansion:
//!   - patterns: ['\bproduto\s*d\b', '\b(prazo|entrega|envio|relat[óo]rio)\b']
//!     append: "relatório mensal avanço físico obras verificador dia 10"
//! ```
//!
//! The question shown to the generator is never changed; only the query
//! sent to retrieval is.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::NormativaError;

// ============================================================================
// Configuration
// ============================================================================

/// One expansion rule (`queryExpansion[]` in config.yaml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExpansionRule {
    /// Regexes matched against the lowercased question; all must match.
    pub patterns: Vec<String>,

    /// Text appended to the query, separated by a space.
    pub append: String,
}

impl QueryExpansionRule {
    /// Create a rule.
    pub fn new(patterns: Vec<String>, append: impl Into<String>) -> Self {
        Self {
            patterns,
            append: append.into(),
        }
    }
}

// ============================================================================
// QueryExpander
// ============================================================================

struct CompiledRule {
    patterns: Vec<Regex>,
    append: String,
}

/// Applies compiled expansion rules to questions.
#[derive(Default)]
pub struct QueryExpander {
    rules: Vec<CompiledRule>,
}

impl QueryExpander {
    /// Compile the given rules.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when a pattern is not a valid regex or a rule
    /// has no patterns.
    pub fn new(rules: &[QueryExpansionRule]) -> Result<Self, NormativaError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            if rule.patterns.is_empty() {
                return Err(NormativaError::InvalidConfiguration {
                    message: format!("queryExpansion[{}] has no patterns", i),
                    hint: "Give each rule at least one regex in `patterns`".to_string(),
                });
            }
            let patterns = rule
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| NormativaError::InvalidConfiguration {
                        message: format!("queryExpansion[{}] pattern `{}` is invalid: {}", i, p, e),
                        hint: "Fix the regular expression syntax".to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(CompiledRule {
                patterns,
                append: rule.append.trim().to_string(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Expand a question into the retrieval query.
    ///
    /// Every matching rule appends its text, in configuration order. Without
    /// a match the trimmed question is returned unchanged.
    pub fn expand(&self, question: &str) -> String {
        let query = question.trim();
        let lower = query.to_lowercase();

        let mut expanded = query.to_string();
        for rule in &self.rules {
            if rule.append.is_empty() {
                continue;
            }
            if rule.patterns.iter().all(|p| p.is_match(&lower)) {
                expanded.push(' ');
                expanded.push_str(&rule.append);
            }
        }
        expanded
    }
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("rules", &self.rules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn produto_d_rule() -> QueryExpansionRule {
        QueryExpansionRule::new(
            vec![
                r"\bproduto\s*d\b".to_string(),
                r"\b(prazo|entrega|envio|relat[óo]rio)\b".to_string(),
            ],
            "relatório mensal avanço físico obras dia 10",
        )
    }

    #[test]
    fn test_no_rules_returns_trimmed_question() {
        let expander = QueryExpander::default();
        assert!(expander.is_empty());
        assert_eq!(expander.expand("  Qual o prazo?  "), "Qual o prazo?");
    }

    #[test]
    fn test_all_patterns_must_match() {
        let expander = QueryExpander::new(&[produto_d_rule()]).unwrap();
        assert_eq!(
            expander.expand("Qual o prazo do Produto D?"),
            "Qual o prazo do Produto D? relatório mensal avanço físico obras dia 10"
        );
        assert_eq!(
            expander.expand("O que é o Produto D?"),
            "O que é o Produto D?"
        );
    }

    #[test]
    fn test_multiple_rules_apply_in_order() {
        let rules = vec![
            produto_d_rule(),
            QueryExpansionRule::new(vec![r"\bverificador\b".to_string()], "verificador independente"),
        ];
        let expander = QueryExpander::new(&rules).unwrap();
        let expanded = expander.expand("Quando o verificador entrega o produto D?");
        assert!(expanded.ends_with("dia 10 verificador independente"));
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let rule = QueryExpansionRule::new(vec!["(unclosed".to_string()], "x");
        let err = QueryExpander::new(&[rule]).unwrap_err();
        assert!(matches!(err, NormativaError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_rule_without_patterns_is_rejected() {
        let rule = QueryExpansionRule::new(vec![], "x");
        assert!(QueryExpander::new(&[rule]).is_err());
    }

    #[test]
    fn test_rule_from_yaml() {
        let rules: Vec<QueryExpansionRule> =
            serde_yaml::from_str("- patterns: ['\\bprazo\\b']\n  append: entregas\n").unwrap();
        let expander = QueryExpander::new(&rules).unwrap();
        assert_eq!(expander.expand("prazo final"), "prazo final entregas");
    }
}
