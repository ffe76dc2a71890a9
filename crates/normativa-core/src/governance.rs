//! Governance filter pipeline.
//!
//! Ordered, pure filters over aligned `(document, score)` pairs:
//!
//! 1. **status**: equality with the requested status, or the configured
//!    default (`Vigente`); documents without status count as `Vigente`
//! 2. **precedence**: `precedence <= max`; missing precedence counts as 99
//! 3. **validity**: `validity_start >= from` and `validity_end <= until`,
//!    compared lexically as ISO `YYYY-MM-DD` strings; a missing start is
//!    `""` and a missing end is `"9999-12-31"`
//! 4. **type**: allow-list, skipped when empty
//!
//! Filtering never reorders and never changes scores, so applying the
//! pipeline twice gives the same result as applying it once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DEFAULT_DOCUMENT_STATUS, MISSING_PRECEDENCE, OPEN_VALIDITY_END, OPEN_VALIDITY_START,
};
use crate::types::{DocumentMetadata, ScoredDocument};

// ============================================================================
// GovernanceCriteria
// ============================================================================

/// Governance criteria supplied with a retrieval request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceCriteria {
    /// Required status; `None` uses the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Maximum precedence (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_precedence: Option<u32>,

    /// Lower bound on `validity_start` (ISO date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,

    /// Upper bound on `validity_end` (ISO date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,

    /// Allowed document types; empty allows all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_types: Vec<String>,
}

impl GovernanceCriteria {
    /// Empty criteria: only the default status filter applies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the precedence ceiling.
    pub fn with_max_precedence(mut self, max: u32) -> Self {
        self.max_precedence = Some(max);
        self
    }

    /// Set the validity window bounds.
    pub fn with_validity(mut self, from: Option<&str>, until: Option<&str>) -> Self {
        self.valid_from = from.map(str::to_string);
        self.valid_until = until.map(str::to_string);
        self
    }

    /// Set the type allow-list.
    pub fn with_document_types(mut self, types: Vec<String>) -> Self {
        self.document_types = types;
        self
    }

    /// Warnings for bounds that are not ISO `YYYY-MM-DD` dates.
    ///
    /// Non-ISO bounds are still applied, compared lexically.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, bound) in [
            ("valid_from", &self.valid_from),
            ("valid_until", &self.valid_until),
        ] {
            if let Some(value) = bound {
                if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                    warnings.push(format!(
                        "Filter {} `{}` is not an ISO date (YYYY-MM-DD); comparison is lexical",
                        name, value
                    ));
                }
            }
        }
        warnings
    }
}

// ============================================================================
// GovernanceReport
// ============================================================================

/// How many documents each filter removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceReport {
    /// Documents entering the pipeline.
    pub input: usize,
    /// Removed by the status filter.
    pub removed_by_status: usize,
    /// Removed by the precedence ceiling.
    pub removed_by_precedence: usize,
    /// Removed by the validity window.
    pub removed_by_validity: usize,
    /// Removed by the type allow-list.
    pub removed_by_type: usize,
    /// Documents leaving the pipeline.
    pub output: usize,
    /// Criteria warnings (non-ISO bounds).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GovernanceReport {
    /// Total documents removed.
    pub fn removed(&self) -> usize {
        self.input - self.output
    }
}

// ============================================================================
// GovernancePipeline
// ============================================================================

/// The ordered filter pipeline, bound to the default status.
#[derive(Debug, Clone)]
pub struct GovernancePipeline {
    default_status: String,
}

impl Default for GovernancePipeline {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_STATUS)
    }
}

impl GovernancePipeline {
    /// Create a pipeline whose status filter defaults to `default_status`.
    pub fn new(default_status: impl Into<String>) -> Self {
        Self {
            default_status: default_status.into(),
        }
    }

    /// The status required when criteria carry none.
    pub fn default_status(&self) -> &str {
        &self.default_status
    }

    /// Apply every filter in order.
    pub fn apply(
        &self,
        documents: Vec<ScoredDocument>,
        criteria: &GovernanceCriteria,
    ) -> (Vec<ScoredDocument>, GovernanceReport) {
        let mut report = GovernanceReport {
            input: documents.len(),
            warnings: criteria.validate(),
            ..Default::default()
        };

        let required_status = criteria
            .status
            .as_deref()
            .unwrap_or(self.default_status.as_str());
        let (docs, removed) = retain(documents, |m| status_matches(m, required_status));
        report.removed_by_status = removed;

        let (docs, removed) = match criteria.max_precedence {
            Some(max) => retain(docs, |m| precedence_within(m, max)),
            None => (docs, 0),
        };
        report.removed_by_precedence = removed;

        let (docs, removed) = if criteria.valid_from.is_some() || criteria.valid_until.is_some() {
            retain(docs, |m| {
                validity_within(m, criteria.valid_from.as_deref(), criteria.valid_until.as_deref())
            })
        } else {
            (docs, 0)
        };
        report.removed_by_validity = removed;

        let (docs, removed) = if criteria.document_types.is_empty() {
            (docs, 0)
        } else {
            retain(docs, |m| type_allowed(m, &criteria.document_types))
        };
        report.removed_by_type = removed;

        report.output = docs.len();
        debug!(
            "Governance filters: {} -> {} (status -{}, precedence -{}, validity -{}, type -{})",
            report.input,
            report.output,
            report.removed_by_status,
            report.removed_by_precedence,
            report.removed_by_validity,
            report.removed_by_type
        );

        (docs, report)
    }
}

fn retain<F>(documents: Vec<ScoredDocument>, keep: F) -> (Vec<ScoredDocument>, usize)
where
    F: Fn(&DocumentMetadata) -> bool,
{
    let before = documents.len();
    let kept: Vec<ScoredDocument> = documents
        .into_iter()
        .filter(|d| keep(&d.document.metadata))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

fn status_matches(metadata: &DocumentMetadata, required: &str) -> bool {
    metadata.status.as_deref().unwrap_or(DEFAULT_DOCUMENT_STATUS) == required
}

fn precedence_within(metadata: &DocumentMetadata, max: u32) -> bool {
    metadata.precedence.unwrap_or(MISSING_PRECEDENCE) <= max
}

fn validity_within(metadata: &DocumentMetadata, from: Option<&str>, until: Option<&str>) -> bool {
    if let Some(from) = from {
        let start = metadata
            .validity_start
            .as_deref()
            .unwrap_or(OPEN_VALIDITY_START);
        if start < from {
            return false;
        }
    }
    if let Some(until) = until {
        let end = metadata.validity_end.as_deref().unwrap_or(OPEN_VALIDITY_END);
        if end > until {
            return false;
        }
    }
    true
}

fn type_allowed(metadata: &DocumentMetadata, allowed: &[String]) -> bool {
    metadata
        .document_type
        .as_deref()
        .is_some_and(|t| allowed.iter().any(|a| a == t))
}
