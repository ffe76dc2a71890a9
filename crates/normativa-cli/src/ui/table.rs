//! Table rendering for CLI output using comfy-table.
//!
//! ## Tables Overview
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `normativa retrieve` | `render_results_table()` |
//! | `normativa ask` / `validate` | `render_evidence_table()`, `render_scores_table()` |

use std::collections::BTreeMap;

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use super::format::{format_page, truncate_str};

/// Retrieved document row for `normativa retrieve`.
#[derive(Debug, Clone)]
pub struct ResultRow {
    /// 1-based rank
    pub rank: usize,
    /// Final score in [0, 1]
    pub score: f32,
    /// Source label
    pub source: String,
    /// Page within the source
    pub page: Option<u32>,
    /// Normative type
    pub document_type: String,
    /// Lifecycle status
    pub status: String,
    /// Leading text of the passage
    pub excerpt: String,
}

/// Evidence row for `normativa ask` and `normativa validate`.
#[derive(Debug, Clone)]
pub struct EvidenceRow {
    /// Citation number (`[n]`)
    pub citation: usize,
    /// Source label
    pub source: String,
    /// Page within the source
    pub page: Option<u32>,
    /// Normative type
    pub document_type: String,
    /// Retrieval score
    pub score: f32,
}

/// Render the ranked results of a retrieval.
///
/// # Example Output
///
/// ```text
/// #   SCORE   SOURCE            PAGE   TYPE        STATUS    EXCERPT
/// 1   1.000   Resolução 5.000      4   Resolução   Vigente   O relatório mensal deve...
/// ```
pub fn render_results_table(rows: &[ResultRow], excerpt_width: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("TYPE"),
        Cell::new("STATUS"),
        Cell::new("EXCERPT"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(2)),  // #
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // SCORE
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // SOURCE
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),  // PAGE
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // TYPE
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // STATUS
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // EXCERPT
    ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.rank).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.3}", row.score)).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&row.source, 30)),
            Cell::new(format_page(row.page)).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&row.document_type, 16)),
            Cell::new(&row.status),
            Cell::new(truncate_str(&row.excerpt, excerpt_width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render the evidence list behind an answer.
///
/// # Example Output
///
/// ```text
/// REF   SOURCE            PAGE   TYPE        SCORE
/// [1]   Resolução 5.000      4   Resolução   1.000
/// ```
pub fn render_evidence_table(rows: &[EvidenceRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("REF"),
        Cell::new("SOURCE"),
        Cell::new("PAGE").set_alignment(CellAlignment::Right),
        Cell::new("TYPE"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
    ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(format!("[{}]", row.citation)),
            Cell::new(truncate_str(&row.source, 40)),
            Cell::new(format_page(row.page)).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&row.document_type, 16)),
            Cell::new(format!("{:.3}", row.score)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render validator component scores.
pub fn render_scores_table(scores: &BTreeMap<String, f32>) -> String {
    if scores.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("COMPONENT"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
    ]);

    for (name, score) in scores {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:.3}", score)).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_row() -> ResultRow {
        ResultRow {
            rank: 1,
            score: 0.875,
            source: "Resolução 5.000".to_string(),
            page: Some(4),
            document_type: "Resolução".to_string(),
            status: "Vigente".to_string(),
            excerpt: "O relatório mensal deve ser entregue até o dia 10.".to_string(),
        }
    }

    #[test]
    fn test_results_table_contents() {
        let output = render_results_table(&[result_row()], 20);
        assert!(output.contains("SCORE"));
        assert!(output.contains("0.875"));
        assert!(output.contains("Resolução 5.000"));
        assert!(output.contains("O relatório mensa..."));
    }

    #[test]
    fn test_empty_tables() {
        assert!(render_results_table(&[], 20).is_empty());
        assert!(render_evidence_table(&[]).is_empty());
        assert!(render_scores_table(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_evidence_table_missing_page() {
        let output = render_evidence_table(&[EvidenceRow {
            citation: 2,
            source: "Portaria 30".to_string(),
            page: None,
            document_type: "Portaria".to_string(),
            score: 1.0,
        }]);
        assert!(output.contains("[2]"));
        assert!(output.contains("1.000"));
    }

    #[test]
    fn test_scores_table() {
        let mut scores = BTreeMap::new();
        scores.insert("citations".to_string(), 0.7);
        let output = render_scores_table(&scores);
        assert!(output.contains("citations"));
        assert!(output.contains("0.700"));
    }
}
