//! Okapi BM25 scoring.
//!
//! ```text
//! score(D, Q) = Σ IDF(q_i) * (f(q_i, D) * (k1 + 1)) / (f(q_i, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```
//!
//! Where:
//! - f(q_i, D) = frequency of query term q_i in document D
//! - |D| = document length (in tokens)
//! - avgdl = average document length in the corpus
//! - k1 = term frequency saturation (default: 1.2)
//! - b = document length normalization (default: 0.75)

use serde::{Deserialize, Serialize};

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Document length normalization; 0 disables it.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Smoothed IDF, always positive:
///
/// ```text
/// IDF(t) = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
/// ```
#[inline]
pub fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score contribution of one query term to one document.
///
/// A zero `avg_doc_len` (corpus of empty documents) disables length
/// normalization instead of dividing by zero.
#[inline]
pub fn bm25_term_score(
    term_freq: usize,
    doc_len: usize,
    avg_doc_len: f32,
    idf_value: f32,
    params: &Bm25Params,
) -> f32 {
    let tf = term_freq as f32;
    let length_ratio = if avg_doc_len > 0.0 {
        doc_len as f32 / avg_doc_len
    } else {
        1.0
    };

    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * length_ratio);

    idf_value * numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_common_term_is_low_but_positive() {
        let idf_val = idf(1000, 900);
        assert!(idf_val < 0.5);
        assert!(idf_val > 0.0);
    }

    #[test]
    fn test_idf_rare_term() {
        assert!(idf(1000, 10) > 3.0);
        assert!(idf(1000, 1) > idf(1000, 10));
    }

    #[test]
    fn test_idf_all_docs_still_positive() {
        assert!(idf(3, 3) > 0.0);
    }

    #[test]
    fn test_length_normalization() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);
        let short = bm25_term_score(3, 50, 100.0, idf_val, &params);
        let long = bm25_term_score(3, 200, 100.0, idf_val, &params);
        assert!(short > long);
    }

    #[test]
    fn test_tf_saturation() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);
        let s1 = bm25_term_score(1, 100, 100.0, idf_val, &params);
        let s5 = bm25_term_score(5, 100, 100.0, idf_val, &params);
        let s50 = bm25_term_score(50, 100, 100.0, idf_val, &params);
        assert!(s5 > s1);
        assert!(s50 > s5);
        assert!(s50 < idf_val * (params.k1 + 1.0));
    }

    #[test]
    fn test_b_zero_ignores_length() {
        let params = Bm25Params { k1: 1.2, b: 0.0 };
        let idf_val = idf(10, 2);
        let short = bm25_term_score(2, 5, 50.0, idf_val, &params);
        let long = bm25_term_score(2, 500, 50.0, idf_val, &params);
        assert!((short - long).abs() < 1e-6);
    }

    #[test]
    fn test_zero_average_length_is_finite() {
        let score = bm25_term_score(1, 0, 0.0, idf(1, 1), &Bm25Params::default());
        assert!(score.is_finite());
    }
}
