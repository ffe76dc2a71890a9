//! BM25 inverted index.
//!
//! Built once from a corpus snapshot and never mutated afterwards:
//! - Term → postings with term frequencies
//! - Per-document token counts
//! - Pre-computed average document length

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::{Tokenizer, TokenizerConfig};
use super::Bm25Config;
use crate::types::{Document, ScoreOrigin, ScoredDocument};

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone)]
struct Posting {
    doc_idx: usize,
    term_freq: usize,
}

/// A raw BM25 hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25SearchResult {
    /// Position of the document in the snapshot.
    pub doc_idx: usize,
    /// Raw (unnormalized) BM25 score.
    pub score: f32,
    /// Rank in the result list (1-indexed).
    pub rank: usize,
}

/// Index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Stats {
    /// Number of indexed documents.
    pub documents: usize,
    /// Number of distinct terms.
    pub vocabulary_size: usize,
    /// Total tokens across all documents.
    pub total_tokens: usize,
    /// Average document length in tokens.
    pub avg_doc_len: f32,
}

/// Immutable BM25 index over a corpus snapshot.
pub struct Bm25Index {
    params: Bm25Params,
    tokenizer: Tokenizer,
    /// Term → (document frequency, postings in snapshot order).
    inverted_index: HashMap<String, (usize, Vec<Posting>)>,
    documents: Vec<Arc<Document>>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f32,
    total_tokens: usize,
}

impl Bm25Index {
    /// Build an index over the given documents, in order.
    pub fn build(config: &Bm25Config, documents: Vec<Arc<Document>>) -> Self {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            kind: config.tokenizer,
            stemming: config.stemming,
            remove_stopwords: config.remove_stopwords,
            min_token_length: config.min_token_length,
        });

        let mut inverted_index: HashMap<String, (usize, Vec<Posting>)> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());
        let mut total_tokens = 0usize;

        for (doc_idx, doc) in documents.iter().enumerate() {
            let tokens = tokenizer.tokenize(&doc.content);
            let doc_len = tokens.len();

            let mut term_freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }

            for (term, tf) in term_freqs {
                let entry = inverted_index.entry(term).or_insert((0, Vec::new()));
                entry.0 += 1;
                entry.1.push(Posting {
                    doc_idx,
                    term_freq: tf,
                });
            }

            doc_lengths.push(doc_len);
            total_tokens += doc_len;
        }

        let avg_doc_len = if documents.is_empty() {
            0.0
        } else {
            total_tokens as f32 / documents.len() as f32
        };

        Self {
            params: Bm25Params {
                k1: config.k1,
                b: config.b,
            },
            tokenizer,
            inverted_index,
            documents,
            doc_lengths,
            avg_doc_len,
            total_tokens,
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The indexed snapshot, in build order.
    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    /// Index statistics.
    pub fn stats(&self) -> Bm25Stats {
        Bm25Stats {
            documents: self.documents.len(),
            vocabulary_size: self.inverted_index.len(),
            total_tokens: self.total_tokens,
            avg_doc_len: self.avg_doc_len,
        }
    }

    /// Score every indexed document against the query and keep the top-k.
    ///
    /// Documents sharing no term with the query score 0. Results are sorted
    /// by score descending; equal scores keep snapshot order. Repeated query
    /// terms contribute once per occurrence.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Bm25SearchResult> {
        if self.documents.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let num_docs = self.documents.len();
        let mut scores = vec![0.0f32; num_docs];

        for term in self.tokenizer.tokenize(query) {
            let Some((df, postings)) = self.inverted_index.get(&term) else {
                continue;
            };
            let idf_val = idf(num_docs, *df);
            for posting in postings {
                scores[posting.doc_idx] += bm25_term_score(
                    posting.term_freq,
                    self.doc_lengths[posting.doc_idx],
                    self.avg_doc_len,
                    idf_val,
                    &self.params,
                );
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .enumerate()
            .map(|(i, (doc_idx, score))| Bm25SearchResult {
                doc_idx,
                score,
                rank: i + 1,
            })
            .collect()
    }

    /// Search and resolve hits to documents with raw lexical scores.
    pub fn search_documents(&self, query: &str, top_k: usize) -> Vec<ScoredDocument> {
        self.search(query, top_k)
            .into_iter()
            .map(|hit| {
                ScoredDocument::new(
                    Arc::clone(&self.documents[hit.doc_idx]),
                    hit.score,
                    ScoreOrigin::Lexical,
                )
            })
            .collect()
    }
}

impl std::fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Index")
            .field("params", &self.params)
            .field("stats", &self.stats())
            .finish()
    }
}
