//! Tokenizer for the lexical index.
//!
//! The default pipeline matches a plain `lower().split()`:
//! - Case folding (lowercasing)
//! - Whitespace split
//!
//! Optional stages, all off by default:
//! - Unicode word segmentation instead of whitespace split
//! - Portuguese stop word removal
//! - Portuguese Snowball stemming
//! - Minimum token length filtering

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::errors::NormativaError;

/// How raw text is split into candidate tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// Split on Unicode whitespace only; punctuation stays attached.
    #[default]
    Whitespace,
    /// Unicode word boundaries (UAX #29); punctuation is dropped.
    Unicode,
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whitespace => write!(f, "whitespace"),
            Self::Unicode => write!(f, "unicode"),
        }
    }
}

impl FromStr for TokenizerKind {
    type Err = NormativaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whitespace" => Ok(Self::Whitespace),
            "unicode" => Ok(Self::Unicode),
            other => Err(NormativaError::InvalidConfiguration {
                message: format!("unknown bm25.tokenizer `{}`", other),
                hint: "Use `whitespace` or `unicode`".to_string(),
            }),
        }
    }
}

/// Tokenizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Splitting strategy.
    pub kind: TokenizerKind,
    /// Apply Portuguese stemming to tokens.
    pub stemming: bool,
    /// Remove common Portuguese stop words.
    pub remove_stopwords: bool,
    /// Minimum token length (in chars) to include.
    pub min_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: TokenizerKind::Whitespace,
            stemming: false,
            remove_stopwords: false,
            min_token_length: 1,
        }
    }
}

/// Tokenizer applied identically at build and query time.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<&'static str>,
}

impl Tokenizer {
    /// Create a new tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Self {
        let stemmer = if config.stemming {
            Some(Stemmer::create(Algorithm::Portuguese))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            Self::default_stopwords()
        } else {
            HashSet::new()
        };

        Self {
            config,
            stemmer,
            stopwords,
        }
    }

    /// The configuration this tokenizer was built with.
    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Tokenize text into a vector of processed tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        match self.config.kind {
            TokenizerKind::Whitespace => text
                .split_whitespace()
                .filter_map(|word| self.process_token(word))
                .collect(),
            TokenizerKind::Unicode => text
                .unicode_words()
                .filter_map(|word| self.process_token(word))
                .collect(),
        }
    }

    /// Tokenize and count term frequencies.
    pub fn term_frequencies(&self, text: &str) -> HashMap<String, usize> {
        let mut tf: HashMap<String, usize> = HashMap::new();
        for token in self.tokenize(text) {
            *tf.entry(token).or_insert(0) += 1;
        }
        tf
    }

    fn process_token(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();

        if lower.chars().count() < self.config.min_token_length {
            return None;
        }

        if self.stopwords.contains(lower.as_str()) {
            return None;
        }

        let token = match self.stemmer {
            Some(ref stemmer) => stemmer.stem(&lower).to_string(),
            None => lower,
        };

        // Some stems fall under the minimum length
        if token.is_empty() || token.chars().count() < self.config.min_token_length {
            return None;
        }

        Some(token)
    }

    /// Portuguese function words common in regulatory prose.
    fn default_stopwords() -> HashSet<&'static str> {
        [
            // Articles
            "o", "a", "os", "as", "um", "uma", "uns", "umas",
            // Prepositions and contractions
            "de", "do", "da", "dos", "das", "em", "no", "na", "nos", "nas", "por", "pelo",
            "pela", "pelos", "pelas", "para", "com", "sem", "sob", "sobre", "entre", "até",
            "ao", "aos", "à", "às", "dum", "duma", "num", "numa",
            // Conjunctions
            "e", "ou", "mas", "nem", "que", "se", "como", "quando", "porque",
            // Pronouns
            "ele", "ela", "eles", "elas", "seu", "sua", "seus", "suas", "este", "esta",
            "estes", "estas", "esse", "essa", "esses", "essas", "isso", "isto", "aquele",
            "aquela", "qual", "quais", "quem", "lhe", "lhes",
            // Common verbs
            "é", "são", "ser", "foi", "foram", "será", "serão", "está", "estão", "ter",
            "tem", "têm", "há", "deve", "devem", "pode", "podem",
            // Other
            "não", "mais", "menos", "muito", "também", "já", "ainda", "apenas",
        ]
        .into_iter()
        .collect()
    }

    #[cfg(test)]
    fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}
