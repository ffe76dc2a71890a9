//! Corpus snapshot loading.
//!
//! A snapshot is a JSONL file, one document per line:
//!
//! ```text
//! {"content": "...", "metadata": {"fonte": "Resolucao 12", "pagina": 3, "status": "Vigente"}}
//! {"page_content": "...", "metadata": {"source": "portaria-7.pdf", "precedencia": 2}}
//! ```
//!
//! Blank lines are skipped. The snapshot is read-only once loaded and shared
//! by `Arc` between the lexical index and the vector index.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::NormativaError;
use crate::types::Document;

/// An ordered, immutable set of documents.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    documents: Vec<Arc<Document>>,
    path: Option<PathBuf>,
}

impl CorpusSnapshot {
    /// Wrap in-memory documents.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: documents.into_iter().map(Arc::new).collect(),
            path: None,
        }
    }

    /// Load a JSONL snapshot.
    ///
    /// # Errors
    ///
    /// - `CorpusNotFound` if the file does not exist
    /// - `InvalidCorpus` with the 1-based line number of the first bad entry
    pub fn from_jsonl(path: &Path) -> Result<Self, NormativaError> {
        if !path.exists() {
            return Err(NormativaError::CorpusNotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut documents = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let doc: Document =
                serde_json::from_str(&line).map_err(|e| NormativaError::InvalidCorpus {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            documents.push(Arc::new(doc));
        }

        debug!("Loaded {} documents from {}", documents.len(), path.display());

        Ok(Self {
            documents,
            path: Some(path.to_path_buf()),
        })
    }

    /// Documents in snapshot order.
    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    /// Cloned `Arc` handles to every document.
    pub fn shared_documents(&self) -> Vec<Arc<Document>> {
        self.documents.clone()
    }

    /// File the snapshot was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the snapshot holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
