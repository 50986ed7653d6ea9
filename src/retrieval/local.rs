//! Local document retriever.
//!
//! Loads `.txt` / `.md` files from a corpus directory, splits them into
//! overlapping chunks and ranks chunks by query-term overlap.

use std::fs;
use std::path::Path;

use async_trait::async_trait;

use super::retriever::{Retriever, SearchOutcome};
use super::text::{query_terms, split_into_chunks, term_overlap};
use crate::core::config::LocalSettings;
use crate::core::errors::ApiError;
use crate::research::types::RetrievedDocument;

const CORPUS_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// A text chunk with source information.
#[derive(Debug, Clone)]
struct CorpusChunk {
    text: String,
    source: String,
    chunk_index: usize,
}

pub struct LocalDocumentRetriever {
    settings: LocalSettings,
    chunks: Vec<CorpusChunk>,
}

impl LocalDocumentRetriever {
    pub fn new(settings: LocalSettings) -> Self {
        Self {
            settings,
            chunks: Vec::new(),
        }
    }

    /// Build a retriever and index every supported file under `dir`.
    ///
    /// A missing directory yields an empty corpus.
    pub fn from_dir(settings: LocalSettings, dir: &Path) -> Result<Self, ApiError> {
        let mut retriever = Self::new(settings);
        if dir.exists() {
            let files = retriever.load_dir(dir)?;
            tracing::info!(
                "Indexed {} files ({} chunks) from {}",
                files,
                retriever.chunk_count(),
                dir.display()
            );
        } else {
            tracing::warn!("Corpus directory {} does not exist", dir.display());
        }
        Ok(retriever)
    }

    /// Chunk and index raw text under the given source name.
    pub fn add_text(&mut self, source: &str, text: &str) -> usize {
        let pieces = split_into_chunks(
            text,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
            self.settings.max_chunks_per_document,
        );
        let added = pieces.len();
        for (chunk_index, piece) in pieces.into_iter().enumerate() {
            self.chunks.push(CorpusChunk {
                text: piece,
                source: source.to_string(),
                chunk_index,
            });
        }
        added
    }

    /// Recursively index supported files; returns the number of files read.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ApiError> {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .map_err(ApiError::internal)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        let mut files = 0;
        for path in entries {
            if path.is_dir() {
                files += self.load_dir(&path)?;
                continue;
            }

            let supported = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| CORPUS_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if !supported {
                continue;
            }

            match fs::read_to_string(&path) {
                Ok(text) => {
                    self.add_text(&path.to_string_lossy(), &text);
                    files += 1;
                }
                Err(err) => {
                    tracing::warn!("Skipping unreadable corpus file {}: {}", path.display(), err);
                }
            }
        }

        Ok(files)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl Retriever for LocalDocumentRetriever {
    fn name(&self) -> &str {
        "local_documents"
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        let terms = query_terms(query);
        if terms.is_empty() || self.chunks.is_empty() {
            return SearchOutcome::ok(Vec::new());
        }

        let mut scored: Vec<(&CorpusChunk, f32)> = self
            .chunks
            .iter()
            .map(|chunk| (chunk, term_overlap(&terms, &chunk.text)))
            .filter(|(_, score)| *score > 0.0 && *score >= self.settings.min_score)
            .collect();

        // stable sort keeps corpus order for ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.settings.max_results);

        let documents = scored
            .into_iter()
            .map(|(chunk, score)| {
                RetrievedDocument::new(chunk.text.clone(), score)
                    .with_metadata("source", chunk.source.clone())
                    .with_metadata("chunk_index", chunk.chunk_index.to_string())
                    .with_metadata("retriever", "local")
            })
            .collect();

        SearchOutcome::ok(documents)
    }
}
