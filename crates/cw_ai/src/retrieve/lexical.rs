use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use cw_core::chunking::Chunk;
use cw_core::config::Settings;
use cw_core::corpus::load_corpus;
use cw_core::domain::RetrievedDoc;
use cw_core::error::AppError;
use cw_core::normalize::tokens;
use tracing::{debug, info};

use super::RetrievalBackend;

struct IndexedChunk {
    chunk: Chunk,
    tokens: BTreeSet<String>,
}

impl From<Chunk> for IndexedChunk {
    fn from(chunk: Chunk) -> Self {
        let tokens = tokens(&chunk.text);
        Self { chunk, tokens }
    }
}

/// In-memory token-overlap retrieval over the chunked corpus.
///
/// A chunk scores the number of distinct query tokens it contains. The index is built on
/// the first `retrieve` when `index_corpus` was never called.
pub struct LexicalBackend {
    corpus_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    index: RwLock<Option<Vec<IndexedChunk>>>,
}

impl LexicalBackend {
    pub fn new(settings: &Settings) -> Self {
        Self {
            corpus_path: settings.corpus_path.clone(),
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            index: RwLock::new(None),
        }
    }

    /// A backend over a fixed set of chunks; `index_corpus` would replace them from disk.
    pub fn from_chunks(settings: &Settings, chunks: Vec<Chunk>) -> Self {
        let backend = Self::new(settings);
        *backend.index.write().unwrap_or_else(PoisonError::into_inner) =
            Some(chunks.into_iter().map(IndexedChunk::from).collect());
        backend
    }

    fn load(&self) -> Result<Vec<IndexedChunk>, AppError> {
        let docs = load_corpus(&self.corpus_path, self.chunk_size, self.chunk_overlap)?;
        Ok(docs
            .into_iter()
            .flat_map(|d| d.chunks)
            .map(IndexedChunk::from)
            .collect())
    }

    fn ensure_indexed(&self) -> Result<(), AppError> {
        if self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            return Ok(());
        }
        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            let chunks = self.load()?;
            debug!(chunks = chunks.len(), "lazily indexed corpus");
            *guard = Some(chunks);
        }
        Ok(())
    }
}

impl RetrievalBackend for LexicalBackend {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn index_corpus(&self) -> Result<usize, AppError> {
        let chunks = self.load()?;
        let total = chunks.len();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(chunks);
        info!(backend = self.name(), chunks = total, "indexed corpus");
        Ok(total)
    }

    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDoc>, AppError> {
        self.ensure_indexed()?;

        let q = tokens(query);
        if q.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let guard = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let chunks = guard.as_deref().unwrap_or(&[]);

        let mut scored: Vec<(usize, usize)> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, q.intersection(&c.tokens).count()))
            .collect();
        // sort_by_key is stable: ties keep indexing order.
        scored.sort_by_key(|(_, overlap)| Reverse(*overlap));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, overlap)| RetrievedDoc {
                source_id: chunks[i].chunk.source_id.clone(),
                text: chunks[i].chunk.text.clone(),
                score: overlap as f64,
            })
            .collect())
    }
}
