use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use cw_core::config::Settings;
use cw_core::corpus::load_corpus;
use cw_core::domain::RetrievedDoc;
use cw_core::error::AppError;
use tracing::{info, warn};

use super::RetrievalBackend;
use crate::embeddings::OllamaEmbedder;
use crate::ollama::OllamaClient;
use crate::store::{SqliteVectorStore, VectorEntry, VectorStore, SOURCE_ID_KEY};

/// Retrieval delegated to an embedding store. Scores are `1 - distance`.
pub struct VectorBackend {
    store: Box<dyn VectorStore>,
    corpus_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl VectorBackend {
    pub fn new(store: Box<dyn VectorStore>, settings: &Settings) -> Self {
        Self {
            store,
            corpus_path: settings.corpus_path.clone(),
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }

    /// Connect to the local embedding service and open the persistent store.
    ///
    /// Either every step succeeds and the backend is usable, or nothing is returned.
    pub fn open(settings: &Settings) -> Result<Self, AppError> {
        let client = OllamaClient::new(&settings.ollama_base_url)?;
        client.health_check()?;
        let store = SqliteVectorStore::open(
            &settings.vector_store_path,
            Box::new(OllamaEmbedder::new(client)),
            &settings.embedding_model,
        )?;
        Ok(Self::new(Box::new(store), settings))
    }
}

impl RetrievalBackend for VectorBackend {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn index_corpus(&self) -> Result<usize, AppError> {
        // Read the corpus before touching the store so a read failure leaves the old index intact.
        let docs = load_corpus(&self.corpus_path, self.chunk_size, self.chunk_overlap)?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for doc in docs {
            for (offset, chunk) in doc.chunks.into_iter().enumerate() {
                let id = format!("{}-{}", doc.source_id, offset);
                if !seen.insert(id.clone()) {
                    warn!(id = %id, path = %doc.path.display(), "duplicate chunk id, skipping");
                    continue;
                }
                entries.push(VectorEntry {
                    id,
                    metadata: BTreeMap::from([(SOURCE_ID_KEY.to_string(), chunk.source_id)]),
                    document: chunk.text,
                });
            }
        }

        self.store.replace_all(&entries)?;
        info!(backend = self.name(), chunks = entries.len(), "indexed corpus");
        Ok(entries.len())
    }

    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDoc>, AppError> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let result = self.store.query(&[query], top_k)?;

        // One query text in, so at most one batch out.
        let documents = result.documents.into_iter().next().unwrap_or_default();
        let metadatas = result.metadatas.into_iter().next().unwrap_or_default();
        let distances = result.distances.into_iter().next().unwrap_or_default();

        Ok(documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .map(|((text, meta), distance)| RetrievedDoc {
                source_id: meta
                    .get(SOURCE_ID_KEY)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                text,
                score: 1.0 - f64::from(distance),
            })
            .collect())
    }
}
