use std::collections::BTreeMap;

use cw_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod similarity;
pub mod sqlite;

pub use sqlite::SqliteVectorStore;

/// Metadata key holding the originating source id of an entry.
pub const SOURCE_ID_KEY: &str = "source_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorEntry {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
}

/// Results of a batched query: the outer list has one element per query text, each inner
/// list is ordered by ascending distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<BTreeMap<String, String>>>,
    pub distances: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub chunk_count: u32,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub updated_at: Option<String>,
}

/// An embedding store that owns both vectorization and similarity search.
pub trait VectorStore: Send + Sync {
    /// Remove every entry. Cached embeddings may survive.
    fn reset(&self) -> Result<(), AppError>;
    fn add(&self, entries: &[VectorEntry]) -> Result<(), AppError>;
    /// Swap the whole contents for `entries` in one step. On error the previous contents stay.
    fn replace_all(&self, entries: &[VectorEntry]) -> Result<(), AppError>;
    fn query(&self, query_texts: &[&str], n_results: usize) -> Result<QueryResult, AppError>;
    fn count(&self) -> Result<usize, AppError>;
}
