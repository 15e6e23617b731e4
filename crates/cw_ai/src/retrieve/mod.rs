use std::sync::Arc;

use cw_core::config::Settings;
use cw_core::domain::RetrievedDoc;
use cw_core::error::AppError;
use tracing::{info, warn};

pub mod lexical;
pub mod vector;

pub use lexical::LexicalBackend;
pub use vector::VectorBackend;

/// Indexes the corpus and answers top-k queries.
///
/// Results are ordered by descending score; equal scores keep indexing order.
pub trait RetrievalBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn index_corpus(&self) -> Result<usize, AppError>;
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDoc>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Try the vector backend, fall back to lexical.
    #[default]
    Auto,
    Lexical,
}

pub struct SelectedBackend {
    pub backend: Arc<dyn RetrievalBackend>,
    /// Why the vector backend was not used, when a construction attempt failed.
    pub fallback_reason: Option<AppError>,
}

impl SelectedBackend {
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }
}

/// Keep the vector backend when it was built, otherwise degrade to lexical retrieval.
pub fn choose_backend(attempt: Result<VectorBackend, AppError>, settings: &Settings) -> SelectedBackend {
    match attempt {
        Ok(vector) => {
            info!(backend = vector.name(), "selected retrieval backend");
            SelectedBackend {
                backend: Arc::new(vector),
                fallback_reason: None,
            }
        }
        Err(e) => {
            warn!(
                code = %e.code,
                details = e.details.as_deref().unwrap_or(""),
                "vector backend unavailable, falling back to lexical retrieval"
            );
            SelectedBackend {
                backend: Arc::new(LexicalBackend::new(settings)),
                fallback_reason: Some(e),
            }
        }
    }
}

/// Build the retrieval backend once for the process lifetime.
pub fn select_backend(settings: &Settings, choice: BackendChoice) -> SelectedBackend {
    match choice {
        BackendChoice::Lexical => {
            info!(backend = "lexical", "selected retrieval backend");
            SelectedBackend {
                backend: Arc::new(LexicalBackend::new(settings)),
                fallback_reason: None,
            }
        }
        BackendChoice::Auto => choose_backend(VectorBackend::open(settings), settings),
    }
}
