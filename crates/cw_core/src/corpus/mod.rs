use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::chunking::{chunk_text, Chunk};
use crate::error::AppError;

/// File extensions indexed from the corpus directory, in visiting order.
pub const CORPUS_EXTENSIONS: [&str; 2] = ["md", "txt"];

#[derive(Debug, Clone)]
pub struct CorpusDocument {
    pub source_id: String,
    pub path: PathBuf,
    pub chunks: Vec<Chunk>,
}

/// Corpus files ordered by extension group (`md` before `txt`), then by file name.
pub fn list_corpus_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::new("CORPUS_READ_FAILED", "Failed to read corpus directory")
            .with_details(format!("path={}; err={}", dir.display(), e))
    })?;

    let mut files: Vec<(usize, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::new("CORPUS_READ_FAILED", "Failed to list corpus directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|s| s.to_str());
        if let Some(rank) = CORPUS_EXTENSIONS.iter().position(|allowed| Some(*allowed) == ext) {
            files.push((rank, path));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.file_name().cmp(&b.1.file_name())));
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

pub fn source_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Read and chunk every allow-listed file. Any read or decode failure is fatal.
pub fn load_corpus(
    dir: &Path,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<CorpusDocument>, AppError> {
    let mut out = Vec::new();
    for path in list_corpus_files(dir)? {
        let text = fs::read_to_string(&path).map_err(|e| {
            AppError::new("CORPUS_READ_FAILED", "Failed to read corpus file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let source_id = source_id_for(&path);
        let chunks = chunk_text(&source_id, &text, chunk_size, overlap)?;
        debug!(source_id = %source_id, chunks = chunks.len(), "chunked corpus file");
        out.push(CorpusDocument {
            source_id,
            path,
            chunks,
        });
    }
    Ok(out)
}
