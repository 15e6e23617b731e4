use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::normalize::normalize_text;

/// A bounded window of one source document. Lengths are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub source_id: String,
    pub text: String,
}

/// Reject window configurations that cannot make forward progress.
pub fn validate_window(chunk_size: usize, overlap: usize) -> Result<(), AppError> {
    if chunk_size == 0 {
        return Err(AppError::new(
            "CHUNK_CONFIG_INVALID",
            "Chunk size must be greater than zero",
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::new(
            "CHUNK_CONFIG_INVALID",
            "Chunk overlap must be smaller than chunk size",
        )
        .with_details(format!("chunk_size={chunk_size}; overlap={overlap}")));
    }
    Ok(())
}

/// Split `text` into blank-line separated paragraphs and slide a fixed window over each.
///
/// Consecutive windows of one paragraph share exactly `overlap` characters; windows never
/// span two paragraphs. Output order is paragraph order, then window order.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    validate_window(chunk_size, overlap)?;

    let normalized = normalize_text(text);
    let mut out = Vec::new();
    for para in normalized.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()) {
        // Byte offset of every char boundary, including the end of the paragraph.
        let mut bounds: Vec<usize> = para.char_indices().map(|(i, _)| i).collect();
        bounds.push(para.len());
        let char_len = bounds.len() - 1;

        let mut start = 0usize;
        loop {
            let end = (start + chunk_size).min(char_len);
            out.push(Chunk {
                source_id: source_id.to_string(),
                text: para[bounds[start]..bounds[end]].to_string(),
            });
            if end >= char_len {
                break;
            }
            start = end.saturating_sub(overlap);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_windows_share_overlap_chars() {
        let text = "A".repeat(500);
        let chunks = chunk_text("s1", &text, 200, 20).expect("chunk");
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].source_id, "s1");
        assert_eq!(&chunks[1].text[..20], &chunks[0].text[chunks[0].text.len() - 20..]);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = chunk_text("s1", "text", 10, 10).unwrap_err();
        assert_eq!(err.code, "CHUNK_CONFIG_INVALID");
        assert!(chunk_text("s1", "text", 0, 0).is_err());
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(chunk_text("s1", " \n\n\t\n\n", 10, 2).unwrap().is_empty());
    }
}
