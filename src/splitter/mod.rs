//! Deterministic passage splitter
//!
//! Partitions extracted document text into fixed-size character windows with
//! a configurable overlap, in source order. The split is reversible: the
//! first passage plus every later passage minus its first `overlap` chars
//! reconstructs the input exactly, which is what makes re-ingestion and
//! span-based provenance trustworthy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("max passage length must be greater than 0")]
    InvalidMaxLength,

    #[error("overlap ({overlap}) must be smaller than max passage length ({max})")]
    InvalidOverlap { overlap: usize, max: usize },
}

impl From<SplitError> for crate::error::PassimError {
    fn from(err: SplitError) -> Self {
        crate::error::PassimError::Config(err.to_string())
    }
}

/// A passage produced by the splitter, before it has an identity or a vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageDraft {
    /// Position within the document, starting at 0
    pub ordinal: u32,
    /// Passage text, exactly `text[byte_start..byte_end]` of the source
    pub text: String,
    /// Byte offset of the passage start in the source text
    pub byte_start: usize,
    /// Byte offset one past the passage end
    pub byte_end: usize,
}

/// Split `text` into overlapping passages of at most `max_chars` characters.
///
/// Each passage after the first starts `max_chars - overlap_chars`
/// characters after its predecessor, so consecutive passages share exactly
/// `overlap_chars` characters (the final passage may be shorter than
/// `max_chars` but is always longer than the overlap). Lengths are counted
/// in characters; the recorded spans are byte offsets, always on character
/// boundaries.
///
/// Empty input yields zero passages and a warning, not an error.
pub fn split(
    text: &str,
    max_chars: usize,
    overlap_chars: usize,
) -> Result<Vec<PassageDraft>, SplitError> {
    if max_chars == 0 {
        return Err(SplitError::InvalidMaxLength);
    }
    if overlap_chars >= max_chars {
        return Err(SplitError::InvalidOverlap {
            overlap: overlap_chars,
            max: max_chars,
        });
    }

    if text.is_empty() {
        tracing::warn!("empty document produced zero passages");
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, including the end of text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;
    let stride = max_chars - overlap_chars;

    let mut drafts = Vec::new();
    let mut start_char = 0usize;
    let mut ordinal = 0u32;

    loop {
        let end_char = (start_char + max_chars).min(total_chars);
        let byte_start = boundaries[start_char];
        let byte_end = boundaries[end_char];

        drafts.push(PassageDraft {
            ordinal,
            text: text[byte_start..byte_end].to_string(),
            byte_start,
            byte_end,
        });

        if end_char == total_chars {
            break;
        }
        start_char += stride;
        ordinal += 1;
    }

    Ok(drafts)
}
