//! Raw-text extraction boundary
//!
//! Turns document bytes plus a MIME type into plain UTF-8 text. PDF is the
//! only binary format handled here; plain text and markdown pass through
//! after UTF-8 validation. Everything downstream (splitter, embedder) only
//! ever sees the extracted string.

use thiserror::Error;

/// Supported MIME types
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}

impl From<ExtractError> for crate::error::PassimError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(mime) => {
                crate::error::PassimError::UnsupportedFormat { mime }
            }
            other => crate::error::PassimError::Other(anyhow::anyhow!(other)),
        }
    }
}

/// Extract plain text from document bytes.
///
/// The MIME type decides the extraction path; unrecognized types fail with
/// [`ExtractError::UnsupportedFormat`]. The returned text is exactly what
/// the splitter will partition, so extraction must be deterministic.
pub fn extract_text(bytes: &[u8], mime_type: &str) -> Result<String, ExtractError> {
    match mime_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => extract_utf8(bytes),
        _ => Err(ExtractError::UnsupportedFormat(mime_type.to_string())),
    }
}

/// Guess a MIME type from a file extension, for callers that only have a path
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => Some(MIME_PDF),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "txt" | "text" => Some(MIME_TEXT),
        _ => None,
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_utf8(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::InvalidEncoding(e.to_string()))
}
