//! Storage layer
//!
//! Structured corpus data lives in SQLite; the raw extracted text of every
//! ingested version lives in the content-addressed archive beside it.

pub mod archive;
pub mod corpus;

use crate::error::{PassimError, Result};
use std::path::Path;

pub use archive::{content_hash, ArchiveGcStats, TextArchive};
pub use corpus::{
    passage_id, CorpusStore, DbPool, DocumentRecord, InsertedPassage, StoreStats, StoredPassage,
    VersionStatus,
};

/// Calculate directory size recursively
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut size = 0u64;

    if path.is_dir() {
        for entry in std::fs::read_dir(path).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to read directory for size: {}", path.display()),
        })? {
            let entry = entry.map_err(|e| PassimError::Io {
                source: e,
                context: "Failed to read directory entry for size".to_string(),
            })?;
            let path = entry.path();

            if path.is_dir() {
                size += dir_size(&path)?;
            } else {
                size += entry
                    .metadata()
                    .map_err(|e| PassimError::Io {
                        source: e,
                        context: format!("Failed to get file metadata: {}", path.display()),
                    })?
                    .len();
            }
        }
    }

    Ok(size)
}

/// Format size as human-readable string
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_dir_size() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub").join("b.txt"), b"123").unwrap();

        assert_eq!(dir_size(temp.path()).unwrap(), 8);
    }
}
