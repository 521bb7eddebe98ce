//! Content-addressed archive of extracted document text
//!
//! Every ingested version's raw text is kept under its BLAKE3 hash, so the
//! hash doubles as the version's content fingerprint: re-ingesting identical
//! content produces the same hash and can be recognized without comparing
//! text. Large texts are zstd-compressed; writes go through a temp file and
//! rename so a crash never leaves a half-written entry under its final name.

use crate::error::{PassimError, Result};
use ahash::AHashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ARCHIVE_DIR: &str = "texts";

pub struct TextArchive {
    base_path: PathBuf,
    compression_threshold: usize,
}

impl TextArchive {
    pub fn new(base_path: PathBuf, compression_threshold: usize) -> Result<Self> {
        let dir = base_path.join(ARCHIVE_DIR);
        fs::create_dir_all(&dir).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to create archive directory: {}", dir.display()),
        })?;

        Ok(Self {
            base_path,
            compression_threshold,
        })
    }

    /// Archive `text`, returning its content hash and whether it was new
    pub fn store(&self, text: &str) -> Result<(String, bool)> {
        let hash = content_hash(text);

        let final_path = self.entry_path(&hash);
        if final_path.exists() {
            return Ok((hash, false));
        }

        let data = text.as_bytes();
        let payload = if data.len() >= self.compression_threshold {
            zstd::encode_all(data, 3).map_err(|e| PassimError::Io {
                source: e,
                context: "Failed to compress archived text".to_string(),
            })?
        } else {
            data.to_vec()
        };

        let parent = final_path
            .parent()
            .ok_or_else(|| PassimError::Consistency("invalid archive path".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to create archive shard: {}", parent.display()),
        })?;

        let tmp_path = self.tmp_path(&hash);
        let mut file = fs::File::create(&tmp_path).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to create temp archive file: {}", tmp_path.display()),
        })?;
        file.write_all(&payload).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to write archive entry: {}", tmp_path.display()),
        })?;
        file.sync_all().map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to sync archive entry: {}", tmp_path.display()),
        })?;
        drop(file);

        fs::rename(&tmp_path, &final_path).map_err(|e| PassimError::Io {
            source: e,
            context: format!(
                "Failed to finalize archive entry: {} -> {}",
                tmp_path.display(),
                final_path.display()
            ),
        })?;

        Ok((hash, true))
    }

    /// Read archived text back by content hash
    pub fn load(&self, hash: &str) -> Result<String> {
        let path = self.entry_path(hash);
        if !path.exists() {
            return Err(PassimError::NotFound {
                kind: "archived text",
                id: hash.to_string(),
            });
        }

        let raw = fs::read(&path).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to read archive entry: {}", path.display()),
        })?;

        // Compressed entries start with the zstd magic, which is never
        // valid UTF-8, so trying decompression first is unambiguous
        let bytes = match zstd::decode_all(&raw[..]) {
            Ok(decompressed) => decompressed,
            Err(_) => raw,
        };

        String::from_utf8(bytes).map_err(|e| {
            PassimError::Consistency(format!("archive entry {} is not valid UTF-8: {}", hash, e))
        })
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.entry_path(hash).exists()
    }

    /// Delete entries whose hash is not in `referenced`
    pub fn gc(&self, referenced: &[String]) -> Result<ArchiveGcStats> {
        let referenced: AHashSet<&str> = referenced.iter().map(String::as_str).collect();
        let mut stats = ArchiveGcStats::default();

        for (hash, path) in self.entries()? {
            stats.total_entries += 1;
            if !referenced.contains(hash.as_str()) {
                if let Ok(metadata) = fs::metadata(&path) {
                    stats.freed_bytes += metadata.len();
                }
                if fs::remove_file(&path).is_ok() {
                    stats.deleted_entries += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Uses two-level sharding: texts/ab/cd/abcdef...
    fn entry_path(&self, hash: &str) -> PathBuf {
        self.base_path
            .join(ARCHIVE_DIR)
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(hash)
    }

    fn tmp_path(&self, hash: &str) -> PathBuf {
        self.base_path
            .join(ARCHIVE_DIR)
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{}.tmp", hash))
    }

    /// All (hash, path) pairs currently on disk, skipping temp files
    fn entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let root = self.base_path.join(ARCHIVE_DIR);
        let mut found = Vec::new();
        if !root.exists() {
            return Ok(found);
        }

        for shard1 in read_dir(&root)? {
            if !shard1.is_dir() {
                continue;
            }
            for shard2 in read_dir(&shard1)? {
                if !shard2.is_dir() {
                    continue;
                }
                for entry in read_dir(&shard2)? {
                    if !entry.is_file() {
                        continue;
                    }
                    if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                        if !name.ends_with(".tmp") {
                            found.push((name.to_string(), entry));
                        }
                    }
                }
            }
        }

        Ok(found)
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PassimError::Io {
        source: e,
        context: format!("Failed to read archive directory: {}", dir.display()),
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to read archive entry in {}", dir.display()),
        })?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// BLAKE3 content hash, truncated to 32 hex characters
pub fn content_hash(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes());
    format!("{:.32}", hash.to_hex())
}

/// Statistics from archive garbage collection
#[derive(Debug, Default)]
pub struct ArchiveGcStats {
    pub total_entries: usize,
    pub deleted_entries: usize,
    pub freed_bytes: u64,
}
