use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the passim engine
#[derive(Error, Debug)]
pub enum PassimError {
    /// Missing document or passage
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Stale explicit version supplied for a document write
    #[error("stale version for document {document_id}: supplied {supplied}, current {current}")]
    Conflict {
        document_id: String,
        supplied: u64,
        current: u64,
    },

    /// Vector length does not match the index dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Extraction boundary rejected the input format
    #[error("unsupported document format: {mime}")]
    UnsupportedFormat { mime: String },

    /// Embedding backend failed; the caller decides whether to retry
    #[error("embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// Query rejected before reaching the index
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Internal invariant violation, e.g. an orphaned vector discovered at
    /// startup; quarantined and logged, surfaced only when a caller must know
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Configuration related errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PassimError {
    /// Shorthand for a missing document
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "document",
            id: id.into(),
        }
    }

    /// Shorthand for a missing passage
    pub fn passage_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "passage",
            id: id.into(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for passim operations
pub type Result<T> = std::result::Result<T, PassimError>;
