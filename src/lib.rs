//! Passim - Document Indexing and Retrieval Engine
//!
//! Splits documents into overlapping passages, embeds them with a local
//! model, and serves top-k similarity queries over a crash-safe vector
//! index. Documents are versioned: re-ingestion atomically replaces the
//! previous version, and queries only ever see fully published versions.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod splitter;
pub mod store;

pub use engine::{
    DocumentInput, EngineStats, IngestOutcome, QueryRequest, RetrievalEngine, ScoredPassage,
};
pub use error::{PassimError, Result};
