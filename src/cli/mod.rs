//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "passim",
    version,
    about = "Document indexing and retrieval over a local vector index",
    long_about = "Passim splits documents into overlapping passages, embeds them locally, and \
                  serves similarity queries over a crash-safe vector index. Documents are \
                  versioned: re-ingesting changed content atomically replaces the previous \
                  version, and identical content is a no-op."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/passim/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document file into the corpus
    Ingest {
        /// File to ingest (.txt, .md, or .pdf)
        path: PathBuf,

        /// Document id (defaults to a fresh UUID; reuse an id to update)
        #[arg(short, long)]
        id: Option<String>,

        /// Source label stored with the document (defaults to the file path)
        #[arg(short, long)]
        source: Option<String>,

        /// Fail unless the document's active version matches (0 = new document)
        #[arg(long, value_name = "VERSION")]
        expect_version: Option<u64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the passages most similar to a query
    Query {
        /// Query text
        query: String,

        /// Maximum number of passages to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict results to a document (repeatable)
        #[arg(short, long = "document", value_name = "ID")]
        documents: Vec<String>,

        /// Drop results scoring below this threshold
        #[arg(long, value_name = "SCORE")]
        min_score: Option<f32>,

        /// Print full passage text instead of one-line snippets
        #[arg(long)]
        full: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a document, all its versions, and their vectors
    Rm {
        /// Document id
        id: String,
    },

    /// Show a document, one of its passages, or its archived text
    Get {
        /// Document id (or passage id with --passage)
        id: String,

        /// Treat the id as a passage id
        #[arg(long)]
        passage: bool,

        /// Print the document's archived text instead of its metadata
        #[arg(long, conflicts_with = "passage")]
        text: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show corpus and index statistics
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the index graph and drop unreferenced archive entries
    Compact,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
