use std::path::{Path, PathBuf};

use passim::cli::{Cli, Commands, ConfigAction};
use passim::config::Config;
use passim::engine::{DocumentInput, QueryRequest, RetrievalEngine};
use passim::error::{PassimError, Result};
use passim::extract;
use passim::store::format_size;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Ingest {
            path,
            id,
            source,
            expect_version,
            json,
        } => {
            cmd_ingest(cli.config, path, id, source, expect_version, json)?;
        }
        Commands::Query {
            query,
            limit,
            documents,
            min_score,
            full,
            json,
        } => {
            cmd_query(cli.config, &query, limit, documents, min_score, full, json)?;
        }
        Commands::Rm { id } => {
            cmd_rm(cli.config, &id)?;
        }
        Commands::Get {
            id,
            passage,
            text,
            json,
        } => {
            cmd_get(cli.config, &id, passage, text, json)?;
        }
        Commands::Status { json } => {
            cmd_status(cli.config, json)?;
        }
        Commands::Compact => {
            cmd_compact(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "passim=debug" } else { "passim=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_ingest(
    config_path: Option<PathBuf>,
    path: PathBuf,
    id: Option<String>,
    source: Option<String>,
    expect_version: Option<u64>,
    json: bool,
) -> Result<()> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mime = extract::mime_for_extension(extension).ok_or_else(|| {
        PassimError::UnsupportedFormat {
            mime: format!(".{}", extension),
        }
    })?;

    let bytes = std::fs::read(&path).map_err(|e| PassimError::Io {
        source: e,
        context: format!("Failed to read document: {}", path.display()),
    })?;
    let input = DocumentInput::new(bytes, mime)
        .with_source(source.unwrap_or_else(|| path.display().to_string()));

    let engine = open_engine(config_path)?;
    let rt = runtime()?;
    let outcome = rt.block_on(engine.ingest(id, input, expect_version))?;
    engine.close()?;

    if json {
        println!("{}", to_json(&outcome)?);
    } else if outcome.unchanged {
        println!(
            "Document {} unchanged (version {}), nothing to do",
            outcome.document_id, outcome.version
        );
    } else {
        println!("✓ Ingested {}", path.display());
        println!(
            "  Document: {} (version {})",
            outcome.document_id, outcome.version
        );
        println!("  Passages: {}", outcome.passage_count);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    config_path: Option<PathBuf>,
    query: &str,
    limit: Option<usize>,
    documents: Vec<String>,
    min_score: Option<f32>,
    full: bool,
    json: bool,
) -> Result<()> {
    let engine = open_engine(config_path)?;

    let mut request = QueryRequest::new(query);
    if let Some(limit) = limit {
        request = request.with_limit(limit);
    }
    if !documents.is_empty() {
        request = request.within_documents(documents);
    }
    request.min_score = min_score;

    let rt = runtime()?;
    let results = rt.block_on(engine.query(&request))?;

    if json {
        println!("{}", to_json(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching passages");
        return Ok(());
    }

    for (rank, hit) in results.iter().enumerate() {
        let origin = hit.source.as_deref().unwrap_or(&hit.document_id);
        println!(
            "{}. [{:.3}] {} #{} ({})",
            rank + 1,
            hit.score,
            origin,
            hit.ordinal,
            hit.passage_id
        );
        if full {
            for line in hit.text.lines() {
                println!("   {}", line);
            }
        } else {
            println!("   {}", snippet(&hit.text, 160));
        }
    }

    Ok(())
}

fn cmd_rm(config_path: Option<PathBuf>, id: &str) -> Result<()> {
    let engine = open_engine(config_path)?;
    let rt = runtime()?;
    let removed = rt.block_on(engine.delete(id))?;
    engine.close()?;

    println!("✓ Removed document {} ({} passages)", id, removed);
    Ok(())
}

fn cmd_get(
    config_path: Option<PathBuf>,
    id: &str,
    passage: bool,
    text: bool,
    json: bool,
) -> Result<()> {
    let engine = open_engine(config_path)?;

    if passage {
        let hit = engine.get_passage(id)?;
        if json {
            println!("{}", to_json(&hit)?);
        } else {
            println!(
                "Passage {} ({} v{} #{}, bytes {}..{})",
                hit.passage_id, hit.document_id, hit.version, hit.ordinal, hit.byte_start,
                hit.byte_end
            );
            println!("{}", hit.text);
        }
        return Ok(());
    }

    if text {
        // Raw archived text, pipe-friendly
        print!("{}", engine.document_text(id)?);
        return Ok(());
    }

    let doc = engine.get_document(id)?;
    if json {
        println!("{}", to_json(&doc)?);
    } else {
        println!("Document {}", doc.id);
        if let Some(source) = &doc.source {
            println!("  Source:   {}", source);
        }
        match doc.current_version {
            Some(version) => println!("  Version:  {}", version),
            None => println!("  Version:  none published"),
        }
        println!("  Passages: {}", doc.passage_count);
        if let Some(hash) = &doc.content_hash {
            println!("  Content:  {}", hash);
        }
    }

    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let stats = engine.stats()?;

    if json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!("Passim Status");
    println!("=============");

    println!(
        "\nDocuments: {} ({} versions, {} staged)",
        stats.store.documents, stats.store.total_versions, stats.store.staged_versions
    );
    println!("Active passages: {}", stats.store.active_passages);

    println!(
        "\nVectors: {} live, {} stale (dead fraction {:.1}%)",
        stats.index.live_vectors,
        stats.index.stale_entries,
        stats.index.dead_fraction * 100.0
    );
    let mode = if stats.index.exact_search {
        "exact scan"
    } else {
        "approximate (HNSW)"
    };
    println!("Search: {} metric, {}", stats.index.metric, mode);
    println!("Model: {} ({}D)", stats.model, stats.dimension);

    println!(
        "\nLast sweep: {} staged discarded, {} orphans evicted, {} missing vectors",
        stats.last_sweep.staged_discarded,
        stats.last_sweep.orphan_vectors_evicted,
        stats.last_sweep.missing_vectors
    );
    println!("Data size: {}", format_size(stats.data_dir_bytes));

    let documents = engine.list_documents(5)?;
    if !documents.is_empty() {
        println!("\nRecent documents:");
        for doc in &documents {
            let source = doc.source.as_deref().unwrap_or("-");
            match doc.current_version {
                Some(version) => println!(
                    "  {} - {} (v{}, {} passages)",
                    doc.id, source, version, doc.passage_count
                ),
                None => println!("  {} - {} (no published version)", doc.id, source),
            }
        }
    }

    Ok(())
}

fn cmd_compact(config_path: Option<PathBuf>) -> Result<()> {
    let engine = open_engine(config_path)?;
    let stats = engine.compact()?;
    engine.close()?;

    println!(
        "✓ Compacted: {} archive entries removed, {} freed",
        stats.deleted_entries,
        format_size(stats.freed_bytes)
    );
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| PassimError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'passim config init' to create one."
        );
        return Ok(Config::default());
    }

    Config::load(&path)
}

fn open_engine(config_path: Option<PathBuf>) -> Result<RetrievalEngine> {
    let mut config = load_config(config_path)?;
    config.storage.data_dir = expand_path(&config.storage.data_dir)?;
    RetrievalEngine::open(config)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PassimError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PassimError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| PassimError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| PassimError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

/// One-line preview of a passage, collapsed whitespace
fn snippet(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let cut: String = flattened.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
