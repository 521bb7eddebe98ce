//! Retrieval engine
//!
//! Coordinates the extraction boundary, splitter, embedding pipeline,
//! corpus store, and vector index behind one handle with an explicit
//! open/close lifecycle.
//!
//! Writes to the same document are serialized through per-document locks.
//! An ingest stages everything first (archive entry, version row, passage
//! rows, vectors) and publishes in a single store transaction at the end,
//! so queries either see the old version or the new one, never a mix.
//! `open` discards staged leftovers from interrupted ingests and evicts
//! vectors that no longer back an active passage.

use ahash::{AHashMap, AHashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::{provider_from_config, EmbeddingPipeline, EmbeddingProvider};
use crate::error::{PassimError, Result};
use crate::extract;
use crate::index::{IndexOptions, IndexStats, VectorIndex};
use crate::splitter;
use crate::store::{
    ArchiveGcStats, CorpusStore, DocumentRecord, StoreStats, StoredPassage, TextArchive,
    VersionStatus,
};

/// Archive entries at or above this size are compressed
const ARCHIVE_COMPRESSION_THRESHOLD: usize = 1024;

/// Document bytes with their format and optional origin label
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub source: Option<String>,
}

impl DocumentInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// What an ingest did
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub version: u64,
    pub passage_count: u64,
    pub content_hash: String,
    /// True when the content matched the active version and nothing was written
    pub unchanged: bool,
}

/// Retrieval query
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    /// Number of results; 0 means the configured default
    pub limit: usize,
    /// Restrict results to these documents
    pub document_ids: Option<Vec<String>>,
    /// Override the configured score floor
    pub min_score: Option<f32>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 0,
            document_ids: None,
            min_score: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn within_documents(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }
}

/// A retrieved passage with its similarity score and document context
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredPassage {
    pub passage_id: String,
    pub document_id: String,
    pub version: u64,
    pub ordinal: u32,
    pub text: String,
    pub byte_start: u64,
    pub byte_end: u64,
    pub source: Option<String>,
    pub score: f32,
}

impl ScoredPassage {
    fn from_stored(passage: StoredPassage, score: f32) -> Self {
        Self {
            passage_id: passage.passage_id,
            document_id: passage.document_id,
            version: passage.version,
            ordinal: passage.ordinal,
            text: passage.text,
            byte_start: passage.byte_start,
            byte_end: passage.byte_end,
            source: passage.source,
            score,
        }
    }
}

/// What the startup consistency sweep found and repaired
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SweepReport {
    /// Staged versions discarded from interrupted ingests
    pub staged_discarded: u64,
    /// Vectors evicted because no active passage references them
    pub orphan_vectors_evicted: u64,
    /// Active passages with no vector; they stay queryable by id but
    /// cannot appear in similarity results until re-ingested
    pub missing_vectors: u64,
}

/// Combined counters for status reporting
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub store: StoreStats,
    pub index: IndexStats,
    pub model: String,
    pub dimension: usize,
    pub data_dir_bytes: u64,
    pub last_sweep: SweepReport,
}

/// Per-document async locks; writes to one document never interleave
struct DocumentLocks {
    inner: Mutex<AHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(AHashMap::new()),
        }
    }

    fn for_document(&self, document_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(document_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Document indexing and retrieval over one data directory
pub struct RetrievalEngine {
    config: Config,
    store: CorpusStore,
    archive: TextArchive,
    index: VectorIndex,
    pipeline: EmbeddingPipeline,
    locks: DocumentLocks,
    data_dir: PathBuf,
    last_sweep: SweepReport,
}

impl RetrievalEngine {
    /// Open the engine over `config.storage.data_dir`, creating it if needed
    ///
    /// Recovery runs before the handle is returned: staged versions from
    /// interrupted ingests are discarded and orphaned vectors evicted, so
    /// the first query already sees a consistent corpus.
    pub fn open(config: Config) -> Result<Self> {
        let provider = provider_from_config(&config.embedding)?;
        Self::open_with_provider(config, provider)
    }

    /// Open with a caller-supplied embedding provider
    pub fn open_with_provider(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let data_dir = config.storage.data_dir.clone();
        std::fs::create_dir_all(&data_dir).map_err(|e| PassimError::Io {
            source: e,
            context: format!("Failed to create data directory: {}", data_dir.display()),
        })?;

        let dimension = provider.dimension();
        if config.embedding.dimension != dimension {
            warn!(
                "Configured dimension {} ignored; provider {} produces {}",
                config.embedding.dimension,
                provider.model_name(),
                dimension
            );
        }

        let store = CorpusStore::new(&data_dir.join("corpus.db"))?;
        let archive = TextArchive::new(data_dir.clone(), ARCHIVE_COMPRESSION_THRESHOLD)?;
        let index = VectorIndex::open(
            &data_dir.join("index"),
            IndexOptions::from_config(&config.index, dimension)?,
        )?;
        let pipeline = EmbeddingPipeline::new(
            provider,
            config.embedding.batch_size,
            config.embedding.max_concurrent_batches,
        );

        let mut engine = Self {
            config,
            store,
            archive,
            index,
            pipeline,
            locks: DocumentLocks::new(),
            data_dir,
            last_sweep: SweepReport::default(),
        };
        engine.last_sweep = engine.recover()?;

        let stats = engine.store.stats()?;
        info!(
            "Engine opened: {} documents, {} passages, {} vectors",
            stats.documents,
            stats.active_passages,
            engine.index.len()
        );
        Ok(engine)
    }

    /// Discard interrupted work and restore store/index agreement
    fn recover(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for (document_id, version) in self.store.staged_versions()? {
            warn!(
                "Discarding staged version {} of document {} from interrupted ingest",
                version, document_id
            );
            let keys = self.store.passage_keys_for_version(&document_id, version)?;
            self.index.delete(&keys)?;
            self.store.discard_staged_version(&document_id, version)?;
            report.staged_discarded += 1;
        }

        let dropped = self.store.cleanup_superseded_rows()?;
        if dropped > 0 {
            debug!("Dropped {} leftover superseded passage rows", dropped);
        }

        let active: AHashSet<u64> = self.store.active_passage_keys()?.into_iter().collect();
        let indexed: AHashSet<u64> = self.index.keys().into_iter().collect();

        let orphans: Vec<u64> = indexed.difference(&active).copied().collect();
        if !orphans.is_empty() {
            warn!(
                "Consistency sweep: evicting {} orphaned vectors with no active passage",
                orphans.len()
            );
            self.index.delete(&orphans)?;
            report.orphan_vectors_evicted = orphans.len() as u64;
        }

        report.missing_vectors = active.difference(&indexed).count() as u64;
        if report.missing_vectors > 0 {
            warn!(
                "Consistency sweep: {} active passages have no vector",
                report.missing_vectors
            );
        }

        Ok(report)
    }

    /// Ingest a document
    ///
    /// With `document_id: None` a fresh id is assigned. Re-ingesting
    /// identical content for an existing document is a no-op; changed
    /// content becomes a new version that atomically replaces the old one.
    /// `expected_version` enables optimistic concurrency: the ingest fails
    /// with a conflict when the active version has moved past it.
    pub async fn ingest(
        &self,
        document_id: Option<String>,
        input: DocumentInput,
        expected_version: Option<u64>,
    ) -> Result<IngestOutcome> {
        let document_id =
            document_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.ingest_inner(document_id, input, expected_version, false, false)
            .await
    }

    /// Replace an existing document's content, always creating a new version
    pub async fn reingest(&self, document_id: &str, input: DocumentInput) -> Result<IngestOutcome> {
        self.ingest_inner(document_id.to_string(), input, None, true, true)
            .await
    }

    async fn ingest_inner(
        &self,
        document_id: String,
        input: DocumentInput,
        expected_version: Option<u64>,
        force: bool,
        require_existing: bool,
    ) -> Result<IngestOutcome> {
        let lock = self.locks.for_document(&document_id);
        let _guard = lock.lock().await;

        let existing = self.store.get_document(&document_id)?;
        if require_existing && existing.is_none() {
            return Err(PassimError::document_not_found(&document_id));
        }

        let current_version = existing.as_ref().and_then(|d| d.current_version);
        if let Some(supplied) = expected_version {
            let current = current_version.unwrap_or(0);
            if supplied != current {
                return Err(PassimError::Conflict {
                    document_id,
                    supplied,
                    current,
                });
            }
        }

        let text = extract::extract_text(&input.bytes, &input.mime_type)?;
        let (content_hash, _) = self.archive.store(&text)?;

        if !force {
            let active_hash = existing.as_ref().and_then(|d| d.content_hash.as_deref());
            if active_hash == Some(content_hash.as_str()) {
                info!(
                    "Document {} unchanged (content hash {}), skipping ingest",
                    document_id, content_hash
                );
                return Ok(IngestOutcome {
                    version: current_version.unwrap_or(0),
                    passage_count: existing.map(|d| d.passage_count).unwrap_or(0),
                    document_id,
                    content_hash,
                    unchanged: true,
                });
            }
        }

        let now = chrono::Utc::now().timestamp();
        self.store
            .upsert_document(&document_id, input.source.as_deref(), now)?;
        let version = self.store.next_version(&document_id)?;

        let drafts = splitter::split(
            &text,
            self.config.splitter.max_chars,
            self.config.splitter.overlap_chars,
        )?;

        self.store.create_staged_version(
            &document_id,
            version,
            &content_hash,
            drafts.len() as u64,
            now,
        )?;
        let inserted = self.store.insert_passages(&document_id, version, &drafts)?;

        // Everything from here until publish is invisible to queries; on
        // failure the staged version is discarded and nothing changed.
        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let staged_result = self.embed_and_index(&inserted, texts).await;
        if let Err(err) = staged_result {
            warn!(
                "Ingest of document {} version {} failed, discarding staged write: {}",
                document_id, version, err
            );
            let keys: Vec<u64> = inserted.iter().map(|p| p.index_key).collect();
            self.index.delete(&keys)?;
            self.store.discard_staged_version(&document_id, version)?;
            return Err(err);
        }

        let evicted = self.store.publish_version(&document_id, version, now)?;
        if let Some(prior) = current_version {
            self.index.delete(&evicted)?;
            self.store.delete_passage_rows(&document_id, prior)?;
        }

        info!(
            "Ingested document {} version {}: {} passages",
            document_id,
            version,
            inserted.len()
        );

        Ok(IngestOutcome {
            document_id,
            version,
            passage_count: inserted.len() as u64,
            content_hash,
            unchanged: false,
        })
    }

    async fn embed_and_index(
        &self,
        inserted: &[crate::store::InsertedPassage],
        texts: Vec<String>,
    ) -> Result<()> {
        if texts.is_empty() {
            return Ok(());
        }
        let embeddings = self.pipeline.embed_all(texts).await?;
        let items: Vec<(u64, Vec<f32>)> = inserted
            .iter()
            .map(|p| p.index_key)
            .zip(embeddings)
            .collect();
        self.index.insert_batch(&items)?;
        Ok(())
    }

    /// Remove a document, all its versions, and their vectors
    pub async fn delete(&self, document_id: &str) -> Result<u64> {
        let lock = self.locks.for_document(document_id);
        let _guard = lock.lock().await;

        let keys = self.store.delete_document(document_id)?;
        let removed = self.index.delete(&keys)?;
        info!(
            "Deleted document {}: {} passages evicted",
            document_id, removed
        );
        Ok(keys.len() as u64)
    }

    /// Retrieve the best-matching active passages for a query
    ///
    /// Results are ordered by score descending, ties broken by ascending
    /// passage id. When filters thin out the candidates, the search widens
    /// up to `max_search_multiplier * k` before giving up, so a filtered
    /// query is not starved by high-scoring passages outside the filter.
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredPassage>> {
        if request.text.trim().is_empty() {
            return Err(PassimError::InvalidQuery(
                "query text cannot be empty".to_string(),
            ));
        }

        let k = if request.limit == 0 {
            self.config.retrieval.default_limit
        } else {
            request.limit
        };
        let min_score = request.min_score.unwrap_or(self.config.retrieval.min_score);
        let document_filter: Option<AHashSet<&str>> = request
            .document_ids
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());

        let provider = self.pipeline.provider().clone();
        let text = request.text.clone();
        let query_vector = tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| PassimError::EmbeddingBackend(format!("embedding task panicked: {}", e)))??;

        let mut multiplier = self.config.retrieval.search_multiplier.max(1);
        let max_multiplier = self
            .config
            .retrieval
            .max_search_multiplier
            .max(multiplier);

        loop {
            let fetch = k * multiplier;
            let candidates = self.index.search(&query_vector, fetch)?;
            let exhausted = candidates.len() < fetch;

            let keys: Vec<u64> = candidates.iter().map(|c| c.key).collect();
            let mut by_key: AHashMap<u64, StoredPassage> = self
                .store
                .hydrate(&keys)?
                .into_iter()
                .map(|p| (p.index_key, p))
                .collect();

            let mut results: Vec<ScoredPassage> = candidates
                .iter()
                .filter_map(|c| {
                    let passage = by_key.remove(&c.key)?;
                    if let Some(filter) = &document_filter {
                        if !filter.contains(passage.document_id.as_str()) {
                            return None;
                        }
                    }
                    // A floor of 0.0 means no floor
                    if min_score > 0.0 && c.score < min_score {
                        return None;
                    }
                    Some(ScoredPassage::from_stored(passage, c.score))
                })
                .collect();

            if results.len() >= k || exhausted || multiplier >= max_multiplier {
                results.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.passage_id.cmp(&b.passage_id))
                });
                results.truncate(k);
                debug!(
                    "Query returned {} of {} requested passages (fetch breadth {})",
                    results.len(),
                    k,
                    fetch
                );
                return Ok(results);
            }

            // Filters swallowed too many candidates; widen and retry
            multiplier = (multiplier * 2).min(max_multiplier);
        }
    }

    /// Look up a passage by its stable id; only active versions are visible
    pub fn get_passage(&self, passage_id: &str) -> Result<StoredPassage> {
        match self.store.get_passage(passage_id)? {
            Some(passage) if passage.status == VersionStatus::Active => Ok(passage),
            _ => Err(PassimError::passage_not_found(passage_id)),
        }
    }

    /// Look up a document by id
    pub fn get_document(&self, document_id: &str) -> Result<DocumentRecord> {
        self.store
            .get_document(document_id)?
            .ok_or_else(|| PassimError::document_not_found(document_id))
    }

    /// List documents, most recently updated first
    pub fn list_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        self.store.list_documents(limit)
    }

    /// Reload a document's archived text, exactly as extracted at ingest
    pub fn document_text(&self, document_id: &str) -> Result<String> {
        let doc = self.get_document(document_id)?;
        let hash = doc.content_hash.ok_or_else(|| {
            PassimError::document_not_found(document_id)
        })?;
        self.archive.load(&hash)
    }

    pub fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            store: self.store.stats()?,
            index: self.index.stats(),
            model: self.pipeline.provider().model_name().to_string(),
            dimension: self.pipeline.provider().dimension(),
            data_dir_bytes: crate::store::dir_size(&self.data_dir)?,
            last_sweep: self.last_sweep,
        })
    }

    /// Rebuild the vector index graph and drop unreferenced archive entries
    pub fn compact(&self) -> Result<ArchiveGcStats> {
        self.index.compact()?;
        let referenced = self.store.referenced_content_hashes()?;
        let stats = self.archive.gc(&referenced)?;
        info!(
            "Compaction done: {} archive entries removed, {} freed",
            stats.deleted_entries,
            crate::store::format_size(stats.freed_bytes)
        );
        Ok(stats)
    }

    /// Flush the index and release the engine
    pub fn close(&self) -> Result<()> {
        self.index.flush()?;
        info!("Engine closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MIME_TEXT;
    use tempfile::TempDir;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.to_path_buf();
        config.splitter.max_chars = 60;
        config.splitter.overlap_chars = 12;
        config.embedding.provider = "hash".to_string();
        config.embedding.dimension = 64;
        config.retrieval.min_score = 0.0;
        config
    }

    fn open_engine(dir: &std::path::Path) -> RetrievalEngine {
        RetrievalEngine::open(test_config(dir)).unwrap()
    }

    fn text_input(text: &str) -> DocumentInput {
        DocumentInput::new(text.as_bytes().to_vec(), MIME_TEXT)
    }

    #[tokio::test]
    async fn test_ingest_and_query_round_trip() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let outcome = engine
            .ingest(
                Some("doc-1".to_string()),
                text_input("the signal relay controls the northern junction"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.version, 1);
        assert!(!outcome.unchanged);
        assert!(outcome.passage_count >= 1);

        let results = engine
            .query(&QueryRequest::new("signal relay junction").with_limit(3))
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document_id, "doc-1");
        assert!(results[0].score > 0.0);

        engine.close().unwrap();
    }

    #[tokio::test]
    async fn test_ingest_assigns_id_when_missing() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let outcome = engine
            .ingest(None, text_input("anonymous content"), None)
            .await
            .unwrap();
        assert!(!outcome.document_id.is_empty());
        assert!(engine.get_document(&outcome.document_id).is_ok());
    }

    #[tokio::test]
    async fn test_identical_content_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let first = engine
            .ingest(Some("doc-1".to_string()), text_input("stable content"), None)
            .await
            .unwrap();
        let second = engine
            .ingest(Some("doc-1".to_string()), text_input("stable content"), None)
            .await
            .unwrap();

        assert!(!first.unchanged);
        assert!(second.unchanged);
        assert_eq!(second.version, first.version);
        assert_eq!(second.content_hash, first.content_hash);

        let doc = engine.get_document("doc-1").unwrap();
        assert_eq!(doc.current_version, Some(1));
    }

    #[tokio::test]
    async fn test_reingest_replaces_old_version() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        engine
            .ingest(Some("doc-1".to_string()), text_input("original wording"), None)
            .await
            .unwrap();
        let old = engine
            .query(&QueryRequest::new("original wording").with_limit(1))
            .await
            .unwrap();
        let old_passage_id = old[0].passage_id.clone();

        let outcome = engine
            .reingest("doc-1", text_input("replacement wording"))
            .await
            .unwrap();
        assert_eq!(outcome.version, 2);

        // The old passage id is gone along with its version
        assert!(matches!(
            engine.get_passage(&old_passage_id),
            Err(PassimError::NotFound { .. })
        ));

        let results = engine
            .query(&QueryRequest::new("replacement wording").with_limit(5))
            .await
            .unwrap();
        assert!(results.iter().all(|p| p.version == 2));
    }

    #[tokio::test]
    async fn test_reingest_unknown_document_is_not_found() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let result = engine.reingest("ghost", text_input("whatever")).await;
        assert!(matches!(result, Err(PassimError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_expected_version_conflict() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        engine
            .ingest(Some("doc-1".to_string()), text_input("version one"), None)
            .await
            .unwrap();

        let result = engine
            .ingest(Some("doc-1".to_string()), text_input("version two"), Some(0))
            .await;
        assert!(matches!(
            result,
            Err(PassimError::Conflict {
                supplied: 0,
                current: 1,
                ..
            })
        ));

        // Matching expected version goes through
        let outcome = engine
            .ingest(Some("doc-1".to_string()), text_input("version two"), Some(1))
            .await
            .unwrap();
        assert_eq!(outcome.version, 2);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        engine
            .ingest(Some("doc-1".to_string()), text_input("disposable content"), None)
            .await
            .unwrap();
        let removed = engine.delete("doc-1").await.unwrap();
        assert!(removed >= 1);

        assert!(matches!(
            engine.get_document("doc-1"),
            Err(PassimError::NotFound { .. })
        ));
        assert!(matches!(
            engine.delete("doc-1").await,
            Err(PassimError::NotFound { .. })
        ));

        let results = engine
            .query(&QueryRequest::new("disposable content").with_limit(3))
            .await
            .unwrap();
        assert!(results.iter().all(|p| p.document_id != "doc-1"));
    }

    #[tokio::test]
    async fn test_empty_document_has_zero_passages() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let outcome = engine
            .ingest(Some("empty".to_string()), text_input(""), None)
            .await
            .unwrap();
        assert_eq!(outcome.passage_count, 0);

        let doc = engine.get_document("empty").unwrap();
        assert_eq!(doc.current_version, Some(1));
        assert_eq!(doc.passage_count, 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let result = engine
            .ingest(
                None,
                DocumentInput::new(vec![0u8; 16], "application/octet-stream"),
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(PassimError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let result = engine.query(&QueryRequest::new("   ")).await;
        assert!(matches!(result, Err(PassimError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_document_filter() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        engine
            .ingest(Some("a".to_string()), text_input("shared topic wording"), None)
            .await
            .unwrap();
        engine
            .ingest(Some("b".to_string()), text_input("shared topic wording too"), None)
            .await
            .unwrap();

        let results = engine
            .query(
                &QueryRequest::new("shared topic")
                    .with_limit(10)
                    .within_documents(vec!["b".to_string()]),
            )
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|p| p.document_id == "b"));
    }

    #[tokio::test]
    async fn test_document_text_round_trip() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        let content = "the exact archived text";
        engine
            .ingest(Some("doc-1".to_string()), text_input(content), None)
            .await
            .unwrap();
        assert_eq!(engine.document_text("doc-1").unwrap(), content);
    }

    #[tokio::test]
    async fn test_stats_reflect_corpus() {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(temp.path());

        engine
            .ingest(
                Some("doc-1".to_string()),
                text_input(&"repeated filler text ".repeat(30)),
                None,
            )
            .await
            .unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.store.documents, 1);
        assert!(stats.store.active_passages > 1);
        assert_eq!(stats.index.live_vectors, stats.store.active_passages);
        assert_eq!(stats.dimension, 64);
        assert_eq!(stats.model, "token-hash");
    }
}
