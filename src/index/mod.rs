//! Durable vector index
//!
//! HNSW approximate nearest neighbor search over an owned vector table.
//! The graph cannot remove points, so deletes and overwrites leave stale
//! graph entries behind; the table is the source of truth. Searches
//! over-fetch past the stale entries, drop anything no longer live, and
//! recompute every returned score exactly from the table, so results are
//! correct even while the graph is dirty. Compaction rebuilds the graph
//! from the table once the stale fraction crosses a threshold.
//!
//! Persistence is an append-only record log plus a snapshot, both under the
//! index directory. The log is replayed over the snapshot on open; a torn
//! trailing record is discarded with a warning. `flush` folds the log into
//! a fresh snapshot.

use ahash::{AHashMap, AHashSet};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;

const LOG_FILE: &str = "vectors.log";
const SNAPSHOT_FILE: &str = "vectors.snap";

/// Sizing hint for the HNSW layer tables, not a hard cap
const GRAPH_CAPACITY: usize = 1 << 20;
const MAX_LAYER: usize = 16;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Index corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<IndexError> for crate::error::PassimError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidDimension { expected, actual } => {
                crate::error::PassimError::DimensionMismatch { expected, actual }
            }
            IndexError::Corrupt(message) => crate::error::PassimError::Consistency(message),
            other => crate::error::PassimError::Other(anyhow::anyhow!(other)),
        }
    }
}

/// Distance metric for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Dot,
}

impl Metric {
    pub fn parse(name: &str) -> Result<Self, IndexError> {
        match name {
            "cosine" => Ok(Metric::Cosine),
            "dot" => Ok(Metric::Dot),
            other => Err(IndexError::InitializationError(format!(
                "Unknown metric: {}. Supported: cosine, dot",
                other
            ))),
        }
    }

    /// Exact similarity score, higher is better
    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        match self {
            Metric::Dot => dot,
            Metric::Cosine => {
                let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if mag_a == 0.0 || mag_b == 0.0 {
                    0.0
                } else {
                    dot / (mag_a * mag_b)
                }
            }
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Dot => write!(f, "dot"),
        }
    }
}

/// Index tuning knobs, resolved from configuration
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub dimension: usize,
    pub metric: Metric,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub ef_search: usize,
    pub exact_search: bool,
    /// Rebuild the graph when stale entries exceed this fraction (0 disables)
    pub compact_dead_fraction: f32,
}

impl IndexOptions {
    pub fn from_config(config: &IndexConfig, dimension: usize) -> Result<Self, IndexError> {
        Ok(Self {
            dimension,
            metric: Metric::parse(&config.metric)?,
            hnsw_m: config.hnsw_m,
            hnsw_ef_construction: config.hnsw_ef_construction,
            ef_search: config.ef_search,
            exact_search: config.exact_search,
            compact_dead_fraction: config.compact_dead_fraction,
        })
    }
}

/// Search result with index key and exact similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub key: u64,
    pub score: f32,
}

/// Index counters for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub live_vectors: u64,
    pub stale_entries: u64,
    /// Fraction of graph entries that are tombstoned or replaced
    pub dead_fraction: f32,
    pub dimension: usize,
    pub metric: Metric,
    pub exact_search: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum LogRecord {
    Insert { key: u64, vector: Vec<f32> },
    Delete { key: u64 },
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    dimension: usize,
    metric: Metric,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: u64,
    vector: Vec<f32>,
}

/// HNSW graph specialized by metric
enum Graph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    Dot(Hnsw<'static, f32, DistDot>),
}

impl Graph {
    fn build(metric: Metric, m: usize, ef_construction: usize) -> Self {
        match metric {
            Metric::Cosine => Graph::Cosine(Hnsw::<f32, DistCosine>::new(
                m,
                GRAPH_CAPACITY,
                MAX_LAYER,
                ef_construction,
                DistCosine,
            )),
            Metric::Dot => Graph::Dot(Hnsw::<f32, DistDot>::new(
                m,
                GRAPH_CAPACITY,
                MAX_LAYER,
                ef_construction,
                DistDot,
            )),
        }
    }

    fn insert(&self, key: u64, vector: &[f32]) {
        let data = vector.to_vec();
        match self {
            Graph::Cosine(hnsw) => hnsw.insert((&data, key as usize)),
            Graph::Dot(hnsw) => hnsw.insert((&data, key as usize)),
        }
    }

    fn search(&self, query: &[f32], count: usize, ef: usize) -> Vec<Neighbour> {
        match self {
            Graph::Cosine(hnsw) => hnsw.search(query, count, ef),
            Graph::Dot(hnsw) => hnsw.search(query, count, ef),
        }
    }
}

struct IndexInner {
    graph: Graph,
    /// Live vectors by index key; the source of truth for scoring
    table: AHashMap<u64, Vec<f32>>,
    /// Total points ever inserted into the current graph
    graph_entries: u64,
    log_writer: File,
}

impl IndexInner {
    fn stale_entries(&self) -> u64 {
        self.graph_entries.saturating_sub(self.table.len() as u64)
    }

    fn dead_fraction(&self) -> f32 {
        if self.graph_entries == 0 {
            0.0
        } else {
            self.stale_entries() as f32 / self.graph_entries as f32
        }
    }
}

/// Durable ANN index over passage vectors
pub struct VectorIndex {
    inner: RwLock<IndexInner>,
    options: IndexOptions,
    log_path: PathBuf,
    snapshot_path: PathBuf,
}

impl VectorIndex {
    /// Open the index under `dir`, replaying any snapshot and log found there
    pub fn open(dir: &Path, options: IndexOptions) -> Result<Self, IndexError> {
        if options.dimension == 0 {
            return Err(IndexError::InitializationError(
                "index dimension must be greater than 0".to_string(),
            ));
        }
        std::fs::create_dir_all(dir)?;

        let log_path = dir.join(LOG_FILE);
        let snapshot_path = dir.join(SNAPSHOT_FILE);

        let mut table: AHashMap<u64, Vec<f32>> = AHashMap::new();
        if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path)?;
            let snapshot: Snapshot = serde_json::from_str(&raw)
                .map_err(|e| IndexError::Corrupt(format!("unreadable snapshot: {}", e)))?;
            if snapshot.dimension != options.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: options.dimension,
                    actual: snapshot.dimension,
                });
            }
            if snapshot.metric != options.metric {
                return Err(IndexError::InitializationError(format!(
                    "index on disk uses metric {}, configuration says {}",
                    snapshot.metric, options.metric
                )));
            }
            for entry in snapshot.entries {
                table.insert(entry.key, entry.vector);
            }
        }

        if log_path.exists() {
            Self::replay_log(&log_path, options.dimension, &mut table)?;
        }

        // Rebuild the graph from live vectors only
        let graph = Graph::build(options.metric, options.hnsw_m, options.hnsw_ef_construction);
        for (key, vector) in &table {
            graph.insert(*key, vector);
        }
        let graph_entries = table.len() as u64;

        let log_writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        debug!(
            "Vector index opened: {} live vectors, metric {}",
            table.len(),
            options.metric
        );

        Ok(Self {
            inner: RwLock::new(IndexInner {
                graph,
                table,
                graph_entries,
                log_writer,
            }),
            options,
            log_path,
            snapshot_path,
        })
    }

    fn replay_log(
        log_path: &Path,
        dimension: usize,
        table: &mut AHashMap<u64, Vec<f32>>,
    ) -> Result<(), IndexError> {
        let raw = std::fs::read_to_string(log_path)?;
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

        for (position, line) in lines.iter().enumerate() {
            let record: LogRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    if position == lines.len() - 1 {
                        // Interrupted append; everything before it is intact
                        warn!("Discarding torn record at end of vector log: {}", e);
                        break;
                    }
                    return Err(IndexError::Corrupt(format!(
                        "unreadable record {} in vector log: {}",
                        position + 1,
                        e
                    )));
                }
            };

            match record {
                LogRecord::Insert { key, vector } => {
                    if vector.len() != dimension {
                        return Err(IndexError::Corrupt(format!(
                            "logged vector for key {} has dimension {}, expected {}",
                            key,
                            vector.len(),
                            dimension
                        )));
                    }
                    table.insert(key, vector);
                }
                LogRecord::Delete { key } => {
                    table.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn append_record(inner: &mut IndexInner, record: &LogRecord) -> Result<(), IndexError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        inner.log_writer.write_all(line.as_bytes())?;
        inner.log_writer.flush()?;
        Ok(())
    }

    /// Insert a vector under `key`, overwriting any previous vector
    pub fn insert(&self, key: u64, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.options.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.options.dimension,
                actual: vector.len(),
            });
        }

        let mut inner = self.inner.write().unwrap();
        Self::append_record(
            &mut inner,
            &LogRecord::Insert {
                key,
                vector: vector.to_vec(),
            },
        )?;

        inner.table.insert(key, vector.to_vec());
        inner.graph.insert(key, vector);
        inner.graph_entries += 1;
        drop(inner);

        self.maybe_compact()
    }

    /// Insert multiple vectors
    pub fn insert_batch(&self, items: &[(u64, Vec<f32>)]) -> Result<(), IndexError> {
        for (key, vector) in items {
            if vector.len() != self.options.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: self.options.dimension,
                    actual: vector.len(),
                });
            }
        }

        let mut inner = self.inner.write().unwrap();
        for (key, vector) in items {
            Self::append_record(
                &mut inner,
                &LogRecord::Insert {
                    key: *key,
                    vector: vector.clone(),
                },
            )?;
            inner.table.insert(*key, vector.clone());
            inner.graph.insert(*key, vector);
            inner.graph_entries += 1;
        }
        drop(inner);

        self.maybe_compact()
    }

    /// Remove vectors by key; unknown keys are ignored
    ///
    /// Removal is logical: the graph keeps the points until the next
    /// compaction, but they can never appear in search results again.
    pub fn delete(&self, keys: &[u64]) -> Result<usize, IndexError> {
        let mut removed = 0;
        let mut inner = self.inner.write().unwrap();
        for key in keys {
            if inner.table.remove(key).is_some() {
                Self::append_record(&mut inner, &LogRecord::Delete { key: *key })?;
                removed += 1;
            }
        }
        drop(inner);

        self.maybe_compact()?;
        Ok(removed)
    }

    /// Search for the `k` nearest live vectors
    ///
    /// Results are sorted by score descending; equal scores break ties by
    /// ascending key so the ordering is total and reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.options.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.options.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().unwrap();
        if inner.table.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = if self.options.exact_search {
            inner
                .table
                .iter()
                .map(|(key, vector)| SearchResult {
                    key: *key,
                    score: self.options.metric.score(query, vector),
                })
                .collect()
        } else {
            // Ask for enough extra neighbors to ride over stale entries
            let fetch = k + inner.stale_entries() as usize;
            let ef = self.options.ef_search.max(fetch);
            let neighbours = inner.graph.search(query, fetch, ef);

            let mut seen: AHashSet<u64> = AHashSet::new();
            neighbours
                .into_iter()
                .filter_map(|neighbour| {
                    let key = neighbour.d_id as u64;
                    if !seen.insert(key) {
                        return None;
                    }
                    // Rescore from the table: the graph may hold a stale
                    // vector for this key after an overwrite
                    inner.table.get(&key).map(|vector| SearchResult {
                        key,
                        score: self.options.metric.score(query, vector),
                    })
                })
                .collect()
        };
        drop(inner);

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Whether `key` holds a live vector
    pub fn contains(&self, key: u64) -> bool {
        self.inner.read().unwrap().table.contains_key(&key)
    }

    /// All live keys, unordered
    pub fn keys(&self) -> Vec<u64> {
        self.inner.read().unwrap().table.keys().copied().collect()
    }

    pub fn len(&self) -> u64 {
        self.inner.read().unwrap().table.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.options.dimension
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read().unwrap();
        IndexStats {
            live_vectors: inner.table.len() as u64,
            stale_entries: inner.stale_entries(),
            dead_fraction: inner.dead_fraction(),
            dimension: self.options.dimension,
            metric: self.options.metric,
            exact_search: self.options.exact_search,
        }
    }

    fn maybe_compact(&self) -> Result<(), IndexError> {
        let threshold = self.options.compact_dead_fraction;
        if threshold <= 0.0 {
            return Ok(());
        }
        let needs_compaction = {
            let inner = self.inner.read().unwrap();
            inner.stale_entries() > 0 && inner.dead_fraction() >= threshold
        };
        if needs_compaction {
            self.compact()?;
        }
        Ok(())
    }

    /// Rebuild the graph from live vectors and fold the log into a snapshot
    pub fn compact(&self) -> Result<(), IndexError> {
        let mut inner = self.inner.write().unwrap();
        let stale = inner.stale_entries();

        let graph = Graph::build(
            self.options.metric,
            self.options.hnsw_m,
            self.options.hnsw_ef_construction,
        );
        for (key, vector) in &inner.table {
            graph.insert(*key, vector);
        }
        inner.graph = graph;
        inner.graph_entries = inner.table.len() as u64;

        Self::write_snapshot_and_truncate_log(
            &mut inner,
            &self.snapshot_path,
            &self.log_path,
            &self.options,
        )?;

        info!(
            "Vector index compacted: {} live vectors, {} stale entries dropped",
            inner.table.len(),
            stale
        );
        Ok(())
    }

    /// Persist the current state as a snapshot and truncate the log
    pub fn flush(&self) -> Result<(), IndexError> {
        let mut inner = self.inner.write().unwrap();
        Self::write_snapshot_and_truncate_log(
            &mut inner,
            &self.snapshot_path,
            &self.log_path,
            &self.options,
        )
    }

    fn write_snapshot_and_truncate_log(
        inner: &mut IndexInner,
        snapshot_path: &Path,
        log_path: &Path,
        options: &IndexOptions,
    ) -> Result<(), IndexError> {
        let snapshot = Snapshot {
            dimension: options.dimension,
            metric: options.metric,
            entries: inner
                .table
                .iter()
                .map(|(key, vector)| SnapshotEntry {
                    key: *key,
                    vector: vector.clone(),
                })
                .collect(),
        };

        // Write to a temp file first, then rename for atomicity. If we
        // crash before the truncate, replaying the old log over the new
        // snapshot is a harmless no-op.
        let tmp_path = snapshot_path.with_extension("snap.tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(serde_json::to_string(&snapshot)?.as_bytes())?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, snapshot_path)?;

        inner.log_writer = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)?;

        Ok(())
    }

    /// Flush and release the index
    pub fn close(&self) -> Result<(), IndexError> {
        self.flush()
    }
}
