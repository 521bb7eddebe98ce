//! SQLite corpus store with migrations
//!
//! Holds documents, their versions, and the passages of each version.
//! Passages carry two identities: the SQLite rowid doubles as the vector
//! index key, and `passage_id` is the stable public identifier derived
//! from (document, version, ordinal).
//!
//! Version lifecycle: a new version is written as `staged` and becomes
//! visible only when `publish_version` flips it to `active` in a single
//! transaction, superseding the prior active version. Staged versions
//! found on startup are leftovers from an interrupted ingest and are
//! discarded.

use crate::error::{PassimError, Result};
use crate::splitter::PassageDraft;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Lifecycle state of a document version
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    /// Written but not yet visible to queries
    Staged,
    /// The single visible version of its document
    Active,
    /// Replaced by a newer active version
    Superseded,
}

impl VersionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Staged => "staged",
            VersionStatus::Active => "active",
            VersionStatus::Superseded => "superseded",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "staged" => Ok(VersionStatus::Staged),
            "active" => Ok(VersionStatus::Active),
            "superseded" => Ok(VersionStatus::Superseded),
            other => Err(PassimError::Consistency(format!(
                "unknown version status in database: {}",
                other
            ))),
        }
    }
}

/// A document with its currently active version, if any
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub source: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub current_version: Option<u64>,
    pub content_hash: Option<String>,
    pub passage_count: u64,
}

/// A stored passage with its document context
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredPassage {
    pub index_key: u64,
    pub passage_id: String,
    pub document_id: String,
    pub version: u64,
    pub ordinal: u32,
    pub text: String,
    pub byte_start: u64,
    pub byte_end: u64,
    pub source: Option<String>,
    pub status: VersionStatus,
}

/// Identities assigned to a passage at insert time
#[derive(Debug, Clone)]
pub struct InsertedPassage {
    pub index_key: u64,
    pub passage_id: String,
}

/// Corpus counters for status reporting
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub documents: u64,
    pub active_passages: u64,
    pub staged_versions: u64,
    pub total_versions: u64,
}

/// Stable public passage identifier
pub fn passage_id(document_id: &str, version: u64, ordinal: u32) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(document_id.as_bytes());
    hasher.update(&version.to_le_bytes());
    hasher.update(&ordinal.to_le_bytes());
    format!("{:.32}", hasher.finalize().to_hex())
}

/// SQLite-backed store for documents, versions, and passages
pub struct CorpusStore {
    pool: DbPool,
}

impl CorpusStore {
    /// Open or create the corpus database at `db_path`
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PassimError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder().max_size(16).build(manager)?;

        {
            let conn = pool.get()?;
            // WAL for concurrent readers during ingest
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Create the document row, or refresh its source and timestamp
    pub fn upsert_document(&self, id: &str, source: Option<&str>, now: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (id, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 source = COALESCE(excluded.source, documents.source),
                 updated_at = excluded.updated_at",
            params![id, source, now],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT d.id, d.source, d.created_at, d.updated_at, d.current_version,
                    v.content_hash, COALESCE(v.passage_count, 0)
             FROM documents d
             LEFT JOIN document_versions v
                 ON v.document_id = d.id AND v.version = d.current_version
             WHERE d.id = ?1",
            params![id],
            |row| {
                Ok(DocumentRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                    current_version: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                    content_hash: row.get(5)?,
                    passage_count: row.get::<_, i64>(6)? as u64,
                })
            },
        )
        .optional()
        .map_err(PassimError::from)
    }

    pub fn document_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Next version number for a document, counting every status
    pub fn next_version(&self, document_id: &str) -> Result<u64> {
        let conn = self.conn()?;
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM document_versions WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(max as u64 + 1)
    }

    /// Record a new staged version
    pub fn create_staged_version(
        &self,
        document_id: &str,
        version: u64,
        content_hash: &str,
        passage_count: u64,
        now: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO document_versions
                 (document_id, version, status, content_hash, passage_count, created_at)
             VALUES (?1, ?2, 'staged', ?3, ?4, ?5)",
            params![
                document_id,
                version as i64,
                content_hash,
                passage_count as i64,
                now
            ],
        )?;
        Ok(())
    }

    /// Insert passages for a staged version, in draft order
    ///
    /// Returns the assigned index keys and stable passage ids, aligned with
    /// the input slice.
    pub fn insert_passages(
        &self,
        document_id: &str,
        version: u64,
        drafts: &[PassageDraft],
    ) -> Result<Vec<InsertedPassage>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut inserted = Vec::with_capacity(drafts.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO passages
                     (passage_id, document_id, version, ordinal, text, byte_start, byte_end)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for draft in drafts {
                let pid = passage_id(document_id, version, draft.ordinal);
                stmt.execute(params![
                    pid,
                    document_id,
                    version as i64,
                    draft.ordinal,
                    draft.text,
                    draft.byte_start as i64,
                    draft.byte_end as i64,
                ])?;
                inserted.push(InsertedPassage {
                    index_key: tx.last_insert_rowid() as u64,
                    passage_id: pid,
                });
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Atomically make a staged version the active one
    ///
    /// The prior active version (if any) is marked superseded in the same
    /// transaction; its index keys are returned so the caller can evict the
    /// vectors and drop the rows.
    pub fn publish_version(&self, document_id: &str, version: u64, now: i64) -> Result<Vec<u64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let prior: Option<i64> = tx
            .query_row(
                "SELECT version FROM document_versions
                 WHERE document_id = ?1 AND status = 'active'",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;

        let mut evicted_keys = Vec::new();
        if let Some(prior_version) = prior {
            {
                let mut stmt = tx.prepare(
                    "SELECT id FROM passages WHERE document_id = ?1 AND version = ?2",
                )?;
                let rows = stmt.query_map(params![document_id, prior_version], |row| {
                    row.get::<_, i64>(0)
                })?;
                for row in rows {
                    evicted_keys.push(row? as u64);
                }
            }
            tx.execute(
                "UPDATE document_versions SET status = 'superseded'
                 WHERE document_id = ?1 AND version = ?2",
                params![document_id, prior_version],
            )?;
        }

        let updated = tx.execute(
            "UPDATE document_versions SET status = 'active', published_at = ?3
             WHERE document_id = ?1 AND version = ?2 AND status = 'staged'",
            params![document_id, version as i64, now],
        )?;
        if updated != 1 {
            return Err(PassimError::Consistency(format!(
                "cannot publish document {} version {}: no such staged version",
                document_id, version
            )));
        }

        tx.execute(
            "UPDATE documents SET current_version = ?2, updated_at = ?3 WHERE id = ?1",
            params![document_id, version as i64, now],
        )?;

        tx.commit()?;
        Ok(evicted_keys)
    }

    /// Index keys of a specific version's passages
    pub fn passage_keys_for_version(&self, document_id: &str, version: u64) -> Result<Vec<u64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM passages WHERE document_id = ?1 AND version = ?2")?;
        let rows = stmt.query_map(params![document_id, version as i64], |row| {
            row.get::<_, i64>(0)
        })?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row? as u64);
        }
        Ok(keys)
    }

    /// Drop the passage rows of a version that is no longer queryable
    pub fn delete_passage_rows(&self, document_id: &str, version: u64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM passages WHERE document_id = ?1 AND version = ?2",
            params![document_id, version as i64],
        )?;
        Ok(deleted)
    }

    /// Remove a document and everything under it
    ///
    /// Returns the index keys of every remaining passage row so the caller
    /// can evict the vectors.
    pub fn delete_document(&self, document_id: &str) -> Result<Vec<u64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut keys = Vec::new();
        {
            let mut stmt = tx.prepare("SELECT id FROM passages WHERE document_id = ?1")?;
            let rows = stmt.query_map(params![document_id], |row| row.get::<_, i64>(0))?;
            for row in rows {
                keys.push(row? as u64);
            }
        }

        // Versions and passages go with the document via ON DELETE CASCADE
        let deleted = tx.execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
        if deleted == 0 {
            return Err(PassimError::document_not_found(document_id));
        }

        tx.commit()?;
        Ok(keys)
    }

    /// Look up a passage by its stable id, whatever its version status
    pub fn get_passage(&self, passage_id: &str) -> Result<Option<StoredPassage>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT p.id, p.passage_id, p.document_id, p.version, p.ordinal, p.text,
                    p.byte_start, p.byte_end, d.source, v.status
             FROM passages p
             JOIN document_versions v
                 ON v.document_id = p.document_id AND v.version = p.version
             JOIN documents d ON d.id = p.document_id
             WHERE p.passage_id = ?1",
            params![passage_id],
            Self::stored_passage_row,
        )
        .optional()?
        .map(|(passage, status)| {
            Ok(StoredPassage {
                status: VersionStatus::parse(&status)?,
                ..passage
            })
        })
        .transpose()
    }

    /// Fetch active passages by index key
    ///
    /// Keys pointing at staged or missing rows are silently dropped; the
    /// result order is unspecified.
    pub fn hydrate(&self, keys: &[u64]) -> Result<Vec<StoredPassage>> {
        let conn = self.conn()?;
        let mut out = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(256) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT p.id, p.passage_id, p.document_id, p.version, p.ordinal, p.text,
                        p.byte_start, p.byte_end, d.source, v.status
                 FROM passages p
                 JOIN document_versions v
                     ON v.document_id = p.document_id AND v.version = p.version
                 JOIN documents d ON d.id = p.document_id
                 WHERE v.status = 'active' AND p.id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let params_vec: Vec<i64> = chunk.iter().map(|k| *k as i64).collect();
            let rows = stmt.query_map(
                rusqlite::params_from_iter(params_vec.iter()),
                Self::stored_passage_row,
            )?;
            for row in rows {
                let (passage, status) = row?;
                out.push(StoredPassage {
                    status: VersionStatus::parse(&status)?,
                    ..passage
                });
            }
        }

        Ok(out)
    }

    fn stored_passage_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(StoredPassage, String)> {
        Ok((
            StoredPassage {
                index_key: row.get::<_, i64>(0)? as u64,
                passage_id: row.get(1)?,
                document_id: row.get(2)?,
                version: row.get::<_, i64>(3)? as u64,
                ordinal: row.get::<_, i64>(4)? as u32,
                text: row.get(5)?,
                byte_start: row.get::<_, i64>(6)? as u64,
                byte_end: row.get::<_, i64>(7)? as u64,
                source: row.get(8)?,
                status: VersionStatus::Staged,
            },
            row.get(9)?,
        ))
    }

    /// Staged versions left behind by an interrupted ingest
    pub fn staged_versions(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, version FROM document_versions WHERE status = 'staged'",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        let mut staged = Vec::new();
        for row in rows {
            staged.push(row?);
        }
        Ok(staged)
    }

    /// Remove a staged version and its passage rows
    pub fn discard_staged_version(&self, document_id: &str, version: u64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM passages WHERE document_id = ?1 AND version = ?2",
            params![document_id, version as i64],
        )?;
        tx.execute(
            "DELETE FROM document_versions
             WHERE document_id = ?1 AND version = ?2 AND status = 'staged'",
            params![document_id, version as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop passage rows of superseded versions left behind by a crash
    /// between publish and cleanup
    pub fn cleanup_superseded_rows(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM passages WHERE (document_id, version) IN (
                 SELECT document_id, version FROM document_versions
                 WHERE status = 'superseded'
             )",
            [],
        )?;
        Ok(deleted)
    }

    /// Index keys of every passage belonging to an active version
    pub fn active_passage_keys(&self) -> Result<Vec<u64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id FROM passages p
             JOIN document_versions v
                 ON v.document_id = p.document_id AND v.version = p.version
             WHERE v.status = 'active'",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row? as u64);
        }
        Ok(keys)
    }

    /// Content hashes still referenced by any version row
    pub fn referenced_content_hashes(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT content_hash FROM document_versions")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut hashes = Vec::new();
        for row in rows {
            hashes.push(row?);
        }
        Ok(hashes)
    }

    /// List documents, most recently updated first
    pub fn list_documents(&self, limit: usize) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT d.id, d.source, d.created_at, d.updated_at, d.current_version,
                    v.content_hash, COALESCE(v.passage_count, 0)
             FROM documents d
             LEFT JOIN document_versions v
                 ON v.document_id = d.id AND v.version = d.current_version
             ORDER BY d.updated_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(DocumentRecord {
                id: row.get(0)?,
                source: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
                current_version: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                content_hash: row.get(5)?,
                passage_count: row.get::<_, i64>(6)? as u64,
            })
        })?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;

        let documents: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let active_passages: i64 = conn.query_row(
            "SELECT COUNT(*) FROM passages p
             JOIN document_versions v
                 ON v.document_id = p.document_id AND v.version = p.version
             WHERE v.status = 'active'",
            [],
            |row| row.get(0),
        )?;
        let staged_versions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM document_versions WHERE status = 'staged'",
            [],
            |row| row.get(0),
        )?;
        let total_versions: i64 =
            conn.query_row("SELECT COUNT(*) FROM document_versions", [], |row| {
                row.get(0)
            })?;

        Ok(StoreStats {
            documents: documents as u64,
            active_passages: active_passages as u64,
            staged_versions: staged_versions as u64,
            total_versions: total_versions as u64,
        })
    }
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Documents table
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        source TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        current_version INTEGER
    );

    CREATE INDEX idx_documents_updated_at ON documents(updated_at);

    -- Document versions (staged -> active -> superseded)
    CREATE TABLE document_versions (
        document_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        status TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        passage_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        published_at INTEGER,
        PRIMARY KEY (document_id, version),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_versions_status ON document_versions(status);

    -- Passages (rowid doubles as the vector index key)
    CREATE TABLE passages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passage_id TEXT NOT NULL UNIQUE,
        document_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        ordinal INTEGER NOT NULL,
        text TEXT NOT NULL,
        byte_start INTEGER NOT NULL,
        byte_end INTEGER NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_passages_document ON passages(document_id);
    CREATE INDEX idx_passages_doc_version ON passages(document_id, version);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (CorpusStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = CorpusStore::new(&temp.path().join("corpus.db")).unwrap();
        (store, temp)
    }

    fn drafts(texts: &[&str]) -> Vec<PassageDraft> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| PassageDraft {
                ordinal: i as u32,
                text: text.to_string(),
                byte_start: 0,
                byte_end: text.len(),
            })
            .collect()
    }

    #[test]
    fn test_store_creation_and_migrations() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("corpus.db");
        let store = CorpusStore::new(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = store.conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_document_upsert_and_get() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", Some("notes.md"), 100).unwrap();
        let doc = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.id, "doc-1");
        assert_eq!(doc.source.as_deref(), Some("notes.md"));
        assert_eq!(doc.current_version, None);

        // Second upsert keeps the source when none is supplied
        store.upsert_document("doc-1", None, 200).unwrap();
        let doc = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.source.as_deref(), Some("notes.md"));
        assert_eq!(doc.updated_at, 200);

        assert!(store.get_document("missing").unwrap().is_none());
    }

    #[test]
    fn test_stage_and_publish_lifecycle() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        assert_eq!(store.next_version("doc-1").unwrap(), 1);

        store
            .create_staged_version("doc-1", 1, "hash-a", 2, 100)
            .unwrap();
        let inserted = store
            .insert_passages("doc-1", 1, &drafts(&["alpha", "beta"]))
            .unwrap();
        assert_eq!(inserted.len(), 2);

        // Not visible until published
        let doc = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.current_version, None);
        let hydrated = store.hydrate(&[inserted[0].index_key]).unwrap();
        assert!(hydrated.is_empty());

        let evicted = store.publish_version("doc-1", 1, 150).unwrap();
        assert!(evicted.is_empty());

        let doc = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.current_version, Some(1));
        assert_eq!(doc.content_hash.as_deref(), Some("hash-a"));
        assert_eq!(doc.passage_count, 2);

        let hydrated = store.hydrate(&[inserted[0].index_key]).unwrap();
        assert_eq!(hydrated.len(), 1);
        assert_eq!(hydrated[0].text, "alpha");
        assert_eq!(hydrated[0].status, VersionStatus::Active);
    }

    #[test]
    fn test_publish_supersedes_prior_version() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        store
            .create_staged_version("doc-1", 1, "hash-a", 1, 100)
            .unwrap();
        let v1 = store.insert_passages("doc-1", 1, &drafts(&["old"])).unwrap();
        store.publish_version("doc-1", 1, 110).unwrap();

        store
            .create_staged_version("doc-1", 2, "hash-b", 1, 120)
            .unwrap();
        let v2 = store.insert_passages("doc-1", 2, &drafts(&["new"])).unwrap();
        let evicted = store.publish_version("doc-1", 2, 130).unwrap();

        assert_eq!(evicted, vec![v1[0].index_key]);
        let doc = store.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.current_version, Some(2));

        // Old version rows linger until the caller drops them
        let old = store.get_passage(&v1[0].passage_id).unwrap().unwrap();
        assert_eq!(old.status, VersionStatus::Superseded);

        store.delete_passage_rows("doc-1", 1).unwrap();
        assert!(store.get_passage(&v1[0].passage_id).unwrap().is_none());

        let new = store.get_passage(&v2[0].passage_id).unwrap().unwrap();
        assert_eq!(new.status, VersionStatus::Active);
    }

    #[test]
    fn test_publish_requires_staged_version() {
        let (store, _temp) = test_store();
        store.upsert_document("doc-1", None, 100).unwrap();

        let result = store.publish_version("doc-1", 5, 110);
        assert!(matches!(result, Err(PassimError::Consistency(_))));
    }

    #[test]
    fn test_passage_ids_are_stable_and_version_scoped() {
        let a = passage_id("doc-1", 1, 0);
        let b = passage_id("doc-1", 1, 0);
        let c = passage_id("doc-1", 2, 0);
        let d = passage_id("doc-2", 1, 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_delete_document_returns_keys() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        store
            .create_staged_version("doc-1", 1, "hash-a", 2, 100)
            .unwrap();
        let inserted = store
            .insert_passages("doc-1", 1, &drafts(&["alpha", "beta"]))
            .unwrap();
        store.publish_version("doc-1", 1, 110).unwrap();

        let keys = store.delete_document("doc-1").unwrap();
        let mut expected: Vec<u64> = inserted.iter().map(|p| p.index_key).collect();
        expected.sort_unstable();
        let mut got = keys.clone();
        got.sort_unstable();
        assert_eq!(got, expected);

        assert!(store.get_document("doc-1").unwrap().is_none());
        assert!(store.get_passage(&inserted[0].passage_id).unwrap().is_none());

        let result = store.delete_document("doc-1");
        assert!(matches!(result, Err(PassimError::NotFound { .. })));
    }

    #[test]
    fn test_staged_versions_discarded() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        store
            .create_staged_version("doc-1", 1, "hash-a", 1, 100)
            .unwrap();
        store.insert_passages("doc-1", 1, &drafts(&["ghost"])).unwrap();

        let staged = store.staged_versions().unwrap();
        assert_eq!(staged, vec![("doc-1".to_string(), 1)]);

        store.discard_staged_version("doc-1", 1).unwrap();
        assert!(store.staged_versions().unwrap().is_empty());
        assert_eq!(store.next_version("doc-1").unwrap(), 1);
    }

    #[test]
    fn test_hydrate_skips_staged_and_unknown_keys() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        store
            .create_staged_version("doc-1", 1, "hash-a", 1, 100)
            .unwrap();
        let active = store.insert_passages("doc-1", 1, &drafts(&["live"])).unwrap();
        store.publish_version("doc-1", 1, 110).unwrap();

        store
            .create_staged_version("doc-1", 2, "hash-b", 1, 120)
            .unwrap();
        let staged = store.insert_passages("doc-1", 2, &drafts(&["pending"])).unwrap();

        let keys = vec![active[0].index_key, staged[0].index_key, 9999];
        let hydrated = store.hydrate(&keys).unwrap();
        assert_eq!(hydrated.len(), 1);
        assert_eq!(hydrated[0].text, "live");
    }

    #[test]
    fn test_active_passage_keys_and_stats() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-1", None, 100).unwrap();
        store
            .create_staged_version("doc-1", 1, "hash-a", 2, 100)
            .unwrap();
        let inserted = store
            .insert_passages("doc-1", 1, &drafts(&["alpha", "beta"]))
            .unwrap();
        store.publish_version("doc-1", 1, 110).unwrap();

        store.upsert_document("doc-2", None, 120).unwrap();
        store
            .create_staged_version("doc-2", 1, "hash-b", 1, 120)
            .unwrap();
        store.insert_passages("doc-2", 1, &drafts(&["pending"])).unwrap();

        let mut keys = store.active_passage_keys().unwrap();
        keys.sort_unstable();
        let mut expected: Vec<u64> = inserted.iter().map(|p| p.index_key).collect();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        let stats = store.stats().unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.active_passages, 2);
        assert_eq!(stats.staged_versions, 1);
        assert_eq!(stats.total_versions, 2);

        let hashes = store.referenced_content_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
    }

    #[test]
    fn test_list_documents_recent_first() {
        let (store, _temp) = test_store();

        store.upsert_document("doc-a", None, 100).unwrap();
        store.upsert_document("doc-b", None, 200).unwrap();

        let docs = store.list_documents(10).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "doc-b");
        assert_eq!(docs[1].id, "doc-a");
    }
}
