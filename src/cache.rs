//! Snapshot cache for scan results.
//!
//! The cache owns an injected [`SnapshotStore`]; nothing is kept in global
//! state. Stores hold the flattened records, which is everything the
//! aggregation step needs, together with the [`SnapshotKey`] of the scan that
//! produced them. A snapshot whose key differs from the requested one is a
//! miss.

use crate::error::{Result, SkillmapError};
use crate::flat::{FlatDiffRecord, MergeCriteria};
use crate::model::SCHEMA_VERSION;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The scan parameters a snapshot depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub author: String,
    /// Scanned `--repo` or `--root` directory.
    pub scope: String,
    /// Contents of the classifier overlay, if one was given.
    pub classifier: Option<String>,
}

impl SnapshotKey {
    pub fn new(author: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            scope: scope.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, table: impl Into<String>) -> Self {
        self.classifier = Some(table.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub key: SnapshotKey,
    pub records: Vec<FlatDiffRecord>,
}

impl Snapshot {
    pub fn new(key: SnapshotKey, records: Vec<FlatDiffRecord>) -> Self {
        Self { key, records }
    }
}

pub trait SnapshotStore {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>>;
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }
}

/// One JSON object (`{ "key": .., "records": [..] }`) in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(snapshot)?)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                saved_at INTEGER NOT NULL,
                scan_key TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS diffs (
                seq INTEGER PRIMARY KEY,
                root TEXT NOT NULL,
                shas TEXT NOT NULL,
                files TEXT NOT NULL,
                date INTEGER NOT NULL,
                additions INTEGER NOT NULL,
                deletions INTEGER NOT NULL,
                criteria TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_diffs_date ON diffs(date);
            ",
        )?;
        self.check_schema_version()?;
        Ok(())
    }

    fn check_schema_version(&mut self) -> Result<()> {
        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;

        if user_version == 0 {
            let set_stmt = format!("PRAGMA user_version = {SCHEMA_VERSION};");
            self.conn.execute_batch(&set_stmt)?;
        } else if user_version != SCHEMA_VERSION as i64 {
            return Err(SkillmapError::Cache(format!(
                "Schema version mismatch: expected {}, found {}",
                SCHEMA_VERSION, user_version
            )));
        }

        Ok(())
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let key: Option<String> = self
            .conn
            .query_row("SELECT scan_key FROM snapshot WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        let Some(key) = key else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT root, shas, files, date, additions, deletions, criteria FROM diffs ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (root, shas, files, date, additions, deletions, criteria) = row?;
            let criteria = MergeCriteria::from_name(&criteria)
                .ok_or_else(|| SkillmapError::Cache(format!("Unknown merge criteria '{criteria}'")))?;
            records.push(FlatDiffRecord {
                root,
                shas: serde_json::from_str(&shas)?,
                files: serde_json::from_str(&files)?,
                date,
                additions: additions.max(0) as u64,
                deletions: deletions.max(0) as u64,
                criteria,
            });
        }
        Ok(Some(Snapshot::new(serde_json::from_str(&key)?, records)))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM diffs", [])?;

        let mut insert_stmt = tx.prepare(
            "INSERT INTO diffs (seq, root, shas, files, date, additions, deletions, criteria)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (seq, r) in snapshot.records.iter().enumerate() {
            insert_stmt.execute(params![
                seq as i64,
                r.root,
                serde_json::to_string(&r.shas)?,
                serde_json::to_string(&r.files)?,
                r.date,
                r.additions as i64,
                r.deletions as i64,
                r.criteria.as_str()
            ])?;
        }
        drop(insert_stmt);

        tx.execute(
            "INSERT OR REPLACE INTO snapshot (id, saved_at, scan_key) VALUES (1, ?, ?)",
            params![Utc::now().timestamp(), serde_json::to_string(&snapshot.key)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM diffs; DELETE FROM snapshot;")?;
        Ok(())
    }
}

pub struct SnapshotCache<S: SnapshotStore> {
    store: S,
    key: SnapshotKey,
}

impl<S: SnapshotStore> SnapshotCache<S> {
    pub fn new(store: S, key: SnapshotKey) -> Self {
        Self { store, key }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &SnapshotKey {
        &self.key
    }

    /// Stored records, provided they were scanned with this cache's key.
    pub fn cached(&self) -> Result<Option<Vec<FlatDiffRecord>>> {
        match self.store.load()? {
            Some(snapshot) if snapshot.key == self.key => {
                debug!(records = snapshot.records.len(), "snapshot cache hit");
                Ok(Some(snapshot.records))
            }
            Some(snapshot) => {
                info!(
                    stored_author = %snapshot.key.author,
                    stored_scope = %snapshot.key.scope,
                    "snapshot was scanned with other parameters; rescanning"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn put(&mut self, records: &[FlatDiffRecord]) -> Result<()> {
        self.store.save(&Snapshot::new(self.key.clone(), records.to_vec()))?;
        info!(records = records.len(), "snapshot stored");
        Ok(())
    }

    /// Stored records if present for this key; otherwise runs `scan`, stores
    /// and returns its result. A failed scan stores nothing.
    pub async fn get_or_scan<F, Fut, E>(&mut self, scan: F) -> std::result::Result<Vec<FlatDiffRecord>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<FlatDiffRecord>, E>>,
        E: From<SkillmapError>,
    {
        if let Some(records) = self.cached()? {
            return Ok(records);
        }
        let records = scan().await?;
        self.put(&records)?;
        Ok(records)
    }

    pub fn invalidate(&mut self) -> Result<()> {
        self.store.clear()
    }
}
