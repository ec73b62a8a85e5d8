//! SQLite persistence of decoded resources.
//!
//! ## Tables
//!
//! - `anim` - canonical tween animations
//! - `interpolator` - canonical interpolators
//!
//! Both share the layout `(id, hash, package_name, file_name, content)` with an index on
//! `hash`.

use crate::StoreError;
use crate::decoder::{ResourceEntry, ResourceKind};
use rusqlite::{Connection, Transaction, params};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Which rows count as duplicates of an incoming entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Insert every entry
    Off,
    /// Skip when the same hash was stored for the same package and file
    #[default]
    PerFile,
    /// Skip when the same hash was stored for the same package
    PerPackage,
    /// Skip when the hash was stored at all
    Global,
}

impl DedupPolicy {
    pub const NAMES: [&'static str; 4] = ["off", "per-file", "per-package", "global"];

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::PerFile => "per-file",
            Self::PerPackage => "per-package",
            Self::Global => "global",
        }
    }

    fn insert_sql(self, table: &str) -> String {
        let columns = "hash, package_name, file_name, content";
        let duplicate = match self {
            Self::Off => {
                return format!("INSERT INTO {table} ({columns}) VALUES (?1, ?2, ?3, ?4)");
            }
            Self::PerFile => "hash = ?1 AND package_name = ?2 AND file_name = ?3",
            Self::PerPackage => "hash = ?1 AND package_name = ?2",
            Self::Global => "hash = ?1",
        };
        format!(
            "INSERT INTO {table} ({columns}) SELECT ?1, ?2, ?3, ?4 \
             WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {duplicate})"
        )
    }
}

impl FromStr for DedupPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "per-file" => Ok(Self::PerFile),
            "per-package" => Ok(Self::PerPackage),
            "global" => Ok(Self::Global),
            _ => Err(StoreError::UnknownDedupPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one write call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub kind: ResourceKind,
    pub written: u64,
    pub skipped: u64,
}

impl WriteReport {
    pub fn empty(kind: ResourceKind) -> Self {
        Self {
            kind,
            written: 0,
            skipped: 0,
        }
    }
}

/// Database of decoded animations and interpolators
pub struct ContentStore {
    conn: Option<Connection>,
    label: String,
    dedup: DedupPolicy,
}

impl ContentStore {
    /// Open or create the database at `path` and make sure its tables exist
    pub fn open(path: impl AsRef<Path>, dedup: DedupPolicy) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path).map_err(|source| StoreError::Connect {
            path: path.display().to_string(),
            source,
        })?;

        let store = Self {
            conn: Some(conn),
            label: path.display().to_string(),
            dedup,
        };
        store.create_tables()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(dedup: DedupPolicy) -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|source| StoreError::Connect {
            path: ":memory:".to_string(),
            source,
        })?;

        let store = Self {
            conn: Some(conn),
            label: ":memory:".to_string(),
            dedup,
        };
        store.create_tables()?;
        Ok(store)
    }

    pub fn dedup(&self) -> DedupPolicy {
        self.dedup
    }

    /// Create both tables and their hash indexes. Safe to call repeatedly.
    pub fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        for kind in [ResourceKind::Animation, ResourceKind::Interpolator] {
            let table = kind.table();
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hash TEXT,
                    package_name TEXT,
                    file_name TEXT,
                    content TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_hash ON {table}(hash);"
            ))
            .map_err(|source| StoreError::Schema { table, source })?;
        }
        debug!(database = %self.label, "tables ready");
        Ok(())
    }

    pub fn write_animations(&mut self, entries: &[ResourceEntry]) -> Result<WriteReport, StoreError> {
        self.write(ResourceKind::Animation, entries)
    }

    pub fn write_interpolators(
        &mut self,
        entries: &[ResourceEntry],
    ) -> Result<WriteReport, StoreError> {
        self.write(ResourceKind::Interpolator, entries)
    }

    /// Number of rows stored for `kind`
    pub fn row_count(&self, kind: ResourceKind) -> Result<u64, StoreError> {
        let table = kind.table();
        let count: i64 = self
            .connection()?
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(|source| StoreError::Query { table, source })?;
        Ok(count as u64)
    }

    /// Close the connection. Failures are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    /// Write one batch atomically: every entry lands or none does
    fn write(&mut self, kind: ResourceKind, entries: &[ResourceEntry]) -> Result<WriteReport, StoreError> {
        let table = kind.table();
        if entries.is_empty() {
            warn!(kind = kind.label(), "no {} to write", kind.label());
            return Ok(WriteReport::empty(kind));
        }

        let sql = self.dedup.insert_sql(table);
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let tx = conn
            .transaction()
            .map_err(|source| StoreError::Persistence { table, source })?;

        let written = match insert_all(&tx, &sql, entries) {
            Ok(written) => written,
            Err(source) => {
                error!(kind = kind.label(), count = entries.len(), %source, "batch failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    error!(kind = kind.label(), %rollback, "rollback failed");
                }
                return Err(StoreError::Persistence { table, source });
            }
        };

        tx.commit()
            .map_err(|source| StoreError::Persistence { table, source })?;

        let report = WriteReport {
            kind,
            written,
            skipped: entries.len() as u64 - written,
        };
        info!(
            kind = kind.label(),
            written = report.written,
            skipped = report.skipped,
            "stored batch"
        );
        Ok(report)
    }

    fn connection(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => debug!(database = %self.label, "closed database"),
                Err((_, e)) => warn!(database = %self.label, error = %e, "failed to close database"),
            }
        }
    }
}

impl Drop for ContentStore {
    fn drop(&mut self) {
        self.release();
    }
}

fn insert_all(tx: &Transaction<'_>, sql: &str, entries: &[ResourceEntry]) -> rusqlite::Result<u64> {
    let mut stmt = tx.prepare(sql)?;
    let mut written = 0u64;
    for entry in entries {
        let changed = stmt.execute(params![
            entry.hash,
            entry.package_name,
            entry.file_name,
            entry.content
        ])?;
        written += changed as u64;
    }
    Ok(written)
}
