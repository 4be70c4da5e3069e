//! Version ledger
//!
//! Each successful upgrade appends one row to the table of the upgraded
//! component. The schema matches the database already deployed on the
//! device images: one table per component, each with the columns
//! `id, repo_name, repo_path, ver_major, ver_minor_1, ver_minor_2, updated_at`.

use crate::models::{ComponentType, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Default ledger location on the device image
pub const DEFAULT_LEDGER_PATH: &str = "/database/database.db";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare ledger directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger connection lock poisoned")]
    Poisoned,

    #[error("ledger task failed: {0}")]
    Task(String),
}

/// One version-history row, as written by an upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRecord {
    pub component_type: ComponentType,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl UpgradeRecord {
    pub fn now(component_type: ComponentType, version: Version) -> Self {
        Self {
            component_type,
            version,
            updated_at: Utc::now(),
        }
    }
}

/// A stored record with its row id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i64,
    pub record: UpgradeRecord,
}

/// Durable store for upgrade history
#[async_trait]
pub trait VersionLedger: Send + Sync + 'static {
    /// Persist a record and return its row id
    async fn insert(&self, record: &UpgradeRecord) -> Result<i64, LedgerError>;
}

/// SQLite-backed ledger holding one connection for the agent's lifetime
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open (or create) the ledger at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        info!(path = %path.display(), "Version ledger opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
        let schema: String = ComponentType::ALL
            .iter()
            .map(|component| {
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        repo_name TEXT,
                        repo_path TEXT,
                        ver_major INTEGER,
                        ver_minor_1 INTEGER,
                        ver_minor_2 INTEGER,
                        updated_at DATETIME
                    );",
                    component.table()
                )
            })
            .collect();

        conn.execute_batch(&schema)?;
        Ok(())
    }

    /// All records for a component, oldest first
    pub fn records(&self, component: ComponentType) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, ver_major, ver_minor_1, ver_minor_2, updated_at FROM {} ORDER BY id",
            component.table()
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok(LedgerEntry {
                id: row.get(0)?,
                record: UpgradeRecord {
                    component_type: component,
                    version: Version::new(row.get(1)?, row.get(2)?, row.get(3)?),
                    updated_at: row.get(4)?,
                },
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(LedgerError::from)
    }

    /// Latest recorded version of a component, if any
    pub fn current_version(&self, component: ComponentType) -> Result<Option<Version>, LedgerError> {
        Ok(self
            .records(component)?
            .last()
            .map(|entry| entry.record.version))
    }

    /// Cheap liveness probe for the health registry
    pub fn ping(&self) -> Result<(), LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

#[async_trait]
impl VersionLedger for SqliteLedger {
    async fn insert(&self, record: &UpgradeRecord) -> Result<i64, LedgerError> {
        let conn = Arc::clone(&self.conn);
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| LedgerError::Poisoned)?;
            conn.execute(
                &format!(
                    "INSERT INTO {} (repo_name, ver_major, ver_minor_1, ver_minor_2, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    record.component_type.table()
                ),
                params![
                    record.component_type.repo_name(),
                    record.version.major,
                    record.version.minor1,
                    record.version.minor2,
                    record.updated_at,
                ],
            )?;

            let id = conn.last_insert_rowid();
            debug!(
                component = %record.component_type,
                version = %record.version,
                id,
                "Ledger row appended"
            );
            Ok(id)
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}
