// Storage backends behind the manager façade

pub mod file;
pub mod sqlite;

use crate::error::{KontoDbError, Result};
use crate::record::{PrimaryKey, Record};
use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use file::FileBackend;
pub use sqlite::SqliteBackend;

/// Which storage backend a store uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// JSON table files in a directory
    File,
    /// A single SQLite database file
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = KontoDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(BackendKind::File),
            "sqlite" | "sql" => Ok(BackendKind::Sqlite),
            other => Err(KontoDbError::Other(format!(
                "Unknown backend '{other}', expected one of: file, sqlite"
            ))),
        }
    }
}

/// Record-level CRUD contract. Both backends answer with the same results
/// and the same error kinds, so calling code never needs to know which one
/// it talks to.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Schema of a registered table, `TableNotFound` otherwise.
    fn schema(&self, table: &str) -> Result<&TableSchema>;

    fn table_names(&self) -> Vec<String>;

    /// Insert the record, or overwrite the one sharing its primary key.
    /// Fails with `ObjectAlreadyExists` before writing anything if a
    /// unique field collides with a different record.
    fn save(&self, table: &str, record: Record) -> Result<()>;

    /// Exact primary-key lookup, `ObjectNotFound` when absent.
    fn get(&self, table: &str, key: &PrimaryKey) -> Result<Record>;

    /// All records whose constrained fields equal the given values.
    /// An empty constraint set returns the whole table.
    fn filter(&self, table: &str, constraints: &Record) -> Result<Vec<Record>>;

    /// Remove the record with the given key, `ObjectNotFound` when absent.
    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()>;
}
