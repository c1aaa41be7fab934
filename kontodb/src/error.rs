use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KontoDbError {
    #[error("Object not found: {table}/{key}")]
    ObjectNotFound { table: String, key: String },

    #[error("Object already exists: value '{value}' for field '{field}' of table '{table}' is not unique")]
    ObjectAlreadyExists {
        table: String,
        field: String,
        value: String,
    },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Schema corrupt: {0}")]
    SchemaCorrupt(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store already exists: {}", .0.display())]
    StoreAlreadyExists(PathBuf),

    #[error("Store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl KontoDbError {
    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KontoDbError::ObjectNotFound { .. })
    }

    /// Whether this error is a uniqueness violation raised by `save()`.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, KontoDbError::ObjectAlreadyExists { .. })
    }
}

pub type Result<T> = std::result::Result<T, KontoDbError>;
