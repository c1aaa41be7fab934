use crate::backend::BackendKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BACKEND_ENV: &str = "KONTODB_BACKEND";
pub const DATA_DIR_ENV: &str = "KONTODB_DATA_DIR";

/// Which backend a store uses and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Store directory for the file backend, database file for SQLite
    pub path: PathBuf,
}

impl StoreConfig {
    pub fn new(backend: BackendKind, path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            backend,
            path: path.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        StoreConfig::new(BackendKind::File, path)
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        StoreConfig::new(BackendKind::Sqlite, path)
    }

    /// Location used when none is configured
    pub fn default_path(backend: BackendKind) -> PathBuf {
        match backend {
            BackendKind::File => PathBuf::from("data"),
            BackendKind::Sqlite => PathBuf::from("data.sqlite3"),
        }
    }

    /// Read `KONTODB_BACKEND` and `KONTODB_DATA_DIR`, falling back to the
    /// file backend in `./data`.
    pub fn from_env() -> Result<Self> {
        StoreConfig::from_values(
            std::env::var(BACKEND_ENV).ok().as_deref(),
            std::env::var(DATA_DIR_ENV).ok().as_deref(),
        )
    }

    /// Build a config from optional backend name and path, applying defaults.
    pub fn from_values(backend: Option<&str>, path: Option<&str>) -> Result<Self> {
        let backend = match backend.map(str::trim).filter(|b| !b.is_empty()) {
            Some(name) => name.parse()?,
            None => BackendKind::File,
        };
        let path = match path.filter(|p| !p.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => StoreConfig::default_path(backend),
        };
        Ok(StoreConfig { backend, path })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::file(StoreConfig::default_path(BackendKind::File))
    }
}
