use crate::backend::{Backend, BackendKind, FileBackend, SqliteBackend};
use crate::config::StoreConfig;
use crate::entity::Tables;
use crate::error::{KontoDbError, Result};
use crate::record::Record;
use crate::schema::TableSchema;
use std::path::Path;

/// The main entry point for kontodb.
/// Binds a configured backend to the table mapping used to decode its records.
/// Entities reach it through `E::objects(&store)` and `entity.manager(&store)`.
pub struct Store {
    config: StoreConfig,
    tables: Tables,
    backend: Box<dyn Backend>,
}

impl Store {
    /// Initialize a new, empty store. Fails with `StoreAlreadyExists` if the
    /// configured location is taken.
    pub fn create(config: StoreConfig, tables: Tables) -> Result<Self> {
        let declarations = tables.declarations();
        let backend: Box<dyn Backend> = match config.backend {
            BackendKind::File => Box::new(FileBackend::create(&config.path, &declarations)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::create(&config.path, &declarations)?),
        };

        Ok(Store {
            config,
            tables,
            backend,
        })
    }

    /// Open an existing store. Fails with `StoreNotFound` if there is none.
    pub fn open(config: StoreConfig, tables: Tables) -> Result<Self> {
        let backend: Box<dyn Backend> = match config.backend {
            BackendKind::File => Box::new(FileBackend::open(&config.path)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(
                &config.path,
                &tables.declarations(),
            )?),
        };

        // The file backend trusts its `.tables` metadata over the declarations
        let present = backend.table_names();
        for name in tables.table_names() {
            if !present.iter().any(|p| p == name) {
                log::warn!(
                    "Table '{name}' is not part of the store at {}",
                    config.path.display()
                );
            }
        }

        Ok(Store {
            config,
            tables,
            backend,
        })
    }

    /// Open the store, creating it first when the location is empty.
    pub fn open_or_create(config: StoreConfig, tables: Tables) -> Result<Self> {
        match Store::open(config.clone(), tables.clone()) {
            Err(KontoDbError::StoreNotFound(_)) => Store::create(config, tables),
            other => other,
        }
    }

    /// Remove the configured store. A missing store is not an error.
    pub fn destroy(config: &StoreConfig) -> Result<()> {
        match config.backend {
            BackendKind::File => FileBackend::destroy(&config.path),
            BackendKind::Sqlite => SqliteBackend::destroy(&config.path),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Schema of a table as the backend knows it
    pub fn schema(&self, table: &str) -> Result<&TableSchema> {
        self.backend.schema(table)
    }

    /// Get status information: backend, location, record count per table.
    pub fn status(&self) -> Result<serde_json::Value> {
        let mut tables = serde_json::Map::new();
        for name in self.backend.table_names() {
            let records = self.backend.filter(&name, &Record::new())?;
            tables.insert(name, serde_json::json!({ "count": records.len() }));
        }

        Ok(serde_json::json!({
            "backend": self.backend_kind().to_string(),
            "path": self.config.path.display().to_string(),
            "tables": tables,
        }))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("tables", &self.tables)
            .finish()
    }
}
