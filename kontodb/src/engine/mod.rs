// File storage engine: one JSON array file per table plus the `.tables` metadata.
//
// Every mutation is a whole-file read-modify-write finished by an atomic rename.
// There is no locking: one writer per store directory is assumed.

use crate::error::{KontoDbError, Result};
use crate::record::{PrimaryKey, Record};
use crate::schema::{SchemaRegistry, TableDeclaration, TableSchema};
use crate::util::write_atomic;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct FileEngine {
    root: PathBuf,
    registry: SchemaRegistry,
}

impl FileEngine {
    /// Create a new store directory with empty table files.
    /// Fails if the directory already exists.
    pub fn create(root: &Path, declarations: &[TableDeclaration]) -> Result<Self> {
        if root.exists() {
            return Err(KontoDbError::StoreAlreadyExists(root.to_path_buf()));
        }

        std::fs::create_dir_all(root)?;
        let registry = match SchemaRegistry::initialize(root, declarations) {
            Ok(registry) => registry,
            Err(e) => {
                // Don't leave a half-initialized directory behind
                let _ = std::fs::remove_dir_all(root);
                return Err(e);
            }
        };

        log::info!("Created file store at {}", root.display());
        Ok(FileEngine {
            root: root.to_path_buf(),
            registry,
        })
    }

    /// Open an existing store directory and load its schema.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(KontoDbError::StoreNotFound(root.to_path_buf()));
        }

        let registry = SchemaRegistry::load(root)?;
        log::info!("Opened file store at {}", root.display());
        Ok(FileEngine {
            root: root.to_path_buf(),
            registry,
        })
    }

    /// Remove a store directory. A missing directory is not an error.
    pub fn destroy(root: &Path) -> Result<()> {
        match std::fs::remove_dir_all(root) {
            Ok(()) => {
                log::info!("Destroyed file store at {}", root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn schema(&self, name: &str) -> Result<&TableSchema> {
        self.registry.lookup(name)
    }

    /// Read every record of a table.
    ///
    /// A missing or unparseable file reads as an empty table.
    pub fn read_table(&self, name: &str) -> Result<Vec<Record>> {
        let schema = self.registry.lookup(name)?;
        let path = self.registry.table_path(schema);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Table file {} is missing, reading as empty", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<Record>>(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                log::warn!(
                    "Table file {} is not a valid record array ({e}), reading as empty",
                    path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Find a single record by its primary key.
    pub fn read_by_primary_key(&self, name: &str, key: &PrimaryKey) -> Result<Option<Record>> {
        let schema = self.registry.lookup(name)?;
        schema.check_key(key)?;

        let records = self.read_table(name)?;
        Ok(records
            .into_iter()
            .find(|record| schema.key_of(record) == *key))
    }

    /// Append a record to the end of a table.
    pub fn append_record(&self, name: &str, record: Record) -> Result<()> {
        let mut records = self.read_table(name)?;
        records.push(record);
        self.write_table(name, &records)
    }

    /// Overwrite the record with the given key, or remove it when `replacement` is `None`.
    pub fn replace_record(
        &self,
        name: &str,
        key: &PrimaryKey,
        replacement: Option<Record>,
    ) -> Result<()> {
        let schema = self.registry.lookup(name)?;
        schema.check_key(key)?;

        let mut records = self.read_table(name)?;
        let index = records
            .iter()
            .position(|record| schema.key_of(record) == *key)
            .ok_or_else(|| KontoDbError::ObjectNotFound {
                table: name.to_string(),
                key: key.to_string(),
            })?;

        match replacement {
            Some(record) => records[index] = record,
            None => {
                records.remove(index);
            }
        }

        self.write_table(name, &records)
    }

    fn write_table(&self, name: &str, records: &[Record]) -> Result<()> {
        let schema = self.registry.lookup(name)?;
        let path = self.registry.table_path(schema);
        let content = serde_json::to_vec_pretty(records)?;
        write_atomic(&path, &content)?;
        log::debug!("Wrote {} record(s) to {}", records.len(), path.display());
        Ok(())
    }
}
