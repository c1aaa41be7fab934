use super::types::{TableDeclaration, TableSchema};
use crate::error::{KontoDbError, Result};
use crate::util::write_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the metadata file inside a store directory
pub const METADATA_FILE: &str = ".tables";

/// Table metadata of one store directory, backed by its `.tables` file.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    root: PathBuf,
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Compute schemas for the declared tables, write one empty table file per
    /// table and persist the metadata. Refuses to touch an initialized store.
    pub fn initialize(root: &Path, declarations: &[TableDeclaration]) -> Result<Self> {
        let metadata_path = root.join(METADATA_FILE);
        if metadata_path.exists() {
            return Err(KontoDbError::StoreAlreadyExists(root.to_path_buf()));
        }

        let mut tables = BTreeMap::new();
        for declaration in declarations {
            let schema = TableSchema::from_declaration(declaration)?;
            if tables.contains_key(&schema.tablename) {
                return Err(KontoDbError::SchemaCorrupt(format!(
                    "Table '{}' declared twice",
                    schema.tablename
                )));
            }
            tables.insert(schema.tablename.clone(), schema);
        }

        std::fs::create_dir_all(root)?;

        // Table files first: a store only counts as initialized once .tables exists
        for schema in tables.values() {
            write_atomic(&root.join(&schema.filename), b"[]")?;
        }
        let content = toml::to_string_pretty(&tables)?;
        write_atomic(&metadata_path, content.as_bytes())?;

        log::info!(
            "Initialized schema for {} table(s) in {}",
            tables.len(),
            root.display()
        );

        Ok(SchemaRegistry {
            root: root.to_path_buf(),
            tables,
        })
    }

    /// Load the metadata written by `initialize`.
    pub fn load(root: &Path) -> Result<Self> {
        let metadata_path = root.join(METADATA_FILE);
        let content = std::fs::read_to_string(&metadata_path).map_err(|e| {
            KontoDbError::SchemaCorrupt(format!(
                "Cannot read {}: {e}",
                metadata_path.display()
            ))
        })?;

        let tables: BTreeMap<String, TableSchema> = toml::from_str(&content).map_err(|e| {
            KontoDbError::SchemaCorrupt(format!(
                "Cannot parse {}: {e}",
                metadata_path.display()
            ))
        })?;

        for (name, schema) in &tables {
            if *name != schema.tablename {
                return Err(KontoDbError::SchemaCorrupt(format!(
                    "Section '{name}' describes table '{}'",
                    schema.tablename
                )));
            }
            if schema.primary_keys.is_empty() {
                return Err(KontoDbError::SchemaCorrupt(format!(
                    "Table '{name}' has no primary key"
                )));
            }
        }

        log::debug!("Loaded schema for {} table(s)", tables.len());

        Ok(SchemaRegistry {
            root: root.to_path_buf(),
            tables,
        })
    }

    /// Get the schema of a table
    pub fn lookup(&self, tablename: &str) -> Result<&TableSchema> {
        self.tables
            .get(tablename)
            .ok_or_else(|| KontoDbError::TableNotFound(tablename.to_string()))
    }

    pub fn contains(&self, tablename: &str) -> bool {
        self.tables.contains_key(tablename)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a table's file
    pub fn table_path(&self, schema: &TableSchema) -> PathBuf {
        self.root.join(&schema.filename)
    }
}
