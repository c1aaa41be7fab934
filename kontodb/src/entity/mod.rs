// Typed entities and the table-name -> type mapping used to decode records

pub mod konto;
pub mod kunde;

pub use konto::Konto;
pub use kunde::Kunde;

use crate::error::{KontoDbError, Result};
use crate::manager::{Manager, Query};
use crate::record::Record;
use crate::schema::TableDeclaration;
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};

/// A typed object stored as one record of one table.
///
/// The serde field order is the record's field order and must match the
/// order of `declaration()`.
pub trait Entity: Serialize + DeserializeOwned + Clone + 'static {
    /// Name of the table holding this entity
    const TABLE: &'static str;

    /// Fields and key constraints of the table
    fn declaration() -> TableDeclaration;

    /// Entity-level invariants, checked by `save()` before anything is written.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            other => Err(KontoDbError::Other(format!(
                "Entity for table '{}' did not serialize to an object: {other}",
                Self::TABLE
            ))),
        }
    }

    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    /// Read-only queries over the whole table.
    fn objects(store: &Store) -> Query<'_, Self> {
        Query::new(store)
    }

    /// Queries plus `save`/`delete` bound to this value.
    fn manager<'a>(&'a self, store: &'a Store) -> Manager<'a, Self> {
        Manager::new(store, self)
    }
}

type Decoder = fn(Record) -> Result<Box<dyn Any>>;

fn decode_boxed<E: Entity>(record: Record) -> Result<Box<dyn Any>> {
    Ok(Box::new(E::from_record(record)?))
}

#[derive(Clone)]
struct TableEntry {
    declaration: TableDeclaration,
    type_id: TypeId,
    type_name: &'static str,
    decode: Decoder,
}

/// Explicit table-name -> entity-type mapping, fixed when a store is built.
#[derive(Clone, Default)]
pub struct Tables {
    entries: Vec<TableEntry>,
}

impl Tables {
    pub fn new() -> Self {
        Tables::default()
    }

    /// Register an entity type. Registering the same table again replaces it.
    pub fn register<E: Entity>(mut self) -> Self {
        let entry = TableEntry {
            declaration: E::declaration(),
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            decode: decode_boxed::<E>,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.declaration.name == entry.declaration.name)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Declarations in registration order
    pub fn declarations(&self) -> Vec<TableDeclaration> {
        self.entries.iter().map(|e| e.declaration.clone()).collect()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.declaration.name.as_str())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.entry(table).is_some()
    }

    /// Decode a record of `table` into `E`, which must be the type registered
    /// for that table.
    pub fn decode<E: Entity>(&self, table: &str, record: Record) -> Result<E> {
        let entry = self
            .entry(table)
            .ok_or_else(|| KontoDbError::TableNotFound(table.to_string()))?;

        let mismatch = || {
            KontoDbError::Other(format!(
                "Table '{table}' holds {} records, not {}",
                entry.type_name,
                std::any::type_name::<E>()
            ))
        };
        if entry.type_id != TypeId::of::<E>() {
            return Err(mismatch());
        }

        (entry.decode)(record)?
            .downcast::<E>()
            .map(|entity| *entity)
            .map_err(|_| mismatch())
    }

    fn entry(&self, table: &str) -> Option<&TableEntry> {
        self.entries.iter().find(|e| e.declaration.name == table)
    }
}

impl std::fmt::Debug for Tables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.declaration.name, e.type_name)))
            .finish()
    }
}

/// The customer and account tables.
pub fn banking_tables() -> Tables {
    Tables::new().register::<Kunde>().register::<Konto>()
}
