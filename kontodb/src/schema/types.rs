use crate::error::{KontoDbError, Result};
use crate::record::{PrimaryKey, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Scalar type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    /// ISO `YYYY-MM-DD` string
    Date,
}

impl FieldType {
    /// Column type used by the relational backend
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Date => "TEXT",
            FieldType::Integer => "INTEGER",
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Table shape as declared by an entity type, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDeclaration {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub primary_keys: Vec<String>,
    pub unique: Vec<String>,
    pub foreign_keys: BTreeMap<String, String>,
}

impl TableDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        TableDeclaration {
            name: name.into(),
            fields: Vec::new(),
            primary_keys: Vec::new(),
            unique: Vec::new(),
            foreign_keys: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDefinition {
            name: name.to_string(),
            field_type,
        });
        self
    }

    pub fn primary_key(mut self, name: &str, field_type: FieldType) -> Self {
        self.primary_keys.push(name.to_string());
        self.field(name, field_type)
    }

    pub fn unique(mut self, name: &str, field_type: FieldType) -> Self {
        self.unique.push(name.to_string());
        self.field(name, field_type)
    }

    /// Declare a field referencing `target`, written as `"table.field"`.
    pub fn foreign_key(mut self, name: &str, field_type: FieldType, target: &str) -> Self {
        self.foreign_keys
            .insert(name.to_string(), target.to_string());
        self.field(name, field_type)
    }
}

/// Persisted per-table metadata, one section of the `.tables` file.
///
/// Field order matters for the TOML encoding: plain values must come before the
/// `fields` array of tables and the `foreign_keys` sub-table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub tablename: String,
    pub filename: String,
    pub primary_keys: Vec<String>,
    /// Every unique-constrained field, primary keys included
    pub unique_keys: BTreeSet<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
}

impl TableSchema {
    /// Derive the schema for a declared table.
    pub fn from_declaration(declaration: &TableDeclaration) -> Result<Self> {
        if declaration.primary_keys.is_empty() {
            return Err(KontoDbError::SchemaCorrupt(format!(
                "Table '{}' declares no primary key",
                declaration.name
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &declaration.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(KontoDbError::SchemaCorrupt(format!(
                    "Table '{}' declares field '{}' twice",
                    declaration.name, field.name
                )));
            }
        }

        let unique_keys = declaration
            .primary_keys
            .iter()
            .chain(declaration.unique.iter())
            .cloned()
            .collect();

        Ok(TableSchema {
            tablename: declaration.name.clone(),
            filename: format!("{}.json", declaration.name),
            primary_keys: declaration.primary_keys.clone(),
            unique_keys,
            fields: declaration.fields.clone(),
            foreign_keys: declaration.foreign_keys.clone(),
        })
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field_type)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_type(name).is_some()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.iter().any(|k| k == name)
    }

    /// Unique-constrained fields that are not part of the primary key.
    pub fn secondary_unique_keys(&self) -> impl Iterator<Item = &str> {
        self.unique_keys
            .iter()
            .map(String::as_str)
            .filter(|k| !self.is_primary_key(k))
    }

    /// Extract this record's primary key. Missing key fields read as null.
    pub fn key_of(&self, record: &Record) -> PrimaryKey {
        PrimaryKey::new(
            self.primary_keys
                .iter()
                .map(|k| record.get(k).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Reject keys whose arity differs from the primary-key list.
    pub fn check_key(&self, key: &PrimaryKey) -> Result<()> {
        if key.len() != self.primary_keys.len() {
            return Err(KontoDbError::Validation(format!(
                "Table '{}' has {} primary key field(s), got {} value(s)",
                self.tablename,
                self.primary_keys.len(),
                key.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn konto() -> TableDeclaration {
        TableDeclaration::new("konto")
            .primary_key("kontonummer", FieldType::String)
            .field("kontostand", FieldType::Integer)
            .foreign_key("besitzer", FieldType::String, "kunde.pk")
            .field("waehrung", FieldType::String)
    }

    #[test]
    fn test_schema_from_declaration() {
        let schema = TableSchema::from_declaration(&konto()).unwrap();
        assert_eq!(schema.filename, "konto.json");
        assert_eq!(schema.primary_keys, vec!["kontonummer"]);
        assert!(schema.unique_keys.contains("kontonummer"));
        assert_eq!(schema.foreign_keys["besitzer"], "kunde.pk");
        assert_eq!(schema.field_type("kontostand"), Some(FieldType::Integer));
        assert_eq!(schema.secondary_unique_keys().count(), 0);
    }

    #[test]
    fn test_unique_keys_include_primary_keys() {
        let decl = TableDeclaration::new("kunde")
            .primary_key("pk", FieldType::String)
            .unique("username", FieldType::String);
        let schema = TableSchema::from_declaration(&decl).unwrap();
        assert_eq!(schema.unique_keys.len(), 2);
        assert_eq!(schema.secondary_unique_keys().collect::<Vec<_>>(), vec!["username"]);
    }

    #[test]
    fn test_missing_primary_key_rejected() {
        let decl = TableDeclaration::new("broken").field("a", FieldType::String);
        let err = TableSchema::from_declaration(&decl).unwrap_err();
        assert!(matches!(err, KontoDbError::SchemaCorrupt(_)));
    }

    #[test]
    fn test_key_of_and_arity() {
        let schema = TableSchema::from_declaration(&konto()).unwrap();
        let mut record = Record::new();
        record.insert("kontonummer".into(), json!("ABC"));
        record.insert("kontostand".into(), json!(0));

        let key = schema.key_of(&record);
        assert_eq!(key, PrimaryKey::from("ABC"));
        assert!(schema.check_key(&key).is_ok());
        assert!(schema
            .check_key(&PrimaryKey::new(vec![json!("A"), json!("B")]))
            .is_err());
    }
}
