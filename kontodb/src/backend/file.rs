use super::{Backend, BackendKind};
use crate::engine::FileEngine;
use crate::error::{KontoDbError, Result};
use crate::record::{display_value, matches_constraints, PrimaryKey, Record};
use crate::schema::{TableDeclaration, TableSchema};
use std::path::Path;

/// The flat-file backend: uniqueness enforcement and CRUD over a `FileEngine`.
#[derive(Debug)]
pub struct FileBackend {
    engine: FileEngine,
}

impl FileBackend {
    pub fn create(root: &Path, declarations: &[TableDeclaration]) -> Result<Self> {
        Ok(FileBackend {
            engine: FileEngine::create(root, declarations)?,
        })
    }

    pub fn open(root: &Path) -> Result<Self> {
        Ok(FileBackend {
            engine: FileEngine::open(root)?,
        })
    }

    pub fn destroy(root: &Path) -> Result<()> {
        FileEngine::destroy(root)
    }

    pub fn engine(&self) -> &FileEngine {
        &self.engine
    }
}

impl Backend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn schema(&self, table: &str) -> Result<&TableSchema> {
        self.engine.schema(table)
    }

    fn table_names(&self) -> Vec<String> {
        self.engine
            .registry()
            .tables()
            .map(|t| t.tablename.clone())
            .collect()
    }

    fn save(&self, table: &str, record: Record) -> Result<()> {
        let schema = self.engine.schema(table)?;
        let key = schema.key_of(&record);
        let existing = self.engine.read_table(table)?;

        check_unique(schema, &existing, &record, &key)?;

        if existing.iter().any(|r| schema.key_of(r) == key) {
            log::debug!("Updating {table}/{key}");
            self.engine.replace_record(table, &key, Some(record))
        } else {
            log::debug!("Inserting {table}/{key}");
            self.engine.append_record(table, record)
        }
    }

    fn get(&self, table: &str, key: &PrimaryKey) -> Result<Record> {
        self.engine
            .read_by_primary_key(table, key)?
            .ok_or_else(|| KontoDbError::ObjectNotFound {
                table: table.to_string(),
                key: key.to_string(),
            })
    }

    fn filter(&self, table: &str, constraints: &Record) -> Result<Vec<Record>> {
        let mut records = self.engine.read_table(table)?;
        records.retain(|record| matches_constraints(record, constraints));
        Ok(records)
    }

    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        log::debug!("Deleting {table}/{key}");
        self.engine.replace_record(table, key, None)
    }
}

/// Linear scan for a unique-field collision with any record other than the
/// one sharing `key`. Null values never collide.
fn check_unique(
    schema: &TableSchema,
    existing: &[Record],
    record: &Record,
    key: &PrimaryKey,
) -> Result<()> {
    for field in schema.secondary_unique_keys() {
        let value = match record.get(field) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };

        let collision = existing
            .iter()
            .filter(|other| schema.key_of(other) != *key)
            .any(|other| other.get(field) == Some(value));

        if collision {
            return Err(KontoDbError::ObjectAlreadyExists {
                table: schema.tablename.clone(),
                field: field.to_string(),
                value: display_value(value),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record_from_pairs;
    use crate::schema::FieldType;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn setup_backend() -> (TempDir, FileBackend) {
        let tmp = TempDir::new().unwrap();
        let declarations = vec![TableDeclaration::new("kunde")
            .primary_key("pk", FieldType::String)
            .unique("username", FieldType::String)
            .field("stadt", FieldType::String)];
        let backend = FileBackend::create(&tmp.path().join("data"), &declarations).unwrap();
        (tmp, backend)
    }

    fn kunde(pk: &str, username: &str, stadt: &str) -> Record {
        record_from_pairs([("pk", pk), ("username", username), ("stadt", stadt)])
    }

    #[test]
    fn test_save_inserts_then_updates() {
        let (_tmp, backend) = setup_backend();
        backend.save("kunde", kunde("u1", "ben", "Berlin")).unwrap();
        backend.save("kunde", kunde("u1", "ben", "Hamburg")).unwrap();

        let all = backend.filter("kunde", &Record::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["stadt"], json!("Hamburg"));
    }

    #[test]
    fn test_unique_collision_leaves_file_untouched() {
        let (_tmp, backend) = setup_backend();
        backend.save("kunde", kunde("u1", "ben", "Berlin")).unwrap();

        let path = backend.engine().root().join("kunde.json");
        let before = std::fs::read(&path).unwrap();

        let err = backend.save("kunde", kunde("u2", "ben", "Köln")).unwrap_err();
        assert!(matches!(
            &err,
            KontoDbError::ObjectAlreadyExists { field, value, .. } if field == "username" && value == "ben"
        ));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_update_may_keep_own_unique_value() {
        let (_tmp, backend) = setup_backend();
        backend.save("kunde", kunde("u1", "ben", "Berlin")).unwrap();
        backend.save("kunde", kunde("u2", "anna", "Berlin")).unwrap();

        // Own value is fine, someone else's is not
        backend.save("kunde", kunde("u1", "ben", "Bonn")).unwrap();
        let err = backend.save("kunde", kunde("u1", "anna", "Bonn")).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_null_unique_values_do_not_collide() {
        let (_tmp, backend) = setup_backend();
        let mut a = kunde("u1", "", "Berlin");
        a.insert("username".into(), Value::Null);
        let mut b = kunde("u2", "", "Berlin");
        b.insert("username".into(), Value::Null);

        backend.save("kunde", a).unwrap();
        backend.save("kunde", b).unwrap();
        assert_eq!(backend.filter("kunde", &Record::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_and_get() {
        let (_tmp, backend) = setup_backend();
        backend.save("kunde", kunde("u1", "ben", "Berlin")).unwrap();
        backend.save("kunde", kunde("u2", "anna", "Berlin")).unwrap();
        backend.save("kunde", kunde("u3", "carl", "Bonn")).unwrap();

        let berlin = backend
            .filter("kunde", &record_from_pairs([("stadt", "Berlin")]))
            .unwrap();
        assert_eq!(berlin.len(), 2);

        let none = backend
            .filter("kunde", &record_from_pairs([("stadt", "jerlin")]))
            .unwrap();
        assert!(none.is_empty());

        let unknown_field = backend
            .filter("kunde", &record_from_pairs([("plz", "13689")]))
            .unwrap();
        assert!(unknown_field.is_empty());

        let found = backend.get("kunde", &PrimaryKey::from("u3")).unwrap();
        assert_eq!(found["username"], json!("carl"));
    }

    #[test]
    fn test_delete_then_get() {
        let (_tmp, backend) = setup_backend();
        backend.save("kunde", kunde("u1", "ben", "Berlin")).unwrap();

        backend.delete("kunde", &PrimaryKey::from("u1")).unwrap();
        assert!(backend
            .get("kunde", &PrimaryKey::from("u1"))
            .unwrap_err()
            .is_not_found());
        assert!(backend
            .delete("kunde", &PrimaryKey::from("u1"))
            .unwrap_err()
            .is_not_found());
    }
}
