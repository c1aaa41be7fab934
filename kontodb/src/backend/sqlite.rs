use super::{Backend, BackendKind};
use crate::error::{KontoDbError, Result};
use crate::record::{display_value, PrimaryKey, Record};
use crate::schema::{FieldType, TableDeclaration, TableSchema};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// The relational backend: the same CRUD contract answered by SQLite.
///
/// Table metadata comes from the entity declarations; SQLite itself is the
/// schema authority on disk, so no `.tables` file is written.
pub struct SqliteBackend {
    conn: Connection,
    tables: BTreeMap<String, TableSchema>,
}

impl SqliteBackend {
    /// Create a new database file with one table per declaration.
    pub fn create(path: &Path, declarations: &[TableDeclaration]) -> Result<Self> {
        if path.exists() {
            return Err(KontoDbError::StoreAlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let built = Connection::open(path)
            .map_err(KontoDbError::from)
            .and_then(|conn| SqliteBackend::with_connection(conn, declarations))
            .and_then(|backend| backend.create_tables().map(|()| backend));
        let backend = match built {
            Ok(backend) => backend,
            Err(e) => {
                // Don't leave a half-initialized database behind
                let _ = std::fs::remove_file(path);
                return Err(e);
            }
        };

        log::info!("Created SQLite store at {}", path.display());
        Ok(backend)
    }

    /// Open an existing database file.
    pub fn open(path: &Path, declarations: &[TableDeclaration]) -> Result<Self> {
        if !path.is_file() {
            return Err(KontoDbError::StoreNotFound(path.to_path_buf()));
        }

        let conn = Connection::open(path)?;
        let mut backend = SqliteBackend::with_connection(conn, declarations)?;
        backend.drop_missing_tables()?;

        log::info!("Opened SQLite store at {}", path.display());
        Ok(backend)
    }

    /// Open a fresh in-memory database (for testing).
    pub fn open_in_memory(declarations: &[TableDeclaration]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = SqliteBackend::with_connection(conn, declarations)?;
        backend.create_tables()?;
        Ok(backend)
    }

    /// Remove a database file. A missing file is not an error.
    pub fn destroy(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                log::info!("Destroyed SQLite store at {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn with_connection(conn: Connection, declarations: &[TableDeclaration]) -> Result<Self> {
        // References are declared but not enforced, as in the file backend
        conn.pragma_update(None, "foreign_keys", false)?;

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
        Ok(SqliteBackend { conn, tables })
    }

    fn create_tables(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for schema in self.tables.values() {
            tx.execute_batch(&create_table_sql(schema)?)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Forget declared tables the database doesn't have; using them then
    /// fails with `TableNotFound`, as it does for the file backend.
    fn drop_missing_tables(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        for name in self.tables.keys() {
            let found: Option<i64> = self
                .conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [name],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_none() {
                missing.push(name.clone());
            }
        }

        for name in missing {
            log::warn!("Declared table '{name}' does not exist in the database");
            self.tables.remove(&name);
        }
        Ok(())
    }

    fn check_unique(
        &self,
        conn: &Connection,
        schema: &TableSchema,
        record: &Record,
        key: &PrimaryKey,
    ) -> Result<()> {
        for field in schema.secondary_unique_keys() {
            let value = match record.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            let sql = format!(
                "SELECT 1 FROM {} WHERE {} = ?1 AND NOT ({}) LIMIT 1",
                quote_ident(&schema.tablename),
                quote_ident(field),
                key_clause(schema, 2)
            );
            let params = std::iter::once(json_to_sql(Some(value))).chain(key_params(key));
            let collision: Option<i64> = conn
                .query_row(&sql, params_from_iter(params), |row| row.get(0))
                .optional()?;

            if collision.is_some() {
                return Err(KontoDbError::ObjectAlreadyExists {
                    table: schema.tablename.clone(),
                    field: field.to_string(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn schema(&self, table: &str) -> Result<&TableSchema> {
        self.tables
            .get(table)
            .ok_or_else(|| KontoDbError::TableNotFound(table.to_string()))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn save(&self, table: &str, record: Record) -> Result<()> {
        let schema = self.schema(table)?;
        let key = schema.key_of(&record);
        let tx = self.conn.unchecked_transaction()?;

        self.check_unique(&tx, schema, &record, &key)?;

        let exists_sql = format!(
            "SELECT 1 FROM {} WHERE {}",
            quote_ident(table),
            key_clause(schema, 1)
        );
        let exists: Option<i64> = tx
            .query_row(&exists_sql, params_from_iter(key_params(&key)), |row| row.get(0))
            .optional()?;

        let columns: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        let values: Vec<SqlValue> = columns
            .iter()
            .map(|c| json_to_sql(record.get(*c)))
            .collect();

        let written = if exists.is_some() {
            log::debug!("Updating {table}/{key}");
            let assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {}",
                quote_ident(table),
                assignments.join(", "),
                key_clause(schema, columns.len() + 1)
            );
            let params = values.into_iter().chain(key_params(&key));
            tx.execute(&sql, params_from_iter(params))
        } else {
            log::debug!("Inserting {table}/{key}");
            let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                names.join(", "),
                placeholders.join(", ")
            );
            tx.execute(&sql, params_from_iter(values))
        };

        written.map_err(|e| map_constraint_error(e, schema, &record))?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, table: &str, key: &PrimaryKey) -> Result<Record> {
        let schema = self.schema(table)?;
        schema.check_key(key)?;
        if !key_fits(schema, key) {
            return Err(not_found(table, key));
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select_list(schema),
            quote_ident(table),
            key_clause(schema, 1)
        );
        self.conn
            .query_row(&sql, params_from_iter(key_params(key)), |row| {
                row_to_record(schema, row)
            })
            .optional()?
            .ok_or_else(|| not_found(table, key))
    }

    fn filter(&self, table: &str, constraints: &Record) -> Result<Vec<Record>> {
        let schema = self.schema(table)?;

        // A constraint the column can never satisfy matches nothing, as it
        // would when comparing JSON values in the file backend
        for (field, value) in constraints {
            match schema.field_type(field) {
                Some(field_type) if value_fits(field_type, value) => {}
                _ => return Ok(Vec::new()),
            }
        }

        let mut sql = format!("SELECT {} FROM {}", select_list(schema), quote_ident(table));
        if !constraints.is_empty() {
            let conditions: Vec<String> = constraints
                .keys()
                .enumerate()
                .map(|(i, field)| format!("{} IS ?{}", quote_ident(field), i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        let params = constraints.values().map(|v| json_to_sql(Some(v)));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| row_to_record(schema, row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        let schema = self.schema(table)?;
        schema.check_key(key)?;
        if !key_fits(schema, key) {
            return Err(not_found(table, key));
        }

        log::debug!("Deleting {table}/{key}");
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(table),
            key_clause(schema, 1)
        );
        let affected = self.conn.execute(&sql, params_from_iter(key_params(key)))?;
        if affected == 0 {
            return Err(not_found(table, key));
        }
        Ok(())
    }
}

/// DDL for one table, including key and reference constraints.
fn create_table_sql(schema: &TableSchema) -> Result<String> {
    let mut lines: Vec<String> = schema
        .fields
        .iter()
        .map(|f| {
            let not_null = if schema.is_primary_key(&f.name) {
                " NOT NULL"
            } else {
                ""
            };
            format!(
                "{} {}{}",
                quote_ident(&f.name),
                f.field_type.sql_type(),
                not_null
            )
        })
        .collect();

    let pks: Vec<String> = schema.primary_keys.iter().map(|k| quote_ident(k)).collect();
    lines.push(format!("PRIMARY KEY ({})", pks.join(", ")));

    for field in schema.secondary_unique_keys() {
        lines.push(format!("UNIQUE ({})", quote_ident(field)));
    }

    for (field, target) in &schema.foreign_keys {
        let (target_table, target_field) = target.split_once('.').ok_or_else(|| {
            KontoDbError::SchemaCorrupt(format!(
                "Foreign key '{}.{field}' target '{target}' is not 'table.field'",
                schema.tablename
            ))
        })?;
        lines.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(field),
            quote_ident(target_table),
            quote_ident(target_field)
        ));
    }

    Ok(format!(
        "CREATE TABLE {} (\n    {}\n);",
        quote_ident(&schema.tablename),
        lines.join(",\n    ")
    ))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn select_list(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema.fields.iter().map(|f| quote_ident(&f.name)).collect();
    columns.join(", ")
}

/// `"a" = ?n AND "b" = ?n+1 ...` over the primary-key columns
fn key_clause(schema: &TableSchema, first_param: usize) -> String {
    let parts: Vec<String> = schema
        .primary_keys
        .iter()
        .enumerate()
        .map(|(i, k)| format!("{} = ?{}", quote_ident(k), first_param + i))
        .collect();
    parts.join(" AND ")
}

fn key_params(key: &PrimaryKey) -> Vec<SqlValue> {
    key.values().iter().map(|v| json_to_sql(Some(v))).collect()
}

/// Whether every key value has the JSON type of its column. Without this,
/// column affinity would let `5` match the stored text `"5"`.
fn key_fits(schema: &TableSchema, key: &PrimaryKey) -> bool {
    schema
        .primary_keys
        .iter()
        .zip(key.values())
        .all(|(field, value)| {
            !value.is_null()
                && schema
                    .field_type(field)
                    .map_or(false, |field_type| value_fits(field_type, value))
        })
}

fn not_found(table: &str, key: &PrimaryKey) -> KontoDbError {
    KontoDbError::ObjectNotFound {
        table: table.to_string(),
        key: key.to_string(),
    }
}

fn value_fits(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        _ if value.is_null() => true,
        FieldType::Integer => value.is_i64(),
        FieldType::String | FieldType::Date => value.is_string(),
    }
}

fn json_to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Number(n.into()),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into()),
    }
}

fn row_to_record(schema: &TableSchema, row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, field) in schema.fields.iter().enumerate() {
        let value: SqlValue = row.get(i)?;
        record.insert(field.name.clone(), sql_to_json(value));
    }
    Ok(record)
}

/// Turn SQLite's own UNIQUE / PRIMARY KEY failures into `ObjectAlreadyExists`.
fn map_constraint_error(err: rusqlite::Error, schema: &TableSchema, record: &Record) -> KontoDbError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        let code = failure.extended_code;
        if code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            // e.g. "UNIQUE constraint failed: kunde.username"
            let field = message
                .rsplit_once(": ")
                .and_then(|(_, columns)| columns.split(", ").next())
                .and_then(|column| column.split_once('.'))
                .map(|(_, field)| field.to_string())
                .unwrap_or_default();
            let value = record.get(&field).map(display_value).unwrap_or_default();
            return KontoDbError::ObjectAlreadyExists {
                table: schema.tablename.clone(),
                field,
                value,
            };
        }
    }
    err.into()
}
