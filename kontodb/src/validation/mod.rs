use crate::error::{KontoDbError, Result};
use crate::record::Record;
use crate::schema::{FieldType, TableSchema};
use chrono::NaiveDate;
use serde_json::Value;

/// Result of validating a record against its table schema
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a record's shape against the schema: primary keys set, declared
/// scalar types respected, no undeclared fields. Null is allowed elsewhere.
pub fn validate_record(schema: &TableSchema, record: &Record) -> ValidationResult {
    let mut result = ValidationResult::default();

    for key in &schema.primary_keys {
        match record.get(key) {
            None | Some(Value::Null) => result
                .errors
                .push(format!("Primary key field '{key}' is missing")),
            _ => {}
        }
    }

    for field in &schema.fields {
        if let Some(value) = record.get(&field.name) {
            if !value.is_null() {
                validate_field_value(&field.name, field.field_type, value, &mut result);
            }
        }
    }

    for key in record.keys() {
        if !schema.has_field(key) {
            result.errors.push(format!(
                "Unexpected field '{key}' for table '{}'",
                schema.tablename
            ));
        }
    }

    result
}

/// Validate a record and turn any issues into a `Validation` error.
pub fn check_record(schema: &TableSchema, record: &Record) -> Result<()> {
    let result = validate_record(schema, record);
    if result.is_ok() {
        Ok(())
    } else {
        Err(KontoDbError::Validation(format!(
            "{}: {}",
            schema.tablename,
            result.errors.join("; ")
        )))
    }
}

fn validate_field_value(
    field_name: &str,
    field_type: FieldType,
    value: &Value,
    result: &mut ValidationResult,
) {
    match field_type {
        FieldType::String => {
            if !value.is_string() {
                result.errors.push(format!(
                    "Field '{field_name}' expected string, got {}",
                    type_name(value)
                ));
            }
        }
        FieldType::Integer => {
            if !value.is_i64() {
                result.errors.push(format!(
                    "Field '{field_name}' expected integer, got {}",
                    type_name(value)
                ));
            }
        }
        FieldType::Date => match value.as_str() {
            Some(s) => {
                if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                    result.errors.push(format!(
                        "Field '{field_name}' value '{s}' is not an ISO date (YYYY-MM-DD)"
                    ));
                }
            }
            None => result.errors.push(format!(
                "Field '{field_name}' expected date string, got {}",
                type_name(value)
            )),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
