// Records: the flat field -> scalar form every backend stores

use serde_json::Value;
use std::fmt;

/// One stored row. Insertion order follows the entity's field order.
pub type Record = serde_json::Map<String, Value>;

/// Primary-key values of a record, in the order of the table's primary-key list.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey(Vec<Value>);

impl PrimaryKey {
    pub fn new(values: Vec<Value>) -> Self {
        PrimaryKey(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(display_value).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        PrimaryKey(vec![Value::String(value.to_string())])
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        PrimaryKey(vec![Value::String(value)])
    }
}

impl From<&String> for PrimaryKey {
    fn from(value: &String) -> Self {
        PrimaryKey(vec![Value::String(value.clone())])
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey(vec![Value::from(value)])
    }
}

impl From<Value> for PrimaryKey {
    fn from(value: Value) -> Self {
        PrimaryKey(vec![value])
    }
}

impl From<Vec<Value>> for PrimaryKey {
    fn from(values: Vec<Value>) -> Self {
        PrimaryKey(values)
    }
}

/// Render a scalar for keys and error messages (strings without quotes).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a record from `(field, value)` pairs, e.g. filter constraints.
pub fn record_from_pairs<I, K, V>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// True when every constrained field of `record` equals the given value.
pub fn matches_constraints(record: &Record, constraints: &Record) -> bool {
    constraints
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_composite_key() {
        let key = PrimaryKey::new(vec![json!("u1"), json!(7)]);
        assert_eq!(key.to_string(), "u1,7");
        assert_eq!(key.len(), 2);
    }

    #[test]
    fn test_matches_constraints() {
        let record = record_from_pairs([("plz", json!("13689")), ("stadt", json!("Berlin"))]);

        assert!(matches_constraints(&record, &Record::new()));
        assert!(matches_constraints(
            &record,
            &record_from_pairs([("plz", "13689"), ("stadt", "Berlin")])
        ));
        assert!(!matches_constraints(
            &record,
            &record_from_pairs([("plz", "13689"), ("stadt", "jerlin")])
        ));
        assert!(!matches_constraints(&record, &record_from_pairs([("name", "Ben Koch")])));
    }
}
