use super::Entity;
use crate::error::{KontoDbError, Result};
use crate::schema::{FieldType, TableDeclaration};
use serde::{Deserialize, Serialize};

/// Characters of generated account numbers
pub const KONTONUMMER_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub const KONTONUMMER_LEN: usize = 12;

pub const DEFAULT_WAEHRUNG: &str = "EUR";

/// A customer's account. The balance is kept in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Konto {
    pub kontonummer: String,
    pub kontostand: i64,
    pub besitzer: String,
    pub waehrung: String,
}

impl Konto {
    /// An empty EUR account with a random account number.
    pub fn new(besitzer: impl Into<String>) -> Self {
        Konto {
            kontonummer: nanoid::nanoid!(KONTONUMMER_LEN, &KONTONUMMER_ALPHABET),
            kontostand: 0,
            besitzer: besitzer.into(),
            waehrung: DEFAULT_WAEHRUNG.to_string(),
        }
    }
}

impl Entity for Konto {
    const TABLE: &'static str = "konto";

    fn declaration() -> TableDeclaration {
        TableDeclaration::new(Self::TABLE)
            .primary_key("kontonummer", FieldType::String)
            .field("kontostand", FieldType::Integer)
            .foreign_key("besitzer", FieldType::String, "kunde.pk")
            .field("waehrung", FieldType::String)
    }

    fn validate(&self) -> Result<()> {
        if self.kontonummer.is_empty() {
            return Err(KontoDbError::Validation(
                "Konto.kontonummer must not be empty".into(),
            ));
        }
        if self.besitzer.is_empty() {
            return Err(KontoDbError::Validation(format!(
                "Konto {} has no besitzer",
                self.kontonummer
            )));
        }
        if self.kontostand < 0 {
            return Err(KontoDbError::Validation(format!(
                "Konto {} balance must not be negative, got {}",
                self.kontonummer, self.kontostand
            )));
        }
        Ok(())
    }
}
