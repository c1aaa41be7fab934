use super::{Entity, Konto};
use crate::error::{KontoDbError, Result};
use crate::schema::{FieldType, TableDeclaration};
use crate::store::Store;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bank customer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kunde {
    pub pk: String,
    pub username: String,
    /// Stored as supplied; `bank::hash_password` produces the stored form.
    pub password: String,
    pub name: String,
    pub strasse: String,
    pub stadt: String,
    pub plz: String,
    pub geb_date: Option<NaiveDate>,
}

impl Kunde {
    /// A customer with a fresh random key and every other field empty.
    pub fn new(username: impl Into<String>) -> Self {
        Kunde {
            pk: uuid::Uuid::new_v4().simple().to_string(),
            username: username.into(),
            ..Kunde::default()
        }
    }

    /// Accounts owned by this customer.
    pub fn konten(&self, store: &Store) -> Result<Vec<Konto>> {
        Konto::objects(store).filter([("besitzer", self.pk.as_str())])
    }
}

impl Entity for Kunde {
    const TABLE: &'static str = "kunde";

    fn declaration() -> TableDeclaration {
        TableDeclaration::new(Self::TABLE)
            .primary_key("pk", FieldType::String)
            .unique("username", FieldType::String)
            .field("password", FieldType::String)
            .field("name", FieldType::String)
            .field("strasse", FieldType::String)
            .field("stadt", FieldType::String)
            .field("plz", FieldType::String)
            .field("geb_date", FieldType::Date)
    }

    fn validate(&self) -> Result<()> {
        if self.pk.is_empty() {
            return Err(KontoDbError::Validation("Kunde.pk must not be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(KontoDbError::Validation(
                "Kunde.username must not be empty".into(),
            ));
        }
        Ok(())
    }
}
