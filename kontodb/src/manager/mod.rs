// Uniform CRUD façade over whichever backend the store runs on.
//
// Managers hold no state beyond borrowed references: every call goes to the
// backend, so every call sees the latest stored data.

use crate::entity::Entity;
use crate::error::{KontoDbError, Result};
use crate::record::{record_from_pairs, PrimaryKey, Record};
use crate::store::Store;
use crate::validation::check_record;
use serde_json::Value;
use std::marker::PhantomData;

/// Read-only, type-scoped access: `Kunde::objects(&store)`.
pub struct Query<'a, E: Entity> {
    store: &'a Store,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Query<'a, E> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Query {
            store,
            _entity: PhantomData,
        }
    }

    /// Exact lookup by primary key, `ObjectNotFound` when absent.
    pub fn get(&self, key: impl Into<PrimaryKey>) -> Result<E> {
        let key = key.into();
        log::debug!("get {}/{key}", E::TABLE);
        let record = self.store.backend().get(E::TABLE, &key)?;
        self.store.tables().decode(E::TABLE, record)
    }

    /// Every entity whose listed fields all equal the given values.
    pub fn filter<I, K, V>(&self, constraints: I) -> Result<Vec<E>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.filter_record(&record_from_pairs(constraints))
    }

    pub fn filter_record(&self, constraints: &Record) -> Result<Vec<E>> {
        log::debug!("filter {} by {} constraint(s)", E::TABLE, constraints.len());
        self.store
            .backend()
            .filter(E::TABLE, constraints)?
            .into_iter()
            .map(|record| self.store.tables().decode(E::TABLE, record))
            .collect()
    }

    pub fn all(&self) -> Result<Vec<E>> {
        self.filter_record(&Record::new())
    }
}

/// Instance-scoped access: `kunde.manager(&store)`. Adds `save` and `delete`
/// for the bound value on top of the queries.
pub struct Manager<'a, E: Entity> {
    entity: &'a E,
    query: Query<'a, E>,
}

impl<'a, E: Entity> Manager<'a, E> {
    pub(crate) fn new(store: &'a Store, entity: &'a E) -> Self {
        Manager {
            entity,
            query: Query::new(store),
        }
    }

    fn store(&self) -> &'a Store {
        self.query.store
    }

    /// Primary key of the bound value
    pub fn key(&self) -> Result<PrimaryKey> {
        let record = self.entity.to_record()?;
        Ok(self.store().schema(E::TABLE)?.key_of(&record))
    }

    /// Insert the value, or overwrite the stored record with the same key.
    ///
    /// Validation failures and unique collisions are reported before
    /// anything is written.
    pub fn save(&self) -> Result<()> {
        self.entity.validate()?;
        let record = self.entity.to_record()?;
        let schema = self.store().schema(E::TABLE)?;
        check_record(schema, &record)?;

        log::debug!("save {}/{}", E::TABLE, schema.key_of(&record));
        self.store().backend().save(E::TABLE, record)
    }

    /// Apply field changes to the stored record of the bound value and return
    /// the updated entity.
    ///
    /// Unlike `save`, this never inserts: a value that isn't stored fails
    /// with `ObjectNotFound`. Primary-key fields can't be changed.
    pub fn update<I, K, V>(&self, changes: I) -> Result<E>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let schema = self.store().schema(E::TABLE)?;
        let mut record = self.entity.to_record()?;
        for (field, value) in changes {
            let field = field.into();
            if schema.is_primary_key(&field) {
                return Err(KontoDbError::Validation(format!(
                    "Primary key field '{field}' of table '{}' can't be updated",
                    E::TABLE
                )));
            }
            record.insert(field, value.into());
        }
        check_record(schema, &record)?;

        let updated: E = self.store().tables().decode(E::TABLE, record.clone())?;
        updated.validate()?;

        let key = schema.key_of(&record);
        self.store().backend().get(E::TABLE, &key)?;

        log::debug!("update {}/{key}", E::TABLE);
        self.store().backend().save(E::TABLE, record)?;
        Ok(updated)
    }

    /// Remove the stored record with the bound value's key.
    pub fn delete(&self) -> Result<()> {
        let key = self.key()?;
        log::debug!("delete {}/{key}", E::TABLE);
        self.store().backend().delete(E::TABLE, &key)
    }

    pub fn get(&self, key: impl Into<PrimaryKey>) -> Result<E> {
        self.query.get(key)
    }

    pub fn filter<I, K, V>(&self, constraints: I) -> Result<Vec<E>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.query.filter(constraints)
    }

    pub fn all(&self) -> Result<Vec<E>> {
        self.query.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::config::StoreConfig;
    use crate::entity::{banking_tables, Konto, Kunde};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup_stores() -> (TempDir, Vec<Store>) {
        let tmp = TempDir::new().unwrap();
        let stores = vec![
            Store::create(StoreConfig::file(tmp.path().join("data")), banking_tables()).unwrap(),
            Store::create(
                StoreConfig::sqlite(tmp.path().join("data.sqlite3")),
                banking_tables(),
            )
            .unwrap(),
        ];
        (tmp, stores)
    }

    fn ben() -> Kunde {
        Kunde {
            pk: "u1".into(),
            username: "ben.koch".into(),
            password: "security420".into(),
            name: "Ben Koch".into(),
            strasse: "Some Street 13".into(),
            stadt: "Berlin".into(),
            plz: "13689".into(),
            geb_date: NaiveDate::from_ymd_opt(1999, 2, 13),
        }
    }

    #[test]
    fn test_empty_store() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            assert!(Kunde::objects(store).all().unwrap().is_empty());
            assert!(Kunde::objects(store).get("1").unwrap_err().is_not_found());
            assert!(Kunde::objects(store)
                .filter([("name", "Ben Koch")])
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn test_save_get_round_trip() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = ben();
            kunde.manager(store).save().unwrap();
            assert_eq!(Kunde::objects(store).get("u1").unwrap(), kunde);

            let konto = Konto {
                kontostand: 1250,
                ..Konto::new("u1")
            };
            konto.manager(store).save().unwrap();
            assert_eq!(
                Konto::objects(store).get(&konto.kontonummer).unwrap(),
                konto
            );
        }
    }

    #[test]
    fn test_duplicate_username_scenario() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let first = Kunde {
                pk: "u1".into(),
                ..Kunde::new("ben")
            };
            let second = Kunde {
                pk: "u2".into(),
                ..Kunde::new("ben")
            };

            first.manager(store).save().unwrap();
            let err = second.manager(store).save().unwrap_err();
            assert!(err.is_already_exists(), "{}: {err}", store.backend_kind());

            let all = Kunde::objects(store).all().unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].pk, "u1");
        }
    }

    #[test]
    fn test_account_filter_scenario() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            Konto::new("u1").manager(store).save().unwrap();
            Konto::new("u2").manager(store).save().unwrap();

            let owned = Konto::objects(store).filter([("besitzer", "u1")]).unwrap();
            assert_eq!(owned.len(), 1);
            assert_eq!(owned[0].kontostand, 0);

            let err = Konto::objects(store).get("does-not-exist").unwrap_err();
            assert!(err.is_not_found());
        }
    }

    #[test]
    fn test_filter_semantics() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            ben().manager(store).save().unwrap();
            let objects = Kunde::objects(store);

            assert_eq!(objects.filter([("name", "Ben Koch")]).unwrap().len(), 1);
            assert!(objects.filter([("name", "Gerhard Orgel")]).unwrap().is_empty());
            assert_eq!(
                objects
                    .filter([("plz", "13689"), ("stadt", "Berlin")])
                    .unwrap()
                    .len(),
                1
            );
            assert!(objects
                .filter([("plz", "13689"), ("stadt", "jerlin")])
                .unwrap()
                .is_empty());
            assert!(objects.filter([("kontostand", "0")]).unwrap().is_empty());
        }
    }

    #[test]
    fn test_update_overwrites() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let mut kunde = ben();
            kunde.manager(store).save().unwrap();

            kunde.stadt = "Hamburg".into();
            kunde.manager(store).save().unwrap();

            let all = Kunde::objects(store).all().unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].stadt, "Hamburg");
        }
    }

    #[test]
    fn test_delete_then_get() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = ben();
            kunde.manager(store).save().unwrap();
            kunde.manager(store).delete().unwrap();

            assert!(Kunde::objects(store).get("u1").unwrap_err().is_not_found());
            assert!(kunde.manager(store).delete().unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_invalid_entity_writes_nothing() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let broke = Konto {
                kontostand: -5,
                ..Konto::new("u1")
            };
            let err = broke.manager(store).save().unwrap_err();
            assert!(matches!(err, KontoDbError::Validation(_)));
            assert!(Konto::objects(store).all().unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_save_leaves_file_identical() {
        let (tmp, stores) = setup_stores();
        let store = &stores[0];
        assert_eq!(store.backend_kind(), BackendKind::File);

        ben().manager(store).save().unwrap();
        let path = tmp.path().join("data").join("kunde.json");
        let before = std::fs::read(&path).unwrap();

        let keyless = Kunde {
            pk: String::new(),
            ..ben()
        };
        assert!(keyless.manager(store).save().is_err());

        let duplicate = Kunde {
            pk: "u2".into(),
            ..ben()
        };
        assert!(duplicate.manager(store).save().unwrap_err().is_already_exists());

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_update_changes_fields() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = ben();
            kunde.manager(store).save().unwrap();

            let updated = kunde
                .manager(store)
                .update([("stadt", "Hamburg"), ("plz", "20095")])
                .unwrap();
            assert_eq!(updated.stadt, "Hamburg");
            assert_eq!(updated.name, "Ben Koch");
            assert_eq!(Kunde::objects(store).get("u1").unwrap(), updated);
            assert_eq!(Kunde::objects(store).all().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_update_requires_stored_record() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let err = ben().manager(store).update([("stadt", "Hamburg")]).unwrap_err();
            assert!(err.is_not_found(), "{}: {err}", store.backend_kind());
            assert!(Kunde::objects(store).all().unwrap().is_empty());
        }
    }

    #[test]
    fn test_update_rejects_bad_changes() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = ben();
            kunde.manager(store).save().unwrap();
            let anna = Kunde {
                pk: "u2".into(),
                username: "anna.berg".into(),
                ..ben()
            };
            anna.manager(store).save().unwrap();

            let manager = anna.manager(store);
            assert!(manager
                .update([("username", "ben.koch")])
                .unwrap_err()
                .is_already_exists());
            assert!(matches!(
                manager.update([("konten", "none")]).unwrap_err(),
                KontoDbError::Validation(_)
            ));
            assert!(matches!(
                manager.update([("pk", "u3")]).unwrap_err(),
                KontoDbError::Validation(_)
            ));
            assert!(matches!(
                manager.update([("geb_date", "13.02.1999")]).unwrap_err(),
                KontoDbError::Validation(_)
            ));

            assert_eq!(Kunde::objects(store).get("u2").unwrap(), anna);
        }
    }

    #[test]
    fn test_references_are_not_enforced() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let orphan = Konto::new("nobody");
            orphan.manager(store).save().unwrap();

            let kunde = ben();
            kunde.manager(store).save().unwrap();
            Konto::new("u1").manager(store).save().unwrap();
            kunde.manager(store).delete().unwrap();

            assert!(Kunde::objects(store).get("u1").unwrap_err().is_not_found());
            assert_eq!(Konto::objects(store).all().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_key_of_wrong_type_is_not_found() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = Kunde {
                pk: "5".into(),
                ..ben()
            };
            kunde.manager(store).save().unwrap();

            let err = Kunde::objects(store).get(5i64).unwrap_err();
            assert!(err.is_not_found(), "{}: {err}", store.backend_kind());
            let err = store
                .backend()
                .delete(Kunde::TABLE, &PrimaryKey::from(5i64))
                .unwrap_err();
            assert!(err.is_not_found(), "{}: {err}", store.backend_kind());
            assert_eq!(Kunde::objects(store).get("5").unwrap(), kunde);
        }
    }

    #[test]
    fn test_instance_manager_queries() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = ben();
            let manager = kunde.manager(store);
            manager.save().unwrap();

            assert_eq!(manager.key().unwrap(), PrimaryKey::from("u1"));
            assert_eq!(manager.all().unwrap().len(), 1);
            assert_eq!(manager.get("u1").unwrap().username, "ben.koch");
            assert_eq!(manager.filter([("stadt", "Berlin")]).unwrap().len(), 1);
        }
    }
}
