// Banking operations on top of the managers: customers, accounts, money movement

pub mod customer;
pub mod money;

pub use customer::{
    delete_customer, hash_password, login_customer, register_customer, validate_registration,
    verify_password,
};
pub use money::{format_cents, parse_amount};

use crate::entity::{Entity, Konto, Kunde};
use crate::error::{KontoDbError, Result};
use crate::store::Store;

/// Open a zero-balance EUR account for an existing customer.
pub fn open_account(store: &Store, besitzer: &str) -> Result<Konto> {
    Kunde::objects(store).get(besitzer)?;

    // Generated numbers are random; never overwrite an existing account
    let konto = loop {
        let candidate = Konto::new(besitzer);
        match Konto::objects(store).get(&candidate.kontonummer) {
            Ok(_) => continue,
            Err(e) if e.is_not_found() => break candidate,
            Err(e) => return Err(e),
        }
    };
    konto.manager(store).save()?;

    log::info!("Opened account {} for {besitzer}", konto.kontonummer);
    Ok(konto)
}

/// Add `cents` to the balance and return the updated account.
pub fn deposit(store: &Store, kontonummer: &str, cents: i64) -> Result<Konto> {
    check_positive(cents)?;
    let mut konto = Konto::objects(store).get(kontonummer)?;

    konto.kontostand = konto.kontostand.checked_add(cents).ok_or_else(|| {
        KontoDbError::Validation(format!("Deposit would overflow the balance of {kontonummer}"))
    })?;
    konto.manager(store).save()?;

    log::debug!("Deposited {cents} cent(s) to {kontonummer}");
    Ok(konto)
}

/// Take `cents` from the balance and return the updated account. The balance
/// can't go below zero.
pub fn withdraw(store: &Store, kontonummer: &str, cents: i64) -> Result<Konto> {
    check_positive(cents)?;
    let mut konto = Konto::objects(store).get(kontonummer)?;

    if cents > konto.kontostand {
        return Err(KontoDbError::Validation(format!(
            "Insufficient funds on {kontonummer}: balance {}, requested {}",
            money::format_cents(konto.kontostand),
            money::format_cents(cents)
        )));
    }
    konto.kontostand -= cents;
    konto.manager(store).save()?;

    log::debug!("Withdrew {cents} cent(s) from {kontonummer}");
    Ok(konto)
}

/// Move `cents` between two accounts. Both must exist before anything moves.
///
/// The two writes are separate: a failure on the deposit leaves the
/// withdrawal in place.
pub fn transfer(store: &Store, from: &str, to: &str, cents: i64) -> Result<(Konto, Konto)> {
    check_positive(cents)?;
    if from == to {
        return Err(KontoDbError::Validation(format!(
            "Cannot transfer from {from} to itself"
        )));
    }
    Konto::objects(store).get(from)?;
    Konto::objects(store).get(to)?;

    let source = withdraw(store, from, cents)?;
    let target = deposit(store, to, cents)?;
    Ok((source, target))
}

fn check_positive(cents: i64) -> Result<()> {
    if cents <= 0 {
        return Err(KontoDbError::Validation(format!(
            "Amount must be positive, got {}",
            money::format_cents(cents)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::entity::banking_tables;
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

    fn customer(store: &Store, pk: &str) -> Kunde {
        let kunde = Kunde {
            pk: pk.into(),
            ..Kunde::new(format!("user-{pk}"))
        };
        kunde.manager(store).save().unwrap();
        kunde
    }

    #[test]
    fn test_open_account() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            let kunde = customer(store, "u1");
            let konto = open_account(store, "u1").unwrap();
            assert_eq!(konto.kontostand, 0);
            assert_eq!(konto.waehrung, "EUR");
            assert_eq!(kunde.konten(store).unwrap(), vec![konto]);

            assert!(open_account(store, "u9").unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            customer(store, "u1");
            let konto = open_account(store, "u1").unwrap();

            assert_eq!(deposit(store, &konto.kontonummer, 1000).unwrap().kontostand, 1000);
            assert_eq!(withdraw(store, &konto.kontonummer, 250).unwrap().kontostand, 750);
            assert_eq!(
                Konto::objects(store).get(&konto.kontonummer).unwrap().kontostand,
                750
            );
        }
    }

    #[test]
    fn test_overdraft_leaves_balance() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            customer(store, "u1");
            let konto = open_account(store, "u1").unwrap();
            deposit(store, &konto.kontonummer, 500).unwrap();

            let err = withdraw(store, &konto.kontonummer, 501).unwrap_err();
            assert!(matches!(err, KontoDbError::Validation(_)));
            assert_eq!(
                Konto::objects(store).get(&konto.kontonummer).unwrap().kontostand,
                500
            );
        }
    }

    #[test]
    fn test_non_positive_amounts() {
        let (_tmp, stores) = setup_stores();
        let store = &stores[0];
        customer(store, "u1");
        let konto = open_account(store, "u1").unwrap();

        for cents in [0, -100] {
            assert!(matches!(
                deposit(store, &konto.kontonummer, cents),
                Err(KontoDbError::Validation(_))
            ));
            assert!(matches!(
                withdraw(store, &konto.kontonummer, cents),
                Err(KontoDbError::Validation(_))
            ));
        }
        assert!(deposit(store, "NOSUCHKONTO1", 100).unwrap_err().is_not_found());
    }

    #[test]
    fn test_transfer() {
        let (_tmp, stores) = setup_stores();
        for store in &stores {
            customer(store, "u1");
            customer(store, "u2");
            let a = open_account(store, "u1").unwrap();
            let b = open_account(store, "u2").unwrap();
            deposit(store, &a.kontonummer, 1000).unwrap();

            let (source, target) = transfer(store, &a.kontonummer, &b.kontonummer, 400).unwrap();
            assert_eq!(source.kontostand, 600);
            assert_eq!(target.kontostand, 400);

            let err = transfer(store, &a.kontonummer, &a.kontonummer, 1).unwrap_err();
            assert!(matches!(err, KontoDbError::Validation(_)));

            // Missing target: nothing is withdrawn
            let err = transfer(store, &a.kontonummer, "NOSUCHKONTO1", 100).unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(Konto::objects(store).get(&a.kontonummer).unwrap().kontostand, 600);
        }
    }
}
