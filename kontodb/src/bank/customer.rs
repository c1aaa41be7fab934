use crate::entity::{Entity, Kunde};
use crate::error::{KontoDbError, Result};
use crate::store::Store;
use chrono::{Months, NaiveDate};
use sha2::{Digest, Sha256};

const HASH_SCHEME: &str = "sha256";

/// Customers must be at least this old to register
pub const MIN_AGE_YEARS: u32 = 18;

/// Check the profile rules a new customer has to meet. `password` is the
/// cleartext as entered.
pub fn validate_registration(kunde: &Kunde, today: NaiveDate) -> Result<()> {
    let mut errors = Vec::new();

    if kunde.username.chars().count() < 5 {
        errors.push("username must have at least 5 characters".to_string());
    }

    let password = &kunde.password;
    if password.chars().count() < 3 {
        errors.push("password must have at least 3 characters".to_string());
    }
    if password.chars().all(|c| c.is_numeric()) || password.chars().all(|c| c.is_alphabetic()) {
        errors.push("password must contain both letters and digits".to_string());
    }

    let name = kunde.name.trim();
    if name.split_whitespace().count() < 2 {
        errors.push("name must consist of first and last name".to_string());
    }
    if name.chars().count() < 5 {
        errors.push("name must have at least 5 characters".to_string());
    }
    if name.chars().any(|c| c.is_ascii_digit()) {
        errors.push("name must not contain digits".to_string());
    }

    if kunde.strasse.split_whitespace().count() < 2 {
        errors.push("strasse must consist of street name and house number".to_string());
    }
    if kunde.strasse.chars().count() < 6 {
        errors.push("strasse must have at least 6 characters".to_string());
    }

    if kunde.stadt.chars().count() < 2 {
        errors.push("stadt must have at least 2 characters".to_string());
    }

    if kunde.plz.chars().count() != 5 {
        errors.push("plz must have exactly 5 characters".to_string());
    }

    if let Some(geb_date) = kunde.geb_date {
        let latest = today.checked_sub_months(Months::new(MIN_AGE_YEARS * 12));
        if latest.map_or(true, |latest| geb_date >= latest) {
            errors.push(format!("customer must be at least {MIN_AGE_YEARS} years old"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(KontoDbError::Validation(errors.join("; ")))
    }
}

/// Register a new customer: check the profile, hash the password, save.
///
/// Returns the customer as stored. A taken `pk` or `username` fails with
/// `ObjectAlreadyExists`.
pub fn register_customer(store: &Store, kunde: Kunde) -> Result<Kunde> {
    validate_registration(&kunde, chrono::Local::now().date_naive())?;

    match Kunde::objects(store).get(&kunde.pk) {
        Ok(_) => {
            return Err(KontoDbError::ObjectAlreadyExists {
                table: Kunde::TABLE.to_string(),
                field: "pk".to_string(),
                value: kunde.pk,
            })
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let stored = Kunde {
        password: hash_password(&kunde.password),
        ..kunde
    };
    stored.manager(store).save()?;

    log::info!("Registered customer {} ({})", stored.username, stored.pk);
    Ok(stored)
}

/// Look up a customer by credentials. `None` for an unknown username or a
/// wrong password.
pub fn login_customer(store: &Store, username: &str, password: &str) -> Result<Option<Kunde>> {
    let mut matches = Kunde::objects(store).filter([("username", username)])?;
    if matches.len() > 1 {
        return Err(KontoDbError::Other(format!(
            "Found {} customers with username '{username}'",
            matches.len()
        )));
    }

    Ok(matches
        .pop()
        .filter(|kunde| verify_password(password, &kunde.password)))
}

/// Delete a customer together with every account they own.
pub fn delete_customer(store: &Store, kunde: &Kunde) -> Result<()> {
    for konto in kunde.konten(store)? {
        konto.manager(store).delete()?;
    }
    kunde.manager(store).delete()?;

    log::info!("Deleted customer {} ({})", kunde.username, kunde.pk);
    Ok(())
}

/// Salted SHA-256 in the form `sha256$<salt>$<hex digest>`.
pub fn hash_password(cleartext: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{HASH_SCHEME}${salt}${}", digest(&salt, cleartext))
}

pub fn verify_password(cleartext: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => digest(salt, cleartext) == expected,
        _ => false,
    }
}

fn digest(salt: &str, cleartext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(cleartext.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
