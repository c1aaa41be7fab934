use crate::error::{KontoDbError, Result};

/// Parse a non-negative euro amount (`"12"`, `"12.3"`, `"12,34"`) into cents.
pub fn parse_amount(input: &str) -> Result<i64> {
    let invalid = || KontoDbError::Validation(format!("'{input}' is not a valid amount"));

    let normalized = input.trim().replace(',', ".");
    let (euros, cents) = normalized
        .split_once('.')
        .unwrap_or((normalized.as_str(), ""));

    if euros.is_empty() && cents.is_empty() {
        return Err(invalid());
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(euros) || !all_digits(cents) || cents.len() > 2 {
        return Err(invalid());
    }

    let euros: i64 = if euros.is_empty() {
        0
    } else {
        euros.parse().map_err(|_| invalid())?
    };
    let cents: i64 = match cents.len() {
        0 => 0,
        1 => cents.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => cents.parse().map_err(|_| invalid())?,
    };

    euros
        .checked_mul(100)
        .and_then(|e| e.checked_add(cents))
        .ok_or_else(invalid)
}

/// Render cents as a decimal euro amount, e.g. `1234` -> `"12.34"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
