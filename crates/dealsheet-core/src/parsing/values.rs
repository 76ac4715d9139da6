use crate::error::DealsheetError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a cell string from a financial workbook into a decimal amount.
///
/// Handles US formats like:
/// - "1,200,000" -> 1200000
/// - "$1,200,000.50" -> 1200000.50
/// - "(350,000)" -> -350000 (accounting negative)
/// - "-350000" -> -350000
/// - "8.5%" -> 0.085
/// - "7.5x" -> 7.5 (multiple)
/// - "-", "—", "n/a", "" -> None
pub fn parse_amount(s: &str) -> Result<Option<Decimal>, DealsheetError> {
    let s = s.trim();

    if s.is_empty()
        || s == "-"
        || s == "—"
        || s == "–"
        || s == "$ -"
        || s == "$-"
        || s.eq_ignore_ascii_case("n/a")
        || s.eq_ignore_ascii_case("na")
        || s.eq_ignore_ascii_case("nm")
    {
        return Ok(None);
    }

    let (negative, body) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, s),
    };

    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (!negative, rest.trim()),
        None => (negative, body),
    };

    let body = body.trim_start_matches('$').trim();

    let (percent, body) = match body.strip_suffix('%') {
        Some(rest) => (true, rest.trim()),
        None => (false, body),
    };

    let body = body
        .strip_suffix('x')
        .or_else(|| body.strip_suffix('X'))
        .map(str::trim)
        .unwrap_or(body);

    let normalized: String = body.chars().filter(|c| *c != ',').collect();
    let mut value = parse_decimal(&normalized).map_err(|reason| DealsheetError::InvalidValue {
        value: s.to_string(),
        reason,
    })?;

    if percent {
        value /= Decimal::ONE_HUNDRED;
    }
    if negative {
        value = -value;
    }
    Ok(Some(value))
}

/// Lenient form of [`parse_amount`]: anything unparseable is `None`.
pub fn amount(s: &str) -> Option<Decimal> {
    parse_amount(s).ok().flatten()
}

/// Parse a count such as a bed total: "120", "120 beds", "120.0".
///
/// Returns `None` for non-integral or negative values.
pub fn parse_count(s: &str) -> Option<u32> {
    let s = s.trim();
    let leading: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    if leading.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&leading).ok()?;
    count_from_decimal(value)
}

/// Convert a decimal to a count when it is a non-negative whole number.
pub fn count_from_decimal(value: Decimal) -> Option<u32> {
    if value.is_sign_negative() || value.fract() != Decimal::ZERO {
        return None;
    }
    value.to_u32()
}

fn parse_decimal(s: &str) -> Result<Decimal, String> {
    if s.is_empty() {
        return Err("no digits".into());
    }
    if s.contains(['e', 'E']) {
        return Decimal::from_scientific(s).map_err(|e| e.to_string());
    }
    Decimal::from_str(s).map_err(|e| e.to_string())
}
