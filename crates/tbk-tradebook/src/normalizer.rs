//! Field-level normalization for tradebook rows.
//!
//! Converts the string cells of one tradebook row into a
//! [`tbk_ledger::NormalizedTrade`]: decimal prices and strikes become
//! [`Micros`] with no floating point, side and option-type codes become
//! enums, and timestamps become `NaiveDateTime`.
//!
//! It does **not**:
//! - read files (that is `ingest_csv.rs`)
//! - check trade-level invariants such as positive quantity (the replay
//!   engine's `validate_trades` owns those)

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tbk_ledger::{ContractMeta, Micros, NormalizedTrade, OptionType, Side, MICROS_DECIMALS};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizerError {
    /// A required cell was empty.
    EmptyValue { field: &'static str },
    /// A decimal string could not be parsed.
    InvalidDecimal { field: &'static str, raw: String },
    /// More than 6 decimal places (ambiguous micro conversion).
    TooManyDecimalPlaces { field: &'static str, raw: String },
    /// Quantity was not a whole number.
    InvalidQuantity { raw: String },
    UnknownSide { raw: String },
    UnknownOptionType { raw: String },
    InvalidInstant { field: &'static str, raw: String },
}

impl fmt::Display for NormalizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizerError::EmptyValue { field } => write!(f, "field '{field}' is empty"),
            NormalizerError::InvalidDecimal { field, raw } => {
                write!(f, "field '{field}' is not a decimal number: '{raw}'")
            }
            NormalizerError::TooManyDecimalPlaces { field, raw } => write!(
                f,
                "field '{field}' has more than {MICROS_DECIMALS} decimal places \
                 (ambiguous micro conversion): '{raw}'"
            ),
            NormalizerError::InvalidQuantity { raw } => {
                write!(f, "quantity must be a whole number, got '{raw}'")
            }
            NormalizerError::UnknownSide { raw } => {
                write!(f, "trade type '{raw}' is not one of: buy | sell")
            }
            NormalizerError::UnknownOptionType { raw } => {
                write!(f, "option type '{raw}' is not one of: CE | PE | FUT | (empty)")
            }
            NormalizerError::InvalidInstant { field, raw } => write!(
                f,
                "field '{field}' is not a timestamp (expected YYYY-MM-DD[ HH:MM:SS]): '{raw}'"
            ),
        }
    }
}

impl std::error::Error for NormalizerError {}

impl NormalizerError {
    /// Name of the offending field, for row-level error reporting.
    pub fn field(&self) -> &'static str {
        match self {
            NormalizerError::EmptyValue { field }
            | NormalizerError::InvalidDecimal { field, .. }
            | NormalizerError::TooManyDecimalPlaces { field, .. }
            | NormalizerError::InvalidInstant { field, .. } => field,
            NormalizerError::InvalidQuantity { .. } => "quantity",
            NormalizerError::UnknownSide { .. } => "trade_type",
            NormalizerError::UnknownOptionType { .. } => "option_type",
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar parsers
// ---------------------------------------------------------------------------

/// Convert a decimal string to [`Micros`] deterministically.
///
/// Rules:
/// - Accepts an optional leading `+` or `-`.
/// - Accepts an optional fractional part separated by `.`.
/// - Rejects more than 6 decimal places (would require rounding).
/// - Rejects empty strings, non-digit characters, or multiple `.` separators.
/// - Never uses floating point.
pub fn parse_micros(s: &str, field: &'static str) -> Result<Micros, NormalizerError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizerError::EmptyValue { field });
    }
    let invalid = || NormalizerError::InvalidDecimal {
        field,
        raw: s.to_string(),
    };

    let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }
    if frac_part.len() > MICROS_DECIMALS as usize {
        return Err(NormalizerError::TooManyDecimalPlaces {
            field,
            raw: s.to_string(),
        });
    }

    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac_val: i64 = format!("{frac_part:0<width$}", width = MICROS_DECIMALS as usize)
        .parse()
        .map_err(|_| invalid())?;

    let units = Micros::from_units(int_val).ok_or_else(invalid)?;
    let raw = units
        .checked_add(Micros::new(frac_val))
        .ok_or_else(invalid)?;

    if negative {
        raw.checked_neg().ok_or_else(invalid)
    } else {
        Ok(raw)
    }
}

/// Whole-number quantity. A trailing `.0…` fraction is tolerated because
/// spreadsheet exports often write integers that way.
pub fn parse_quantity(s: &str) -> Result<i64, NormalizerError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizerError::EmptyValue { field: "quantity" });
    }
    let whole = match s.split_once('.') {
        Some((w, frac)) if !frac.is_empty() && frac.chars().all(|c| c == '0') => w,
        Some(_) => {
            return Err(NormalizerError::InvalidQuantity { raw: s.to_string() });
        }
        None => s,
    };
    whole
        .parse::<i64>()
        .map_err(|_| NormalizerError::InvalidQuantity { raw: s.to_string() })
}

/// `buy` / `sell`, case-insensitive; `B` / `S` also accepted.
pub fn parse_side(s: &str) -> Result<Side, NormalizerError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "buy" | "b" => Ok(Side::Buy),
        "sell" | "s" => Ok(Side::Sell),
        "" => Err(NormalizerError::EmptyValue { field: "trade_type" }),
        _ => Err(NormalizerError::UnknownSide { raw: s.to_string() }),
    }
}

pub fn parse_option_type(s: &str) -> Result<OptionType, NormalizerError> {
    match s.trim().to_ascii_uppercase().as_str() {
        "CE" | "CALL" | "C" => Ok(OptionType::Call),
        "PE" | "PUT" | "P" => Ok(OptionType::Put),
        "FUT" | "FUTURE" | "FUTURES" => Ok(OptionType::Future),
        "" | "NONE" | "EQ" => Ok(OptionType::None),
        _ => Err(NormalizerError::UnknownOptionType { raw: s.to_string() }),
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a tradebook timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (or `T` separated, optional fractional
/// seconds, optional seconds). A date-only value gets `default_time`.
pub fn parse_instant(
    s: &str,
    field: &'static str,
    default_time: NaiveTime,
) -> Result<NaiveDateTime, NormalizerError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizerError::EmptyValue { field });
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(default_time))
        .map_err(|_| NormalizerError::InvalidInstant {
            field,
            raw: s.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

/// One tradebook row as string cells, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTradeRow {
    pub symbol: String,
    pub trade_type: String,
    pub quantity: String,
    pub price: String,
    pub execution_time: String,
    pub expiry: String,
    pub underlying: Option<String>,
    pub strike: Option<String>,
    pub option_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Time of day applied to date-only timestamps (exchange close).
    pub default_expiry_time: NaiveTime,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_expiry_time: default_expiry_time(),
        }
    }
}

/// 15:30:00, the cash-market close the tradebook's expiries refer to.
pub fn default_expiry_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Normalize a single [`RawTradeRow`].
///
/// Blank optional cells are treated as absent. `underlying` defaults to the
/// symbol.
pub fn normalize_trade(
    row: &RawTradeRow,
    opts: &NormalizeOptions,
) -> Result<NormalizedTrade, NormalizerError> {
    let symbol = row.symbol.trim();
    if symbol.is_empty() {
        return Err(NormalizerError::EmptyValue { field: "symbol" });
    }

    let side = parse_side(&row.trade_type)?;
    let quantity = parse_quantity(&row.quantity)?;
    let price = parse_micros(&row.price, "price")?;
    let execution_time = parse_instant(&row.execution_time, "execution_time", NaiveTime::MIN)?;
    let expiry = parse_instant(&row.expiry, "expiry", opts.default_expiry_time)?;

    let underlying = non_blank(&row.underlying).unwrap_or(symbol);
    let mut contract = ContractMeta::new(underlying, expiry);
    if let Some(strike) = non_blank(&row.strike) {
        contract = contract.with_strike(parse_micros(strike, "strike")?);
    }
    if let Some(ot) = non_blank(&row.option_type) {
        contract = contract.with_option_type(parse_option_type(ot)?);
    }

    Ok(NormalizedTrade::new(
        symbol,
        execution_time,
        side,
        quantity,
        price,
        contract,
    ))
}

fn non_blank(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
