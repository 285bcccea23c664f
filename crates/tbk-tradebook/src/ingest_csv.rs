//! CSV ingestion for tradebook exports.
//!
//! Reads a tradebook CSV (file, reader, or in-memory text) into
//! [`NormalizedTrade`] values. This is the **read** side only: it does not
//! sort, validate trade-level invariants, or replay anything.
//!
//! ## CSV column contract (case-insensitive, order-independent)
//!
//! | Column           | Aliases                                          | Example               |
//! |------------------|--------------------------------------------------|-----------------------|
//! | `symbol`         | `tradingsymbol`                                  | `NIFTY24JANFUT`       |
//! | `trade_type`     | `side`                                           | `buy` / `sell`        |
//! | `quantity`       | `qty`                                            | `50`                  |
//! | `price`          | `trade_price`                                    | `21450.05`            |
//! | `execution_time` | `formatted_order_execution_time`, `trade_time`   | `2024-01-18 09:20:11` |
//! | `expiry`         | `expiry_date`                                    | `2024-01-25 15:30:00` |
//! | `underlying`     | (optional, defaults to symbol)                   | `NIFTY`               |
//! | `strike`         | `strike_price` (optional)                        | `21500`               |
//! | `option_type`    | (optional)                                       | `CE` / `PE` / `FUT`   |
//!
//! Header names are matched after lower-casing and turning spaces and dashes
//! into underscores, so the broker's `Formatted Order Execution Time` and
//! `Expiry Date` columns match directly. Unknown columns are ignored.
//!
//! Any row that fails to parse rejects the whole file.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use tbk_ledger::NormalizedTrade;
use tracing::debug;

use crate::normalizer::{normalize_trade, NormalizeOptions, NormalizerError, RawTradeRow};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CsvIngestError {
    /// File could not be opened or the CSV framing is broken.
    Io(String),
    /// Required column (canonical name) absent from the header row.
    MissingHeader(String),
    /// A cell failed normalization.
    ParseField {
        /// 1-based line number in the source, header included.
        row: usize,
        field: &'static str,
        raw: String,
        reason: String,
    },
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvIngestError::Io(msg) => write!(f, "tradebook read failed: {msg}"),
            CsvIngestError::MissingHeader(col) => {
                write!(f, "tradebook header has no '{col}' column")
            }
            CsvIngestError::ParseField {
                row,
                field,
                raw,
                reason,
            } => write!(
                f,
                "csv row {row}: cannot parse field '{field}' from value '{raw}': {reason}"
            ),
        }
    }
}

impl std::error::Error for CsvIngestError {}

// ---------------------------------------------------------------------------
// Header mapping
// ---------------------------------------------------------------------------

const REQUIRED: [&str; 6] = [
    "symbol",
    "trade_type",
    "quantity",
    "price",
    "execution_time",
    "expiry",
];

/// Canonical column name for a normalized header, if it is one we read.
fn canonical_column(header: &str) -> Option<&'static str> {
    let col = match header {
        "symbol" | "tradingsymbol" => "symbol",
        "trade_type" | "side" => "trade_type",
        "quantity" | "qty" => "quantity",
        "price" | "trade_price" => "price",
        "execution_time" | "formatted_order_execution_time" | "trade_time" => "execution_time",
        "expiry" | "expiry_date" => "expiry",
        "underlying" => "underlying",
        "strike" | "strike_price" => "strike",
        "option_type" => "option_type",
        _ => return None,
    };
    Some(col)
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// Canonical column → index. The first matching header wins.
fn build_col_index(
    headers: &csv::StringRecord,
) -> Result<HashMap<&'static str, usize>, CsvIngestError> {
    let mut idx: HashMap<&'static str, usize> = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        if let Some(col) = canonical_column(&normalize_header(h)) {
            idx.entry(col).or_insert(i);
        }
    }
    for req in REQUIRED {
        if !idx.contains_key(req) {
            return Err(CsvIngestError::MissingHeader(req.to_string()));
        }
    }
    Ok(idx)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn read_trades_path(
    path: &Path,
    opts: &NormalizeOptions,
) -> Result<Vec<NormalizedTrade>, CsvIngestError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))?;
    read_trades(file, opts)
}

/// Same as [`read_trades`] over in-memory text.
pub fn read_trades_str(
    src: &str,
    opts: &NormalizeOptions,
) -> Result<Vec<NormalizedTrade>, CsvIngestError> {
    read_trades(src.as_bytes(), opts)
}

/// Parse every row of a tradebook CSV. Rows come back in file order.
pub fn read_trades<R: Read>(
    reader: R,
    opts: &NormalizeOptions,
) -> Result<Vec<NormalizedTrade>, CsvIngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match rdr.headers() {
        Ok(h) if h.is_empty() => return Ok(Vec::new()),
        Ok(h) => h.clone(),
        Err(e) => return Err(CsvIngestError::Io(e.to_string())),
    };
    let col_idx = build_col_index(&headers)?;

    let mut out = Vec::new();
    for (n, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| CsvIngestError::Io(e.to_string()))?;
        let row = rec
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(n + 2);

        let cell = |col: &str| -> String {
            col_idx
                .get(col)
                .and_then(|&i| rec.get(i))
                .unwrap_or("")
                .to_string()
        };
        let optional = |col: &str| -> Option<String> {
            col_idx.get(col).and_then(|&i| rec.get(i)).map(str::to_string)
        };

        let raw = RawTradeRow {
            symbol: cell("symbol"),
            trade_type: cell("trade_type"),
            quantity: cell("quantity"),
            price: cell("price"),
            execution_time: cell("execution_time"),
            expiry: cell("expiry"),
            underlying: optional("underlying"),
            strike: optional("strike"),
            option_type: optional("option_type"),
        };

        let trade = normalize_trade(&raw, opts).map_err(|e| parse_field(row, &raw, e))?;
        out.push(trade);
    }

    debug!(rows = out.len(), "tradebook csv parsed");
    Ok(out)
}

fn parse_field(row: usize, raw: &RawTradeRow, err: NormalizerError) -> CsvIngestError {
    let field = err.field();
    let value = match field {
        "symbol" => raw.symbol.clone(),
        "trade_type" => raw.trade_type.clone(),
        "quantity" => raw.quantity.clone(),
        "price" => raw.price.clone(),
        "execution_time" => raw.execution_time.clone(),
        "expiry" => raw.expiry.clone(),
        "strike" => raw.strike.clone().unwrap_or_default(),
        "option_type" => raw.option_type.clone().unwrap_or_default(),
        _ => String::new(),
    };
    CsvIngestError::ParseField {
        row,
        field,
        raw: value,
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tbk_ledger::{Micros, OptionType, Side};

    const HEADER: &str = "symbol,trade_type,quantity,price,execution_time,expiry";

    fn opts() -> NormalizeOptions {
        NormalizeOptions::default()
    }

    #[test]
    fn empty_input_returns_empty_vec() {
        assert!(read_trades_str("", &opts()).unwrap().is_empty());
    }

    #[test]
    fn header_only_returns_empty_vec() {
        assert!(read_trades_str(HEADER, &opts()).unwrap().is_empty());
    }

    #[test]
    fn missing_required_header_returns_err() {
        let bad = "symbol,trade_type,quantity,price,execution_time";
        let err = read_trades_str(bad, &opts()).unwrap_err();
        assert!(matches!(err, CsvIngestError::MissingHeader(ref c) if c == "expiry"));
    }

    #[test]
    fn rows_parsed_in_file_order() {
        let csv = format!(
            "{HEADER}\n\
             B,buy,10,100.5,2024-01-02 09:16:00,2024-01-25\n\
             A,sell,5,99,2024-01-02 09:15:00,2024-01-25 15:30:00\n"
        );
        let trades = read_trades_str(&csv, &opts()).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].symbol, "B");
        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[0].price, Micros::new(100_500_000));
        assert_eq!(trades[1].symbol, "A");
        assert_eq!(trades[1].quantity, 5);
    }

    #[test]
    fn broker_headers_and_column_order_are_accepted() {
        let csv = "Expiry Date,Option Type,Strike,Underlying,Symbol,Trade Type,Quantity,Price,Formatted Order Execution Time,Product\n\
                   2024-01-25 15:30:00,CE,21500,NIFTY,NIFTY2412521500CE,BUY,50,112.35,2024-01-18 09:20:11,Option\n";
        let trades = read_trades_str(csv, &opts()).unwrap();
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.contract.underlying, "NIFTY");
        assert_eq!(t.contract.option_type, OptionType::Call);
        assert_eq!(t.contract.strike, Some(Micros::new(21_500_000_000)));
    }

    #[test]
    fn blank_lines_skipped() {
        let csv = format!("{HEADER}\n\nA,buy,1,1,2024-01-02 09:15:00,2024-01-25\n\n");
        assert_eq!(read_trades_str(&csv, &opts()).unwrap().len(), 1);
    }

    #[test]
    fn malformed_row_is_fatal_with_line_number() {
        let csv = format!(
            "{HEADER}\n\
             A,buy,1,1,2024-01-02 09:15:00,2024-01-25\n\
             A,hold,1,1,2024-01-02 09:16:00,2024-01-25\n"
        );
        let err = read_trades_str(&csv, &opts()).unwrap_err();
        match err {
            CsvIngestError::ParseField {
                row, field, raw, ..
            } => {
                assert_eq!(row, 3);
                assert_eq!(field, "trade_type");
                assert_eq!(raw, "hold");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_row_reports_missing_cell() {
        let csv = format!("{HEADER}\nA,buy,1,1\n");
        let err = read_trades_str(&csv, &opts()).unwrap_err();
        assert!(matches!(
            err,
            CsvIngestError::ParseField {
                field: "execution_time",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_trades_path(Path::new("/definitely/not/here.csv"), &opts()).unwrap_err();
        assert!(matches!(err, CsvIngestError::Io(_)));
    }

    #[test]
    fn error_display_parse_field() {
        let e = CsvIngestError::ParseField {
            row: 5,
            field: "price",
            raw: "bad".to_string(),
            reason: "not a number".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("row 5"));
        assert!(s.contains("price"));
        assert!(s.contains("bad"));
    }
}
