//! tbk-tradebook
//!
//! Tradebook ingest: broker CSV rows in, [`tbk_ledger::NormalizedTrade`] out.
//!
//! This crate owns field parsing (decimal → micros, side and option-type
//! codes, timestamps) and the CSV column contract. It does **not** sort or
//! replay; callers hand the trades to `tbk_ledger::replay`.

pub mod ingest_csv;
pub mod normalizer;

pub use ingest_csv::{read_trades, read_trades_path, read_trades_str, CsvIngestError};
pub use normalizer::{
    default_expiry_time, normalize_trade, parse_instant, parse_micros, parse_option_type,
    parse_quantity, parse_side, NormalizeOptions, NormalizerError, RawTradeRow,
};
