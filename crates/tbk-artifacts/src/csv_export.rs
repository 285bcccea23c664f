//! CSV renderers for the two replay output streams.
//!
//! `positions.csv` has one row per snapshot; the multi-symbol cells are
//! `", "`-joined in snapshot line order (symbol order), so the n-th entry of
//! every list cell describes the same symbol.
//!
//! Money columns are written exactly (6 decimals) except average prices,
//! which are rounded half away from zero to the configured precision.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tbk_ledger::{CumulativePnlRow, Micros, PositionSnapshot, SnapshotLine, MICROS_DECIMALS};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `expiry_date` carries the calendar date only.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const POSITIONS_HEADER: [&str; 5] = [
    "execution_time",
    "symbols",
    "quantities",
    "costs",
    "avg_prices",
];

pub const REALIZED_PNL_HEADER: [&str; 10] = [
    "execution_time",
    "symbol",
    "underlying",
    "expiry_date",
    "strike",
    "option_type",
    "product",
    "kind",
    "realized_pnl",
    "cumulative_pnl",
];

pub fn positions_csv(snapshots: &[PositionSnapshot], price_decimals: u32) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(POSITIONS_HEADER)?;

    for snap in snapshots {
        wtr.write_record([
            fmt_time(snap.execution_time),
            join_lines(&snap.lines, |l| l.symbol.clone()),
            join_lines(&snap.lines, |l| l.quantity.to_string()),
            join_lines(&snap.lines, |l| l.accumulated_cost.to_string()),
            join_lines(&snap.lines, |l| l.avg_price.to_decimal_string(price_decimals)),
        ])?;
    }

    finish(wtr)
}

pub fn realized_pnl_csv(rows: &[CumulativePnlRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(REALIZED_PNL_HEADER)?;

    for row in rows {
        let e = &row.event;
        wtr.write_record([
            fmt_time(e.execution_time),
            e.symbol.clone(),
            e.underlying.clone(),
            e.expiry.format(DATE_FORMAT).to_string(),
            e.strike.map(fmt_strike).unwrap_or_default(),
            e.option_type.as_str().to_string(),
            e.product.as_str().to_string(),
            e.kind.as_str().to_string(),
            e.realized_pnl.to_string(),
            row.cumulative_pnl.to_string(),
        ])?;
    }

    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("flush csv writer failed")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

fn join_lines<F>(lines: &[SnapshotLine], f: F) -> String
where
    F: Fn(&SnapshotLine) -> String,
{
    lines.iter().map(f).collect::<Vec<_>>().join(", ")
}

fn fmt_time(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Shortest exact rendering: `21500`, `207.5`.
fn fmt_strike(strike: Micros) -> String {
    let full = strike.to_decimal_string(MICROS_DECIMALS);
    full.trim_end_matches('0').trim_end_matches('.').to_string()
}
