//! Position ledger: per-symbol running quantity, cost and average price.
//!
//! # Invariants
//! - A symbol has an entry **iff** its signed quantity is non-zero. The only
//!   transient exception is the zero-seeded entry returned by
//!   [`PositionLedger::get_or_create`], which the caller immediately follows
//!   with [`PositionLedger::apply_delta`].
//! - `avg_price == |accumulated_cost / signed_quantity|` after every
//!   `apply_delta` that leaves the position open.
//! - No division ever happens on a zero quantity: a delta that lands on zero
//!   evicts the entry instead of recomputing the average.
//!
//! The ledger knows nothing about expiry policy, PnL, or time ordering; that
//! all lives in [`crate::replay`].

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::events::SnapshotLine;
use crate::fixedpoint::Micros;
use crate::types::{ContractMeta, PositionState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// `apply_delta` on a symbol with no entry (caller skipped `get_or_create`).
    UnknownSymbol { symbol: String },
    /// Fixed-point quantity or cost arithmetic overflowed.
    Overflow { symbol: String, op: &'static str },
    /// Average price requested for a zero quantity.
    DivisionGuard { symbol: String },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSymbol { symbol } => {
                write!(f, "ledger: no open entry for symbol '{symbol}'")
            }
            Self::Overflow { symbol, op } => {
                write!(f, "ledger: arithmetic overflow in {op} for symbol '{symbol}'")
            }
            Self::DivisionGuard { symbol } => write!(
                f,
                "ledger invariant: average price requested for flat symbol '{symbol}'"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Result of [`PositionLedger::apply_delta`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Position is still open; average price was recomputed.
    Open,
    /// Quantity landed exactly on zero; the entry was evicted.
    Flat,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Symbol-keyed position map. `BTreeMap` keeps iteration (and therefore
/// snapshot line order and expiry sweep order) deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionLedger {
    positions: BTreeMap<String, PositionState>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Write surface
    // -----------------------------------------------------------------------

    /// Return the entry for `symbol`, seeding a zero position carrying `seed`
    /// metadata when none exists. An existing entry keeps its own metadata.
    pub fn get_or_create(&mut self, symbol: &str, seed: &ContractMeta) -> &mut PositionState {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| PositionState::seeded(symbol, seed.clone()))
    }

    /// Add `qty_delta` to the signed quantity and `cost_delta` to the
    /// accumulated cost.
    ///
    /// If the resulting quantity is exactly zero the entry is evicted and no
    /// average price is computed. The ledger is **not** mutated on error.
    pub fn apply_delta(
        &mut self,
        symbol: &str,
        qty_delta: i64,
        cost_delta: Micros,
    ) -> Result<DeltaOutcome, LedgerError> {
        let pos = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| LedgerError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;

        let qty = pos
            .signed_quantity
            .checked_add(qty_delta)
            // i64::MIN has no absolute value; treat it as out of range.
            .filter(|q| *q != i64::MIN)
            .ok_or_else(|| overflow(symbol, "quantity delta"))?;
        let cost = pos
            .accumulated_cost
            .checked_add(cost_delta)
            .ok_or_else(|| overflow(symbol, "cost delta"))?;

        if qty == 0 {
            self.positions.remove(symbol);
            return Ok(DeltaOutcome::Flat);
        }

        let avg = cost
            .checked_div_qty(qty)
            .ok_or_else(|| LedgerError::DivisionGuard {
                symbol: symbol.to_string(),
            })?
            .abs();

        pos.signed_quantity = qty;
        pos.accumulated_cost = cost;
        pos.avg_price = avg;
        Ok(DeltaOutcome::Open)
    }

    /// Remove and return the entry for `symbol`.
    pub fn evict(&mut self, symbol: &str) -> Option<PositionState> {
        self.positions.remove(symbol)
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// `true` when `symbol` has no open quantity.
    pub fn is_flat(&self, symbol: &str) -> bool {
        self.positions
            .get(symbol)
            .map(|p| p.signed_quantity == 0)
            .unwrap_or(true)
    }

    /// Signed quantity for a symbol (0 if flat / not held).
    pub fn qty_signed(&self, symbol: &str) -> i64 {
        self.positions
            .get(symbol)
            .map(|p| p.signed_quantity)
            .unwrap_or(0)
    }

    pub fn get(&self, symbol: &str) -> Option<&PositionState> {
        self.positions.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionState> {
        self.positions.values()
    }

    /// Symbols whose expiry is strictly before `t`, in symbol order.
    pub fn expired_before(&self, t: NaiveDateTime) -> Vec<String> {
        self.positions
            .values()
            .filter(|p| p.expiry() < t)
            .map(|p| p.symbol.clone())
            .collect()
    }

    /// Open positions as snapshot lines, in symbol order.
    pub fn snapshot_lines(&self) -> Vec<SnapshotLine> {
        self.positions
            .values()
            .filter(|p| p.signed_quantity != 0)
            .map(SnapshotLine::from)
            .collect()
    }

    /// Consume the ledger, returning the remaining open positions.
    pub fn into_positions(self) -> Vec<PositionState> {
        self.positions.into_values().collect()
    }
}

fn overflow(symbol: &str, op: &'static str) -> LedgerError {
    LedgerError::Overflow {
        symbol: symbol.to_string(),
        op,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
