//! Output records emitted by the replay engine.
//!
//! Both streams are append-only: once emitted, a record is never mutated
//! (except that a snapshot is replaced wholesale when a later trade shares
//! its execution_time).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;
use crate::types::{ContractMeta, OptionType, PositionState, Product};

/// What produced a realized-PnL event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PnlKind {
    /// A trade that reduced, closed, or flipped a position.
    Trade,
    /// Forced zero-price liquidation after contract expiry.
    Expiry,
}

impl PnlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PnlKind::Trade => "TRADE",
            PnlKind::Expiry => "EXPIRY",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedPnlEvent {
    /// Execution time of the trade being replayed when the PnL was realized.
    /// Expiry closures carry the sweeping trade's time, not the expiry.
    pub execution_time: NaiveDateTime,
    pub symbol: String,
    pub underlying: String,
    pub expiry: NaiveDateTime,
    pub strike: Option<Micros>,
    pub option_type: OptionType,
    pub product: Product,
    pub realized_pnl: Micros,
    pub kind: PnlKind,
}

impl RealizedPnlEvent {
    pub fn new(
        execution_time: NaiveDateTime,
        symbol: &str,
        contract: &ContractMeta,
        realized_pnl: Micros,
        kind: PnlKind,
    ) -> Self {
        Self {
            execution_time,
            symbol: symbol.to_string(),
            underlying: contract.underlying.clone(),
            expiry: contract.expiry,
            strike: contract.strike,
            option_type: contract.option_type,
            product: contract.product(),
            realized_pnl,
            kind,
        }
    }
}

/// One open symbol inside a [`PositionSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub symbol: String,
    pub quantity: i64,
    pub accumulated_cost: Micros,
    pub avg_price: Micros,
}

impl From<&PositionState> for SnapshotLine {
    fn from(p: &PositionState) -> Self {
        Self {
            symbol: p.symbol.clone(),
            quantity: p.signed_quantity,
            accumulated_cost: p.accumulated_cost,
            avg_price: p.avg_price,
        }
    }
}

/// The complete set of open positions right after all trades at
/// `execution_time` were applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub execution_time: NaiveDateTime,
    pub lines: Vec<SnapshotLine>,
}

impl PositionSnapshot {
    pub fn symbols(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.symbol.as_str()).collect()
    }

    pub fn line(&self, symbol: &str) -> Option<&SnapshotLine> {
        self.lines.iter().find(|l| l.symbol == symbol)
    }

    pub fn is_flat(&self) -> bool {
        self.lines.is_empty()
    }
}
