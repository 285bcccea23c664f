//! tbk-ledger
//!
//! Trade-replay position and realized-PnL accounting.
//! - Average-cost position ledger keyed by symbol
//! - Chronological replay with buy/sell/flip resolution
//! - Forced zero-price close of contracts past expiry
//! - Per-instant position snapshots and a cumulative PnL series
//! - Pure deterministic logic (no IO, no wall clock)

mod fixedpoint;
mod ordering;
mod types;

pub mod aggregate;
pub mod events;
pub mod ledger;
pub mod replay;

pub use aggregate::{cumulative, cumulative_series, total_realized, CumulativePnlRow};
pub use events::{PnlKind, PositionSnapshot, RealizedPnlEvent, SnapshotLine};
pub use fixedpoint::{Micros, MICROS_DECIMALS, MICROS_SCALE};
pub use ledger::{DeltaOutcome, LedgerError, PositionLedger};
pub use ordering::{is_chronological, sort_trades_chronological};
pub use replay::{
    replay, validate_trade, validate_trades, ExpiredTradePolicy, MalformedReason, ReplayConfig,
    ReplayError, ReplayOutput, ReplayStats, TradeReplayEngine,
};
pub use types::{ContractMeta, NormalizedTrade, OptionType, PositionState, Product, Side};
