//! Trade replay engine: one chronological pass, two output streams.
//!
//! Each trade goes through exactly these steps:
//!
//! 1. **Expiry sweep.** Every open symbol whose expiry is strictly before the
//!    trade's execution time is liquidated at price zero (short:
//!    `+avg × |qty|`, long: `−avg × |qty|`) and evicted. The PnL event is
//!    stamped with the sweeping trade's execution time.
//! 2. **Expired-trade policy.** Under [`ExpiredTradePolicy::SkipExpired`] a
//!    trade executing after its own expiry is dropped entirely. The default
//!    [`ExpiredTradePolicy::Sweep`] applies it and lets the next sweep close
//!    whatever it opened.
//! 3. **Side resolution.** Average-cost accounting: an opposing trade first
//!    closes up to the open quantity (one PnL event), and any remainder opens
//!    the other direction at the trade price.
//! 4. **Snapshot capture.** The full set of open positions is recorded under
//!    the trade's execution time; a later trade at the same instant replaces
//!    it.
//!
//! The engine owns its ledger exclusively. Identical input always produces
//! identical snapshots, events, and stats.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{PnlKind, PositionSnapshot, RealizedPnlEvent};
use crate::fixedpoint::Micros;
use crate::ledger::{DeltaOutcome, LedgerError, PositionLedger};
use crate::ordering::sort_trades_chronological;
use crate::types::{NormalizedTrade, PositionState, Side};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How to treat a trade whose execution time is already past its own expiry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredTradePolicy {
    /// Apply the trade; the next later trade's sweep force-closes it.
    #[default]
    Sweep,
    /// Drop the trade: no accounting, no PnL, no snapshot.
    SkipExpired,
}

impl ExpiredTradePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiredTradePolicy::Sweep => "sweep",
            ExpiredTradePolicy::SkipExpired => "skip_expired",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayConfig {
    pub expired_trade_policy: ExpiredTradePolicy,
    /// When set, run a final expiry sweep at this instant after the last trade.
    pub settle_at: Option<NaiveDateTime>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a trade was rejected before replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    EmptySymbol,
    NonPositiveQuantity(i64),
    NegativePrice(Micros),
    NegativeStrike(Micros),
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySymbol => write!(f, "symbol must not be empty"),
            Self::NonPositiveQuantity(q) => write!(f, "quantity must be > 0, got {q}"),
            Self::NegativePrice(p) => write!(f, "price must be >= 0, got {p}"),
            Self::NegativeStrike(s) => write!(f, "strike must be >= 0, got {s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Input validation failed; the whole run is rejected.
    MalformedTrade {
        index: usize,
        symbol: String,
        reason: MalformedReason,
    },
    /// A trade (or settlement instant) is earlier than one already replayed.
    OutOfOrder {
        symbol: String,
        execution_time: NaiveDateTime,
        last: NaiveDateTime,
    },
    Ledger(LedgerError),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedTrade {
                index,
                symbol,
                reason,
            } => write!(f, "malformed trade #{index} ('{symbol}'): {reason}"),
            Self::OutOfOrder {
                symbol,
                execution_time,
                last,
            } => write!(
                f,
                "trade '{symbol}' at {execution_time} is earlier than last replayed time {last}"
            ),
            Self::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for ReplayError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_trade(trade: &NormalizedTrade) -> Result<(), MalformedReason> {
    if trade.symbol.trim().is_empty() {
        return Err(MalformedReason::EmptySymbol);
    }
    if trade.quantity <= 0 {
        return Err(MalformedReason::NonPositiveQuantity(trade.quantity));
    }
    if trade.price.is_negative() {
        return Err(MalformedReason::NegativePrice(trade.price));
    }
    if let Some(strike) = trade.contract.strike {
        if strike.is_negative() {
            return Err(MalformedReason::NegativeStrike(strike));
        }
    }
    Ok(())
}

/// Validate every trade up front. The first failure rejects the whole batch.
pub fn validate_trades(trades: &[NormalizedTrade]) -> Result<(), ReplayError> {
    for (index, trade) in trades.iter().enumerate() {
        validate_trade(trade).map_err(|reason| ReplayError::MalformedTrade {
            index,
            symbol: trade.symbol.clone(),
            reason,
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    pub trades_replayed: usize,
    pub trades_skipped_expired: usize,
    pub expiry_closures: usize,
    /// Trades that closed one direction and opened the other.
    pub flips: usize,
    /// Trades that re-opened a symbol previously evicted as expired.
    pub reopened_after_expiry: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayOutput {
    pub snapshots: Vec<PositionSnapshot>,
    pub pnl_events: Vec<RealizedPnlEvent>,
    pub stats: ReplayStats,
    /// Positions still open after the last trade (and optional settlement).
    pub open_positions: Vec<PositionState>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct TradeReplayEngine {
    policy: ExpiredTradePolicy,
    ledger: PositionLedger,
    pnl_events: Vec<RealizedPnlEvent>,
    snapshots: Vec<PositionSnapshot>,
    /// Symbols evicted by an expiry sweep and not re-opened since.
    expired_symbols: BTreeSet<String>,
    last_time: Option<NaiveDateTime>,
    stats: ReplayStats,
}

impl TradeReplayEngine {
    pub fn new(policy: ExpiredTradePolicy) -> Self {
        Self {
            policy,
            ledger: PositionLedger::new(),
            pnl_events: Vec::new(),
            snapshots: Vec::new(),
            expired_symbols: BTreeSet::new(),
            last_time: None,
            stats: ReplayStats::default(),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn pnl_events(&self) -> &[RealizedPnlEvent] {
        &self.pnl_events
    }

    pub fn snapshots(&self) -> &[PositionSnapshot] {
        &self.snapshots
    }

    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Replay one trade. Trades must arrive in non-decreasing execution time.
    ///
    /// On error the engine should be discarded; partial output is not
    /// meaningful.
    pub fn apply_trade(&mut self, trade: &NormalizedTrade) -> Result<(), ReplayError> {
        validate_trade(trade).map_err(|reason| ReplayError::MalformedTrade {
            index: self.stats.trades_replayed + self.stats.trades_skipped_expired,
            symbol: trade.symbol.clone(),
            reason,
        })?;
        let t = trade.execution_time;
        self.advance_clock(&trade.symbol, t)?;

        self.sweep_expired(t)?;

        if self.policy == ExpiredTradePolicy::SkipExpired && trade.is_past_own_expiry() {
            self.stats.trades_skipped_expired += 1;
            warn!(
                symbol = %trade.symbol,
                execution_time = %t,
                expiry = %trade.contract.expiry,
                "skipping trade executed after its own expiry"
            );
            return Ok(());
        }

        if self.ledger.is_flat(&trade.symbol) && self.expired_symbols.remove(&trade.symbol) {
            self.stats.reopened_after_expiry += 1;
            warn!(
                symbol = %trade.symbol,
                execution_time = %t,
                "trade for a symbol already closed at expiry; opening a fresh position"
            );
        }

        self.resolve_side(trade)?;
        self.stats.trades_replayed += 1;
        self.capture_snapshot(t);
        Ok(())
    }

    /// Run an expiry sweep at `as_of` without a trade (end-of-log settlement).
    ///
    /// Returns the number of positions closed. A snapshot is captured at
    /// `as_of` only if something was closed.
    pub fn settle(&mut self, as_of: NaiveDateTime) -> Result<usize, ReplayError> {
        self.advance_clock("<settle>", as_of)?;
        let closed = self.sweep_expired(as_of)?;
        if closed > 0 {
            self.capture_snapshot(as_of);
        }
        Ok(closed)
    }

    pub fn finish(self) -> ReplayOutput {
        info!(
            trades = self.stats.trades_replayed,
            skipped = self.stats.trades_skipped_expired,
            pnl_events = self.pnl_events.len(),
            snapshots = self.snapshots.len(),
            open_positions = self.ledger.len(),
            "replay finished"
        );
        ReplayOutput {
            snapshots: self.snapshots,
            pnl_events: self.pnl_events,
            stats: self.stats,
            open_positions: self.ledger.into_positions(),
        }
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn advance_clock(&mut self, symbol: &str, t: NaiveDateTime) -> Result<(), ReplayError> {
        if let Some(last) = self.last_time {
            if t < last {
                return Err(ReplayError::OutOfOrder {
                    symbol: symbol.to_string(),
                    execution_time: t,
                    last,
                });
            }
        }
        self.last_time = Some(t);
        Ok(())
    }

    /// Force-close every position whose expiry is strictly before `t`.
    fn sweep_expired(&mut self, t: NaiveDateTime) -> Result<usize, ReplayError> {
        let expired = self.ledger.expired_before(t);
        for symbol in &expired {
            let Some(pos) = self.ledger.evict(symbol) else {
                continue;
            };
            // Zero-price liquidation: a short keeps its full sale value, a
            // long loses its full cost basis.
            let basis = pos
                .avg_price
                .checked_mul_qty(pos.abs_qty())
                .ok_or_else(|| overflow(symbol, "expiry settlement"))?;
            let pnl = if pos.is_short() { basis } else { -basis };

            info!(
                symbol = %symbol,
                qty = pos.signed_quantity,
                avg_price = %pos.avg_price,
                expiry = %pos.expiry(),
                realized_pnl = %pnl,
                at = %t,
                "position closed at expiry"
            );
            self.pnl_events.push(RealizedPnlEvent::new(
                t,
                symbol,
                &pos.contract,
                pnl,
                PnlKind::Expiry,
            ));
            self.expired_symbols.insert(symbol.clone());
            self.stats.expiry_closures += 1;
        }
        Ok(expired.len())
    }

    fn resolve_side(&mut self, trade: &NormalizedTrade) -> Result<(), ReplayError> {
        let sym = trade.symbol.as_str();
        let q = trade.quantity;
        let p = trade.price;
        let cur = self.ledger.qty_signed(sym);
        let avg = self.ledger.get(sym).map(|s| s.avg_price).unwrap_or_default();

        match trade.side {
            // Covering a short, possibly flipping long.
            Side::Buy if cur < 0 => {
                let cover = cur.abs().min(q);
                let pnl = avg
                    .checked_sub(p)
                    .and_then(|d| d.checked_mul_qty(cover))
                    .ok_or_else(|| overflow(sym, "cover pnl"))?;
                self.close_then_open(trade, cover, avg, pnl)?;
            }
            // Reducing a long, possibly flipping short.
            Side::Sell if cur > 0 => {
                let sell = cur.min(q);
                let pnl = p
                    .checked_sub(avg)
                    .and_then(|d| d.checked_mul_qty(sell))
                    .ok_or_else(|| overflow(sym, "sell pnl"))?;
                self.close_then_open(trade, sell, avg, pnl)?;
            }
            // Opening or extending in the trade's own direction.
            _ => {
                self.open(trade, q)?;
            }
        }

        debug!(
            symbol = %sym,
            side = trade.side.as_str(),
            qty = q,
            price = %p,
            position = self.ledger.qty_signed(sym),
            "trade applied"
        );
        Ok(())
    }

    /// Close `closing` units at the current average, emit one PnL event, then
    /// open whatever quantity is left in the trade's direction.
    fn close_then_open(
        &mut self,
        trade: &NormalizedTrade,
        closing: i64,
        avg: Micros,
        pnl: Micros,
    ) -> Result<(), ReplayError> {
        let sym = trade.symbol.as_str();
        let dir = trade.side.sign();
        let released = avg
            .checked_mul_qty(closing)
            .and_then(Micros::checked_neg)
            .ok_or_else(|| overflow(sym, "cost release"))?;

        self.ledger.get_or_create(sym, &trade.contract);
        let outcome = self.ledger.apply_delta(sym, dir * closing, released)?;
        self.pnl_events.push(RealizedPnlEvent::new(
            trade.execution_time,
            sym,
            &trade.contract,
            pnl,
            PnlKind::Trade,
        ));

        let remainder = trade.quantity - closing;
        if remainder > 0 {
            debug_assert_eq!(outcome, DeltaOutcome::Flat);
            self.open(trade, remainder)?;
            self.stats.flips += 1;
        }
        Ok(())
    }

    fn open(&mut self, trade: &NormalizedTrade, qty: i64) -> Result<(), ReplayError> {
        let sym = trade.symbol.as_str();
        let cost = trade
            .price
            .checked_mul_qty(qty)
            .ok_or_else(|| overflow(sym, "open cost"))?;
        self.ledger.get_or_create(sym, &trade.contract);
        self.ledger.apply_delta(sym, trade.side.sign() * qty, cost)?;
        Ok(())
    }

    fn capture_snapshot(&mut self, t: NaiveDateTime) {
        let lines = self.ledger.snapshot_lines();
        match self.snapshots.last_mut() {
            Some(last) if last.execution_time == t => last.lines = lines,
            _ => self.snapshots.push(PositionSnapshot {
                execution_time: t,
                lines,
            }),
        }
    }
}

fn overflow(symbol: &str, op: &'static str) -> ReplayError {
    ReplayError::Ledger(LedgerError::Overflow {
        symbol: symbol.to_string(),
        op,
    })
}

// ---------------------------------------------------------------------------
// Batch entry point
// ---------------------------------------------------------------------------

/// Validate, stable-sort, and replay a complete batch of trades.
///
/// Validation covers the whole batch before the first trade is applied, so a
/// malformed record anywhere rejects the run with no partial output.
pub fn replay(
    mut trades: Vec<NormalizedTrade>,
    config: &ReplayConfig,
) -> Result<ReplayOutput, ReplayError> {
    validate_trades(&trades)?;
    sort_trades_chronological(&mut trades);

    let mut engine = TradeReplayEngine::new(config.expired_trade_policy);
    for trade in &trades {
        engine.apply_trade(trade)?;
    }
    if let Some(as_of) = config.settle_at {
        engine.settle(as_of)?;
    }
    Ok(engine.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
