//! Cumulative realized-PnL series.
//!
//! Row `i` carries the sum of `realized_pnl` over events `0..=i` in emission
//! order. Events are never re-sorted here: emission order is already
//! chronological, and same-instant events keep the order the engine produced
//! them in (expiry closures first, then the trade's own event).

use serde::{Deserialize, Serialize};

use crate::events::RealizedPnlEvent;
use crate::fixedpoint::Micros;
use crate::ledger::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativePnlRow {
    pub event: RealizedPnlEvent,
    pub cumulative_pnl: Micros,
}

/// Running sum over `events`, one row per event.
///
/// Fails with [`LedgerError::Overflow`] naming the event's symbol when the
/// running sum leaves the `Micros` range.
pub fn cumulative(events: &[RealizedPnlEvent]) -> Result<Vec<CumulativePnlRow>, LedgerError> {
    let mut running = Micros::ZERO;
    events
        .iter()
        .map(|e| {
            running = accumulate(running, e)?;
            Ok(CumulativePnlRow {
                event: e.clone(),
                cumulative_pnl: running,
            })
        })
        .collect()
}

/// Just the cumulative column.
pub fn cumulative_series(events: &[RealizedPnlEvent]) -> Result<Vec<Micros>, LedgerError> {
    let mut running = Micros::ZERO;
    events
        .iter()
        .map(|e| {
            running = accumulate(running, e)?;
            Ok(running)
        })
        .collect()
}

pub fn total_realized(events: &[RealizedPnlEvent]) -> Result<Micros, LedgerError> {
    events.iter().try_fold(Micros::ZERO, accumulate)
}

fn accumulate(acc: Micros, e: &RealizedPnlEvent) -> Result<Micros, LedgerError> {
    acc.checked_add(e.realized_pnl)
        .ok_or_else(|| LedgerError::Overflow {
            symbol: e.symbol.clone(),
            op: "cumulative pnl",
        })
}
