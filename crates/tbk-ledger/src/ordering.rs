//! Trade ordering policy.
//!
//! Replay must see trades in ascending `execution_time`. Trades sharing a
//! timestamp keep their input order: the sort key is the timestamp **only**,
//! and the sort is stable. Cover and flip arithmetic depends on which of two
//! same-instant trades runs first, so any secondary key (symbol, side, qty)
//! would change results relative to the tradebook as recorded.

use crate::types::NormalizedTrade;

/// Stable-sort `trades` by execution time, in place.
pub fn sort_trades_chronological(trades: &mut [NormalizedTrade]) {
    trades.sort_by_key(|t| t.execution_time);
}

/// `true` if `trades` is already non-decreasing in execution time.
pub fn is_chronological(trades: &[NormalizedTrade]) -> bool {
    trades
        .windows(2)
        .all(|w| w[0].execution_time <= w[1].execution_time)
}
