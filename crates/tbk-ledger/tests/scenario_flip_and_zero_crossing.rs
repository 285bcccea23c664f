//! Scenario: Reducing trades, flips, and zero-crossing eviction
//!
//! # Invariants under test
//!
//! 1. A sell larger than an open long realizes PnL on the long quantity only,
//!    then opens a short for the remainder at the trade price.
//!
//! 2. A buy larger than an open short does the mirror image.
//!
//! 3. A trade that lands exactly on zero evicts the symbol; no snapshot line
//!    is emitted for it and no average price is computed.
//!
//! 4. A flipping trade emits exactly one PnL event.
//!
//! All tests are pure; no IO.

use chrono::{NaiveDate, NaiveDateTime};
use tbk_ledger::{
    replay, ContractMeta, ExpiredTradePolicy, Micros, NormalizedTrade, PnlKind, ReplayConfig,
    Side, TradeReplayEngine, MICROS_SCALE,
};

const M: i64 = MICROS_SCALE;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn expiry() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 28)
        .unwrap()
        .and_hms_opt(15, 30, 0)
        .unwrap()
}

fn t(sym: &str, time: NaiveDateTime, side: Side, qty: i64, px: i64) -> NormalizedTrade {
    let contract = ContractMeta::new("BANKNIFTY", expiry());
    NormalizedTrade::new(sym, time, side, qty, Micros::new(px * M), contract)
}

#[test]
fn scenario_long_flips_to_short() {
    // GIVEN: Buy 10 @ 100
    // WHEN:  Sell 15 @ 120
    let out = replay(
        vec![
            t("BN24MARFUT", at(9, 15), Side::Buy, 10, 100),
            t("BN24MARFUT", at(9, 20), Side::Sell, 15, 120),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: realized PnL = (120 - 100) * 10 = 200, one event
    assert_eq!(out.pnl_events.len(), 1);
    assert_eq!(out.pnl_events[0].realized_pnl, Micros::new(200 * M));
    assert_eq!(out.pnl_events[0].kind, PnlKind::Trade);
    assert_eq!(out.pnl_events[0].execution_time, at(9, 20));

    // THEN: short 5 @ 120 remains, cost basis 600
    let last = out.snapshots.last().unwrap();
    let line = last.line("BN24MARFUT").unwrap();
    assert_eq!(line.quantity, -5);
    assert_eq!(line.accumulated_cost, Micros::new(600 * M));
    assert_eq!(line.avg_price, Micros::new(120 * M));
    assert_eq!(out.stats.flips, 1);
}

#[test]
fn scenario_short_flips_to_long() {
    // GIVEN: Sell 4 @ 200, Sell 2 @ 230  -> short 6, cost 1260, avg 210
    // WHEN:  Buy 10 @ 190
    let mut e = TradeReplayEngine::new(ExpiredTradePolicy::Sweep);
    e.apply_trade(&t("X", at(10, 0), Side::Sell, 4, 200)).unwrap();
    e.apply_trade(&t("X", at(10, 1), Side::Sell, 2, 230)).unwrap();
    assert_eq!(e.ledger().get("X").unwrap().avg_price, Micros::new(210 * M));

    e.apply_trade(&t("X", at(10, 2), Side::Buy, 10, 190)).unwrap();

    // THEN: covered 6 at (210 - 190) = 120; long 4 @ 190
    assert_eq!(e.pnl_events().len(), 1);
    assert_eq!(e.pnl_events()[0].realized_pnl, Micros::new(120 * M));
    let pos = e.ledger().get("X").unwrap();
    assert_eq!(pos.signed_quantity, 4);
    assert_eq!(pos.avg_price, Micros::new(190 * M));
}

#[test]
fn scenario_exact_close_evicts_symbol() {
    // GIVEN: long 10 @ 100
    // WHEN:  Sell 10 @ 110
    let out = replay(
        vec![
            t("X", at(9, 15), Side::Buy, 10, 100),
            t("X", at(9, 16), Side::Sell, 10, 110),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: PnL 100, symbol gone from ledger and final snapshot
    assert_eq!(out.pnl_events[0].realized_pnl, Micros::new(100 * M));
    assert!(out.open_positions.is_empty());
    assert_eq!(out.snapshots.len(), 2);
    assert!(out.snapshots[1].is_flat());
    assert_eq!(out.stats.flips, 0);
}

#[test]
fn scenario_losing_cover_is_negative() {
    // GIVEN: short 3 @ 50
    // WHEN:  Buy 3 @ 65
    let out = replay(
        vec![
            t("X", at(9, 15), Side::Sell, 3, 50),
            t("X", at(9, 16), Side::Buy, 3, 65),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: (50 - 65) * 3 = -45
    assert_eq!(out.pnl_events[0].realized_pnl, Micros::new(-45 * M));
    assert!(out.open_positions.is_empty());
}

#[test]
fn scenario_fractional_average_rounds_half_away_from_zero() {
    // GIVEN: Buy 2 @ 2 micros, Buy 1 @ 1 micro -> qty 3, cost 5 micros
    let mut e = TradeReplayEngine::new(ExpiredTradePolicy::Sweep);
    let contract = ContractMeta::new("X", expiry());
    let first = NormalizedTrade::new("X", at(9, 0), Side::Buy, 2, Micros::new(2), contract.clone());
    let second = NormalizedTrade::new("X", at(9, 1), Side::Buy, 1, Micros::new(1), contract);
    e.apply_trade(&first).unwrap();
    e.apply_trade(&second).unwrap();

    // THEN: avg = round(5 / 3) = 2 micros
    let pos = e.ledger().get("X").unwrap();
    assert_eq!(pos.accumulated_cost, Micros::new(5));
    assert_eq!(pos.avg_price, Micros::new(2));
}
