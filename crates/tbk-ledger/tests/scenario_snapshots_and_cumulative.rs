//! Scenario: Snapshot stream and cumulative PnL
//!
//! # Invariants under test
//!
//! 1. Trades sharing an execution time produce one snapshot holding the
//!    state after the last of them.
//!
//! 2. Snapshot lines are in symbol order regardless of trade order.
//!
//! 3. Equal timestamps keep input order through the stable sort; swapping
//!    two same-instant trades on one symbol changes the result.
//!
//! 4. The cumulative column is a running sum in emission order.
//!
//! 5. Replay is idempotent: the same input gives byte-identical output.
//!
//! 6. Malformed input rejects the whole run.
//!
//! All tests are pure; no IO.

use chrono::{NaiveDate, NaiveDateTime};
use tbk_ledger::{
    cumulative, replay, total_realized, ContractMeta, MalformedReason, Micros, NormalizedTrade,
    ReplayConfig, ReplayError, Side, MICROS_SCALE,
};

const M: i64 = MICROS_SCALE;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn t(sym: &str, time: NaiveDateTime, side: Side, qty: i64, px: i64) -> NormalizedTrade {
    let expiry = NaiveDate::from_ymd_opt(2024, 5, 30)
        .unwrap()
        .and_hms_opt(15, 30, 0)
        .unwrap();
    NormalizedTrade::new(sym, time, side, qty, Micros::new(px * M), ContractMeta::new(sym, expiry))
}

#[test]
fn scenario_same_instant_trades_share_one_snapshot() {
    // GIVEN: two trades at 09:15 on different symbols, one at 09:16
    let out = replay(
        vec![
            t("ZED", at(9, 15), Side::Buy, 1, 10),
            t("ABC", at(9, 15), Side::Sell, 2, 20),
            t("ABC", at(9, 16), Side::Sell, 1, 26),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: two snapshots; the first already holds both 09:15 trades
    assert_eq!(out.snapshots.len(), 2);
    assert_eq!(out.snapshots[0].execution_time, at(9, 15));
    assert_eq!(out.snapshots[0].symbols(), vec!["ABC", "ZED"]);
    assert_eq!(out.snapshots[0].line("ABC").unwrap().quantity, -2);

    // THEN: the 09:16 snapshot reflects the extended short
    let abc = out.snapshots[1].line("ABC").unwrap();
    assert_eq!(abc.quantity, -3);
    assert_eq!(abc.accumulated_cost, Micros::new(66 * M));
    assert_eq!(abc.avg_price, Micros::new(22 * M));
}

#[test]
fn scenario_equal_timestamps_keep_input_order() {
    // GIVEN: Buy 5 @ 100 then, at one instant, Sell 5 @ 110 and Buy 5 @ 90
    let opening = t("X", at(9, 0), Side::Buy, 5, 100);
    let sell = t("X", at(9, 30), Side::Sell, 5, 110);
    let buy = t("X", at(9, 30), Side::Buy, 5, 90);

    let a = replay(vec![opening.clone(), sell.clone(), buy.clone()], &ReplayConfig::default())
        .unwrap();
    let b = replay(vec![opening, buy, sell], &ReplayConfig::default()).unwrap();

    // THEN: sell-first closes at +50 and reopens long 5 @ 90
    assert_eq!(a.pnl_events.len(), 1);
    assert_eq!(a.pnl_events[0].realized_pnl, Micros::new(50 * M));
    assert_eq!(a.open_positions[0].avg_price, Micros::new(90 * M));

    // THEN: buy-first averages to 95 and sells at +75
    assert_eq!(b.pnl_events[0].realized_pnl, Micros::new(75 * M));
    assert_eq!(b.open_positions[0].avg_price, Micros::new(95 * M));
}

#[test]
fn scenario_unsorted_input_is_sorted_by_time() {
    let out = replay(
        vec![
            t("X", at(10, 0), Side::Sell, 2, 120),
            t("X", at(9, 0), Side::Buy, 2, 100),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: buy applied first, sell realizes (120 - 100) * 2
    assert_eq!(out.pnl_events[0].realized_pnl, Micros::new(40 * M));
    assert_eq!(out.snapshots[0].execution_time, at(9, 0));
}

#[test]
fn scenario_cumulative_running_sum() {
    // GIVEN: realized 100, -40, 25
    let out = replay(
        vec![
            t("A", at(9, 0), Side::Buy, 10, 10),
            t("A", at(9, 1), Side::Sell, 10, 20),
            t("B", at(9, 2), Side::Sell, 4, 50),
            t("B", at(9, 3), Side::Buy, 4, 60),
            t("C", at(9, 4), Side::Buy, 5, 5),
            t("C", at(9, 5), Side::Sell, 5, 10),
        ],
        &ReplayConfig::default(),
    )
    .unwrap();

    // THEN: cumulative [100, 60, 85]
    let rows = cumulative(&out.pnl_events).unwrap();
    let sums: Vec<i64> = rows.iter().map(|r| r.cumulative_pnl.raw() / M).collect();
    assert_eq!(sums, vec![100, 60, 85]);
    assert_eq!(total_realized(&out.pnl_events).unwrap(), Micros::new(85 * M));
}

#[test]
fn scenario_replay_is_idempotent() {
    let trades = vec![
        t("A", at(9, 0), Side::Buy, 3, 101),
        t("B", at(9, 0), Side::Sell, 7, 33),
        t("A", at(9, 5), Side::Sell, 5, 99),
        t("B", at(9, 7), Side::Buy, 9, 31),
    ];
    let first = replay(trades.clone(), &ReplayConfig::default()).unwrap();
    let second = replay(trades, &ReplayConfig::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn scenario_malformed_trade_rejects_run() {
    let mut bad = t("A", at(9, 1), Side::Buy, 1, 10);
    bad.contract.strike = Some(Micros::new(-5));

    let err = replay(
        vec![t("A", at(9, 0), Side::Buy, 1, 10), bad],
        &ReplayConfig::default(),
    )
    .unwrap_err();

    match err {
        ReplayError::MalformedTrade { index, reason, .. } => {
            assert_eq!(index, 1);
            assert_eq!(reason, MalformedReason::NegativeStrike(Micros::new(-5)));
        }
        other => panic!("unexpected error: {other}"),
    }
}
