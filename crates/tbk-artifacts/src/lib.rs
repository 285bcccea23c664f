//! tbk-artifacts
//!
//! Writes one replay run to `<exports_root>/<run_id>/`:
//! - `positions.csv`    position snapshot stream
//! - `realized_pnl.csv` realized PnL stream with the cumulative column
//! - `manifest.json`    run identity, config hash, input, counts

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use tbk_ledger::{cumulative, total_realized, ExpiredTradePolicy, ReplayOutput};

pub mod csv_export;

pub use csv_export::{positions_csv, realized_pnl_csv};

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    /// Hash of the merged YAML layers as loaded.
    pub config_hash: String,
    /// Hash of the settings the run actually used, after CLI overrides.
    pub effective_config_hash: String,
    pub input_path: String,
    pub expired_trade_policy: ExpiredTradePolicy,
    pub settle_at: Option<NaiveDateTime>,
    pub created_at_utc: DateTime<Utc>,
    pub counts: RunCounts,
    /// Exact decimal rendering of the final cumulative PnL.
    pub total_realized_pnl: String,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    pub trades_input: usize,
    pub trades_replayed: usize,
    pub trades_skipped_expired: usize,
    pub expiry_closures: usize,
    pub flips: usize,
    pub reopened_after_expiry: usize,
    pub pnl_events: usize,
    pub snapshots: usize,
    pub open_positions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub manifest_json: String,
    pub positions_csv: String,
    pub realized_pnl_csv: String,
}

impl Default for ArtifactList {
    fn default() -> Self {
        Self {
            manifest_json: "manifest.json".to_string(),
            positions_csv: "positions.csv".to_string(),
            realized_pnl_csv: "realized_pnl.csv".to_string(),
        }
    }
}

pub struct WriteRunArtifactsArgs<'a> {
    pub exports_root: &'a Path, // e.g. ./exports
    pub run_id: Uuid,
    pub config_hash: &'a str,
    pub effective_config_hash: &'a str,
    pub input_path: &'a Path,
    pub trades_input: usize,
    pub expired_trade_policy: ExpiredTradePolicy,
    pub settle_at: Option<NaiveDateTime>,
    pub price_decimals: u32,
    pub output: &'a ReplayOutput,
}

#[derive(Debug, Clone)]
pub struct WriteRunArtifactsResult {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub positions_path: PathBuf,
    pub realized_pnl_path: PathBuf,
    pub manifest: RunManifest,
}

pub fn write_run_artifacts(args: WriteRunArtifactsArgs<'_>) -> Result<WriteRunArtifactsResult> {
    let names = ArtifactList::default();
    let out = args.output;

    // Render everything before touching disk so a failure leaves no run dir.
    let positions = positions_csv(&out.snapshots, args.price_decimals)?;
    let realized = realized_pnl_csv(&cumulative(&out.pnl_events)?)?;
    let total = total_realized(&out.pnl_events)?;

    // exports/<run_id>/
    let run_dir = args.exports_root.join(args.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    let positions_path = run_dir.join(&names.positions_csv);
    write_file(&positions_path, &positions)?;

    let realized_pnl_path = run_dir.join(&names.realized_pnl_csv);
    write_file(&realized_pnl_path, &realized)?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: args.run_id,
        config_hash: args.config_hash.to_string(),
        effective_config_hash: args.effective_config_hash.to_string(),
        input_path: args.input_path.display().to_string(),
        expired_trade_policy: args.expired_trade_policy,
        settle_at: args.settle_at,
        created_at_utc: Utc::now(),
        counts: RunCounts {
            trades_input: args.trades_input,
            trades_replayed: out.stats.trades_replayed,
            trades_skipped_expired: out.stats.trades_skipped_expired,
            expiry_closures: out.stats.expiry_closures,
            flips: out.stats.flips,
            reopened_after_expiry: out.stats.reopened_after_expiry,
            pnl_events: out.pnl_events.len(),
            snapshots: out.snapshots.len(),
            open_positions: out.open_positions.len(),
        },
        total_realized_pnl: total.to_string(),
        artifacts: names.clone(),
    };

    let manifest_path = run_dir.join(&names.manifest_json);
    let json = serde_json::to_string_pretty(&manifest).context("serialize manifest failed")?;
    write_file(&manifest_path, &format!("{json}\n"))?;

    info!(
        run_id = %args.run_id,
        run_dir = %run_dir.display(),
        pnl_events = manifest.counts.pnl_events,
        snapshots = manifest.counts.snapshots,
        "run artifacts written"
    );

    Ok(WriteRunArtifactsResult {
        run_dir,
        manifest_path,
        positions_path,
        realized_pnl_path,
        manifest,
    })
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read manifest failed: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse manifest failed: {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write artifact failed: {}", path.display()))
}
