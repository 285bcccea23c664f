//! `tbk replay`: config -> ingest -> replay -> artifacts.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use tbk_config::{report_unused_keys, UnusedKeyPolicy};
use tbk_ledger::{replay, ExpiredTradePolicy};

use super::load_config;

pub struct ReplayArgs {
    pub trades: PathBuf,
    pub config_paths: Vec<String>,
    pub out_dir: Option<String>,
    pub skip_expired: bool,
    pub settle_at: Option<String>,
    pub fail_unused_keys: bool,
}

pub fn run_replay(args: ReplayArgs) -> Result<()> {
    let loaded = load_config(&args.config_paths)?;

    let policy = if args.fail_unused_keys {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for key in &report.unused_leaf_pointers {
        warn!(pointer = %key, "config key is not read by anything");
    }

    // CLI flags override the merged config.
    let mut settings = loaded.settings()?;
    if args.skip_expired {
        settings.replay.expired_trade_policy = ExpiredTradePolicy::SkipExpired;
    }
    if let Some(s) = args.settle_at {
        settings.replay.settle_at = Some(s);
    }
    if let Some(dir) = args.out_dir {
        settings.export.out_dir = dir;
    }

    let effective_config_hash = settings.effective_hash()?;
    let replay_cfg = settings.replay_config()?;
    let opts = settings.normalize_options()?;

    let trades = tbk_tradebook::read_trades_path(&args.trades, &opts)
        .with_context(|| format!("ingest failed for {}", args.trades.display()))?;
    let trades_input = trades.len();
    info!(
        path = %args.trades.display(),
        trades = trades_input,
        config_hash = %loaded.config_hash,
        "tradebook loaded"
    );

    let output = replay(trades, &replay_cfg).context("replay failed")?;

    let run_id = Uuid::new_v4();
    let res = tbk_artifacts::write_run_artifacts(tbk_artifacts::WriteRunArtifactsArgs {
        exports_root: Path::new(&settings.export.out_dir),
        run_id,
        config_hash: &loaded.config_hash,
        effective_config_hash: &effective_config_hash,
        input_path: &args.trades,
        trades_input,
        expired_trade_policy: replay_cfg.expired_trade_policy,
        settle_at: replay_cfg.settle_at,
        price_decimals: settings.export.price_decimals,
        output: &output,
    })?;

    let counts = &res.manifest.counts;
    println!("run_id={}", run_id);
    println!("config_hash={}", loaded.config_hash);
    println!("effective_config_hash={}", effective_config_hash);
    println!("expired_trade_policy={}", replay_cfg.expired_trade_policy.as_str());
    println!(
        "trades_input={} trades_replayed={} trades_skipped_expired={}",
        counts.trades_input, counts.trades_replayed, counts.trades_skipped_expired
    );
    println!(
        "expiry_closures={} flips={} reopened_after_expiry={}",
        counts.expiry_closures, counts.flips, counts.reopened_after_expiry
    );
    println!(
        "pnl_events={} snapshots={} open_positions={}",
        counts.pnl_events, counts.snapshots, counts.open_positions
    );
    println!("total_realized_pnl={}", res.manifest.total_realized_pnl);
    println!("run_dir={}", res.run_dir.display());

    Ok(())
}
