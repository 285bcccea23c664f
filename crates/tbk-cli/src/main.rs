use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tbk")]
#[command(about = "Tradebook replay: positions and realized PnL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a tradebook CSV and write positions / realized PnL artifacts
    Replay {
        /// Tradebook CSV path
        #[arg(long)]
        trades: PathBuf,

        /// Layered config paths in merge order (base -> overrides)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Exports root; overrides export.out_dir
        #[arg(long = "out-dir")]
        out_dir: Option<String>,

        /// Drop trades executed after their own expiry instead of opening them
        #[arg(long, default_value_t = false)]
        skip_expired: bool,

        /// Force-close everything expired before this instant after the last trade
        #[arg(long = "settle-at")]
        settle_at: Option<String>,

        /// Fail instead of warn when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        fail_unused_keys: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Replay {
            trades,
            config_paths,
            out_dir,
            skip_expired,
            settle_at,
            fail_unused_keys,
        } => commands::replay::run_replay(commands::replay::ReplayArgs {
            trades,
            config_paths,
            out_dir,
            skip_expired,
            settle_at,
            fail_unused_keys,
        })?,

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays a clean `key=value` report.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
