//! Typed view of the merged config document.
//!
//! ```yaml
//! replay:
//!   expired_trade_policy: sweep        # sweep | skip_expired
//!   settle_at: null                    # optional "YYYY-MM-DD HH:MM:SS"
//! tradebook:
//!   default_expiry_time: "15:30:00"    # applied to date-only expiry values
//! export:
//!   out_dir: "exports"
//!   price_decimals: 2
//! ```

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tbk_ledger::{ExpiredTradePolicy, ReplayConfig, MICROS_DECIMALS};
use tbk_tradebook::{parse_instant, NormalizeOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TbkConfig {
    pub replay: ReplaySection,
    pub tradebook: TradebookSection,
    pub export: ExportSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySection {
    pub expired_trade_policy: ExpiredTradePolicy,
    pub settle_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradebookSection {
    pub default_expiry_time: String,
}

impl Default for TradebookSection {
    fn default() -> Self {
        Self {
            default_expiry_time: "15:30:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub out_dir: String,
    /// Decimal places for average prices in `positions.csv`.
    pub price_decimals: u32,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            out_dir: "exports".to_string(),
            price_decimals: 2,
        }
    }
}

impl TbkConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: TbkConfig = if v.is_null() {
            TbkConfig::default()
        } else {
            serde_json::from_value(v.clone()).context("config does not match schema")?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.export.price_decimals > MICROS_DECIMALS {
            bail!(
                "export.price_decimals must be <= {MICROS_DECIMALS}, got {}",
                self.export.price_decimals
            );
        }
        if self.export.out_dir.trim().is_empty() {
            bail!("export.out_dir must not be empty");
        }
        self.default_expiry_time()?;
        self.settle_at()?;
        Ok(())
    }

    pub fn default_expiry_time(&self) -> Result<NaiveTime> {
        let raw = self.tradebook.default_expiry_time.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .with_context(|| format!("tradebook.default_expiry_time is not HH:MM[:SS]: '{raw}'"))
    }

    pub fn settle_at(&self) -> Result<Option<NaiveDateTime>> {
        let Some(raw) = self.replay.settle_at.as_deref() else {
            return Ok(None);
        };
        // A date-only settle instant means end of that day.
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let t = parse_instant(raw, "replay.settle_at", end_of_day)?;
        Ok(Some(t))
    }

    pub fn normalize_options(&self) -> Result<NormalizeOptions> {
        Ok(NormalizeOptions {
            default_expiry_time: self.default_expiry_time()?,
        })
    }

    /// SHA-256 of these settings as canonical JSON, every default filled in.
    ///
    /// Unlike the layered `config_hash`, this changes with CLI overrides and
    /// is equal for documents that spell defaults out or leave them implied.
    pub fn effective_hash(&self) -> Result<String> {
        let v = serde_json::to_value(self).context("serialize effective settings failed")?;
        let canonical =
            serde_json::to_string(&v).context("canonical json serialize failed")?;
        Ok(crate::sha256_hex(canonical.as_bytes()))
    }

    pub fn replay_config(&self) -> Result<ReplayConfig> {
        Ok(ReplayConfig {
            expired_trade_policy: self.replay.expired_trade_policy,
            settle_at: self.settle_at()?,
        })
    }
}
