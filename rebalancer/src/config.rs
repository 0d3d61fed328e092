//! TOML configuration loading and validation.

use std::path::Path;

use driftbook::{CostModel, EngineConfig};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
    #[serde(default)]
    pub min_trade_usd: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            weight_tolerance: default_weight_tolerance(),
            min_trade_usd: 0.0,
        }
    }
}

fn default_threshold() -> f64 {
    0.005
}
fn default_weight_tolerance() -> f64 {
    1e-4
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub commission_bps: u32,
    #[serde(default)]
    pub slippage_bps: u32,
    #[serde(default)]
    pub min_trade_fee_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecksConfig {
    #[serde(default = "default_max_trades")]
    pub max_trades_per_plan: usize,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            max_trades_per_plan: default_max_trades(),
        }
    }
}

fn default_max_trades() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    /// Currency every amount is restated in before planning.
    #[serde(default = "default_base_currency")]
    pub base: String,
    /// Units of `base` per one unit of each listed currency.
    #[serde(default)]
    pub rates: FxHashMap<String, f64>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            base: default_base_currency(),
            rates: FxHashMap::default(),
        }
    }
}

fn default_base_currency() -> String {
    "USD".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

/// Dollars to cents, rounded to the nearest cent.
fn usd_to_cents(usd: f64) -> i64 {
    (usd * 100.0).round() as i64
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.engine.threshold) {
            return Err(Error::Config("threshold must be in [0.0, 1.0)".into()));
        }
        if self.engine.weight_tolerance < 0.0 {
            return Err(Error::Config("weight_tolerance must be >= 0".into()));
        }
        if self.engine.min_trade_usd < 0.0 {
            return Err(Error::Config("min_trade_usd must be >= 0".into()));
        }
        if self.cost.min_trade_fee_usd < 0.0 {
            return Err(Error::Config("min_trade_fee_usd must be >= 0".into()));
        }
        if self.checks.max_trades_per_plan == 0 {
            return Err(Error::Config("max_trades_per_plan must be > 0".into()));
        }
        if self.currency.base.trim().is_empty() {
            return Err(Error::Config("currency.base must not be empty".into()));
        }
        for (code, rate) in &self.currency.rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(Error::Config(format!(
                    "exchange rate for {code} must be > 0, got {rate}"
                )));
            }
        }
        Ok(())
    }

    /// Engine parameters derived from the `[engine]` and `[cost]` sections.
    pub fn engine_config(&self) -> EngineConfig {
        let cost_model = if self.cost.enabled {
            CostModel {
                commission_bps: self.cost.commission_bps,
                slippage_bps: self.cost.slippage_bps,
                min_trade_fee: usd_to_cents(self.cost.min_trade_fee_usd),
            }
        } else {
            CostModel::zero()
        };
        EngineConfig {
            threshold: self.engine.threshold,
            weight_tolerance: self.engine.weight_tolerance,
            min_trade: usd_to_cents(self.engine.min_trade_usd),
            cost_model,
        }
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> std::path::PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}
