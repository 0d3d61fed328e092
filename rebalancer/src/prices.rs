//! Price resolution for public securities.
//!
//! The engine only reads `Security::price`. Before a run, every public
//! security is priced from a [`PriceFeed`]; private securities keep their
//! manually entered price.

use std::path::Path;

use driftbook::{PortfolioState, Price, Security, Visibility};
use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{Error, Result};

/// Why a quote could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PriceError {
    #[error("no quote for {0}")]
    Missing(String),

    #[error("invalid quote for {ticker}: {value}")]
    Invalid { ticker: String, value: f64 },
}

/// Minimal market-data API needed by the rebalancer.
pub trait PriceFeed {
    fn price(&self, security: &Security) -> std::result::Result<Price, PriceError>;
}

/// Quotes read from a JSON object of `"TICKER": dollars`.
#[derive(Debug, Clone, Default)]
pub struct QuoteFile {
    quotes: FxHashMap<String, f64>,
}

impl QuoteFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Quotes(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: FxHashMap<String, f64> = serde_json::from_str(json)?;
        let quotes = raw
            .into_iter()
            .map(|(ticker, px)| (ticker.to_ascii_uppercase(), px))
            .collect();
        Ok(Self { quotes })
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl PriceFeed for QuoteFile {
    fn price(&self, security: &Security) -> std::result::Result<Price, PriceError> {
        let ticker = security.ticker.to_ascii_uppercase();
        let value = *self
            .quotes
            .get(&ticker)
            .ok_or_else(|| PriceError::Missing(security.ticker.clone()))?;
        let cents = (value * 100.0).round();
        if !cents.is_finite() || cents < 1.0 {
            return Err(PriceError::Invalid {
                ticker: security.ticker.clone(),
                value,
            });
        }
        Ok(Price(cents as i64))
    }
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceSummary {
    pub resolved: usize,
    /// Tickers left unpriced.
    pub failed: Vec<String>,
    /// Private securities kept at their manual price.
    pub manual: usize,
}

/// Price every public security from `feed`.
///
/// A failed quote leaves the security unpriced, so its holdings drop out
/// of valuation instead of aborting the run.
pub fn resolve_prices(state: &mut PortfolioState, feed: &dyn PriceFeed) -> PriceSummary {
    let mut summary = PriceSummary::default();
    for security in &mut state.securities {
        if security.visibility == Visibility::Private {
            summary.manual += 1;
            continue;
        }
        match feed.price(security) {
            Ok(price) => {
                security.price = Some(price);
                summary.resolved += 1;
            }
            Err(e) => {
                warn!("{e}; {} left unpriced", security.ticker);
                security.price = None;
                summary.failed.push(security.ticker.clone());
            }
        }
    }
    info!(
        "Prices: {} resolved, {} failed, {} manual",
        summary.resolved,
        summary.failed.len(),
        summary.manual
    );
    summary
}
