//! Base-currency conversion.
//!
//! The engine values everything in one currency. Securities quoted and
//! accounts funded in another currency are restated here, after quotes are
//! applied and before the engine runs.

use driftbook::{PortfolioState, Price};
use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::CurrencyConfig;
use crate::error::{Error, Result};

/// Units of base currency per unit of each foreign currency.
#[derive(Debug, Clone)]
pub struct ExchangeRates {
    base: String,
    rates: FxHashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_ascii_uppercase(),
            rates: FxHashMap::default(),
        }
    }

    pub fn from_config(config: &CurrencyConfig) -> Self {
        config
            .rates
            .iter()
            .fold(Self::new(&config.base), |fx, (code, rate)| {
                fx.with_rate(code, *rate)
            })
    }

    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.rates.insert(currency.to_ascii_uppercase(), rate);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `None` and the base currency itself convert at 1.0.
    pub fn rate(&self, currency: Option<&str>) -> Option<f64> {
        match currency {
            None => Some(1.0),
            Some(c) if c.eq_ignore_ascii_case(&self.base) => Some(1.0),
            Some(c) => self.rates.get(&c.to_ascii_uppercase()).copied(),
        }
    }

    /// Cents in `currency` restated as base-currency cents.
    pub fn to_base(&self, cents: i64, currency: Option<&str>) -> Option<i64> {
        self.rate(currency)
            .map(|rate| (cents as f64 * rate).round() as i64)
    }
}

/// What a conversion pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub base: String,
    /// Foreign-currency prices restated.
    pub securities: usize,
    /// Foreign-currency cash balances restated.
    pub accounts: usize,
    /// Tickers left unpriced for lack of a rate.
    pub unpriced: Vec<String>,
}

impl ConversionSummary {
    pub fn is_empty(&self) -> bool {
        self.securities == 0 && self.accounts == 0 && self.unpriced.is_empty()
    }
}

fn is_foreign(currency: Option<&str>, base: &str) -> bool {
    currency.is_some_and(|c| !c.eq_ignore_ascii_case(base))
}

/// Restate every foreign price and cash balance in the base currency.
///
/// Converted items are marked as base currency, so a second pass is a
/// no-op. A security with no rate is left unpriced and drops out of
/// valuation; an account with no rate is an error, since its cash would
/// otherwise be spent at the wrong value.
pub fn convert_to_base(state: &mut PortfolioState, fx: &ExchangeRates) -> Result<ConversionSummary> {
    let mut summary = ConversionSummary {
        base: fx.base().to_string(),
        ..Default::default()
    };

    for account in &mut state.accounts {
        if !is_foreign(account.currency.as_deref(), fx.base()) {
            account.currency = None;
            continue;
        }
        let currency = account.currency.as_deref().unwrap_or_default();
        account.cash = fx.to_base(account.cash, Some(currency)).ok_or_else(|| {
            Error::Currency(format!(
                "no {currency}/{} rate for account {}",
                fx.base(),
                account.id
            ))
        })?;
        account.currency = None;
        summary.accounts += 1;
    }

    for security in &mut state.securities {
        if !is_foreign(security.currency.as_deref(), fx.base()) {
            security.currency = None;
            continue;
        }
        let converted = match security.price {
            Some(price) => fx.to_base(price.0, security.currency.as_deref()),
            None => {
                security.currency = None;
                continue;
            }
        };
        match converted {
            Some(cents) if cents > 0 => {
                security.price = Some(Price(cents));
                summary.securities += 1;
            }
            _ => {
                warn!(
                    "no usable {}/{} rate; {} left unpriced",
                    security.currency.as_deref().unwrap_or_default(),
                    fx.base(),
                    security.ticker
                );
                security.price = None;
                summary.unpriced.push(security.ticker.clone());
            }
        }
        security.currency = None;
    }

    if !summary.is_empty() {
        info!(
            "Converted to {}: {} prices, {} cash balances, {} unpriced",
            summary.base,
            summary.securities,
            summary.accounts,
            summary.unpriced.len()
        );
    }
    Ok(summary)
}
