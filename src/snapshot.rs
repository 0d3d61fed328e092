//! Allocation snapshot: current market value and weight per asset class.

use log::warn;
use rustc_hash::FxHashMap;

use crate::error::DataError;
use crate::model::PortfolioIndex;
use crate::types::{AccountId, AssetClassId, fmt_cents};

/// One asset class in the snapshot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassAllocation {
    pub asset_class: AssetClassId,
    pub name: String,
    /// Market value (cents).
    pub value: i64,
    /// value / total portfolio value
    pub weight: f64,
}

/// Portfolio-wide allocation by asset class.
///
/// Only priced holdings contribute. Classes are listed in ascending id order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationSnapshot {
    /// Total market value of all priced holdings (cents).
    pub total_value: i64,
    pub classes: Vec<ClassAllocation>,
    /// Market value per (account, asset class) (cents).
    #[cfg_attr(feature = "serde", serde(skip))]
    account_class_values: FxHashMap<(AccountId, AssetClassId), i64>,
    /// Holdings left out because their security has no price.
    pub excluded_holdings: usize,
}

impl AllocationSnapshot {
    /// Aggregate priced holdings into per-class values and weights.
    ///
    /// Fails with [`DataError::ZeroPortfolioValue`] when nothing is priced.
    pub fn build(index: &PortfolioIndex<'_>) -> Result<Self, DataError> {
        let mut class_values: FxHashMap<AssetClassId, i64> = FxHashMap::default();
        let mut account_class_values = FxHashMap::default();
        let mut total_value = 0i64;
        let mut excluded_holdings = 0;

        for holding in &index.state.holdings {
            let Some(sec) = index.security(holding.security) else {
                continue;
            };
            let Some(value) = index.holding_value(holding) else {
                warn!(
                    "excluding {} in {} from valuation: no price for {}",
                    sec.ticker, holding.account, sec.id
                );
                excluded_holdings += 1;
                continue;
            };
            *class_values.entry(sec.asset_class).or_insert(0) += value;
            *account_class_values
                .entry((holding.account, sec.asset_class))
                .or_insert(0) += value;
            total_value += value;
        }

        if total_value <= 0 {
            return Err(DataError::ZeroPortfolioValue);
        }

        let mut classes: Vec<ClassAllocation> = class_values
            .into_iter()
            .map(|(asset_class, value)| ClassAllocation {
                asset_class,
                name: index.class_name(asset_class).to_string(),
                value,
                weight: value as f64 / total_value as f64,
            })
            .collect();
        classes.sort_by_key(|c| c.asset_class);

        Ok(Self {
            total_value,
            classes,
            account_class_values,
            excluded_holdings,
        })
    }

    /// Current value of an asset class (zero if not held).
    pub fn value(&self, asset_class: AssetClassId) -> i64 {
        self.get(asset_class).map_or(0, |c| c.value)
    }

    /// Current weight of an asset class (zero if not held).
    pub fn weight(&self, asset_class: AssetClassId) -> f64 {
        self.get(asset_class).map_or(0.0, |c| c.weight)
    }

    pub fn get(&self, asset_class: AssetClassId) -> Option<&ClassAllocation> {
        self.classes.iter().find(|c| c.asset_class == asset_class)
    }

    /// Value an account holds in an asset class (cents).
    pub fn account_value(&self, account: AccountId, asset_class: AssetClassId) -> i64 {
        self.account_class_values
            .get(&(account, asset_class))
            .copied()
            .unwrap_or(0)
    }
}

impl std::fmt::Display for AllocationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CURRENT ALLOCATION:")?;
        for c in &self.classes {
            write!(f, "  {:16} ", c.name)?;
            fmt_cents(c.value, f)?;
            writeln!(f, "  ({:.2}%)", c.weight * 100.0)?;
        }
        write!(f, "  {:16} ", "Total")?;
        fmt_cents(self.total_value, f)?;
        writeln!(f)?;
        if self.excluded_holdings > 0 {
            writeln!(
                f,
                "  ({} unpriced holding(s) excluded)",
                self.excluded_holdings
            )?;
        }
        Ok(())
    }
}
