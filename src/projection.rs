//! Post-trade projection: the allocation the plan would leave behind.

use rustc_hash::FxHashMap;

use crate::deviation::{Classification, classify};
use crate::model::PortfolioIndex;
use crate::plan::{Side, TradePlan};
use crate::snapshot::AllocationSnapshot;
use crate::types::{AssetClassId, notional_floor};

/// Projected report comparing post-trade weights with targets.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Projection {
    /// Projected value of all holdings after the plan settles (cents).
    pub total_value: i64,
    pub entries: Vec<ProjectedClass>,
    /// RMS of projected deviations, in percent.
    pub tracking_error_pct: f64,
}

/// One asset class's projected position.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectedClass {
    pub asset_class: AssetClassId,
    pub name: String,
    pub target_weight: f64,
    pub current_weight: f64,
    pub projected_value: i64,
    pub projected_weight: f64,
    /// projected − target
    pub deviation: f64,
    pub classification: Classification,
}

impl Projection {
    pub fn get(&self, asset_class: AssetClassId) -> Option<&ProjectedClass> {
        self.entries.iter().find(|e| e.asset_class == asset_class)
    }
}

/// Apply `plan` to `snapshot`.
///
/// Sells remove their proceeds from the class; buys add the market value
/// of the shares bought. Cash left in accounts stays outside the total, as
/// it does in the snapshot.
pub fn project(
    index: &PortfolioIndex<'_>,
    snapshot: &AllocationSnapshot,
    plan: &TradePlan,
    threshold: f64,
) -> Projection {
    let mut values: FxHashMap<AssetClassId, i64> = snapshot
        .classes
        .iter()
        .map(|c| (c.asset_class, c.value))
        .collect();

    for trade in plan.trades() {
        let delta = match trade.side {
            Side::Sell => -trade.amount,
            Side::Buy => notional_floor(trade.quantity, trade.price),
        };
        *values.entry(trade.asset_class).or_insert(0) += delta;
    }
    for t in &index.state.targets {
        values.entry(t.asset_class).or_insert(0);
    }

    let total_value: i64 = values.values().map(|v| (*v).max(0)).sum();

    let mut classes: Vec<AssetClassId> = values.keys().copied().collect();
    classes.sort();

    let mut sum_sq = 0.0_f64;
    let entries: Vec<ProjectedClass> = classes
        .into_iter()
        .map(|asset_class| {
            let projected_value = values.get(&asset_class).copied().unwrap_or(0).max(0);
            let projected_weight = if total_value > 0 {
                projected_value as f64 / total_value as f64
            } else {
                0.0
            };
            let target_weight = index.target(asset_class).unwrap_or(0.0);
            let deviation = projected_weight - target_weight;
            sum_sq += deviation * deviation;
            ProjectedClass {
                asset_class,
                name: index.class_name(asset_class).to_string(),
                target_weight,
                current_weight: snapshot.weight(asset_class),
                projected_value,
                projected_weight,
                deviation,
                classification: classify(deviation, threshold, total_value),
            }
        })
        .collect();

    let tracking_error_pct = (sum_sq / entries.len().max(1) as f64).sqrt() * 100.0;

    Projection {
        total_value,
        entries,
        tracking_error_pct,
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PROJECTED ALLOCATION:")?;
        writeln!(
            f,
            "  {:16} {:>10} {:>10} {:>10} {:>10}",
            "Class", "Target%", "Current%", "After%", "Diff%"
        )?;
        for e in &self.entries {
            writeln!(
                f,
                "  {:16} {:>9.2}% {:>9.2}% {:>9.2}% {:>+9.2}%",
                e.name,
                e.target_weight * 100.0,
                e.current_weight * 100.0,
                e.projected_weight * 100.0,
                e.deviation * 100.0,
            )?;
        }
        writeln!(f, "\n  Tracking error: {:.3}%", self.tracking_error_pct)?;
        Ok(())
    }
}
