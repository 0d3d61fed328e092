//! Deviation of current weights from targets.

use crate::model::PortfolioIndex;
use crate::snapshot::AllocationSnapshot;
use crate::types::{AssetClassId, fmt_cents};

/// Direction an asset class needs to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Classification {
    Overweight,
    Underweight,
    Balanced,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Overweight => write!(f, "OVER"),
            Classification::Underweight => write!(f, "UNDER"),
            Classification::Balanced => write!(f, "OK"),
        }
    }
}

/// Tolerance band in cents: `floor(threshold × total)`.
///
/// The sequencer stops trading a class once its gap is inside this band,
/// and classification uses the same band.
pub fn tolerance_band(threshold: f64, total_value: i64) -> i64 {
    // Nudge so products such as 0.29 × 100 do not floor one cent low.
    (threshold * total_value as f64 + 1e-6).floor() as i64
}

/// |deviation| × total, rounded to the cent.
pub fn gap_cents(deviation: f64, total_value: i64) -> i64 {
    (deviation.abs() * total_value as f64).round() as i64
}

/// Classify a signed deviation on a portfolio worth `total_value` cents.
///
/// Decided in whole cents: a class is out of band only when its dollar gap
/// exceeds [`tolerance_band`]. A deviation equal to the threshold is
/// balanced even when float rounding lands it a hair over.
pub fn classify(deviation: f64, threshold: f64, total_value: i64) -> Classification {
    let out_of_band = if total_value > 0 {
        gap_cents(deviation, total_value) > tolerance_band(threshold, total_value)
    } else {
        deviation.abs() > threshold + 1e-12
    };
    if !out_of_band {
        Classification::Balanced
    } else if deviation > 0.0 {
        Classification::Overweight
    } else {
        Classification::Underweight
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deviation {
    pub asset_class: AssetClassId,
    pub name: String,
    pub current_weight: f64,
    /// Zero for classes that are held but have no target.
    pub target_weight: f64,
    /// current − target
    pub deviation: f64,
    pub classification: Classification,
    /// |deviation| × total portfolio value (cents)
    pub gap: i64,
}

impl Deviation {
    pub fn is_deviating(&self) -> bool {
        self.classification != Classification::Balanced
    }
}

/// Compute deviations for every held or targeted asset class.
///
/// Sorted by descending |deviation|, ties by asset class id, so the
/// largest imbalances are corrected first.
pub fn compute_deviations(
    index: &PortfolioIndex<'_>,
    snapshot: &AllocationSnapshot,
    threshold: f64,
) -> Vec<Deviation> {
    let mut classes: Vec<AssetClassId> = snapshot.classes.iter().map(|c| c.asset_class).collect();
    for t in &index.state.targets {
        if !classes.contains(&t.asset_class) {
            classes.push(t.asset_class);
        }
    }

    let mut out: Vec<Deviation> = classes
        .into_iter()
        .map(|asset_class| {
            let current_weight = snapshot.weight(asset_class);
            let target_weight = index.target(asset_class).unwrap_or(0.0);
            let deviation = current_weight - target_weight;
            Deviation {
                asset_class,
                name: index.class_name(asset_class).to_string(),
                current_weight,
                target_weight,
                deviation,
                classification: classify(deviation, threshold, snapshot.total_value),
                gap: gap_cents(deviation, snapshot.total_value),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.deviation
            .abs()
            .total_cmp(&a.deviation.abs())
            .then(a.asset_class.cmp(&b.asset_class))
    });
    out
}

/// Printable deviation table.
pub struct DeviationTable<'a>(pub &'a [Deviation]);

impl std::fmt::Display for DeviationTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DEVIATIONS:")?;
        writeln!(
            f,
            "  {:16} {:>9} {:>9} {:>9} {:>6} {:>12}",
            "Class", "Current%", "Target%", "Diff%", "", "Gap"
        )?;
        for d in self.0 {
            write!(
                f,
                "  {:16} {:>8.2}% {:>8.2}% {:>+8.2}% {:>6} ",
                d.name,
                d.current_weight * 100.0,
                d.target_weight * 100.0,
                d.deviation * 100.0,
                d.classification.to_string(),
            )?;
            fmt_cents(d.gap, f)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
