//! The rebalance pipeline: snapshot, deviations, sequencing, sizing, projection.

use log::{debug, info};

use crate::cost_model::CostModel;
use crate::deviation::{Classification, Deviation, compute_deviations, gap_cents};
use crate::error::DataError;
use crate::fractional::size_all;
use crate::model::{PortfolioIndex, PortfolioState};
use crate::plan::{RebalanceStatus, Side, TradePlan, UnresolvedClass, UnresolvedReason};
use crate::projection::{Projection, project};
use crate::sequencer::{SequencerParams, allocate};
use crate::snapshot::AllocationSnapshot;
use crate::types::AssetClassId;

/// Engine parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Deviation (fraction) an asset class may drift before it is traded.
    pub threshold: f64,
    /// Allowed slack when checking that targets sum to 1.0.
    pub weight_tolerance: f64,
    /// Sells and non-final buys below this amount (cents) are skipped.
    pub min_trade: i64,
    pub cost_model: CostModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: 0.005,
            weight_tolerance: 1e-4,
            min_trade: 0,
            cost_model: CostModel::zero(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), DataError> {
        if !self.threshold.is_finite() || !(0.0..1.0).contains(&self.threshold) {
            return Err(DataError::Config(format!(
                "threshold must be in [0, 1), got {}",
                self.threshold
            )));
        }
        if !self.weight_tolerance.is_finite() || self.weight_tolerance < 0.0 {
            return Err(DataError::Config(format!(
                "weight_tolerance must be >= 0, got {}",
                self.weight_tolerance
            )));
        }
        if self.min_trade < 0 {
            return Err(DataError::Config(format!(
                "min_trade must be >= 0, got {}",
                self.min_trade
            )));
        }
        if self.cost_model.min_trade_fee < 0 {
            return Err(DataError::Config(
                "min_trade_fee must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything one rebalance run produces.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceOutcome {
    pub snapshot: AllocationSnapshot,
    pub deviations: Vec<Deviation>,
    pub plan: TradePlan,
    pub projection: Projection,
    pub status: RebalanceStatus,
}

/// Run the engine on a portfolio.
///
/// Pure: the same state and config always yield the same outcome.
pub fn rebalance(state: &PortfolioState, config: &EngineConfig) -> Result<RebalanceOutcome, DataError> {
    config.validate()?;
    let index = PortfolioIndex::build(state, config.weight_tolerance)?;
    let snapshot = AllocationSnapshot::build(&index)?;
    let deviations = compute_deviations(&index, &snapshot, config.threshold);

    let deviating = deviations.iter().filter(|d| d.is_deviating()).count();
    debug!(
        "total {} across {} classes, {} deviating",
        snapshot.total_value,
        snapshot.classes.len(),
        deviating
    );

    let params = SequencerParams {
        threshold: config.threshold,
        min_trade: config.min_trade,
    };
    let allocation = allocate(&index, &snapshot, &deviations, params);
    let groups = size_all(
        &allocation.accounts,
        &index,
        &config.cost_model,
        config.min_trade,
    );
    let plan = TradePlan::from_groups(groups);
    let projection = project(&index, &snapshot, &plan, config.threshold);

    let unresolved = resolve(
        &deviations,
        &projection,
        &plan,
        &allocation.no_eligible_account,
    );
    let status = if unresolved.is_empty() {
        RebalanceStatus::FullRebalance
    } else {
        RebalanceStatus::PartialRebalance { unresolved }
    };

    info!(
        "plan: {} trades in {} accounts, {}",
        plan.len(),
        plan.groups.len(),
        if status.is_full() { "full" } else { "partial" }
    );

    Ok(RebalanceOutcome {
        snapshot,
        deviations,
        plan,
        projection,
        status,
    })
}

/// Deviating classes whose projection is still out of band, in either
/// direction.
///
/// Idle cash is outside the projected total, so an overweight class that
/// was sold but whose proceeds found no buy stays overweight; it takes the
/// reason of the blocked buy side.
fn resolve(
    deviations: &[Deviation],
    projection: &Projection,
    plan: &TradePlan,
    no_eligible_account: &[AssetClassId],
) -> Vec<UnresolvedClass> {
    let buy_blocked = if no_eligible_account.is_empty() {
        UnresolvedReason::InsufficientCash
    } else {
        UnresolvedReason::NoEligibleAccount
    };
    deviations
        .iter()
        .filter(|d| d.is_deviating())
        .filter_map(|d| {
            let after = projection.get(d.asset_class)?;
            if after.classification == Classification::Balanced {
                return None;
            }
            let reason = if after.classification != d.classification {
                UnresolvedReason::Overcorrected
            } else if no_eligible_account.contains(&d.asset_class) {
                UnresolvedReason::NoEligibleAccount
            } else if d.classification == Classification::Underweight {
                UnresolvedReason::InsufficientCash
            } else if plan
                .trades()
                .any(|t| t.side == Side::Sell && t.asset_class == d.asset_class)
            {
                buy_blocked
            } else {
                UnresolvedReason::NoSellablePosition
            };
            Some(UnresolvedClass {
                asset_class: d.asset_class,
                name: d.name.clone(),
                reason,
                remaining_gap: gap_cents(after.deviation, projection.total_value),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::restriction::Restriction;
    use crate::types::*;

    fn account(id: u64, cash: i64) -> Account {
        Account {
            id: AccountId(id),
            name: format!("Acct {id}"),
            tax_status: TaxStatus::NonRegistered,
            kind: String::new(),
            cash,
            priority: 0,
            currency: None,
        }
    }

    fn classes() -> Vec<AssetClass> {
        vec![
            AssetClass {
                id: AssetClassId(1),
                name: "Stocks".into(),
            },
            AssetClass {
                id: AssetClassId(2),
                name: "Bonds".into(),
            },
        ]
    }

    fn targets(stocks: f64, bonds: f64) -> Vec<AllocationTarget> {
        vec![
            AllocationTarget::new(AssetClassId(1), stocks),
            AllocationTarget::new(AssetClassId(2), bonds),
        ]
    }

    fn hold(account: u64, security: u64, shares: i64) -> Holding {
        Holding {
            account: AccountId(account),
            security: SecurityId(security),
            quantity: Shares::whole(shares),
        }
    }

    #[test]
    fn config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let bad = EngineConfig {
            threshold: -0.1,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(DataError::Config(_))));
        let bad = EngineConfig {
            min_trade: -1,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn seventy_thirty_to_sixty_forty() {
        let state = PortfolioState {
            accounts: vec![account(1, 0)],
            asset_classes: classes(),
            securities: vec![
                Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00)),
                Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00)),
            ],
            holdings: vec![hold(1, 1, 700), hold(1, 2, 300)],
            targets: targets(0.6, 0.4),
        };
        let out = rebalance(&state, &EngineConfig::default()).unwrap();

        assert_eq!(out.deviations[0].classification, Classification::Overweight);
        let trades: Vec<_> = out.plan.trades().collect();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].security, SecurityId(1));
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[1].security, SecurityId(2));
        assert!(trades[1].is_final);
        assert!(out.status.is_full());
        assert!(out.projection.tracking_error_pct < 0.5);
    }

    #[test]
    fn balanced_portfolio_has_no_trades() {
        let state = PortfolioState {
            accounts: vec![account(1, 0)],
            asset_classes: classes(),
            securities: vec![
                Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00)),
                Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00)),
            ],
            holdings: vec![hold(1, 1, 600), hold(1, 2, 400)],
            targets: targets(0.6, 0.4),
        };
        let out = rebalance(&state, &EngineConfig::default()).unwrap();
        assert!(out.plan.is_empty());
        assert!(out.status.is_full());
    }

    fn vti_bnd(cash: i64, vti: i64, bnd: i64) -> PortfolioState {
        PortfolioState {
            accounts: vec![account(1, cash)],
            asset_classes: classes(),
            securities: vec![
                Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00)),
                Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00)),
            ],
            holdings: vec![hold(1, 1, vti), hold(1, 2, bnd)],
            targets: targets(0.6, 0.4),
        }
    }

    #[test]
    fn drift_equal_to_default_threshold_is_balanced() {
        // 60.5/39.5 against 60/40 is exactly the 0.5% band.
        let out = rebalance(&vti_bnd(0, 605, 395), &EngineConfig::default()).unwrap();
        assert!(out.deviations.iter().all(|d| !d.is_deviating()));
        assert!(out.plan.is_empty());
        assert!(out.status.is_full());

        // One more share of drift trades.
        let out = rebalance(&vti_bnd(0, 606, 394), &EngineConfig::default()).unwrap();
        assert_eq!(out.plan.len(), 2);
        assert!(out.status.is_full());
    }

    #[test]
    fn idle_cash_does_not_overshoot_target() {
        let out = rebalance(&vti_bnd(1_000_000_00, 70, 30), &EngineConfig::default()).unwrap();
        let trades: Vec<_> = out.plan.trades().collect();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].amount, 1_000_00);
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[1].quantity, Shares::whole(10));
        assert_eq!(out.plan.groups[0].closing_cash(), 1_000_000_00);

        let bonds = out.projection.get(AssetClassId(2)).unwrap();
        assert!((bonds.projected_weight - 0.4).abs() < 1e-9);
        assert!(out.status.is_full());
    }

    #[test]
    fn cash_used_by_urgent_class_reports_insufficient_cash() {
        let mut classes = classes();
        classes.push(AssetClass {
            id: AssetClassId(3),
            name: "Gold".into(),
        });
        let state = PortfolioState {
            accounts: vec![account(1, 1_000_00), account(2, 0)],
            asset_classes: classes,
            securities: vec![
                Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00))
                    .with_restriction(Restriction::allow([AccountId(2)])),
                Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00)),
                Security::new(SecurityId(3), "GLD", AssetClassId(3), Price(100_00)),
            ],
            holdings: vec![hold(1, 1, 90)],
            targets: vec![
                AllocationTarget::new(AssetClassId(1), 0.5),
                AllocationTarget::new(AssetClassId(2), 0.3),
                AllocationTarget::new(AssetClassId(3), 0.2),
            ],
        };
        let out = rebalance(&state, &EngineConfig::default()).unwrap();
        let reason = |id| {
            out.status
                .unresolved()
                .iter()
                .find(|u| u.asset_class == AssetClassId(id))
                .map(|u| u.reason)
        };
        assert_eq!(reason(1), Some(UnresolvedReason::NoSellablePosition));
        assert_eq!(reason(2), Some(UnresolvedReason::InsufficientCash));
        assert_eq!(reason(3), Some(UnresolvedReason::InsufficientCash));
    }

    #[test]
    fn restricted_class_without_cash_is_partial() {
        // Bonds may only be held in account 2, which has no cash and
        // nothing to sell.
        let state = PortfolioState {
            accounts: vec![account(1, 0), account(2, 0)],
            asset_classes: classes(),
            securities: vec![
                Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00)),
                Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00))
                    .with_restriction(Restriction::allow([AccountId(2)])),
            ],
            holdings: vec![hold(1, 1, 1000)],
            targets: targets(0.6, 0.4),
        };
        let out = rebalance(&state, &EngineConfig::default()).unwrap();
        let unresolved = out.status.unresolved();
        let bonds = unresolved
            .iter()
            .find(|u| u.asset_class == AssetClassId(2))
            .unwrap();
        assert_eq!(bonds.reason, UnresolvedReason::NoEligibleAccount);
        assert!(out.plan.trades().all(|t| t.asset_class != AssetClassId(2)));

        // Stocks were sold, but the proceeds have nowhere to go.
        let stocks = unresolved
            .iter()
            .find(|u| u.asset_class == AssetClassId(1))
            .unwrap();
        assert_eq!(stocks.reason, UnresolvedReason::NoEligibleAccount);
    }

    #[test]
    fn invalid_targets_rejected() {
        let state = PortfolioState {
            accounts: vec![account(1, 0)],
            asset_classes: classes(),
            securities: vec![Security::new(
                SecurityId(1),
                "VTI",
                AssetClassId(1),
                Price(100_00),
            )],
            holdings: vec![hold(1, 1, 10)],
            targets: targets(0.6, 0.3),
        };
        assert!(matches!(
            rebalance(&state, &EngineConfig::default()),
            Err(DataError::TargetSum { .. })
        ));
    }
}
