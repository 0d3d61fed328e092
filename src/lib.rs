// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! # driftbook
//!
//! A deterministic multi-account portfolio rebalancing engine.
//!
//! ## Features
//!
//! - **Asset-class targets**: weights per class, checked to sum to 1.0
//! - **Threshold bands**: only classes drifting past the threshold are traded
//! - **Account restrictions**: allow-lists and declarative account predicates
//! - **Cash stays put**: each account funds its buys from its own cash and sells
//! - **Fractional final buy**: the last buy in an account uses up its cash
//! - **Fixed-point money**: integer cents and 1/10 000-share quantities
//!
//! ## Quick Start
//!
//! ```
//! use driftbook::*;
//!
//! let state = PortfolioState {
//!     accounts: vec![Account {
//!         id: AccountId(1),
//!         name: "Brokerage".into(),
//!         tax_status: TaxStatus::NonRegistered,
//!         kind: "Margin".into(),
//!         cash: 0,
//!         priority: 0,
//!         currency: None,
//!     }],
//!     asset_classes: vec![
//!         AssetClass { id: AssetClassId(1), name: "Stocks".into() },
//!         AssetClass { id: AssetClassId(2), name: "Bonds".into() },
//!     ],
//!     securities: vec![
//!         Security::new(SecurityId(1), "VTI", AssetClassId(1), Price(100_00)),
//!         Security::new(SecurityId(2), "BND", AssetClassId(2), Price(100_00)),
//!     ],
//!     holdings: vec![
//!         Holding { account: AccountId(1), security: SecurityId(1), quantity: Shares::whole(70) },
//!         Holding { account: AccountId(1), security: SecurityId(2), quantity: Shares::whole(30) },
//!     ],
//!     targets: vec![
//!         AllocationTarget::new(AssetClassId(1), 0.6),
//!         AllocationTarget::new(AssetClassId(2), 0.4),
//!     ],
//! };
//!
//! let outcome = rebalance(&state, &EngineConfig::default()).unwrap();
//!
//! let trades: Vec<&Trade> = outcome.plan.trades().collect();
//! assert_eq!(trades[0].side, Side::Sell);   // sell $1,000 of VTI
//! assert_eq!(trades[1].side, Side::Buy);    // buy BND with the proceeds
//! assert!(outcome.status.is_full());
//! ```
//!
//! ## Quantities
//!
//! Money is [`i64`] cents; share quantities are [`Shares`], fixed-point in
//! units of 1/10 000 of a share:
//!
//! ```
//! use driftbook::{Price, Shares};
//!
//! assert_eq!(format!("{}", Price(50_00)), "$50.00");
//! assert_eq!(format!("{}", Shares(20694)), "2.0694");
//! ```
//!
//! ## Restrictions
//!
//! ```
//! use driftbook::*;
//!
//! let tfsa = Account {
//!     id: AccountId(3),
//!     name: "TFSA".into(),
//!     tax_status: TaxStatus::Registered,
//!     kind: "TFSA".into(),
//!     cash: 0,
//!     priority: 1,
//!     currency: None,
//! };
//!
//! let registered_only = Restriction::preference(AccountPredicate::Registered);
//! assert!(is_eligible(&registered_only, &tfsa));
//! assert!(!is_eligible(&Restriction::allow([AccountId(1)]), &tfsa));
//! ```

mod cost_model;
mod deviation;
mod engine;
mod error;
pub mod fractional;
mod model;
#[cfg(feature = "persistence")]
pub mod persistence;
mod plan;
mod projection;
mod restriction;
pub mod sequencer;
mod snapshot;
mod types;

// Re-export public API
pub use cost_model::CostModel;
pub use deviation::{
    Classification, Deviation, DeviationTable, classify, compute_deviations, gap_cents, tolerance_band,
};
pub use engine::{EngineConfig, RebalanceOutcome, rebalance};
pub use error::DataError;
pub use model::{
    Account, AllocationTarget, AssetClass, Holding, PortfolioIndex, PortfolioState, Security,
    TaxStatus, Visibility,
};
pub use plan::{
    AccountTrades, RebalanceStatus, Side, Trade, TradePlan, UnresolvedClass, UnresolvedReason,
};
pub use projection::{ProjectedClass, Projection, project};
pub use restriction::{AccountPredicate, Restriction, is_eligible};
pub use snapshot::{AllocationSnapshot, ClassAllocation};
pub use types::{
    AccountId, AssetClassId, Price, SHARE_SCALE, SecurityId, Shares, affordable, notional_ceil,
    notional_floor,
};
