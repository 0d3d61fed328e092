//! Data errors that abort a rebalance run.

use crate::types::{AccountId, AssetClassId, SecurityId};

/// Errors in the input snapshot. Fatal to the run: no partial plan is produced.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataError {
    /// Total portfolio value is zero, so weights are undefined.
    #[error("total portfolio value is zero (no priced holdings)")]
    ZeroPortfolioValue,

    /// Target weights do not sum to 1.0 within tolerance.
    #[error("target weights sum to {sum:.6}, expected 1.0 (tolerance {tolerance})")]
    TargetSum { sum: f64, tolerance: f64 },

    #[error("target weight for {asset_class} is negative ({weight})")]
    NegativeTarget { asset_class: AssetClassId, weight: f64 },

    #[error("duplicate target for {0}")]
    DuplicateTarget(AssetClassId),

    #[error("security {security} references unknown asset class {asset_class}")]
    UnknownAssetClass {
        security: SecurityId,
        asset_class: AssetClassId,
    },

    #[error("target references unknown asset class {0}")]
    UnknownTargetClass(AssetClassId),

    #[error("target for {asset_class} prefers unknown account {account}")]
    UnknownPreferredAccount {
        asset_class: AssetClassId,
        account: AccountId,
    },

    #[error("duplicate asset class id {0}")]
    DuplicateAssetClass(AssetClassId),

    #[error("holding references unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("holding references unknown security {0}")]
    UnknownSecurity(SecurityId),

    #[error("duplicate account id {0}")]
    DuplicateAccount(AccountId),

    #[error("duplicate security id {0}")]
    DuplicateSecurity(SecurityId),

    #[error("duplicate holding of {security} in {account}")]
    DuplicateHolding {
        account: AccountId,
        security: SecurityId,
    },

    #[error("holding of {security} in {account} has negative quantity")]
    NegativeQuantity {
        account: AccountId,
        security: SecurityId,
    },

    #[error("account {0} has a negative cash balance")]
    NegativeCash(AccountId),

    #[error("security {0} has a non-positive price")]
    NonPositivePrice(SecurityId),

    #[error("security {0} has a non-positive minimum increment")]
    InvalidIncrement(SecurityId),

    #[error("invalid engine config: {0}")]
    Config(String),
}
