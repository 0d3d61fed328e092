//! Account/security eligibility.
//!
//! Each security carries exactly one [`Restriction`]. The resolver is a pure
//! predicate over (restriction, account), so repeated queries within a run
//! always agree.

use crate::model::{Account, TaxStatus};
use crate::types::AccountId;

/// Which accounts a security may occupy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
pub enum Restriction {
    /// Any account.
    #[default]
    Unrestricted,
    /// Only the listed accounts.
    AllowList { accounts: Vec<AccountId> },
    /// Accounts whose attributes satisfy the condition.
    PreferenceModel { condition: AccountPredicate },
}

/// Declarative condition over account attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AccountPredicate {
    Registered,
    NonRegistered,
    /// Account kind label is one of these (case-insensitive).
    KindIn(Vec<String>),
    /// Account kind label is none of these (case-insensitive).
    KindNotIn(Vec<String>),
    /// Account priority is at least this value.
    MinPriority(i32),
    All(Vec<AccountPredicate>),
    Any(Vec<AccountPredicate>),
}

impl AccountPredicate {
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            AccountPredicate::Registered => account.tax_status == TaxStatus::Registered,
            AccountPredicate::NonRegistered => account.tax_status == TaxStatus::NonRegistered,
            AccountPredicate::KindIn(kinds) => {
                kinds.iter().any(|k| k.eq_ignore_ascii_case(&account.kind))
            }
            AccountPredicate::KindNotIn(kinds) => {
                !kinds.iter().any(|k| k.eq_ignore_ascii_case(&account.kind))
            }
            AccountPredicate::MinPriority(min) => account.priority >= *min,
            AccountPredicate::All(preds) => preds.iter().all(|p| p.matches(account)),
            AccountPredicate::Any(preds) => preds.iter().any(|p| p.matches(account)),
        }
    }
}

impl Restriction {
    /// Restrict to an explicit set of accounts.
    pub fn allow(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        Restriction::AllowList {
            accounts: accounts.into_iter().collect(),
        }
    }

    /// Restrict to accounts matching `condition`.
    pub fn preference(condition: AccountPredicate) -> Self {
        Restriction::PreferenceModel { condition }
    }
}

/// True if `account` may hold a security under `restriction`.
pub fn is_eligible(restriction: &Restriction, account: &Account) -> bool {
    match restriction {
        Restriction::Unrestricted => true,
        Restriction::AllowList { accounts } => accounts.contains(&account.id),
        Restriction::PreferenceModel { condition } => condition.matches(account),
    }
}
