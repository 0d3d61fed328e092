//! Domain model: accounts, securities, holdings, targets.
//!
//! Everything here is an immutable input to the engine. [`PortfolioState`]
//! bundles one complete snapshot; [`PortfolioIndex`] is the validated,
//! lookup-friendly view the engine works from.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::DataError;
use crate::restriction::Restriction;
use crate::types::{AccountId, AssetClassId, Price, SecurityId, Shares, notional_floor};

/// Tax status of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TaxStatus {
    Registered,
    #[default]
    NonRegistered,
}

/// An investment account.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub tax_status: TaxStatus,
    /// Free-form kind label, e.g. "RRSP", "TFSA", "margin".
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: String,
    /// Idle cash (cents).
    #[cfg_attr(feature = "serde", serde(default))]
    pub cash: i64,
    /// Higher priority wins ranking ties.
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: i32,
    /// Currency the cash balance is held in; `None` is the base currency.
    #[cfg_attr(feature = "serde", serde(default))]
    pub currency: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetClass {
    pub id: AssetClassId,
    pub name: String,
}

/// Public securities are priced by a feed; private ones manually.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Security {
    pub id: SecurityId,
    pub ticker: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub asset_class: AssetClassId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub visibility: Visibility,
    /// Resolved price, if any. Unpriced holdings are left out of valuation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub price: Option<Price>,
    /// Minimum tradable increment in share units (1 = 0.0001 share).
    #[cfg_attr(feature = "serde", serde(default = "default_increment"))]
    pub min_increment: i64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub restriction: Restriction,
    /// Quote currency; `None` is the base currency. The engine never
    /// converts: `price` must already be in the base currency.
    #[cfg_attr(feature = "serde", serde(default))]
    pub currency: Option<String>,
}

#[cfg(feature = "serde")]
fn default_increment() -> i64 {
    1
}

impl Security {
    /// A public, unrestricted security with fractional trading allowed.
    pub fn new(id: SecurityId, ticker: &str, asset_class: AssetClassId, price: Price) -> Self {
        Self {
            id,
            ticker: ticker.to_string(),
            name: String::new(),
            asset_class,
            visibility: Visibility::Public,
            price: Some(price),
            min_increment: 1,
            restriction: Restriction::Unrestricted,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn with_increment(mut self, increment: i64) -> Self {
        self.min_increment = increment;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holding {
    pub account: AccountId,
    pub security: SecurityId,
    pub quantity: Shares,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationTarget {
    pub asset_class: AssetClassId,
    /// Target weight as a fraction (0.6 = 60%).
    pub weight: f64,
    /// Account to route this class's trades to first, when eligible.
    #[cfg_attr(feature = "serde", serde(default))]
    pub preferred_account: Option<AccountId>,
    /// Account kind to route to first, after `preferred_account`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub preferred_kind: Option<String>,
}

impl AllocationTarget {
    pub fn new(asset_class: AssetClassId, weight: f64) -> Self {
        Self {
            asset_class,
            weight,
            preferred_account: None,
            preferred_kind: None,
        }
    }

    pub fn with_preferred_account(mut self, account: AccountId) -> Self {
        self.preferred_account = Some(account);
        self
    }

    pub fn with_preferred_kind(mut self, kind: &str) -> Self {
        self.preferred_kind = Some(kind.to_string());
        self
    }

    /// Routing rank of `account` for this class: 0 for the preferred
    /// account, 1 for the preferred kind, 2 otherwise.
    pub fn preference_rank(&self, account: &Account) -> u8 {
        if self.preferred_account == Some(account.id) {
            0
        } else if self
            .preferred_kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case(&account.kind))
        {
            1
        } else {
            2
        }
    }
}

/// One complete input snapshot for a rebalance run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioState {
    pub accounts: Vec<Account>,
    pub asset_classes: Vec<AssetClass>,
    pub securities: Vec<Security>,
    pub holdings: Vec<Holding>,
    pub targets: Vec<AllocationTarget>,
}

/// Validated lookup view over a [`PortfolioState`].
///
/// Accounts are kept in ascending id order, which is also the order of the
/// account groups in the final plan.
#[derive(Debug)]
pub struct PortfolioIndex<'a> {
    pub state: &'a PortfolioState,
    accounts: Vec<&'a Account>,
    account_pos: FxHashMap<AccountId, usize>,
    securities: FxHashMap<SecurityId, &'a Security>,
    class_names: FxHashMap<AssetClassId, &'a str>,
    targets: FxHashMap<AssetClassId, &'a AllocationTarget>,
    /// Holdings per account, sorted by security id.
    holdings: FxHashMap<AccountId, Vec<&'a Holding>>,
}

impl<'a> PortfolioIndex<'a> {
    /// Validate `state` and build the index.
    ///
    /// `weight_tolerance` bounds |Σ target weights − 1.0|.
    pub fn build(state: &'a PortfolioState, weight_tolerance: f64) -> Result<Self, DataError> {
        let mut class_names = FxHashMap::default();
        for class in &state.asset_classes {
            if class_names.insert(class.id, class.name.as_str()).is_some() {
                return Err(DataError::DuplicateAssetClass(class.id));
            }
        }

        let mut accounts: Vec<&Account> = Vec::with_capacity(state.accounts.len());
        let mut seen_accounts = FxHashSet::default();
        for account in &state.accounts {
            if !seen_accounts.insert(account.id) {
                return Err(DataError::DuplicateAccount(account.id));
            }
            if account.cash < 0 {
                return Err(DataError::NegativeCash(account.id));
            }
            accounts.push(account);
        }
        accounts.sort_by_key(|a| a.id);
        let account_pos = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();

        let mut securities = FxHashMap::default();
        for sec in &state.securities {
            if !class_names.contains_key(&sec.asset_class) {
                return Err(DataError::UnknownAssetClass {
                    security: sec.id,
                    asset_class: sec.asset_class,
                });
            }
            if sec.min_increment <= 0 {
                return Err(DataError::InvalidIncrement(sec.id));
            }
            if matches!(sec.price, Some(p) if p.0 <= 0) {
                return Err(DataError::NonPositivePrice(sec.id));
            }
            if securities.insert(sec.id, sec).is_some() {
                return Err(DataError::DuplicateSecurity(sec.id));
            }
        }

        let mut targets = FxHashMap::default();
        let mut sum = 0.0_f64;
        for t in &state.targets {
            if !class_names.contains_key(&t.asset_class) {
                return Err(DataError::UnknownTargetClass(t.asset_class));
            }
            if t.weight < 0.0 || t.weight.is_nan() {
                return Err(DataError::NegativeTarget {
                    asset_class: t.asset_class,
                    weight: t.weight,
                });
            }
            if let Some(account) = t.preferred_account {
                if !seen_accounts.contains(&account) {
                    return Err(DataError::UnknownPreferredAccount {
                        asset_class: t.asset_class,
                        account,
                    });
                }
            }
            if targets.insert(t.asset_class, t).is_some() {
                return Err(DataError::DuplicateTarget(t.asset_class));
            }
            sum += t.weight;
        }
        if (sum - 1.0).abs() > weight_tolerance {
            return Err(DataError::TargetSum {
                sum,
                tolerance: weight_tolerance,
            });
        }

        let mut holdings: FxHashMap<AccountId, Vec<&Holding>> = FxHashMap::default();
        let mut seen_holdings = FxHashSet::default();
        for h in &state.holdings {
            if !seen_accounts.contains(&h.account) {
                return Err(DataError::UnknownAccount(h.account));
            }
            if !securities.contains_key(&h.security) {
                return Err(DataError::UnknownSecurity(h.security));
            }
            if h.quantity.0 < 0 {
                return Err(DataError::NegativeQuantity {
                    account: h.account,
                    security: h.security,
                });
            }
            if !seen_holdings.insert((h.account, h.security)) {
                return Err(DataError::DuplicateHolding {
                    account: h.account,
                    security: h.security,
                });
            }
            holdings.entry(h.account).or_default().push(h);
        }
        for list in holdings.values_mut() {
            list.sort_by_key(|h| h.security);
        }

        Ok(Self {
            state,
            accounts,
            account_pos,
            securities,
            class_names,
            targets,
            holdings,
        })
    }

    /// Accounts in ascending id order.
    pub fn accounts(&self) -> &[&'a Account] {
        &self.accounts
    }

    pub fn account(&self, id: AccountId) -> Option<&'a Account> {
        self.account_pos.get(&id).map(|&i| self.accounts[i])
    }

    pub fn security(&self, id: SecurityId) -> Option<&'a Security> {
        self.securities.get(&id).copied()
    }

    /// Securities in ascending id order.
    pub fn securities_sorted(&self) -> Vec<&'a Security> {
        let mut out: Vec<&Security> = self.securities.values().copied().collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn class_name(&self, id: AssetClassId) -> &'a str {
        self.class_names.get(&id).copied().unwrap_or("?")
    }

    /// Target weight, or `None` if the class has no target.
    pub fn target(&self, id: AssetClassId) -> Option<f64> {
        self.targets.get(&id).map(|t| t.weight)
    }

    /// Routing rank of `account` for trades in class `id` (lower first).
    pub fn preference_rank(&self, id: AssetClassId, account: &Account) -> u8 {
        self.targets
            .get(&id)
            .map_or(2, |t| t.preference_rank(account))
    }

    /// Holdings of one account, sorted by security id.
    pub fn holdings_of(&self, account: AccountId) -> &[&'a Holding] {
        self.holdings.get(&account).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Market value of a holding in cents, or `None` if its security is unpriced.
    pub fn holding_value(&self, holding: &Holding) -> Option<i64> {
        let sec = self.security(holding.security)?;
        sec.price.map(|p| notional_floor(holding.quantity, p))
    }
}
