//! Trades and the account-grouped trade plan.

use crate::types::{AccountId, AssetClassId, Price, SecurityId, Shares, fmt_cents};

/// Trade direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Sell,
    Buy,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Sell => write!(f, "SELL"),
            Side::Buy => write!(f, "BUY"),
        }
    }
}

/// A single proposed trade.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trade {
    /// Position in the plan, starting at 1.
    pub sequence: usize,
    pub account: AccountId,
    pub security: SecurityId,
    pub ticker: String,
    pub asset_class: AssetClassId,
    pub side: Side,
    pub quantity: Shares,
    pub price: Price,
    /// Sell proceeds (rounded down) or buy cost (rounded up), in cents.
    pub amount: i64,
    /// Last buy of its account, sized fractionally to use up remaining cash.
    pub is_final: bool,
    /// Other eligible securities in the same class the user may pick instead.
    #[cfg_attr(feature = "serde", serde(default))]
    pub alternatives: Vec<SecurityId>,
    /// Estimated trading cost (cents); zero when costs are disabled.
    #[cfg_attr(feature = "serde", serde(default))]
    pub est_cost: i64,
}

impl Trade {
    /// True if the user must choose between several eligible securities.
    pub fn requires_selection(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// All trades for one account: sells first, then buys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountTrades {
    pub account: AccountId,
    /// Cash before any trade (cents).
    pub opening_cash: i64,
    pub trades: Vec<Trade>,
}

impl AccountTrades {
    pub fn proceeds(&self) -> i64 {
        self.sum(Side::Sell)
    }

    pub fn spent(&self) -> i64 {
        self.sum(Side::Buy)
    }

    /// Cash left after every trade in the group settles.
    pub fn closing_cash(&self) -> i64 {
        self.opening_cash + self.proceeds() - self.spent()
    }

    fn sum(&self, side: Side) -> i64 {
        self.trades
            .iter()
            .filter(|t| t.side == side)
            .map(|t| t.amount)
            .sum()
    }
}

/// Ordered, account-grouped trades produced by one engine run.
///
/// Groups are in ascending account id order; within a group every sell
/// precedes every buy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradePlan {
    pub groups: Vec<AccountTrades>,
}

impl TradePlan {
    /// Build a plan from per-account groups, dropping empty ones and
    /// numbering trades 1..n in plan order.
    pub fn from_groups(mut groups: Vec<AccountTrades>) -> Self {
        groups.retain(|g| !g.trades.is_empty());
        groups.sort_by_key(|g| g.account);
        let mut seq = 0;
        for group in &mut groups {
            for trade in &mut group.trades {
                seq += 1;
                trade.sequence = seq;
            }
        }
        Self { groups }
    }

    /// Iterator over every trade in plan order.
    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.groups.iter().flat_map(|g| g.trades.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.trades.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn group(&self, account: AccountId) -> Option<&AccountTrades> {
        self.groups.iter().find(|g| g.account == account)
    }

    /// Total estimated trading cost (cents).
    pub fn estimated_cost(&self) -> i64 {
        self.trades().map(|t| t.est_cost).sum()
    }
}

impl std::fmt::Display for TradePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No trades.");
        }
        writeln!(f, "TRADE PLAN:")?;
        for group in &self.groups {
            write!(f, "  Account {} (cash ", group.account)?;
            fmt_cents(group.opening_cash, f)?;
            write!(f, " -> ")?;
            fmt_cents(group.closing_cash(), f)?;
            writeln!(f, ")")?;
            for t in &group.trades {
                write!(
                    f,
                    "  {:>4}  {:4} {:8} {:>12} @ {:>10}  ",
                    t.sequence,
                    t.side.to_string(),
                    t.ticker,
                    t.quantity.to_string(),
                    t.price.to_string(),
                )?;
                fmt_cents(t.amount, f)?;
                if t.is_final {
                    write!(f, "  [final]")?;
                }
                if t.requires_selection() {
                    write!(f, "  [or {} alternative(s)]", t.alternatives.len())?;
                }
                writeln!(f)?;
            }
        }
        let cost = self.estimated_cost();
        if cost > 0 {
            write!(f, "\n  Est. cost: ")?;
            fmt_cents(cost, f)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Why an asset class could not be brought within threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnresolvedReason {
    /// No account with spare cash may hold any security in the class.
    NoEligibleAccount,
    /// Eligible accounts ran out of cash before the gap closed.
    InsufficientCash,
    /// Not enough eligible, priced holdings to sell down.
    NoSellablePosition,
    /// The plan pushed the class out of band on the other side of target.
    Overcorrected,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::NoEligibleAccount => write!(f, "no eligible account"),
            UnresolvedReason::InsufficientCash => write!(f, "insufficient cash"),
            UnresolvedReason::NoSellablePosition => write!(f, "no sellable position"),
            UnresolvedReason::Overcorrected => write!(f, "overcorrected"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnresolvedClass {
    pub asset_class: AssetClassId,
    pub name: String,
    pub reason: UnresolvedReason,
    /// Remaining dollar gap to target after the plan (cents).
    pub remaining_gap: i64,
}

/// Whether every deviating class was corrected.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RebalanceStatus {
    FullRebalance,
    PartialRebalance { unresolved: Vec<UnresolvedClass> },
}

impl RebalanceStatus {
    pub fn is_full(&self) -> bool {
        matches!(self, RebalanceStatus::FullRebalance)
    }

    pub fn unresolved(&self) -> &[UnresolvedClass] {
        match self {
            RebalanceStatus::FullRebalance => &[],
            RebalanceStatus::PartialRebalance { unresolved } => unresolved,
        }
    }
}

impl std::fmt::Display for RebalanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebalanceStatus::FullRebalance => writeln!(f, "Status: full rebalance"),
            RebalanceStatus::PartialRebalance { unresolved } => {
                writeln!(f, "Status: partial rebalance")?;
                for u in unresolved {
                    write!(f, "  {} unresolved ({}), remaining ", u.name, u.reason)?;
                    fmt_cents(u.remaining_gap, f)?;
                    writeln!(f)?;
                }
                Ok(())
            }
        }
    }
}
