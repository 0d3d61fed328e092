//! Trade sequencing: which accounts sell, which accounts buy, and how much.
//!
//! This is the only stage that looks across accounts. It walks the deviating
//! asset classes in urgency order and produces one [`AccountAllocation`] per
//! account: the exact sell legs, plus cash budgets earmarked for buys. Cash
//! is tracked per account and never pooled, so each allocation can later be
//! turned into trades independently (see [`crate::fractional`]).

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::deviation::{Classification, Deviation, tolerance_band};
use crate::model::{Account, Holding, PortfolioIndex, Security};
use crate::restriction::is_eligible;
use crate::snapshot::AllocationSnapshot;
use crate::types::{AccountId, AssetClassId, Price, SecurityId, Shares, affordable, notional_floor};

/// A sell with its quantity already fixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SellLeg {
    pub security: SecurityId,
    pub asset_class: AssetClassId,
    pub quantity: Shares,
    pub price: Price,
    /// Proceeds (cents), rounded down.
    pub proceeds: i64,
}

/// Cash earmarked for buying one security.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyLeg {
    pub security: SecurityId,
    pub asset_class: AssetClassId,
    pub price: Price,
    pub min_increment: i64,
    /// Budget (cents).
    pub budget: i64,
    /// Equally eligible, unheld securities the user could choose instead.
    pub alternatives: Vec<SecurityId>,
}

/// Everything one account will do, before quantities are sized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountAllocation {
    pub account: AccountId,
    pub opening_cash: i64,
    pub sells: Vec<SellLeg>,
    /// In asset-class urgency order.
    pub buys: Vec<BuyLeg>,
}

impl AccountAllocation {
    pub fn proceeds(&self) -> i64 {
        self.sells.iter().map(|s| s.proceeds).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sells.is_empty() && self.buys.is_empty()
    }
}

/// Output of the cross-account pass.
#[derive(Clone, Debug, Default)]
pub struct Allocation {
    /// One entry per account, ascending account id.
    pub accounts: Vec<AccountAllocation>,
    /// Underweight classes no account with spare cash may hold. A class
    /// whose eligible accounts had cash, but spent it on more urgent
    /// classes, is not listed here.
    pub no_eligible_account: Vec<AssetClassId>,
}

/// Sequencing parameters.
#[derive(Clone, Copy, Debug)]
pub struct SequencerParams {
    pub threshold: f64,
    /// Legs below this amount (cents) are skipped.
    pub min_trade: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuyOutcome {
    Placed,
    /// Accounts that may hold the class had cash, but none is left.
    NoCash,
    NoEligibleAccount,
}

/// A holding the engine may sell: priced and eligible where it sits.
struct Sellable<'a> {
    holding: &'a Holding,
    security: &'a Security,
    price: Price,
    value: i64,
}

/// Allocate sells and buy budgets across accounts.
pub fn allocate(
    index: &PortfolioIndex<'_>,
    snapshot: &AllocationSnapshot,
    deviations: &[Deviation],
    params: SequencerParams,
) -> Allocation {
    let accounts = index.accounts();
    let mut allocs: Vec<AccountAllocation> = accounts
        .iter()
        .map(|a| AccountAllocation {
            account: a.id,
            opening_cash: a.cash,
            ..Default::default()
        })
        .collect();

    let under: FxHashSet<AssetClassId> = deviations
        .iter()
        .filter(|d| d.classification == Classification::Underweight)
        .map(|d| d.asset_class)
        .collect();

    // Once a gap is this small the class is no longer out of band.
    let band = tolerance_band(params.threshold, snapshot.total_value);

    for dev in deviations
        .iter()
        .filter(|d| d.classification == Classification::Overweight)
    {
        sell_down(index, dev, &under, band, params, &mut allocs);
    }

    // Cash pool per account: idle cash plus that account's own proceeds.
    let mut available: Vec<i64> = allocs
        .iter()
        .map(|a| a.opening_cash + a.proceeds())
        .collect();

    let pool = available.clone();

    let mut no_eligible_account = Vec::new();
    for dev in deviations
        .iter()
        .filter(|d| d.classification == Classification::Underweight)
    {
        match buy_up(index, dev, band, params, &pool, &mut allocs, &mut available) {
            BuyOutcome::Placed => {}
            BuyOutcome::NoCash => debug!("{}: eligible accounts have no cash left", dev.name),
            BuyOutcome::NoEligibleAccount => {
                debug!("{}: no eligible account", dev.name);
                no_eligible_account.push(dev.asset_class);
            }
        }
    }

    Allocation {
        accounts: allocs,
        no_eligible_account,
    }
}

fn sellable_in<'a>(
    index: &PortfolioIndex<'a>,
    account: &Account,
    asset_class: AssetClassId,
) -> Vec<Sellable<'a>> {
    index
        .holdings_of(account.id)
        .iter()
        .filter(|h| h.quantity.0 > 0)
        .filter_map(|&h| {
            let security = index.security(h.security)?;
            if security.asset_class != asset_class || !is_eligible(&security.restriction, account) {
                return None;
            }
            let price = security.price?;
            Some(Sellable {
                holding: h,
                security,
                price,
                value: notional_floor(h.quantity, price),
            })
        })
        .collect()
}

/// True if the account already holds an eligible security of an
/// underweight class, so it can reuse its own proceeds.
fn holds_buy_target(index: &PortfolioIndex<'_>, account: &Account, under: &FxHashSet<AssetClassId>) -> bool {
    index.holdings_of(account.id).iter().any(|h| {
        h.quantity.0 > 0
            && index.security(h.security).is_some_and(|s| {
                under.contains(&s.asset_class) && is_eligible(&s.restriction, account)
            })
    })
}

fn sell_down(
    index: &PortfolioIndex<'_>,
    dev: &Deviation,
    under: &FxHashSet<AssetClassId>,
    band: i64,
    params: SequencerParams,
    allocs: &mut [AccountAllocation],
) {
    struct Candidate<'a> {
        pos: usize,
        reuse: bool,
        rank: u8,
        held: i64,
        account: &'a Account,
        sellable: Vec<Sellable<'a>>,
    }

    let mut candidates: Vec<Candidate<'_>> = index
        .accounts()
        .iter()
        .enumerate()
        .filter_map(|(pos, &account)| {
            let sellable = sellable_in(index, account, dev.asset_class);
            let held: i64 = sellable.iter().map(|s| s.value).sum();
            (held > 0).then(|| Candidate {
                pos,
                reuse: holds_buy_target(index, account, under),
                rank: index.preference_rank(dev.asset_class, account),
                held,
                account,
                sellable,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.reuse
            .cmp(&a.reuse)
            .then(a.rank.cmp(&b.rank))
            .then(b.held.cmp(&a.held))
            .then(b.account.priority.cmp(&a.account.priority))
            .then(a.account.id.cmp(&b.account.id))
    });

    let mut remaining = dev.gap;
    for cand in candidates {
        if remaining <= band {
            break;
        }
        let take = remaining.min(cand.held);
        let full = take >= cand.held;

        for s in &cand.sellable {
            // Proportional split by current value.
            let share = if full {
                s.value
            } else {
                (s.value as i128 * take as i128 / cand.held as i128) as i64
            };
            let quantity = if share >= s.value {
                s.holding.quantity
            } else {
                affordable(share, s.price)
                    .truncate_to(s.security.min_increment)
                    .min(s.holding.quantity)
            };
            if quantity.is_zero() {
                continue;
            }
            let proceeds = notional_floor(quantity, s.price);
            if proceeds < params.min_trade {
                continue;
            }
            debug!(
                "{}: sell {} {} in {} for {} cents",
                dev.name, quantity, s.security.ticker, cand.account.id, proceeds
            );
            remaining -= proceeds;
            allocs[cand.pos].sells.push(SellLeg {
                security: s.security.id,
                asset_class: dev.asset_class,
                quantity,
                price: s.price,
                proceeds,
            });
        }
    }
}

fn buy_up(
    index: &PortfolioIndex<'_>,
    dev: &Deviation,
    band: i64,
    params: SequencerParams,
    pool: &[i64],
    allocs: &mut [AccountAllocation],
    available: &mut [i64],
) -> BuyOutcome {
    struct Candidate<'a> {
        pos: usize,
        rank: u8,
        existing: bool,
        account: &'a Account,
        /// (security, existing position value), best first
        options: Vec<(&'a Security, i64)>,
    }

    let class_securities: Vec<&Security> = index
        .securities_sorted()
        .into_iter()
        .filter(|s| s.asset_class == dev.asset_class && s.price.is_some())
        .collect();

    let mut candidates: Vec<Candidate<'_>> = index
        .accounts()
        .iter()
        .enumerate()
        .filter(|(pos, _)| pool[*pos] > 0)
        .filter_map(|(pos, &account)| {
            let held: FxHashMap<SecurityId, i64> = index
                .holdings_of(account.id)
                .iter()
                .filter_map(|h| Some((h.security, index.holding_value(h)?)))
                .collect();
            let mut options: Vec<(&Security, i64)> = class_securities
                .iter()
                .filter(|s| is_eligible(&s.restriction, account))
                .map(|s| (*s, held.get(&s.id).copied().unwrap_or(0)))
                .collect();
            if options.is_empty() {
                return None;
            }
            options.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
            Some(Candidate {
                pos,
                rank: index.preference_rank(dev.asset_class, account),
                existing: options[0].1 > 0,
                account,
                options,
            })
        })
        .collect();

    if candidates.is_empty() {
        return BuyOutcome::NoEligibleAccount;
    }
    candidates.retain(|c| available[c.pos] > 0);
    if candidates.is_empty() {
        return BuyOutcome::NoCash;
    }

    candidates.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then(b.existing.cmp(&a.existing))
            .then(available[b.pos].cmp(&available[a.pos]))
            .then(b.account.priority.cmp(&a.account.priority))
            .then(a.account.id.cmp(&b.account.id))
    });

    let mut remaining = dev.gap;
    for cand in candidates {
        if remaining <= band {
            break;
        }
        let budget = remaining.min(available[cand.pos]);
        if budget <= 0 || budget < params.min_trade {
            continue;
        }
        let (security, position) = cand.options[0];
        let alternatives = if position == 0 {
            cand.options[1..].iter().map(|(s, _)| s.id).collect()
        } else {
            Vec::new()
        };
        let Some(price) = security.price else {
            continue;
        };

        debug!(
            "{}: budget {} cents for {} in {}",
            dev.name, budget, security.ticker, cand.account.id
        );
        available[cand.pos] -= budget;
        remaining -= budget;
        allocs[cand.pos].buys.push(BuyLeg {
            security: security.id,
            asset_class: dev.asset_class,
            price,
            min_increment: security.min_increment,
            budget,
            alternatives,
        });
    }
    BuyOutcome::Placed
}
