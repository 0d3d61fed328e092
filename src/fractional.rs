//! Per-account trade sizing and the fractional final buy.
//!
//! Each [`AccountAllocation`] is turned into concrete trades using only that
//! account's own cash, so accounts can be sized in any order (or in parallel)
//! without changing the result.

use log::debug;

use crate::cost_model::CostModel;
use crate::model::PortfolioIndex;
use crate::plan::{AccountTrades, Side, Trade};
use crate::sequencer::AccountAllocation;
use crate::types::{Price, SHARE_SCALE, Shares, affordable, notional_ceil};

/// Largest quantity `cash` buys at `price`, truncated to `increment` units.
///
/// ```
/// use driftbook::{Price, Shares};
/// use driftbook::fractional::fractional_quantity;
///
/// // $103.47 at $50.00 with 0.0001-share increments
/// assert_eq!(fractional_quantity(103_47, Price(50_00), 1), Shares(20694));
/// ```
pub fn fractional_quantity(cash: i64, price: Price, increment: i64) -> Shares {
    affordable(cash, price).truncate_to(increment.max(1))
}

/// Whole-share quantity for `budget`, also respecting `increment`.
pub fn whole_quantity(budget: i64, price: Price, increment: i64) -> Shares {
    affordable(budget, price)
        .truncate_to(SHARE_SCALE)
        .truncate_to(increment.max(1))
}

/// Size one account's trades.
///
/// Sells come first and credit the account's cash. Every buy but the last
/// uses whole shares within its budget; the last buy is sized fractionally
/// from whatever budget is still unspent, so the whole-share rounding
/// residue of earlier buys lands there. Idle cash that was never budgeted
/// stays in the account. A buy that sizes to zero is dropped.
pub fn size_account(
    alloc: &AccountAllocation,
    index: &PortfolioIndex<'_>,
    cost_model: &CostModel,
    min_trade: i64,
) -> AccountTrades {
    let ticker = |id| {
        index
            .security(id)
            .map(|s| s.ticker.clone())
            .unwrap_or_default()
    };

    let mut trades = Vec::with_capacity(alloc.sells.len() + alloc.buys.len());
    let mut cash = alloc.opening_cash;

    for leg in &alloc.sells {
        cash += leg.proceeds;
        trades.push(Trade {
            sequence: 0,
            account: alloc.account,
            security: leg.security,
            ticker: ticker(leg.security),
            asset_class: leg.asset_class,
            side: Side::Sell,
            quantity: leg.quantity,
            price: leg.price,
            amount: leg.proceeds,
            is_final: false,
            alternatives: Vec::new(),
            est_cost: cost_model.estimate(leg.proceeds),
        });
    }

    let mut unspent: i64 = alloc.buys.iter().map(|b| b.budget).sum();
    let last = alloc.buys.len().saturating_sub(1);
    for (i, leg) in alloc.buys.iter().enumerate() {
        let is_final = i == last;
        let quantity = if is_final {
            fractional_quantity(unspent.min(cash), leg.price, leg.min_increment)
        } else {
            whole_quantity(leg.budget.min(cash), leg.price, leg.min_increment)
        };
        let amount = notional_ceil(quantity, leg.price);
        if quantity.is_zero() || amount > cash || (!is_final && amount < min_trade) {
            debug!(
                "{}: dropping buy of {} (quantity {}, cash {})",
                alloc.account, leg.security, quantity, cash
            );
            continue;
        }
        cash -= amount;
        unspent -= amount;
        trades.push(Trade {
            sequence: 0,
            account: alloc.account,
            security: leg.security,
            ticker: ticker(leg.security),
            asset_class: leg.asset_class,
            side: Side::Buy,
            quantity,
            price: leg.price,
            amount,
            is_final,
            alternatives: leg.alternatives.clone(),
            est_cost: cost_model.estimate(amount),
        });
    }

    AccountTrades {
        account: alloc.account,
        opening_cash: alloc.opening_cash,
        trades,
    }
}

/// Size every account, preserving account order.
#[cfg(not(feature = "parallel"))]
pub fn size_all(
    allocs: &[AccountAllocation],
    index: &PortfolioIndex<'_>,
    cost_model: &CostModel,
    min_trade: i64,
) -> Vec<AccountTrades> {
    allocs
        .iter()
        .filter(|a| !a.is_empty())
        .map(|a| size_account(a, index, cost_model, min_trade))
        .collect()
}

/// Size every account on the rayon pool, preserving account order.
#[cfg(feature = "parallel")]
pub fn size_all(
    allocs: &[AccountAllocation],
    index: &PortfolioIndex<'_>,
    cost_model: &CostModel,
    min_trade: i64,
) -> Vec<AccountTrades> {
    use rayon::prelude::*;

    allocs
        .par_iter()
        .filter(|a| !a.is_empty())
        .map(|a| size_account(a, index, cost_model, min_trade))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::sequencer::{BuyLeg, SellLeg};
    use crate::types::*;

    fn state() -> PortfolioState {
        PortfolioState {
            accounts: vec![Account {
                id: AccountId(1),
                name: "Main".into(),
                tax_status: TaxStatus::NonRegistered,
                kind: String::new(),
                cash: 0,
                priority: 0,
                currency: None,
            }],
            asset_classes: vec![AssetClass {
                id: AssetClassId(1),
                name: "Bonds".into(),
            }],
            securities: vec![
                Security::new(SecurityId(1), "BND", AssetClassId(1), Price(50_00)),
                Security::new(SecurityId(2), "AGG", AssetClassId(1), Price(30_00)),
            ],
            holdings: vec![],
            targets: vec![AllocationTarget::new(AssetClassId(1), 1.0)],
        }
    }

    fn buy(security: u64, price: i64, budget: i64) -> BuyLeg {
        BuyLeg {
            security: SecurityId(security),
            asset_class: AssetClassId(1),
            price: Price(price),
            min_increment: 1,
            budget,
            alternatives: vec![],
        }
    }

    #[test]
    fn fractional_example() {
        let q = fractional_quantity(103_47, Price(50_00), 1);
        assert_eq!(q, Shares(20694));
        assert_eq!(notional_ceil(q, Price(50_00)), 103_47);
    }

    #[test]
    fn fractional_respects_increment() {
        // 0.01-share increments
        assert_eq!(fractional_quantity(103_47, Price(50_00), 100), Shares(20600));
        // Whole shares only
        assert_eq!(
            fractional_quantity(103_47, Price(50_00), SHARE_SCALE),
            Shares::whole(2)
        );
    }

    #[test]
    fn whole_quantity_rounds_down() {
        assert_eq!(whole_quantity(149_99, Price(50_00), 1), Shares::whole(2));
        assert_eq!(whole_quantity(49_99, Price(50_00), 1), Shares::ZERO);
    }

    #[test]
    fn final_buy_uses_all_remaining_budget() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 103_47,
            sells: vec![],
            buys: vec![buy(1, 50_00, 103_47)],
        };
        let out = size_account(&alloc, &index, &CostModel::zero(), 0);
        assert_eq!(out.trades.len(), 1);
        let t = &out.trades[0];
        assert!(t.is_final);
        assert_eq!(t.quantity, Shares(20694));
        assert_eq!(out.closing_cash(), 0);
    }

    #[test]
    fn unbudgeted_idle_cash_is_not_spent() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 1_000_000_00,
            sells: vec![],
            buys: vec![buy(1, 50_00, 100_00)],
        };
        let out = size_account(&alloc, &index, &CostModel::zero(), 0);
        assert_eq!(out.trades[0].quantity, Shares::whole(2));
        assert_eq!(out.trades[0].amount, 100_00);
        assert_eq!(out.closing_cash(), 1_000_000_00 - 100_00);
    }

    #[test]
    fn whole_share_residue_flows_into_final_buy() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 500_00,
            sells: vec![],
            buys: vec![buy(1, 50_00, 140_00), buy(2, 30_00, 60_00)],
        };
        let out = size_account(&alloc, &index, &CostModel::zero(), 0);
        // $140 at $50 → 2 whole shares, $40 left over from that budget
        assert_eq!(out.trades[0].quantity, Shares::whole(2));
        // $60 + $40 residue at $30 → 3.3333 shares
        assert_eq!(out.trades[1].quantity, Shares(33333));
        assert_eq!(out.trades[1].amount, 100_00);
        assert_eq!(out.closing_cash(), 300_00);
    }

    #[test]
    fn earlier_buys_whole_final_fractional() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 0,
            sells: vec![SellLeg {
                security: SecurityId(2),
                asset_class: AssetClassId(1),
                quantity: Shares::whole(10),
                price: Price(30_00),
                proceeds: 300_00,
            }],
            buys: vec![buy(1, 50_00, 120_00), buy(2, 30_00, 180_00)],
        };
        let out = size_account(&alloc, &index, &CostModel::zero(), 0);
        assert_eq!(out.trades[0].side, Side::Sell);
        // $120 budget at $50 → 2 whole shares
        assert_eq!(out.trades[1].quantity, Shares::whole(2));
        assert!(!out.trades[1].is_final);
        // Remaining $200 at $30 → 6.6666 shares
        assert_eq!(out.trades[2].quantity, Shares(66666));
        assert!(out.trades[2].is_final);
        assert!(out.closing_cash() >= 0);
        assert!(out.closing_cash() < 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_sizing_matches_sequential() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let allocs: Vec<AccountAllocation> = (1..=16u64)
            .map(|id| {
                let cash = (id as i64 * 7_919_13) % 2_500_00;
                AccountAllocation {
                    account: AccountId(id),
                    opening_cash: cash,
                    sells: vec![],
                    buys: if id % 5 == 0 {
                        vec![]
                    } else {
                        vec![buy(1, 50_00, cash / 2), buy(2, 30_00, cash / 2)]
                    },
                }
            })
            .collect();

        let sequential: Vec<AccountTrades> = allocs
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| size_account(a, &index, &CostModel::zero(), 0))
            .collect();
        assert_eq!(size_all(&allocs, &index, &CostModel::zero(), 0), sequential);
    }

    #[test]
    fn zero_sized_final_buy_dropped() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 0,
            sells: vec![],
            buys: vec![buy(1, 50_00, 0)],
        };
        let out = size_account(&alloc, &index, &CostModel::zero(), 0);
        assert!(out.trades.is_empty());
    }

    #[test]
    fn cost_estimates_attached() {
        let s = state();
        let index = PortfolioIndex::build(&s, 1e-4).unwrap();
        let alloc = AccountAllocation {
            account: AccountId(1),
            opening_cash: 1_000_00,
            sells: vec![],
            buys: vec![buy(1, 50_00, 1_000_00)],
        };
        let model = CostModel {
            commission_bps: 0,
            slippage_bps: 0,
            min_trade_fee: 9_99,
        };
        let out = size_account(&alloc, &index, &model, 0);
        assert_eq!(out.trades[0].est_cost, 9_99);
    }
}
