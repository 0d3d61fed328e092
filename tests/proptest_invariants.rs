// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! Property-based tests for trade plan invariants.
//!
//! Portfolios are generated from a seed with a small deterministic PRNG, so
//! a failing case is reproducible from the seed proptest reports.

use driftbook::*;
use proptest::prelude::*;
use rustc_hash::FxHashMap;

/// xorshift64
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed | 1)
    }

    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const KINDS: [&str; 3] = ["RRSP", "TFSA", "Margin"];
const INCREMENTS: [i64; 3] = [1, 100, SHARE_SCALE];

/// Up to 4 accounts, 3 asset classes, 2 securities per class.
fn portfolio(seed: u64) -> PortfolioState {
    let mut rng = Rng::new(seed);
    let n_accounts = 1 + rng.below(4);

    let accounts: Vec<Account> = (1..=n_accounts)
        .map(|id| Account {
            id: AccountId(id),
            name: format!("Account {id}"),
            tax_status: if rng.below(2) == 0 {
                TaxStatus::Registered
            } else {
                TaxStatus::NonRegistered
            },
            kind: KINDS[rng.below(3) as usize].to_string(),
            cash: if rng.below(2) == 0 {
                0
            } else {
                rng.below(20_000_00) as i64
            },
            priority: rng.below(3) as i32,
            currency: None,
        })
        .collect();

    let asset_classes: Vec<AssetClass> = (1..=3)
        .map(|id| AssetClass {
            id: AssetClassId(id),
            name: format!("Class {id}"),
        })
        .collect();

    let securities: Vec<Security> = (1..=6u64)
        .map(|id| {
            let class = AssetClassId((id - 1) / 2 + 1);
            let price = Price(1_00 + rng.below(500_00) as i64);
            let restriction = match rng.below(4) {
                0 | 1 => Restriction::Unrestricted,
                2 => Restriction::allow([AccountId(1 + rng.below(n_accounts))]),
                _ => Restriction::preference(AccountPredicate::Registered),
            };
            Security::new(SecurityId(id), &format!("SEC{id}"), class, price)
                .with_increment(INCREMENTS[rng.below(3) as usize])
                .with_restriction(restriction)
        })
        .collect();

    let mut holdings = Vec::new();
    for a in 1..=n_accounts {
        for s in 1..=6u64 {
            if (a, s) == (1, 1) || rng.below(3) == 0 {
                let units = SHARE_SCALE + rng.below(500) as i64 * SHARE_SCALE
                    + rng.below(SHARE_SCALE as u64) as i64;
                holdings.push(Holding {
                    account: AccountId(a),
                    security: SecurityId(s),
                    quantity: Shares(units),
                });
            }
        }
    }

    let raw: Vec<f64> = (0..3).map(|_| (1 + rng.below(100)) as f64).collect();
    let sum: f64 = raw.iter().sum();
    let targets = raw
        .iter()
        .enumerate()
        .map(|(i, w)| AllocationTarget::new(AssetClassId(i as u64 + 1), w / sum))
        .collect();

    PortfolioState {
        accounts,
        asset_classes,
        securities,
        holdings,
        targets,
    }
}

fn threshold_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(0.005), Just(0.02), Just(0.1)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // ELIGIBILITY
    // ========================================================================

    /// Every trade's account may hold its security.
    #[test]
    fn trades_respect_restrictions(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let out = rebalance(&state, &config).unwrap();

        for t in out.plan.trades() {
            let account = state.accounts.iter().find(|a| a.id == t.account).unwrap();
            let security = state.securities.iter().find(|s| s.id == t.security).unwrap();
            prop_assert!(is_eligible(&security.restriction, account),
                "trade #{} puts {} in {}", t.sequence, t.ticker, t.account);
            for alt in &t.alternatives {
                let alt = state.securities.iter().find(|s| s.id == *alt).unwrap();
                prop_assert!(is_eligible(&alt.restriction, account));
                prop_assert_eq!(alt.asset_class, t.asset_class);
            }
        }
    }

    // ========================================================================
    // ORDERING
    // ========================================================================

    /// Sells precede buys in each group; groups ascend by account; sequence is 1..n.
    #[test]
    fn plan_ordering(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let out = rebalance(&state, &config).unwrap();

        for g in &out.plan.groups {
            let first_buy = g.trades.iter().position(|t| t.side == Side::Buy);
            if let Some(i) = first_buy {
                prop_assert!(g.trades[i..].iter().all(|t| t.side == Side::Buy));
            }
            prop_assert!(g.trades.iter().all(|t| t.account == g.account));
        }
        prop_assert!(out.plan.groups.windows(2).all(|w| w[0].account < w[1].account));
        for (n, t) in out.plan.trades().enumerate() {
            prop_assert_eq!(t.sequence, n + 1);
        }
    }

    /// At most one final buy per account, and it is the account's last trade.
    #[test]
    fn final_buy_is_last(seed in any::<u64>()) {
        let state = portfolio(seed);
        let out = rebalance(&state, &EngineConfig::default()).unwrap();

        for g in &out.plan.groups {
            let finals: Vec<usize> = g.trades.iter()
                .enumerate()
                .filter(|(_, t)| t.is_final)
                .map(|(i, _)| i)
                .collect();
            prop_assert!(finals.len() <= 1);
            if let Some(&i) = finals.first() {
                prop_assert_eq!(i, g.trades.len() - 1);
                prop_assert_eq!(g.trades[i].side, Side::Buy);
            }
        }
    }

    // ========================================================================
    // CASH AND QUANTITY CONSERVATION
    // ========================================================================

    /// Per account, buys never spend more than idle cash plus sell proceeds,
    /// and running cash never dips below zero.
    #[test]
    fn cash_never_negative(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let out = rebalance(&state, &config).unwrap();

        for g in &out.plan.groups {
            let account = state.accounts.iter().find(|a| a.id == g.account).unwrap();
            prop_assert_eq!(g.opening_cash, account.cash);
            prop_assert!(g.spent() <= g.opening_cash + g.proceeds());

            let mut cash = g.opening_cash;
            for t in &g.trades {
                match t.side {
                    Side::Sell => cash += t.amount,
                    Side::Buy => cash -= t.amount,
                }
                prop_assert!(cash >= 0);
            }
            prop_assert_eq!(cash, g.closing_cash());
        }
    }

    /// Sells never exceed the position; quantities respect the increment
    /// unless a whole position is sold out.
    #[test]
    fn quantities_are_valid(seed in any::<u64>()) {
        let state = portfolio(seed);
        let out = rebalance(&state, &EngineConfig::default()).unwrap();

        let held: FxHashMap<(AccountId, SecurityId), Shares> = state.holdings.iter()
            .map(|h| ((h.account, h.security), h.quantity))
            .collect();

        for t in out.plan.trades() {
            prop_assert!(t.quantity > Shares::ZERO);
            let security = state.securities.iter().find(|s| s.id == t.security).unwrap();
            match t.side {
                Side::Sell => {
                    let position = held.get(&(t.account, t.security)).copied().unwrap_or_default();
                    prop_assert!(t.quantity <= position);
                    prop_assert!(t.quantity == position || t.quantity.0 % security.min_increment == 0);
                    prop_assert_eq!(t.amount, notional_floor(t.quantity, t.price));
                }
                Side::Buy => {
                    prop_assert_eq!(t.quantity.0 % security.min_increment, 0);
                    prop_assert_eq!(t.amount, notional_ceil(t.quantity, t.price));
                    if !t.is_final {
                        prop_assert_eq!(t.quantity.0 % SHARE_SCALE, 0);
                    }
                }
            }
        }
    }

    // ========================================================================
    // DIRECTION
    // ========================================================================

    /// Buys never spend more than the underweight gaps they were budgeted
    /// against, no matter how much idle cash the accounts hold.
    #[test]
    fn plan_does_not_overshoot(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let out = rebalance(&state, &config).unwrap();

        let under_gap: i64 = out.deviations.iter()
            .filter(|d| d.classification == Classification::Underweight)
            .map(|d| d.gap)
            .sum();
        let bought: i64 = out.plan.trades()
            .filter(|t| t.side == Side::Buy)
            .map(|t| t.amount)
            .sum();
        prop_assert!(bought <= under_gap, "bought {} against gaps of {}", bought, under_gap);

        for t in out.plan.trades().filter(|t| t.side == Side::Buy) {
            let d = out.deviations.iter().find(|d| d.asset_class == t.asset_class).unwrap();
            prop_assert_eq!(d.classification, Classification::Underweight);
        }
    }

    /// A class within the band before the plan is never reported unresolved,
    /// and a full rebalance leaves every deviating class inside the band.
    #[test]
    fn full_rebalance_is_in_band(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let out = rebalance(&state, &config).unwrap();

        if out.status.is_full() {
            for d in out.deviations.iter().filter(|d| d.is_deviating()) {
                let after = out.projection.get(d.asset_class).unwrap();
                prop_assert_eq!(after.classification, Classification::Balanced,
                    "{} left at {:.4} against {:.4}", d.name, after.projected_weight, d.target_weight);
            }
        }
    }

    // ========================================================================
    // DETERMINISM
    // ========================================================================

    /// Identical input → identical outcome.
    #[test]
    fn deterministic(seed in any::<u64>(), threshold in threshold_strategy()) {
        let state = portfolio(seed);
        let config = EngineConfig { threshold, ..Default::default() };
        let a = rebalance(&state, &config).unwrap();
        let b = rebalance(&state, &config).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Unresolved classes were deviating before the plan.
    #[test]
    fn unresolved_were_deviating(seed in any::<u64>()) {
        let state = portfolio(seed);
        let out = rebalance(&state, &EngineConfig::default()).unwrap();
        for u in out.status.unresolved() {
            let d = out.deviations.iter().find(|d| d.asset_class == u.asset_class).unwrap();
            prop_assert!(d.is_deviating());
        }
    }
}
