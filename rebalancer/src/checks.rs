//! Pre-export plan checks.
//!
//! Re-validates an engine plan against the portfolio before it is shown
//! as actionable or written to disk.

use driftbook::{PortfolioState, RebalanceOutcome, Side, is_eligible};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::ChecksConfig;

/// Result of running all plan checks.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub checks: Vec<PlanCheck>,
}

/// A single check result.
#[derive(Debug, Clone, Serialize)]
pub struct PlanCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

/// Whether a check passed, warned, or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl CheckReport {
    /// True if any check failed (not just warned).
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// True if any check warned.
    pub fn has_warnings(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Warn)
    }

    pub fn get(&self, name: &str) -> Option<&PlanCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PLAN CHECKS:")?;
        for check in &self.checks {
            writeln!(f, "  [{}] {}: {}", check.status, check.name, check.detail)?;
        }
        Ok(())
    }
}

fn pass_fail(ok: bool) -> CheckStatus {
    if ok { CheckStatus::Pass } else { CheckStatus::Fail }
}

/// Run all plan checks.
pub fn check_plan(
    state: &PortfolioState,
    outcome: &RebalanceOutcome,
    config: &ChecksConfig,
) -> CheckReport {
    let plan = &outcome.plan;
    let accounts: FxHashMap<_, _> = state.accounts.iter().map(|a| (a.id, a)).collect();
    let securities: FxHashMap<_, _> = state.securities.iter().map(|s| (s.id, s)).collect();

    let mut checks = Vec::new();

    // 1. Every trade sits in an account allowed to hold its security
    let ineligible: Vec<String> = plan
        .trades()
        .filter(|t| {
            match (accounts.get(&t.account), securities.get(&t.security)) {
                (Some(a), Some(s)) => !is_eligible(&s.restriction, a),
                _ => true,
            }
        })
        .map(|t| format!("#{} {} in {}", t.sequence, t.ticker, t.account))
        .collect();
    checks.push(PlanCheck {
        name: "Eligibility",
        status: pass_fail(ineligible.is_empty()),
        detail: if ineligible.is_empty() {
            format!("{} trades in eligible accounts", plan.len())
        } else {
            format!("ineligible: {}", ineligible.join(", "))
        },
    });

    // 2. Sells precede buys in every account group
    let misordered: Vec<String> = plan
        .groups
        .iter()
        .filter(|g| {
            g.trades
                .windows(2)
                .any(|w| w[0].side == Side::Buy && w[1].side == Side::Sell)
        })
        .map(|g| g.account.to_string())
        .collect();
    checks.push(PlanCheck {
        name: "Ordering",
        status: pass_fail(misordered.is_empty()),
        detail: if misordered.is_empty() {
            "sells before buys in every account".into()
        } else {
            format!("buy before sell in {}", misordered.join(", "))
        },
    });

    // 3. Running cash never negative
    let mut worst: Option<(String, i64)> = None;
    for group in &plan.groups {
        let mut cash = group.opening_cash;
        for t in &group.trades {
            match t.side {
                Side::Sell => cash += t.amount,
                Side::Buy => cash -= t.amount,
            }
            if cash < 0 && worst.as_ref().is_none_or(|(_, c)| cash < *c) {
                worst = Some((group.account.to_string(), cash));
            }
        }
    }
    checks.push(PlanCheck {
        name: "Cash",
        status: pass_fail(worst.is_none()),
        detail: match &worst {
            None => "no account goes below zero".into(),
            Some((account, cash)) => format!(
                "{account} reaches ${:.2}",
                *cash as f64 / 100.0
            ),
        },
    });

    // 4. Sequence numbers 1..n
    let contiguous = plan.trades().zip(1..).all(|(t, n)| t.sequence == n);
    checks.push(PlanCheck {
        name: "Sequence",
        status: pass_fail(contiguous),
        detail: if contiguous {
            format!("1..{}", plan.len())
        } else {
            "sequence numbers not contiguous".into()
        },
    });

    // 5. Plan size
    let max = config.max_trades_per_plan;
    checks.push(PlanCheck {
        name: "Plan size",
        status: pass_fail(plan.len() <= max),
        detail: format!("{} trades, limit {max}", plan.len()),
    });

    // 6. Buys that need the user to choose a security
    let selections = plan.trades().filter(|t| t.requires_selection()).count();
    checks.push(PlanCheck {
        name: "Selection",
        status: if selections == 0 {
            CheckStatus::Pass
        } else {
            CheckStatus::Warn
        },
        detail: if selections == 0 {
            "no security choices pending".into()
        } else {
            format!("{selections} buy(s) have alternative securities")
        },
    });

    // 7. Full vs partial rebalance
    let unresolved = outcome.status.unresolved();
    checks.push(PlanCheck {
        name: "Coverage",
        status: if unresolved.is_empty() {
            CheckStatus::Pass
        } else {
            CheckStatus::Warn
        },
        detail: if unresolved.is_empty() {
            format!(
                "tracking error {:.3}% after plan",
                outcome.projection.tracking_error_pct
            )
        } else {
            let names: Vec<String> = unresolved
                .iter()
                .map(|u| format!("{} ({})", u.name, u.reason))
                .collect();
            format!("unresolved: {}", names.join(", "))
        },
    });

    CheckReport { checks }
}
