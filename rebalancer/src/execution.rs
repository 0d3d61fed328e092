//! Run orchestrator: load → price → convert → plan → check → export.
//!
//! This is the main workflow that ties together all components.

use std::path::{Path, PathBuf};

use driftbook::{DeviationTable, EngineConfig, PortfolioIndex, RebalanceOutcome, rebalance};
use log::{info, warn};

use crate::audit::{self, AuditLog};
use crate::checks::{self, CheckReport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fx::{self, ConversionSummary, ExchangeRates};
use crate::portfolio::PortfolioFile;
use crate::prices::{self, PriceSummary, QuoteFile};

/// Options for a plan run.
pub struct RunOptions {
    pub portfolio_file: PathBuf,
    pub quotes_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Overwrite `output` without asking.
    pub force: bool,
}

/// Everything a plan run produced, for callers that want more than stdout.
pub struct RunReport {
    pub outcome: RebalanceOutcome,
    pub checks: CheckReport,
    pub prices: Option<PriceSummary>,
    pub conversion: ConversionSummary,
    pub exported: Option<PathBuf>,
}

/// A portfolio ready for the engine: quoted, and in the base currency.
pub struct Prepared {
    pub portfolio: PortfolioFile,
    pub prices: Option<PriceSummary>,
    pub conversion: ConversionSummary,
}

/// Load the portfolio, apply quotes if any, then restate foreign prices
/// and cash in the configured base currency.
pub fn prepare_portfolio(
    config: &Config,
    portfolio_file: &Path,
    quotes_file: Option<&Path>,
) -> Result<Prepared> {
    let mut portfolio = PortfolioFile::load(portfolio_file)?;
    let prices = match quotes_file {
        Some(path) => {
            let quotes = QuoteFile::load(path)?;
            info!("Loaded {} quotes from {}", quotes.len(), path.display());
            Some(prices::resolve_prices(&mut portfolio.state, &quotes))
        }
        None => None,
    };
    let rates = ExchangeRates::from_config(&config.currency);
    let conversion = fx::convert_to_base(&mut portfolio.state, &rates)?;
    Ok(Prepared {
        portfolio,
        prices,
        conversion,
    })
}

/// Execute a full plan run.
pub fn run_plan(config: &Config, opts: &RunOptions) -> Result<RunReport> {
    let mut audit = AuditLog::open(&config.audit_path())?;

    let Prepared {
        portfolio,
        prices: price_summary,
        conversion,
    } = prepare_portfolio(config, &opts.portfolio_file, opts.quotes_file.as_deref())?;
    audit::log_run_started(
        &mut audit,
        &opts.portfolio_file.display().to_string(),
        portfolio.timestamp,
    )?;
    if let Some(summary) = &price_summary {
        audit::log_prices(&mut audit, summary)?;
        if !summary.failed.is_empty() {
            warn!("Unpriced: {}", summary.failed.join(", "));
        }
    }
    if !conversion.is_empty() {
        audit::log_conversion(&mut audit, &conversion)?;
    }

    let engine = config.engine_config();
    let outcome = rebalance(&portfolio.state, &engine)?;
    audit::log_snapshot(&mut audit, &outcome.snapshot)?;

    print!("{}", outcome.snapshot);
    println!();
    print!("{}", DeviationTable(&outcome.deviations));
    println!();

    audit::log_plan(&mut audit, &outcome)?;
    print!("{}", outcome.plan);
    println!();
    if !outcome.plan.is_empty() {
        print!("{}", outcome.projection);
        println!();
    }
    print!("{}", outcome.status);
    println!();

    let report = checks::check_plan(&portfolio.state, &outcome, &config.checks);
    print!("{report}");
    audit::log_checks(&mut audit, &report)?;

    if report.has_failures() {
        return Err(Error::CheckFailed(
            "one or more plan checks failed; plan not exported".into(),
        ));
    }

    let exported = match &opts.output {
        Some(path) if !outcome.plan.is_empty() => {
            if path.exists() && !opts.force && !confirm_overwrite(path)? {
                return Err(Error::Aborted(format!(
                    "{} exists; not overwritten",
                    path.display()
                )));
            }
            outcome.plan.save(path)?;
            audit::log_exported(&mut audit, path, outcome.plan.len())?;
            println!("\nPlan written to {}", path.display());
            Some(path.clone())
        }
        Some(_) => {
            println!("\nNothing to export.");
            None
        }
        None => None,
    };

    audit::log_run_completed(&mut audit, outcome.plan.len(), outcome.status.is_full())?;
    info!("Audit logged to {}", config.audit_path().display());

    Ok(RunReport {
        outcome,
        checks: report,
        prices: price_summary,
        conversion,
        exported,
    })
}

/// Print the current allocation and deviations without planning trades.
pub fn show_allocation(
    config: &Config,
    portfolio_file: &Path,
    quotes_file: Option<&Path>,
) -> Result<()> {
    let Prepared { portfolio, .. } = prepare_portfolio(config, portfolio_file, quotes_file)?;
    let engine: EngineConfig = config.engine_config();
    engine.validate()?;

    let index = PortfolioIndex::build(&portfolio.state, engine.weight_tolerance)?;
    let snapshot = driftbook::AllocationSnapshot::build(&index)?;
    let deviations = driftbook::compute_deviations(&index, &snapshot, engine.threshold);

    println!("As of {}\n", portfolio.timestamp.format("%Y-%m-%d %H:%M UTC"));
    print!("{snapshot}");
    println!();
    print!("{}", DeviationTable(&deviations));
    Ok(())
}

// === Helpers ===

fn confirm_overwrite(path: &Path) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(format!("{} exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))
}
