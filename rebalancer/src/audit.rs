//! Append-only JSONL audit trail.
//!
//! Every event of one `plan` run carries the same run id, so runs can be
//! pulled back out of a shared audit.jsonl with a simple filter.

use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use driftbook::{AllocationSnapshot, RebalanceOutcome};
use serde::Serialize;

use crate::checks::CheckReport;
use crate::error::Result;
use crate::fx::ConversionSummary;
use crate::prices::PriceSummary;

/// One line of the trail. `data` fields are flattened into the line.
#[derive(Debug, Serialize)]
struct Entry<'a> {
    run: &'a str,
    event: &'static str,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    data: serde_json::Value,
}

/// Audit trail for a single run.
pub struct AuditLog {
    run_id: String,
    out: BufWriter<File>,
}

impl AuditLog {
    /// Append to `path`, creating it and its directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            run_id: Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string(),
            out: BufWriter::new(file),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Write one event and flush, so a crash never loses earlier events.
    pub fn record(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let line = serde_json::to_string(&Entry {
            run: &self.run_id,
            event,
            ts: Utc::now(),
            data,
        })?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn log_run_started(
    audit: &mut AuditLog,
    portfolio_file: &str,
    as_of: DateTime<Utc>,
) -> Result<()> {
    audit.record(
        "run_started",
        serde_json::json!({
            "portfolio_file": portfolio_file,
            "as_of": as_of,
        }),
    )
}

pub fn log_prices(audit: &mut AuditLog, summary: &PriceSummary) -> Result<()> {
    audit.record("prices_resolved", serde_json::to_value(summary)?)
}

pub fn log_conversion(audit: &mut AuditLog, summary: &ConversionSummary) -> Result<()> {
    audit.record("currency_converted", serde_json::to_value(summary)?)
}

pub fn log_snapshot(audit: &mut AuditLog, snapshot: &AllocationSnapshot) -> Result<()> {
    let classes: Vec<_> = snapshot
        .classes
        .iter()
        .map(|c| {
            serde_json::json!({
                "class": c.name,
                "value": c.value as f64 / 100.0,
                "weight": c.weight,
            })
        })
        .collect();

    audit.record(
        "snapshot_built",
        serde_json::json!({
            "total": snapshot.total_value as f64 / 100.0,
            "classes": classes,
            "excluded_holdings": snapshot.excluded_holdings,
        }),
    )
}

pub fn log_plan(audit: &mut AuditLog, outcome: &RebalanceOutcome) -> Result<()> {
    let trades: Vec<_> = outcome
        .plan
        .trades()
        .map(|t| {
            serde_json::json!({
                "seq": t.sequence,
                "account": t.account,
                "side": t.side.to_string(),
                "ticker": t.ticker,
                "qty": t.quantity.to_string(),
                "amount": t.amount as f64 / 100.0,
                "final": t.is_final,
            })
        })
        .collect();

    audit.record(
        "plan_generated",
        serde_json::json!({
            "trades": trades,
            "full": outcome.status.is_full(),
            "unresolved": outcome.status.unresolved(),
            "tracking_error_pct": outcome.projection.tracking_error_pct,
        }),
    )
}

/// Check results as serialized by [`CheckReport`], plus an overall verdict.
pub fn log_checks(audit: &mut AuditLog, report: &CheckReport) -> Result<()> {
    audit.record(
        "plan_checks",
        serde_json::json!({
            "passed": !report.has_failures(),
            "warnings": report.has_warnings(),
            "checks": report.checks,
        }),
    )
}

pub fn log_exported(audit: &mut AuditLog, path: &Path, trades: usize) -> Result<()> {
    audit.record(
        "plan_exported",
        serde_json::json!({
            "path": path.display().to_string(),
            "trades": trades,
        }),
    )
}

pub fn log_run_completed(audit: &mut AuditLog, trades: usize, full: bool) -> Result<()> {
    audit.record(
        "run_completed",
        serde_json::json!({
            "trades": trades,
            "full": full,
        }),
    )
}
