//! Trade plan export via JSON Lines.
//!
//! One trade per line, in plan order, so a plan can be streamed into a
//! broker ticket or diffed between runs.
//!
//! # Usage
//!
//! ```ignore
//! use driftbook::{rebalance, EngineConfig};
//! use std::path::Path;
//!
//! let outcome = rebalance(&state, &EngineConfig::default())?;
//! outcome.plan.save(Path::new("plan.jsonl"))?;
//!
//! let trades = driftbook::persistence::load_trades(Path::new("plan.jsonl"))?;
//! ```

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::plan::{Trade, TradePlan};

/// Save trades to a file in JSON Lines format.
pub fn save_trades<'a>(trades: impl IntoIterator<Item = &'a Trade>, path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);

    for trade in trades {
        let json = serde_json::to_string(trade).map_err(io::Error::other)?;
        writeln!(writer, "{json}")?;
    }

    writer.flush()?;
    Ok(())
}

/// Load trades from a JSON Lines file. Empty lines are skipped.
pub fn load_trades(path: &Path) -> io::Result<Vec<Trade>> {
    let file = std::fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let mut trades = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let trade: Trade = serde_json::from_str(line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", line_num + 1, e),
            )
        })?;
        trades.push(trade);
    }

    Ok(trades)
}

impl TradePlan {
    /// Write every trade in plan order. Requires the `persistence` feature.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_trades(self.trades(), path)
    }
}
