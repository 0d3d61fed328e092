//! Portfolio input file (portfolio.json) loading and validation.
//!
//! Money is in integer cents, share quantities in 1/10 000-share units,
//! matching the engine's fixed-point types.

use std::path::Path;

use chrono::{DateTime, Utc};
use driftbook::PortfolioState;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A portfolio snapshot exported from the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioFile {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub state: PortfolioState,
}

impl PortfolioFile {
    /// Load and validate a portfolio.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::PortfolioRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: PortfolioFile = serde_json::from_str(json)?;
        file.validate()?;
        Ok(file)
    }

    /// Structural checks. Referential checks happen in the engine.
    fn validate(&self) -> Result<()> {
        if self.state.accounts.is_empty() {
            return Err(Error::Portfolio("no accounts".into()));
        }
        if self.state.targets.is_empty() {
            return Err(Error::Portfolio("targets list is empty".into()));
        }
        for s in &self.state.securities {
            if s.ticker.trim().is_empty() {
                return Err(Error::Portfolio(format!("security {} has an empty ticker", s.id)));
            }
        }
        Ok(())
    }
}
