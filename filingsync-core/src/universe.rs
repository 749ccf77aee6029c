//! Identifier universe: named groups of tickers.
//!
//! Stored as TOML, one array per group:
//!
//! ```toml
//! [groups]
//! djia = ["AAPL", "AMGN", "..."]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_GROUP: &str = "djia";

/// Dow Jones Industrial Average constituents since 2009, adds and drops included.
const DJIA_SINCE_2009: &[&str] = &[
    "AAPL", "AMGN", "AMZN", "AXP", "BA", "CAT", "CRM", "CSCO", "CVX", "DIS", "GS", "HD", "HON",
    "IBM", "JNJ", "JPM", "KO", "MCD", "MMM", "MRK", "MSFT", "NKE", "PG", "TRV", "UNH", "V", "VZ",
    "WMT", "SHW", "NVDA", "INTC", "DOW", "GE", "T", "HPQ", "BAC", "AA", "XOM", "PFE", "RTX",
];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every identifier across all groups, first occurrence wins.
    pub fn all_identifiers(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.groups
            .values()
            .flatten()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn group(&self, name: &str) -> Result<&[String], UniverseError> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| UniverseError::UnknownGroup(name.to_string()))
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn identifier_count(&self) -> usize {
        self.all_identifiers().len()
    }

    /// The built-in DJIA universe.
    pub fn djia() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(
            DEFAULT_GROUP.to_string(),
            DJIA_SINCE_2009.iter().map(|s| s.to_string()).collect(),
        );
        Self { groups }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::djia()
    }
}
