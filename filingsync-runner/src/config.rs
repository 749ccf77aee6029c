//! Reconciliation run configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is a valid
//! config. Values are passed explicitly into the orchestrator and providers.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use filingsync_core::calendar::BusinessCalendar;
use filingsync_core::data::{FactRequest, FetchSettings};
use filingsync_core::domain::FormType;
use filingsync_core::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content-addressable run identifier (BLAKE3 hex of the serialized config).
pub type RunId = String;

/// First year with EDGAR electronic filings.
pub const EARLIEST_START_YEAR: i32 = 1994;

const MAX_WORKERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Facts filed before January 1 of this year are ignored.
    pub start_year: i32,
    /// Contact string sent to SEC EDGAR as the User-Agent.
    pub identity: Option<String>,
    pub fact_name: String,
    pub forms: Vec<FormType>,
    pub calendar: BusinessCalendar,
    /// Worker threads processing identifiers concurrently.
    pub workers: usize,
    /// Budget per identifier across all its external calls.
    pub identifier_timeout_secs: u64,
    pub fetch: FetchSettings,
    pub output: OutputConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            start_year: 2016,
            identity: None,
            fact_name: "Assets".into(),
            forms: FormType::ALL.to_vec(),
            calendar: BusinessCalendar::WeekendsOnly,
            workers: 4,
            identifier_timeout_secs: 300,
            fetch: FetchSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Where run artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub assets_file: String,
    pub prices_file: String,
    pub records_file: String,
    pub coverage_file: String,
    pub manifest_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            assets_file: "assets_data.csv".into(),
            prices_file: "final_prices.csv".into(),
            records_file: "aligned_records.csv".into(),
            coverage_file: "coverage_report.json".into(),
            manifest_file: "manifest.json".into(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config TOML")
    }

    /// Check every setting. Does not require an identity; see
    /// [`ReconcileConfig::require_identity`].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.start_date()?;
        if self.fact_name.trim().is_empty() {
            return Err(invalid("fact_name", "must not be empty"));
        }
        if self.forms.is_empty() {
            return Err(invalid("forms", "at least one form type is required"));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(invalid(
                "workers",
                &format!("must be between 1 and {MAX_WORKERS}"),
            ));
        }
        if self.identifier_timeout_secs == 0 {
            return Err(invalid("identifier_timeout_secs", "must be positive"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(invalid("fetch.timeout_secs", "must be positive"));
        }
        if self.fetch.sec_requests_per_second == 0 || self.fetch.sec_requests_per_second > 10 {
            return Err(invalid(
                "fetch.sec_requests_per_second",
                "SEC fair access allows 1 to 10 requests per second",
            ));
        }
        if let Some(identity) = &self.identity {
            if identity.trim().is_empty() {
                return Err(ConfigurationError::MissingIdentity);
            }
        }
        Ok(())
    }

    /// The identity string, required when facts come from SEC EDGAR.
    pub fn require_identity(&self) -> Result<&str, ConfigurationError> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigurationError::MissingIdentity)
    }

    /// January 1 of `start_year`.
    pub fn start_date(&self) -> Result<NaiveDate, ConfigurationError> {
        let current_year = chrono::Local::now().date_naive().year();
        if !(EARLIEST_START_YEAR..=current_year).contains(&self.start_year) {
            return Err(ConfigurationError::InvalidStartYear(self.start_year));
        }
        NaiveDate::from_ymd_opt(self.start_year, 1, 1)
            .ok_or(ConfigurationError::InvalidStartYear(self.start_year))
    }

    pub fn fact_request(&self, filed_since: NaiveDate) -> FactRequest {
        FactRequest::new(self.fact_name.trim(), filed_since).with_forms(self.forms.clone())
    }

    /// Deterministic hash of this configuration.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
