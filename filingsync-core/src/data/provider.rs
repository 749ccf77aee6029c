//! Collaborator traits and the fetch error taxonomy.
//!
//! `FactProvider` and `PriceProvider` abstract over where disclosures and
//! prices come from (SEC EDGAR, Yahoo Finance, CSV files, memory) so the
//! orchestrator can swap implementations and tests can inject failures.

use crate::domain::{DisclosureFact, FormType, PriceQuote};
use crate::error::ParseError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to an external collaborator for one identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("timed out after {elapsed_secs}s during {stage}")]
    Timeout { stage: String, elapsed_secs: u64 },

    #[error("run cancelled")]
    Cancelled,

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("identifier not found: {identifier}")]
    IdentifierNotFound { identifier: String },

    #[error("no data for {identifier}: {reason}")]
    NoData { identifier: String, reason: String },

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("client setup failed: {0}")]
    ClientSetup(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("malformed record: {0}")]
    Malformed(#[from] ParseError),
}

impl FetchError {
    /// Whether retrying the same request later could succeed.
    ///
    /// Data absence (`IdentifierNotFound`, `NoData`) and malformed payloads
    /// are permanent for a given run.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NetworkUnreachable(_)
            | FetchError::Timeout { .. }
            | FetchError::RateLimited { .. } => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Which facts the orchestrator wants for an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRequest {
    pub fact_name: String,
    pub forms: Vec<FormType>,
    /// Facts filed before this date are not admitted.
    pub filed_since: NaiveDate,
}

impl FactRequest {
    pub fn new(fact_name: impl Into<String>, filed_since: NaiveDate) -> Self {
        Self {
            fact_name: fact_name.into(),
            forms: FormType::ALL.to_vec(),
            filed_since,
        }
    }

    pub fn with_forms(mut self, forms: Vec<FormType>) -> Self {
        self.forms = forms;
        self
    }

    /// Whether a fact satisfies this request.
    pub fn admits(&self, fact: &DisclosureFact) -> bool {
        fact.fact_name == self.fact_name
            && self.forms.contains(&fact.form_type)
            && fact.filed_date >= self.filed_since
    }
}

/// Source of disclosure facts.
pub trait FactProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Facts for `identifier`. Providers may return more than the request
    /// admits; callers filter with [`FactRequest::admits`].
    fn fetch_facts(
        &self,
        identifier: &str,
        request: &FactRequest,
    ) -> Result<Vec<DisclosureFact>, FetchError>;
}

/// Source of daily adjusted-close quotes.
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Quotes for `identifier` with `start <= date <= end`. An identifier with
    /// no trading history in range yields `Ok(vec![])`.
    fn fetch_prices(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceQuote>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(name: &str, form: FormType, filed: &str) -> DisclosureFact {
        DisclosureFact {
            identifier: "MMM".into(),
            fact_name: name.into(),
            form_type: form,
            period_end: NaiveDate::from_ymd_opt(2015, 12, 31).unwrap(),
            filed_date: NaiveDate::parse_from_str(filed, "%Y-%m-%d").unwrap(),
            value: 1.0,
        }
    }

    #[test]
    fn request_admits_by_name_form_and_filed_date() {
        let since = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap();
        let request = FactRequest::new("Assets", since);

        assert!(request.admits(&fact("Assets", FormType::Annual, "2016-02-09")));
        assert!(request.admits(&fact("Assets", FormType::Quarterly, "2016-01-01")));
        assert!(!request.admits(&fact("Assets", FormType::Annual, "2015-12-31")));
        assert!(!request.admits(&fact("Liabilities", FormType::Annual, "2016-02-09")));

        let annual_only = request.with_forms(vec![FormType::Annual]);
        assert!(!annual_only.admits(&fact("Assets", FormType::Quarterly, "2016-05-01")));
    }

    #[test]
    fn transient_errors() {
        assert!(FetchError::NetworkUnreachable("reset".into()).is_transient());
        assert!(FetchError::HttpStatus { status: 503, url: "u".into() }.is_transient());
        assert!(FetchError::HttpStatus { status: 429, url: "u".into() }.is_transient());
        assert!(!FetchError::HttpStatus { status: 404, url: "u".into() }.is_transient());
        assert!(!FetchError::IdentifierNotFound { identifier: "ZZZ".into() }.is_transient());
        assert!(!FetchError::NoData {
            identifier: "ZZZ".into(),
            reason: "no Assets facts".into()
        }
        .is_transient());
        assert!(!FetchError::CircuitBreakerTripped.is_transient());
    }
}
