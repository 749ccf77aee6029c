//! SEC EDGAR fact provider.
//!
//! Resolves tickers to CIKs through `company_tickers.json` (fetched once per
//! provider), then reads one us-gaap concept from the XBRL `companyfacts`
//! endpoint. The SEC rejects anonymous traffic, so every request carries the
//! caller's identity as its User-Agent.

use super::http::{FetchSettings, HttpClient};
use super::provider::{FactProvider, FactRequest, FetchError};
use crate::calendar::parse_date;
use crate::domain::{DisclosureFact, FormType};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const EDGAR_BASE_URL: &str = "https://data.sec.gov";
const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const TAXONOMY: &str = "us-gaap";
const UNIT: &str = "USD";

#[derive(Debug, Deserialize)]
struct CompanyTickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompanyFacts {
    #[serde(default)]
    facts: HashMap<String, HashMap<String, Concept>>,
}

#[derive(Debug, Deserialize)]
struct Concept {
    #[serde(default)]
    units: HashMap<String, Vec<FactValue>>,
}

#[derive(Debug, Deserialize)]
struct FactValue {
    end: String,
    val: f64,
    #[serde(default)]
    form: Option<String>,
    #[serde(default)]
    filed: Option<String>,
}

type TickerIndex = HashMap<String, u64>;

/// Disclosure facts from SEC EDGAR.
#[derive(Debug)]
pub struct EdgarFactProvider {
    http: HttpClient,
    tickers: Mutex<Option<Arc<TickerIndex>>>,
}

impl EdgarFactProvider {
    /// `identity` is the contact string the SEC asks for, e.g.
    /// `"Jane Analyst jane@example.com"`.
    pub fn new(identity: &str, settings: &FetchSettings) -> Result<Self, FetchError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(FetchError::ClientSetup(
                "SEC EDGAR requires a non-empty identity".into(),
            ));
        }
        let http = HttpClient::new("sec_edgar", identity, settings, settings.sec_requests_per_second)?;
        Ok(Self {
            http,
            tickers: Mutex::new(None),
        })
    }

    fn ticker_index(&self) -> Result<Arc<TickerIndex>, FetchError> {
        let mut cached = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = cached.as_ref() {
            return Ok(Arc::clone(index));
        }

        tracing::debug!("fetching SEC company ticker index");
        let raw: HashMap<String, CompanyTickerEntry> = self.http.get_json(COMPANY_TICKERS_URL)?;
        let index: TickerIndex = raw
            .into_values()
            .map(|entry| (normalize_ticker(&entry.ticker), entry.cik_str))
            .collect();
        tracing::debug!(tickers = index.len(), "loaded SEC company ticker index");

        let index = Arc::new(index);
        *cached = Some(Arc::clone(&index));
        Ok(index)
    }

    fn cik_for(&self, identifier: &str) -> Result<u64, FetchError> {
        self.ticker_index()?
            .get(&normalize_ticker(identifier))
            .copied()
            .ok_or_else(|| FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            })
    }
}

impl FactProvider for EdgarFactProvider {
    fn name(&self) -> &str {
        "sec_edgar"
    }

    fn fetch_facts(
        &self,
        identifier: &str,
        request: &FactRequest,
    ) -> Result<Vec<DisclosureFact>, FetchError> {
        let cik = self.cik_for(identifier)?;
        let url = format!("{EDGAR_BASE_URL}/api/xbrl/companyfacts/CIK{cik:010}.json");
        let company: CompanyFacts = self.http.get_json(&url).map_err(|err| match err {
            FetchError::HttpStatus { status: 404, .. } => FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            },
            other => other,
        })?;
        extract_facts(identifier, &company, request)
    }
}

/// Share classes appear as `BRK-B` in the SEC index and `BRK.B` elsewhere.
fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase().replace('.', "-")
}

/// Pull the requested concept out of a companyfacts payload.
///
/// Rows on forms other than 10-Q/10-K are skipped. Rows that are admitted but
/// carry unparseable dates fail the identifier as malformed.
pub(crate) fn extract_facts(
    identifier: &str,
    company: &CompanyFacts,
    request: &FactRequest,
) -> Result<Vec<DisclosureFact>, FetchError> {
    let values = company
        .facts
        .get(TAXONOMY)
        .and_then(|concepts| concepts.get(&request.fact_name))
        .and_then(|concept| concept.units.get(UNIT))
        .ok_or_else(|| FetchError::NoData {
            identifier: identifier.to_string(),
            reason: format!("no {TAXONOMY}:{} in {UNIT}", request.fact_name),
        })?;

    let mut facts = Vec::new();
    for value in values {
        let Some(form_type) = value.form.as_deref().and_then(FormType::from_form_code) else {
            continue;
        };
        let filed = value
            .filed
            .as_deref()
            .ok_or_else(|| crate::error::ParseError::MissingField("filed".into()))?;
        let fact = DisclosureFact {
            identifier: identifier.to_string(),
            fact_name: request.fact_name.clone(),
            form_type,
            period_end: parse_date(&value.end)?,
            filed_date: parse_date(filed)?,
            value: value.val,
        };
        if request.admits(&fact) {
            facts.push(fact);
        }
    }
    Ok(facts)
}
