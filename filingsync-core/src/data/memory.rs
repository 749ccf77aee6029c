//! In-memory providers with injectable failures.

use super::provider::{FactProvider, FactRequest, FetchError, PriceProvider};
use crate::domain::{DisclosureFact, PriceQuote};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fact source holding per-identifier facts or a scripted failure.
#[derive(Debug, Default)]
pub struct MemoryFactSource {
    facts: HashMap<String, Vec<DisclosureFact>>,
    failures: HashMap<String, FetchError>,
    calls: AtomicUsize,
}

impl MemoryFactSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(mut self, identifier: &str, facts: Vec<DisclosureFact>) -> Self {
        self.facts.entry(identifier.to_string()).or_default().extend(facts);
        self
    }

    pub fn with_failure(mut self, identifier: &str, error: FetchError) -> Self {
        self.failures.insert(identifier.to_string(), error);
        self
    }

    /// Number of `fetch_facts` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FactProvider for MemoryFactSource {
    fn name(&self) -> &str {
        "memory_facts"
    }

    fn fetch_facts(
        &self,
        identifier: &str,
        _request: &FactRequest,
    ) -> Result<Vec<DisclosureFact>, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.failures.get(identifier) {
            return Err(err.clone());
        }
        self.facts
            .get(identifier)
            .cloned()
            .ok_or_else(|| FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            })
    }
}

/// Price source holding per-identifier quotes or a scripted failure.
#[derive(Debug, Default)]
pub struct MemoryPriceSource {
    quotes: HashMap<String, Vec<PriceQuote>>,
    failures: HashMap<String, FetchError>,
    calls: AtomicUsize,
}

impl MemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(mut self, identifier: &str, quotes: Vec<PriceQuote>) -> Self {
        self.quotes.entry(identifier.to_string()).or_default().extend(quotes);
        self
    }

    pub fn with_failure(mut self, identifier: &str, error: FetchError) -> Self {
        self.failures.insert(identifier.to_string(), error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl PriceProvider for MemoryPriceSource {
    fn name(&self) -> &str {
        "memory_prices"
    }

    fn fetch_prices(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceQuote>, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.failures.get(identifier) {
            return Err(err.clone());
        }
        Ok(self
            .quotes
            .get(identifier)
            .map(|quotes| {
                quotes
                    .iter()
                    .filter(|q| q.date >= start && q.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
