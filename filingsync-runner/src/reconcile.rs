//! Reconciliation orchestrator.
//!
//! Runs the per-identifier pipeline (fetch facts → deduplicate → adjust
//! filing dates → fetch and align prices) on a bounded rayon pool, isolates
//! failures to the identifier that raised them, then assembles the shared
//! tables and computes grouped returns on a single coordinator thread.

use crate::config::ReconcileConfig;
use crate::coverage::{CoverageEntry, CoverageReport, Issue, OutcomeStatus, Stage};
use chrono::NaiveDate;
use filingsync_core::align::{align, fetch_span, normalize_quotes, FilingAnchors};
use filingsync_core::data::{FactProvider, FactRequest, FetchError, PriceProvider};
use filingsync_core::dedup::deduplicate;
use filingsync_core::domain::{AlignedRecord, AnchoredQuote, CanonicalFact};
use filingsync_core::error::ConfigurationError;
use filingsync_core::returns::{compute_returns, division_by_zero_errors};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress callbacks for a reconciliation run. Called from worker threads.
pub trait ReconcileProgress: Send + Sync {
    fn on_start(&self, identifier: &str, index: usize, total: usize);

    fn on_complete(&self, identifier: &str, index: usize, total: usize, status: OutcomeStatus);

    fn on_batch_complete(&self, report: &CoverageReport);
}

/// Progress reporter that emits tracing events.
pub struct TracingProgress;

impl ReconcileProgress for TracingProgress {
    fn on_start(&self, identifier: &str, index: usize, total: usize) {
        tracing::debug!(identifier, index = index + 1, total, "reconciling identifier");
    }

    fn on_complete(&self, identifier: &str, index: usize, total: usize, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Complete => {
                tracing::info!(identifier, index = index + 1, total, "complete")
            }
            OutcomeStatus::Partial => {
                tracing::warn!(identifier, index = index + 1, total, "partial: facts only")
            }
            OutcomeStatus::Failed => {
                tracing::warn!(identifier, index = index + 1, total, "failed")
            }
        }
    }

    fn on_batch_complete(&self, report: &CoverageReport) {
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            partial = report.partial,
            failed = report.failed,
            elapsed_secs = report.elapsed_secs,
            "reconciliation finished"
        );
    }
}

/// Tables and coverage produced by one run.
#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub start_date: NaiveDate,
    /// Canonical facts, ordered by (identifier, period end).
    pub assets: Vec<CanonicalFact>,
    /// Aligned records with returns, ordered by (identifier, date).
    pub records: Vec<AlignedRecord>,
    pub coverage: CoverageReport,
}

impl ReconcileOutput {
    /// True when at least one identifier contributed to the assets table.
    pub fn any_succeeded(&self) -> bool {
        self.coverage.succeeded > 0
    }
}

/// Result of one identifier's pipeline, returned to the coordinator.
struct IdentifierOutcome {
    identifier: String,
    status: OutcomeStatus,
    canonical: Vec<CanonicalFact>,
    aligned: Vec<AnchoredQuote>,
    unmatched_targets: usize,
    issues: Vec<Issue>,
}

impl IdentifierOutcome {
    fn failed(identifier: &str, issue: Issue) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: OutcomeStatus::Failed,
            canonical: Vec::new(),
            aligned: Vec::new(),
            unmatched_targets: 0,
            issues: vec![issue],
        }
    }

    fn partial(identifier: &str, canonical: Vec<CanonicalFact>, issue: Issue) -> Self {
        Self {
            identifier: identifier.to_string(),
            status: OutcomeStatus::Partial,
            canonical,
            aligned: Vec::new(),
            unmatched_targets: 0,
            issues: vec![issue],
        }
    }
}

/// Deadline and cancellation guard for one identifier's external calls.
struct Budget<'a> {
    started: Instant,
    limit: Duration,
    cancel: Option<&'a AtomicBool>,
}

impl Budget<'_> {
    fn check(&self, stage: Stage) -> Result<(), FetchError> {
        if self.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return Err(FetchError::Cancelled);
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.limit {
            return Err(FetchError::Timeout {
                stage: stage.to_string(),
                elapsed_secs: elapsed.as_secs(),
            });
        }
        Ok(())
    }
}

/// Reconciles disclosure facts with prices for a list of identifiers.
pub struct Reconciler {
    facts: Arc<dyn FactProvider>,
    prices: Arc<dyn PriceProvider>,
    config: ReconcileConfig,
    progress: Arc<dyn ReconcileProgress>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Reconciler {
    pub fn new(
        facts: Arc<dyn FactProvider>,
        prices: Arc<dyn PriceProvider>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            facts,
            prices,
            config,
            progress: Arc::new(TracingProgress),
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ReconcileProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Identifiers not yet started when the flag is set fail with
    /// `FetchError::Cancelled`.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run with the start date derived from `config.start_year`.
    pub fn run_configured(&self, identifiers: &[String]) -> Result<ReconcileOutput, ConfigurationError> {
        let start_date = self.config.start_date()?;
        self.run(identifiers, start_date)
    }

    /// Reconcile `identifiers` for facts filed on or after `start_date`.
    ///
    /// Only invalid inputs fail the whole run; every per-identifier failure
    /// is recorded in the coverage report instead.
    pub fn run(
        &self,
        identifiers: &[String],
        start_date: NaiveDate,
    ) -> Result<ReconcileOutput, ConfigurationError> {
        self.config.validate()?;
        let identifiers = normalize_identifiers(identifiers)?;
        validate_start_date(start_date)?;

        let started = Instant::now();
        let request = self.config.fact_request(start_date);
        let total = identifiers.len();

        tracing::info!(
            identifiers = total,
            %start_date,
            workers = self.config.workers,
            facts = self.facts.name(),
            prices = self.prices.name(),
            "starting reconciliation"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| ConfigurationError::InvalidSetting {
                key: "workers".into(),
                reason: e.to_string(),
            })?;

        let outcomes: Vec<IdentifierOutcome> = pool.install(|| {
            identifiers
                .par_iter()
                .enumerate()
                .map(|(index, identifier)| {
                    self.progress.on_start(identifier, index, total);
                    let outcome = self.process(identifier, &request);
                    self.progress.on_complete(identifier, index, total, outcome.status);
                    outcome
                })
                .collect()
        });

        let output = assemble(start_date, outcomes, started.elapsed());
        self.progress.on_batch_complete(&output.coverage);
        Ok(output)
    }

    /// The strict stage order for one identifier: dedup before date
    /// extraction, adjustment before alignment.
    fn process(&self, identifier: &str, request: &FactRequest) -> IdentifierOutcome {
        let budget = Budget {
            started: Instant::now(),
            limit: Duration::from_secs(self.config.identifier_timeout_secs),
            cancel: self.cancel.as_deref(),
        };

        let raw = match budget
            .check(Stage::Facts)
            .and_then(|()| self.facts.fetch_facts(identifier, request))
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(identifier, stage = "facts", error = %err, "fact fetch failed");
                return IdentifierOutcome::failed(identifier, Issue::new(identifier, Stage::Facts, err));
            }
        };

        let admitted: Vec<_> = raw
            .into_iter()
            .filter(|f| request.admits(f))
            .map(|mut f| {
                f.identifier = identifier.to_string();
                f
            })
            .collect();
        if admitted.is_empty() {
            let err = FetchError::NoData {
                identifier: identifier.to_string(),
                reason: format!(
                    "no {} facts on {:?} filed since {}",
                    request.fact_name, request.forms, request.filed_since
                ),
            };
            return IdentifierOutcome::failed(identifier, Issue::new(identifier, Stage::Facts, err));
        }

        let canonical = deduplicate(admitted);
        let anchors = FilingAnchors::new(&canonical, self.config.calendar);
        let targets = anchors.targets();
        let Some((start, end)) = fetch_span(&targets) else {
            let err = FetchError::NoData {
                identifier: identifier.to_string(),
                reason: "no target dates".into(),
            };
            return IdentifierOutcome::partial(identifier, canonical, Issue::new(identifier, Stage::Align, err));
        };

        let quotes = match budget
            .check(Stage::Prices)
            .and_then(|()| self.prices.fetch_prices(identifier, start, end))
        {
            Ok(quotes) => quotes,
            Err(err) => {
                tracing::warn!(identifier, stage = "prices", error = %err, "price fetch failed");
                return IdentifierOutcome::partial(identifier, canonical, Issue::new(identifier, Stage::Prices, err));
            }
        };
        if quotes.is_empty() {
            let err = FetchError::NoData {
                identifier: identifier.to_string(),
                reason: format!("no trading history between {start} and {end}"),
            };
            return IdentifierOutcome::partial(identifier, canonical, Issue::new(identifier, Stage::Prices, err));
        }

        let quotes = normalize_quotes(quotes);
        let matched = align(&quotes, &targets);
        let unmatched: Vec<NaiveDate> = {
            let priced: HashSet<NaiveDate> = matched.iter().map(|q| q.date).collect();
            targets.iter().copied().filter(|t| !priced.contains(t)).collect()
        };
        let aligned = anchors.anchor(matched);
        if aligned.is_empty() {
            let err = FetchError::NoData {
                identifier: identifier.to_string(),
                reason: format!("no quotes on any of {} target dates", targets.len()),
            };
            let mut outcome = IdentifierOutcome::partial(identifier, canonical, Issue::new(identifier, Stage::Align, err));
            outcome.unmatched_targets = unmatched.len();
            return outcome;
        }

        let mut issues = Vec::new();
        if !unmatched.is_empty() {
            let dates: Vec<String> = unmatched.iter().map(NaiveDate::to_string).collect();
            tracing::warn!(
                identifier,
                unmatched = unmatched.len(),
                targets = targets.len(),
                "target dates without a quote"
            );
            let err = FetchError::NoData {
                identifier: identifier.to_string(),
                reason: format!(
                    "no quote on {} of {} target dates: {}",
                    unmatched.len(),
                    targets.len(),
                    dates.join(", ")
                ),
            };
            issues.push(Issue::new(identifier, Stage::Align, err));
        }

        tracing::debug!(
            identifier,
            facts = canonical.len(),
            targets = targets.len(),
            aligned = aligned.len(),
            "identifier reconciled"
        );
        IdentifierOutcome {
            identifier: identifier.to_string(),
            status: OutcomeStatus::Complete,
            canonical,
            aligned,
            unmatched_targets: unmatched.len(),
            issues,
        }
    }
}

/// Merge per-identifier outcomes into the shared tables.
fn assemble(start_date: NaiveDate, outcomes: Vec<IdentifierOutcome>, elapsed: Duration) -> ReconcileOutput {
    let mut assets: Vec<CanonicalFact> = Vec::new();
    let mut aligned_by_identifier: BTreeMap<String, Vec<AnchoredQuote>> = BTreeMap::new();
    let mut entries: Vec<CoverageEntry> = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        entries.push(CoverageEntry {
            identifier: outcome.identifier.clone(),
            status: outcome.status,
            facts: outcome.canonical.len(),
            aligned: outcome.aligned.len(),
            unmatched_targets: outcome.unmatched_targets,
            issues: outcome.issues,
        });
        assets.extend(outcome.canonical);
        if !outcome.aligned.is_empty() {
            aligned_by_identifier.insert(outcome.identifier, outcome.aligned);
        }
    }
    assets.sort_by(|a, b| {
        a.identifier
            .cmp(&b.identifier)
            .then(a.period_end.cmp(&b.period_end))
    });

    let records: Vec<AlignedRecord> = compute_returns(&aligned_by_identifier)
        .into_values()
        .flatten()
        .collect();

    for err in division_by_zero_errors(&records) {
        tracing::warn!(identifier = %err.identifier, date = %err.date, "zero previous close");
        if let Some(entry) = entries.iter_mut().find(|e| e.identifier == err.identifier) {
            let identifier = err.identifier.clone();
            entry.issues.push(Issue::new(&identifier, Stage::Returns, err));
        }
    }

    ReconcileOutput {
        start_date,
        assets,
        records,
        coverage: CoverageReport::from_entries(entries, elapsed),
    }
}

/// Trim, uppercase and de-duplicate identifiers, keeping first occurrence.
pub fn normalize_identifiers(identifiers: &[String]) -> Result<Vec<String>, ConfigurationError> {
    if identifiers.is_empty() {
        return Err(ConfigurationError::EmptyIdentifierList);
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(identifiers.len());
    for (position, raw) in identifiers.iter().enumerate() {
        let identifier = raw.trim().to_ascii_uppercase();
        if identifier.is_empty() {
            return Err(ConfigurationError::BlankIdentifier(position));
        }
        if seen.insert(identifier.clone()) {
            out.push(identifier);
        }
    }
    Ok(out)
}

fn validate_start_date(start_date: NaiveDate) -> Result<(), ConfigurationError> {
    let earliest = NaiveDate::from_ymd_opt(crate::config::EARLIEST_START_YEAR, 1, 1)
        .unwrap_or(NaiveDate::MIN);
    let today = chrono::Local::now().date_naive();
    let reason = if start_date < earliest {
        format!("before {earliest}, the first year of electronic filings")
    } else if start_date > today {
        "in the future".to_string()
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidStartDate {
        date: start_date.to_string(),
        reason,
    })
}
