//! Coverage report: which identifiers succeeded, which failed, and why.

use filingsync_core::error::{ErrorCategory, ReconcileError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Pipeline stage an issue was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Facts,
    Prices,
    Align,
    Returns,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Facts => "facts",
            Stage::Prices => "prices",
            Stage::Align => "align",
            Stage::Returns => "returns",
        };
        f.write_str(name)
    }
}

/// Outcome of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Facts and aligned prices.
    Complete,
    /// Facts only; present in the assets table, absent from the prices table.
    Partial,
    /// Excluded from both tables.
    Failed,
}

impl OutcomeStatus {
    pub fn succeeded(self) -> bool {
        !matches!(self, OutcomeStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub identifier: String,
    pub stage: Stage,
    pub category: ErrorCategory,
    pub message: String,
}

impl Issue {
    pub fn new(identifier: &str, stage: Stage, err: impl Into<ReconcileError>) -> Self {
        let err = err.into();
        Self {
            identifier: identifier.to_string(),
            stage,
            category: err.category(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub identifier: String,
    pub status: OutcomeStatus,
    /// Canonical facts contributed to the assets table.
    pub facts: usize,
    /// Rows contributed to the prices table.
    pub aligned: usize,
    /// Adjusted filing dates with no quote in the price history.
    #[serde(default)]
    pub unmatched_targets: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub attempted: usize,
    /// Complete + partial.
    pub succeeded: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    /// Failed identifiers grouped by the category of their failure.
    pub failures_by_category: BTreeMap<ErrorCategory, Vec<String>>,
    /// Every issue raised, counted by category.
    pub issue_counts: BTreeMap<ErrorCategory, usize>,
    pub elapsed_secs: f64,
    pub identifiers_per_sec: f64,
    pub entries: Vec<CoverageEntry>,
}

impl CoverageReport {
    pub fn from_entries(mut entries: Vec<CoverageEntry>, elapsed: Duration) -> Self {
        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));

        let count = |status| entries.iter().filter(|e| e.status == status).count();
        let complete = count(OutcomeStatus::Complete);
        let partial = count(OutcomeStatus::Partial);
        let failed = count(OutcomeStatus::Failed);

        let mut failures_by_category: BTreeMap<ErrorCategory, Vec<String>> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.status == OutcomeStatus::Failed) {
            let category = entry
                .issues
                .first()
                .map(|i| i.category)
                .unwrap_or(ErrorCategory::Fetch);
            failures_by_category
                .entry(category)
                .or_default()
                .push(entry.identifier.clone());
        }

        let mut issue_counts: BTreeMap<ErrorCategory, usize> = BTreeMap::new();
        for issue in entries.iter().flat_map(|e| &e.issues) {
            *issue_counts.entry(issue.category).or_default() += 1;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let attempted = entries.len();
        Self {
            attempted,
            succeeded: complete + partial,
            complete,
            partial,
            failed,
            failures_by_category,
            issue_counts,
            elapsed_secs,
            identifiers_per_sec: if elapsed_secs > 0.0 {
                attempted as f64 / elapsed_secs
            } else {
                0.0
            },
            entries,
        }
    }

    pub fn entry(&self, identifier: &str) -> Option<&CoverageEntry> {
        self.entries.iter().find(|e| e.identifier == identifier)
    }

    pub fn failed_identifiers(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status == OutcomeStatus::Failed)
            .map(|e| e.identifier.as_str())
            .collect()
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.entries.iter().flat_map(|e| &e.issues)
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reconciled {}/{} identifiers ({} complete, {} partial, {} failed)",
            self.succeeded, self.attempted, self.complete, self.partial, self.failed
        )?;
        for (category, identifiers) in &self.failures_by_category {
            writeln!(f, "  {category}: {}", identifiers.join(", "))?;
        }
        for entry in self.entries.iter().filter(|e| e.status == OutcomeStatus::Partial) {
            if let Some(issue) = entry.issues.first() {
                writeln!(f, "  partial {} ({}): {}", entry.identifier, issue.stage, issue.message)?;
            }
        }
        let minutes = (self.elapsed_secs / 60.0).floor();
        let seconds = self.elapsed_secs - minutes * 60.0;
        write!(
            f,
            "Elapsed {minutes:.0}m {seconds:.2}s ({:.2} identifiers/s)",
            self.identifiers_per_sec
        )
    }
}
