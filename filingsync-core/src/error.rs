//! Error taxonomy shared by every pipeline stage.
//!
//! Per-record and per-identifier errors (`ParseError`, `FetchError`,
//! `DivisionByZeroError`) are recoverable: the orchestrator records them in
//! the coverage report and keeps going. `ConfigurationError` is the only
//! fatal kind and is raised before any identifier is processed.

use crate::data::provider::FetchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A date or numeric field that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid date '{input}' (expected YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("invalid number in field '{field}': '{input}'")]
    InvalidNumber { field: String, input: String },

    #[error("unknown form type '{0}'")]
    UnknownFormType(String),

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("unreadable row at line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
}

/// Percentage change against a zero previous close.
///
/// Scoped to a single record: the rest of the identifier's series still
/// computes and this record gets a null return.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("previous adjusted close is zero for {identifier} on {date}")]
pub struct DivisionByZeroError {
    pub identifier: String,
    pub date: NaiveDate,
}

/// Invalid run inputs. Fatal at the orchestrator entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("identifier list is empty")]
    EmptyIdentifierList,

    #[error("blank identifier at position {0}")]
    BlankIdentifier(usize),

    #[error("invalid start date {date}: {reason}")]
    InvalidStartDate { date: String, reason: String },

    #[error("invalid start year {0}")]
    InvalidStartYear(i32),

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("missing identity: the SEC requires a contact string (name and email) for EDGAR requests")]
    MissingIdentity,
}

/// Coarse failure category used for grouping in the coverage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Fetch,
    Parse,
    DivisionByZero,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Fetch => "FetchError",
            ErrorCategory::Parse => "ParseError",
            ErrorCategory::DivisionByZero => "DivisionByZeroError",
            ErrorCategory::Configuration => "ConfigurationError",
        };
        f.write_str(name)
    }
}

/// Any error the reconciliation pipeline can surface.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    DivisionByZero(#[from] DivisionByZeroError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ReconcileError {
    /// Category for reporting. Malformed records surfaced by a provider count
    /// as parse failures, not fetch failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReconcileError::Fetch(FetchError::Malformed(_)) => ErrorCategory::Parse,
            ReconcileError::Fetch(_) => ErrorCategory::Fetch,
            ReconcileError::Parse(_) => ErrorCategory::Parse,
            ReconcileError::DivisionByZero(_) => ErrorCategory::DivisionByZero,
            ReconcileError::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_provider_payload_counts_as_parse() {
        let err = ReconcileError::from(FetchError::Malformed(ParseError::InvalidDate {
            input: "2024-13-01".into(),
        }));
        assert_eq!(err.category(), ErrorCategory::Parse);
    }

    #[test]
    fn network_failure_counts_as_fetch() {
        let err = ReconcileError::from(FetchError::NetworkUnreachable("connection refused".into()));
        assert_eq!(err.category(), ErrorCategory::Fetch);
        assert_eq!(err.category().to_string(), "FetchError");
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::DivisionByZero).unwrap();
        assert_eq!(json, "\"division_by_zero\"");
    }
}
