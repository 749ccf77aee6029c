//! AlignedRecord: the joined output row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a record carries a null return even though it has a predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFlag {
    /// Previous adjusted close was exactly zero.
    DivisionByZero,
    /// Current or previous adjusted close was NaN.
    MissingPrice,
}

impl ReturnFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnFlag::DivisionByZero => "division_by_zero",
            ReturnFlag::MissingPrice => "missing_price",
        }
    }
}

/// A canonical fact's timing joined with its market observation and return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRecord {
    pub identifier: String,
    pub period_end: NaiveDate,
    pub filed_date: NaiveDate,
    /// `filed_date` rolled forward to a business day; also the quote date.
    pub adjusted_target_date: NaiveDate,
    pub adjusted_close: f64,
    /// Null for the first record of each identifier and for flagged records.
    pub interperiod_return_pct: Option<f64>,
    pub return_flag: Option<ReturnFlag>,
}
