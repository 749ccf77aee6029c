//! Trading-day price observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading-day observation for an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub identifier: String,
    pub date: NaiveDate,
    /// Dividend/split-adjusted close.
    pub adjusted_close: f64,
}

/// The filing whose adjusted filed date selected a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingAnchor {
    pub period_end: NaiveDate,
    pub filed_date: NaiveDate,
}

/// An aligned quote joined to the filing that produced its target date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchoredQuote {
    pub quote: PriceQuote,
    pub anchor: FilingAnchor,
}
