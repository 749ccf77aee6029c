//! filingsync core: reconciles regulatory disclosure facts with market prices.
//!
//! - Domain types (disclosure facts, quotes, aligned records)
//! - Business-day calendars
//! - Fact deduplication to one canonical fact per reporting period
//! - Price alignment on adjusted filing dates
//! - Per-identifier interperiod returns
//! - Fact and price providers (SEC EDGAR, Yahoo Finance, CSV, memory)

pub mod align;
pub mod calendar;
pub mod data;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod returns;
pub mod universe;

pub use calendar::{adjust_to_next_business_day, BusinessCalendar};
pub use dedup::deduplicate;
pub use error::{
    ConfigurationError, DivisionByZeroError, ErrorCategory, ParseError, ReconcileError,
};
pub use returns::compute_returns;
