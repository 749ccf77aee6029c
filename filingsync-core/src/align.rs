//! Price alignment against business-day-adjusted filing dates.
//!
//! Adjustment and alignment are separate steps: callers run the calendar over
//! the filed dates first (`target_dates`), then `align` is a pure
//! set-membership filter over the quote series.

use crate::calendar::BusinessCalendar;
use crate::domain::{AnchoredQuote, CanonicalFact, FilingAnchor, PriceQuote};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Keep only the quotes whose date is a target date, in the order supplied.
///
/// `targets` must already be business-day-adjusted. An empty quote series
/// yields an empty result.
pub fn align(quotes: &[PriceQuote], targets: &BTreeSet<NaiveDate>) -> Vec<PriceQuote> {
    quotes
        .iter()
        .filter(|q| targets.contains(&q.date))
        .cloned()
        .collect()
}

/// Adjusted filed dates of the canonical facts.
pub fn target_dates(facts: &[CanonicalFact], calendar: BusinessCalendar) -> BTreeSet<NaiveDate> {
    facts
        .iter()
        .map(|f| calendar.adjust(f.filed_date))
        .collect()
}

/// Inclusive date range covering every target, or `None` when there are none.
pub fn fetch_span(targets: &BTreeSet<NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    Some((*targets.first()?, *targets.last()?))
}

/// Sort quotes by date (stable) and drop repeated dates, keeping the first.
pub fn normalize_quotes(mut quotes: Vec<PriceQuote>) -> Vec<PriceQuote> {
    quotes.sort_by_key(|q| q.date);
    quotes.dedup_by_key(|q| q.date);
    quotes
}

/// Lookup from adjusted target date to the filing that produced it.
///
/// When several canonical facts share an adjusted date (a filing that first
/// reports comparative prior periods), the fact with the latest period end is
/// the anchor.
#[derive(Debug, Clone, Default)]
pub struct FilingAnchors {
    by_date: BTreeMap<NaiveDate, FilingAnchor>,
}

impl FilingAnchors {
    pub fn new(facts: &[CanonicalFact], calendar: BusinessCalendar) -> Self {
        let mut by_date: BTreeMap<NaiveDate, FilingAnchor> = BTreeMap::new();
        for fact in facts {
            let anchor = FilingAnchor {
                period_end: fact.period_end,
                filed_date: fact.filed_date,
            };
            by_date
                .entry(calendar.adjust(fact.filed_date))
                .and_modify(|existing| {
                    if anchor.period_end > existing.period_end {
                        *existing = anchor;
                    }
                })
                .or_insert(anchor);
        }
        Self { by_date }
    }

    pub fn get(&self, date: NaiveDate) -> Option<FilingAnchor> {
        self.by_date.get(&date).copied()
    }

    pub fn targets(&self) -> BTreeSet<NaiveDate> {
        self.by_date.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Join aligned quotes to their filings. Quotes without an anchor are
    /// dropped.
    pub fn anchor(&self, aligned: Vec<PriceQuote>) -> Vec<AnchoredQuote> {
        aligned
            .into_iter()
            .filter_map(|quote| {
                let anchor = self.get(quote.date)?;
                Some(AnchoredQuote { quote, anchor })
            })
            .collect()
    }
}
