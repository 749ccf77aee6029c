//! Fact deduplication: one canonical fact per reporting period.
//!
//! The earliest filing establishes the record for a period; later re-filings
//! of the same period (amended comparatives, restatements carried in a later
//! 10-K) are ignored.

use crate::domain::{CanonicalFact, DisclosureFact};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Collapse disclosure facts to one per (`identifier`, `period_end`).
///
/// Stable sort by (`period_end`, `filed_date`) ascending, then keep the first
/// fact of each (`identifier`, `period_end`) group. Output is ordered by
/// `period_end` ascending.
///
/// Exact `filed_date` ties within a group keep the fact that came first in
/// the input. That is the only guarantee: callers must not rely on a
/// particular winner among exact ties beyond input order.
pub fn deduplicate<I>(facts: I) -> Vec<CanonicalFact>
where
    I: IntoIterator<Item = DisclosureFact>,
{
    let mut sorted: Vec<DisclosureFact> = facts.into_iter().collect();
    let input_len = sorted.len();
    sorted.sort_by_key(|f| (f.period_end, f.filed_date));

    let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(sorted.len());
    let canonical: Vec<CanonicalFact> = sorted
        .into_iter()
        .filter(|f| seen.insert((f.identifier.clone(), f.period_end)))
        .map(CanonicalFact::new)
        .collect();

    let dropped = input_len - canonical.len();
    if dropped > 0 {
        tracing::debug!(
            kept = canonical.len(),
            dropped,
            "discarded later re-filings of already-reported periods"
        );
    }

    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FormType;

    fn fact(identifier: &str, period_end: &str, filed: &str, value: f64) -> DisclosureFact {
        DisclosureFact {
            identifier: identifier.into(),
            fact_name: "Assets".into(),
            form_type: FormType::Quarterly,
            period_end: NaiveDate::parse_from_str(period_end, "%Y-%m-%d").unwrap(),
            filed_date: NaiveDate::parse_from_str(filed, "%Y-%m-%d").unwrap(),
            value,
        }
    }

    #[test]
    fn keeps_earliest_filing_per_period() {
        let facts = vec![
            fact("AAPL", "2022-12-31", "2023-02-15", 2.0),
            fact("AAPL", "2022-12-31", "2023-01-10", 1.0),
        ];

        let canonical = deduplicate(facts);

        assert_eq!(canonical.len(), 1);
        assert_eq!(
            canonical[0].filed_date,
            NaiveDate::from_ymd_opt(2023, 1, 10).unwrap()
        );
        assert_eq!(canonical[0].value, 1.0);
    }

    #[test]
    fn output_is_ordered_by_period_end() {
        let facts = vec![
            fact("MSFT", "2023-09-30", "2023-10-24", 3.0),
            fact("MSFT", "2023-03-31", "2023-04-25", 1.0),
            fact("MSFT", "2023-06-30", "2023-07-27", 2.0),
        ];

        let canonical = deduplicate(facts);
        let values: Vec<f64> = canonical.iter().map(|f| f.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn same_period_different_identifiers_both_survive() {
        let facts = vec![
            fact("AAPL", "2023-03-31", "2023-05-01", 1.0),
            fact("MSFT", "2023-03-31", "2023-04-25", 2.0),
        ];

        assert_eq!(deduplicate(facts).len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(deduplicate(Vec::new()).is_empty());
    }

    #[test]
    fn canonical_facts_can_be_deduplicated_again() {
        let facts = vec![
            fact("KO", "2023-03-31", "2023-04-27", 1.0),
            fact("KO", "2023-03-31", "2024-02-20", 9.0),
            fact("KO", "2023-06-30", "2023-07-27", 2.0),
        ];

        let once = deduplicate(facts);
        let twice = deduplicate(once.iter().cloned().map(CanonicalFact::into_inner));
        assert_eq!(once, twice);
    }
}
