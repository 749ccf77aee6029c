//! Interperiod returns over aligned quote series.
//!
//! Returns are computed per identifier. The first element of every series has
//! a null return, so no value ever crosses an identifier boundary.

use crate::domain::{AlignedRecord, AnchoredQuote, ReturnFlag};
use crate::error::DivisionByZeroError;
use std::collections::BTreeMap;

/// Fractional change from `previous` to `current`.
///
/// A zero `previous` is a `DivisionByZero` flag; a NaN on either side is a
/// `MissingPrice` flag.
pub fn pct_change(previous: f64, current: f64) -> Result<f64, ReturnFlag> {
    if previous.is_nan() || current.is_nan() {
        return Err(ReturnFlag::MissingPrice);
    }
    if previous == 0.0 {
        return Err(ReturnFlag::DivisionByZero);
    }
    Ok((current - previous) / previous)
}

/// Return and flag for each element of one ordered close series.
pub fn interperiod_returns(closes: &[f64]) -> Vec<(Option<f64>, Option<ReturnFlag>)> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push((None, None));
    for pair in closes.windows(2) {
        match pct_change(pair[0], pair[1]) {
            Ok(r) => out.push((Some(r), None)),
            Err(flag) => out.push((None, Some(flag))),
        }
    }
    out
}

/// Build aligned records for every identifier.
///
/// Each series must already be ordered ascending by quote date.
pub fn compute_returns(
    aligned_by_identifier: &BTreeMap<String, Vec<AnchoredQuote>>,
) -> BTreeMap<String, Vec<AlignedRecord>> {
    aligned_by_identifier
        .iter()
        .map(|(identifier, series)| (identifier.clone(), records_for(identifier, series)))
        .collect()
}

fn records_for(identifier: &str, series: &[AnchoredQuote]) -> Vec<AlignedRecord> {
    let closes: Vec<f64> = series.iter().map(|a| a.quote.adjusted_close).collect();
    series
        .iter()
        .zip(interperiod_returns(&closes))
        .map(|(anchored, (ret, flag))| AlignedRecord {
            identifier: identifier.to_string(),
            period_end: anchored.anchor.period_end,
            filed_date: anchored.anchor.filed_date,
            adjusted_target_date: anchored.quote.date,
            adjusted_close: anchored.quote.adjusted_close,
            interperiod_return_pct: ret,
            return_flag: flag,
        })
        .collect()
}

/// Record-scoped division-by-zero errors found in computed records.
pub fn division_by_zero_errors<'a, I>(records: I) -> Vec<DivisionByZeroError>
where
    I: IntoIterator<Item = &'a AlignedRecord>,
{
    records
        .into_iter()
        .filter(|r| r.return_flag == Some(ReturnFlag::DivisionByZero))
        .map(|r| DivisionByZeroError {
            identifier: r.identifier.clone(),
            date: r.adjusted_target_date,
        })
        .collect()
}
