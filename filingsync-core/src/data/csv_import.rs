//! Offline providers backed by CSV files.
//!
//! `CsvFactSource` reads the same layout a run writes to `assets_data.csv`:
//! `identifier,fact_name,form_type,period_end,filed_date,value`.
//! `CsvPriceSource` reads `identifier,date,adjusted_close`.

use super::provider::{FactProvider, FactRequest, FetchError, PriceProvider};
use crate::calendar::parse_date;
use crate::domain::{DisclosureFact, FormType, PriceQuote};
use crate::error::ParseError;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Rows grouped by identifier. An identifier with an unparseable row holds
/// the first error instead of its rows; other identifiers are unaffected.
type Grouped<T> = HashMap<String, Result<Vec<T>, ParseError>>;

/// One CSV row type and how it becomes a domain value.
trait CsvRow: DeserializeOwned {
    type Output;

    fn parse(self) -> Result<Self::Output, ParseError>;
}

#[derive(Debug, Deserialize)]
struct FactRow {
    identifier: String,
    fact_name: String,
    form_type: String,
    period_end: String,
    filed_date: String,
    value: String,
}

impl CsvRow for FactRow {
    type Output = DisclosureFact;

    fn parse(self) -> Result<DisclosureFact, ParseError> {
        Ok(DisclosureFact {
            identifier: key(&self.identifier),
            fact_name: self.fact_name,
            form_type: self.form_type.parse::<FormType>()?,
            period_end: parse_date(&self.period_end)?,
            filed_date: parse_date(&self.filed_date)?,
            value: parse_value("value", &self.value)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    identifier: String,
    date: String,
    adjusted_close: String,
}

impl CsvRow for PriceRow {
    type Output = PriceQuote;

    fn parse(self) -> Result<PriceQuote, ParseError> {
        Ok(PriceQuote {
            identifier: key(&self.identifier),
            date: parse_date(&self.date)?,
            adjusted_close: parse_value("adjusted_close", &self.adjusted_close)?,
        })
    }
}

fn parse_value(field: &str, input: &str) -> Result<f64, ParseError> {
    input.trim().parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        field: field.to_string(),
        input: input.to_string(),
    })
}

fn key(identifier: &str) -> String {
    identifier.trim().to_ascii_uppercase()
}

fn open(path: &Path) -> Result<std::fs::File, FetchError> {
    std::fs::File::open(path)
        .map_err(|e| FetchError::SourceUnavailable(format!("{}: {e}", path.display())))
}

fn insert<T>(grouped: &mut Grouped<T>, identifier: String, row: Result<T, ParseError>) {
    let slot = grouped.entry(identifier).or_insert_with(|| Ok(Vec::new()));
    match row {
        Ok(row) => {
            if let Ok(rows) = slot {
                rows.push(row);
            }
        }
        Err(err) => {
            if slot.is_ok() {
                *slot = Err(err);
            }
        }
    }
}

/// Read every row, grouping by the `identifier` column.
///
/// Only file-level problems fail the read: an unreadable header, a missing
/// `identifier` column, or an I/O error. Rows without an identifier are
/// skipped.
fn read_grouped<Row: CsvRow, R: Read>(reader: R) -> Result<Grouped<Row::Output>, FetchError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| FetchError::SourceUnavailable(format!("unreadable CSV header: {e}")))?
        .clone();
    let identifier_col = headers
        .iter()
        .position(|h| h.trim() == "identifier")
        .ok_or_else(|| FetchError::Malformed(ParseError::MissingField("identifier".into())))?;

    let mut grouped = Grouped::new();
    for record in rdr.records() {
        let record = record.map_err(|e| FetchError::SourceUnavailable(e.to_string()))?;
        let line = record.position().map_or(0, |p| p.line());
        let Some(identifier) = record
            .get(identifier_col)
            .map(key)
            .filter(|id| !id.is_empty())
        else {
            tracing::warn!(line, "skipping CSV row without an identifier");
            continue;
        };

        let row = record
            .deserialize::<Row>(Some(&headers))
            .map_err(|e| ParseError::InvalidRow {
                line,
                reason: e.to_string(),
            })
            .and_then(Row::parse);
        if let Err(err) = &row {
            tracing::warn!(identifier = %identifier, line, error = %err, "unparseable CSV row");
        }
        insert(&mut grouped, identifier, row);
    }
    Ok(grouped)
}

/// Disclosure facts loaded from a CSV file, grouped by identifier.
#[derive(Debug, Clone, Default)]
pub struct CsvFactSource {
    facts: Grouped<DisclosureFact>,
}

impl CsvFactSource {
    pub fn from_path(path: &Path) -> Result<Self, FetchError> {
        Self::from_reader(open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FetchError> {
        Ok(Self {
            facts: read_grouped::<FactRow, R>(reader)?,
        })
    }

    /// Every identifier in the file, including ones with unparseable rows.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.facts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl FactProvider for CsvFactSource {
    fn name(&self) -> &str {
        "csv_facts"
    }

    fn fetch_facts(
        &self,
        identifier: &str,
        request: &FactRequest,
    ) -> Result<Vec<DisclosureFact>, FetchError> {
        match self.facts.get(&key(identifier)) {
            None => Err(FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            }),
            Some(Err(err)) => Err(FetchError::Malformed(err.clone())),
            Some(Ok(facts)) => Ok(facts.iter().filter(|f| request.admits(f)).cloned().collect()),
        }
    }
}

/// Adjusted-close quotes loaded from a CSV file, grouped by identifier.
#[derive(Debug, Clone, Default)]
pub struct CsvPriceSource {
    quotes: Grouped<PriceQuote>,
}

impl CsvPriceSource {
    pub fn from_path(path: &Path) -> Result<Self, FetchError> {
        Self::from_reader(open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FetchError> {
        Ok(Self {
            quotes: read_grouped::<PriceRow, R>(reader)?,
        })
    }
}

impl PriceProvider for CsvPriceSource {
    fn name(&self) -> &str {
        "csv_prices"
    }

    /// Unknown identifiers have no trading history: an empty series.
    fn fetch_prices(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceQuote>, FetchError> {
        match self.quotes.get(&key(identifier)) {
            None => Ok(Vec::new()),
            Some(Err(err)) => Err(FetchError::Malformed(err.clone())),
            Some(Ok(quotes)) => Ok(quotes
                .iter()
                .filter(|q| q.date >= start && q.date <= end)
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTS: &str = "\
identifier,fact_name,form_type,period_end,filed_date,value
MMM,Assets,10-K,2015-12-31,2016-02-09,32718000000
mmm,Assets,10-Q,2016-03-31,2016-05-05,33000000000
KO,Assets,10-Q,2016-04-01,2016-04-28,9.1e10
";

    const PRICES: &str = "\
identifier,date,adjusted_close
MMM,2016-02-09,130.5
MMM,2016-05-05,145.25
MMM,2016-08-04,160.0
";

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn facts_group_by_normalized_identifier() {
        let source = CsvFactSource::from_reader(FACTS.as_bytes()).unwrap();
        assert_eq!(source.identifiers(), vec!["KO", "MMM"]);

        let request = FactRequest::new("Assets", d("2016-01-01"));
        let facts = source.fetch_facts("mmm", &request).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1].form_type, FormType::Quarterly);
        assert_eq!(facts[0].value, 32_718_000_000.0);
    }

    #[test]
    fn unknown_fact_identifier_is_not_found() {
        let source = CsvFactSource::from_reader(FACTS.as_bytes()).unwrap();
        let request = FactRequest::new("Assets", d("2016-01-01"));
        assert!(matches!(
            source.fetch_facts("IBM", &request),
            Err(FetchError::IdentifierNotFound { .. })
        ));
    }

    #[test]
    fn bad_row_poisons_only_its_identifier() {
        let csv = "identifier,fact_name,form_type,period_end,filed_date,value\n\
                   MMM,Assets,10-K,2015-12-31,2016-02-09,32718000000\n\
                   KO,Assets,10-Q,2016-04-01,2016-04-28,9.1e10\n\
                   BAD,Assets,10-K,2015-13-45,2016-02-09,1\n\
                   BAD,Assets,10-Q,2016-03-31,2016-05-05,2\n";
        let source = CsvFactSource::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(source.identifiers(), vec!["BAD", "KO", "MMM"]);

        let request = FactRequest::new("Assets", d("2016-01-01"));
        assert_eq!(source.fetch_facts("MMM", &request).unwrap().len(), 1);
        assert_eq!(source.fetch_facts("KO", &request).unwrap().len(), 1);
        assert!(matches!(
            source.fetch_facts("BAD", &request),
            Err(FetchError::Malformed(ParseError::InvalidDate { .. }))
        ));
    }

    #[test]
    fn unknown_form_type_and_short_rows_stay_per_identifier() {
        let csv = "identifier,fact_name,form_type,period_end,filed_date,value\n\
                   XYZ,Assets,8-K,2015-12-31,2016-02-09,1\n\
                   SHORT,Assets,10-K\n\
                   MMM,Assets,10-K,2015-12-31,2016-02-09,1\n";
        let source = CsvFactSource::from_reader(csv.as_bytes()).unwrap();
        let request = FactRequest::new("Assets", d("2015-01-01"));

        assert!(matches!(
            source.fetch_facts("XYZ", &request),
            Err(FetchError::Malformed(ParseError::UnknownFormType(_)))
        ));
        assert!(matches!(
            source.fetch_facts("SHORT", &request),
            Err(FetchError::Malformed(ParseError::InvalidRow { line: 3, .. }))
        ));
        assert_eq!(source.fetch_facts("MMM", &request).unwrap().len(), 1);
    }

    #[test]
    fn bad_price_row_poisons_only_its_identifier() {
        let csv = "identifier,date,adjusted_close\n\
                   MMM,2016-02-09,130.5\n\
                   KO,2016-02-09,n/a\n";
        let source = CsvPriceSource::from_reader(csv.as_bytes()).unwrap();
        let (start, end) = (d("2016-01-01"), d("2016-12-31"));

        assert_eq!(source.fetch_prices("MMM", start, end).unwrap().len(), 1);
        assert!(matches!(
            source.fetch_prices("KO", start, end),
            Err(FetchError::Malformed(ParseError::InvalidNumber { .. }))
        ));
    }

    #[test]
    fn missing_identifier_column_fails_the_file() {
        let csv = "ticker,date,adjusted_close\nMMM,2016-02-09,1\n";
        assert!(matches!(
            CsvPriceSource::from_reader(csv.as_bytes()),
            Err(FetchError::Malformed(ParseError::MissingField(_)))
        ));
    }

    #[test]
    fn prices_respect_inclusive_range() {
        let source = CsvPriceSource::from_reader(PRICES.as_bytes()).unwrap();
        let quotes = source
            .fetch_prices("MMM", d("2016-02-09"), d("2016-05-05"))
            .unwrap();
        assert_eq!(quotes.len(), 2);
        assert!(source
            .fetch_prices("IBM", d("2016-01-01"), d("2016-12-31"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = CsvPriceSource::from_path(Path::new("/nonexistent/prices.csv")).unwrap_err();
        assert!(matches!(err, FetchError::SourceUnavailable(_)));
    }
}
