//! Yahoo Finance price provider.
//!
//! Reads daily adjusted closes from the v8 chart API. Yahoo has no official
//! API and changes its payload without notice; the CSV price source is the
//! fallback when it is unavailable.

use super::http::{FetchSettings, HttpClient};
use super::provider::{FetchError, PriceProvider};
use crate::domain::PriceQuote;
use chrono::NaiveDate;
use serde::Deserialize;

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Daily adjusted closes from Yahoo Finance.
#[derive(Debug)]
pub struct YahooPriceProvider {
    http: HttpClient,
}

impl YahooPriceProvider {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let http = HttpClient::new(
            "yahoo_finance",
            USER_AGENT,
            settings,
            settings.yahoo_requests_per_second,
        )?;
        Ok(Self { http })
    }

    fn chart_url(identifier: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{CHART_BASE_URL}/{identifier}?period1={start_ts}&period2={end_ts}\
             &interval=1d&includeAdjustedClose=true"
        )
    }
}

impl PriceProvider for YahooPriceProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_prices(
        &self,
        identifier: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceQuote>, FetchError> {
        let url = Self::chart_url(identifier, start, end);
        let chart: ChartResponse = self.http.get_json(&url).map_err(|err| match err {
            FetchError::HttpStatus { status: 404, .. } => FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            },
            other => other,
        })?;
        let quotes = parse_chart(identifier, chart)?;
        Ok(quotes
            .into_iter()
            .filter(|q| q.date >= start && q.date <= end)
            .collect())
    }
}

/// Convert a chart payload into quotes. Bars without an adjusted close are
/// skipped; a payload with no bars at all is an empty series.
pub(crate) fn parse_chart(
    identifier: &str,
    resp: ChartResponse,
) -> Result<Vec<PriceQuote>, FetchError> {
    let result = match (resp.chart.result, resp.chart.error) {
        (Some(result), _) => result,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(FetchError::IdentifierNotFound {
                identifier: identifier.to_string(),
            })
        }
        (None, Some(err)) => {
            return Err(FetchError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(FetchError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let Some(data) = result.into_iter().next() else {
        return Ok(Vec::new());
    };
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .ok_or_else(|| FetchError::ResponseFormatChanged("no adjclose indicator".into()))?;

    let mut quotes = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(adjusted_close) = adj_closes.get(i).copied().flatten() else {
            continue;
        };
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
        quotes.push(PriceQuote {
            identifier: identifier.to_string(),
            date,
            adjusted_close,
        });
    }
    Ok(quotes)
}
