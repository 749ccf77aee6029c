//! Business-day adjustment.
//!
//! Maps an arbitrary calendar date onto the next valid trading day. The
//! minimal calendar only rolls weekends forward; the US equity calendar also
//! skips NYSE full-day closures, computed by rule rather than a fixed table so
//! it covers any filing year.
//!
//! Both calendars are total and idempotent: `adjust` always lands on a
//! weekday and `adjust(adjust(d)) == adjust(d)`.

use crate::error::ParseError;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which days count as trading days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessCalendar {
    /// Monday–Friday.
    #[default]
    WeekendsOnly,
    /// Monday–Friday excluding NYSE full-day holidays and special closures.
    UsEquity,
}

impl BusinessCalendar {
    pub fn is_business_day(self, date: NaiveDate) -> bool {
        if is_weekend(date) {
            return false;
        }
        match self {
            BusinessCalendar::WeekendsOnly => true,
            BusinessCalendar::UsEquity => !is_us_equity_holiday(date),
        }
    }

    /// Returns `date` if it is a business day, otherwise the next business
    /// day strictly after it.
    pub fn adjust(self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        while !self.is_business_day(day) {
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        day
    }

    /// Parse a `YYYY-MM-DD` string and adjust it.
    pub fn adjust_str(self, input: &str) -> Result<NaiveDate, ParseError> {
        parse_date(input).map(|date| self.adjust(date))
    }
}

/// Parse a calendar date. Accepts `YYYY-MM-DD`, optionally followed by a
/// time component (`2024-01-06T00:00:00`, `2024-01-06 00:00:00`).
pub fn parse_date(input: &str) -> Result<NaiveDate, ParseError> {
    let trimmed = input.trim();
    let date_part = trimmed
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| ParseError::InvalidDate {
        input: input.to_string(),
    })
}

/// Weekend-only adjustment of a date string, formatted back as `YYYY-MM-DD`.
pub fn adjust_to_next_business_day(input: &str) -> Result<String, ParseError> {
    BusinessCalendar::WeekendsOnly
        .adjust_str(input)
        .map(|date| date.format(DATE_FORMAT).to_string())
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ── NYSE holiday rules ───────────────────────────────────────────────

/// Unscheduled full-day closures since 1994, the first year of EDGAR filings.
const SPECIAL_CLOSURES: &[(i32, u32, u32)] = &[
    (1994, 4, 27),  // Nixon national day of mourning
    (2001, 9, 11),
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),  // Reagan national day of mourning
    (2007, 1, 2),   // Ford national day of mourning
    (2012, 10, 29), // Hurricane Sandy
    (2012, 10, 30),
    (2018, 12, 5),  // G.H.W. Bush national day of mourning
    (2025, 1, 9),   // Carter national day of mourning
];

fn is_us_equity_holiday(date: NaiveDate) -> bool {
    let special = SPECIAL_CLOSURES
        .iter()
        .any(|&(y, m, d)| date.year() == y && date.month() == m && date.day() == d);
    special || us_equity_holidays(date.year()).contains(&date)
}

/// Observed NYSE full-day holidays falling in `year`.
fn us_equity_holidays(year: i32) -> Vec<NaiveDate> {
    let ymd = |month, day| NaiveDate::from_ymd_opt(year, month, day);
    let nth = |month, weekday, n| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n);

    let mut days = vec![
        // New Year's Day: Sunday rolls to Monday; Saturday is not observed.
        ymd(1, 1).and_then(|d| match d.weekday() {
            Weekday::Sat => None,
            Weekday::Sun => d.succ_opt(),
            _ => Some(d),
        }),
        nth(2, Weekday::Mon, 3),
        easter_sunday(year).and_then(|d| d.pred_opt()).and_then(|d| d.pred_opt()),
        last_weekday_of_month(year, 5, Weekday::Mon),
        ymd(7, 4).and_then(observed),
        nth(9, Weekday::Mon, 1),
        nth(11, Weekday::Thu, 4),
        ymd(12, 25).and_then(observed),
    ];
    if year >= 1998 {
        days.push(nth(1, Weekday::Mon, 3));
    }
    if year >= 2022 {
        days.push(ymd(6, 19).and_then(observed));
    }

    days.into_iter().flatten().collect()
}

/// Saturday holidays are observed on Friday, Sunday holidays on Monday.
fn observed(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let mut day = first_of_next?.pred_opt()?;
    while day.weekday() != weekday {
        day = day.pred_opt()?;
    }
    Some(day)
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn weekday_is_unchanged() {
        let wed = date("2024-01-03");
        assert_eq!(BusinessCalendar::WeekendsOnly.adjust(wed), wed);
    }

    #[test]
    fn saturday_rolls_to_monday() {
        assert_eq!(
            adjust_to_next_business_day("2024-01-06").unwrap(),
            "2024-01-08"
        );
    }

    #[test]
    fn sunday_rolls_to_monday() {
        assert_eq!(
            BusinessCalendar::WeekendsOnly.adjust(date("2024-01-07")),
            date("2024-01-08")
        );
    }

    #[test]
    fn weekend_only_ignores_holidays() {
        // 2024-01-01 is New Year's Day, a Monday.
        let new_year = date("2024-01-01");
        assert_eq!(BusinessCalendar::WeekendsOnly.adjust(new_year), new_year);
        assert_eq!(BusinessCalendar::UsEquity.adjust(new_year), date("2024-01-02"));
    }

    #[test]
    fn weekend_before_holiday_monday_skips_both() {
        // Saturday 2024-01-13 → MLK Day Monday 01-15 is closed → Tuesday.
        assert_eq!(
            BusinessCalendar::UsEquity.adjust(date("2024-01-13")),
            date("2024-01-16")
        );
    }

    #[test]
    fn good_friday_is_closed() {
        assert_eq!(easter_sunday(2024), Some(date("2024-03-31")));
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2024-03-29")));
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2025-04-18")));
    }

    #[test]
    fn observed_fixed_holidays() {
        // July 4 2026 is a Saturday, observed Friday July 3.
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2026-07-03")));
        // Christmas 2022 is a Sunday, observed Monday Dec 26.
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2022-12-26")));
        // New Year's 2022 is a Saturday, Friday 2021-12-31 stays open.
        assert!(BusinessCalendar::UsEquity.is_business_day(date("2021-12-31")));
    }

    #[test]
    fn special_closures_cover_every_filing_year() {
        // Wednesday 1994-04-27 was a day of mourning.
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("1994-04-27")));
        assert_eq!(
            BusinessCalendar::UsEquity.adjust(date("1994-04-27")),
            date("1994-04-28")
        );
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2001-09-11")));
    }

    #[test]
    fn juneteenth_only_from_2022() {
        assert!(BusinessCalendar::UsEquity.is_business_day(date("2020-06-19")));
        assert!(!BusinessCalendar::UsEquity.is_business_day(date("2023-06-19")));
    }

    #[test]
    fn holiday_table_matches_known_2025_closures() {
        let expected = [
            "2025-01-01", "2025-01-20", "2025-02-17", "2025-04-18", "2025-05-26",
            "2025-06-19", "2025-07-04", "2025-09-01", "2025-11-27", "2025-12-25",
        ];
        let mut actual = us_equity_holidays(2025);
        actual.sort();
        let expected: Vec<NaiveDate> = expected.iter().map(|s| date(s)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn special_closures_are_skipped() {
        assert_eq!(
            BusinessCalendar::UsEquity.adjust(date("2012-10-29")),
            date("2012-10-31")
        );
    }

    #[test]
    fn parse_accepts_timestamps_and_rejects_garbage() {
        assert_eq!(date("2024-01-06T00:00:00"), date("2024-01-06"));
        assert!(matches!(
            parse_date("2024-02-30"),
            Err(ParseError::InvalidDate { .. })
        ));
        assert!(BusinessCalendar::WeekendsOnly.adjust_str("not a date").is_err());
    }
}
