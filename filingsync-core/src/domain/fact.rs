//! Disclosure facts: one reported value from a regulatory filing.

use crate::error::ParseError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Regulatory form a fact was reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    /// Form 10-Q.
    Quarterly,
    /// Form 10-K.
    Annual,
}

impl FormType {
    pub const ALL: [FormType; 2] = [FormType::Quarterly, FormType::Annual];

    /// The SEC form code (`10-Q` / `10-K`).
    pub fn form_code(self) -> &'static str {
        match self {
            FormType::Quarterly => "10-Q",
            FormType::Annual => "10-K",
        }
    }

    /// Exact form-code match. Amendments (`10-Q/A`) are not admitted.
    pub fn from_form_code(code: &str) -> Option<Self> {
        match code.trim() {
            "10-Q" => Some(FormType::Quarterly),
            "10-K" => Some(FormType::Annual),
            _ => None,
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.form_code())
    }
}

impl FromStr for FormType {
    type Err = ParseError;

    /// Accepts form codes as well as the `quarterly` / `annual` names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(form) = Self::from_form_code(s) {
            return Ok(form);
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "quarterly" => Ok(FormType::Quarterly),
            "annual" => Ok(FormType::Annual),
            _ => Err(ParseError::UnknownFormType(s.to_string())),
        }
    }
}

/// One reported financial value from a regulatory filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureFact {
    pub identifier: String,
    pub fact_name: String,
    pub form_type: FormType,
    /// Last calendar date covered by the reporting period.
    pub period_end: NaiveDate,
    /// Date the filing was submitted.
    pub filed_date: NaiveDate,
    pub value: f64,
}

/// The single surviving fact for an (`identifier`, `period_end`) pair.
///
/// Only [`crate::dedup::deduplicate`] constructs these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalFact(DisclosureFact);

impl CanonicalFact {
    pub(crate) fn new(fact: DisclosureFact) -> Self {
        Self(fact)
    }

    pub fn into_inner(self) -> DisclosureFact {
        self.0
    }
}

impl Deref for CanonicalFact {
    type Target = DisclosureFact;

    fn deref(&self) -> &DisclosureFact {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_codes_roundtrip() {
        for form in FormType::ALL {
            assert_eq!(FormType::from_form_code(form.form_code()), Some(form));
        }
    }

    #[test]
    fn amendments_are_not_admitted() {
        assert_eq!(FormType::from_form_code("10-Q/A"), None);
        assert_eq!(FormType::from_form_code("8-K"), None);
    }

    #[test]
    fn parses_names_and_codes() {
        assert_eq!("annual".parse::<FormType>().unwrap(), FormType::Annual);
        assert_eq!("10-Q".parse::<FormType>().unwrap(), FormType::Quarterly);
        assert!(matches!(
            "20-F".parse::<FormType>(),
            Err(ParseError::UnknownFormType(_))
        ));
    }
}
