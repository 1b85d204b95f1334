//! Day-of-year date tokens used by the MODIS web service.
//!
//! The service identifies composites with tokens such as `A2006100`: a
//! single marker character followed by a four digit year and a three digit
//! day of year. Comparisons are made on the decoded integer `YYYYDDD`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ModisError, Result};

/// A server-native date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateToken {
    /// Leading marker character (`A` for acquisition dates)
    pub marker: char,
    pub year: i32,
    pub day_of_year: u32,
}

impl DateToken {
    pub fn new(marker: char, year: i32, day_of_year: u32) -> Self {
        Self {
            marker,
            year,
            day_of_year,
        }
    }

    /// Decode to the integer form `YYYYDDD` used for ordering.
    pub fn as_int(&self) -> i64 {
        self.year as i64 * 1000 + self.day_of_year as i64
    }

    /// Convert to a calendar date.
    pub fn to_naive_date(&self) -> Result<NaiveDate> {
        NaiveDate::from_yo_opt(self.year, self.day_of_year).ok_or_else(|| {
            ModisError::InvalidDateToken(format!(
                "day {} does not exist in year {}",
                self.day_of_year, self.year
            ))
        })
    }
}

impl FromStr for DateToken {
    type Err = ModisError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let marker = chars
            .next()
            .ok_or_else(|| ModisError::InvalidDateToken("empty date token".to_string()))?;
        let digits = chars.as_str();

        if digits.len() != 7 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModisError::InvalidDateToken(s.to_string()));
        }

        let year: i32 = digits[..4]
            .parse()
            .map_err(|_| ModisError::InvalidDateToken(s.to_string()))?;
        let day_of_year: u32 = digits[4..]
            .parse()
            .map_err(|_| ModisError::InvalidDateToken(s.to_string()))?;

        if !(1..=366).contains(&day_of_year) {
            return Err(ModisError::InvalidDateToken(s.to_string()));
        }

        Ok(Self::new(marker, year, day_of_year))
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}{:03}", self.marker, self.year, self.day_of_year)
    }
}

impl TryFrom<String> for DateToken {
    type Error = ModisError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DateToken> for String {
    fn from(token: DateToken) -> Self {
        token.to_string()
    }
}

/// Parse a list of raw server tokens, failing on the first malformed one.
pub fn parse_date_list<S: AsRef<str>>(raw: &[S]) -> Result<Vec<DateToken>> {
    raw.iter().map(|s| s.as_ref().trim().parse()).collect()
}

/// Parse a user supplied date into `YYYYDDD`.
///
/// Accepts either the compact form (`2006100`) or an ISO calendar date
/// (`2006-04-10`).
pub fn parse_date_arg(s: &str) -> Result<i64> {
    let s = s.trim();

    if s.contains('-') {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| ModisError::InvalidDateToken(format!("{}: {}", s, e)))?;
        return Ok(date.year() as i64 * 1000 + date.ordinal() as i64);
    }

    if s.len() != 7 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModisError::InvalidDateToken(format!(
            "{}: expected YYYYDDD or YYYY-MM-DD",
            s
        )));
    }

    // Reuse token validation for the day-of-year range.
    let token: DateToken = format!("A{}", s).parse()?;
    token.to_naive_date()?;
    Ok(token.as_int())
}
