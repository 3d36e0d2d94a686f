//! Calendar month key used by month filters and per-month overrides.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static MONTH_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])$").expect("valid month key regex"));

/// One calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    /// Returns whether `date` falls inside this month.
    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let caps = MONTH_KEY_RE
            .captures(value.trim())
            .ok_or_else(|| format!("invalid month key `{value}`; expected YYYY-MM"))?;
        let year = caps[1]
            .parse::<i32>()
            .map_err(|err| format!("invalid year in `{value}`: {err}"))?;
        let month = caps[2]
            .parse::<u32>()
            .map_err(|err| format!("invalid month in `{value}`: {err}"))?;
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::YearMonth;
    use chrono::NaiveDate;

    #[test]
    fn parses_and_renders_month_keys() {
        let month: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(month.year(), 2024);
        assert_eq!(month.month(), 2);
        assert_eq!(month.to_string(), "2024-02");
    }

    #[test]
    fn rejects_out_of_range_months() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024-2".parse::<YearMonth>().is_err());
        assert!(YearMonth::new(2024, 0).is_none());
    }

    #[test]
    fn contains_matches_calendar_month_only() {
        let month = YearMonth::new(2024, 2).unwrap();
        assert!(month.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!month.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }
}
