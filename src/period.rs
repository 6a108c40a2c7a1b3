// 📅 Month Periods - shared month-granularity date utilities
//
// Every comparison in the escalation core happens at month granularity:
// "2024-03" and any day within March 2024 are the same month.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// YEAR-MONTH
// ============================================================================

/// A calendar month, i.e. a date truncated to the first of the month.
///
/// Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Build from numeric parts; `None` when the month is out of 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    /// Truncate a date to its month
    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse user-entered month text.
    ///
    /// Accepts `YYYY-MM` and `YYYY-MM-DD` (the day is validated, then
    /// discarded). Surrounding whitespace is ignored; blank input is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        let date = match text.matches('-').count() {
            1 => NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d").ok()?,
            2 => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?,
            _ => return None,
        };

        Some(Self::from_date(date))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of this month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Shift forward by `months` calendar months
    pub fn add_months(&self, months: u32) -> Self {
        let zero_based = self.index() + i64::from(months);
        Self::from_index(zero_based)
    }

    /// The month right after this one
    pub fn succ(&self) -> Self {
        self.add_months(1)
    }

    /// Number of months from `self` to `other` (negative when `other` is earlier)
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        other.index() - self.index()
    }

    fn index(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_index(index: i64) -> Self {
        YearMonth {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        YearMonth::parse(&value).ok_or_else(|| format!("not a YYYY-MM month: {:?}", value))
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        YearMonth::from_date(date)
    }
}

// ============================================================================
// PERIOD
// ============================================================================

/// Closed month interval `[start, end]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: YearMonth,
    end: YearMonth,
}

impl Period {
    /// `None` when `end` is before `start`
    pub fn new(start: YearMonth, end: YearMonth) -> Option<Self> {
        if end < start {
            None
        } else {
            Some(Period { start, end })
        }
    }

    /// Parse a stored `YYYY-MM` pair; `None` for malformed or inverted pairs
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Period::new(YearMonth::parse(start)?, YearMonth::parse(end)?)
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    /// Two periods overlap when `max(starts) <= min(ends)`.
    /// A single shared boundary month counts as overlap.
    pub fn overlaps(&self, other: &Period) -> bool {
        self.start.max(other.start) <= self.end.min(other.end)
    }

    /// True when this period lies entirely inside `[first, last]`
    pub fn within(&self, first: YearMonth, last: YearMonth) -> bool {
        self.start >= first && self.end <= last
    }

    /// Number of months covered (always >= 1)
    pub fn len_months(&self) -> usize {
        (self.start.months_until(&self.end) + 1) as usize
    }

    /// Every month of the period, in order
    pub fn months(&self) -> impl Iterator<Item = YearMonth> {
        let start = self.start;
        (0..self.len_months() as u32).map(move |offset| start.add_months(offset))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(text: &str) -> YearMonth {
        YearMonth::parse(text).unwrap()
    }

    #[test]
    fn test_parse_month_and_full_date() {
        assert_eq!(ym("2024-03"), YearMonth::new(2024, 3).unwrap());
        assert_eq!(ym("2024-03-17"), ym("2024-03"));
        assert_eq!(ym("  2024-12 "), YearMonth::new(2024, 12).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(YearMonth::parse("").is_none());
        assert!(YearMonth::parse("   ").is_none());
        assert!(YearMonth::parse("2024").is_none());
        assert!(YearMonth::parse("2024-13").is_none());
        assert!(YearMonth::parse("2024-02-30").is_none());
        assert!(YearMonth::parse("march").is_none());
    }

    #[test]
    fn test_add_months_crosses_year() {
        assert_eq!(ym("2024-11").add_months(3), ym("2025-02"));
        assert_eq!(ym("2024-01").add_months(12), ym("2025-01"));
        assert_eq!(ym("2024-12").succ(), ym("2025-01"));
        assert_eq!(ym("2024-05").add_months(0), ym("2024-05"));
    }

    #[test]
    fn test_months_until() {
        assert_eq!(ym("2024-01").months_until(&ym("2024-04")), 3);
        assert_eq!(ym("2024-04").months_until(&ym("2024-01")), -3);
        assert_eq!(ym("2023-12").months_until(&ym("2024-01")), 1);
    }

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(ym("2024-3").to_string(), "2024-03");
        assert_eq!(Period::parse("2024-01", "2024-03").unwrap().to_string(), "2024-01..2024-03");
    }

    #[test]
    fn test_period_rejects_inverted() {
        assert!(Period::parse("2024-05", "2024-04").is_none());
        assert!(Period::parse("2024-05", "2024-05").is_some());
    }

    #[test]
    fn test_overlap_shared_boundary_month() {
        let history = Period::parse("2024-01", "2024-03").unwrap();
        let proposed = Period::parse("2024-03", "2024-05").unwrap();
        let after = Period::parse("2024-04", "2024-06").unwrap();

        assert!(history.overlaps(&proposed));
        assert!(proposed.overlaps(&history));
        assert!(!history.overlaps(&after));
    }

    #[test]
    fn test_period_months_and_len() {
        let period = Period::parse("2024-11", "2025-01").unwrap();
        let months: Vec<String> = period.months().map(|m| m.to_string()).collect();

        assert_eq!(period.len_months(), 3);
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01"]);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ym("2024-07")).unwrap();
        assert_eq!(json, "\"2024-07\"");

        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2024-07"));
        assert!(serde_json::from_str::<YearMonth>("\"07/2024\"").is_err());
    }
}
