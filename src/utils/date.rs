//! Calendar date parsing and month keys.
//!
//! Front-matter dates come in many textual shapes; anything that carries a
//! calendar day is accepted and reduced to a `NaiveDate`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::fmt;

/// Date-only formats, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Date-time formats whose time part is discarded.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Parse a textual date in any recognized format.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Today in local time, used when a post carries no usable date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ============================================================================
// Month keys
// ============================================================================

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Source-tree directory of the month listing: `yyyy/mm`.
    pub fn dir(self) -> String {
        format!("{:04}/{:02}", self.year, self.month)
    }

    fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

/// Displays as e.g. `January 2021`.
impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first_day() {
            Some(day) => write!(f, "{}", day.format("%B %Y")),
            None => write!(f, "{:04}-{:02}", self.year, self.month),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_iso_and_slash() {
        assert_eq!(parse_date("2021-01-01"), Some(ymd(2021, 1, 1)));
        assert_eq!(parse_date("2021/02/28"), Some(ymd(2021, 2, 28)));
        assert_eq!(parse_date("  2021-03-04  "), Some(ymd(2021, 3, 4)));
    }

    #[test]
    fn test_parse_datetime_forms() {
        assert_eq!(parse_date("2021-01-01 12:30"), Some(ymd(2021, 1, 1)));
        assert_eq!(parse_date("2021-01-01 12:30:45"), Some(ymd(2021, 1, 1)));
        assert_eq!(parse_date("2021-01-01T23:59:59+02:00"), Some(ymd(2021, 1, 1)));
        assert_eq!(parse_date("2021-01-01T08:00:00Z"), Some(ymd(2021, 1, 1)));
    }

    #[test]
    fn test_parse_textual_forms() {
        assert_eq!(parse_date("January 5, 2021"), Some(ymd(2021, 1, 5)));
        assert_eq!(parse_date("Feb 7, 2021"), Some(ymd(2021, 2, 7)));
        assert_eq!(parse_date("9 March 2021"), Some(ymd(2021, 3, 9)));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2021-13-01"), None);
        assert_eq!(parse_date("2021-02-30"), None);
    }

    #[test]
    fn test_year_month_display_and_dir() {
        let jan = YearMonth::of(ymd(2021, 1, 15));
        assert_eq!(jan.to_string(), "January 2021");
        assert_eq!(jan.dir(), "2021/01");
    }

    #[test]
    fn test_year_month_ordering() {
        let dec = YearMonth::of(ymd(2020, 12, 31));
        let jan = YearMonth::of(ymd(2021, 1, 1));
        let feb = YearMonth::of(ymd(2021, 2, 1));
        assert!(dec < jan && jan < feb);
    }
}
