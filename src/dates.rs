//! Date extraction for feed timestamps and scraped page text.
//!
//! Sources disagree wildly on how they print dates: feeds use RFC 2822
//! (`Thu, 16 Oct 2025 08:30:00 +0000`) or RFC 3339, news pages print things
//! like `October 16, 2025`, `Sept. 5, 2025` or `Published 2025-10-16`.
//! Everything here reduces those to a [`NaiveDate`], since dedupe and
//! "is it today" only care about the calendar day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d %Y",
    "%b %d %Y",
];

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid ISO date regex"));

static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("valid month-first regex")
});

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b")
        .expect("valid day-first regex")
});

static YMD_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})/(\d{1,2})/(\d{1,2})\b").expect("valid y/m/d regex"));

static US_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid m/d/y regex"));

/// Parse a human-facing date string, searching inside it if needed.
///
/// Full timestamps keep the calendar day of their own offset. When the
/// whole string is not a date, the first recognisable date inside it wins,
/// trying ISO, then month-name-first, day-first, `YYYY/MM/DD` and finally
/// US `MM/DD/YYYY`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_date("Oct 16, 2025"), NaiveDate::from_ymd_opt(2025, 10, 16));
/// assert_eq!(parse_date("Posted 2025-10-16 by staff"), NaiveDate::from_ymd_opt(2025, 10, 16));
/// assert_eq!(parse_date("soon"), None);
/// ```
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    fuzzy_search(s)
}

/// Parse a feed timestamp (`pubDate`, `published`, `updated`).
///
/// Proper RFC 2822 / RFC 3339 stamps are normalised to UTC before the day
/// is taken; anything else goes through [`parse_date`].
pub fn parse_feed_timestamp(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    parse_date(s)
}

fn fuzzy_search(s: &str) -> Option<NaiveDate> {
    for caps in ISO_DATE.captures_iter(s) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(d);
        }
    }
    for caps in MONTH_FIRST.captures_iter(s) {
        if let Some(month) = month_from_name(&caps[1]) {
            if let Some(d) = ymd(&caps[3], &month.to_string(), &caps[2]) {
                return Some(d);
            }
        }
    }
    for caps in DAY_FIRST.captures_iter(s) {
        if let Some(month) = month_from_name(&caps[2]) {
            if let Some(d) = ymd(&caps[3], &month.to_string(), &caps[1]) {
                return Some(d);
            }
        }
    }
    for caps in YMD_SLASH.captures_iter(s) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(d);
        }
    }
    for caps in US_SLASH.captures_iter(s) {
        if let Some(d) = ymd(&caps[3], &caps[1], &caps[2]) {
            return Some(d);
        }
    }
    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// 1-based month for any prefix (three letters or more) of an English month name.
fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&lower))
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(parse_date("Thu, 16 Oct 2025 08:30:00 +0000"), d(2025, 10, 16));
        assert_eq!(parse_date("Thu, 16 Oct 2025 08:30:00 GMT"), d(2025, 10, 16));
    }

    #[test]
    fn test_rfc3339_keeps_own_offset() {
        assert_eq!(parse_date("2025-10-16T23:30:00-05:00"), d(2025, 10, 16));
    }

    #[test]
    fn test_feed_timestamp_normalises_to_utc() {
        assert_eq!(
            parse_feed_timestamp("2025-10-16T23:30:00-05:00"),
            d(2025, 10, 17)
        );
        assert_eq!(
            parse_feed_timestamp("Fri, 17 Oct 2025 01:00:00 +0200"),
            d(2025, 10, 16)
        );
    }

    #[test]
    fn test_feed_timestamp_falls_back_to_fuzzy() {
        assert_eq!(parse_feed_timestamp("2025-10-16"), d(2025, 10, 16));
        assert_eq!(parse_feed_timestamp("garbage"), None);
    }

    #[test]
    fn test_month_name_formats() {
        assert_eq!(parse_date("October 16, 2025"), d(2025, 10, 16));
        assert_eq!(parse_date("Oct 16, 2025"), d(2025, 10, 16));
        assert_eq!(parse_date("Sept. 5, 2025"), d(2025, 9, 5));
        assert_eq!(parse_date("October 1st, 2025"), d(2025, 10, 1));
        assert_eq!(parse_date("16 October 2025"), d(2025, 10, 16));
        assert_eq!(parse_date("1st Oct 2025"), d(2025, 10, 1));
    }

    #[test]
    fn test_numeric_formats() {
        assert_eq!(parse_date("2025-10-16"), d(2025, 10, 16));
        assert_eq!(parse_date("2025-10-16 14:00:00"), d(2025, 10, 16));
        assert_eq!(parse_date("2025/10/16"), d(2025, 10, 16));
        assert_eq!(parse_date("10/16/2025"), d(2025, 10, 16));
    }

    #[test]
    fn test_fuzzy_search_inside_text() {
        assert_eq!(parse_date("Published on 2025-10-16 by staff"), d(2025, 10, 16));
        assert_eq!(parse_date("Patch notes | Updated Oct 16, 2025"), d(2025, 10, 16));
        assert_eq!(parse_date("Thursday, 16 October 2025 - News"), d(2025, 10, 16));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_date("\n   October 16, 2025  \t"), d(2025, 10, 16));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("coming soon"), None);
        assert_eq!(parse_date("February 30, 2025"), None);
        assert_eq!(parse_date("2025-13-45"), None);
    }

    #[test]
    fn test_month_from_name() {
        assert_eq!(month_from_name("Jan"), Some(1));
        assert_eq!(month_from_name("sept"), Some(9));
        assert_eq!(month_from_name("DECEMBER"), Some(12));
        assert_eq!(month_from_name("mon"), None);
        assert_eq!(month_from_name("ma"), None);
        assert_eq!(month_from_name("augusta"), None);
    }
}
