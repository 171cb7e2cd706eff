//! Textual date extraction from titles.
//!
//! Grant report titles frequently embed an event date ("9 July 2019,
//! Climate Change Report", "Workshop Summary (March 2017)"). The date is
//! pulled out before any other cleaning so it never pollutes the search
//! query, and it is kept as structured output.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex_lite::Regex;
use serde::Serialize;

/// A date recovered from a title. Month-only dates are common in report
/// titles, so day precision is not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractedDate {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl std::fmt::Display for ExtractedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractedDate::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ExtractedDate::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

impl Serialize for ExtractedDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which textual shape the date was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    FullDate,
    DateRange,
    MonthYear,
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.to_lowercase();
    let token = token.trim_end_matches('.');
    Some(match token {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    })
}

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})\s+([A-Za-z]+\.?)\s+(\d{4})$").unwrap());
static DATE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})[-–]\d{1,2}\s+([A-Za-z]+\.?)\s+(\d{4})$").unwrap());
static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Za-z]+\.?)\s+(\d{4})$").unwrap());

/// Parse a standalone date string such as "9 July 2019", "1-3 Mar. 2020"
/// or "March 2017". Returns `None` when the string is not a recognizable
/// textual date (for instance when the month word is not a month).
pub fn parse_date_string(date_str: &str) -> Option<(ExtractedDate, DateFormat)> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }

    for (re, format) in [(&*FULL_DATE, DateFormat::FullDate), (&*DATE_RANGE, DateFormat::DateRange)] {
        if let Some(caps) = re.captures(date_str) {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_number(&caps[2])?;
            let year: i32 = caps[3].parse().ok()?;
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            return Some((ExtractedDate::Day(date), format));
        }
    }

    if let Some(caps) = MONTH_YEAR.captures(date_str) {
        let month = month_number(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        // Reject nonsense years that are really report numbers
        NaiveDate::from_ymd_opt(year, month, 1)?;
        return Some((ExtractedDate::Month { year, month }, DateFormat::MonthYear));
    }

    None
}

static LEADING_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d{1,2}[-–]\d{1,2}\s+)?(?:\d{1,2}\s+)?[A-Za-z]+\.?\s+\d{4})[,.]?\s+").unwrap()
});
static TRAILING_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\(((?:\d{1,2}[-–]\d{1,2}\s+)?(?:\d{1,2}\s+)?[A-Za-z]+\.?\s+\d{4})\)\s*$").unwrap()
});
static INNER_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-:]\s*((?:\d{1,2}[-–]\d{1,2}\s+)?(?:\d{1,2}\s+)?[A-Za-z]+\.?\s+\d{4})\s*[-:]").unwrap()
});
static DOUBLED_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-:]\s*[-:]").unwrap());

/// Find an embedded date in a title and remove it. Three positions are
/// recognized, checked in order: leading ("9 July 2019, Title"), trailing
/// parenthesized ("Title (March 2017)") and mid-string between separators
/// ("Event: 15 June 2018: Subtitle").
///
/// Returns the title with the date removed plus what was extracted; the
/// title is untouched when no parseable date is present.
pub fn extract_date_from_title(title: &str) -> (String, Option<ExtractedDate>, Option<DateFormat>) {
    if title.is_empty() {
        return (String::new(), None, None);
    }

    if let Some(caps) = LEADING_DATE.captures(title) {
        let whole = caps.get(0).unwrap();
        if let Some((date, format)) = parse_date_string(&caps[1]) {
            let rest = title[whole.end()..].trim().to_string();
            return (rest, Some(date), Some(format));
        }
    }

    if let Some(caps) = TRAILING_DATE.captures(title) {
        let whole = caps.get(0).unwrap();
        if let Some((date, format)) = parse_date_string(&caps[1]) {
            let rest = title[..whole.start()].trim().to_string();
            return (rest, Some(date), Some(format));
        }
    }

    if let Some(caps) = INNER_DATE.captures(title) {
        let span = caps.get(1).unwrap();
        if let Some((date, format)) = parse_date_string(&caps[1]) {
            let mut rest = format!("{}{}", &title[..span.start()], &title[span.end()..]);
            rest = DOUBLED_SEPARATOR.replace_all(&rest, ":").trim().to_string();
            return (rest, Some(date), Some(format));
        }
    }

    (title.to_string(), None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_date() {
        let (date, format) = parse_date_string("9 July 2019").unwrap();
        assert_eq!(date, ExtractedDate::Day(NaiveDate::from_ymd_opt(2019, 7, 9).unwrap()));
        assert_eq!(format, DateFormat::FullDate);
        assert_eq!(date.to_string(), "2019-07-09");
    }

    #[test]
    fn test_parse_abbreviated_month() {
        let (date, _) = parse_date_string("23 Oct. 2020").unwrap();
        assert_eq!(date.to_string(), "2020-10-23");
    }

    #[test]
    fn test_parse_month_year() {
        let (date, format) = parse_date_string("March 2017").unwrap();
        assert_eq!(date, ExtractedDate::Month { year: 2017, month: 3 });
        assert_eq!(format, DateFormat::MonthYear);
        assert_eq!(date.to_string(), "2017-03");
    }

    #[test]
    fn test_parse_date_range_keeps_first_day() {
        let (date, format) = parse_date_string("1-3 March 2020").unwrap();
        assert_eq!(date, ExtractedDate::Day(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()));
        assert_eq!(format, DateFormat::DateRange);
    }

    #[test]
    fn test_parse_rejects_non_month() {
        assert!(parse_date_string("Report 2019").is_none());
        assert!(parse_date_string("31 February 2019").is_none());
        assert!(parse_date_string("").is_none());
    }

    #[test]
    fn test_extract_leading_date() {
        let (rest, date, format) = extract_date_from_title("9 July 2019, Climate Change Report");
        assert_eq!(rest, "Climate Change Report");
        assert_eq!(date.unwrap().to_string(), "2019-07-09");
        assert_eq!(format, Some(DateFormat::FullDate));
    }

    #[test]
    fn test_extract_trailing_parenthesized_date() {
        let (rest, date, _) = extract_date_from_title("Workshop Summary (March 2017)");
        assert_eq!(rest, "Workshop Summary");
        assert_eq!(date.unwrap().to_string(), "2017-03");
    }

    #[test]
    fn test_extract_inner_date() {
        let (rest, date, _) =
            extract_date_from_title("Annual Meeting: 15 June 2018: Opening Remarks");
        assert_eq!(date.unwrap().to_string(), "2018-06-15");
        assert!(rest.contains("Annual Meeting"));
        assert!(rest.contains("Opening Remarks"));
    }

    #[test]
    fn test_extract_no_date_is_identity() {
        let (rest, date, format) = extract_date_from_title("Deep Learning for Protein Folding");
        assert_eq!(rest, "Deep Learning for Protein Folding");
        assert!(date.is_none());
        assert!(format.is_none());
    }

    #[test]
    fn test_leading_non_date_kept() {
        // "Annual 2019" has no month word, so nothing is extracted
        let (rest, date, _) = extract_date_from_title("Annual 2019 science review");
        assert_eq!(rest, "Annual 2019 science review");
        assert!(date.is_none());
    }
}
