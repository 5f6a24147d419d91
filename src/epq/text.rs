//! Whitespace, percentage and French date normalization.

use crate::error::DateParseError;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static SIGNED_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap());

static FRENCH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})\s+([A-Za-zéèêëàâäîïôöùûüç]+)\s+(\d{4})\s*$").unwrap()
});

/// French month names, accented and unaccented spellings.
const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("février", 2),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("août", 8),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("décembre", 12),
    ("decembre", 12),
];

/// Collapses whitespace runs (non-breaking spaces included) to one space and trims.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a percentage such as `"3,45%"` or `"2,10 %"`.
///
/// Returns `None` for empty input or when no number is present.
pub fn parse_percent(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }

    let cleaned = s.replace('\u{a0}', " ");
    let cleaned = cleaned.trim().replace(',', ".");

    SIGNED_DECIMAL.find(&cleaned).and_then(|m| m.as_str().parse().ok())
}

/// Returns the month number for a French month name, case-insensitively.
pub fn french_month(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS.iter().find(|(m, _)| *m == lower).map(|(_, n)| *n)
}

/// Parses `<day> <month> <year>` in French, e.g. `"15 décembre 2025"`.
pub fn parse_french_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let caps = FRENCH_DATE.captures(s).ok_or_else(|| DateParseError::Format(s.to_string()))?;

    let month_token = caps[2].to_lowercase();
    let month = french_month(&month_token).ok_or(DateParseError::UnknownMonth(month_token))?;

    let day: u32 = caps[1].parse().map_err(|_| DateParseError::Format(s.to_string()))?;
    let year: i32 = caps[3].parse().map_err(|_| DateParseError::Format(s.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DateParseError::InvalidDate(s.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso(s: &str) -> String {
        parse_french_date(s).unwrap().to_string()
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  15   décembre\n2025 "), "15 décembre 2025");
        assert_eq!(normalize_whitespace("3,45\u{a0}%"), "3,45 %");
        assert_eq!(normalize_whitespace("\t\r\n"), "");
        assert_eq!(normalize_whitespace("plain"), "plain");
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("3,45%"), Some(3.45));
        assert_eq!(parse_percent("4.50"), Some(4.5));
        assert_eq!(parse_percent("2,10 %"), Some(2.1));
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn test_parse_percent_edge_cases() {
        assert_eq!(parse_percent("\u{a0}3,00\u{a0}%"), Some(3.0));
        assert_eq!(parse_percent("-0,25 %"), Some(-0.25));
        assert_eq!(parse_percent("Taux : 2,75 % ou 3,00 %"), Some(2.75));
        assert_eq!(parse_percent("0,00 %"), Some(0.0));
        assert_eq!(parse_percent("s.o."), None);
        assert_eq!(parse_percent("   "), None);
        assert_eq!(parse_percent("%"), None);
    }

    #[test]
    fn test_parse_french_date() {
        assert_eq!(iso("15 décembre 2025"), "2025-12-15");
        assert_eq!(iso("1 janvier 2025"), "2025-01-01");
        assert_eq!(iso("31 décembre 2025"), "2025-12-31");
    }

    #[test]
    fn test_parse_french_date_spellings() {
        assert_eq!(iso("3 février 2025"), "2025-02-03");
        assert_eq!(iso("3 fevrier 2025"), "2025-02-03");
        assert_eq!(iso("15 août 2024"), "2024-08-15");
        assert_eq!(iso("15 aout 2024"), "2024-08-15");
        assert_eq!(iso("9 decembre 2025"), "2025-12-09");
        assert_eq!(iso("  05 Mars 2026  "), "2026-03-05");
        assert_eq!(iso("12 DÉCEMBRE 2025"), "2025-12-12");
    }

    #[test]
    fn test_parse_french_date_unknown_month() {
        assert_eq!(
            parse_french_date("15 brumaire 2025"),
            Err(DateParseError::UnknownMonth("brumaire".to_string()))
        );
        assert!(matches!(
            parse_french_date("15 December 2025"),
            Err(DateParseError::UnknownMonth(_))
        ));
    }

    #[test]
    fn test_parse_french_date_bad_format() {
        for input in ["2025-12-15", "décembre 2025", "15 décembre 25", "le 15 décembre 2025", ""] {
            assert!(
                matches!(parse_french_date(input), Err(DateParseError::Format(_))),
                "expected format error for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_french_date_no_clamping() {
        assert!(matches!(
            parse_french_date("31 février 2025"),
            Err(DateParseError::InvalidDate(_))
        ));
        assert!(matches!(parse_french_date("0 mai 2025"), Err(DateParseError::InvalidDate(_))));
        assert_eq!(iso("29 février 2024"), "2024-02-29");
    }

    #[test]
    fn test_french_month() {
        assert_eq!(french_month("Juillet"), Some(7));
        assert_eq!(french_month("AOÛT"), Some(8));
        assert_eq!(french_month("july"), None);
    }
}
