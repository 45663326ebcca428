// Utility helpers for parsing, rounding, and display formatting.
//
// This module centralizes the "dirty" date/number handling so the rest of
// the code can assume clean, typed values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Date formats accepted for string-typed cells. Spreadsheet exports are
/// inconsistent about padding and sometimes carry a time component.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a string-like value into a `NaiveDate`, trying each accepted format
/// in turn. Returns `None` for empty or unparseable input.
pub fn parse_date_flexible(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if fmt.contains("%H") {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.date());
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Round to two decimal places, half away from zero.
///
/// Ratios are stored already-rounded so the average is taken over exactly the
/// values the report displays.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Render a ratio as a fixed two-decimal percentage, e.g. `66.67%`.
pub fn format_pct(v: f64) -> String {
    format!("{:.2}%", v)
}

/// Short week label in `Mon-D` form, e.g. `Jan-7`.
pub fn short_date_label(d: NaiveDate) -> String {
    d.format("%b-%-d").to_string()
}

/// Full date label in `M/D/YYYY` form, e.g. `1/7/2024`.
pub fn full_date_label(d: NaiveDate) -> String {
    d.format("%-m/%-d/%Y").to_string()
}

/// True if the input contains only alphabetic characters (and is non-empty).
pub fn is_alphabetic(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| c.is_alphabetic())
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 rows scanned`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(parse_date_flexible("1/7/2024"), Some(expected));
        assert_eq!(parse_date_flexible("01/07/2024"), Some(expected));
        assert_eq!(parse_date_flexible("2024-01-07"), Some(expected));
        assert_eq!(parse_date_flexible("1/7/2024 13:45:00"), Some(expected));
        assert_eq!(parse_date_flexible(""), None);
        assert_eq!(parse_date_flexible("not a date"), None);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(66.666_666_666_7), 66.67);
        assert_eq!(round2(0.0), 0.0);
        // (66.67 + 0.00) / 2 sits just above 33.335 in f64 and rounds up.
        assert_eq!(round2(66.67 / 2.0), 33.34);
    }

    #[test]
    fn date_labels_have_no_padding() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(short_date_label(d), "Jan-7");
        assert_eq!(full_date_label(d), "1/7/2024");
    }

    #[test]
    fn alphabetic_check() {
        assert!(is_alphabetic("MN"));
        assert!(!is_alphabetic("M1"));
        assert!(!is_alphabetic(""));
        assert!(!is_alphabetic("M N"));
    }
}
