//! Lenient, day-first date normalization.
//!
//! Portals publish dates in whatever shape their CMS emits: `03.01.2024`,
//! `3.1.24`, `2024-01-03`, `3. Januar 2024`, `01.02.2024 12:00`. Everything
//! is funneled through [`format_date`], which either yields the canonical
//! `DD.MM.YY` rendering or the `"not specified"` sentinel. It never fails.

use chrono::NaiveDate;

use crate::NOT_SPECIFIED;

/// Numeric layouts, tried in order. Two-digit-year variants come first so
/// `3.1.24` is read as 2024 rather than year 24 AD.
const NUMERIC_FORMATS: &[&str] = &["%d.%m.%y", "%d.%m.%Y", "%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y"];

/// Parses a loosely formatted, day-first date string and re-renders it as
/// `DD.MM.YY`. Unparseable input yields the sentinel. Idempotent over its
/// own output.
pub fn format_date(raw: &str) -> String {
    match parse_day_first(strip_time_of_day(raw)) {
        Some(date) => date.format("%d.%m.%y").to_string(),
        None => NOT_SPECIFIED.to_string(),
    }
}

/// Drops a trailing time-of-day token (`12:00`, `09:30:00 Uhr`) so cells like
/// `01.02.2024 12:00` normalize on the date portion alone.
pub fn strip_time_of_day(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.split_once(' ') {
        Some((date, rest)) if starts_with_time(rest) => date,
        _ => trimmed,
    }
}

/// Splits a free-text `"X until Y"` (or German `"X bis Y"`) range into two
/// independently normalized dates. Malformed input yields two sentinels.
pub fn parse_application_period(raw: &str) -> (String, String) {
    for separator in [" until ", " bis "] {
        if let Some((start, end)) = raw.split_once(separator) {
            return (format_date(start), format_date(end));
        }
    }
    (NOT_SPECIFIED.to_string(), NOT_SPECIFIED.to_string())
}

fn starts_with_time(text: &str) -> bool {
    let head = text.split_whitespace().next().unwrap_or("");
    let mut parts = head.split(':');
    let hour = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minute = parts.next().and_then(|p| p.parse::<u32>().ok());
    matches!((hour, minute), (Some(h), Some(m)) if h < 24 && m < 60)
}

fn parse_day_first(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in NUMERIC_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    parse_verbose(text)
}

/// `3. Januar 2024`, `15 March 2024`, `7 Okt 24` — day, named month, year.
fn parse_verbose(text: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() != 3 {
        return None;
    }
    let day: u32 = tokens[0].trim_end_matches('.').parse().ok()?;
    let month = month_number(tokens[1])?;
    let year = expand_year(tokens[2].parse().ok()?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(year: i32) -> i32 {
    if (0..100).contains(&year) {
        if year < 69 { year + 2000 } else { year + 1900 }
    } else {
        year
    }
}

fn month_number(token: &str) -> Option<u32> {
    let name = token
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase();
    const NAMES: &[(&str, u32)] = &[
        ("januar", 1),
        ("january", 1),
        ("jan", 1),
        ("februar", 2),
        ("february", 2),
        ("feb", 2),
        ("märz", 3),
        ("maerz", 3),
        ("march", 3),
        ("mär", 3),
        ("mar", 3),
        ("april", 4),
        ("apr", 4),
        ("mai", 5),
        ("may", 5),
        ("juni", 6),
        ("june", 6),
        ("jun", 6),
        ("juli", 7),
        ("july", 7),
        ("jul", 7),
        ("august", 8),
        ("aug", 8),
        ("september", 9),
        ("sept", 9),
        ("sep", 9),
        ("oktober", 10),
        ("october", 10),
        ("okt", 10),
        ("oct", 10),
        ("november", 11),
        ("nov", 11),
        ("dezember", 12),
        ("december", 12),
        ("dez", 12),
        ("dec", 12),
    ];
    NAMES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_day_first_forms_normalize() {
        assert_eq!(format_date("03.01.2024"), "03.01.24");
        assert_eq!(format_date("3.1.24"), "03.01.24");
        assert_eq!(format_date("2024-01-03"), "03.01.24");
        assert_eq!(format_date("03/01/2024"), "03.01.24");
    }

    #[test]
    fn verbose_german_month_normalizes() {
        assert_eq!(format_date("3. Januar 2024"), "03.01.24");
        assert_eq!(format_date("15 März 2024"), "15.03.24");
        assert_eq!(format_date("7 Okt 24"), "07.10.24");
    }

    #[test]
    fn verbose_english_month_normalizes() {
        assert_eq!(format_date("15 March 2024"), "15.03.24");
        assert_eq!(format_date("1 December 2023"), "01.12.23");
    }

    #[test]
    fn trailing_time_of_day_is_ignored() {
        assert_eq!(format_date("01.02.2024 12:00"), "01.02.24");
        assert_eq!(format_date("01.02.2024 09:30:00 Uhr"), "01.02.24");
    }

    #[test]
    fn malformed_input_yields_the_sentinel() {
        for raw in ["", "   ", "nv", "keine Angabe", "32.13.2024", "soon", "12:00"] {
            assert_eq!(format_date(raw), NOT_SPECIFIED, "input: {raw:?}");
        }
    }

    #[test]
    fn format_date_is_idempotent() {
        for raw in [
            "03.01.2024",
            "3. Januar 2024",
            "2024-12-31",
            "15 March 2024",
            "garbage",
        ] {
            let once = format_date(raw);
            assert_eq!(format_date(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn application_period_splits_and_normalizes_both_ends() {
        let (start, end) = parse_application_period("01.02.2024 until 15.02.2024");
        assert_eq!(start, "01.02.24");
        assert_eq!(end, "15.02.24");

        let (start, end) = parse_application_period("1. Februar 2024 bis 15. Februar 2024");
        assert_eq!(start, "01.02.24");
        assert_eq!(end, "15.02.24");
    }

    #[test]
    fn application_period_without_separator_yields_sentinels() {
        let (start, end) = parse_application_period("fortlaufend");
        assert_eq!(start, NOT_SPECIFIED);
        assert_eq!(end, NOT_SPECIFIED);
    }

    #[test]
    fn period_ends_degrade_independently() {
        let (start, end) = parse_application_period("01.02.2024 until offen");
        assert_eq!(start, "01.02.24");
        assert_eq!(end, NOT_SPECIFIED);
    }
}
