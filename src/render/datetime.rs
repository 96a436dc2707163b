//! Date/time reformatting of cell values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt::Write;

/// Input layouts tried after RFC 3339, in order.
const INPUT_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d", "%d.%m.%Y %H:%M:%S", "%d.%m.%Y"];

/// Reference-date layout tokens ("2006-01-02 15:04:05") and their strftime equivalents, longest first.
const REFERENCE_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("01", "%m"),
    ("02", "%d"),
    ("15", "%H"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("PM", "%p"),
];

enum Parsed {
    Zoned(DateTime<chrono::FixedOffset>),
    Naive(NaiveDateTime),
}

fn parse(s: &str) -> Option<Parsed> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Parsed::Zoned(dt));
    }
    for layout in INPUT_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(Parsed::Naive(dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, layout) {
            return Some(Parsed::Naive(d.and_time(chrono::NaiveTime::MIN)));
        }
    }
    None
}

/// Output formats are strftime patterns; patterns without `%` are read as reference-date layouts
/// (e.g. "02.01.2006" is "%d.%m.%Y").
pub fn to_strftime(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    let mut out = String::with_capacity(format.len() + 8);
    let mut rest = format;
    'outer: while !rest.is_empty() {
        for (token, spec) in REFERENCE_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Reformat a date/time text. Unparsable input, or an invalid output format, returns the input unchanged.
pub fn format_datetime_str(raw: &str, format: &str) -> String {
    let Some(parsed) = parse(raw) else {
        return raw.to_string();
    };
    let spec = to_strftime(format);
    let mut out = String::new();
    let res = match parsed {
        Parsed::Zoned(dt) => write!(out, "{}", dt.format(&spec)),
        Parsed::Naive(dt) => write!(out, "{}", dt.format(&spec)),
    };
    match res {
        Ok(()) => out,
        Err(_) => {
            tracing::warn!(format, "invalid date/time output format");
            raw.to_string()
        }
    }
}

/// Reformat a cell value; non-text values are shown as-is.
pub fn format_datetime(value: &Value, format: &str) -> String {
    match value {
        Value::String(s) => format_datetime_str(s, format),
        Value::Null => String::new(),
        other => crate::db::display_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sql_timestamps() {
        assert_eq!(format_datetime_str("2024-03-15 10:30:00", "%d.%m.%Y"), "15.03.2024");
        assert_eq!(format_datetime_str("2024-03-15 10:30:00", "02.01.2006"), "15.03.2024");
        assert_eq!(format_datetime_str("2024-03-15", "%d.%m.%Y %H:%M"), "15.03.2024 00:00");
    }

    #[test]
    fn tries_layouts_in_order() {
        assert_eq!(format_datetime_str("2024-03-15T10:30:00+02:00", "%H:%M"), "10:30");
        assert_eq!(format_datetime_str("15.03.2024 08:05:09", "2006-01-02 15:04:05"), "2024-03-15 08:05:09");
        assert_eq!(format_datetime_str("15.03.2024", "%Y/%m/%d"), "2024/03/15");
    }

    #[test]
    fn unparsable_input_passes_through() {
        assert_eq!(format_datetime_str("not-a-date", "%d.%m.%Y"), "not-a-date");
        assert_eq!(format_datetime(&Value::Null, "%d.%m.%Y"), "");
        assert_eq!(format_datetime(&Value::from(5), "%d.%m.%Y"), "5");
    }

    #[test]
    fn reference_layout_translation() {
        assert_eq!(to_strftime("02.01.2006 15:04"), "%d.%m.%Y %H:%M");
        assert_eq!(to_strftime("Jan 2, 2006"), "%b 2, %Y");
        assert_eq!(to_strftime("%d/%m"), "%d/%m");
    }
}
