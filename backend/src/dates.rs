//! Date parsing for query parameters and ingested payloads.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a date as accepted by the REST query parameters.
///
/// Accepted forms (surrounding whitespace ignored, `/` treated as `-`):
/// - all digits: Unix epoch milliseconds
/// - `YYYY-MM-DD`: midnight UTC
/// - `YYYY-MM-DD HH:MM:SS`: UTC
///
/// Anything else, including calendar-invalid dates, yields `None`.
pub fn parse_date(input: Option<&str>) -> Option<DateTime<Utc>> {
    let trimmed = input?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = trimmed.parse().ok()?;
        return DateTime::from_timestamp_millis(millis);
    }

    let normalized = trimmed.replace('/', "-");

    if has_shape(&normalized, "dddd-dd-dd") {
        let date = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()?;
        return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    }

    // `YYYY-MM-DD` followed by one or more whitespace characters and `HH:MM:SS`
    let (date_part, rest) = normalized.split_at_checked(10)?;
    let time_part = rest.trim_start();
    if has_shape(date_part, "dddd-dd-dd")
        && time_part.len() < rest.len()
        && has_shape(time_part, "dd:dd:dd")
    {
        let text = format!("{} {}", date_part, time_part);
        let datetime = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").ok()?;
        return Some(datetime.and_utc());
    }

    None
}

/// Parse a date from an ingested payload or a tool argument.
///
/// Tries [`parse_date`] first, then RFC 3339 (`2026-02-05T14:30:00Z`), then
/// the exporter format with a numeric offset (`2026-02-05 14:30:00 -0800`).
pub fn parse_date_lenient(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    parse_date(Some(trimmed))
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|d| d.with_timezone(&Utc)))
        .or_else(|| {
            DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z")
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

/// Match `input` against a shape where `d` is any ASCII digit and every other
/// character must match literally.
fn has_shape(input: &str, shape: &str) -> bool {
    input.len() == shape.len()
        && input.bytes().zip(shape.bytes()).all(|(c, s)| match s {
            b'd' => c.is_ascii_digit(),
            _ => c == s,
        })
}
