use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

/// Canonical calendar date of a raw due timestamp.
///
/// The store emits due dates in three encodings:
///
/// - ISO with a `T` separator: `2025-10-07T18:03:00.000Z`
/// - database style with a space and numeric offset: `2025-10-07 18:03:00+00`
/// - date only: `2025-10-07`
///
/// The date part is extracted by pure string splitting and parsed as a
/// `NaiveDate`. Routing the whole string through a zoned datetime parser can
/// shift the calendar day depending on the host timezone, so the calendar
/// day never touches one.
pub fn normalize(raw: &str) -> Option<NaiveDate> {
    let date_part = split_date_part(raw.trim())?;

    let shape = Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok()?;
    if !shape.is_match(date_part) {
        return None;
    }

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// The clock reading written in the raw timestamp, attached to its canonical
/// date. The offset suffix is stripped rather than applied: the digits in the
/// string are the bucketing key, so hour buckets are as timezone-stable as
/// day buckets. Date-only values read as midnight. A malformed time part
/// degrades to midnight instead of dropping the task from its day.
pub fn due_datetime(raw: &str) -> Option<NaiveDateTime> {
    let date = normalize(raw)?;
    let trimmed = raw.trim();

    let time_part = trimmed
        .split_once('T')
        .or_else(|| trimmed.split_once(' '))
        .map(|(_, time)| time);

    let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
    let Some(time_part) = time_part else {
        return Some(date.and_time(midnight));
    };

    let time = parse_clock(time_part).unwrap_or(midnight);
    Some(date.and_time(time))
}

/// Hour-of-day bucket (0-23) for the daily view.
pub fn due_hour(raw: &str) -> Option<u32> {
    due_datetime(raw).map(|dt| dt.hour())
}

fn split_date_part(trimmed: &str) -> Option<&str> {
    if trimmed.is_empty() {
        return None;
    }
    if let Some((date, _)) = trimmed.split_once('T') {
        return Some(date);
    }
    if let Some((date, _)) = trimmed.split_once(' ') {
        return Some(date);
    }
    Some(trimmed)
}

fn parse_clock(time_part: &str) -> Option<NaiveTime> {
    let bare = time_part.trim().trim_end_matches(['Z', 'z']);
    let bare = match bare.find(['+', '-']) {
        Some(idx) => &bare[..idx],
        None => bare,
    };

    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(bare, fmt) {
            return Some(time);
        }
    }
    None
}
