//! Timestamp parsing and rendering for cue sheets.
//!
//! Editing timelines export positions as `M:SS.fff`. Everything downstream works in whole
//! milliseconds ([`TimeUnits`]).

use crate::CueError;

/// Milliseconds.
pub type TimeUnits = u64;

const MILLIS_PER_SECOND: TimeUnits = 1000;
const MILLIS_PER_MINUTE: TimeUnits = 60 * MILLIS_PER_SECOND;

/// Parses an `M:SS.fff` timestamp into milliseconds.
///
/// The fraction is a decimal fraction of a second: `0:01.5` is 1500. Digits past the third are
/// truncated. A minutes field of `0` is zero minutes.
pub fn normalize(timestamp: &str) -> Result<TimeUnits, CueError> {
    let malformed = || CueError::MalformedTimestamp {
        input: timestamp.to_string(),
    };

    let trimmed = timestamp.trim();
    let (minutes, rest) = trimmed.split_once(':').ok_or_else(malformed)?;
    let (seconds, fraction) = rest.split_once('.').ok_or_else(malformed)?;

    let minutes = parse_digits(minutes).ok_or_else(malformed)?;
    let seconds = parse_digits(seconds).ok_or_else(malformed)?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let millis: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(3)
        .collect();
    let millis: TimeUnits = millis.parse().map_err(|_| malformed())?;

    minutes
        .checked_mul(MILLIS_PER_MINUTE)
        .and_then(|m| seconds.checked_mul(MILLIS_PER_SECOND).map(|s| (m, s)))
        .and_then(|(m, s)| m.checked_add(s))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(malformed)
}

fn parse_digits(field: &str) -> Option<TimeUnits> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Renders milliseconds as `M:SS.fff`, the inverse of [`normalize`].
pub fn format_timecode(units: TimeUnits) -> String {
    format!(
        "{}:{:02}.{:03}",
        units / MILLIS_PER_MINUTE,
        (units / MILLIS_PER_SECOND) % 60,
        units % MILLIS_PER_SECOND
    )
}

/// Renders milliseconds as seconds with three decimals (`83.250`).
pub fn format_seconds(units: TimeUnits) -> String {
    format!(
        "{}.{:03}",
        units / MILLIS_PER_SECOND,
        units % MILLIS_PER_SECOND
    )
}

pub fn to_seconds(units: TimeUnits) -> f64 {
    units as f64 / MILLIS_PER_SECOND as f64
}

/// Converts seconds reported by the controller into milliseconds, clamping negatives to zero.
pub fn from_seconds(seconds: f64) -> TimeUnits {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * MILLIS_PER_SECOND as f64).round() as TimeUnits
    } else {
        0
    }
}

/// Rounds to the nearest multiple of `resolution`, ties rounding up.
pub fn quantize(units: TimeUnits, resolution: TimeUnits) -> TimeUnits {
    if resolution <= 1 {
        return units;
    }
    units.saturating_add(resolution / 2) / resolution * resolution
}
