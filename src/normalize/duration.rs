//! Duration parsing.
//!
//! Exports disagree on how they write track length: clock strings (`3:15`,
//! `00:03:30`), plain minutes (`4.5`), or raw milliseconds. Everything is
//! converted to minutes; anything unrecognised becomes `None`.

/// Parses a trimmed decimal number the way the numeric columns are parsed.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok()
}

/// Converts a raw duration cell to minutes.
///
/// Forms are tried in order and the first success wins:
/// 1. `H:MM:SS` or `MM:SS`
/// 2. a plain number, taken as minutes
/// 3. a number above 1000, taken as milliseconds
///
/// Any string that passes (2) never reaches (3), so `"250000"` is 250000 minutes.
/// Zero and negative values pass through untouched.
pub fn parse_minutes(raw: Option<&str>) -> Option<f64> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }

    clock_minutes(value)
        .or_else(|| parse_number(value))
        .or_else(|| millisecond_minutes(value))
}

fn clock_minutes(value: &str) -> Option<f64> {
    if !value.contains(':') {
        return None;
    }

    let parts = value
        .split(':')
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;

    match parts.as_slice() {
        [hours, minutes, seconds] => Some(hours * 60.0 + minutes + seconds / 60.0),
        [minutes, seconds] => Some(minutes + seconds / 60.0),
        _ => None,
    }
}

fn millisecond_minutes(value: &str) -> Option<f64> {
    let ms = parse_number(value)?;
    (ms > 1000.0).then(|| ms / 1000.0 / 60.0)
}
