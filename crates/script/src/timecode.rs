//! Timestamp and time-range codecs.
//!
//! Two representations coexist in a script and they are deliberately not the
//! same: command tokens (`HH:MM:SS.fff`) carry millisecond precision, while
//! scene-block delimiters (`[MM:SS-MM:SS]` / `[HH:MM:SS-HH:MM:SS]`) are
//! whole-second only.

use crate::error::ScriptError;

/// Parse a command time token (`HH:MM:SS.fff` or `MM:SS.fff`) into seconds.
/// The fractional part is optional; 1–3 digits scale to milliseconds and
/// longer fractions are truncated to millisecond precision.
pub fn parse_timestamp(value: &str) -> Result<f64, ScriptError> {
    let bad = || ScriptError::InvalidTimestamp(value.to_string());

    let (main, frac) = match value.split_once('.') {
        Some((m, f)) => (m, Some(f)),
        None => (value, None),
    };

    let parts: Vec<&str> = main.split(':').collect();
    let (hours, minutes, seconds): (u64, u64, u64) = match parts.as_slice() {
        [m, s] => (0, m.parse().map_err(|_| bad())?, s.parse().map_err(|_| bad())?),
        [h, m, s] => (
            h.parse().map_err(|_| bad())?,
            m.parse().map_err(|_| bad())?,
            s.parse().map_err(|_| bad())?,
        ),
        _ => return Err(bad()),
    };

    if minutes >= 60 || seconds >= 60 {
        return Err(ScriptError::ComponentOutOfRange(value.to_string()));
    }

    let millis = match frac {
        None => 0,
        Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => return Err(bad()),
        Some(f) => {
            let raw: u64 = f.parse().map_err(|_| bad())?;
            match f.len() {
                1 => raw * 100,
                2 => raw * 10,
                3 => raw,
                len => raw / 10_u64.pow((len - 3) as u32),
            }
        }
    };

    let total_millis = hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis;
    Ok(total_millis as f64 / 1000.0)
}

/// Canonical command-token form, always `HH:MM:SS.fff`. Round-trips through
/// [`parse_timestamp`] byte-identically at millisecond resolution.
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis
    )
}

/// Format a whole-second range for a scene-block delimiter: `MM:SS-MM:SS`
/// while both ends are under one hour, `HH:MM:SS-HH:MM:SS` otherwise.
pub fn format_range(start: u32, end: u32) -> String {
    if start < 3600 && end < 3600 {
        format!(
            "{:02}:{:02}-{:02}:{:02}",
            start / 60,
            start % 60,
            end / 60,
            end % 60
        )
    } else {
        format!(
            "{:02}:{:02}:{:02}-{:02}:{:02}:{:02}",
            start / 3600,
            (start / 60) % 60,
            start % 60,
            end / 3600,
            (end / 60) % 60,
            end % 60
        )
    }
}

/// Match a scene-block range body: `M:SS-M:SS` (1–2 digit minute) or
/// `H:MM:SS-H:MM:SS` (1–2 digit hour), fixed-width two-digit trailing
/// components on both sides. Anything else is not a delimiter.
pub fn parse_range(body: &str) -> Option<(u32, u32)> {
    let (lhs, rhs) = body.split_once('-')?;
    let left = parse_range_side(lhs)?;
    let right = parse_range_side(rhs)?;
    // Both sides must use the same form, mirroring the fixed delimiter shape.
    if left.1 != right.1 {
        return None;
    }
    Some((left.0, right.0))
}

/// Returns (seconds, component count) so callers can require matching forms.
fn parse_range_side(side: &str) -> Option<(u32, usize)> {
    let parts: Vec<&str> = side.split(':').collect();
    match parts.as_slice() {
        [m, s] => {
            let minutes = parse_component(m, 1, 2)?;
            let seconds = parse_component(s, 2, 2)?;
            if seconds >= 60 {
                return None;
            }
            Some((minutes * 60 + seconds, 2))
        }
        [h, m, s] => {
            let hours = parse_component(h, 1, 2)?;
            let minutes = parse_component(m, 2, 2)?;
            let seconds = parse_component(s, 2, 2)?;
            if minutes >= 60 || seconds >= 60 {
                return None;
            }
            Some((hours * 3600 + minutes * 60 + seconds, 3))
        }
        _ => None,
    }
}

fn parse_component(text: &str, min_width: usize, max_width: usize) -> Option<u32> {
    if text.len() < min_width || text.len() > max_width {
        return None;
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
