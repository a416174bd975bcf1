//! Time-of-day cadency overrides
//!
//! Override keys carry an hour range `H1-H2` (inclusive, same day) and map to
//! a duration string such as `"1h30m"` or a bare number of seconds.

use crate::config::CadencyOverrides;
use crate::CadencyError;

/// Label used when no override applies
pub const DEFAULT_LABEL: &str = "Default";

/// Parses a duration string into seconds
///
/// Accepts a bare integer (seconds) or concatenated `<int><unit>` parts with
/// units `d`, `h`, `m`, `s`.
pub fn parse_duration(key: &str, value: &str) -> Result<u64, CadencyError> {
    let invalid = || CadencyError::InvalidDuration {
        key: key.to_string(),
        value: value.to_string(),
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(secs);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
        digits.clear();
    }

    // trailing digits without a unit, e.g. "1h30"
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

/// Parses an `H1-H2` hour range
pub fn parse_hour_range(key: &str, range: &str) -> Result<(u32, u32), CadencyError> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(CadencyError::MalformedRange {
            key: key.to_string(),
        });
    }

    let hour = |raw: &str| -> Result<u32, CadencyError> {
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|h| *h <= 23)
            .ok_or_else(|| CadencyError::InvalidHour {
                key: key.to_string(),
                value: raw.to_string(),
            })
    };

    let start = hour(parts[0])?;
    let end = hour(parts[1])?;
    if start > end {
        return Err(CadencyError::InvertedRange {
            key: key.to_string(),
            start,
            end,
        });
    }
    Ok((start, end))
}

/// Resolves a site's cadency for the given hour of day
///
/// Overrides are checked in declaration order and the first matching range
/// wins. Every override visited before the match is validated, so a broken
/// entry fails even if it would not have matched.
///
/// # Returns
///
/// `(seconds, label)` where label is the matching range or `"Default"`
pub fn resolve_cadency(
    overrides: &CadencyOverrides,
    site: &str,
    default_seconds: u64,
    hour: u32,
) -> Result<(u64, String), CadencyError> {
    for (range, duration) in overrides.for_site(site) {
        let key = format!("{}.{}", site, range);
        let (start, end) = parse_hour_range(&key, range)?;
        if start <= hour && hour <= end {
            let seconds = parse_duration(&key, duration)?;
            return Ok((seconds, range.to_string()));
        }
    }
    Ok((default_seconds, DEFAULT_LABEL.to_string()))
}
