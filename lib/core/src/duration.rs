//! Human-friendly duration strings used throughout configuration.
//!
//! Accepted forms:
//! - a bare integer, read as seconds (`"300"`)
//! - one or more `<integer><unit>` pairs (`"5m"`, `"1h30m"`, `"2w"`)
//!
//! Units: `ms`, `s`, `m`, `h`, `d`, `w`, `M` (30 days), `y` (365 days).

use std::fmt;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError {
    /// The offending input.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse duration '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseDurationError {}

/// Parses a duration string such as `"5m"` or `"1d12h"`.
///
/// # Errors
///
/// Returns an error for empty input, unknown units, a number without a
/// unit after the first pair, or values that overflow.
pub fn parse_duration_string(input: &str) -> Result<Duration, ParseDurationError> {
    let fail = |reason: &str| ParseDurationError {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let value = input.trim();
    if value.is_empty() {
        return Err(fail("empty value"));
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        let secs = value.parse::<u64>().map_err(|e| fail(&e.to_string()))?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = value;

    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(fail("expected a number"));
        }
        let (number, tail) = rest.split_at(digits);
        let amount = number.parse::<u64>().map_err(|e| fail(&e.to_string()))?;

        let unit_len = tail.bytes().take_while(u8::is_ascii_alphabetic).count();
        if unit_len == 0 {
            return Err(fail("missing unit"));
        }
        let (unit, tail) = tail.split_at(unit_len);

        let part = match unit {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => amount.checked_mul(1).map(Duration::from_secs),
            "m" => amount.checked_mul(MINUTE).map(Duration::from_secs),
            "h" => amount.checked_mul(HOUR).map(Duration::from_secs),
            "d" => amount.checked_mul(DAY).map(Duration::from_secs),
            "w" => amount.checked_mul(7 * DAY).map(Duration::from_secs),
            "M" => amount.checked_mul(30 * DAY).map(Duration::from_secs),
            "y" => amount.checked_mul(365 * DAY).map(Duration::from_secs),
            other => return Err(fail(&format!("unknown unit '{other}'"))),
        }
        .ok_or_else(|| fail("value too large"))?;

        total = total
            .checked_add(part)
            .ok_or_else(|| fail("value too large"))?;
        rest = tail;
    }

    Ok(total)
}
