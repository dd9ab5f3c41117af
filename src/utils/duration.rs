//! Go `time.Duration` text syntax.
//!
//! Vault parses `ttl` and similar parameters with Go's duration parser, so
//! durations cross the wire in that syntax (`2160h0m0s`, `1m30s`, `500ms`).

use std::time::Duration;

use crate::errors::{IssuerError, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Render a duration exactly like Go's `Duration.String()`.
///
/// ```rust
/// use std::time::Duration;
/// use vault_issuer::utils::format_go_duration;
///
/// assert_eq!(format_go_duration(Duration::from_secs(90 * 24 * 3600)), "2160h0m0s");
/// assert_eq!(format_go_duration(Duration::from_millis(1500)), "1.5s");
/// ```
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SEC {
        let (precision, unit) = if nanos < 1_000 {
            (0, "ns")
        } else if nanos < 1_000_000 {
            (3, "µs")
        } else {
            (6, "ms")
        };
        let (fraction, whole) = split_fraction(nanos, precision);
        return format!("{}{}{}", whole, fraction, unit);
    }

    let (fraction, total_secs) = split_fraction(nanos, 9);
    let mut out = format!("{}{}s", total_secs % 60, fraction);

    let total_mins = total_secs / 60;
    if total_mins > 0 {
        out = format!("{}m{}", total_mins % 60, out);

        let hours = total_mins / 60;
        if hours > 0 {
            out = format!("{}h{}", hours, out);
        }
    }

    out
}

/// Split off the lowest `precision` decimal digits of `value` as a fraction with
/// trailing zeros removed (`".5"`, or `""` when they are all zero).
fn split_fraction(value: u128, precision: u32) -> (String, u128) {
    let divisor = 10u128.pow(precision);
    let remainder = value % divisor;

    let fraction = if remainder == 0 {
        String::new()
    } else {
        let digits = format!("{:0width$}", remainder, width = precision as usize);
        format!(".{}", digits.trim_end_matches('0'))
    };

    (fraction, value / divisor)
}

/// Parse Go duration syntax (`72h`, `1h30m`, `1.5s`, `300ms`).
///
/// Negative durations are rejected since they have no meaning for a validity
/// period or a timeout.
pub fn parse_go_duration(input: &str) -> Result<Duration> {
    let invalid =
        |reason: &str| IssuerError::config(format!("invalid duration {:?}: {}", input, reason));

    let text = input.strip_prefix('+').unwrap_or(input);
    if text.starts_with('-') {
        return Err(invalid("negative durations are not supported"));
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut rest = text;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, after) = rest.split_at(int_len);

        let (frac_part, after) = match after.strip_prefix('.') {
            Some(tail) => tail.split_at(tail.bytes().take_while(u8::is_ascii_digit).count()),
            None => ("", after),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len =
            after.find(|c: char| c == '.' || c.is_ascii_digit()).unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            "" => return Err(invalid("missing unit")),
            other => return Err(invalid(&format!("unknown unit {:?}", other))),
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid("number out of range"))?
        };
        let mut value = whole.checked_mul(unit_nanos).ok_or_else(|| invalid("overflow"))?;

        if !frac_part.is_empty() {
            // Digits past nanosecond resolution of the largest unit cannot matter
            let digits = &frac_part[..frac_part.len().min(18)];
            let fraction: u128 = digits.parse().map_err(|_| invalid("number out of range"))?;
            value += fraction * unit_nanos / 10u128.pow(digits.len() as u32);
        }

        total = total.checked_add(value).ok_or_else(|| invalid("overflow"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| invalid("overflow"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}
