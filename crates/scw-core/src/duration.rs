//! Go-style duration strings (`1m30s`, `500ms`, `1h0m0s`)
//!
//! The cloud API and persisted state both use this textual form, so parsing
//! accepts everything the cloud emits and formatting reproduces it exactly.

use crate::error::{CoreError, Result};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a duration such as `1h15m`, `30.5s` or `0`
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let err = || CoreError::InvalidDuration(raw.to_string());
    let mut s = raw.strip_prefix('+').unwrap_or(raw);
    if s.starts_with('-') {
        return Err(err());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(err());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let int_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let int_part = &s[..int_len];
        s = &s[int_len..];

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            frac_part = &rest[..frac_len];
            s = &rest[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }

        let unit_len = s
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(s.len());
        let unit = unit_nanos(&s[..unit_len]).ok_or_else(err)?;
        s = &s[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };
        total = total
            .checked_add(whole.checked_mul(unit).ok_or_else(err)?)
            .ok_or_else(err)?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| err())?;
            let scale = 10u128.pow(digits.len() as u32);
            total = total.checked_add(frac * unit / scale).ok_or_else(err)?;
        }
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| err())?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

fn trim_fraction(value: u128, width: usize) -> String {
    let digits = format!("{value:0width$}");
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{trimmed}")
    }
}

/// Format a duration the way Go's `time.Duration.String` does
pub fn format_duration(d: Duration) -> String {
    let total = d.as_nanos();
    if total == 0 {
        return "0s".to_string();
    }

    if total < NANOS_PER_SEC {
        return if total < 1_000 {
            format!("{total}ns")
        } else if total < 1_000_000 {
            format!("{}{}µs", total / 1_000, trim_fraction(total % 1_000, 3))
        } else {
            format!(
                "{}{}ms",
                total / 1_000_000,
                trim_fraction(total % 1_000_000, 6)
            )
        };
    }

    let secs = total / NANOS_PER_SEC;
    let frac = total % NANOS_PER_SEC;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}{}s", trim_fraction(frac, 9)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30.0s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("2µs").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "30", "s", "1x", "-1s", "1..5s", "."] {
            assert!(parse_duration(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.5µs");
        assert_eq!(format_duration(Duration::from_nanos(7)), "7ns");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");
    }

    #[test]
    fn test_format_parse_stable() {
        for s in ["1m30s", "1h0m0s", "5s", "250ms", "2h30m0s", "1.25s"] {
            assert_eq!(format_duration(parse_duration(s).unwrap()), s);
        }
    }
}
