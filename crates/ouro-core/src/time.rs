//! Lightweight UTC date/time utilities (no chrono dependency).
//!
//! Timestamps are Unix milliseconds throughout the crate. Uses Howard
//! Hinnant's civil date algorithms for both directions of conversion.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as Unix milliseconds.
pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current UTC timestamp in ISO-8601 format.
pub fn now_iso8601() -> String {
    unix_millis_to_iso8601(now_unix_millis())
}

/// Convert Unix milliseconds to an ISO-8601 UTC string (second precision).
pub fn unix_millis_to_iso8601(millis: u64) -> String {
    let secs = millis / 1000;
    let days = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Wall-clock `HH:MM` (UTC) of a Unix millisecond timestamp.
pub fn clock_hh_mm(millis: u64) -> String {
    let time_of_day = (millis / 1000) % 86400;
    format!("{:02}:{:02}", time_of_day / 3600, (time_of_day % 3600) / 60)
}

/// Parse an ISO-8601 timestamp into Unix milliseconds.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS[.fff]]` with `T` or a space as
/// separator, and an optional `Z` or `±HH:MM` / `±HHMM` offset. Anything
/// before the epoch or unparseable yields `None`.
pub fn parse_iso8601_millis(input: &str) -> Option<u64> {
    let s = input.trim();
    if !s.is_ascii() || s.len() < 10 {
        return None;
    }

    let year: i64 = s.get(0..4)?.parse().ok()?;
    let month: u64 = s.get(5..7)?.parse().ok()?;
    let day: u64 = s.get(8..10)?.parse().ok()?;
    if &s[4..5] != "-" || &s[7..8] != "-" || !(1..=12).contains(&month) || !(1..=31).contains(&day)
    {
        return None;
    }

    let mut millis_of_day: i64 = 0;
    let mut offset_minutes: i64 = 0;
    let rest = &s[10..];

    if !rest.is_empty() {
        let sep = &rest[..1];
        if sep != "T" && sep != "t" && sep != " " {
            return None;
        }
        let time = &rest[1..];
        let hours: i64 = time.get(0..2)?.parse().ok()?;
        if time.get(2..3)? != ":" {
            return None;
        }
        let minutes: i64 = time.get(3..5)?.parse().ok()?;
        let mut idx = 5;
        let mut seconds: i64 = 0;
        let mut frac_millis: i64 = 0;

        if time.get(idx..idx + 1) == Some(":") {
            seconds = time.get(idx + 1..idx + 3)?.parse().ok()?;
            idx += 3;
            if time.get(idx..idx + 1) == Some(".") {
                let digits: String = time[idx + 1..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if digits.is_empty() {
                    return None;
                }
                idx += 1 + digits.len();
                let padded = format!("{:0<3}", &digits[..digits.len().min(3)]);
                frac_millis = padded.parse().ok()?;
            }
        }

        if hours > 23 || minutes > 59 || seconds > 60 {
            return None;
        }

        let tz = &time[idx..];
        offset_minutes = match tz {
            "" | "Z" | "z" => 0,
            _ => parse_offset(tz)?,
        };
        millis_of_day = ((hours * 60 + minutes) * 60 + seconds) * 1000 + frac_millis;
    }

    let days = days_from_civil(year, month, day);
    let total = days * 86_400_000 + millis_of_day - offset_minutes * 60_000;
    u64::try_from(total).ok()
}

/// `+HH:MM`, `+HHMM` or `+HH` (and the `-` forms) → signed minutes.
fn parse_offset(tz: &str) -> Option<i64> {
    let sign = match tz.get(0..1)? {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let body = tz[1..].replace(':', "");
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (h, m) = match body.len() {
        2 => (body.parse::<i64>().ok()?, 0),
        4 => (body[..2].parse::<i64>().ok()?, body[2..].parse::<i64>().ok()?),
        _ => return None,
    };
    Some(sign * (h * 60 + m))
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Howard Hinnant's days_from_civil: (year, month, day) → Unix epoch days.
fn days_from_civil(year: i64, month: u64, day: u64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(unix_millis_to_iso8601(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_known_date() {
        // 2026-02-21T00:00:00Z = 1771632000
        assert_eq!(unix_millis_to_iso8601(1_771_632_000_000), "2026-02-21T00:00:00Z");
    }

    #[test]
    fn test_now_is_recent() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"), "timestamp should be this century: {ts}");
    }

    #[test]
    fn test_parse_utc() {
        assert_eq!(
            parse_iso8601_millis("2026-02-21T00:00:00Z"),
            Some(1_771_632_000_000)
        );
        assert_eq!(parse_iso8601_millis("1970-01-01"), Some(0));
    }

    #[test]
    fn test_parse_fraction_and_offset() {
        // 08:30:00.250+08:00 is 00:30:00.250Z
        assert_eq!(
            parse_iso8601_millis("2026-02-21T08:30:00.250+08:00"),
            Some(1_771_632_000_000 + 30 * 60_000 + 250)
        );
        assert_eq!(
            parse_iso8601_millis("2026-02-21 08:30:00+0800"),
            Some(1_771_632_000_000 + 30 * 60_000)
        );
    }

    #[test]
    fn test_parse_microsecond_precision_truncates() {
        assert_eq!(
            parse_iso8601_millis("1970-01-01T00:00:01.123456Z"),
            Some(1123)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_iso8601_millis("yesterday"), None);
        assert_eq!(parse_iso8601_millis("2026-13-01"), None);
        assert_eq!(parse_iso8601_millis("2026-02-21X00:00"), None);
        assert_eq!(parse_iso8601_millis("1969-12-31T23:59:59Z"), None);
    }

    #[test]
    fn test_roundtrip_through_civil() {
        let millis = parse_iso8601_millis("2024-02-29T12:00:00Z").unwrap();
        assert_eq!(unix_millis_to_iso8601(millis), "2024-02-29T12:00:00Z");
    }

    #[test]
    fn test_clock_hh_mm() {
        assert_eq!(clock_hh_mm(1_771_632_000_000 + (13 * 60 + 5) * 60_000), "13:05");
    }
}
