//! Source date normalization.
//!
//! Every source publishes civil times in Japan Standard Time (UTC+9). They
//! are converted to UTC instants here regardless of the host time zone.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;

/// Offset of the sources' civil time zone, in seconds.
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Year, month and day separated by `.`, `/` or `-`, optionally followed by
/// `HH:mm` and `:ss`.
static DELIMITED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[./-](\d{1,2})[./-](\d{1,2})(?:\s+(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?)?")
        .expect("date pattern is valid")
});

/// Date layouts published by the sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `yyyyMMdd`
    Compact,
    /// `yyyy.M.d HH:mm`
    DotMinutes,
    /// `yyyy/M/d`
    SlashDate,
    /// `yyyy/MM/dd HH:mm:ss`
    SlashSeconds,
    /// `yyyy.MM.dd`
    DotDate,
    /// `yyyy/MM/dd HH:mm`
    SlashMinutes,
}

impl DateFormat {
    /// Layout descriptor, for log output.
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Compact => "yyyyMMdd",
            DateFormat::DotMinutes => "yyyy.M.d HH:mm",
            DateFormat::SlashDate => "yyyy/M/d",
            DateFormat::SlashSeconds => "yyyy/MM/dd HH:mm:ss",
            DateFormat::DotDate => "yyyy.MM.dd",
            DateFormat::SlashMinutes => "yyyy/MM/dd HH:mm",
        }
    }
}

/// Parse a JST date string into a UTC instant.
///
/// Unparseable input is not an error: a warning is logged and the current
/// instant is returned in its place.
pub fn normalize(input: &str, format: DateFormat) -> DateTime<Utc> {
    try_normalize(input, format).unwrap_or_else(|| {
        log::warn!(
            "[DateParser] Could not parse '{}' as {}",
            input,
            format.pattern()
        );
        Utc::now()
    })
}

/// Parse a JST date string into a UTC instant, or `None` if it does not parse.
pub fn try_normalize(input: &str, format: DateFormat) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let fields = match format {
        DateFormat::Compact if input.len() == 8 && input.bytes().all(|b| b.is_ascii_digit()) => {
            [&input[0..4], &input[4..6], &input[6..8], "0", "0", "0"]
        }
        _ => {
            let caps = DELIMITED.captures(input)?;
            let group = |i: usize| caps.get(i).map_or("0", |m| m.as_str());
            [group(1), group(2), group(3), group(4), group(5), group(6)]
        }
    };

    let [year, month, day, hour, minute, second] = fields;
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let naive = date.and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, second.parse().ok()?)?;

    let jst = FixedOffset::east_opt(JST_OFFSET_SECS)?;
    naive
        .and_local_timezone(jst)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_dot_with_minutes() {
        assert_eq!(
            try_normalize("2025.03.14 09:30", DateFormat::DotMinutes),
            Some(utc(2025, 3, 14, 0, 30, 0))
        );
        assert_eq!(
            try_normalize("2025.3.4 21:05", DateFormat::DotMinutes),
            Some(utc(2025, 3, 4, 12, 5, 0))
        );
    }

    #[test]
    fn test_slash_with_seconds() {
        assert_eq!(
            try_normalize("2024/12/31 23:59:59", DateFormat::SlashSeconds),
            Some(utc(2024, 12, 31, 14, 59, 59))
        );
    }

    #[test]
    fn test_date_only_crosses_midnight() {
        assert_eq!(
            try_normalize("2025.01.01", DateFormat::DotDate),
            Some(utc(2024, 12, 31, 15, 0, 0))
        );
        assert_eq!(
            try_normalize("2025/1/2", DateFormat::SlashDate),
            Some(utc(2025, 1, 1, 15, 0, 0))
        );
    }

    #[test]
    fn test_compact() {
        assert_eq!(
            try_normalize("20250101", DateFormat::Compact),
            Some(utc(2024, 12, 31, 15, 0, 0))
        );
    }

    #[test]
    fn test_surrounding_text_is_ignored() {
        assert_eq!(
            try_normalize("  2025/03/14 09:30 \n", DateFormat::SlashMinutes),
            Some(utc(2025, 3, 14, 0, 30, 0))
        );
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(try_normalize("", DateFormat::DotDate), None);
        assert_eq!(try_normalize("yesterday", DateFormat::DotDate), None);
        assert_eq!(try_normalize("2025.13.40", DateFormat::DotDate), None);
        assert_eq!(try_normalize("2025.01.01 25:00", DateFormat::DotMinutes), None);
    }

    #[test]
    fn test_normalize_falls_back_to_now() {
        let before = Utc::now();
        let parsed = normalize("not a date", DateFormat::SlashMinutes);
        let after = Utc::now();
        assert!(parsed >= before && parsed <= after);
    }
}
