//! Timestamps and durations: normalization, parsing and formatting.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::error::CelError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// 0001-01-01T00:00:00Z
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

/// A point in time: seconds since the Unix epoch plus nanos in `[0, 1e9)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// A signed span of time. Nanos are in `[0, 1e9)`, carrying the sign in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

/// Carry nanos outside `[0, 1e9)` into seconds.
fn carry(seconds: i64, nanos: i64) -> Option<(i64, i32)> {
    let seconds = seconds.checked_add(nanos.div_euclid(NANOS_PER_SECOND))?;
    Some((seconds, nanos.rem_euclid(NANOS_PER_SECOND) as i32))
}

impl Timestamp {
    /// Build a normalized timestamp, failing with a range error when it falls
    /// outside years 0001 through 9999.
    pub fn normalize(id: i64, seconds: i64, nanos: i64) -> Result<Self, CelError> {
        let (seconds, nanos) = carry(seconds, nanos).ok_or_else(|| CelError::bad_timestamp(id))?;
        if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
            return Err(CelError::bad_timestamp(id));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn to_datetime_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
    }

    /// Add (or subtract, when `sign` is -1) a duration.
    pub fn add_duration(&self, id: i64, d: &Duration, sign: i64) -> Result<Self, CelError> {
        let seconds = d
            .seconds
            .checked_mul(sign)
            .and_then(|s| self.seconds.checked_add(s))
            .ok_or_else(|| CelError::bad_timestamp(id))?;
        Self::normalize(id, seconds, self.nanos as i64 + sign * d.nanos as i64)
    }

    /// The duration `self - other`.
    pub fn since(&self, id: i64, other: &Timestamp) -> Result<Duration, CelError> {
        Duration::normalize(
            id,
            self.seconds - other.seconds,
            self.nanos as i64 - other.nanos as i64,
        )
    }
}

impl Duration {
    /// Build a normalized duration, failing with a range error when the total
    /// nanosecond count does not fit in an i64.
    pub fn normalize(id: i64, seconds: i64, nanos: i64) -> Result<Self, CelError> {
        let (seconds, nanos) = carry(seconds, nanos).ok_or_else(|| CelError::bad_duration(id))?;
        let total = seconds as i128 * NANOS_PER_SECOND as i128 + nanos as i128;
        if total < i64::MIN as i128 || total > i64::MAX as i128 {
            return Err(CelError::bad_duration(id));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(NANOS_PER_SECOND),
            nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
        }
    }

    /// Total length in nanoseconds. Always fits for normalized durations.
    pub fn total_nanos(&self) -> i64 {
        (self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanos as i128) as i64
    }

    pub fn add(&self, id: i64, other: &Duration, sign: i64) -> Result<Self, CelError> {
        let seconds = other
            .seconds
            .checked_mul(sign)
            .and_then(|s| self.seconds.checked_add(s))
            .ok_or_else(|| CelError::bad_duration(id))?;
        Self::normalize(id, seconds, self.nanos as i64 + sign * other.nanos as i64)
    }

    pub fn negate(&self, id: i64) -> Result<Self, CelError> {
        Duration::default().add(id, self, -1)
    }

    pub fn hours(&self) -> i64 {
        self.total_nanos() / (3600 * NANOS_PER_SECOND)
    }

    pub fn minutes(&self) -> i64 {
        self.total_nanos() / (60 * NANOS_PER_SECOND)
    }

    pub fn whole_seconds(&self) -> i64 {
        self.total_nanos() / NANOS_PER_SECOND
    }

    pub fn milliseconds(&self) -> i64 {
        (self.total_nanos() % NANOS_PER_SECOND) / 1_000_000
    }
}

/// Parse an RFC 3339 timestamp string.
///
/// Supports formats like:
/// - "2009-02-13T23:31:30Z"
/// - "2009-02-13T23:31:30.123456789Z"
/// - "2009-02-13T23:31:30+01:00"
pub fn parse_timestamp(id: i64, s: &str) -> Result<Timestamp, CelError> {
    let dt = DateTime::parse_from_rfc3339(s).map_err(|e| CelError::bad_time_str(id, e))?;
    Timestamp::normalize(id, dt.timestamp(), dt.timestamp_subsec_nanos() as i64)
}

/// Parse a duration string such as "100s", "1.5h", "1h30m" or "-30ms".
///
/// Values whose nanosecond count does not fit in an `i64` are range errors.
pub fn parse_duration(id: i64, s: &str) -> Result<Duration, CelError> {
    let bad = |msg: String| CelError::bad_duration_str(id, msg);
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if body.is_empty() {
        return Err(bad(format!("invalid duration '{}'", s)));
    }
    if body == "0" {
        return Ok(Duration::default());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total: i128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c: char| !is_number(c)).unwrap_or(rest.len()));
        let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        rest = tail;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(bad(format!("expected number at '{}{}'", number, unit)));
        }
        let scale = unit_nanos(unit).ok_or_else(|| match unit {
            "" => bad(format!("missing unit after '{}'", number)),
            _ => bad(format!("unknown unit '{}'", unit)),
        })?;
        total = decimal_nanos(whole, frac, scale)
            .and_then(|n| total.checked_add(n))
            .filter(|t| *t <= i64::MAX as i128)
            .ok_or_else(|| CelError::bad_duration(id))?;
    }

    if negative {
        total = -total;
    }
    let per_second = NANOS_PER_SECOND as i128;
    Duration::normalize(id, (total / per_second) as i64, (total % per_second) as i64)
}

fn unit_nanos(unit: &str) -> Option<i128> {
    Some(match unit {
        "h" => 3_600 * NANOS_PER_SECOND as i128,
        "m" => 60 * NANOS_PER_SECOND as i128,
        "s" => NANOS_PER_SECOND as i128,
        "ms" => 1_000_000,
        "us" | "\u{00b5}s" => 1_000,
        "ns" => 1,
        _ => return None,
    })
}

/// `whole.frac` units of `scale` nanoseconds, truncated. `None` on overflow.
fn decimal_nanos(whole: &str, frac: &str, scale: i128) -> Option<i128> {
    let mut nanos: i128 = 0;
    for digit in whole.bytes().map(|b| i128::from(b - b'0')) {
        nanos = nanos.checked_mul(10)?.checked_add(digit)?;
    }
    nanos = nanos.checked_mul(scale)?;
    let mut place = scale;
    for digit in frac.bytes().map(|b| i128::from(b - b'0')) {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(digit * place)?;
    }
    Some(nanos)
}

/// Format a timestamp as RFC 3339 in UTC, trimming trailing fractional zeros.
pub fn format_timestamp(ts: &Timestamp) -> String {
    match ts.to_datetime_utc() {
        Some(dt) if ts.nanos == 0 => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        Some(dt) => {
            let nanos_str = format!("{:09}", ts.nanos);
            format!(
                "{}.{}Z",
                dt.format("%Y-%m-%dT%H:%M:%S"),
                nanos_str.trim_end_matches('0')
            )
        }
        None => format!("{}s", ts.seconds),
    }
}

/// Format a duration as seconds with an `s` suffix: "100s", "1.5s", "-0.25s".
pub fn format_duration(d: &Duration) -> String {
    let total = d.total_nanos() as i128;
    let sign = if total < 0 { "-" } else { "" };
    let abs = total.abs();
    let secs = abs / NANOS_PER_SECOND as i128;
    let frac = abs % NANOS_PER_SECOND as i128;
    if frac == 0 {
        format!("{}{}s", sign, secs)
    } else {
        let frac_str = format!("{:09}", frac);
        format!("{}{}.{}s", sign, secs, frac_str.trim_end_matches('0'))
    }
}

/// Either an IANA timezone or a fixed offset.
#[derive(Debug, Clone, Copy)]
pub enum TimezoneInfo {
    Iana(Tz),
    Fixed(FixedOffset),
}

/// Parse an IANA name ("America/New_York", "UTC") or a fixed offset
/// ("+01:00", "-05:30", "02:00").
pub fn parse_timezone(id: i64, tz: &str) -> Result<TimezoneInfo, CelError> {
    if let Ok(parsed) = tz.parse::<Tz>() {
        return Ok(TimezoneInfo::Iana(parsed));
    }
    parse_fixed_offset(tz)
        .map(TimezoneInfo::Fixed)
        .ok_or_else(|| CelError::invalid_tz(id, tz))
}

fn parse_fixed_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (h, m) = rest.split_once(':')?;
    let hours: i32 = h.parse().ok().filter(|h| (0..24).contains(h))?;
    let minutes: i32 = m.parse().ok().filter(|m| (0..60).contains(m))?;
    let total = (hours * 3600 + minutes * 60) * if negative { -1 } else { 1 };
    FixedOffset::east_opt(total)
}

impl TimezoneInfo {
    pub fn localize(&self, ts: &Timestamp) -> Option<DateTime<FixedOffset>> {
        let utc = ts.to_datetime_utc()?;
        match self {
            TimezoneInfo::Iana(tz) => {
                let local = utc.with_timezone(tz);
                let offset = local.offset().fix();
                Some(local.with_timezone(&offset))
            }
            TimezoneInfo::Fixed(offset) => Some(utc.with_timezone(offset)),
        }
    }
}

/// Calendar component extracted by the timestamp accessor functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampComponent {
    FullYear,
    /// 0-11, January is 0.
    Month,
    /// 1-31.
    Date,
    /// 0-30.
    DayOfMonth,
    /// 0-6, Sunday is 0.
    DayOfWeek,
    /// 0-365.
    DayOfYear,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl TimestampComponent {
    pub fn extract<Z: TimeZone>(&self, dt: &DateTime<Z>) -> i64 {
        match self {
            TimestampComponent::FullYear => dt.year() as i64,
            TimestampComponent::Month => dt.month0() as i64,
            TimestampComponent::Date => dt.day() as i64,
            TimestampComponent::DayOfMonth => dt.day0() as i64,
            TimestampComponent::DayOfWeek => dt.weekday().num_days_from_sunday() as i64,
            TimestampComponent::DayOfYear => dt.ordinal0() as i64,
            TimestampComponent::Hours => dt.hour() as i64,
            TimestampComponent::Minutes => dt.minute() as i64,
            TimestampComponent::Seconds => dt.second() as i64,
            TimestampComponent::Milliseconds => (dt.nanosecond() / 1_000_000) as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_negative_nanos_normalize() {
        let d = Duration::normalize(0, 0, -1).unwrap();
        assert_eq!((d.seconds, d.nanos), (-1, 999_999_999));
        let d = Duration::normalize(0, 0, -999_999_999).unwrap();
        assert_eq!((d.seconds, d.nanos), (-1, 1));
        let d = Duration::normalize(0, 0, -1_000_000_000).unwrap();
        assert_eq!((d.seconds, d.nanos), (-1, 0));
    }

    #[test]
    fn test_duration_positive_overflow_nanos() {
        let d = Duration::normalize(0, 1, 2_500_000_000).unwrap();
        assert_eq!((d.seconds, d.nanos), (3, 500_000_000));
    }

    #[test]
    fn test_duration_range() {
        assert!(Duration::normalize(0, i64::MAX / NANOS_PER_SECOND, 0).is_ok());
        let err = Duration::normalize(5, i64::MAX / NANOS_PER_SECOND + 1, 0).unwrap_err();
        assert_eq!(err.message, "duration out of range");
        assert_eq!(err.id, 5);
    }

    #[test]
    fn test_timestamp_range() {
        assert!(Timestamp::normalize(0, MAX_TIMESTAMP_SECONDS, 999_999_999).is_ok());
        assert!(Timestamp::normalize(0, MAX_TIMESTAMP_SECONDS, 1_000_000_000).is_err());
        assert!(Timestamp::normalize(0, MIN_TIMESTAMP_SECONDS, 0).is_ok());
        let err = Timestamp::normalize(2, MIN_TIMESTAMP_SECONDS, -1).unwrap_err();
        assert_eq!(err.message, "timestamp out of range");
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(0, "2009-02-13T23:31:30.123456789Z").unwrap();
        assert_eq!(ts.seconds, 1234567890);
        assert_eq!(ts.nanos, 123456789);
        let ts = parse_timestamp(0, "2009-02-13T18:31:30-05:00").unwrap();
        assert_eq!(ts.seconds, 1234567890);
        let err = parse_timestamp(3, "yesterday").unwrap_err();
        assert!(err.message.starts_with("Failed to parse timestamp: "));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(0, "100s").unwrap().seconds, 100);
        assert_eq!(parse_duration(0, "1h30m").unwrap().seconds, 5400);
        assert_eq!(parse_duration(0, "1.5h").unwrap().seconds, 5400);
        let d = parse_duration(0, "500ms").unwrap();
        assert_eq!((d.seconds, d.nanos), (0, 500_000_000));
        let d = parse_duration(0, "-1.5s").unwrap();
        assert_eq!((d.seconds, d.nanos), (-2, 500_000_000));
        assert!(parse_duration(0, "10").is_err());
        assert!(parse_duration(0, "3x").is_err());
        assert!(parse_duration(0, "1..5s").is_err());
        let d = parse_duration(0, ".5s").unwrap();
        assert_eq!((d.seconds, d.nanos), (0, 500_000_000));
    }

    #[test]
    fn test_parse_duration_out_of_range() {
        for s in [
            "99999999999999999999999999999999999h",
            "999999999999999999999999999999999999999999999s",
            "2562048h",
            "-2562048h",
            "9223372036s1s",
        ] {
            let err = parse_duration(4, s).unwrap_err();
            assert_eq!(err.message, "duration out of range", "{}", s);
            assert_eq!(err.id, 4);
        }
        assert_eq!(parse_duration(0, "2562047h").unwrap().hours(), 2_562_047);
    }

    #[test]
    fn test_format() {
        let ts = Timestamp::normalize(0, 1234567890, 123_000_000).unwrap();
        assert_eq!(format_timestamp(&ts), "2009-02-13T23:31:30.123Z");
        assert_eq!(format_duration(&Duration::normalize(0, 1, 500_000_000).unwrap()), "1.5s");
        assert_eq!(format_duration(&Duration::from_nanos(-250_000_000)), "-0.25s");
        assert_eq!(format_duration(&Duration::default()), "0s");
    }

    #[test]
    fn test_duration_accessors_truncate() {
        let d = parse_duration(0, "-90m").unwrap();
        assert_eq!(d.hours(), -1);
        assert_eq!(d.minutes(), -90);
        let d = parse_duration(0, "1.25s").unwrap();
        assert_eq!(d.whole_seconds(), 1);
        assert_eq!(d.milliseconds(), 250);
    }

    #[test]
    fn test_timezones() {
        assert!(matches!(parse_timezone(0, "America/New_York"), Ok(TimezoneInfo::Iana(_))));
        assert!(matches!(parse_timezone(0, "+05:30"), Ok(TimezoneInfo::Fixed(_))));
        assert!(matches!(parse_timezone(0, "05:30"), Ok(TimezoneInfo::Fixed(_))));
        let err = parse_timezone(1, "Mars/Olympus").unwrap_err();
        assert_eq!(err.message, "invalid timezone: Mars/Olympus");
    }

    #[test]
    fn test_fixed_offset_bounds() {
        assert!(matches!(parse_timezone(0, "-23:59"), Ok(TimezoneInfo::Fixed(_))));
        for tz in ["99999999:00", "24:00", "01:60", "1:-5", "00:99999999999"] {
            let err = parse_timezone(2, tz).unwrap_err();
            assert_eq!(err.message, format!("invalid timezone: {}", tz));
        }
    }

    #[test]
    fn test_components() {
        let ts = Timestamp::normalize(0, 1234567890, 0).unwrap();
        let dt = ts.to_datetime_utc().unwrap();
        assert_eq!(TimestampComponent::FullYear.extract(&dt), 2009);
        assert_eq!(TimestampComponent::Month.extract(&dt), 1);
        assert_eq!(TimestampComponent::Date.extract(&dt), 13);
        assert_eq!(TimestampComponent::DayOfMonth.extract(&dt), 12);
        assert_eq!(TimestampComponent::DayOfWeek.extract(&dt), 5);
        let tz = parse_timezone(0, "+01:00").unwrap();
        let local = tz.localize(&ts).unwrap();
        assert_eq!(TimestampComponent::Hours.extract(&local), 0);
        assert_eq!(TimestampComponent::Date.extract(&local), 14);
    }
}
