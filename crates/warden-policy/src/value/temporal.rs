//! `xs:date`, `xs:time`, `xs:dateTime` and the two XQuery duration types.
//!
//! Values keep the time zone they were written with, if any. Zone-less values
//! are interpreted in the implicit time zone handed in by the caller; every
//! comparison and arithmetic function uses the same rule.

use chrono::{FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, Utc};
use std::cmp::Ordering;
use std::fmt;

use warden_core::DataType;

use crate::error::ValueError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse a `Z`, `+hh:mm` or `-hh:mm` time zone designator.
pub fn parse_offset(s: &str) -> Result<FixedOffset, String> {
    if s == "Z" {
        return Ok(utc());
    }
    let bytes = s.as_bytes();
    if !s.is_ascii() || bytes.len() != 6 || bytes[3] != b':' {
        return Err(format!("invalid time zone '{}'", s));
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(format!("invalid time zone '{}'", s)),
    };
    let hours: i32 = s[1..3]
        .parse()
        .map_err(|_| format!("invalid time zone hours in '{}'", s))?;
    let minutes: i32 = s[4..6]
        .parse()
        .map_err(|_| format!("invalid time zone minutes in '{}'", s))?;
    if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
        return Err(format!("time zone '{}' out of range", s));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("time zone '{}' out of range", s))
}

/// Split a trailing time zone designator off a lexical date/time value.
fn split_offset(s: &str) -> Result<(&str, Option<FixedOffset>), String> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Ok((rest, Some(utc())));
    }
    let bytes = s.as_bytes();
    if s.is_ascii() && bytes.len() > 6 {
        let sign_at = bytes.len() - 6;
        if matches!(bytes[sign_at], b'+' | b'-') && bytes[bytes.len() - 3] == b':' {
            let offset = parse_offset(&s[sign_at..])?;
            return Ok((&s[..sign_at], Some(offset)));
        }
    }
    Ok((s, None))
}

fn format_offset(offset: &Option<FixedOffset>) -> String {
    match offset {
        None => String::new(),
        Some(o) if o.local_minus_utc() == 0 => "Z".to_string(),
        Some(o) => {
            let secs = o.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            format!("{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
        }
    }
}

fn to_utc(naive: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    naive.checked_sub_signed(shift).unwrap_or(naive)
}

/// Reference day used to compare bare times, as in XPath `op:time-equal`.
fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1972, 12, 31).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// xs:date
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XsDate {
    pub date: NaiveDate,
    pub offset: Option<FixedOffset>,
}

impl XsDate {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: String| ValueError::new(DataType::Date, raw, reason);
        let (body, offset) = split_offset(raw).map_err(err)?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|e| ValueError::new(DataType::Date, raw, e.to_string()))?;
        Ok(Self { date, offset })
    }

    pub fn instant(&self, implicit: FixedOffset) -> NaiveDateTime {
        to_utc(
            self.date.and_time(NaiveTime::MIN),
            self.offset.unwrap_or(implicit),
        )
    }

    pub fn compare(&self, other: &Self, implicit: FixedOffset) -> Ordering {
        self.instant(implicit).cmp(&other.instant(implicit))
    }

    pub fn add_months(&self, months: i64) -> Option<Self> {
        let date = shift_months(self.date.and_time(NaiveTime::MIN), months)?.date();
        Some(Self {
            date,
            offset: self.offset,
        })
    }
}

impl fmt::Display for XsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.date.format("%Y-%m-%d"),
            format_offset(&self.offset)
        )
    }
}

// ---------------------------------------------------------------------------
// xs:time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XsTime {
    pub time: NaiveTime,
    pub offset: Option<FixedOffset>,
}

impl XsTime {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: String| ValueError::new(DataType::Time, raw, reason);
        let (body, offset) = split_offset(raw).map_err(err)?;
        let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f")
            .map_err(|e| ValueError::new(DataType::Time, raw, e.to_string()))?;
        Ok(Self { time, offset })
    }

    pub fn instant(&self, implicit: FixedOffset) -> NaiveDateTime {
        to_utc(
            reference_date().and_time(self.time),
            self.offset.unwrap_or(implicit),
        )
    }

    pub fn compare(&self, other: &Self, implicit: FixedOffset) -> Ordering {
        self.instant(implicit).cmp(&other.instant(implicit))
    }

    /// Nanoseconds since midnight UTC, folded into a single day.
    pub fn nanos_of_day_utc(&self, zone: FixedOffset) -> i128 {
        use chrono::Timelike;
        let local = i128::from(self.time.num_seconds_from_midnight()) * NANOS_PER_SECOND
            + i128::from(self.time.nanosecond());
        let shifted = local - i128::from(zone.local_minus_utc()) * NANOS_PER_SECOND;
        shifted.rem_euclid(86_400 * NANOS_PER_SECOND)
    }
}

impl fmt::Display for XsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.time.format("%H:%M:%S%.f"),
            format_offset(&self.offset)
        )
    }
}

// ---------------------------------------------------------------------------
// xs:dateTime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XsDateTime {
    pub datetime: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl XsDateTime {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: String| ValueError::new(DataType::DateTime, raw, reason);
        let (body, offset) = split_offset(raw).map_err(err)?;
        let datetime = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| ValueError::new(DataType::DateTime, raw, e.to_string()))?;
        Ok(Self { datetime, offset })
    }

    pub fn instant(&self, implicit: FixedOffset) -> NaiveDateTime {
        to_utc(self.datetime, self.offset.unwrap_or(implicit))
    }

    pub fn compare(&self, other: &Self, implicit: FixedOffset) -> Ordering {
        self.instant(implicit).cmp(&other.instant(implicit))
    }

    pub fn add_duration(&self, duration: &DayTimeDuration, negate: bool) -> Option<Self> {
        let delta = if negate {
            TimeDelta::zero().checked_sub(&duration.delta)?
        } else {
            duration.delta
        };
        Some(Self {
            datetime: self.datetime.checked_add_signed(delta)?,
            offset: self.offset,
        })
    }

    pub fn add_months(&self, months: i64) -> Option<Self> {
        Some(Self {
            datetime: shift_months(self.datetime, months)?,
            offset: self.offset,
        })
    }
}

impl fmt::Display for XsDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.datetime.format("%Y-%m-%dT%H:%M:%S%.f"),
            format_offset(&self.offset)
        )
    }
}

fn shift_months(value: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        value.checked_add_months(Months::new(magnitude))
    } else {
        value.checked_sub_months(Months::new(magnitude))
    }
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Split `-?P...` into its sign and the text after `P`.
fn duration_body(raw: &str) -> Option<(bool, &str)> {
    let (negative, rest) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    rest.strip_prefix('P').map(|body| (negative, body))
}

/// Read `<number><designator>` components in the order given by `allowed`.
fn duration_components<'a>(
    text: &'a str,
    allowed: &[char],
    fraction_on: Option<char>,
) -> Result<Vec<(char, &'a str)>, String> {
    let mut out = Vec::new();
    let mut next_allowed = 0usize;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        if ch.is_ascii_digit() || (ch == '.' && fraction_on.is_some()) {
            continue;
        }
        let pos = allowed[next_allowed..]
            .iter()
            .position(|d| *d == ch)
            .ok_or_else(|| format!("unexpected '{}'", ch))?;
        let number = &text[start..idx];
        if number.is_empty() {
            return Err(format!("missing number before '{}'", ch));
        }
        if number.contains('.') && Some(ch) != fraction_on {
            return Err(format!("fraction not allowed before '{}'", ch));
        }
        out.push((ch, number));
        next_allowed += pos + 1;
        start = idx + ch.len_utf8();
    }
    if start != text.len() {
        return Err("trailing digits without designator".to_string());
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayTimeDuration {
    pub delta: TimeDelta,
}

impl DayTimeDuration {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::new(DataType::DayTimeDuration, raw, reason);
        let (negative, body) = duration_body(raw.trim()).ok_or_else(|| err("must start with P"))?;
        let (day_part, time_part) = match body.split_once('T') {
            Some((d, t)) => {
                if t.is_empty() {
                    return Err(err("empty time section"));
                }
                (d, Some(t))
            }
            None => (body, None),
        };
        let mut nanos: i128 = 0;
        let mut seen = 0usize;
        for (designator, number) in duration_components(day_part, &['D'], None).map_err(|e| err(&e))? {
            let days: i128 = number.parse().map_err(|_| err("invalid day count"))?;
            debug_assert_eq!(designator, 'D');
            nanos += days * 86_400 * NANOS_PER_SECOND;
            seen += 1;
        }
        if let Some(time) = time_part {
            for (designator, number) in
                duration_components(time, &['H', 'M', 'S'], Some('S')).map_err(|e| err(&e))?
            {
                nanos += match designator {
                    'H' => parse_whole(number).map_err(|e| err(&e))? * 3_600 * NANOS_PER_SECOND,
                    'M' => parse_whole(number).map_err(|e| err(&e))? * 60 * NANOS_PER_SECOND,
                    _ => parse_seconds(number).map_err(|e| err(&e))?,
                };
                seen += 1;
            }
        }
        if seen == 0 {
            return Err(err("no duration components"));
        }
        if negative {
            nanos = -nanos;
        }
        let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND))
            .map_err(|_| err("duration out of range"))?;
        let sub = nanos.rem_euclid(NANOS_PER_SECOND) as i64;
        let delta = TimeDelta::try_seconds(secs)
            .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(sub)))
            .ok_or_else(|| err("duration out of range"))?;
        Ok(Self { delta })
    }
}

fn parse_whole(number: &str) -> Result<i128, String> {
    number
        .parse::<i128>()
        .map_err(|_| format!("invalid number '{}'", number))
}

fn parse_seconds(number: &str) -> Result<i128, String> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let whole = if whole.is_empty() { 0 } else { parse_whole(whole)? };
    let mut digits: String = fraction.chars().take(9).collect();
    while digits.len() < 9 {
        digits.push('0');
    }
    let fraction = parse_whole(&digits)?;
    Ok(whole * NANOS_PER_SECOND + fraction)
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = i128::from(self.delta.num_seconds()) * NANOS_PER_SECOND
            + i128::from(self.delta.subsec_nanos());
        if total == 0 {
            return write!(f, "PT0S");
        }
        let sign = if total < 0 { "-" } else { "" };
        let total = total.abs();
        let secs = total / NANOS_PER_SECOND;
        let nanos = total % NANOS_PER_SECOND;
        let (days, hours, minutes, seconds) =
            (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60, secs % 60);
        write!(f, "{}P", sign)?;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 {
            write!(f, "T")?;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if seconds > 0 || nanos > 0 {
                if nanos > 0 {
                    let frac = format!("{:09}", nanos);
                    write!(f, "{}.{}S", seconds, frac.trim_end_matches('0'))?;
                } else {
                    write!(f, "{}S", seconds)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonthDuration {
    pub months: i64,
}

impl YearMonthDuration {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::new(DataType::YearMonthDuration, raw, reason);
        let (negative, body) = duration_body(raw.trim()).ok_or_else(|| err("must start with P"))?;
        let components = duration_components(body, &['Y', 'M'], None).map_err(|e| err(&e))?;
        if components.is_empty() {
            return Err(err("no duration components"));
        }
        let mut months: i64 = 0;
        for (designator, number) in components {
            let n: i64 = number.parse().map_err(|_| err("invalid number"))?;
            let add = if designator == 'Y' {
                n.checked_mul(12).ok_or_else(|| err("duration out of range"))?
            } else {
                n
            };
            months = months
                .checked_add(add)
                .ok_or_else(|| err("duration out of range"))?;
        }
        Ok(Self {
            months: if negative { -months } else { months },
        })
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.months < 0 { "-" } else { "" };
        let months = self.months.unsigned_abs();
        match (months / 12, months % 12) {
            (0, m) => write!(f, "{}P{}M", sign, m),
            (y, 0) => write!(f, "{}P{}Y", sign, y),
            (y, m) => write!(f, "{}P{}Y{}M", sign, y, m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    #[test]
    fn test_parse_date_with_and_without_zone() {
        let d = XsDate::parse("2020-01-02").unwrap();
        assert_eq!(d.offset, None);
        let z = XsDate::parse("2020-01-02Z").unwrap();
        assert_eq!(z.offset, Some(utc()));
        let p = XsDate::parse("2020-01-02+05:30").unwrap();
        assert_eq!(p.offset.unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(p.to_string(), "2020-01-02+05:30");
        let n = XsDate::parse("2020-01-02-05:00").unwrap();
        assert_eq!(n.offset.unwrap().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(XsDate::parse("2020-13-01").is_err());
        assert!(XsDate::parse("yesterday").is_err());
        assert!(XsDate::parse("2020-01-01+25:00").is_err());
    }

    #[test]
    fn test_zone_less_uses_implicit_zone() {
        let local = XsDateTime::parse("2020-01-01T10:00:00").unwrap();
        let utc_ten = XsDateTime::parse("2020-01-01T10:00:00Z").unwrap();
        assert_eq!(local.compare(&utc_ten, utc()), Ordering::Equal);
        // Under +02:00, a zone-less 10:00 is 08:00Z.
        assert_eq!(local.compare(&utc_ten, plus(2)), Ordering::Less);
    }

    #[test]
    fn test_time_compare_across_zones() {
        let a = XsTime::parse("13:00:00+01:00").unwrap();
        let b = XsTime::parse("12:00:00Z").unwrap();
        assert_eq!(a.compare(&b, utc()), Ordering::Equal);
        assert_eq!(a.to_string(), "13:00:00+01:00");
    }

    #[test]
    fn test_time_nanos_of_day_wraps() {
        let t = XsTime::parse("01:00:00+02:00").unwrap();
        assert_eq!(t.nanos_of_day_utc(plus(2)), 23 * 3600 * NANOS_PER_SECOND);
    }

    #[test]
    fn test_day_time_duration_parse_and_display() {
        let d = DayTimeDuration::parse("P1DT2H30M").unwrap();
        assert_eq!(d.delta, TimeDelta::seconds(86_400 + 2 * 3600 + 30 * 60));
        assert_eq!(d.to_string(), "P1DT2H30M");
        let s = DayTimeDuration::parse("-PT1.5S").unwrap();
        assert_eq!(s.delta, TimeDelta::milliseconds(-1500));
        assert_eq!(s.to_string(), "-PT1.5S");
        assert_eq!(DayTimeDuration::parse("PT0S").unwrap().to_string(), "PT0S");
    }

    #[test]
    fn test_day_time_duration_rejects_bad_forms() {
        for bad in ["P", "PT", "1D", "P1Y", "PT1H2D", "P1.5D", "PT5"] {
            assert!(DayTimeDuration::parse(bad).is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_year_month_duration() {
        let d = YearMonthDuration::parse("P1Y2M").unwrap();
        assert_eq!(d.months, 14);
        assert_eq!(d.to_string(), "P1Y2M");
        assert_eq!(YearMonthDuration::parse("-P3M").unwrap().months, -3);
        assert!(YearMonthDuration::parse("P1D").is_err());
        assert!(YearMonthDuration::parse("P").is_err());
    }

    #[test]
    fn test_date_time_arithmetic() {
        let dt = XsDateTime::parse("2020-01-31T12:00:00Z").unwrap();
        let plus_day = dt
            .add_duration(&DayTimeDuration::parse("P1D").unwrap(), false)
            .unwrap();
        assert_eq!(plus_day.to_string(), "2020-02-01T12:00:00Z");
        let plus_month = dt.add_months(1).unwrap();
        assert_eq!(plus_month.to_string(), "2020-02-29T12:00:00Z");
        let minus_month = dt.add_months(-2).unwrap();
        assert_eq!(minus_month.to_string(), "2019-11-30T12:00:00Z");
    }
}
