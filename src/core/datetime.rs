use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
    format::{Item, StrftimeItems},
};
use error_stack::{Report, Result};
use log::debug;
use rand::Rng;

use crate::{
    core::number::{Number, Shape, sample_number},
    generator::Error,
};

const MICROS_PER_DAY: f64 = 86_400_000_000.;
const SIGNIFICANT_DIGITS: u32 = 15;

/// One end of a date range.
#[derive(Debug, Clone, PartialEq)]
pub enum DateBound {
    Instant(DateTime<FixedOffset>),
    /// RFC 3339 or a `y-m-d`, `d/m/y`, `m.d.y`, ... date with an optional time.
    Text(String),
    DaysFromNow(i64),
    /// Only valid for the upper bound, relative to the lower bound.
    Offset(TimeDelta),
}

impl From<DateTime<FixedOffset>> for DateBound {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Instant(value)
    }
}

impl From<&str> for DateBound {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for DateBound {
    fn from(value: i64) -> Self {
        Self::DaysFromNow(value)
    }
}

impl From<TimeDelta> for DateBound {
    fn from(value: TimeDelta) -> Self {
        Self::Offset(value)
    }
}

/// Disambiguation for dates such as `01/02/03`.
#[derive(Debug, Copy, Clone, Default)]
pub struct DateOrder {
    pub day_first: bool,
    pub year_first: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateTimes {
    Instants(Vec<DateTime<FixedOffset>>),
    /// Fractional days since the Unix epoch.
    Numeric(Vec<f64>),
    Formatted(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub enum DateOutput {
    #[default]
    Instants,
    Numeric,
    Format(String),
}

/// Truncation applied to every drawn instant, date first.
#[derive(Debug, Copy, Clone, Default)]
pub struct Truncation {
    pub ignore_time: bool,
    pub ignore_seconds: bool,
}

/// Turns the range endpoints into concrete instants.
pub fn resolve_bounds(
    start: Option<&DateBound>,
    until: Option<&DateBound>,
    now: DateTime<FixedOffset>,
    order: DateOrder,
) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), Error> {
    let (Some(start), Some(until)) = (start, until) else {
        return Err(Report::new(Error::MissingBound)
            .attach_printable("Both start and until are required for dates"));
    };

    let start = match start {
        DateBound::Offset(_) => {
            return Err(Report::new(Error::UnrecognizedInput)
                .attach_printable("A duration can only be used as the upper bound"));
        }
        bound => resolve(bound, now, order)?,
    };
    let until = match until {
        DateBound::Offset(delta) => start.checked_add_signed(*delta).ok_or_else(|| {
            Report::new(Error::InvalidRange).attach_printable(format!("{start} + {delta} overflows"))
        })?,
        bound => resolve(bound, now, order)?,
    };
    Ok((start, until))
}

fn resolve(
    bound: &DateBound,
    now: DateTime<FixedOffset>,
    order: DateOrder,
) -> Result<DateTime<FixedOffset>, Error> {
    match bound {
        DateBound::Instant(instant) => Ok(*instant),
        DateBound::DaysFromNow(days) => TimeDelta::try_days(*days)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                Report::new(Error::InvalidRange)
                    .attach_printable(format!("{days} days from now is out of range"))
            }),
        DateBound::Text(text) => parse_date(text, order),
        DateBound::Offset(_) => Err(Report::new(Error::UnrecognizedInput)),
    }
}

/// Parses RFC 3339 or a delimited numeric date, naive dates being UTC.
pub fn parse_date(text: &str, order: DateOrder) -> Result<DateTime<FixedOffset>, Error> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant);
    }

    let unrecognized =
        || Report::new(Error::UnrecognizedInput).attach_printable(format!("Bad date: {text:?}"));
    let (date, time) = match text.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };
    let date = parse_naive_date(date, order).ok_or_else(unrecognized)?;
    let time = match time {
        Some(time) => ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(time, format).ok())
            .ok_or_else(unrecognized)?,
        None => NaiveTime::MIN,
    };
    Ok(NaiveDateTime::new(date, time).and_utc().fixed_offset())
}

fn parse_naive_date(date: &str, order: DateOrder) -> Option<NaiveDate> {
    let separator = date.chars().find(|c| matches!(c, '-' | '/' | '.'))?;
    let parts = date.split(separator).collect::<Vec<_>>();
    let [a, b, c] = parts[..] else {
        return None;
    };
    if [a, b, c]
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let ymd = |y: &str, m: &str, d: &str| {
        NaiveDate::from_ymd_opt(year(y)?, m.parse().ok()?, d.parse().ok()?)
    };
    if a.len() == 4 || order.year_first {
        ymd(a, b, c)
    } else if order.day_first {
        ymd(c, b, a)
    } else {
        ymd(c, a, b).or_else(|| ymd(c, b, a))
    }
}

fn year(text: &str) -> Option<i32> {
    let year = text.parse::<i32>().ok()?;
    Some(match (text.len(), year) {
        (..=2, ..70) => 2000 + year,
        (..=2, _) => 1900 + year,
        _ => year,
    })
}

/// Draws `size` instants from `[start, until)`, keeping `start`'s offset.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
pub fn sample_datetime<R: Rng + ?Sized>(
    start: DateTime<FixedOffset>,
    until: DateTime<FixedOffset>,
    shape: &Shape<'_>,
    truncation: Truncation,
    size: usize,
    rng: &mut R,
) -> Result<Vec<DateTime<FixedOffset>>, Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }
    if start == until {
        return Ok(vec![truncate(start, truncation); size]);
    }

    let (low, high) = (to_days(start), to_days(until));
    let shape = Shape {
        precision: Some(axis_precision(low.abs().max(high.abs()))),
        ..shape.clone()
    };
    debug!("Sampling dates on the day axis [{low}, {high})");
    let offset = *start.offset();
    sample_number(Number::Float(low), Number::Float(high), &shape, size, rng)?
        .into_f64()
        .into_iter()
        .map(|days| {
            from_days(days)
                .map(|instant| truncate(instant.with_timezone(&offset).max(start), truncation))
                .ok_or_else(|| {
                    Report::new(Error::InvalidRange)
                        .attach_printable(format!("{days} days is not a valid instant"))
                })
        })
        .collect()
}

/// Encodes the instants as requested.
pub fn render(
    instants: Vec<DateTime<FixedOffset>>,
    output: &DateOutput,
) -> Result<DateTimes, Error> {
    Ok(match output {
        DateOutput::Instants => DateTimes::Instants(instants),
        DateOutput::Numeric => DateTimes::Numeric(instants.into_iter().map(to_days).collect()),
        DateOutput::Format(format) => {
            if !is_valid_format(format) {
                return Err(Report::new(Error::UnrecognizedInput)
                    .attach_printable(format!("Bad date format: {format:?}")));
            }
            DateTimes::Formatted(
                instants
                    .into_iter()
                    .map(|instant| instant.format(format).to_string())
                    .collect(),
            )
        }
    })
}

/// Checks that a strftime format only contains known specifiers.
#[must_use]
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[allow(clippy::cast_precision_loss)]
fn to_days(instant: DateTime<FixedOffset>) -> f64 {
    instant.timestamp_micros() as f64 / MICROS_PER_DAY
}

#[allow(clippy::cast_possible_truncation)]
fn from_days(days: f64) -> Option<DateTime<chrono::Utc>> {
    DateTime::from_timestamp_micros((days * MICROS_PER_DAY).round() as i64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_precision(magnitude: f64) -> u32 {
    let digits = magnitude.max(1.).log10().floor() as u32 + 1;
    SIGNIFICANT_DIGITS.saturating_sub(digits).max(1)
}

fn truncate(instant: DateTime<FixedOffset>, truncation: Truncation) -> DateTime<FixedOffset> {
    let mut instant = instant;
    if truncation.ignore_time {
        instant = instant
            .with_hour(0)
            .and_then(|i| i.with_minute(0))
            .unwrap_or(instant);
    }
    if truncation.ignore_time || truncation.ignore_seconds {
        instant = instant
            .with_second(0)
            .and_then(|i| i.with_nanosecond(0))
            .unwrap_or(instant);
    }
    instant
}
