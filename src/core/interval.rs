use std::{fmt, str::FromStr};

use error_stack::{Report, Result};
use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{
    core::{
        category::sample_category_indices,
        number::{DEFAULT_PRECISION, Number, Numbers, Shape, sample_number},
    },
    generator::Error,
};

/// Which ends of an interval are included.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Closed {
    Both,
    #[default]
    Right,
    Left,
    Neither,
}

impl FromStr for Closed {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(Self::Both),
            "right" => Ok(Self::Right),
            "left" => Ok(Self::Left),
            "neither" => Ok(Self::Neither),
            _ => Err(Error::InvalidInterval),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub closed: Closed,
}

impl Interval {
    #[must_use]
    pub const fn new(lower: f64, upper: f64, closed: Closed) -> Self {
        Self {
            lower,
            upper,
            closed,
        }
    }

    /// The half-open range `[lo, hi)` that honors this interval's closedness
    /// at a resolution of `margin`.
    fn sampling_bounds(&self, margin: f64) -> (f64, f64) {
        let (lo, hi) = match self.closed {
            Closed::Both => (self.lower, self.upper + margin),
            Closed::Right => (self.lower + margin, self.upper + margin),
            Closed::Left => (self.lower, self.upper),
            Closed::Neither => (self.lower + margin, self.upper),
        };
        if lo >= hi { (lo, lo + margin) } else { (lo, hi) }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper {
            Ok(())
        } else {
            Err(Report::new(Error::InvalidInterval)
                .attach_printable(format!("{self} must have finite bounds in order")))
        }
    }
}

impl From<(f64, f64)> for Interval {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self::new(lower, upper, Closed::default())
    }
}

impl From<(f64, f64, Closed)> for Interval {
    fn from((lower, upper, closed): (f64, f64, Closed)) -> Self {
        Self::new(lower, upper, closed)
    }
}

/// Parses `lower,upper` or `lower,upper,closed`.
impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s.split(',').map(str::trim).collect::<Vec<_>>();
        let bound = |p: &str| p.parse::<f64>().map_err(|_| Error::InvalidInterval);
        match parts[..] {
            [lower, upper] => Ok(Self::new(bound(lower)?, bound(upper)?, Closed::default())),
            [lower, upper, closed] => Ok(Self::new(bound(lower)?, bound(upper)?, closed.parse()?)),
            _ => Err(Error::InvalidInterval),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.closed {
            Closed::Both => ('[', ']'),
            Closed::Right => ('(', ']'),
            Closed::Left => ('[', ')'),
            Closed::Neither => ('(', ')'),
        };
        write!(f, "{open}{}, {}{close}", self.lower, self.upper)
    }
}

/// Picks an interval per row, weighted by `relative_freq`, then draws a value
/// inside it.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
#[allow(clippy::cast_possible_truncation)]
pub fn sample_intervals<R: Rng + ?Sized>(
    intervals: &[Interval],
    relative_freq: Option<&[f64]>,
    precision: Option<u32>,
    size: usize,
    rng: &mut R,
) -> Result<Numbers, Error> {
    if intervals.is_empty() {
        return Err(Report::new(Error::InvalidInterval).attach_printable("No intervals given"));
    }
    for interval in intervals {
        interval.validate()?;
    }

    let precision = precision.unwrap_or(DEFAULT_PRECISION);
    let margin = if precision == 0 {
        1.
    } else {
        10f64.powi(-i32::try_from(precision).unwrap_or(i32::MAX))
    };

    let mut counts = vec![0; intervals.len()];
    for i in sample_category_indices(intervals.len(), size, relative_freq, rng)? {
        counts[i] += 1;
    }
    debug!("Interval counts: {counts:?}");

    let shape = Shape {
        precision: Some(precision),
        ..Shape::default()
    };
    let mut values = Vec::with_capacity(size);
    for (interval, &count) in intervals.iter().zip(&counts) {
        if count == 0 {
            continue;
        }
        if interval.lower == interval.upper {
            values.extend(std::iter::repeat_n(interval.lower, count));
            continue;
        }

        let (lo, hi) = interval.sampling_bounds(margin);
        values.extend(
            sample_number(Number::Float(lo), Number::Float(hi), &shape, count, rng)?.into_f64(),
        );
    }
    values.shuffle(rng);

    Ok(if precision == 0 {
        Numbers::Int(values.into_iter().map(|v| v.round() as i64).collect())
    } else {
        Numbers::Float(values)
    })
}
