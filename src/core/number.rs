use std::{cmp::Ordering, fmt, ops::Range, str::FromStr};

use error_stack::{Report, Result};
use log::{debug, trace};
use rand::{Rng, seq::SliceRandom};

use crate::{
    core::redistribute::{Alignment, redistribute},
    generator::Error,
};

pub const DEFAULT_PRECISION: u32 = 3;
/// How many candidates per requested value each `at_most` repeat generates.
pub const AT_MOST_OVERSUBSCRIPTION: Range<usize> = 2..4;

/// A range bound whose syntax decides the output domain: the domain is
/// integral iff both bounds are [`Number::Int`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn rounded(self) -> i64 {
        match self {
            Self::Int(i) => i,
            Self::Float(f) => f.round() as i64,
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        s.parse()
            .map(Self::Int)
            .or_else(|_| s.parse().map(Self::Float))
            .map_err(|_| Error::InvalidParameter)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Order {
    Asc,
    Des,
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "des" | "desc" | "descending" => Ok(Self::Des),
            _ => Err(Error::InvalidParameter),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Numbers {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Numbers {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn into_f64(self) -> Vec<f64> {
        match self {
            Self::Int(v) => v.into_iter().map(|i| i as f64).collect(),
            Self::Float(v) => v,
        }
    }
}

/// Optional shaping applied to a numeric draw.
#[derive(Debug, Clone, Default)]
pub struct Shape<'a> {
    /// Weights over equal-width sub-ranges of `[start, stop)`.
    pub relative_freq: Option<&'a [f64]>,
    /// Decimal places for float output. `Some(0)` forces integer output.
    pub precision: Option<u32>,
    pub ordered: Option<Order>,
    /// Maximum number of times a single value may be drawn per sub-range, or
    /// 0 for unlimited.
    pub at_most: usize,
}

/// Draws `size` numbers from `[start, stop)`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
pub fn sample_number<R: Rng + ?Sized>(
    start: Number,
    stop: Number,
    shape: &Shape<'_>,
    size: usize,
    rng: &mut R,
) -> Result<Numbers, Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }

    let (start, stop) = if shape.precision == Some(0) {
        (Number::Int(start.rounded()), Number::Int(stop.rounded()))
    } else {
        (start, stop)
    };
    if stop.as_f64().partial_cmp(&start.as_f64()) != Some(Ordering::Greater) {
        return Err(Report::new(Error::InvalidRange)
            .attach_printable(format!("stop ({stop}) must be greater than start ({start})")));
    }

    let counts = match shape.relative_freq {
        Some(freq) if freq.len() > 1 && freq.iter().sum::<f64>() > 1. => {
            redistribute(freq, size, None, Alignment::Both, rng)?
        }
        _ => vec![size],
    };
    debug!("Sampling {size} numbers from [{start}, {stop}) across {counts:?}");

    match (start, stop) {
        (Number::Int(start), Number::Int(stop)) => {
            let mut values = sample_ints(start, stop, &counts, shape.at_most, rng)?;
            match shape.ordered {
                Some(Order::Asc) => values.sort_unstable(),
                Some(Order::Des) => values.sort_unstable_by(|a, b| b.cmp(a)),
                None => values.shuffle(rng),
            }
            Ok(Numbers::Int(values))
        }
        (start, stop) => {
            let precision = shape.precision.unwrap_or(DEFAULT_PRECISION);
            let mut values = sample_floats(
                start.as_f64(),
                stop.as_f64(),
                precision,
                &counts,
                shape.at_most,
                rng,
            )?;
            match shape.ordered {
                Some(Order::Asc) => values.sort_unstable_by(f64::total_cmp),
                Some(Order::Des) => values.sort_unstable_by(|a, b| b.total_cmp(a)),
                None => values.shuffle(rng),
            }
            Ok(Numbers::Float(values))
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn sample_ints<R: Rng + ?Sized>(
    start: i64,
    stop: i64,
    counts: &[usize],
    at_most: usize,
    rng: &mut R,
) -> Result<Vec<i64>, Error> {
    let width = i128::from(stop) - i128::from(start);
    let bins = counts.len() as i128;
    let edge = |i: usize| (i128::from(start) + width * i as i128 / bins) as i64;

    let mut values = Vec::with_capacity(counts.iter().sum());
    let mut carry = 0;
    for (i, &count) in counts.iter().enumerate() {
        let (low, high) = (edge(i), edge(i + 1));
        let count = count + carry;
        if low >= high {
            trace!("Bin {i} is empty, carrying {count} values forward");
            carry = count;
            continue;
        }
        carry = 0;
        if count == 0 {
            continue;
        }

        if at_most > 0 {
            let pool = pool(at_most, count, rng, |n| {
                let mut grid = (0..n)
                    .map(|j| {
                        (i128::from(low) + (i128::from(high) - i128::from(low)) * j as i128
                            / n as i128) as i64
                    })
                    .collect::<Vec<_>>();
                grid.dedup();
                grid
            });
            values.extend(pick(&pool, count, rng)?);
        } else {
            values.extend((0..count).map(|_| rng.random_range(low..high)));
        }
    }
    Ok(values)
}

#[allow(clippy::cast_precision_loss)]
fn sample_floats<R: Rng + ?Sized>(
    start: f64,
    stop: f64,
    precision: u32,
    counts: &[usize],
    at_most: usize,
    rng: &mut R,
) -> Result<Vec<f64>, Error> {
    let bins = counts.len() as f64;
    let edge = |i: usize| start + (stop - start) * i as f64 / bins;
    let unit = 10f64.powi(-i32::try_from(precision).unwrap_or(i32::MAX));
    let bounded = |v: f64| {
        let v = round_to(v, precision);
        if v >= stop {
            round_to(stop - unit, precision)
        } else {
            v
        }
    };

    let mut values = Vec::with_capacity(counts.iter().sum());
    let mut carry = 0;
    for (i, &count) in counts.iter().enumerate() {
        let (low, high) = (edge(i), edge(i + 1));
        let count = count + carry;
        if low >= high {
            carry = count;
            continue;
        }
        carry = 0;
        if count == 0 {
            continue;
        }

        if at_most > 0 {
            let pool = pool(at_most, count, rng, |n| {
                let mut grid = (0..n)
                    .map(|j| bounded(low + (high - low) * j as f64 / n as f64))
                    .collect::<Vec<_>>();
                grid.dedup();
                grid
            });
            values.extend(pick(&pool, count, rng)?);
        } else {
            values.extend((0..count).map(|_| bounded(low + rng.random::<f64>() * (high - low))));
        }
    }
    Ok(values)
}

/// Builds a candidate pool in which every distinct value appears at most
/// `at_most` times. `grid(n)` must return up to `n` distinct values.
fn pool<T, R: Rng + ?Sized>(
    at_most: usize,
    count: usize,
    rng: &mut R,
    grid: impl Fn(usize) -> Vec<T>,
) -> Vec<T> {
    let mut pool = Vec::new();
    for _ in 0..at_most {
        let oversubscription = rng.random_range(AT_MOST_OVERSUBSCRIPTION);
        pool.extend(grid(count.saturating_mul(oversubscription)));
    }
    trace!("Built a pool of {} candidates for {count} values", pool.len());
    pool
}

fn pick<T: Copy, R: Rng + ?Sized>(pool: &[T], count: usize, rng: &mut R) -> Result<Vec<T>, Error> {
    if pool.len() < count {
        return Err(Report::new(Error::InsufficientSamples).attach_printable(format!(
            "Only {} candidates are available for {count} values",
            pool.len()
        )));
    }
    Ok(rand::seq::index::sample(rng, pool.len(), count)
        .into_iter()
        .map(|i| pool[i])
        .collect())
}

/// Rounds half away from zero to `precision` decimal places, leaving values
/// too large to scale untouched.
#[must_use]
pub fn round_to(x: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    let rounded = (x * scale).round() / scale;
    if rounded.is_finite() { rounded } else { x }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use more_asserts::{assert_ge, assert_le, assert_lt};
    use rstest::rstest;

    use super::*;
    use crate::utils::seed::rng;

    fn ints(numbers: Numbers) -> Vec<i64> {
        match numbers {
            Numbers::Int(v) => v,
            Numbers::Float(v) => panic!("Expected integers, got {v:?}"),
        }
    }

    fn floats(numbers: Numbers) -> Vec<f64> {
        match numbers {
            Numbers::Float(v) => v,
            Numbers::Int(v) => panic!("Expected floats, got {v:?}"),
        }
    }

    #[rstest]
    fn integer_bounds_give_integers_in_range(
        #[values(1, 5, 100, 1_000)] size: usize,
        #[values(None, Some(vec![1., 1.]), Some(vec![1., 5., 1., 0.]))] freq: Option<Vec<f64>>,
    ) {
        let shape = Shape {
            relative_freq: freq.as_deref(),
            ..Shape::default()
        };
        for seed in 0..10 {
            let values =
                ints(sample_number(0.into(), 10.into(), &shape, size, &mut rng(seed)).unwrap());

            assert_eq!(values.len(), size);
            for v in values {
                assert_ge!(v, 0);
                assert_lt!(v, 10);
            }
        }
    }

    #[rstest]
    fn floats_are_rounded_and_below_stop(#[values(0, 1, 3, 6)] precision: u32) {
        let shape = Shape {
            precision: Some(precision),
            ..Shape::default()
        };
        let values = sample_number(
            Number::Float(-1.5),
            Number::Float(2.25),
            &shape,
            2_000,
            &mut rng(7),
        )
        .unwrap()
        .into_f64();

        assert_eq!(values.len(), 2_000);
        for v in values {
            assert_lt!(v, 2.25);
            assert_ge!(v, -2.);
            assert_eq!(round_to(v, precision), v);
        }
    }

    #[test]
    fn zero_precision_rounds_float_bounds() {
        let shape = Shape {
            precision: Some(0),
            ..Shape::default()
        };
        let values = ints(
            sample_number(Number::Float(0.6), Number::Float(3.4), &shape, 100, &mut rng(1))
                .unwrap(),
        );
        assert!(values.iter().all(|v| (1..3).contains(v)));
    }

    #[test]
    fn mixed_bounds_are_floats() {
        let values = floats(
            sample_number(Number::Int(0), Number::Float(1.), &Shape::default(), 10, &mut rng(0))
                .unwrap(),
        );
        assert_eq!(values.len(), 10);
    }

    #[test]
    fn same_seed_same_numbers() {
        let shape = Shape::default();
        let a = sample_number(0.into(), 10.into(), &shape, 5, &mut rng(42)).unwrap();
        let b = sample_number(0.into(), 10.into(), &shape, 5, &mut rng(42)).unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    #[case(Order::Asc)]
    #[case(Order::Des)]
    fn ordering_sorts_everything(#[case] order: Order) {
        let freq = [1., 3., 1.];
        let shape = Shape {
            relative_freq: Some(&freq),
            ordered: Some(order),
            ..Shape::default()
        };

        let values = floats(
            sample_number(Number::Float(0.), Number::Float(1.), &shape, 500, &mut rng(3)).unwrap(),
        );
        for pair in values.windows(2) {
            match order {
                Order::Asc => assert_le!(pair[0], pair[1]),
                Order::Des => assert_ge!(pair[0], pair[1]),
            }
        }

        let values = ints(sample_number(0.into(), 1_000.into(), &shape, 500, &mut rng(3)).unwrap());
        for pair in values.windows(2) {
            match order {
                Order::Asc => assert_le!(pair[0], pair[1]),
                Order::Des => assert_ge!(pair[0], pair[1]),
            }
        }
    }

    #[test]
    fn weights_shift_mass_between_bins() {
        let freq = [0., 0., 1., 1.];
        let shape = Shape {
            relative_freq: Some(&freq),
            ..Shape::default()
        };
        let values = ints(sample_number(0.into(), 100.into(), &shape, 1_000, &mut rng(5)).unwrap());
        assert!(values.iter().all(|&v| v >= 50), "{values:?}");
    }

    #[test]
    fn narrow_integer_bins_carry_their_counts() {
        let freq = [1., 1., 1., 1., 1.];
        let shape = Shape {
            relative_freq: Some(&freq),
            ..Shape::default()
        };
        for seed in 0..20 {
            let values =
                ints(sample_number(0.into(), 2.into(), &shape, 50, &mut rng(seed)).unwrap());
            assert_eq!(values.len(), 50);
            assert!(values.iter().all(|v| (0..2).contains(v)));
        }
    }

    #[test]
    fn at_most_caps_repeats() {
        let shape = Shape {
            at_most: 2,
            ..Shape::default()
        };
        for seed in 0..10 {
            let values =
                ints(sample_number(0.into(), 10.into(), &shape, 20, &mut rng(seed)).unwrap());
            assert_eq!(values.len(), 20);

            let mut seen = HashMap::new();
            for v in values {
                *seen.entry(v).or_insert(0) += 1;
            }
            assert!(seen.values().all(|&n| n <= 2), "{seen:?}");
        }
    }

    #[test]
    fn at_most_float_values_are_distinct() {
        let shape = Shape {
            at_most: 1,
            precision: Some(2),
            ..Shape::default()
        };
        let mut values = floats(
            sample_number(Number::Float(0.), Number::Float(1.), &shape, 50, &mut rng(2)).unwrap(),
        );
        values.sort_unstable_by(f64::total_cmp);
        values.dedup();
        assert_eq!(values.len(), 50);
    }

    #[test]
    fn at_most_with_too_few_values_fails() {
        let shape = Shape {
            at_most: 1,
            ..Shape::default()
        };
        let e = sample_number(0.into(), 10.into(), &shape, 11, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InsufficientSamples));
    }

    #[rstest]
    #[case(Number::Int(5), Number::Int(5))]
    #[case(Number::Int(5), Number::Int(1))]
    #[case(Number::Float(1.), Number::Float(f64::NAN))]
    fn empty_ranges_are_rejected(#[case] start: Number, #[case] stop: Number) {
        let e = sample_number(start, stop, &Shape::default(), 1, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidRange));
    }

    #[test]
    fn zero_size_is_rejected() {
        let e = sample_number(0.into(), 1.into(), &Shape::default(), 0, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidSize));
    }

    #[rstest]
    #[case("3", Number::Int(3))]
    #[case("-3.5", Number::Float(-3.5))]
    #[case(" 1e3 ", Number::Float(1000.))]
    fn numbers_parse_by_syntax(#[case] input: &str, #[case] expected: Number) {
        assert_eq!(input.parse::<Number>().unwrap(), expected);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(2.346, 2), 2.35);
        assert_eq!(round_to(-0.5, 0), -1.);
        assert_eq!(round_to(f64::MAX, 3), f64::MAX);
    }
}
