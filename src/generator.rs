use bon::Builder;
use chrono::{DateTime, FixedOffset, Utc};
use error_stack::{Report, Result};
use log::debug;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use crate::{
    column::{Canonical, CanonicalResolver, Column, Connectors, Table},
    core::{
        Choices, Correlation, DateBound, DateOrder, DateOutput, Family, Interval, Number, Order,
        Shape, Transform, Truncation, bernoulli, bounded_normal, choice, correlate_number,
        default_choices, named, normal, render, resolve_bounds, sample_category, sample_datetime,
        sample_intervals, sample_number, sample_pattern, sample_reference,
    },
    utils::{Value, seed},
};

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The sample size must be a positive integer.")]
    InvalidSize,
    #[error("The range is empty.")]
    InvalidRange,
    #[error("The relative frequency pattern is malformed.")]
    InvalidWeighting,
    #[error("Too few distinct values to respect the repeat limit.")]
    InsufficientSamples,
    #[error("An interval is malformed.")]
    InvalidInterval,
    #[error("A required range bound is missing.")]
    MissingBound,
    #[error("The input is of an unsupported type.")]
    UnrecognizedInput,
    #[error("A parameter is invalid.")]
    InvalidParameter,
    #[error("An environment variable could not be read.")]
    Environment,
}

fn seeded(seed: Option<u64>) -> Xoshiro256PlusPlus {
    let seed = seed::resolve(seed);
    debug!("Sampling with seed {seed}.");
    seed::rng(seed)
}

fn to_number(value: &Value, param: &'static str) -> Result<Number, Error> {
    match value.clone().resolve()? {
        Value::Int(i) => Ok(Number::Int(i)),
        Value::Float(f) => Ok(Number::Float(f)),
        text @ Value::Text(_) => Err(Report::new(Error::InvalidParameter)
            .attach_printable(format!("{param} must be numeric, got {text:?}"))),
    }
}

fn to_f64(value: Option<&Value>, param: &'static str) -> Result<Option<f64>, Error> {
    value.map(|v| v.clone().number(param)).transpose()
}

/// A lone bound is the exclusive end of a range starting at zero.
fn number_range(
    start: Option<&Value>,
    stop: Option<&Value>,
) -> Result<(Number, Number), Error> {
    let start = start.map(|v| to_number(v, "start")).transpose()?;
    let stop = stop.map(|v| to_number(v, "stop")).transpose()?;
    match (start, stop) {
        (Some(start), Some(stop)) => Ok((start, stop)),
        (Some(end), None) | (None, Some(end)) => Ok((Number::Int(0), end)),
        (None, None) => Err(Report::new(Error::MissingBound)
            .attach_printable("At least one of start or stop is required")),
    }
}

fn probability(value: &Value) -> Result<f64, Error> {
    let p = value.clone().number("probability")?;
    if (0. ..=1.).contains(&p) {
        Ok(p)
    } else {
        Err(Report::new(Error::InvalidParameter)
            .attach_printable(format!("probability must be in [0, 1], got {p}")))
    }
}

/// Numbers drawn from `[start, stop)`.
#[derive(Debug, Clone, Builder)]
pub struct NumberSampler {
    #[builder(into)]
    start: Option<Value>,
    #[builder(into)]
    stop: Option<Value>,
    relative_freq: Option<Vec<f64>>,
    precision: Option<u32>,
    ordered: Option<Order>,
    #[builder(default)]
    at_most: usize,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl NumberSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let (start, stop) = number_range(self.start.as_ref(), self.stop.as_ref())?;
        let shape = Shape {
            relative_freq: self.relative_freq.as_deref(),
            precision: self.precision,
            ordered: self.ordered,
            at_most: self.at_most,
        };
        let numbers = sample_number(start, stop, &shape, self.size, &mut rng)?;
        Ok(Column::from(numbers).with_quantity(self.quantity, &mut rng))
    }
}

/// Labels drawn from a fixed selection.
#[derive(Debug, Clone, Builder)]
pub struct CategorySampler {
    selection: Vec<String>,
    relative_freq: Option<Vec<f64>>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl CategorySampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let values = sample_category(
            &self.selection,
            self.size,
            self.relative_freq.as_deref(),
            &mut rng,
        )?;
        Ok(Column::Str(values).with_quantity(self.quantity, &mut rng))
    }
}

/// Booleans that are `true` with the given probability.
#[derive(Debug, Clone, Builder)]
pub struct BooleanSampler {
    #[builder(into, default = Value::Float(0.5))]
    probability: Value,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl BooleanSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let p = probability(&self.probability)?;
        let values = sample_category(&[true, false], self.size, Some(&[p, 1. - p]), &mut rng)?;
        Ok(Column::Bool(values).with_quantity(self.quantity, &mut rng))
    }
}

/// Instants drawn from `[start, until)`.
#[derive(Debug, Clone, Builder)]
pub struct DateTimeSampler {
    #[builder(into)]
    start: Option<DateBound>,
    #[builder(into)]
    until: Option<DateBound>,
    relative_freq: Option<Vec<f64>>,
    #[builder(default)]
    at_most: usize,
    ordered: Option<Order>,
    #[builder(default)]
    output: DateOutput,
    #[builder(default)]
    ignore_time: bool,
    #[builder(default)]
    ignore_seconds: bool,
    #[builder(default)]
    day_first: bool,
    #[builder(default)]
    year_first: bool,
    /// The reference for day offsets, the current time when absent.
    now: Option<DateTime<FixedOffset>>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl DateTimeSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let now = self.now.unwrap_or_else(|| Utc::now().fixed_offset());
        let (start, until) = resolve_bounds(
            self.start.as_ref(),
            self.until.as_ref(),
            now,
            DateOrder {
                day_first: self.day_first,
                year_first: self.year_first,
            },
        )?;

        let shape = Shape {
            relative_freq: self.relative_freq.as_deref(),
            precision: None,
            ordered: self.ordered,
            at_most: self.at_most,
        };
        let truncation = Truncation {
            ignore_time: self.ignore_time,
            ignore_seconds: self.ignore_seconds,
        };
        let instants = sample_datetime(start, until, &shape, truncation, self.size, &mut rng)?;
        let column = Column::from(render(instants, &self.output)?);
        Ok(column.with_quantity(self.quantity, &mut rng))
    }
}

/// Numbers drawn from within weighted intervals.
#[derive(Debug, Clone, Builder)]
pub struct IntervalSampler {
    intervals: Vec<Interval>,
    relative_freq: Option<Vec<f64>>,
    precision: Option<u32>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl IntervalSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let numbers = sample_intervals(
            &self.intervals,
            self.relative_freq.as_deref(),
            self.precision,
            self.size,
            &mut rng,
        )?;
        Ok(Column::from(numbers).with_quantity(self.quantity, &mut rng))
    }
}

#[derive(Debug, Clone, Builder)]
pub struct NormalSampler {
    #[builder(default = 0.)]
    mean: f64,
    #[builder(default = 1.)]
    std_dev: f64,
    precision: Option<u32>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl NormalSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let values = normal(self.mean, self.std_dev, self.precision, self.size, &mut rng)?;
        Ok(Column::from(values).with_quantity(self.quantity, &mut rng))
    }
}

#[derive(Debug, Clone, Builder)]
pub struct BoundedNormalSampler {
    #[builder(default = 0.)]
    mean: f64,
    #[builder(default = 1.)]
    std_dev: f64,
    lower: f64,
    upper: f64,
    precision: Option<u32>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl BoundedNormalSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let values = bounded_normal(
            self.mean,
            self.std_dev,
            self.lower,
            self.upper,
            self.precision,
            self.size,
            &mut rng,
        )?;
        Ok(Column::from(values).with_quantity(self.quantity, &mut rng))
    }
}

#[derive(Debug, Clone, Builder)]
pub struct BernoulliSampler {
    #[builder(into, default = Value::Float(0.5))]
    probability: Value,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl BernoulliSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let values = bernoulli(probability(&self.probability)?, self.size, &mut rng)?;
        Ok(Column::from(values).with_quantity(self.quantity, &mut rng))
    }
}

/// Flags a count or fraction of the rows with 1.
#[derive(Debug, Clone, Builder)]
pub struct ChoiceSampler {
    #[builder(into)]
    number: Value,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl ChoiceSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        if self.size == 0 {
            return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
        }
        let mut rng = seeded(self.seed);
        let values = choice(to_number(&self.number, "number")?, self.size, &mut rng);
        Ok(Column::from(values).with_quantity(self.quantity, &mut rng))
    }
}

/// Values drawn from a distribution looked up by name.
#[derive(Debug, Clone, Builder)]
pub struct DistributionSampler {
    #[builder(into)]
    name: String,
    #[builder(default)]
    family: Family,
    #[builder(default)]
    params: Vec<(String, Value)>,
    precision: Option<u32>,
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl DistributionSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let params = self
            .params
            .iter()
            .map(|(key, value)| {
                let value = value.clone().number("distribution parameter")?;
                Ok::<_, Report<Error>>((key.clone(), value))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let values = named(
            self.family,
            &self.name,
            &params,
            self.precision,
            self.size,
            &mut rng,
        )?;
        Ok(Column::from(values).with_quantity(self.quantity, &mut rng))
    }
}

/// Strings built from a character pattern.
#[derive(Debug, Clone, Builder)]
pub struct StringPatternSampler {
    #[builder(into)]
    pattern: String,
    /// Replaces the default choices entirely.
    choices: Option<Choices>,
    #[builder(default)]
    as_binary: bool,
    #[builder(default)]
    choice_only: bool,
    #[builder(default = 1)]
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl StringPatternSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let defaults;
        let choices = match &self.choices {
            Some(choices) => choices,
            None => {
                defaults = default_choices();
                &defaults
            }
        };
        let values = sample_pattern(&self.pattern, choices, self.choice_only, self.size, &mut rng)?;
        let column = if self.as_binary {
            Column::Binary(values.into_iter().map(|s| Some(s.into_bytes())).collect())
        } else {
            Column::Str(values.into_iter().map(Some).collect())
        };
        Ok(column.with_quantity(self.quantity, &mut rng))
    }
}

/// Values taken from a built-in reference list, see
/// [`sample_lists`](crate::sample_lists).
#[derive(Debug, Clone, Builder)]
pub struct SampleSampler {
    #[builder(into)]
    name: String,
    /// Restricts the reference to its first entries.
    sample_size: Option<usize>,
    #[builder(default = true)]
    shuffle: bool,
    #[builder(default = 1)]
    size: usize,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl SampleSampler {
    pub fn sample(&self) -> Result<Column, Error> {
        let mut rng = seeded(self.seed);
        let values = sample_reference(
            &self.name,
            self.sample_size,
            self.shuffle,
            self.size,
            &mut rng,
        )?;
        let column = Column::Str(values.into_iter().map(Some).collect());
        Ok(column.with_quantity(self.quantity, &mut rng))
    }
}

/// Perturbs a numeric column of a reference table.
#[derive(Debug, Clone, Builder)]
pub struct NumberCorrelator {
    #[builder(into)]
    canonical: Canonical,
    #[builder(into)]
    header: String,
    #[builder(into)]
    choice: Option<Value>,
    /// Column whose values fill the rows `choice` leaves out.
    #[builder(into)]
    choice_header: Option<String>,
    #[builder(into)]
    jitter: Option<Value>,
    #[builder(into)]
    offset: Option<Value>,
    transform: Option<Transform>,
    lower: Option<f64>,
    upper: Option<f64>,
    precision: Option<u32>,
    #[builder(default)]
    keep_zero: bool,
    #[builder(default = 1.)]
    quantity: f64,
    seed: Option<u64>,
}

impl NumberCorrelator {
    /// Correlates against an in-memory table.
    pub fn sample(&self) -> Result<Column, Error> {
        self.sample_with(&Connectors::new())
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn sample_with(&self, resolver: &dyn CanonicalResolver) -> Result<Column, Error> {
        let table = self.canonical.clone().load(resolver)?;
        let column = numeric_column(&table, &self.header)?;
        let fallback = self
            .choice_header
            .as_deref()
            .map(|header| numeric_column(&table, header))
            .transpose()?;

        let mut rng = seeded(self.seed);
        let correlation = Correlation {
            choice: self
                .choice
                .as_ref()
                .map(|v| to_number(v, "choice"))
                .transpose()?,
            fallback: fallback.as_deref(),
            jitter: to_f64(self.jitter.as_ref(), "jitter")?,
            transform: self.transform.as_ref(),
            offset: to_f64(self.offset.as_ref(), "offset")?,
            lower: self.lower,
            upper: self.upper,
            precision: self.precision,
            keep_zero: self.keep_zero,
        };
        let values = correlate_number(&column, &correlation, &mut rng)?;
        let column = if self.precision == Some(0) {
            Column::Int(values.into_iter().map(|v| v.map(|v| v as i64)).collect())
        } else {
            Column::Float(values)
        };
        Ok(column.with_quantity(self.quantity, &mut rng))
    }
}

fn numeric_column(table: &Table, header: &str) -> Result<Vec<Option<f64>>, Error> {
    let column = table.column(header).ok_or_else(|| {
        Report::new(Error::InvalidParameter)
            .attach_printable(format!("The table has no column {header:?}"))
    })?;
    column.to_f64().ok_or_else(|| {
        Report::new(Error::UnrecognizedInput).attach_printable(format!(
            "Column {header:?} holds {} values, not numbers",
            column.kind()
        ))
    })
}
