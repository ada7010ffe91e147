use std::{
    convert::Infallible,
    io,
    io::{BufWriter, Write},
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};
use clap_num::si_number;
use clap_verbosity_flag::Verbosity;
use error_stack::ResultExt;
use log::info;
use synthcol::{
    Closed, DateBound, DateOutput, Family, Interval, Order, Value,
    column::{Column, Table},
    generator::{
        BernoulliSampler, BooleanSampler, BoundedNormalSampler, CategorySampler, ChoiceSampler,
        DateTimeSampler, DistributionSampler, IntervalSampler, NormalSampler, NumberSampler,
        SampleSampler, StringPatternSampler,
    },
    model::{NoiseModel, SyntheticTypesModel},
    sample_lists,
};
use thiserror::Error;
use thousands::Separable;

/// Sample synthetic columns from weighted and parametric distributions
#[derive(Parser, Debug)]
#[command(version, author, about)]
#[command(infer_subcommands = true, infer_long_args = true)]
#[command(arg_required_else_help = true)]
#[cfg_attr(test, command(help_expected = true))]
struct Synthcol {
    #[command(flatten)]
    verbose: Verbosity,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Numbers from a range, optionally weighted across equal-width bins
    ///
    /// Integer bounds give integers. With only one bound the range starts at
    /// zero.
    Number(Number),
    /// Labels from a fixed selection
    Category(Category),
    /// Booleans that are true with some probability
    Boolean(Boolean),
    /// Dates and times between two bounds
    ///
    /// Bounds are dates such as `2023-01-31` or RFC 3339 timestamps, or a
    /// whole number of days from now.
    #[command(alias = "date")]
    Datetime(Datetime),
    /// Numbers from within weighted intervals
    Intervals(Intervals),
    /// Gaussian draws
    Normal(Normal),
    /// Gaussian draws restricted to a range
    BoundedNormal(BoundedNormal),
    /// Independent 0/1 trials
    Bernoulli(Bernoulli),
    /// Flags a count or fraction of the rows with 1 and the rest with 0
    Choice(Choice),
    /// Draws from a distribution looked up by name
    Distribution(Distribution),
    /// Strings built from a character pattern
    ///
    /// `c` is a letter, `d` a digit, `l` a lowercase letter, `U` an
    /// uppercase letter, `p` punctuation and `s` a space. Other characters
    /// are copied as is.
    Pattern(Pattern),
    /// Values from a built-in reference list
    ///
    /// Without a name the available lists are printed.
    Sample(Sample),
    /// A CSV table of beta-distributed noise columns
    Noise(Noise),
    /// A CSV table with one column per supported type
    Types(Types),
}

#[derive(Args, Debug)]
struct Sampling {
    /// The number of values to generate
    ///
    /// SI suffixes are accepted, e.g. `10k`.
    #[arg(short = 'n', long, default_value = "10", value_parser = size_parser)]
    size: usize,

    /// The fraction of values to keep, the rest are null
    ///
    /// Values in (1, 100] are read as percentages.
    #[arg(long, default_value_t = 1.)]
    quantity: f64,

    /// Seed the generator for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct Number {
    /// The inclusive start of the range, may be a `${VAR}` reference
    #[arg(long, value_parser = value, allow_hyphen_values = true)]
    start: Option<Value>,

    /// The exclusive end of the range, may be a `${VAR}` reference
    #[arg(long, value_parser = value, allow_hyphen_values = true)]
    stop: Option<Value>,

    /// Relative weights across equal-width bins of the range
    #[arg(short, long, value_delimiter = ',')]
    weights: Vec<f64>,

    /// Decimal places for float output, 0 forces integers
    #[arg(short, long)]
    precision: Option<u32>,

    /// Sort the output, `asc` or `des`
    #[arg(short, long)]
    ordered: Option<Order>,

    /// The most times a single value may repeat per bin
    #[arg(long, default_value_t = 0)]
    at_most: usize,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Category {
    /// The labels to choose from
    #[arg(required = true)]
    selection: Vec<String>,

    /// Relative weights for each label
    #[arg(short, long, value_delimiter = ',')]
    weights: Vec<f64>,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Boolean {
    /// The probability of `true`, may be a `${VAR}` reference
    #[arg(short, long, default_value = "0.5", value_parser = value)]
    probability: Value,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Datetime {
    /// The inclusive lower bound
    #[arg(long, value_parser = date_bound, allow_hyphen_values = true)]
    start: DateBound,

    /// The exclusive upper bound
    #[arg(long, value_parser = date_bound, allow_hyphen_values = true)]
    until: DateBound,

    /// Relative weights across equal-width spans of the range
    #[arg(short, long, value_delimiter = ',')]
    weights: Vec<f64>,

    /// Sort the output, `asc` or `des`
    #[arg(short, long)]
    ordered: Option<Order>,

    /// The most times a single instant may repeat per span
    #[arg(long, default_value_t = 0)]
    at_most: usize,

    /// Format the output with a strftime pattern
    #[arg(short, long, conflicts_with = "numeric")]
    format: Option<String>,

    /// Print fractional days since the Unix epoch
    #[arg(long)]
    numeric: bool,

    /// Truncate to the date
    #[arg(long)]
    ignore_time: bool,

    /// Truncate to the minute
    #[arg(long)]
    ignore_seconds: bool,

    /// Read ambiguous dates as day first
    #[arg(long)]
    day_first: bool,

    /// Read ambiguous dates as year first
    #[arg(long)]
    year_first: bool,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Intervals {
    /// An interval as `lower,upper` or `lower,upper,closed`
    ///
    /// `closed` is one of `both`, `right`, `left` or `neither` and defaults
    /// to `right`.
    #[arg(required = true, allow_hyphen_values = true)]
    intervals: Vec<Interval>,

    /// Relative weights for each interval
    #[arg(short, long, value_delimiter = ',')]
    weights: Vec<f64>,

    /// Decimal places, 0 forces integers
    #[arg(short, long)]
    precision: Option<u32>,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Normal {
    /// The mean
    #[arg(short, long, default_value_t = 0., allow_hyphen_values = true)]
    mean: f64,

    /// The standard deviation
    #[arg(long, default_value_t = 1.)]
    std: f64,

    /// Decimal places
    #[arg(short, long)]
    precision: Option<u32>,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct BoundedNormal {
    /// The mean
    #[arg(short, long, default_value_t = 0., allow_hyphen_values = true)]
    mean: f64,

    /// The standard deviation
    #[arg(long, default_value_t = 1.)]
    std: f64,

    /// The smallest value allowed
    #[arg(long, allow_hyphen_values = true)]
    lower: f64,

    /// The largest value allowed
    #[arg(long, allow_hyphen_values = true)]
    upper: f64,

    /// Decimal places
    #[arg(short, long)]
    precision: Option<u32>,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Bernoulli {
    /// The probability of a 1, may be a `${VAR}` reference
    #[arg(short, long, default_value = "0.5", value_parser = value)]
    probability: Value,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Choice {
    /// A count, or a fraction of the rows when in [0, 1]
    #[arg(value_parser = value)]
    number: Value,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Distribution {
    /// The distribution name, e.g. `gamma` or `norm` with `--stats`
    name: String,

    /// A distribution parameter as `key=value`
    #[arg(long = "param", value_parser = param)]
    params: Vec<(String, Value)>,

    /// Use statistics-library names such as `norm` and `expon`
    #[arg(long)]
    stats: bool,

    /// Decimal places
    #[arg(short, long)]
    precision: Option<u32>,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Pattern {
    /// The pattern, e.g. `UUdd-l`
    pattern: String,

    /// Print raw bytes instead of text
    #[arg(long)]
    binary: bool,

    /// Drop pattern characters that have no choices
    #[arg(long)]
    choice_only: bool,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Sample {
    /// The reference list, e.g. `us_states`
    name: Option<String>,

    /// Only use this many entries from the start of the list
    #[arg(long)]
    sample_size: Option<usize>,

    /// Keep the list order instead of shuffling it
    #[arg(long)]
    no_shuffle: bool,

    #[command(flatten)]
    sampling: Sampling,
}

#[derive(Args, Debug)]
struct Noise {
    /// The number of rows
    #[arg(short = 'n', long, default_value = "10", value_parser = size_parser)]
    size: usize,

    /// The number of columns
    #[arg(short, long, default_value_t = 5)]
    columns: usize,

    /// Seed the generator for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct Types {
    /// The number of rows
    #[arg(short = 'n', long, default_value = "10", value_parser = size_parser)]
    size: usize,

    /// Add `*_null` columns with missing values
    #[arg(long)]
    nulls: bool,

    /// The fraction of missing values in the `*_null` columns
    #[arg(long, default_value_t = 0.02)]
    p_nulls: f64,

    /// Seed the generator for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,
}

fn size_parser(s: &str) -> Result<usize, String> {
    si_number(s)
}

fn value(s: &str) -> Result<Value, Infallible> {
    s.parse()
}

fn date_bound(s: &str) -> Result<DateBound, Infallible> {
    Ok(s.parse::<i64>()
        .map_or_else(|_| DateBound::Text(s.to_string()), DateBound::DaysFromNow))
}

fn param(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `key=value`, got {s:?}"))?;
    let value = value.parse::<Value>().unwrap_or_else(|e| match e {});
    Ok((key.trim().to_string(), value))
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Wrapper(String),
}

fn main() -> ExitCode {
    #[cfg(not(debug_assertions))]
    error_stack::Report::install_debug_hook::<std::panic::Location>(|_, _| {});

    let args = Synthcol::parse();

    #[cfg(feature = "trace")]
    {
        use tracing_subscriber::layer::SubscriberExt;

        if let Err(e) = tracing_log::LogTracer::init() {
            drop(writeln!(io::stderr(), "Failed to forward logs: {e}"));
        }
        if let Err(e) = tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default()),
        ) {
            drop(writeln!(io::stderr(), "Failed to install the tracing subscriber: {e}"));
        }
    }
    #[cfg(not(feature = "trace"))]
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match synthcol(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            drop(writeln!(io::stderr(), "Error: {e:?}"));
            e.downcast_ref::<ExitCode>()
                .copied()
                .unwrap_or(ExitCode::FAILURE)
        }
    }
}

fn synthcol(Synthcol { verbose: _, cmd }: Synthcol) -> error_stack::Result<(), CliError> {
    let mut stdout = BufWriter::new(io::stdout().lock());
    let written = match run(cmd) {
        Output::Column(column) => {
            let column = column
                .change_context(CliError::Wrapper("Sampling failed".into()))
                .attach(ExitCode::from(sysexits::ExitCode::DataErr))?;
            info!("Generated {} values.", column.len().separate_with_commas());
            write_column(&column, &mut stdout)
        }
        Output::Table(table) => {
            let table = table
                .change_context(CliError::Wrapper("Building the table failed".into()))
                .attach(ExitCode::from(sysexits::ExitCode::DataErr))?;
            info!(
                "Generated {} rows across {} columns.",
                table.num_rows().separate_with_commas(),
                table.num_columns()
            );
            table.write_csv(&mut stdout)
        }
        Output::Lists(names) => names
            .into_iter()
            .try_for_each(|name| writeln!(stdout, "{name}")),
    };
    written
        .and_then(|()| stdout.flush())
        .change_context(CliError::Wrapper("Failed to write the output".into()))
        .attach(ExitCode::from(sysexits::ExitCode::IoErr))
}

enum Output {
    Column(error_stack::Result<Column, synthcol::generator::Error>),
    Table(error_stack::Result<Table, synthcol::generator::Error>),
    Lists(Vec<&'static str>),
}

fn weights(weights: Vec<f64>) -> Option<Vec<f64>> {
    Some(weights).filter(|w| !w.is_empty())
}

fn run(cmd: Cmd) -> Output {
    match cmd {
        Cmd::Number(Number {
            start,
            stop,
            weights: w,
            precision,
            ordered,
            at_most,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            NumberSampler::builder()
                .maybe_start(start)
                .maybe_stop(stop)
                .maybe_relative_freq(weights(w))
                .maybe_precision(precision)
                .maybe_ordered(ordered)
                .at_most(at_most)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Category(Category {
            selection,
            weights: w,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            CategorySampler::builder()
                .selection(selection)
                .maybe_relative_freq(weights(w))
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Boolean(Boolean {
            probability,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            BooleanSampler::builder()
                .probability(probability)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Datetime(Datetime {
            start,
            until,
            weights: w,
            ordered,
            at_most,
            format,
            numeric,
            ignore_time,
            ignore_seconds,
            day_first,
            year_first,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            DateTimeSampler::builder()
                .start(start)
                .until(until)
                .maybe_relative_freq(weights(w))
                .maybe_ordered(ordered)
                .at_most(at_most)
                .output(match format {
                    Some(format) => DateOutput::Format(format),
                    None if numeric => DateOutput::Numeric,
                    None => DateOutput::Instants,
                })
                .ignore_time(ignore_time)
                .ignore_seconds(ignore_seconds)
                .day_first(day_first)
                .year_first(year_first)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Intervals(Intervals {
            intervals,
            weights: w,
            precision,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            IntervalSampler::builder()
                .intervals(intervals)
                .maybe_relative_freq(weights(w))
                .maybe_precision(precision)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Normal(Normal {
            mean,
            std,
            precision,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            NormalSampler::builder()
                .mean(mean)
                .std_dev(std)
                .maybe_precision(precision)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::BoundedNormal(BoundedNormal {
            mean,
            std,
            lower,
            upper,
            precision,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            BoundedNormalSampler::builder()
                .mean(mean)
                .std_dev(std)
                .lower(lower)
                .upper(upper)
                .maybe_precision(precision)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Bernoulli(Bernoulli {
            probability,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            BernoulliSampler::builder()
                .probability(probability)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Choice(Choice {
            number,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            ChoiceSampler::builder()
                .number(number)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Distribution(Distribution {
            name,
            params,
            stats,
            precision,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            DistributionSampler::builder()
                .name(name)
                .family(if stats { Family::Stats } else { Family::Generator })
                .params(params)
                .maybe_precision(precision)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Pattern(Pattern {
            pattern,
            binary,
            choice_only,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            StringPatternSampler::builder()
                .pattern(pattern)
                .as_binary(binary)
                .choice_only(choice_only)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Sample(Sample { name: None, .. }) => Output::Lists(sample_lists().collect()),
        Cmd::Sample(Sample {
            name: Some(name),
            sample_size,
            no_shuffle,
            sampling: Sampling {
                size,
                quantity,
                seed,
            },
        }) => Output::Column(
            SampleSampler::builder()
                .name(name)
                .maybe_sample_size(sample_size)
                .shuffle(!no_shuffle)
                .size(size)
                .quantity(quantity)
                .maybe_seed(seed)
                .build()
                .sample(),
        ),
        Cmd::Noise(Noise {
            size,
            columns,
            seed,
        }) => Output::Table(
            NoiseModel::builder()
                .size(size)
                .num_columns(columns)
                .maybe_seed(seed)
                .build()
                .build_table(),
        ),
        Cmd::Types(Types {
            size,
            nulls,
            p_nulls,
            seed,
        }) => Output::Table(
            SyntheticTypesModel::builder()
                .size(size)
                .inc_nulls(nulls)
                .p_nulls(p_nulls)
                .maybe_seed(seed)
                .build()
                .build_table(),
        ),
    }
}

fn write_column(column: &Column, out: &mut impl Write) -> io::Result<()> {
    for i in 0..column.len() {
        match column.cell(i) {
            Some(cell) => writeln!(out, "{cell}")?,
            None => writeln!(out, "null")?,
        }
    }
    Ok(())
}
