use std::{fmt, str::FromStr};

use error_stack::{Report, Result};
use log::debug;
use rand::{
    Rng,
    distr::{Bernoulli, Uniform},
};
use rand_distr::{
    Beta, Binomial, Cauchy, ChiSquared, Distribution, Exp, Gamma, Geometric, Gumbel, LogNormal,
    Normal, Pareto, Poisson, StudentT, Triangular, Weibull,
};

use crate::{
    core::{
        number::{DEFAULT_PRECISION, Number, round_to},
        truncated::TruncatedNormal,
    },
    generator::Error,
};

fn invalid(context: impl fmt::Display) -> impl FnOnce(String) -> Report<Error> {
    move |e| Report::new(Error::InvalidParameter).attach_printable(format!("{context}: {e}"))
}

fn positive(size: usize) -> Result<(), Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }
    Ok(())
}

fn rounded(values: impl Iterator<Item = f64>, precision: Option<u32>) -> Vec<f64> {
    let precision = precision.unwrap_or(DEFAULT_PRECISION);
    values.map(|v| round_to(v, precision)).collect()
}

/// `size` Gaussian draws.
pub fn normal<R: Rng + ?Sized>(
    mean: f64,
    std_dev: f64,
    precision: Option<u32>,
    size: usize,
    rng: &mut R,
) -> Result<Vec<f64>, Error> {
    positive(size)?;
    let dist = Normal::new(mean, std_dev)
        .map_err(|e| e.to_string())
        .map_err(invalid(format!("N({mean}, {std_dev})")))?;
    Ok(rounded((0..size).map(|_| dist.sample(rng)), precision))
}

/// `size` Gaussian draws restricted to `[lower, upper]`.
pub fn bounded_normal<R: Rng + ?Sized>(
    mean: f64,
    std_dev: f64,
    lower: f64,
    upper: f64,
    precision: Option<u32>,
    size: usize,
    rng: &mut R,
) -> Result<Vec<f64>, Error> {
    positive(size)?;
    let dist = TruncatedNormal::new(mean, std_dev, lower, upper)?;
    Ok(rounded((0..size).map(|_| dist.sample(rng)), precision))
}

/// `size` independent 0/1 trials.
pub fn bernoulli<R: Rng + ?Sized>(
    probability: f64,
    size: usize,
    rng: &mut R,
) -> Result<Vec<i64>, Error> {
    positive(size)?;
    let dist = Bernoulli::new(probability)
        .map_err(|e| e.to_string())
        .map_err(invalid(format!("Bernoulli({probability})")))?;
    Ok((0..size).map(|_| i64::from(dist.sample(rng))).collect())
}

/// Flags `number` distinct positions with 1, the rest with 0.
///
/// A float in `[0, 1]` is a fraction of `size`. Counts outside `[0, size)`
/// flag everything.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn choice<R: Rng + ?Sized>(number: Number, size: usize, rng: &mut R) -> Vec<i64> {
    let count = match number {
        Number::Float(f) if (0. ..=1.).contains(&f) => (f * size as f64) as i64,
        Number::Float(f) => f as i64,
        Number::Int(i) => i,
    };
    let count = usize::try_from(count).ok().filter(|&c| c < size).unwrap_or(size);
    debug!("Choosing {count} of {size} positions");

    let mut flags = vec![0; size];
    for i in rand::seq::index::sample(rng, size, count) {
        flags[i] = 1;
    }
    flags
}

/// Which naming convention a distribution name follows.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Family {
    /// Random generator method names, e.g. `normal`, `exponential`.
    #[default]
    Generator,
    /// Statistics library names with `loc`/`scale` keywords, e.g. `norm`,
    /// `expon`.
    Stats,
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "generator" => Ok(Self::Generator),
            "stats" => Ok(Self::Stats),
            _ => Err(Error::InvalidParameter),
        }
    }
}

enum Sampler {
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Uniform(Uniform<f64>),
    Beta(Beta<f64>),
    Gamma(Gamma<f64>),
    Exp(Exp<f64>),
    Poisson(Poisson<f64>),
    Binomial(Binomial),
    ChiSquared(ChiSquared<f64>),
    StudentT(StudentT<f64>),
    Weibull(Weibull<f64>),
    Pareto(Pareto<f64>),
    Triangular(Triangular<f64>),
    Cauchy(Cauchy<f64>),
    Geometric(Geometric),
    Gumbel(Gumbel<f64>),
    Bernoulli(Bernoulli),
    TruncatedNormal(TruncatedNormal),
}

impl Sampler {
    #[allow(clippy::cast_precision_loss)]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Normal(d) => d.sample(rng),
            Self::LogNormal(d) => d.sample(rng),
            Self::Uniform(d) => d.sample(rng),
            Self::Beta(d) => d.sample(rng),
            Self::Gamma(d) => d.sample(rng),
            Self::Exp(d) => d.sample(rng),
            Self::Poisson(d) => d.sample(rng),
            Self::Binomial(d) => d.sample(rng) as f64,
            Self::ChiSquared(d) => d.sample(rng),
            Self::StudentT(d) => d.sample(rng),
            Self::Weibull(d) => d.sample(rng),
            Self::Pareto(d) => d.sample(rng),
            Self::Triangular(d) => d.sample(rng),
            Self::Cauchy(d) => d.sample(rng),
            Self::Geometric(d) => d.sample(rng) as f64,
            Self::Gumbel(d) => d.sample(rng),
            Self::Bernoulli(d) => f64::from(u8::from(d.sample(rng))),
            Self::TruncatedNormal(d) => d.sample(rng),
        }
    }
}

/// A sampler followed by `x * scale + loc`.
struct Affine {
    sampler: Sampler,
    loc: f64,
    scale: f64,
}

/// Keyword values looked up by name, falling back to the entry's defaults.
struct Params<'a> {
    given: &'a [(String, f64)],
    defaults: &'static [(&'static str, Option<f64>)],
}

impl Params<'_> {
    fn get(&self, key: &str) -> std::result::Result<f64, String> {
        self.given
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|&(_, v)| v)
            .or_else(|| {
                self.defaults
                    .iter()
                    .find(|(k, _)| *k == key)
                    .and_then(|&(_, v)| v)
            })
            .ok_or_else(|| format!("missing required parameter {key:?}"))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn count(&self, key: &str) -> std::result::Result<u64, String> {
        let v = self.get(key)?;
        if v >= 0. && v.fract() == 0. {
            Ok(v as u64)
        } else {
            Err(format!("{key} must be a non-negative integer, got {v}"))
        }
    }
}

type Build = fn(&Params<'_>) -> std::result::Result<Affine, String>;

struct Entry {
    family: Family,
    name: &'static str,
    params: &'static [(&'static str, Option<f64>)],
    build: Build,
}

fn plain(sampler: Sampler) -> Affine {
    Affine {
        sampler,
        loc: 0.,
        scale: 1.,
    }
}

fn located(params: &Params<'_>, sampler: Sampler) -> std::result::Result<Affine, String> {
    Ok(Affine {
        sampler,
        loc: params.get("loc")?,
        scale: params.get("scale").unwrap_or(1.),
    })
}

fn text(e: impl fmt::Display) -> String {
    e.to_string()
}

const LOC: (&str, Option<f64>) = ("loc", Some(0.));
const SCALE: (&str, Option<f64>) = ("scale", Some(1.));

const REGISTRY: &[Entry] = &[
    Entry {
        family: Family::Generator,
        name: "normal",
        params: &[LOC, SCALE],
        build: |p| {
            Normal::new(p.get("loc")?, p.get("scale")?)
                .map(|d| plain(Sampler::Normal(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "lognormal",
        params: &[("mean", Some(0.)), ("sigma", Some(1.))],
        build: |p| {
            LogNormal::new(p.get("mean")?, p.get("sigma")?)
                .map(|d| plain(Sampler::LogNormal(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "uniform",
        params: &[("low", Some(0.)), ("high", Some(1.))],
        build: |p| {
            Uniform::new(p.get("low")?, p.get("high")?)
                .map(|d| plain(Sampler::Uniform(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "beta",
        params: &[("a", None), ("b", None)],
        build: |p| {
            Beta::new(p.get("a")?, p.get("b")?)
                .map(|d| plain(Sampler::Beta(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "gamma",
        params: &[("shape", None), SCALE],
        build: |p| {
            Gamma::new(p.get("shape")?, p.get("scale")?)
                .map(|d| plain(Sampler::Gamma(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "exponential",
        params: &[SCALE],
        build: |p| {
            Exp::new(1. / p.get("scale")?)
                .map(|d| plain(Sampler::Exp(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "poisson",
        params: &[("lam", Some(1.))],
        build: |p| {
            Poisson::new(p.get("lam")?)
                .map(|d| plain(Sampler::Poisson(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "binomial",
        params: &[("n", None), ("p", None)],
        build: |p| {
            Binomial::new(p.count("n")?, p.get("p")?)
                .map(|d| plain(Sampler::Binomial(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "chisquare",
        params: &[("df", None)],
        build: |p| {
            ChiSquared::new(p.get("df")?)
                .map(|d| plain(Sampler::ChiSquared(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "standard_t",
        params: &[("df", None)],
        build: |p| {
            StudentT::new(p.get("df")?)
                .map(|d| plain(Sampler::StudentT(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "weibull",
        params: &[("a", None)],
        build: |p| {
            Weibull::new(1., p.get("a")?)
                .map(|d| plain(Sampler::Weibull(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        // Lomax, i.e. a classical Pareto shifted to start at zero
        name: "pareto",
        params: &[("a", None)],
        build: |p| {
            Pareto::new(1., p.get("a")?)
                .map(|d| Affine {
                    sampler: Sampler::Pareto(d),
                    loc: -1.,
                    scale: 1.,
                })
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "triangular",
        params: &[("left", None), ("mode", None), ("right", None)],
        build: |p| {
            Triangular::new(p.get("left")?, p.get("right")?, p.get("mode")?)
                .map(|d| plain(Sampler::Triangular(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "standard_cauchy",
        params: &[],
        build: |_| {
            Cauchy::new(0., 1.)
                .map(|d| plain(Sampler::Cauchy(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        // Counts trials rather than failures
        name: "geometric",
        params: &[("p", None)],
        build: |p| {
            Geometric::new(p.get("p")?)
                .map(|d| Affine {
                    sampler: Sampler::Geometric(d),
                    loc: 1.,
                    scale: 1.,
                })
                .map_err(text)
        },
    },
    Entry {
        family: Family::Generator,
        name: "gumbel",
        params: &[LOC, SCALE],
        build: |p| {
            Gumbel::new(p.get("loc")?, p.get("scale")?)
                .map(|d| plain(Sampler::Gumbel(d)))
                .map_err(text)
        },
    },
    Entry {
        family: Family::Stats,
        name: "norm",
        params: &[LOC, SCALE],
        build: |p| located(p, Sampler::Normal(Normal::new(0., 1.).map_err(text)?)),
    },
    Entry {
        family: Family::Stats,
        name: "expon",
        params: &[LOC, SCALE],
        build: |p| located(p, Sampler::Exp(Exp::new(1.).map_err(text)?)),
    },
    Entry {
        family: Family::Stats,
        name: "uniform",
        params: &[LOC, SCALE],
        build: |p| located(p, Sampler::Uniform(Uniform::new(0., 1.).map_err(text)?)),
    },
    Entry {
        family: Family::Stats,
        name: "beta",
        params: &[("a", None), ("b", None), LOC, SCALE],
        build: |p| {
            let d = Beta::new(p.get("a")?, p.get("b")?).map_err(text)?;
            located(p, Sampler::Beta(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "gamma",
        params: &[("a", None), LOC, SCALE],
        build: |p| {
            let d = Gamma::new(p.get("a")?, 1.).map_err(text)?;
            located(p, Sampler::Gamma(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "lognorm",
        params: &[("s", None), LOC, SCALE],
        build: |p| {
            let d = LogNormal::new(0., p.get("s")?).map_err(text)?;
            located(p, Sampler::LogNormal(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "poisson",
        params: &[("mu", None), LOC],
        build: |p| {
            let d = Poisson::new(p.get("mu")?).map_err(text)?;
            located(p, Sampler::Poisson(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "binom",
        params: &[("n", None), ("p", None), LOC],
        build: |p| {
            let d = Binomial::new(p.count("n")?, p.get("p")?).map_err(text)?;
            located(p, Sampler::Binomial(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "bernoulli",
        params: &[("p", None), LOC],
        build: |p| {
            let d = Bernoulli::new(p.get("p")?).map_err(text)?;
            located(p, Sampler::Bernoulli(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "t",
        params: &[("df", None), LOC, SCALE],
        build: |p| {
            let d = StudentT::new(p.get("df")?).map_err(text)?;
            located(p, Sampler::StudentT(d))
        },
    },
    Entry {
        family: Family::Stats,
        name: "truncnorm",
        params: &[("a", None), ("b", None), LOC, SCALE],
        build: |p| {
            let d = TruncatedNormal::new(0., 1., p.get("a")?, p.get("b")?)
                .map_err(|e| format!("{e:?}"))?;
            located(p, Sampler::TruncatedNormal(d))
        },
    },
];

/// Names available in `family`.
pub fn names(family: Family) -> impl Iterator<Item = &'static str> {
    REGISTRY
        .iter()
        .filter(move |e| e.family == family)
        .map(|e| e.name)
}

/// Draws `size` values from the distribution registered as `name`.
///
/// Unknown names and keywords the distribution does not take are rejected.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
pub fn named<R: Rng + ?Sized>(
    family: Family,
    name: &str,
    params: &[(String, f64)],
    precision: Option<u32>,
    size: usize,
    rng: &mut R,
) -> Result<Vec<f64>, Error> {
    positive(size)?;
    let Some(entry) = REGISTRY
        .iter()
        .find(|e| e.family == family && e.name == name)
    else {
        return Err(Report::new(Error::InvalidParameter).attach_printable(format!(
            "Unknown {family:?} distribution {name:?}, expected one of {:?}",
            names(family).collect::<Vec<_>>()
        )));
    };
    if let Some((key, _)) = params
        .iter()
        .find(|(key, _)| !entry.params.iter().any(|(k, _)| *k == key.as_str()))
    {
        return Err(Report::new(Error::InvalidParameter)
            .attach_printable(format!("{name} does not take a {key:?} parameter")));
    }

    let affine = (entry.build)(&Params {
        given: params,
        defaults: entry.params,
    })
    .map_err(invalid(name))?;
    debug!("Sampling {size} values from {name} with {params:?}");
    Ok(rounded(
        (0..size).map(|_| affine.sampler.sample(rng).mul_add(affine.scale, affine.loc)),
        precision,
    ))
}
