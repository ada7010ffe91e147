use std::{fmt, sync::Arc};

use error_stack::{Report, Result};
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{
    core::{
        expr::Expr,
        number::{DEFAULT_PRECISION, Number, round_to},
    },
    generator::Error,
};

/// A per-value rewrite applied to the selected rows.
#[derive(Clone)]
pub enum Transform {
    Expr(Expr),
    Function(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl Transform {
    pub fn function(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    fn apply(&self, x: f64) -> f64 {
        match self {
            Self::Expr(expr) => expr.eval(x),
            Self::Function(f) => f(x),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(expr) => f.debug_tuple("Expr").field(&expr.to_string()).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<Expr> for Transform {
    fn from(value: Expr) -> Self {
        Self::Expr(value)
    }
}

/// How to perturb a numeric column.
#[derive(Debug, Clone, Default)]
pub struct Correlation<'a> {
    /// Count or fraction of rows to change. All rows when absent.
    pub choice: Option<Number>,
    /// Fallback values for the rows not chosen.
    pub fallback: Option<&'a [Option<f64>]>,
    /// Standard deviation of the zero-mean noise added to each chosen row.
    pub jitter: Option<f64>,
    pub transform: Option<&'a Transform>,
    pub offset: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub precision: Option<u32>,
    pub keep_zero: bool,
}

/// Rewrites a subset of `column` with jitter, then a transform, then an
/// offset, and clamps the whole column to the bounds.
///
/// Missing and NaN values stay missing. With `keep_zero`, zeros stay zero.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(column, rng)))]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn correlate_number<R: Rng + ?Sized>(
    column: &[Option<f64>],
    correlation: &Correlation<'_>,
    rng: &mut R,
) -> Result<Vec<Option<f64>>, Error> {
    let size = column.len();
    let lower = correlation.lower.unwrap_or(f64::NEG_INFINITY);
    let upper = correlation.upper.unwrap_or(f64::INFINITY);
    if lower.is_nan() || upper.is_nan() || lower > upper {
        return Err(Report::new(Error::InvalidRange)
            .attach_printable(format!("Bounds [{lower}, {upper}] are empty")));
    }
    if let Some(fallback) = correlation.fallback
        && fallback.len() != size
    {
        return Err(Report::new(Error::InvalidParameter).attach_printable(format!(
            "The fallback column has {} rows but {size} are needed",
            fallback.len()
        )));
    }
    let noise = correlation
        .jitter
        .filter(|&jitter| jitter != 0.)
        .map(|jitter| {
            Normal::new(0., jitter).map_err(|e| {
                Report::new(Error::InvalidParameter)
                    .attach_printable(format!("Bad jitter {jitter}: {e}"))
            })
        })
        .transpose()?;

    let chosen = match correlation.choice {
        Some(number) => {
            let count = match number {
                Number::Float(f) if (0. ..=1.).contains(&f) => (f * size as f64) as i64,
                Number::Float(f) => f as i64,
                Number::Int(i) => i,
            };
            let count = usize::try_from(count)
                .ok()
                .filter(|&c| c < size)
                .unwrap_or(size);
            let mut chosen = vec![false; size];
            for i in rand::seq::index::sample(rng, size, count) {
                chosen[i] = true;
            }
            chosen
        }
        None => vec![true; size],
    };
    debug!(
        "Correlating {} of {size} rows",
        chosen.iter().filter(|&&c| c).count()
    );

    let precision = correlation.precision.unwrap_or(DEFAULT_PRECISION);
    let mut out = Vec::with_capacity(size);
    for (i, value) in column.iter().enumerate() {
        let original = value.filter(|v| !v.is_nan());
        let Some(original) = original else {
            out.push(None);
            continue;
        };
        if correlation.keep_zero && original == 0. {
            out.push(Some(0.));
            continue;
        }

        let v = if chosen[i] {
            let mut v = original;
            if let Some(noise) = &noise {
                v += noise.sample(rng);
            }
            if let Some(transform) = correlation.transform {
                v = transform.apply(v);
            }
            v + correlation.offset.unwrap_or(0.)
        } else {
            match correlation.fallback {
                Some(fallback) => fallback[i].unwrap_or(f64::NAN),
                None => original,
            }
        };

        let v = round_to(v.clamp(lower, upper), precision);
        out.push(Some(v).filter(|v| !v.is_nan()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_ge, assert_le};

    use super::*;
    use crate::utils::seed::rng;

    fn column() -> Vec<Option<f64>> {
        vec![
            Some(1.),
            None,
            Some(0.),
            Some(5.5),
            Some(f64::NAN),
            Some(-3.),
            Some(10.),
            Some(0.),
        ]
    }

    #[test]
    fn nulls_stay_null() {
        let correlation = Correlation {
            jitter: Some(2.),
            offset: Some(1.),
            ..Correlation::default()
        };
        let out = correlate_number(&column(), &correlation, &mut rng(1)).unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(out[1], None);
        assert_eq!(out[4], None);
        assert!(out.iter().enumerate().all(|(i, v)| v.is_some() || i == 1 || i == 4));
    }

    #[test]
    fn zeros_stay_zero_when_asked() {
        let correlation = Correlation {
            offset: Some(4.),
            keep_zero: true,
            ..Correlation::default()
        };
        let out = correlate_number(&column(), &correlation, &mut rng(1)).unwrap();
        assert_eq!(out[2], Some(0.));
        assert_eq!(out[7], Some(0.));
        assert_eq!(out[0], Some(5.));
    }

    #[test]
    fn bounds_clamp_everything() {
        let correlation = Correlation {
            jitter: Some(50.),
            lower: Some(-1.),
            upper: Some(2.),
            ..Correlation::default()
        };
        let out = correlate_number(&column(), &correlation, &mut rng(2)).unwrap();
        for v in out.into_iter().flatten() {
            assert_ge!(v, -1.);
            assert_le!(v, 2.);
        }
    }

    #[test]
    fn transform_then_offset() {
        let transform = Transform::Expr(Expr::parse("lambda v: v * 2").unwrap());
        let correlation = Correlation {
            transform: Some(&transform),
            offset: Some(1.),
            precision: Some(0),
            ..Correlation::default()
        };
        let out = correlate_number(&[Some(1.), Some(2.5), None], &correlation, &mut rng(0)).unwrap();
        assert_eq!(out, vec![Some(3.), Some(6.), None]);
    }

    #[test]
    fn function_transforms_work() {
        let transform = Transform::function(f64::sqrt);
        let correlation = Correlation {
            transform: Some(&transform),
            ..Correlation::default()
        };
        let out = correlate_number(&[Some(9.), Some(-1.)], &correlation, &mut rng(0)).unwrap();
        assert_eq!(out, vec![Some(3.), None]);
    }

    #[test]
    fn choice_limits_changed_rows() {
        let input = vec![Some(1.); 100];
        let correlation = Correlation {
            choice: Some(Number::Float(0.3)),
            offset: Some(1.),
            ..Correlation::default()
        };
        let out = correlate_number(&input, &correlation, &mut rng(4)).unwrap();
        assert_eq!(out.iter().filter(|v| **v == Some(2.)).count(), 30);
        assert_eq!(out.iter().filter(|v| **v == Some(1.)).count(), 70);
    }

    #[test]
    fn fallback_fills_unchosen_rows() {
        let input = vec![Some(1.); 10];
        let fallback = vec![Some(-7.); 10];
        let correlation = Correlation {
            choice: Some(Number::Int(4)),
            fallback: Some(&fallback),
            offset: Some(1.),
            ..Correlation::default()
        };
        let out = correlate_number(&input, &correlation, &mut rng(4)).unwrap();
        assert_eq!(out.iter().filter(|v| **v == Some(2.)).count(), 4);
        assert_eq!(out.iter().filter(|v| **v == Some(-7.)).count(), 6);
    }

    #[test]
    fn same_seed_same_result() {
        let correlation = Correlation {
            choice: Some(Number::Int(3)),
            jitter: Some(1.),
            ..Correlation::default()
        };
        let a = correlate_number(&column(), &correlation, &mut rng(6)).unwrap();
        let b = correlate_number(&column(), &correlation, &mut rng(6)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_settings_are_rejected() {
        let e = correlate_number(
            &column(),
            &Correlation {
                lower: Some(2.),
                upper: Some(1.),
                ..Correlation::default()
            },
            &mut rng(0),
        )
        .unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidRange));

        let e = correlate_number(
            &column(),
            &Correlation {
                jitter: Some(-1.),
                ..Correlation::default()
            },
            &mut rng(0),
        )
        .unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));

        let short = [Some(1.)];
        let e = correlate_number(
            &column(),
            &Correlation {
                fallback: Some(&short),
                ..Correlation::default()
            },
            &mut rng(0),
        )
        .unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));
    }
}
