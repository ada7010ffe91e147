use std::f64::consts::SQRT_2;

use error_stack::{Report, Result};
use rand::Rng;
use rand_distr::Distribution;

use crate::generator::Error;

/// A normal distribution restricted to `[lower, upper]`, sampled by inverting
/// the CDF so no draws are rejected.
#[derive(Debug, Copy, Clone)]
pub struct TruncatedNormal {
    mean: f64,
    std_dev: f64,
    /// Standardized bounds, mirrored into the lower tail when both are
    /// positive.
    a: f64,
    b: f64,
    cdf_a: f64,
    cdf_b: f64,
    mirrored: bool,
}

impl TruncatedNormal {
    pub fn new(mean: f64, std_dev: f64, lower: f64, upper: f64) -> Result<Self, Error> {
        if !(std_dev.is_finite() && std_dev > 0. && mean.is_finite()) {
            return Err(Report::new(Error::InvalidParameter).attach_printable(format!(
                "Need a finite mean and positive std, got N({mean}, {std_dev})"
            )));
        }
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(Report::new(Error::InvalidRange)
                .attach_printable(format!("Bad bounds [{lower}, {upper}]")));
        }

        let (a, b) = ((lower - mean) / std_dev, (upper - mean) / std_dev);
        let mirrored = a > 0.;
        let (a, b) = if mirrored { (-b, -a) } else { (a, b) };
        Ok(Self {
            mean,
            std_dev,
            a,
            b,
            cdf_a: std_normal_cdf(a),
            cdf_b: std_normal_cdf(b),
            mirrored,
        })
    }
}

impl Distribution<f64> for TruncatedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u = rng.random::<f64>();
        let z = if self.cdf_b - self.cdf_a > f64::EPSILON {
            probit(self.cdf_a + u * (self.cdf_b - self.cdf_a))
        } else {
            // Too far in the tail to resolve, the density is flat enough here
            self.a + u * (self.b - self.a)
        };
        let z = z.clamp(self.a, self.b);
        let z = if self.mirrored { -z } else { z };
        z.mul_add(self.std_dev, self.mean)
    }
}

fn std_normal_cdf(x: f64) -> f64 {
    if x == f64::NEG_INFINITY {
        return 0.;
    }
    if x == f64::INFINITY {
        return 1.;
    }
    0.5 * erfc(-x / SQRT_2)
}

/// Complementary error function with a fractional error below 1.2e-7.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1. / 0.5f64.mul_add(z, 1.);
    let poly = [
        -1.265_512_23,
        1.000_023_68,
        0.374_091_96,
        0.096_784_18,
        -0.186_288_06,
        0.278_868_07,
        -1.135_203_98,
        1.488_515_87,
        -0.822_152_23,
        0.170_872_77,
    ]
    .iter()
    .rev()
    .fold(0f64, |acc, c| acc * t + c);
    let r = t * (-z * z + poly).exp();
    if x >= 0. { r } else { 2. - r }
}

/// Inverse of the standard normal CDF with a relative error below 1.2e-9.
fn probit(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const LOW: f64 = 0.024_25;

    if p <= 0. {
        return f64::NEG_INFINITY;
    }
    if p >= 1. {
        return f64::INFINITY;
    }

    let poly = |coefficients: &[f64], x: f64| {
        coefficients.iter().fold(0f64, |acc, c| acc * x + c)
    };
    if p < LOW {
        let q = (-2. * p.ln()).sqrt();
        poly(&C, q) / (poly(&D, q) * q + 1.)
    } else if p <= 1. - LOW {
        let q = p - 0.5;
        let r = q * q;
        poly(&A, r) * q / (poly(&B, r) * r + 1.)
    } else {
        let q = (-2. * (1. - p).ln()).sqrt();
        -poly(&C, q) / (poly(&D, q) * q + 1.)
    }
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_ge, assert_le, assert_lt};
    use rstest::rstest;

    use super::*;
    use crate::utils::seed::rng;

    #[rstest]
    #[case(0., 0.5)]
    #[case(1., 0.841_344_746)]
    #[case(-1.96, 0.024_997_895)]
    #[case(3., 0.998_650_102)]
    fn cdf_matches_tables(#[case] x: f64, #[case] expected: f64) {
        assert_lt!((std_normal_cdf(x) - expected).abs(), 1e-6);
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.01)]
    #[case(0.3)]
    #[case(0.975)]
    #[case(0.999)]
    fn probit_inverts_cdf(#[case] p: f64) {
        assert_lt!((std_normal_cdf(probit(p)) - p).abs(), 1e-6);
    }

    #[rstest]
    #[case(0., 1., -1., 1.)]
    #[case(10., 2., 11., 30.)]
    #[case(0., 1., 8., 9.)]
    #[case(0., 1., -9., -8.)]
    #[case(5., 3., f64::NEG_INFINITY, 5.)]
    fn samples_stay_within_bounds(
        #[case] mean: f64,
        #[case] std_dev: f64,
        #[case] lower: f64,
        #[case] upper: f64,
    ) {
        let dist = TruncatedNormal::new(mean, std_dev, lower, upper).unwrap();
        let mut rng = rng(4);
        for _ in 0..1_000 {
            let x = dist.sample(&mut rng);
            assert_ge!(x, lower);
            assert_le!(x, upper);
        }
    }

    #[test]
    fn symmetric_bounds_center_on_mean() {
        let dist = TruncatedNormal::new(2., 1., 0., 4.).unwrap();
        let mut rng = rng(0);
        let mean = (0..20_000).map(|_| dist.sample(&mut rng)).sum::<f64>() / 20_000.;
        assert_lt!((mean - 2.).abs(), 0.05);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let e = TruncatedNormal::new(0., 0., -1., 1.).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidParameter));

        let e = TruncatedNormal::new(0., 1., 1., -1.).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidRange));
    }
}
