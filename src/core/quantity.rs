use log::trace;
use rand::Rng;

use crate::core::number::round_to;

/// Interprets a requested quantity as the fraction of values to keep.
///
/// Values in `(1, 100]` are percentages. Anything outside `[0, 100]` keeps
/// everything.
#[must_use]
pub fn normalize(quantity: f64) -> f64 {
    if !(0. ..=100.).contains(&quantity) {
        1.
    } else if quantity > 1. {
        round_to(quantity / 100., 2)
    } else {
        quantity
    }
}

/// Blanks out `round(len * (1 - quantity))` positions chosen uniformly
/// without replacement.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn apply_quantity<T, R: Rng + ?Sized>(values: &mut [Option<T>], quantity: f64, rng: &mut R) {
    let quantity = normalize(quantity);
    if quantity >= 1. || values.is_empty() {
        return;
    }

    let missing = ((values.len() as f64 * (1. - quantity)).round() as usize).min(values.len());
    trace!("Blanking {missing} of {} values", values.len());
    for i in rand::seq::index::sample(rng, values.len(), missing) {
        values[i] = None;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::utils::seed::rng;

    #[rstest]
    #[case(1., 1.)]
    #[case(0.3, 0.3)]
    #[case(0., 0.)]
    #[case(80., 0.8)]
    #[case(33.333, 0.33)]
    #[case(100., 1.)]
    #[case(-0.5, 1.)]
    #[case(101., 1.)]
    #[case(f64::NAN, 1.)]
    fn quantities_are_normalized(#[case] quantity: f64, #[case] expected: f64) {
        assert_eq!(normalize(quantity), expected);
    }

    #[rstest]
    #[case(10, 0.7, 3)]
    #[case(10, 0.75, 3)]
    #[case(7, 0., 7)]
    #[case(7, 1., 0)]
    #[case(200, 98., 4)]
    fn exact_number_of_positions_are_blanked(
        #[case] len: usize,
        #[case] quantity: f64,
        #[case] missing: usize,
    ) {
        for seed in 0..10 {
            let mut values = vec![Some(1); len];
            apply_quantity(&mut values, quantity, &mut rng(seed));
            assert_eq!(values.iter().filter(|v| v.is_none()).count(), missing);
        }
    }

    #[test]
    fn same_seed_same_positions() {
        let mut a = (0..50).map(Some).collect::<Vec<_>>();
        let mut b = a.clone();
        apply_quantity(&mut a, 0.5, &mut rng(3));
        apply_quantity(&mut b, 0.5, &mut rng(3));
        assert_eq!(a, b);
    }
}
