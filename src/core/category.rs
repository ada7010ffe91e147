use error_stack::{Report, Result};
use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{
    core::redistribute::{Alignment, redistribute},
    generator::Error,
};

/// Returns `size` shuffled indices into a selection of `len` categories,
/// each category appearing exactly as often as the redistributor assigns.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
pub fn sample_category_indices<R: Rng + ?Sized>(
    len: usize,
    size: usize,
    relative_freq: Option<&[f64]>,
    rng: &mut R,
) -> Result<Vec<usize>, Error> {
    if size == 0 {
        return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
    }

    let uniform;
    let freq = match relative_freq {
        Some(freq) => freq,
        None => {
            uniform = vec![1.; len];
            &uniform
        }
    };
    let counts = redistribute(freq, size, Some(len), Alignment::Right, rng)?;
    debug!("Category counts: {counts:?}");

    let mut indices = Vec::with_capacity(size);
    for (i, count) in counts.into_iter().enumerate() {
        indices.extend(std::iter::repeat_n(i, count));
    }
    indices.shuffle(rng);
    Ok(indices)
}

/// Draws `size` values from `selection`. An empty selection yields `size`
/// missing values.
pub fn sample_category<T: Clone, R: Rng + ?Sized>(
    selection: &[T],
    size: usize,
    relative_freq: Option<&[f64]>,
    rng: &mut R,
) -> Result<Vec<Option<T>>, Error> {
    if selection.is_empty() {
        if size == 0 {
            return Err(Report::new(Error::InvalidSize).attach_printable("size must be positive"));
        }
        return Ok(vec![None; size]);
    }

    Ok(
        sample_category_indices(selection.len(), size, relative_freq, rng)?
            .into_iter()
            .map(|i| Some(selection[i].clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;
    use crate::utils::seed::rng;

    fn tally<'a>(values: &[Option<&'a str>]) -> HashMap<&'a str, usize> {
        let mut counts = HashMap::new();
        for v in values.iter().flatten() {
            *counts.entry(*v).or_insert(0) += 1;
        }
        counts
    }

    #[rstest]
    fn output_only_contains_selection(
        #[values(1, 3, 50, 1_000)] size: usize,
        #[values(None, Some(vec![1., 2., 3.]), Some(vec![5.]), Some(vec![1., 1., 1., 1., 1.]))]
        freq: Option<Vec<f64>>,
    ) {
        let selection = ["a", "b", "c"];
        for seed in 0..10 {
            let values =
                sample_category(&selection, size, freq.as_deref(), &mut rng(seed)).unwrap();

            assert_eq!(values.len(), size);
            assert!(values.iter().all(|v| v.is_some_and(|v| selection.contains(&v))));
        }
    }

    #[test]
    fn every_weighted_category_shows_up() {
        let values = sample_category(&["a", "b", "c"], 300, None, &mut rng(11)).unwrap();
        let counts = tally(&values);
        assert_eq!(counts.len(), 3, "{counts:?}");
    }

    #[test]
    fn short_weights_pad_with_last() {
        let values = sample_category(&["a", "b", "c"], 300, Some(&[0., 1.]), &mut rng(4)).unwrap();
        let counts = tally(&values);
        assert!(!counts.contains_key("a"), "{counts:?}");
        assert!(counts.contains_key("b") && counts.contains_key("c"), "{counts:?}");
    }

    #[test]
    fn long_weights_drop_the_tail() {
        let values =
            sample_category(&["a", "b"], 100, Some(&[1., 0., 1_000.]), &mut rng(4)).unwrap();
        let counts = tally(&values);
        assert_eq!(counts.get("b"), None, "{counts:?}");
        assert_eq!(counts.get("a"), Some(&100));
    }

    #[test]
    fn empty_selection_is_all_missing() {
        let values = sample_category::<&str, _>(&[], 4, None, &mut rng(0)).unwrap();
        assert_eq!(values, vec![None; 4]);
    }

    #[test]
    fn same_seed_same_categories() {
        let a = sample_category_indices(4, 64, Some(&[1., 2.]), &mut rng(8)).unwrap();
        let b = sample_category_indices(4, 64, Some(&[1., 2.]), &mut rng(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_size_is_rejected() {
        let e = sample_category(&[1, 2], 0, None, &mut rng(0)).unwrap_err();
        assert!(matches!(e.current_context(), Error::InvalidSize));
    }
}
