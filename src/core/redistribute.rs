use std::{cmp::Ordering, iter::repeat_n, str::FromStr};

use error_stack::{Report, Result};
use log::{debug, trace};
use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::generator::Error;

/// Which side of a weighting pattern is kept when it has to be stretched or
/// shrunk to a different number of buckets.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Trim from, and pad with the first element on, the left.
    Left,
    /// Trim from, and pad with the last element on, the right.
    Right,
    /// Split trimming and padding between both ends.
    #[default]
    Both,
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" | "center" => Ok(Self::Both),
            _ => Err(Error::InvalidParameter),
        }
    }
}

/// Turns a relative frequency pattern into bucket sizes that sum to exactly
/// `size`.
///
/// The pattern is first fitted to `dist_length` buckets (defaulting to its own
/// length) according to `alignment`, then normalized into probabilities. Each
/// bucket independently draws a binomial count over `size` trials and the
/// drift between the drawn total and `size` is handed back proportionally,
/// with any remaining rounding error settled on the largest buckets.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(rng)))]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn redistribute<R: Rng + ?Sized>(
    relative_freq: &[f64],
    size: usize,
    dist_length: Option<usize>,
    alignment: Alignment,
    rng: &mut R,
) -> Result<Vec<usize>, Error> {
    if relative_freq.is_empty() {
        return Err(
            Report::new(Error::InvalidWeighting).attach_printable("The weighting pattern is empty")
        );
    }
    if let Some(w) = relative_freq.iter().find(|w| !w.is_finite() || **w < 0.) {
        return Err(Report::new(Error::InvalidWeighting)
            .attach_printable(format!("Weights must be finite and non-negative, got {w}")));
    }
    let dist_length = dist_length.unwrap_or(relative_freq.len());
    if dist_length < 1 {
        return Err(Report::new(Error::InvalidWeighting)
            .attach_printable("The distribution must have at least one bucket"));
    }

    let weights = fit_length(relative_freq, dist_length, alignment);
    let total = weights.iter().sum::<f64>();
    if total <= 0. {
        return Err(Report::new(Error::InvalidWeighting)
            .attach_printable("At least one weight must be positive"));
    }
    let probabilities = weights.iter().map(|w| w / total).collect::<Vec<_>>();

    let trials = u64::try_from(size).unwrap_or(u64::MAX);
    let mut counts = Vec::with_capacity(dist_length);
    for &p in &probabilities {
        let binomial = Binomial::new(trials, p.min(1.)).map_err(|e| {
            Report::new(Error::InvalidWeighting).attach_printable(format!("Bad probability {p}: {e}"))
        })?;
        counts.push(i64::try_from(binomial.sample(rng)).unwrap_or(i64::MAX));
    }
    trace!("Binomial draws: {counts:?}");

    let size = i64::try_from(size).unwrap_or(i64::MAX);
    let diff = size - counts.iter().sum::<i64>();
    if diff != 0 {
        for (count, p) in counts.iter_mut().zip(&probabilities) {
            *count += (p * diff as f64).round() as i64;
        }
    }
    settle(&mut counts, size);

    debug!("Redistributed {size} values across {dist_length} buckets: {counts:?}");
    Ok(counts
        .into_iter()
        .map(|c| usize::try_from(c).unwrap_or_default())
        .collect())
}

/// Stretches or shrinks the pattern to exactly `len` elements.
fn fit_length(freq: &[f64], len: usize, alignment: Alignment) -> Vec<f64> {
    match freq.len().cmp(&len) {
        Ordering::Equal => freq.to_vec(),
        Ordering::Greater => {
            let excess = freq.len() - len;
            let head = match alignment {
                Alignment::Right => 0,
                Alignment::Left => excess,
                Alignment::Both => excess / 2,
            };
            freq[head..head + len].to_vec()
        }
        Ordering::Less => {
            let missing = len - freq.len();
            let left = match alignment {
                Alignment::Right => 0,
                Alignment::Left => missing,
                Alignment::Both => missing - missing / 2,
            };
            let (first, last) = (freq[0], freq[freq.len() - 1]);
            repeat_n(first, left)
                .chain(freq.iter().copied())
                .chain(repeat_n(last, missing - left))
                .collect()
        }
    }
}

/// Forces the counts to be non-negative and to sum to `size`.
fn settle(counts: &mut [i64], size: i64) {
    for count in counts.iter_mut() {
        *count = (*count).max(0);
    }

    let mut gap = counts.iter().sum::<i64>() - size;
    if gap < 0 {
        counts[largest(counts)] -= gap;
        return;
    }
    while gap > 0 {
        let i = largest(counts);
        let taken = gap.min(counts[i]);
        counts[i] -= taken;
        gap -= taken;
    }
}

fn largest(counts: &[i64]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}
