use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seeds past this value are replaced with a fresh time-derived seed when
/// incremented.
pub const SEED_CEILING: u64 = 1 << 31;

/// Returns the caller's seed or derives one from the wall clock.
#[must_use]
pub fn resolve(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let seed = entropy(now_nanos());
        log::debug!("Derived seed {seed} from the wall clock.");
        seed
    })
}

/// Produces the next seed in a reproducible sequence of distinct seeds.
#[must_use]
pub fn increment(seed: u64) -> u64 {
    let next = seed.saturating_add(1);
    if next > SEED_CEILING {
        let reseeded = entropy(seed.wrapping_sub(1));
        log::debug!("Seed {next} passed the ceiling, reseeded to {reseeded}.");
        reseeded
    } else {
        next
    }
}

#[must_use]
pub fn rng(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn entropy(state: u64) -> u64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1., |d| d.as_secs_f64());
    (secs * rng(state).random::<f64>()) as u64
}

#[allow(clippy::cast_possible_truncation)]
fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
