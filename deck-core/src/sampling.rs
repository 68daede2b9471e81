//! Uniform sampling without replacement.
//!
//! Card draws are not security-sensitive, so the thread-local PRNG from
//! `rand` is the default source.

use rand::seq::SliceRandom;
use rand::Rng;

/// Draw `k` distinct elements of `pool` uniformly at random.
///
/// `k` must not exceed `pool.len()`; callers clamp. A larger `k` yields the
/// whole pool shuffled.
pub fn sample<T>(pool: Vec<T>, k: usize) -> Vec<T> {
    sample_with(pool, k, &mut rand::thread_rng())
}

/// [`sample`] with a caller-supplied generator.
pub fn sample_with<T, R>(mut pool: Vec<T>, k: usize, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let len = pool.len();
    if k == 0 {
        return Vec::new();
    }
    if k >= len {
        pool.shuffle(rng);
        return pool;
    }

    // Partial Fisher–Yates: only the first k slots get settled, O(k).
    for i in 0..k {
        let j = rng.gen_range(i..len);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}
