//! Deterministic random number generation for expression functions.
//!
//! ## Key Features
//!
//! - **Deterministic**: Same seed produces identical sequence
//! - **Per-call streams**: Each execution derives its own stream from a
//!   context label, so concurrent casts never share RNG state
//!
//! ```
//! use spellcode::core::EffectRng;
//!
//! let base = EffectRng::new(42);
//! let mut a = base.for_context("fireball@10");
//! let mut b = base.for_context("fireball@10");
//!
//! assert_eq!(a.gen_range_inclusive(1, 6), b.gen_range_inclusive(1, 6));
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hash::{Hash, Hasher};

/// Deterministic RNG backing `random()` and `random_int()`.
///
/// Uses ChaCha8 for speed with good statistical quality.
#[derive(Clone, Debug)]
pub struct EffectRng {
    inner: ChaCha8Rng,
    seed: u64,
}

impl EffectRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create an independent stream for a specific context.
    ///
    /// The same context always produces the same stream from the same seed.
    #[must_use]
    pub fn for_context(&self, context: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        context.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Random integer in `[min, max]`. Bounds may be given in either order.
    pub fn gen_range_inclusive(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.inner.gen_range(lo..=hi)
    }

    /// Random float in `[0, 1)`.
    pub fn gen_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }
}
