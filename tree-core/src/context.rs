//! Random stream and rounding-error state for one tree build.
//!
//! [`GenerationContext`] is a plain value: snapshotting it is a clone and
//! restoring it is an assignment, so speculative work (pruning tests) can
//! never leak randomness or dithering state into the real build.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Error-diffused rounding of a fractional per-decision target.
///
/// Each call to [`Dither::take`] returns an integer count and carries the
/// rounding error into the next call, so the running total tracks the sum
/// of the fractional targets to within one unit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dither {
    error: f32,
}

impl Dither {
    /// Integer count for this decision given a fractional `target`.
    pub fn take(&mut self, target: f32) -> i32 {
        let count = (target + self.error) as i32;
        self.error -= count as f32 - target;
        count
    }

    /// Error currently carried into the next decision.
    pub fn error(&self) -> f32 {
        self.error
    }
}

/// Seedable random stream plus one split-count accumulator per depth.
#[derive(Clone, Debug)]
pub struct GenerationContext {
    rng: Pcg64Mcg,
    split_errors: Vec<Dither>,
}

/// Saved copy of a [`GenerationContext`], restored as a unit.
#[derive(Clone, Debug)]
pub struct ContextSnapshot(GenerationContext);

/// Saved position of the random stream alone.
#[derive(Clone, Debug)]
pub struct StreamSnapshot(Pcg64Mcg);

impl GenerationContext {
    /// Creates a context seeded with `seed` and `depths` zeroed split
    /// accumulators.
    pub fn new(seed: u64, depths: usize) -> Self {
        Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            split_errors: vec![Dither::default(); depths.max(1)],
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn random(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform draw in `[lower, upper)`; an empty range returns `lower`.
    pub fn rand_in_range(&mut self, lower: f32, upper: f32) -> f32 {
        lower + self.random() * (upper - lower)
    }

    /// Symmetric draw in `(-1, 1)` used to scale `*_v` variances.
    pub fn rand_for_param_var(&mut self) -> f32 {
        let sign = if self.rng.random::<bool>() { 1.0 } else { -1.0 };
        sign * self.random()
    }

    /// Split-count accumulator for stems at `depth`.
    pub fn split_error(&mut self, depth: usize) -> &mut Dither {
        let last = self.split_errors.len() - 1;
        &mut self.split_errors[depth.min(last)]
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot(self.clone())
    }

    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        *self = snapshot.0;
    }

    pub fn stream_snapshot(&self) -> StreamSnapshot {
        StreamSnapshot(self.rng.clone())
    }

    /// Rewinds the random stream only; split accumulators keep their state.
    pub fn restore_stream(&mut self, snapshot: StreamSnapshot) {
        self.rng = snapshot.0;
    }

    /// Runs `f` and then puts the whole context back the way it was.
    pub fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.snapshot();
        let out = f(self);
        self.restore(saved);
        out
    }
}
