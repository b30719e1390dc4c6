//! Pruning envelope containment test.
//!
//! A candidate stem is replayed segment by segment without emitting any
//! geometry, using the same [`StemWalk`] rules as the real builder, and every
//! position past the bare trunk base is checked against the revolved
//! envelope profile. The replay draws from the shared [`GenerationContext`],
//! so callers always run it under [`GenerationContext::speculate`].
//!
//! Only the undivided continuation is followed after a split: clones split
//! off at that point are not tested against the envelope.

use crate::config::{ParameterSet, ShapeKind};
use crate::context::GenerationContext;
use crate::shape::{TreeScale, shape_ratio};
use crate::stem::Stem;
use crate::turtle::Turtle;
use crate::walk::{Helix, StemWalk, follow_helix};
use glam::Vec3;

/// Length multiplier applied after every failed containment test.
pub const SHRINK_FACTOR: f32 = 0.9;

/// A stem shrunk below this fraction of its original length is given up on.
pub const MIN_LENGTH_FRACTION: f32 = 0.15;

/// Result of fitting a stem into the envelope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PruneOutcome {
    /// The stem fits at this length.
    Fitted(f32),
    /// Nothing fits; partial pruning keeps the stem at zero fitting length.
    Collapsed,
    /// Nothing fits and pruning is total; the stem is dropped.
    Discarded,
}

/// Outcome of [`PruningEnvelope::shrink_to_fit`] plus the number of
/// containment tests it ran.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shrink {
    pub outcome: PruneOutcome,
    pub tests: u32,
}

/// Start state of the stem being tested, as the builder would grow it.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub stem: Stem,
    pub parent: Option<&'a Stem>,
    pub turtle: Turtle,
    pub start: u32,
    pub split_corr_angle: f32,
    pub clone_prob: f32,
    pub num_branches_factor: f32,
}

pub struct PruningEnvelope<'a> {
    params: &'a ParameterSet,
    scale: TreeScale,
}

impl<'a> PruningEnvelope<'a> {
    pub fn new(params: &'a ParameterSet, scale: TreeScale) -> Self {
        Self { params, scale }
    }

    /// True if `point` lies strictly inside the revolved envelope profile.
    pub fn point_inside(&self, point: Vec3) -> bool {
        let tree_scale = self.scale.tree_scale;
        if tree_scale <= 0.0 {
            return false;
        }
        let dist = (point.x * point.x + point.y * point.y).sqrt();
        let ratio = (tree_scale - point.z) / (tree_scale * (1.0 - self.params.base_size[0]));
        dist / tree_scale < self.params.prune_width * shape_ratio(self.params, ShapeKind::Envelope, ratio)
    }

    /// Replays `candidate` and reports whether its whole trajectory,
    /// including the final point, stays inside the envelope.
    ///
    /// Consumes exactly the draws the builder would for the same stem.
    pub fn test_stem(&self, candidate: &Candidate<'_>, ctx: &mut GenerationContext) -> bool {
        let params = self.params;
        let stem = &candidate.stem;
        let mut turtle = candidate.turtle;
        let mut split_corr_angle = candidate.split_corr_angle;
        let mut clone_prob = candidate.clone_prob;

        let walk = StemWalk::new(params, stem);
        walk.child_target(
            params,
            &self.scale,
            stem,
            candidate.parent,
            candidate.start,
            candidate.num_branches_factor,
            ctx,
        );
        walk.start_rotation(params, ctx);

        if walk.helix {
            let helix = Helix::new(params, &walk, stem.length, &mut turtle, ctx);
            let origin = turtle.pos;
            let mut prev = origin;
            for seg_ind in candidate.start..=walk.curve_res {
                let point = helix.point(seg_ind, origin, prev);
                follow_helix(&mut turtle, &point);
                prev = point.co;
                if seg_ind > candidate.start
                    && !walk.in_trunk_base(seg_ind)
                    && !self.point_inside(turtle.pos)
                {
                    return false;
                }
            }
            return self.point_inside(turtle.pos);
        }

        for seg_ind in candidate.start..=walk.curve_res {
            if seg_ind != candidate.start {
                turtle.move_by(walk.seg_length);
                if !walk.in_trunk_base(seg_ind) && !self.point_inside(turtle.pos) {
                    return false;
                }
            }
            if seg_ind == candidate.start {
                continue;
            }

            let count = walk.split_count(params, seg_ind, &mut clone_prob, ctx);
            if count.splits > 0 {
                let angles = walk.split_angles(params, &turtle, seg_ind, ctx);
                split_corr_angle = angles.correction;
                walk.steer_continuation(&mut turtle, &angles, count.splits);
            } else {
                walk.apply_curve(params, &mut turtle, seg_ind, split_corr_angle, ctx);
            }
            walk.apply_tropism(params, &mut turtle);
        }
        self.point_inside(turtle.pos)
    }

    /// Shrinks the candidate by [`SHRINK_FACTOR`] until it fits.
    ///
    /// Every test runs speculatively, so `ctx` is left exactly as it was
    /// found regardless of how many tests ran.
    ///
    /// The loop is bounded by the shrink fraction alone, so a zero-length
    /// stem is tested at most as often as any other.
    pub fn shrink_to_fit(&self, candidate: &Candidate<'_>, ctx: &mut GenerationContext) -> Shrink {
        let mut trial = *candidate;
        let mut fraction = 1.0;
        let mut tests = 0;

        loop {
            tests += 1;
            if ctx.speculate(|ctx| self.test_stem(&trial, ctx)) {
                return Shrink {
                    outcome: PruneOutcome::Fitted(trial.stem.length),
                    tests,
                };
            }
            trial.stem.length *= SHRINK_FACTOR;
            fraction *= SHRINK_FACTOR;
            if fraction < MIN_LENGTH_FRACTION {
                let outcome = if self.params.prune_ratio < 1.0 {
                    PruneOutcome::Collapsed
                } else {
                    PruneOutcome::Discarded
                };
                return Shrink { outcome, tests };
            }
        }
    }
}
