//! Per-segment growth rules shared by the stem builder and the pruning
//! envelope tester.
//!
//! Both walk a stem segment by segment and must draw from the random stream
//! in exactly the same order, so every decision that consumes randomness
//! lives here and is called identically from both sides.

use crate::bezier::CurvePoint;
use crate::config::ParameterSet;
use crate::context::GenerationContext;
use crate::shape::{TreeScale, calc_branch_count, calc_curve_angle, calc_leaf_count};
use crate::stem::Stem;
use crate::turtle::{Turtle, declination};
use glam::{Quat, Vec3};
use std::f32::consts::PI;

/// Per-stem constants derived once before the segment loop.
#[derive(Clone, Copy, Debug)]
pub struct StemWalk {
    pub depth: usize,
    pub level: usize,
    pub curve_res: u32,
    pub seg_splits: f32,
    pub seg_length: f32,
    pub base_seg_ind: u32,
    pub helix: bool,
}

/// Outcome of the split decision for one segment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SplitCount {
    /// Number of extra stems to clone off at this segment.
    pub splits: u32,
    /// The count came from the dithered per-segment rate (as opposed to a
    /// trunk base split), so branch density must be damped.
    pub dithered: bool,
}

/// How many children a stem carries, before per-segment dithering.
///
/// Negative values request a fan of `|n|` children at the stem tip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChildTarget {
    Leaves(f32),
    Branches(f32),
}

/// Angles used to fan the stems of one split point apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitAngles {
    /// Pitch-down shared between the continuation and its clones.
    pub split: f32,
    /// Spread between the diverging stems.
    pub spread: f32,
    /// Per-segment correction that straightens the stem back up afterwards.
    pub correction: f32,
    /// `split_angle < 0`: spread by turning in the turtle frame instead of
    /// about the world vertical.
    pub direct: bool,
    pub base: bool,
}

impl StemWalk {
    pub fn new(params: &ParameterSet, stem: &Stem) -> Self {
        let level = ParameterSet::level(stem.depth);
        let curve_res = params.curve_res_at(stem.depth);
        Self {
            depth: stem.depth,
            level,
            curve_res,
            seg_splits: params.seg_splits[level],
            seg_length: stem.length / curve_res as f32,
            base_seg_ind: params.base_seg_ind(),
            helix: params.curve_v[level] < 0.0,
        }
    }

    /// Child count for a stem grown from segment `start`, scaled down by the
    /// part of the stem already grown before a clone point and, for
    /// branches, by the damping inherited from earlier splits.
    #[allow(clippy::too_many_arguments)]
    pub fn child_target(
        &self,
        params: &ParameterSet,
        scale: &TreeScale,
        stem: &Stem,
        parent: Option<&Stem>,
        start: u32,
        num_branches_factor: f32,
        ctx: &mut GenerationContext,
    ) -> ChildTarget {
        let remaining = 1.0 - start as f32 / self.curve_res as f32;
        if params.grows_leaves(stem.depth) {
            ChildTarget::Leaves(calc_leaf_count(params, scale, stem, parent) * remaining)
        } else {
            let count = calc_branch_count(params, stem, parent, ctx);
            ChildTarget::Branches(count * remaining * num_branches_factor)
        }
    }

    /// Starting rotation for this stem's children; a ±1 side multiplier when
    /// the child level alternates sides.
    pub fn start_rotation(&self, params: &ParameterSet, ctx: &mut GenerationContext) -> f32 {
        if params.rotate[ParameterSet::child_level(self.depth)] >= 0.0 {
            ctx.rand_in_range(0.0, 360.0)
        } else {
            1.0
        }
    }

    pub fn is_base_split(&self, params: &ParameterSet, seg_ind: u32) -> bool {
        params.base_splits != 0 && self.depth == 0 && seg_ind == self.base_seg_ind
    }

    /// True while `seg_ind` is still inside the bare trunk base.
    pub fn in_trunk_base(&self, seg_ind: u32) -> bool {
        self.depth == 0 && seg_ind <= self.base_seg_ind
    }

    /// Decides how many clones to split off at interior segment `seg_ind`.
    ///
    /// Trunk base splits use the configured count (random up to `|n|` when
    /// negative). Elsewhere the fractional `seg_splits` rate is dithered
    /// through the per-depth accumulator, gated by `clone_prob`, which
    /// shrinks after every decision to suppress cascades.
    pub fn split_count(
        &self,
        params: &ParameterSet,
        seg_ind: u32,
        clone_prob: &mut f32,
        ctx: &mut GenerationContext,
    ) -> SplitCount {
        if self.is_base_split(params, seg_ind) {
            let splits = if params.base_splits < 0 {
                (ctx.random() * (params.base_splits.unsigned_abs() as f32 + 0.5)) as u32
            } else {
                params.base_splits as u32
            };
            return SplitCount {
                splits,
                dithered: false,
            };
        }

        if self.seg_splits > 0.0
            && seg_ind < self.curve_res
            && (self.depth > 0 || seg_ind > self.base_seg_ind)
            && ctx.random() <= *clone_prob
        {
            let splits = ctx.split_error(self.depth).take(self.seg_splits).max(0) as u32;
            *clone_prob /= (splits + 1) as f32;
            return SplitCount {
                splits,
                dithered: true,
            };
        }

        SplitCount::default()
    }

    /// Computes the split geometry for a split at `seg_ind` of a stem whose
    /// turtle currently faces `turtle.dir`.
    pub fn split_angles(
        &self,
        params: &ParameterSet,
        turtle: &Turtle,
        seg_ind: u32,
        ctx: &mut GenerationContext,
    ) -> SplitAngles {
        let split_angle = params.split_angle[self.level];
        let split_angle_v = params.split_angle_v[self.level];
        let base = self.is_base_split(params, seg_ind);

        if split_angle < 0.0 {
            let spread = split_angle.abs() + ctx.rand_for_param_var() * split_angle_v;
            return SplitAngles {
                split: 0.0,
                spread,
                correction: 0.0,
                direct: true,
                base,
            };
        }

        let decl = declination(turtle.dir);
        let split = (split_angle + ctx.rand_for_param_var() * split_angle_v - decl).max(0.0);
        let remaining_segs = (self.curve_res + 1 - seg_ind) as f32;
        let jitter = ctx.random();
        let spread = -(20.0 + 0.75 * (30.0 + (decl - 90.0).abs() * jitter * jitter));
        SplitAngles {
            split,
            spread,
            correction: split / remaining_segs,
            direct: false,
            base,
        }
    }

    /// Steers the continuing (non-cloned) stem after a split into
    /// `splits + 1` stems.
    pub fn steer_continuation(&self, turtle: &mut Turtle, angles: &SplitAngles, splits: u32) {
        turtle.pitch_down(angles.split / 2.0);
        if !angles.base && splits == 1 {
            if angles.direct {
                turtle.turn_right(angles.spread / 2.0);
            } else {
                turtle.spin(-angles.spread / 2.0);
            }
        }
    }

    /// Applies bend jitter and curvature to a segment without a split.
    pub fn apply_curve(
        &self,
        params: &ParameterSet,
        turtle: &mut Turtle,
        seg_ind: u32,
        split_corr_angle: f32,
        ctx: &mut GenerationContext,
    ) {
        let bend = ctx.rand_for_param_var() * params.bend_v[self.level] / self.curve_res as f32;
        turtle.turn_left(bend);
        let curve_angle = calc_curve_angle(params, self.depth, seg_ind, ctx);
        turtle.pitch_down(curve_angle - split_corr_angle);
    }

    pub fn apply_tropism(&self, params: &ParameterSet, turtle: &mut Turtle) {
        turtle.apply_tropism(params.tropism_for(self.depth));
    }
}

/// Control offsets of a helical stem, reused for every half revolution.
#[derive(Clone, Copy, Debug)]
pub struct Helix {
    handle_start: Vec3,
    handle_end: Vec3,
    end: Vec3,
    axis: Vec3,
}

impl Helix {
    /// Bends `turtle` by tropism, then derives a helix around its heading.
    ///
    /// The helix angle comes from `|curve_v|`; pitch and radius get ±20%
    /// jitter and the start phase is random.
    pub fn new(
        params: &ParameterSet,
        walk: &StemWalk,
        stem_length: f32,
        turtle: &mut Turtle,
        ctx: &mut GenerationContext,
    ) -> Self {
        let tan_ang = (90.0 - params.curve_v[walk.level].abs()).to_radians().tan();
        let pitch = 2.0 * stem_length / walk.curve_res as f32 * ctx.rand_in_range(0.8, 1.2);
        let radius = 3.0 * pitch / (16.0 * tan_ang) * ctx.rand_in_range(0.8, 1.2);
        walk.apply_tropism(params, turtle);

        let points = [
            Vec3::new(0.0, -radius, -pitch / 4.0),
            Vec3::new(4.0 * radius / 3.0, -radius, 0.0),
            Vec3::new(4.0 * radius / 3.0, radius, 0.0),
            Vec3::new(0.0, radius, pitch / 4.0),
        ];
        let spin = Quat::from_rotation_z(ctx.rand_in_range(0.0, 2.0 * PI));
        let track = Quat::from_rotation_arc(Vec3::Z, turtle.dir);
        let [p0, p1, p2, p3] = points.map(|p| track * (spin * p));

        Self {
            handle_start: p1 - p0,
            handle_end: p2 - p0,
            end: p3 - p0,
            axis: turtle.dir,
        }
    }

    /// Curve point for segment `seg_ind`, given the stem origin and the
    /// previous point's position.
    pub fn point(&self, seg_ind: u32, origin: Vec3, prev: Vec3) -> CurvePoint {
        match seg_ind {
            0 => CurvePoint {
                co: origin,
                handle_left: origin,
                handle_right: origin + self.handle_start,
                radius: 0.0,
            },
            1 => {
                let co = origin + self.end;
                let handle_left = origin + self.handle_end;
                CurvePoint {
                    co,
                    handle_left,
                    handle_right: 2.0 * co - handle_left,
                    radius: 0.0,
                }
            }
            _ => {
                let rot = Quat::from_axis_angle(self.axis, (seg_ind - 1) as f32 * PI);
                let co = prev + rot * self.end;
                let handle_left = co - rot * (self.end - self.handle_end);
                CurvePoint {
                    co,
                    handle_left,
                    handle_right: 2.0 * co - handle_left,
                    radius: 0.0,
                }
            }
        }
    }
}

/// Moves `turtle` onto helix point `point` and faces it along the curve.
pub fn follow_helix(turtle: &mut Turtle, point: &CurvePoint) {
    let heading = (point.handle_right - point.co).normalize_or(turtle.dir);
    *turtle = Turtle::new(point.co, heading, turtle.right);
}
