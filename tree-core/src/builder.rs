//! Recursive stem growth.
//!
//! [`StemBuilder::make_stem`] grows one stem segment by segment from a
//! turtle pose, placing branches or leaves along each segment, splitting
//! off clones, and recursing into every child. Points are buffered per stem
//! and handed to the [`CurveSink`] once the stem is complete.

use crate::bezier::{self, CurvePoint};
use crate::config::ParameterSet;
use crate::context::{Dither, GenerationContext};
use crate::envelope::{Candidate, PruneOutcome, PruningEnvelope};
use crate::error::{GenError, GenResult};
use crate::leaf::Leaf;
use crate::shape::{
    TreeScale, calc_length_child_max, calc_stem_length, calc_stem_radius, radius_at_offset,
};
use crate::sink::CurveSink;
use crate::stem::{Stem, StemArena};
use crate::turtle::Turtle;
use crate::types::StemId;
use crate::walk::{ChildTarget, Helix, SplitAngles, SplitCount, StemWalk, follow_helix};
use std::ops::Range;
use tracing::{debug, trace};

/// Branch density never drops below this after splits.
const MIN_BRANCH_FACTOR: f32 = 0.8;

/// Trunk segments starting below this fraction of the trunk are subdivided
/// to carry the flare.
const FLARE_REGION: f32 = 1.0 / 8.0;

/// Points per segment requested for subdivided segments.
const REFINED_POINTS: f32 = 100.0;

/// Where and how a stem starts growing.
#[derive(Clone, Copy, Debug)]
pub struct StemStart {
    /// First segment index; non-zero for clones resuming at a split point.
    pub start: u32,
    pub split_corr_angle: f32,
    pub num_branches_factor: f32,
    pub clone_prob: f32,
    /// Turtle on the parent's surface; the stem origin is pulled inwards
    /// from it by the stem radius.
    pub pos_corr: Option<Turtle>,
    /// Turtle of the stem this clone split from, used for the handles of
    /// the clone's first point.
    pub cloned: Option<Turtle>,
}

impl StemStart {
    pub fn fresh() -> Self {
        Self {
            start: 0,
            split_corr_angle: 0.0,
            num_branches_factor: 1.0,
            clone_prob: 1.0,
            pos_corr: None,
            cloned: None,
        }
    }

    pub fn branch(pos_corr: Turtle) -> Self {
        Self {
            pos_corr: Some(pos_corr),
            ..Self::fresh()
        }
    }
}

/// Branch and leaf bookkeeping for one stem's segment loop.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChildFrame {
    pub target: ChildTarget,
    pub branch_error: Dither,
    pub leaf_error: Dither,
    pub prev_rotation_angle: f32,
}

impl ChildFrame {
    fn damp(&mut self, num_branches_factor: f32) {
        if let ChildTarget::Branches(count) = &mut self.target {
            *count *= num_branches_factor;
        }
    }
}

/// Branch density left after a dithered split into `splits + 1` stems.
fn damped_branch_factor(factor: f32, splits: u32) -> f32 {
    (factor / (splits + 1) as f32).max(MIN_BRANCH_FACTOR)
}

/// The two curve points bounding the segment children are placed along.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Segment {
    pub index: u32,
    pub curve_res: u32,
    pub start: CurvePoint,
    pub end: CurvePoint,
    pub helix: bool,
}

/// Counters reported once a build finishes.
#[derive(Clone, Debug, Default)]
pub struct BuildOutput {
    pub leaves: Vec<Leaf>,
    pub stems_made: usize,
    pub curves: usize,
    pub curve_points: usize,
}

pub struct StemBuilder<'a, S: CurveSink> {
    pub(crate) params: &'a ParameterSet,
    pub(crate) ctx: &'a mut GenerationContext,
    sink: &'a mut S,
    pub(crate) arena: StemArena,
    pub(crate) leaves: Vec<Leaf>,
    pub(crate) scale: TreeScale,
    stems_made: usize,
    curves: usize,
    curve_points: usize,
}

impl<'a, S: CurveSink> StemBuilder<'a, S> {
    pub fn new(params: &'a ParameterSet, ctx: &'a mut GenerationContext, sink: &'a mut S) -> Self {
        Self {
            params,
            ctx,
            sink,
            arena: StemArena::default(),
            leaves: Vec::new(),
            scale: TreeScale::default(),
            stems_made: 0,
            curves: 0,
            curve_points: 0,
        }
    }

    pub fn context(&mut self) -> &mut GenerationContext {
        self.ctx
    }

    pub fn scale(&self) -> TreeScale {
        self.scale
    }

    /// Sets the overall scale used by the next trunk and everything on it.
    pub fn set_tree_scale(&mut self, tree_scale: f32) {
        self.scale.tree_scale = tree_scale;
    }

    pub fn stems_made(&self) -> usize {
        self.stems_made
    }

    /// Grows a trunk, and recursively everything on it, from `turtle`.
    pub fn grow_trunk(&mut self, turtle: Turtle) -> GenResult<()> {
        let id = self.arena.add(Stem::trunk());
        self.make_stem(turtle, id, StemStart::fresh())
    }

    pub fn finish(self) -> BuildOutput {
        BuildOutput {
            leaves: self.leaves,
            stems_made: self.stems_made,
            curves: self.curves,
            curve_points: self.curve_points,
        }
    }

    /// Grows stem `id` from `turtle` and recurses into its children.
    ///
    /// ### Errors
    /// [`GenError::UnsupportedSplit`] if a split away from the trunk base
    /// asks for more than three stems.
    pub fn make_stem(&mut self, mut turtle: Turtle, id: StemId, growth: StemStart) -> GenResult<()> {
        self.stems_made += 1;
        let params = self.params;
        let mut stem = *self.arena.get(id);

        if stem.is_invisible() {
            trace!(depth = stem.depth, radius_limit = stem.radius_limit, "skipping invisible stem");
            return Ok(());
        }
        let parent = self.arena.parent_of(&stem).copied();

        if growth.start == 0 {
            stem.length_child_max = calc_length_child_max(params, stem.depth, self.ctx);
            stem.length = calc_stem_length(params, &self.scale, &stem, parent.as_ref(), self.ctx);
            stem.radius = calc_stem_radius(params, &stem, parent.as_ref());
            if stem.depth == 0 {
                self.scale.base_length = stem.length * params.base_size[0];
            }
        }

        if let Some(mut pos_corr) = growth.pos_corr {
            pos_corr.move_by(-stem.radius.min(stem.radius_limit));
            turtle.pos = pos_corr.pos;
        }

        if params.prune_ratio > 0.0 && !self.prune(&mut stem, parent.as_ref(), &turtle, &growth) {
            return Ok(());
        }
        self.arena.set(id, stem);

        let walk = StemWalk::new(params, &stem);
        let curve_res = walk.curve_res;
        let mut frame = ChildFrame {
            target: walk.child_target(
                params,
                &self.scale,
                &stem,
                parent.as_ref(),
                growth.start,
                growth.num_branches_factor,
                self.ctx,
            ),
            branch_error: Dither::default(),
            leaf_error: Dither::default(),
            prev_rotation_angle: walk.start_rotation(params, self.ctx),
        };
        let helix = if walk.helix {
            Some(Helix::new(params, &walk, stem.length, &mut turtle, self.ctx))
        } else {
            None
        };
        let refinement = Refinement::new(params, &stem, curve_res);

        let curve = self.sink.new_curve(stem.depth);
        self.curves += 1;
        let mut points = Vec::with_capacity((curve_res + 1 - growth.start) as usize);
        let mut refined: Vec<Range<usize>> = Vec::new();
        let mut split_corr_angle = growth.split_corr_angle;
        let mut clone_prob = growth.clone_prob;
        let mut num_branches_factor = growth.num_branches_factor;
        let origin = turtle.pos;
        let handle_length = stem.length / (curve_res as f32 * 3.0);

        for seg_ind in growth.start..=curve_res {
            let mut point = match &helix {
                Some(helix) => {
                    let prev = points.last().map_or(origin, |p: &CurvePoint| p.co);
                    let point = helix.point(seg_ind, origin, prev);
                    follow_helix(&mut turtle, &point);
                    point
                }
                None => {
                    if seg_ind != growth.start {
                        turtle.move_by(walk.seg_length);
                    }
                    let heading = match growth.cloned {
                        Some(donor) if seg_ind == growth.start => donor.dir,
                        _ => turtle.dir,
                    };
                    CurvePoint::with_handles(turtle.pos, heading * handle_length)
                }
            };
            point.radius = radius_at_offset(params, &stem, seg_ind as f32 / curve_res as f32);
            points.push(point);

            if seg_ind == growth.start {
                continue;
            }

            let split = if walk.helix {
                SplitCount::default()
            } else {
                walk.split_count(params, seg_ind, &mut clone_prob, self.ctx)
            };
            if split.dithered {
                num_branches_factor = damped_branch_factor(num_branches_factor, split.splits);
                frame.damp(num_branches_factor);
            }

            let n = points.len();
            let segment = Segment {
                index: seg_ind,
                curve_res,
                start: points[n - 2],
                end: points[n - 1],
                helix: walk.helix,
            };
            let saved = self.ctx.stream_snapshot();
            self.place_children(&mut frame, &turtle, id, &stem, &segment)?;
            self.ctx.restore_stream(saved);

            if !walk.helix {
                if split.splits > 0 {
                    let angles = walk.split_angles(params, &turtle, seg_ind, self.ctx);
                    split_corr_angle = angles.correction;
                    let clone_start = StemStart {
                        start: seg_ind,
                        split_corr_angle,
                        num_branches_factor,
                        clone_prob,
                        pos_corr: None,
                        cloned: None,
                    };
                    let saved = self.ctx.stream_snapshot();
                    self.make_clones(&turtle, id, &angles, split.splits, clone_start)?;
                    self.ctx.restore_stream(saved);
                    walk.steer_continuation(&mut turtle, &angles, split.splits);
                } else {
                    walk.apply_curve(params, &mut turtle, seg_ind, split_corr_angle, self.ctx);
                }
                walk.apply_tropism(params, &mut turtle);
            }

            if refinement.applies(seg_ind) {
                let first = points.len() - 2;
                refinement.subdivide(params, &stem, seg_ind, &mut points)?;
                refined.push(first..points.len());
            }
        }

        refinement.shrink_handles(&mut points, &refined);
        self.curve_points += points.len();
        self.sink.append_points(curve, &points);
        Ok(())
    }

    /// Runs the envelope shrink loop on `stem`. Returns false if the stem
    /// was pruned away entirely.
    fn prune(
        &mut self,
        stem: &mut Stem,
        parent: Option<&Stem>,
        turtle: &Turtle,
        growth: &StemStart,
    ) -> bool {
        let candidate = Candidate {
            stem: *stem,
            parent,
            turtle: *turtle,
            start: growth.start,
            split_corr_angle: growth.split_corr_angle,
            clone_prob: growth.clone_prob,
            num_branches_factor: growth.num_branches_factor,
        };
        let shrink = PruningEnvelope::new(self.params, self.scale).shrink_to_fit(&candidate, self.ctx);
        let fitting_length = match shrink.outcome {
            PruneOutcome::Fitted(length) => length,
            PruneOutcome::Collapsed => 0.0,
            PruneOutcome::Discarded => {
                debug!(depth = stem.depth, tests = shrink.tests, "stem pruned away");
                return false;
            }
        };

        let ratio = self.params.prune_ratio;
        let start_length = stem.length;
        stem.length = start_length * (1.0 - ratio) + fitting_length * ratio;
        stem.radius = calc_stem_radius(self.params, stem, parent);
        if shrink.tests > 1 {
            debug!(
                depth = stem.depth,
                start_length,
                length = stem.length,
                tests = shrink.tests,
                "stem pruned to fit envelope"
            );
        }
        true
    }

    /// Splits `splits` clones off the current stem at `clone_start.start`.
    fn make_clones(
        &mut self,
        turtle: &Turtle,
        id: StemId,
        angles: &SplitAngles,
        splits: u32,
        clone_start: StemStart,
    ) -> GenResult<()> {
        if !angles.base && splits > 2 {
            return Err(GenError::UnsupportedSplit {
                branches: splits as usize + 1,
            });
        }
        let level = ParameterSet::level(self.arena.get(id).depth);
        let split_angle_v = self.params.split_angle_v[level];

        for j in 0..splits {
            let mut clone_turtle = *turtle;
            clone_turtle.pitch_down(angles.split / 2.0);
            let spread = if angles.base && !angles.direct {
                (j + 1) as f32 * (360.0 / (splits + 1) as f32)
                    + self.ctx.rand_for_param_var() * split_angle_v
            } else if j == 0 {
                angles.spread / 2.0
            } else {
                -angles.spread / 2.0
            };
            if angles.direct {
                clone_turtle.turn_left(spread);
            } else {
                clone_turtle.spin(spread);
            }

            let clone = *self.arena.get(id);
            let clone_id = self.arena.add(clone);
            let growth = StemStart {
                cloned: (split_angle_v >= 0.0).then_some(*turtle),
                ..clone_start
            };
            self.make_stem(clone_turtle, clone_id, growth)?;
        }
        Ok(())
    }
}

/// Extra point density for flared trunk bases and bulging stems.
#[derive(Clone, Copy, Debug)]
struct Refinement {
    points_per_seg: usize,
    flare: bool,
    bulge: bool,
    curve_res: u32,
}

impl Refinement {
    fn new(params: &ParameterSet, stem: &Stem, curve_res: u32) -> Self {
        Self {
            points_per_seg: (REFINED_POINTS / curve_res as f32).max(1.0).ceil() as usize,
            flare: stem.depth == 0 && params.flare > 0.0,
            bulge: params.taper[ParameterSet::level(stem.depth)] > 1.0,
            curve_res,
        }
    }

    fn applies(&self, seg_ind: u32) -> bool {
        let seg_start = (seg_ind - 1) as f32 / self.curve_res as f32;
        self.points_per_seg > 2 && (self.bulge || (self.flare && seg_start < FLARE_REGION))
    }

    /// Replaces the last segment of `points` with `points_per_seg` points
    /// sampled along the same Bezier, radii following the taper.
    fn subdivide(
        &self,
        params: &ParameterSet,
        stem: &Stem,
        seg_ind: u32,
        points: &mut Vec<CurvePoint>,
    ) -> GenResult<()> {
        let n = points.len();
        if n < 2 {
            return Ok(());
        }
        let (start, end) = (points[n - 2], points[n - 1]);
        points.pop();
        let handle_length = (end.handle_left - end.co).length();
        let steps = (self.points_per_seg - 1) as f32;
        for k in 1..self.points_per_seg - 1 {
            let offset = k as f32 / steps;
            let co = bezier::evaluate(offset, &start, &end)?;
            let tangent = bezier::tangent(offset, &start, &end)?.normalize_or_zero();
            let along = (offset + (seg_ind - 1) as f32) / self.curve_res as f32;
            points.push(CurvePoint {
                co,
                handle_left: co - tangent * handle_length,
                handle_right: co + tangent * handle_length,
                radius: radius_at_offset(params, stem, along),
            });
        }
        points.push(end);
        Ok(())
    }

    /// Shortens handles inside subdivided spans by `points_per_seg - 1` to
    /// match the denser spacing.
    ///
    /// Only handles facing into a span are touched. The outward handles of
    /// a span's end points, and every handle on plain segments, keep the
    /// length of their own segment spacing, so the curve does not pinch
    /// where refined and plain segments meet.
    fn shrink_handles(&self, points: &mut [CurvePoint], spans: &[Range<usize>]) {
        if spans.is_empty() {
            return;
        }
        let factor = (self.points_per_seg - 1) as f32;
        let mut left = vec![false; points.len()];
        let mut right = vec![false; points.len()];
        for span in spans {
            for i in span.clone() {
                left[i] |= i > span.start;
                right[i] |= i + 1 < span.end;
            }
        }
        for (i, point) in points.iter_mut().enumerate() {
            if left[i] {
                point.scale_left_handle(factor);
            }
            if right[i] {
                point.scale_right_handle(factor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn bare_trunk_params() -> ParameterSet {
        ParameterSet {
            levels: 1,
            flare: 0.0,
            branches: [0.0; 4],
            leaf_blos_num: 0.0,
            base_size: [0.0; 4],
            curve_res: [5, 3, 3, 1],
            ..ParameterSet::default()
        }
    }

    fn grow(params: &ParameterSet, seed: u64) -> (GenResult<BuildOutput>, Scene) {
        let mut ctx = GenerationContext::new(seed, params.levels as usize);
        let mut scene = Scene::default();
        let result = {
            let mut builder = StemBuilder::new(params, &mut ctx, &mut scene);
            builder.set_tree_scale(params.g_scale);
            let grown = builder.grow_trunk(Turtle::default());
            grown.map(|()| builder.finish())
        };
        (result, scene)
    }

    #[test]
    fn invisible_stem_emits_nothing() {
        let params = bare_trunk_params();
        let mut ctx = GenerationContext::new(1, 1);
        let mut scene = Scene::default();
        let mut builder = StemBuilder::new(&params, &mut ctx, &mut scene);
        let parent = builder.arena.add(Stem {
            length: 10.0,
            radius: 0.2,
            ..Stem::trunk()
        });
        let child = builder.arena.add(Stem::child(1, Some(parent), 5.0, 0.00005));
        builder.make_stem(Turtle::default(), child, StemStart::fresh()).unwrap();
        let out = builder.finish();
        assert_eq!(out.stems_made, 1);
        assert_eq!(out.curves, 0);
        assert!(scene.curves.is_empty());
    }

    #[test]
    fn bare_trunk_is_one_tapering_curve() {
        let params = bare_trunk_params();
        let (out, scene) = grow(&params, 5);
        let out = out.unwrap();
        assert_eq!(out.curves, 1);
        assert_eq!(scene.curves.len(), 1);
        let points = &scene.curves[0].points;
        assert_eq!(points.len(), 6);
        assert_eq!(out.curve_points, 6);
        for pair in points.windows(2) {
            assert!(pair[1].radius <= pair[0].radius + 1e-6);
            assert!(pair[1].co.z > pair[0].co.z, "trunk should keep climbing");
        }
    }

    #[test]
    fn too_many_interior_splits_is_an_error() {
        let params = ParameterSet {
            seg_splits: [3.0, 0.0, 0.0, 0.0],
            ..bare_trunk_params()
        };
        let (out, _) = grow(&params, 5);
        assert!(matches!(out, Err(GenError::UnsupportedSplit { branches: 4 })));
    }

    #[test]
    fn base_split_clones_resume_at_base_segment() {
        let params = ParameterSet {
            base_splits: 2,
            base_size: [0.3, 0.0, 0.0, 0.0],
            ..bare_trunk_params()
        };
        let (out, scene) = grow(&params, 9);
        let out = out.unwrap();
        assert_eq!(out.curves, 3);
        assert_eq!(out.stems_made, 3);
        let lengths: Vec<usize> = scene.curves.iter().map(|c| c.points.len()).collect();
        // Clones are grown depth first, before the continuation finishes.
        assert_eq!(lengths, vec![6, 4, 4]);

        let split_point = scene.curves[0].points[2].co;
        for clone in &scene.curves[1..] {
            assert!((clone.points[0].co - split_point).length() < 1e-5);
        }
    }

    #[test]
    fn flared_base_is_subdivided_with_short_handles() {
        let params = ParameterSet {
            flare: 0.6,
            curve_res: [4, 3, 3, 1],
            ..bare_trunk_params()
        };
        let (out, scene) = grow(&params, 3);
        out.unwrap();
        let points = &scene.curves[0].points;
        // One refined segment of 25 points plus three plain segments.
        assert_eq!(points.len(), 28);

        for pair in points[..25].windows(2) {
            assert!(pair[1].radius <= pair[0].radius + 1e-6);
        }
        let refined = (points[10].handle_right - points[10].co).length();
        let plain = (points[26].handle_right - points[26].co).length();
        assert!(refined < plain / 10.0, "refined {refined}, plain {plain}");
        assert!(points[0].radius > points[25].radius * 1.5, "base should flare");
    }

    #[test]
    fn branches_and_leaves_are_placed_on_deeper_levels() {
        let params = ParameterSet {
            levels: 2,
            branches: [1.0, 12.0, 0.0, 0.0],
            base_size: [0.2, 0.0, 0.0, 0.0],
            leaf_blos_num: 20.0,
            ..ParameterSet::default()
        };
        let (out, scene) = grow(&params, 17);
        let out = out.unwrap();
        assert!(out.stems_made > 5, "made {}", out.stems_made);
        assert!(scene.curves.iter().any(|c| c.depth == 1));
        assert!(!out.leaves.is_empty());
    }

    #[test]
    fn same_seed_same_curves() {
        let params = ParameterSet {
            levels: 2,
            branches: [1.0, 8.0, 0.0, 0.0],
            seg_splits: [0.4, 0.2, 0.0, 0.0],
            ..ParameterSet::default()
        };
        let (_, a) = grow(&params, 77);
        let (_, b) = grow(&params, 77);
        assert_eq!(a.curves, b.curves);
    }

    #[test]
    fn shrink_handles_skips_unrefined_sides() {
        let refinement = Refinement {
            points_per_seg: 3,
            flare: true,
            bulge: false,
            curve_res: 4,
        };
        let mut points: Vec<CurvePoint> = (0..5)
            .map(|i| CurvePoint::with_handles(glam::Vec3::Z * i as f32, glam::Vec3::Z))
            .collect();
        refinement.shrink_handles(&mut points, &[0..3]);
        assert_eq!(points[0].handle_left, -glam::Vec3::Z);
        assert!((points[0].handle_right.z - 0.5).abs() < 1e-6);
        assert!((points[1].handle_left.z - 0.5).abs() < 1e-6);
        assert!((points[2].handle_left.z - 1.5).abs() < 1e-6);
        assert!((points[2].handle_right.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn helix_stem_never_splits() {
        let params = ParameterSet {
            curve_v: [-30.0, 0.0, 0.0, 0.0],
            seg_splits: [1.0, 0.0, 0.0, 0.0],
            ..bare_trunk_params()
        };
        let (out, scene) = grow(&params, 12);
        let out = out.unwrap();
        assert_eq!(out.stems_made, 1);
        assert_eq!(out.curves, 1);
        assert_eq!(scene.curves[0].points.len(), 6);
    }

    #[test]
    fn clone_handles_follow_donor_heading() {
        let params = ParameterSet {
            base_splits: 2,
            base_size: [0.3, 0.0, 0.0, 0.0],
            ..bare_trunk_params()
        };
        let (out, scene) = grow(&params, 9);
        out.unwrap();
        let donor = scene.curves[0].points[2];
        let donor_handle = donor.handle_right - donor.co;
        for clone in &scene.curves[1..] {
            let first = clone.points[0];
            let handle = first.handle_right - first.co;
            assert!(
                (handle - donor_handle).length() < 1e-5,
                "clone handle {handle} differs from donor {donor_handle}"
            );
        }
    }

    #[test]
    fn branch_damping_never_drops_below_floor() {
        let mut factor = 1.0;
        for splits in [1, 2, 1, 3, 2] {
            factor = damped_branch_factor(factor, splits);
            assert!(factor >= MIN_BRANCH_FACTOR, "factor {factor}");
        }
        assert_eq!(damped_branch_factor(1.0, 0), 1.0);

        let base = 10.0;
        let mut frame = ChildFrame {
            target: ChildTarget::Branches(base),
            branch_error: Dither::default(),
            leaf_error: Dither::default(),
            prev_rotation_angle: 0.0,
        };
        let mut factor = 1.0;
        for k in 1..=4 {
            factor = damped_branch_factor(factor, 1);
            frame.damp(factor);
            let ChildTarget::Branches(count) = frame.target else {
                panic!("damping changed the target kind");
            };
            let floor = base * MIN_BRANCH_FACTOR.powi(k);
            assert!(count >= floor - 1e-4, "count {count} after {k} splits");
        }
    }
}
