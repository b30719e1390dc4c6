//! Placement of child branches and leaves along one stem segment.
//!
//! Three distribution modes, chosen per child level:
//! - alternate/opposite (`branch_dist <= 1`): children spread along the
//!   segment, each rotated by the phyllotactic `rotate` angle;
//! - whorled (`branch_dist > 1`): rings of `branch_dist + 1` children at a
//!   common offset;
//! - fan (negative count): every child at the stem tip, spread across
//!   `rotate` degrees.

use crate::bezier;
use crate::builder::{ChildFrame, Segment, StemBuilder, StemStart};
use crate::config::ParameterSet;
use crate::context::Dither;
use crate::error::GenResult;
use crate::leaf::Leaf;
use crate::shape::{calc_down_angle, calc_rotate_angle, radius_at_offset};
use crate::sink::CurveSink;
use crate::stem::Stem;
use crate::turtle::Turtle;
use crate::types::StemId;
use crate::walk::ChildTarget;

/// Parameter step used to estimate a helix's local normal.
const HELIX_PROBE: f32 = 0.0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BranchMode {
    AltOpp,
    Whorled { index: u32, group: u32 },
    Fan { index: u32, group: u32 },
}

/// A child set up on the parent but not yet grown.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    /// Heading and frame of the child.
    pub dir: Turtle,
    /// Point on the parent's surface the child grows out of.
    pub pos: Turtle,
    pub radius_limit: f32,
    /// Distance along the parent.
    pub offset: f32,
}

impl<S: CurveSink> StemBuilder<'_, S> {
    /// Decides how many children belong on `segment` and creates them.
    pub(crate) fn place_children(
        &mut self,
        frame: &mut ChildFrame,
        turtle: &Turtle,
        id: StemId,
        stem: &Stem,
        segment: &Segment,
    ) -> GenResult<()> {
        let is_last = segment.index == segment.curve_res;
        let per_seg = |count: f32, error: &mut Dither| {
            if count < 0.0 {
                if is_last { count as i32 } else { 0 }
            } else {
                error.take(count / segment.curve_res as f32)
            }
        };

        let target = frame.target;
        match target {
            ChildTarget::Branches(count) if count != 0.0 && stem.depth < self.params.max_depth() => {
                let on_seg = per_seg(count, &mut frame.branch_error);
                if on_seg != 0 {
                    self.make_branches(frame, turtle, id, stem, segment, on_seg, false)?;
                }
            }
            ChildTarget::Leaves(count) if count != 0.0 && stem.depth > 0 => {
                let on_seg = per_seg(count, &mut frame.leaf_error);
                if on_seg != 0 {
                    self.make_branches(frame, turtle, id, stem, segment, on_seg, true)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Sets up `count` children on `segment`, then records them as leaves
    /// or grows them as stems.
    #[allow(clippy::too_many_arguments)]
    fn make_branches(
        &mut self,
        frame: &mut ChildFrame,
        turtle: &Turtle,
        id: StemId,
        stem: &Stem,
        segment: &Segment,
        count: i32,
        leaves: bool,
    ) -> GenResult<()> {
        let params = self.params;
        let child_level = ParameterSet::child_level(stem.depth);
        let rotation = &mut frame.prev_rotation_angle;
        let mut placements = Vec::new();

        if count < 0 {
            let group = count.unsigned_abs();
            for index in 0..group {
                let mode = BranchMode::Fan { index, group };
                placements.push(self.set_up_branch(turtle, stem, segment, mode, 1.0, stem.length, rotation)?);
            }
        } else {
            let base_length = stem.length * params.base_size[ParameterSet::level(stem.depth)];
            let branch_dist = params.branch_dist[child_level];
            let along = |offset: f32| {
                ((segment.index - 1) as f32 + offset) / segment.curve_res as f32 * stem.length
            };

            if branch_dist > 1.0 {
                let per_whorl = branch_dist + 1.0;
                let whorls = (count as f32 / per_whorl) as u32;
                let mut whorl_error = Dither::default();
                for whorl in 0..whorls {
                    let offset = (whorl as f32 / whorls as f32).clamp(0.0, 1.0);
                    let stem_offset = along(offset);
                    if stem_offset > base_length {
                        let group = whorl_error.take(per_whorl).max(0) as u32;
                        for index in 0..group {
                            let mode = BranchMode::Whorled { index, group };
                            placements.push(
                                self.set_up_branch(turtle, stem, segment, mode, offset, stem_offset, rotation)?,
                            );
                        }
                    }
                    *rotation += params.rotate[child_level];
                }
            } else {
                for index in 0..count {
                    let raw = if index % 2 == 0 {
                        index as f32
                    } else {
                        index as f32 - branch_dist
                    };
                    let offset = (raw / count as f32).clamp(0.0, 1.0);
                    let stem_offset = along(offset);
                    if stem_offset > base_length {
                        placements.push(self.set_up_branch(
                            turtle,
                            stem,
                            segment,
                            BranchMode::AltOpp,
                            offset,
                            stem_offset,
                            rotation,
                        )?);
                    }
                }
            }
        }

        for placement in placements {
            if leaves {
                self.leaves.push(Leaf::new(placement.pos.pos, placement.dir.dir, placement.dir.right));
            } else {
                let child = Stem::child(stem.depth + 1, Some(id), placement.offset, placement.radius_limit);
                let child_id = self.arena.add(child);
                self.make_stem(placement.dir, child_id, StemStart::branch(placement.pos))?;
            }
        }
        Ok(())
    }

    /// Orients one child at `offset` within the segment.
    #[allow(clippy::too_many_arguments)]
    fn set_up_branch(
        &mut self,
        turtle: &Turtle,
        stem: &Stem,
        segment: &Segment,
        mode: BranchMode,
        offset: f32,
        stem_offset: f32,
        prev_rotation_angle: &mut f32,
    ) -> GenResult<Placement> {
        let params = self.params;
        let child_level = ParameterSet::child_level(stem.depth);
        let rotate = params.rotate[child_level];
        let rotate_v = params.rotate_v[child_level];
        let mut dir = branch_dir_turtle(turtle, segment, offset)?;

        let radius_limit = match mode {
            BranchMode::Fan { index, group } => {
                let angle = if group <= 1 {
                    0.0
                } else {
                    rotate * (index as f32 / (group - 1) as f32 - 0.5)
                        + self.ctx.rand_for_param_var() * rotate_v
                };
                dir.turn_right(angle);
                let last_seg = (segment.index - 1) as f32 / segment.curve_res as f32;
                radius_at_offset(params, stem, last_seg)
            }
            BranchMode::Whorled { index, group } => {
                let angle = *prev_rotation_angle
                    + 360.0 * index as f32 / group as f32
                    + self.ctx.rand_for_param_var() * rotate_v;
                dir.roll_right(angle);
                radius_at_offset(params, stem, fraction_along(stem, stem_offset))
            }
            BranchMode::AltOpp => {
                let angle = calc_rotate_angle(params, child_level, *prev_rotation_angle, self.ctx);
                *prev_rotation_angle = if rotate >= 0.0 {
                    angle
                } else {
                    -*prev_rotation_angle
                };
                dir.roll_right(angle);
                radius_at_offset(params, stem, fraction_along(stem, stem_offset))
            }
        };

        dir.pos = bezier::evaluate(offset, &segment.start, &segment.end)?;
        let mut pos = dir;
        pos.pitch_down(90.0);
        pos.move_by(radius_limit);

        let down_angle = calc_down_angle(params, stem, stem_offset, self.ctx);
        dir.pitch_down(down_angle);

        Ok(Placement {
            dir,
            pos,
            radius_limit,
            offset: stem_offset,
        })
    }
}

fn fraction_along(stem: &Stem, stem_offset: f32) -> f32 {
    if stem.length > 0.0 {
        (stem_offset / stem.length).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Frame for a child leaving the segment at `offset`: heading along the
/// curve tangent, `right` kept in the parent's bending plane.
fn branch_dir_turtle(turtle: &Turtle, segment: &Segment, offset: f32) -> GenResult<Turtle> {
    let tangent = bezier::tangent(offset, &segment.start, &segment.end)?;
    let dir = tangent.normalize_or(turtle.dir);

    let right = if segment.helix {
        // Approximates the helix normal from a nearby tangent.
        let probe = if offset + HELIX_PROBE <= 1.0 {
            offset + HELIX_PROBE
        } else {
            offset - HELIX_PROBE
        };
        let next = bezier::tangent(probe, &segment.start, &segment.end)?.normalize_or(dir);
        if probe > offset {
            dir.cross(next)
        } else {
            next.cross(dir)
        }
    } else {
        turtle.dir.cross(turtle.right).cross(dir)
    };
    Ok(Turtle::new(turtle.pos, dir, right))
}
