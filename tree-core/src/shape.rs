//! Closed-form profile, taper and angle formulas of the Weber–Penn model.
//!
//! Everything here is a pure function of the parameter set, the stems
//! involved and (for the `calc_*` helpers that carry a variance) one or two
//! draws from the [`GenerationContext`].

use crate::config::{ParameterSet, ShapeKind};
use crate::context::GenerationContext;
use crate::stem::Stem;
use std::f32::consts::PI;

/// Tree-wide dimensions recorded while the trunk is sized.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TreeScale {
    /// Overall height scale of the current trunk (`g_scale ± g_scale_v`).
    pub tree_scale: f32,
    /// Length of the bare trunk base (`trunk length × base_size[0]`).
    pub base_length: f32,
}

/// Normalized silhouette value of `kind` at `ratio`.
pub fn shape_ratio(params: &ParameterSet, kind: ShapeKind, ratio: f32) -> f32 {
    match kind {
        ShapeKind::Conical => 0.2 + 0.8 * ratio,
        ShapeKind::Spherical => 0.2 + 0.8 * (PI * ratio).sin(),
        ShapeKind::Hemispherical => 0.2 + 0.8 * (0.5 * PI * ratio).sin(),
        ShapeKind::Cylindrical => 1.0,
        ShapeKind::TaperedCylindrical => 0.5 + 0.5 * ratio,
        ShapeKind::Flame => {
            if ratio <= 0.7 {
                ratio / 0.7
            } else {
                (1.0 - ratio) / 0.3
            }
        }
        ShapeKind::InverseConical => 1.0 - 0.8 * ratio,
        ShapeKind::TendFlame => {
            if ratio <= 0.7 {
                0.5 + 0.5 * ratio / 0.7
            } else {
                0.5 + 0.5 * (1.0 - ratio) / 0.3
            }
        }
        ShapeKind::Envelope => envelope_ratio(params, ratio),
    }
}

/// Pruning envelope: rises to 1 at `1 - prune_width_peak`, then falls to 0.
fn envelope_ratio(params: &ParameterSet, ratio: f32) -> f32 {
    if !(0.0..=1.0).contains(&ratio) {
        return 0.0;
    }
    let peak = params.prune_width_peak;
    let split = 1.0 - peak;
    if ratio < split || peak <= 0.0 {
        (ratio / split).powf(params.prune_power_high)
    } else {
        ((1.0 - ratio) / peak).powf(params.prune_power_low)
    }
}

/// Radius of `stem` at fractional position `z_1` along it.
///
/// `taper < 1` narrows linearly toward `1 - taper` of the base radius,
/// `1..2` blends to a rounded tip, and `2..3` produces periodic (or, at 3,
/// spherical) bulges. Trunks are additionally widened near the ground by the
/// flare multiplier.
pub fn radius_at_offset(params: &ParameterSet, stem: &Stem, z_1: f32) -> f32 {
    let n_taper = params.taper[ParameterSet::level(stem.depth)];

    let unit_taper = if n_taper < 1.0 {
        n_taper
    } else if n_taper < 2.0 {
        2.0 - n_taper
    } else {
        0.0
    };
    let taper = stem.radius * (1.0 - unit_taper * z_1);

    let mut radius = if n_taper < 1.0 || taper <= 0.0 {
        taper
    } else {
        let z_2 = (1.0 - z_1) * stem.length;
        let bulge = if n_taper < 2.0 || z_2 < taper {
            1.0
        } else {
            n_taper - 2.0
        };
        let z_3 = if n_taper < 2.0 {
            z_2
        } else {
            (z_2 - 2.0 * taper * (z_2 / (2.0 * taper) + 0.5).trunc()).abs()
        };
        if n_taper < 2.0 && z_3 >= taper {
            taper
        } else {
            let rounded = (taper * taper - (z_3 - taper) * (z_3 - taper)).max(0.0).sqrt();
            (1.0 - bulge) * taper + bulge * rounded
        }
    };

    if stem.depth == 0 {
        let y_val = (1.0 - 8.0 * z_1).max(0.0);
        let flare = params.flare * ((100f32.powf(y_val) - 1.0) / 100.0) + 1.0;
        radius *= flare;
    }
    radius
}

/// Maximum relative length of this stem's children.
pub fn calc_length_child_max(
    params: &ParameterSet,
    depth: usize,
    ctx: &mut GenerationContext,
) -> f32 {
    let child = ParameterSet::child_level(depth);
    params.length[child] + ctx.rand_for_param_var() * params.length_v[child]
}

/// Length of a freshly grown stem.
pub fn calc_stem_length(
    params: &ParameterSet,
    scale: &TreeScale,
    stem: &Stem,
    parent: Option<&Stem>,
    ctx: &mut GenerationContext,
) -> f32 {
    let result = match (stem.depth, parent) {
        (0, _) | (_, None) => {
            scale.tree_scale * (params.length[0] + ctx.rand_for_param_var() * params.length_v[0])
        }
        (1, Some(parent)) => {
            let span = parent.length - scale.base_length;
            let ratio = if span > 0.0 {
                (parent.length - stem.offset) / span
            } else {
                0.0
            };
            parent.length * parent.length_child_max * shape_ratio(params, params.shape, ratio)
        }
        (_, Some(parent)) => parent.length_child_max * (parent.length - 0.7 * stem.offset),
    };
    result.max(0.0)
}

/// Base radius of a stem, capped by its attachment radius.
pub fn calc_stem_radius(params: &ParameterSet, stem: &Stem, parent: Option<&Stem>) -> f32 {
    let level = ParameterSet::level(stem.depth);
    match parent {
        Some(parent) if stem.depth > 0 => {
            let relative = if parent.length > 0.0 {
                stem.length / parent.length
            } else {
                0.0
            };
            let mut result =
                params.radius_mod[level] * parent.radius * relative.powf(params.ratio_power);
            result = result.max(0.005);
            if stem.is_constrained() {
                result = result.min(stem.radius_limit);
            }
            result
        }
        _ => stem.length * params.ratio * params.radius_mod[0],
    }
}

/// Pitch applied per segment for curvature of a stem at `depth`.
pub fn calc_curve_angle(
    params: &ParameterSet,
    depth: usize,
    seg_ind: u32,
    ctx: &mut GenerationContext,
) -> f32 {
    let level = ParameterSet::level(depth);
    let curve = params.curve[level];
    let curve_v = params.curve_v[level];
    let curve_back = params.curve_back[level];
    let curve_res = params.curve_res_at(depth) as f32;

    let mut curve_angle = if curve_back == 0.0 {
        curve / curve_res
    } else if (seg_ind as f32) < curve_res / 2.0 {
        curve / (curve_res / 2.0)
    } else {
        curve_back / (curve_res / 2.0)
    };
    curve_angle += ctx.rand_for_param_var() * (curve_v / curve_res);
    curve_angle
}

/// Declination of a child attached to `stem` at distance `stem_offset`.
pub fn calc_down_angle(
    params: &ParameterSet,
    stem: &Stem,
    stem_offset: f32,
    ctx: &mut GenerationContext,
) -> f32 {
    let child = ParameterSet::child_level(stem.depth);
    let down_angle = params.down_angle[child];
    let down_angle_v = params.down_angle_v[child];
    if down_angle_v >= 0.0 {
        down_angle + ctx.rand_for_param_var() * down_angle_v
    } else {
        let span = stem.length * (1.0 - params.base_size[ParameterSet::level(stem.depth)]);
        let ratio = if span > 0.0 {
            (stem.length - stem_offset) / span
        } else {
            0.0
        };
        let d_angle = down_angle
            + down_angle_v * (1.0 - 2.0 * shape_ratio(params, ShapeKind::Conical, ratio));
        d_angle + ctx.rand_for_param_var() * (d_angle * 0.1).abs()
    }
}

/// Next rotation angle about the parent for level `level`.
///
/// Non-negative `rotate` accumulates and wraps to `[0, 360)`; negative
/// `rotate` treats `prev_angle` as a ±1 side multiplier.
pub fn calc_rotate_angle(
    params: &ParameterSet,
    level: usize,
    prev_angle: f32,
    ctx: &mut GenerationContext,
) -> f32 {
    let rotate = params.rotate[level];
    let jitter = ctx.rand_for_param_var() * params.rotate_v[level];
    if rotate >= 0.0 {
        (prev_angle + rotate + jitter).rem_euclid(360.0)
    } else {
        prev_angle * (180.0 + rotate + jitter)
    }
}

/// Number of leaves on `stem`; negative means a fan at the tip.
pub fn calc_leaf_count(
    params: &ParameterSet,
    scale: &TreeScale,
    stem: &Stem,
    parent: Option<&Stem>,
) -> f32 {
    if params.leaf_blos_num < 0.0 {
        return params.leaf_blos_num;
    }
    let leaves = params.leaf_blos_num * scale.tree_scale / params.g_scale;
    let reference = parent.map_or(0.0, |p| p.length_child_max * p.length);
    if reference > 0.0 {
        leaves * (stem.length / reference)
    } else {
        0.0
    }
}

/// Number of child branches on `stem`; negative means a fan at the tip.
pub fn calc_branch_count(
    params: &ParameterSet,
    stem: &Stem,
    parent: Option<&Stem>,
    ctx: &mut GenerationContext,
) -> f32 {
    let branches = params.branches[ParameterSet::child_level(stem.depth)];
    let result = match parent {
        _ if stem.depth == 0 => branches * (ctx.random() * 0.2 + 0.9),
        _ if branches < 0.0 => branches,
        Some(parent) if parent.length > 0.0 => {
            if stem.depth == 1 {
                let relative = stem.length / parent.length;
                let max = if parent.length_child_max != 0.0 {
                    parent.length_child_max
                } else {
                    1.0
                };
                branches * (0.2 + 0.8 * relative / max)
            } else {
                branches * (1.0 - 0.5 * stem.offset / parent.length)
            }
        }
        _ => 0.0,
    };
    result / (1.0 - params.base_size[ParameterSet::level(stem.depth)])
}
