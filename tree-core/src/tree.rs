//! Top-level driver: places trunks, grows each one and hands the finished
//! leaf placements to the host.

use crate::builder::StemBuilder;
use crate::config::ParameterSet;
use crate::context::GenerationContext;
use crate::error::GenResult;
use crate::leaf::{Leaf, LeafShape};
use crate::shape::{TreeScale, calc_stem_length, calc_stem_radius};
use crate::sink::{LeafPool, TreeHost};
use crate::stem::Stem;
use crate::turtle::Turtle;
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Minimum trunk separation, in trunk base radii.
const TRUNK_SPACING: f32 = 2.5;
/// Rejected floor-split candidates before the sampling disk grows.
const REJECTS_PER_GROWTH: u32 = 100;
const DISK_GROWTH: f32 = 1.1;

/// What one build produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeSummary {
    /// Seed actually used; never 0.
    pub seed: u64,
    pub trunks: usize,
    pub stems: usize,
    pub curves: usize,
    pub curve_points: usize,
    pub leaves: usize,
    pub blossoms: usize,
}

/// Origin and initial roll of one trunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrunkOrigin {
    pub pos: Vec3,
    pub roll: f32,
}

/// Builds exactly one tree into `host`.
///
/// A `seed` of 0 picks a fresh random seed; the seed used is reported in
/// the returned summary. When `render` is set the host's render step runs
/// once the geometry is complete.
///
/// ### Errors
/// - [`crate::error::GenError::InvalidParams`] before any growth if
///   `params` fails validation.
/// - Any fatal growth error, or the host's render error.
pub fn construct<H: TreeHost>(
    params: &ParameterSet,
    seed: u64,
    render: bool,
    out_path: Option<&Path>,
    host: &mut H,
) -> GenResult<TreeSummary> {
    params.validate()?;
    let seed = if seed == 0 {
        rand::rng().random_range(1..=u64::MAX)
    } else {
        seed
    };

    let started = Instant::now();
    let mut ctx = GenerationContext::new(seed, params.max_depth() + 1);
    let summary = grow_tree(params, seed, &mut ctx, host)?;
    info!(
        seed,
        stems = summary.stems,
        curve_points = summary.curve_points,
        leaves = summary.leaves,
        blossoms = summary.blossoms,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "tree complete"
    );

    if render {
        host.render(out_path)?;
    }
    Ok(summary)
}

fn grow_tree<H: TreeHost>(
    params: &ParameterSet,
    seed: u64,
    ctx: &mut GenerationContext,
    host: &mut H,
) -> GenResult<TreeSummary> {
    let origins = trunk_origins(params, ctx);
    info!(seed, trunks = origins.len(), levels = params.levels, "growing tree");

    let mut builder = StemBuilder::new(params, ctx, host);
    for (index, origin) in origins.iter().enumerate() {
        let var = builder.context().rand_for_param_var();
        builder.set_tree_scale(params.g_scale + var * params.g_scale_v);

        let mut turtle = Turtle {
            pos: origin.pos,
            ..Turtle::default()
        };
        let roll = if origins.len() > 1 {
            origin.roll
        } else {
            builder.context().rand_in_range(0.0, 360.0)
        };
        turtle.roll_right(roll);

        let before = builder.stems_made();
        builder.grow_trunk(turtle)?;
        debug!(
            trunk = index,
            pos = ?origin.pos,
            tree_scale = builder.scale().tree_scale,
            stems = builder.stems_made() - before,
            "trunk grown"
        );
    }
    let tree_scale = builder.scale().tree_scale;
    let output = builder.finish();

    let (leaves, blossoms) = partition_leaves(params, ctx, output.leaves);
    let ratio = tree_scale / params.g_scale;
    if !leaves.is_empty() {
        let shape = LeafShape::leaf(params.leaf_shape, ratio, params.leaf_scale, params.leaf_scale_x);
        host.build_leaf_mesh(LeafPool::Leaves, &shape, &leaves, params.leaf_bend);
    }
    if !blossoms.is_empty() {
        let shape = LeafShape::blossom(params.blossom_shape, ratio, params.blossom_scale);
        host.build_leaf_mesh(LeafPool::Blossoms, &shape, &blossoms, params.leaf_bend);
    }

    Ok(TreeSummary {
        seed,
        trunks: origins.len(),
        stems: output.stems_made,
        curves: output.curves,
        curve_points: output.curve_points,
        leaves: leaves.len(),
        blossoms: blossoms.len(),
    })
}

/// Trunk origins: one at the origin, or `floor_splits + 1` scattered on
/// the ground at least 2.5 trunk base radii apart.
///
/// The single-trunk roll is drawn later, when the trunk is grown.
pub fn trunk_origins(params: &ParameterSet, ctx: &mut GenerationContext) -> Vec<TrunkOrigin> {
    if params.floor_splits == 0 {
        return vec![TrunkOrigin {
            pos: Vec3::ZERO,
            roll: 0.0,
        }];
    }

    // Spacing comes from the largest trunk this species can grow.
    let scale = TreeScale {
        tree_scale: params.g_scale + params.g_scale_v,
        ..TreeScale::default()
    };
    let mut dummy = Stem::trunk();
    dummy.length = calc_stem_length(params, &scale, &dummy, None, ctx);
    let min_dist = TRUNK_SPACING * calc_stem_radius(params, &dummy, None);

    let wanted = params.floor_splits as usize + 1;
    let spread = params.floor_splits as f32 / TRUNK_SPACING * params.g_scale * params.ratio;
    let mut growth = 1.0;
    let mut rejected = 0u32;
    let mut origins: Vec<TrunkOrigin> = Vec::with_capacity(wanted);
    while origins.len() < wanted {
        let dist = (ctx.random() * spread * growth).sqrt();
        let theta = ctx.rand_in_range(0.0, TAU);
        let pos = Vec3::new(dist * theta.cos(), dist * theta.sin(), 0.0);

        if origins.iter().all(|o| o.pos.distance(pos) >= min_dist) {
            origins.push(TrunkOrigin {
                pos,
                roll: theta.to_degrees() - 90.0,
            });
        } else {
            rejected += 1;
            if rejected % REJECTS_PER_GROWTH == 0 {
                growth *= DISK_GROWTH;
            }
        }
    }
    if rejected > 0 {
        debug!(rejected, growth, "floor split sampling");
    }
    origins
}

/// Splits placements into `(leaves, blossoms)` by one draw per placement
/// against `blossom_rate`.
fn partition_leaves(
    params: &ParameterSet,
    ctx: &mut GenerationContext,
    placed: Vec<Leaf>,
) -> (Vec<Leaf>, Vec<Leaf>) {
    if params.blossom_rate <= 0.0 {
        return (placed, Vec::new());
    }
    placed
        .into_iter()
        .partition(|_| ctx.random() >= params.blossom_rate)
}
