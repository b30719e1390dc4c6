//! Host-owned collaborators that receive the generated geometry.
//!
//! The generator only ever writes through these traits; it never reads
//! geometry back. [`crate::scene::Scene`] is the in-memory implementation.

use crate::bezier::CurvePoint;
use crate::error::GenResult;
use crate::leaf::{Leaf, LeafShape};
use crate::types::CurveId;
use std::path::Path;
use tracing::warn;

/// Receives stem curves.
pub trait CurveSink {
    /// Creates a new empty curve for a stem at `depth`.
    fn new_curve(&mut self, depth: usize) -> CurveId;

    /// Appends `points`, in order, to `curve`.
    fn append_points(&mut self, curve: CurveId, points: &[CurvePoint]);
}

/// Which mesh a batch of leaf placements belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafPool {
    Leaves,
    Blossoms,
}

/// Builds leaf meshes from a shape template and a list of placements.
pub trait MeshSink {
    fn build_leaf_mesh(&mut self, pool: LeafPool, shape: &LeafShape, leaves: &[Leaf], bend: f32);
}

/// Everything [`crate::tree::construct`] needs from its host.
pub trait TreeHost: CurveSink + MeshSink {
    /// Renders the finished tree, optionally writing the result to
    /// `out_path`.
    ///
    /// ### Errors
    /// [`crate::error::GenError::Render`] if the host fails to render.
    fn render(&mut self, out_path: Option<&Path>) -> GenResult<()> {
        warn!(?out_path, "host has no renderer, skipping render");
        Ok(())
    }
}
