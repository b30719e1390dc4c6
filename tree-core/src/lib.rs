//! Weber–Penn parametric tree generator.
//!
//! Main components:
//! - [`tree`] — trunk placement and the [`tree::construct`] entry point.
//! - [`builder`] — recursive stem growth, pruning, splits and clones.
//! - [`branching`] — branch and leaf placement along a grown segment.
//! - [`walk`] — per-segment growth rules shared by growth and pruning.
//! - [`envelope`] — pruning envelope containment and the shrink loop.
//! - [`shape`] — shape ratios, taper, lengths, radii and angles.
//! - [`turtle`] — 3-D position/orientation cursor.
//! - [`bezier`] — curve points and cubic Bezier evaluation.
//! - [`leaf`] — leaf placements and shape templates.
//! - [`sink`] — host traits receiving curves and leaf meshes.
//! - [`scene`] — in-memory host.
//! - [`config`] — species parameters.
//! - [`context`] — random stream and count dithering state.
//! - [`stem`] — stem records and their arena.
//! - [`error`] — error type.
//! - [`types`] — shared type aliases and IDs.

pub mod bezier;
pub mod branching;
pub mod builder;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod leaf;
pub mod scene;
pub mod shape;
pub mod sink;
pub mod stem;
pub mod tree;
pub mod turtle;
pub mod types;
pub mod walk;

pub use config::ParameterSet;
pub use error::{GenError, GenResult};
pub use scene::Scene;
pub use tree::{TreeSummary, construct};
