//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Fatal conditions that abort a tree build.
///
/// Degenerate but legal situations (zero leaf counts, stems too thin to
/// see, stems pruned away entirely) are not errors and never show up here.
#[derive(Debug, Error)]
pub enum GenError {
    /// A Bezier curve was evaluated outside its parameter domain.
    #[error("Bezier offset out of range: {offset} not between 0 and 1")]
    BezierOffset { offset: f32 },

    /// A split point away from the trunk base asked for too many stems.
    #[error("Only splitting up to 3 branches is supported, got {branches}")]
    UnsupportedSplit { branches: usize },

    /// The parameter set failed validation before growth started.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// The host failed to render the finished tree.
    #[error("Render failed: {0}")]
    Render(String),
}

/// Result type for tree generation.
pub type GenResult<T> = Result<T, GenError>;
