/// Identifier for a stem in a [`crate::stem::StemArena`].
///
/// This is an index into the arena's stem list, and is only meaningful
/// within the lifetime of a single tree build.
pub type StemId = usize;

/// Identifier for a curve handed out by a [`crate::sink::CurveSink`].
pub type CurveId = usize;

/// Highest per-level parameter index; deeper levels reuse this one.
pub const MAX_LEVEL: usize = 3;
