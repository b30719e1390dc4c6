//! Species parameters driving the growth algorithm.
//!
//! Per-level arrays are indexed by stem depth; any depth past
//! [`MAX_LEVEL`] reads the last entry. The [`Default`] impl is a complete
//! preset (quaking aspen), so partial presets can be deserialized on top of
//! it.

use crate::error::{GenError, GenResult};
use crate::types::MAX_LEVEL;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Named silhouette profiles used by [`crate::shape::shape_ratio`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Conical,
    Spherical,
    Hemispherical,
    Cylindrical,
    TaperedCylindrical,
    Flame,
    InverseConical,
    TendFlame,
    /// Pruning envelope profile, shaped by the `prune_*` parameters.
    Envelope,
}

/// Read-only bundle of species parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub shape: ShapeKind,
    pub g_scale: f32,
    pub g_scale_v: f32,
    pub levels: u32,
    pub ratio: f32,
    pub ratio_power: f32,
    pub flare: f32,
    pub floor_splits: u32,
    /// Splits at the trunk base; negative means a random count up to `|n|`.
    pub base_splits: i32,
    pub base_size: [f32; 4],
    pub down_angle: [f32; 4],
    pub down_angle_v: [f32; 4],
    pub rotate: [f32; 4],
    pub rotate_v: [f32; 4],
    pub branches: [f32; 4],
    pub branch_dist: [f32; 4],
    pub length: [f32; 4],
    pub length_v: [f32; 4],
    pub taper: [f32; 4],
    pub seg_splits: [f32; 4],
    pub split_angle: [f32; 4],
    pub split_angle_v: [f32; 4],
    pub bend_v: [f32; 4],
    pub curve_res: [u32; 4],
    pub curve: [f32; 4],
    pub curve_back: [f32; 4],
    /// Negative values turn stems of that level into helices.
    pub curve_v: [f32; 4],
    pub radius_mod: [f32; 4],
    /// Leaves per stem; negative places a fan of `|n|` at the stem tip.
    pub leaf_blos_num: f32,
    pub leaf_shape: u32,
    pub leaf_scale: f32,
    pub leaf_scale_x: f32,
    pub leaf_bend: f32,
    pub blossom_shape: u32,
    pub blossom_scale: f32,
    pub blossom_rate: f32,
    pub tropism: [f32; 3],
    pub prune_ratio: f32,
    pub prune_width: f32,
    pub prune_width_peak: f32,
    pub prune_power_low: f32,
    pub prune_power_high: f32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            shape: ShapeKind::TendFlame,
            g_scale: 13.0,
            g_scale_v: 3.0,
            levels: 3,
            ratio: 0.015,
            ratio_power: 1.2,
            flare: 0.6,
            floor_splits: 0,
            base_splits: 0,
            base_size: [0.3, 0.02, 0.02, 0.02],
            down_angle: [0.0, 60.0, 45.0, 45.0],
            down_angle_v: [0.0, -50.0, 10.0, 10.0],
            rotate: [0.0, 140.0, 140.0, 77.0],
            rotate_v: [0.0, 0.0, 0.0, 0.0],
            branches: [1.0, 50.0, 30.0, 1.0],
            branch_dist: [0.0, 0.0, 0.0, 0.0],
            length: [1.0, 0.3, 0.6, 0.0],
            length_v: [0.0, 0.0, 0.0, 0.0],
            taper: [1.0, 1.0, 1.0, 1.0],
            seg_splits: [0.0, 0.0, 0.0, 0.0],
            split_angle: [40.0, 0.0, 0.0, 0.0],
            split_angle_v: [5.0, 0.0, 0.0, 0.0],
            bend_v: [0.0, 50.0, 0.0, 0.0],
            curve_res: [5, 5, 3, 1],
            curve: [0.0, -40.0, -40.0, 0.0],
            curve_back: [0.0, 0.0, 0.0, 0.0],
            curve_v: [20.0, 50.0, 75.0, 0.0],
            radius_mod: [1.0, 1.0, 1.0, 1.0],
            leaf_blos_num: 40.0,
            leaf_shape: 0,
            leaf_scale: 0.17,
            leaf_scale_x: 1.0,
            leaf_bend: 0.6,
            blossom_shape: 1,
            blossom_scale: 0.0,
            blossom_rate: 0.0,
            tropism: [0.0, 0.0, 0.5],
            prune_ratio: 0.0,
            prune_width: 0.5,
            prune_width_peak: 0.5,
            prune_power_low: 0.5,
            prune_power_high: 0.5,
        }
    }
}

impl ParameterSet {
    /// Parameter index for a stem at `depth`.
    #[inline]
    pub fn level(depth: usize) -> usize {
        depth.min(MAX_LEVEL)
    }

    /// Parameter index for the children of a stem at `depth`.
    #[inline]
    pub fn child_level(depth: usize) -> usize {
        Self::level(depth + 1)
    }

    /// Deepest stem depth that will be grown.
    pub fn max_depth(&self) -> usize {
        self.levels.saturating_sub(1) as usize
    }

    pub fn curve_res_at(&self, depth: usize) -> u32 {
        self.curve_res[Self::level(depth)].max(1)
    }

    /// Trunk segment index that closes the bare base region.
    pub fn base_seg_ind(&self) -> u32 {
        (self.base_size[0] * self.curve_res_at(0) as f32).ceil() as u32
    }

    /// Full tropism for sub-branches, horizontal-only for trunk and primary
    /// branches.
    pub fn tropism_for(&self, depth: usize) -> Vec3 {
        let [x, y, z] = self.tropism;
        if depth > 1 {
            Vec3::new(x, y, z)
        } else {
            Vec3::new(x, y, 0.0)
        }
    }

    /// Stems at the deepest level carry leaves instead of sub-branches.
    pub fn grows_leaves(&self, depth: usize) -> bool {
        depth == self.max_depth() && depth > 0 && self.leaf_blos_num != 0.0
    }

    /// Checks that the parameter set describes a tree that can be grown.
    ///
    /// ### Errors
    /// [`GenError::InvalidParams`] naming the first offending field.
    pub fn validate(&self) -> GenResult<()> {
        if !(1..=(MAX_LEVEL as u32 + 1)).contains(&self.levels) {
            return Err(invalid(format!("levels must be 1..=4, got {}", self.levels)));
        }
        if self.g_scale <= 0.0 {
            return Err(invalid(format!("g_scale must be positive, got {}", self.g_scale)));
        }
        for depth in 0..self.levels as usize {
            if self.curve_res[Self::level(depth)] == 0 {
                return Err(invalid(format!("curve_res[{depth}] must be at least 1")));
            }
            let base = self.base_size[Self::level(depth)];
            if !(0.0..1.0).contains(&base) {
                return Err(invalid(format!("base_size[{depth}] must be in [0, 1), got {base}")));
            }
        }
        for (name, value) in [
            ("prune_ratio", self.prune_ratio),
            ("prune_width_peak", self.prune_width_peak),
            ("blossom_rate", self.blossom_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        Ok(())
    }
}

fn invalid(msg: String) -> GenError {
    GenError::InvalidParams(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_is_valid() {
        assert!(ParameterSet::default().validate().is_ok());
    }

    #[test]
    fn levels_past_three_clamp() {
        assert_eq!(ParameterSet::level(0), 0);
        assert_eq!(ParameterSet::level(3), 3);
        assert_eq!(ParameterSet::level(7), 3);
        assert_eq!(ParameterSet::child_level(3), 3);
    }

    #[test]
    fn base_segment_rounds_up() {
        let mut p = ParameterSet::default();
        p.base_size[0] = 0.3;
        p.curve_res[0] = 5;
        assert_eq!(p.base_seg_ind(), 2);
        p.base_size[0] = 0.0;
        assert_eq!(p.base_seg_ind(), 0);
    }

    #[test]
    fn tropism_is_horizontal_for_shallow_stems() {
        let mut p = ParameterSet::default();
        p.tropism = [0.1, 0.2, 0.5];
        assert_eq!(p.tropism_for(1), Vec3::new(0.1, 0.2, 0.0));
        assert_eq!(p.tropism_for(2), Vec3::new(0.1, 0.2, 0.5));
    }

    #[test]
    fn leaves_only_on_deepest_non_trunk_level() {
        let p = ParameterSet::default();
        assert!(!p.grows_leaves(0));
        assert!(!p.grows_leaves(1));
        assert!(p.grows_leaves(2));

        let mut single = ParameterSet::default();
        single.levels = 1;
        assert!(!single.grows_leaves(0), "a lone trunk never carries leaves");
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut p = ParameterSet::default();
        p.levels = 5;
        assert!(matches!(p.validate(), Err(GenError::InvalidParams(_))));

        let mut p = ParameterSet::default();
        p.curve_res[1] = 0;
        assert!(p.validate().is_err());

        let mut p = ParameterSet::default();
        p.prune_ratio = 1.5;
        assert!(p.validate().is_err());

        let mut p = ParameterSet::default();
        p.base_size[0] = 1.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn partial_json_preset_fills_in_defaults() {
        let json = r#"{ "shape": "spherical", "levels": 2, "branches": [1, 20, 0, 0] }"#;
        let p: ParameterSet = serde_json::from_str(json).unwrap();
        assert_eq!(p.shape, ShapeKind::Spherical);
        assert_eq!(p.levels, 2);
        assert_eq!(p.branches, [1.0, 20.0, 0.0, 0.0]);
        assert_eq!(p.g_scale, ParameterSet::default().g_scale);
    }
}
