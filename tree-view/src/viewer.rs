//! Interactive tree viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the species parameters and the
//! last generated [`Scene`], and implements [`eframe::App`] to draw the tree
//! and let the user tweak parameters and regenerate.

use eframe::App;
use glam::{Vec2, Vec3};
use rand::Rng;
use tracing::{info, warn};
use tree_core::{
    ParameterSet, Scene, TreeSummary, bezier, construct,
    scene::{LeafMesh, SceneCurve},
    sink::LeafPool,
};

/// Line samples drawn per curve segment.
const SEGMENT_SAMPLES: usize = 6;

const DEPTH_COLORS: [egui::Color32; 4] = [
    egui::Color32::from_rgb(150, 110, 70),
    egui::Color32::from_rgb(170, 130, 90),
    egui::Color32::from_rgb(190, 160, 110),
    egui::Color32::from_rgb(200, 180, 140),
];
const LEAF_COLOR: egui::Color32 = egui::Color32::from_rgb(90, 170, 80);
const BLOSSOM_COLOR: egui::Color32 = egui::Color32::from_rgb(240, 190, 210);
const LEAF_POOLS: [(LeafPool, egui::Color32); 2] =
    [(LeafPool::Leaves, LEAF_COLOR), (LeafPool::Blossoms, BLOSSOM_COLOR)];

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The generator input: a [`ParameterSet`] and a seed.
/// - The generator output: a [`Scene`] and its [`TreeSummary`].
/// - Camera state (yaw, elevation, pan, zoom).
///
/// The typical per-frame update is:
/// 1. Handle UI interactions; parameter edits only take effect on regenerate.
/// 2. Project the scene with the current camera and draw it.
///
/// ### Fields
/// - `params` - Species parameters handed to [`construct`].
/// - `seed` - Seed for the next build; 0 picks a fresh one.
/// - `scene` - Geometry of the last build.
/// - `summary` - Counters of the last successful build.
/// - `error` - Message of the last failed build, if any.
///
/// - `yaw` - Rotation of the tree about the vertical axis, in degrees.
/// - `elevation` - Camera tilt above the horizon, in degrees.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space pan offset in pixels.
/// - `fit_pending` - Refit the camera to the scene on the next frame.
/// - `show_leaves` - Draw leaf and blossom meshes.
pub struct Viewer {
    params: ParameterSet,
    seed: u64,
    scene: Scene,
    summary: Option<TreeSummary>,
    error: Option<String>,

    yaw: f32,
    elevation: f32,
    zoom: f32,
    pan: egui::Vec2,
    fit_pending: bool,
    show_leaves: bool,
}

impl Viewer {
    /// Creates a viewer with the default species and builds the first tree.
    pub fn new() -> Self {
        let mut viewer = Self {
            params: ParameterSet::default(),
            seed: 1,
            scene: Scene::default(),
            summary: None,
            error: None,
            yaw: 0.0,
            elevation: 10.0,
            zoom: 30.0,
            pan: egui::vec2(0.0, 0.0),
            fit_pending: true,
            show_leaves: true,
        };
        viewer.regenerate();
        viewer
    }

    /// Rebuilds the scene from the current parameters and seed.
    ///
    /// On success the resolved seed replaces a seed of 0 so the build can
    /// be repeated. On failure the scene is left empty and the error shown.
    fn regenerate(&mut self) {
        self.scene.clear();
        match construct(&self.params, self.seed, false, None, &mut self.scene) {
            Ok(summary) => {
                info!(seed = summary.seed, curves = summary.curves, "viewer rebuilt tree");
                self.seed = summary.seed;
                self.summary = Some(summary);
                self.error = None;
            }
            Err(err) => {
                warn!(%err, "tree build failed");
                self.scene.clear();
                self.summary = None;
                self.error = Some(err.to_string());
            }
        }
        self.fit_pending = true;
    }

    /// Projects a tree-space point onto the view plane.
    ///
    /// The tree is turned by `yaw` about +Z and then viewed from `elevation`
    /// degrees above the horizon; +Z maps to screen-up.
    fn project(&self, p: Vec3) -> Vec2 {
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        let across = p.x * cy - p.y * sy;
        let depth = p.x * sy + p.y * cy;
        let (se, ce) = self.elevation.to_radians().sin_cos();
        Vec2::new(across, p.z * ce + depth * se)
    }

    /// Converts a view-plane position to screen-space.
    ///
    /// View coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The y-axis is flipped so that
    /// positive y goes up.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::world_to_screen`], up to rounding.
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    /// Centers the projected scene in `rect` and zooms so it fills 90% of
    /// the height.
    fn fit_to(&mut self, rect: egui::Rect) {
        let mut projected = self
            .scene
            .curves
            .iter()
            .flat_map(|c| c.points.iter())
            .map(|p| self.project(p.co));
        let Some(first) = projected.next() else {
            return;
        };
        let (lo, hi) = projected.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        let size = (hi - lo).max(Vec2::splat(1e-3));
        self.zoom = (0.9 * (rect.height() / size.y).min(rect.width() / size.x)).clamp(0.5, 2000.0);
        let mid = (lo + hi) * 0.5;
        self.pan = egui::vec2(-mid.x * self.zoom, mid.y * self.zoom);
    }

    /// Vertical extent of the stems in the current scene.
    fn tree_height(&self) -> Option<f32> {
        self.scene.bounds().map(|(lo, hi)| hi.z - lo.z)
    }

    /// Screen polyline for one stem, sampling each Bezier segment.
    fn curve_polyline(&self, curve: &SceneCurve, rect: egui::Rect) -> Vec<(egui::Pos2, f32)> {
        let mut line = Vec::with_capacity(curve.points.len() * SEGMENT_SAMPLES);
        for pair in curve.points.windows(2) {
            for i in 0..SEGMENT_SAMPLES {
                let t = i as f32 / SEGMENT_SAMPLES as f32;
                let Ok(p) = bezier::evaluate(t, &pair[0], &pair[1]) else {
                    continue;
                };
                let radius = pair[0].radius + (pair[1].radius - pair[0].radius) * t;
                line.push((self.world_to_screen(self.project(p), rect), radius));
            }
        }
        if let Some(last) = curve.points.last() {
            line.push((self.world_to_screen(self.project(last.co), rect), last.radius));
        }
        line
    }

    fn leaf_shape(&self, mesh: &LeafMesh, color: egui::Color32, rect: egui::Rect) -> egui::Mesh {
        let mut out = egui::Mesh::default();
        for v in &mesh.verts {
            out.colored_vertex(self.world_to_screen(self.project(*v), rect), color);
        }
        for [a, b, c] in &mesh.faces {
            out.add_triangle(*a as u32, *b as u32, *c as u32);
        }
        out
    }

    /// Helper to draw a labeled numeric [`egui::DragValue`].
    fn labeled_drag<N: egui::emath::Numeric>(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut N,
        range: std::ops::RangeInclusive<N>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (build controls and camera).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Regenerate").clicked() {
                    self.regenerate();
                }

                if ui.button("New seed").clicked() {
                    self.seed = rand::rng().random_range(1..=u64::MAX);
                    self.regenerate();
                }

                ui.add(egui::DragValue::new(&mut self.seed).prefix("seed = "));

                ui.separator();
                ui.add(egui::Slider::new(&mut self.yaw, -180.0..=180.0).text("Yaw"));
                ui.add(egui::Slider::new(&mut self.elevation, -90.0..=90.0).text("Elevation"));
                ui.checkbox(&mut self.show_leaves, "Leaves");
                if ui.button("Fit").clicked() {
                    self.fit_pending = true;
                }
            });
        });
    }

    /// Builds the bottom status bar (build counters or the last error).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(err) = &self.error {
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                    return;
                }
                let Some(s) = &self.summary else {
                    return;
                };
                ui.label(format!("blossoms = {}", s.blossoms));
                ui.label(format!("leaves = {}", s.leaves));
                ui.separator();
                ui.label(format!("points = {}", s.curve_points));
                ui.label(format!("curves = {}", s.curves));
                ui.label(format!("stems = {}", s.stems));
                ui.label(format!("trunks = {}", s.trunks));
                ui.separator();
                if let Some(height) = self.tree_height() {
                    ui.label(format!("height = {height:.2}"));
                }
                ui.label(format!("seed = {}", s.seed));
            });
        });
    }

    /// Builds the right-hand panel for species parameters.
    fn ui_params_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("params_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let p = &mut self.params;
                    ui.heading("Species");

                    ui.separator();
                    ui.label("Overall");
                    Self::labeled_drag(ui, "levels:", &mut p.levels, 1..=4, 0.05);
                    Self::labeled_drag(ui, "g_scale:", &mut p.g_scale, 0.1..=100.0, 0.1);
                    Self::labeled_drag(ui, "g_scale_v:", &mut p.g_scale_v, 0.0..=50.0, 0.1);
                    Self::labeled_drag(ui, "ratio:", &mut p.ratio, 0.001..=0.2, 0.001);
                    Self::labeled_drag(ui, "flare:", &mut p.flare, 0.0..=5.0, 0.05);
                    Self::labeled_drag(ui, "floor_splits:", &mut p.floor_splits, 0..=8, 0.05);
                    Self::labeled_drag(ui, "base_splits:", &mut p.base_splits, -4..=4, 0.05);

                    ui.separator();
                    ui.label("Trunk");
                    Self::labeled_drag(ui, "curve_res:", &mut p.curve_res[0], 1..=20, 0.1);
                    Self::labeled_drag(ui, "seg_splits:", &mut p.seg_splits[0], 0.0..=2.0, 0.01);
                    Self::labeled_drag(ui, "split_angle:", &mut p.split_angle[0], 0.0..=90.0, 0.5);
                    Self::labeled_drag(ui, "curve_v:", &mut p.curve_v[0], -90.0..=90.0, 0.5);

                    for level in 1..4 {
                        ui.separator();
                        ui.label(format!("Level {level}"));
                        Self::labeled_drag(ui, "branches:", &mut p.branches[level], -50.0..=200.0, 0.5);
                        Self::labeled_drag(ui, "length:", &mut p.length[level], 0.0..=2.0, 0.01);
                        Self::labeled_drag(ui, "down_angle:", &mut p.down_angle[level], -180.0..=180.0, 0.5);
                        Self::labeled_drag(ui, "rotate:", &mut p.rotate[level], -360.0..=360.0, 0.5);
                        Self::labeled_drag(ui, "curve:", &mut p.curve[level], -180.0..=180.0, 0.5);
                    }

                    ui.separator();
                    ui.label("Leaves");
                    Self::labeled_drag(ui, "leaf_blos_num:", &mut p.leaf_blos_num, -50.0..=200.0, 0.5);
                    Self::labeled_drag(ui, "leaf_shape:", &mut p.leaf_shape, 0..=3, 0.05);
                    Self::labeled_drag(ui, "leaf_scale:", &mut p.leaf_scale, 0.0..=2.0, 0.01);
                    Self::labeled_drag(ui, "leaf_bend:", &mut p.leaf_bend, 0.0..=1.0, 0.01);
                    Self::labeled_drag(ui, "blossom_rate:", &mut p.blossom_rate, 0.0..=1.0, 0.01);
                    Self::labeled_drag(ui, "blossom_scale:", &mut p.blossom_scale, 0.0..=2.0, 0.01);

                    ui.separator();
                    ui.label("Tropism");
                    Self::labeled_drag(ui, "tropism.x:", &mut p.tropism[0], -5.0..=5.0, 0.05);
                    Self::labeled_drag(ui, "tropism.y:", &mut p.tropism[1], -5.0..=5.0, 0.05);
                    Self::labeled_drag(ui, "tropism.z:", &mut p.tropism[2], -5.0..=5.0, 0.05);

                    ui.separator();
                    ui.label("Pruning");
                    Self::labeled_drag(ui, "prune_ratio:", &mut p.prune_ratio, 0.0..=1.0, 0.01);
                    Self::labeled_drag(ui, "prune_width:", &mut p.prune_width, 0.0..=2.0, 0.01);
                    Self::labeled_drag(ui, "prune_width_peak:", &mut p.prune_width_peak, 0.0..=1.0, 0.01);

                    ui.separator();
                    if ui.button("Reset species to default").clicked() {
                        self.params = ParameterSet::default();
                    }
                });
            });
    }

    /// Builds the central panel where the tree is drawn.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            if self.fit_pending {
                self.fit_to(rect);
                self.fit_pending = false;
            }

            // Pan with drag.
            if response.dragged() {
                self.pan += response.drag_delta();
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(0.5, 2000.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            for curve in &self.scene.curves {
                let color = DEPTH_COLORS[curve.depth.min(DEPTH_COLORS.len() - 1)];
                let line = self.curve_polyline(curve, rect);
                for pair in line.windows(2) {
                    let width = (pair[0].1 * 2.0 * self.zoom).max(1.0);
                    painter.line_segment([pair[0].0, pair[1].0], egui::Stroke::new(width, color));
                }
            }

            if self.show_leaves {
                for (pool, color) in LEAF_POOLS {
                    painter.add(egui::Shape::mesh(self.leaf_shape(self.scene.mesh(pool), color, rect)));
                }
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_params_panel(ctx);
        self.ui_central_panel(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rect() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::new(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn world_to_screen_and_back_is_roundtrip() {
        let mut viewer = Viewer::new();
        viewer.zoom = 2.0;
        viewer.pan = egui::vec2(15.0, -7.0);
        let rect = test_rect();

        let eps = 1e-4;
        for p in [Vec2::new(0.0, 0.0), Vec2::new(10.0, -5.0), Vec2::new(-3.5, 8.25)] {
            let back = viewer.screen_to_world(viewer.world_to_screen(p, rect), rect);
            assert!(
                (back - p).length() < eps,
                "roundtrip mismatch: p={p:?}, back={back:?}"
            );
        }
    }

    #[test]
    fn projection_keeps_up_vertical() {
        let mut viewer = Viewer::new();
        viewer.elevation = 0.0;
        viewer.yaw = 0.0;
        let p = viewer.project(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec2::new(1.0, 3.0)).length() < 1e-6);

        viewer.yaw = 90.0;
        let p = viewer.project(Vec3::new(1.0, 0.0, 5.0));
        assert!(p.x.abs() < 1e-6 && (p.y - 5.0).abs() < 1e-6, "{p:?}");
    }

    #[test]
    fn regenerate_with_fixed_seed_is_repeatable() {
        let mut viewer = Viewer::new();
        assert!(viewer.error.is_none());
        let first = viewer.scene.curves.clone();
        assert!(!first.is_empty());

        viewer.regenerate();
        assert_eq!(viewer.scene.curves, first);
        assert_eq!(viewer.summary.map(|s| s.seed), Some(1));
    }

    #[test]
    fn zero_seed_is_replaced_by_the_seed_used() {
        let mut viewer = Viewer::new();
        viewer.seed = 0;
        viewer.regenerate();
        assert_ne!(viewer.seed, 0);
        assert_eq!(viewer.summary.map(|s| s.seed), Some(viewer.seed));
    }

    #[test]
    fn invalid_params_show_an_error_and_empty_scene() {
        let mut viewer = Viewer::new();
        viewer.params.g_scale = 0.0;
        viewer.regenerate();
        assert!(viewer.error.as_deref().is_some_and(|e| e.contains("g_scale")));
        assert!(viewer.summary.is_none());
        assert!(viewer.scene.curves.is_empty());
    }

    #[test]
    fn fit_centers_the_tree() {
        let mut viewer = Viewer::new();
        let rect = test_rect();
        viewer.zoom = 0.5;
        viewer.pan = egui::vec2(500.0, 500.0);
        viewer.fit_to(rect);
        for curve in &viewer.scene.curves {
            for point in &curve.points {
                let screen = viewer.world_to_screen(viewer.project(point.co), rect);
                assert!(rect.contains(screen), "{:?} drawn at {screen:?}", point.co);
            }
        }
    }

    #[test]
    fn tree_height_tracks_the_scene() {
        let mut viewer = Viewer::new();
        viewer.seed = 7;
        viewer.regenerate();
        let height = viewer.tree_height().unwrap();
        let top = viewer.scene.curves[0].points.iter().map(|p| p.co.z).fold(0.0, f32::max);
        assert!(height >= top, "height {height} below trunk top {top}");

        viewer.params.g_scale = 0.0;
        viewer.regenerate();
        assert_eq!(viewer.tree_height(), None);
    }
}
