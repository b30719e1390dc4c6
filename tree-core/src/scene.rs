//! In-memory host: keeps every curve and builds leaf meshes into plain
//! vertex/face/UV buffers.

use crate::bezier::CurvePoint;
use crate::leaf::{Leaf, LeafShape};
use crate::sink::{CurveSink, LeafPool, MeshSink, TreeHost};
use crate::types::CurveId;
use glam::{Vec2, Vec3};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneCurve {
    pub depth: usize,
    pub points: Vec<CurvePoint>,
}

/// Triangle mesh holding every instance of one leaf template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LeafMesh {
    pub verts: Vec<Vec3>,
    pub faces: Vec<[usize; 3]>,
    pub uvs: Vec<Vec2>,
    pub instances: usize,
}

impl LeafMesh {
    fn append(&mut self, shape: &LeafShape, leaf: &Leaf, bend: f32) {
        let base = self.verts.len();
        self.verts.extend(leaf.place(shape, bend));
        self.faces
            .extend(shape.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));
        self.uvs.extend_from_slice(&shape.uvs);
        self.instances += 1;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub curves: Vec<SceneCurve>,
    pub leaves: LeafMesh,
    pub blossoms: LeafMesh,
}

impl Scene {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn curve_points(&self) -> usize {
        self.curves.iter().map(|c| c.points.len()).sum()
    }

    /// Axis-aligned bounds of all curve points, or `None` for an empty scene.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.curves.iter().flat_map(|c| c.points.iter().map(|p| p.co));
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    pub fn mesh(&self, pool: LeafPool) -> &LeafMesh {
        match pool {
            LeafPool::Leaves => &self.leaves,
            LeafPool::Blossoms => &self.blossoms,
        }
    }
}

impl CurveSink for Scene {
    fn new_curve(&mut self, depth: usize) -> CurveId {
        self.curves.push(SceneCurve {
            depth,
            points: Vec::new(),
        });
        self.curves.len() - 1
    }

    fn append_points(&mut self, curve: CurveId, points: &[CurvePoint]) {
        if let Some(c) = self.curves.get_mut(curve) {
            c.points.extend_from_slice(points);
        }
    }
}

impl MeshSink for Scene {
    fn build_leaf_mesh(&mut self, pool: LeafPool, shape: &LeafShape, leaves: &[Leaf], bend: f32) {
        let mesh = match pool {
            LeafPool::Leaves => &mut self.leaves,
            LeafPool::Blossoms => &mut self.blossoms,
        };
        for leaf in leaves {
            mesh.append(shape, leaf, bend);
        }
    }
}

impl TreeHost for Scene {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_collect_points_in_order() {
        let mut scene = Scene::default();
        let a = scene.new_curve(0);
        let b = scene.new_curve(1);
        scene.append_points(b, &[CurvePoint::default()]);
        let p = CurvePoint {
            co: Vec3::new(1.0, 2.0, 3.0),
            ..CurvePoint::default()
        };
        scene.append_points(a, &[CurvePoint::default(), p]);

        assert_eq!(scene.curves[a].points.len(), 2);
        assert_eq!(scene.curves[a].points[1].co, p.co);
        assert_eq!(scene.curves[b].depth, 1);
        assert_eq!(scene.curve_points(), 3);
        assert_eq!(scene.bounds(), Some((Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0))));
    }

    #[test]
    fn leaf_mesh_offsets_face_indices_per_instance() {
        let mut scene = Scene::default();
        let shape = LeafShape::leaf(0, 1.0, 0.2, 1.0);
        let leaves = [
            Leaf::new(Vec3::ZERO, Vec3::Z, Vec3::X),
            Leaf::new(Vec3::ONE, Vec3::Z, Vec3::X),
        ];
        scene.build_leaf_mesh(LeafPool::Leaves, &shape, &leaves, 0.0);

        let mesh = scene.mesh(LeafPool::Leaves);
        let n = shape.verts.len();
        assert_eq!(mesh.instances, 2);
        assert_eq!(mesh.verts.len(), 2 * n);
        assert_eq!(mesh.uvs.len(), 2 * n);
        assert_eq!(mesh.faces[shape.faces.len()][0], n);
        assert!(scene.blossoms.verts.is_empty());
    }

    #[test]
    fn default_render_is_a_no_op() {
        let mut scene = Scene::default();
        assert!(scene.render(None).is_ok());
        assert!(scene.bounds().is_none());
    }
}
