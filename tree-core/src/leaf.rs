//! Leaf placements and the polygon templates instanced at each of them.

use glam::{Quat, Vec2, Vec3};

/// Placement of one leaf or blossom.
///
/// `dir` points along the leaf blade and `right` across it; the blade's
/// face normal is `right × dir`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leaf {
    pub pos: Vec3,
    pub dir: Vec3,
    pub right: Vec3,
}

impl Leaf {
    pub fn new(pos: Vec3, dir: Vec3, right: Vec3) -> Self {
        Self { pos, dir, right }
    }

    pub fn normal(&self) -> Vec3 {
        self.right.cross(self.dir).normalize_or(Vec3::Z)
    }

    /// Blade frame `(dir, right)` after turning the face normal toward +Z
    /// by the fraction `bend` of the angle between them.
    pub fn bent_frame(&self, bend: f32) -> (Vec3, Vec3) {
        let normal = self.normal();
        let axis = normal.cross(Vec3::Z);
        if bend <= 0.0 || axis.length_squared() < 1e-12 {
            return (self.dir, self.right);
        }
        let angle = normal.angle_between(Vec3::Z) * bend.min(1.0);
        let rot = Quat::from_axis_angle(axis.normalize(), angle);
        ((rot * self.dir).normalize(), (rot * self.right).normalize())
    }

    /// World-space vertices of `shape` instanced at this leaf.
    pub fn place(&self, shape: &LeafShape, bend: f32) -> Vec<Vec3> {
        let (dir, right) = self.bent_frame(bend);
        let normal = right.cross(dir);
        shape
            .verts
            .iter()
            .map(|v| self.pos + right * v.x + dir * v.y + normal * v.z)
            .collect()
    }
}

/// Polygon template in leaf-local coordinates: `x` across the blade, `y`
/// along it, `z` out of the face.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafShape {
    pub verts: Vec<Vec3>,
    pub faces: Vec<[usize; 3]>,
    /// One per vertex; empty when the template carries no UVs.
    pub uvs: Vec<Vec2>,
}

impl LeafShape {
    /// Leaf template for `kind`: 0 ovate, 1 linear, 2 cordate, 3 palmate.
    /// Unknown kinds fall back to ovate.
    ///
    /// `tree_ratio` is the current tree scale over the species scale.
    pub fn leaf(kind: u32, tree_ratio: f32, scale: f32, scale_x: f32) -> Self {
        let outline = match kind {
            1 => vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(0.08, 0.1),
                Vec2::new(0.08, 0.9),
                Vec2::new(0.0, 1.0),
                Vec2::new(-0.08, 0.9),
                Vec2::new(-0.08, 0.1),
            ],
            2 => vec![
                Vec2::new(0.0, 0.1),
                Vec2::new(0.25, 0.0),
                Vec2::new(0.45, 0.2),
                Vec2::new(0.4, 0.5),
                Vec2::new(0.2, 0.8),
                Vec2::new(0.0, 1.0),
                Vec2::new(-0.2, 0.8),
                Vec2::new(-0.4, 0.5),
                Vec2::new(-0.45, 0.2),
                Vec2::new(-0.25, 0.0),
            ],
            3 => star(Vec2::new(0.0, 0.5), 5, 0.5, 0.22),
            _ => vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(0.35, 0.2),
                Vec2::new(0.4, 0.5),
                Vec2::new(0.25, 0.8),
                Vec2::new(0.0, 1.0),
                Vec2::new(-0.25, 0.8),
                Vec2::new(-0.4, 0.5),
                Vec2::new(-0.35, 0.2),
            ],
        };
        let center = Vec2::new(0.0, 0.5);
        Self::from_outline(center, &outline, scale * tree_ratio, scale_x)
    }

    /// Blossom template for `kind`: 2 disc, anything else five petals.
    pub fn blossom(kind: u32, tree_ratio: f32, scale: f32) -> Self {
        let center = Vec2::ZERO;
        let outline = match kind {
            2 => star(center, 6, 0.5, 0.5),
            _ => star(center, 5, 0.5, 0.15),
        };
        Self::from_outline(center, &outline, scale * tree_ratio, 1.0)
    }

    /// Fans triangles from `center` to a star-shaped outline and scales
    /// the result; UVs span the unscaled bounding box.
    fn from_outline(center: Vec2, outline: &[Vec2], scale: f32, scale_x: f32) -> Self {
        let mut points = Vec::with_capacity(outline.len() + 1);
        points.push(center);
        points.extend_from_slice(outline);

        let min = points.iter().fold(Vec2::splat(f32::MAX), |a, p| a.min(*p));
        let max = points.iter().fold(Vec2::splat(f32::MIN), |a, p| a.max(*p));
        let size = (max - min).max(Vec2::splat(f32::EPSILON));
        let uvs = points.iter().map(|p| (*p - min) / size).collect();

        let verts = points
            .iter()
            .map(|p| Vec3::new(p.x * scale * scale_x, p.y * scale, 0.0))
            .collect();

        let n = outline.len();
        let faces = (1..=n).map(|i| [0, i, i % n + 1]).collect();

        Self { verts, faces, uvs }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Outline alternating between `outer` and `inner` radius, `lobes` times,
/// starting straight up from `center`.
fn star(center: Vec2, lobes: usize, outer: f32, inner: f32) -> Vec<Vec2> {
    let steps = lobes * 2;
    (0..steps)
        .map(|i| {
            let angle = std::f32::consts::FRAC_PI_2 + i as f32 * std::f32::consts::TAU / steps as f32;
            let r = if i % 2 == 0 { outer } else { inner };
            center + r * Vec2::new(angle.cos(), angle.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_closed_fans_with_uvs() {
        for kind in 0..5 {
            let shape = LeafShape::leaf(kind, 1.0, 0.2, 1.0);
            assert_eq!(shape.uvs.len(), shape.verts.len());
            assert_eq!(shape.faces.len(), shape.verts.len() - 1);
            for face in &shape.faces {
                assert!(face.iter().all(|&i| i < shape.verts.len()));
            }
            for uv in &shape.uvs {
                assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
            }
        }
        assert!(!LeafShape::blossom(1, 1.0, 0.1).is_empty());
    }

    #[test]
    fn template_scales_with_tree_and_width() {
        let base = LeafShape::leaf(0, 1.0, 1.0, 1.0);
        let scaled = LeafShape::leaf(0, 2.0, 0.5, 3.0);
        for (a, b) in base.verts.iter().zip(&scaled.verts) {
            assert!((b.y - a.y).abs() < 1e-6);
            assert!((b.x - 3.0 * a.x).abs() < 1e-6);
        }
    }

    #[test]
    fn full_bend_faces_leaf_upward() {
        let leaf = Leaf::new(Vec3::ZERO, Vec3::Z, Vec3::X);
        assert!(leaf.normal().dot(Vec3::Z).abs() < 1e-6);

        let (dir, right) = leaf.bent_frame(1.0);
        let normal = right.cross(dir);
        assert!((normal - Vec3::Z).length() < 1e-4, "normal {normal}");

        let (dir, right) = leaf.bent_frame(0.0);
        assert_eq!((dir, right), (leaf.dir, leaf.right));
    }

    #[test]
    fn partial_bend_moves_normal_part_way() {
        let leaf = Leaf::new(Vec3::ZERO, Vec3::Z, Vec3::X);
        let (dir, right) = leaf.bent_frame(0.5);
        let angle = right.cross(dir).angle_between(Vec3::Z);
        assert!((angle - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn place_translates_template_to_leaf_position() {
        let leaf = Leaf::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, Vec3::X);
        let shape = LeafShape::leaf(1, 1.0, 1.0, 1.0);
        let verts = leaf.place(&shape, 0.0);
        assert_eq!(verts.len(), shape.verts.len());
        // The linear template's center sits half a blade up the midrib.
        assert!((verts[0] - Vec3::new(1.0, 2.5, 3.0)).length() < 1e-6);
    }
}
