//! 3-D turtle used to trace stem curves.
//!
//! A [`Turtle`] carries a position and an orientation frame made of a unit
//! heading (`dir`) and a unit `right` vector perpendicular to it. All angles
//! taken by the rotation methods are in degrees.

use glam::{Quat, Vec3};

/// Strength multiplier applied to the tropism cross product, in degrees.
const TROPISM_STRENGTH: f32 = 10.0;

/// Position/orientation cursor.
///
/// `dir` and `right` are kept unit length and mutually perpendicular after
/// every rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Turtle {
    pub pos: Vec3,
    pub dir: Vec3,
    pub right: Vec3,
    pub width: f32,
}

impl Default for Turtle {
    /// A turtle at the origin facing up (+Z) with `right` along +X.
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            dir: Vec3::Z,
            right: Vec3::X,
            width: 0.0,
        }
    }
}

impl Turtle {
    /// Creates a turtle from a position and a (not necessarily orthonormal)
    /// frame. The frame is orthonormalized with `dir` taking precedence.
    pub fn new(pos: Vec3, dir: Vec3, right: Vec3) -> Self {
        let mut turtle = Self {
            pos,
            dir,
            right,
            width: 0.0,
        };
        turtle.orthonormalize();
        turtle
    }

    /// Turns right about the axis perpendicular to both `dir` and `right`.
    pub fn turn_right(&mut self, angle: f32) {
        let axis = self.dir.cross(self.right).normalize_or_zero();
        if axis == Vec3::ZERO {
            return;
        }
        let rot = Quat::from_axis_angle(axis, angle.to_radians());
        self.dir = rot * self.dir;
        self.right = rot * self.right;
        self.orthonormalize();
    }

    pub fn turn_left(&mut self, angle: f32) {
        self.turn_right(-angle);
    }

    /// Pitches the heading up about the `right` axis.
    pub fn pitch_up(&mut self, angle: f32) {
        let rot = Quat::from_axis_angle(self.right, angle.to_radians());
        self.dir = rot * self.dir;
        self.orthonormalize();
    }

    pub fn pitch_down(&mut self, angle: f32) {
        self.pitch_up(-angle);
    }

    /// Rolls the `right` vector about the heading.
    pub fn roll_right(&mut self, angle: f32) {
        let rot = Quat::from_axis_angle(self.dir, angle.to_radians());
        self.right = rot * self.right;
        self.orthonormalize();
    }

    pub fn roll_left(&mut self, angle: f32) {
        self.roll_right(-angle);
    }

    /// Rotates the whole frame about the world vertical axis.
    pub fn spin(&mut self, angle: f32) {
        let rot = Quat::from_rotation_z(angle.to_radians());
        self.dir = rot * self.dir;
        self.right = rot * self.right;
        self.orthonormalize();
    }

    pub fn move_by(&mut self, distance: f32) {
        self.pos += self.dir * distance;
    }

    /// Bends the heading toward `tropism`.
    ///
    /// The rotation angle is proportional to the magnitude of
    /// `dir × tropism`, so stems already aligned with the tropism vector are
    /// left untouched.
    pub fn apply_tropism(&mut self, tropism: Vec3) {
        let h_cross_t = self.dir.cross(tropism);
        let magnitude = h_cross_t.length();
        if magnitude <= f32::EPSILON {
            return;
        }
        let alpha = TROPISM_STRENGTH * magnitude;
        let rot = Quat::from_axis_angle(h_cross_t / magnitude, alpha.to_radians());
        self.dir = rot * self.dir;
        self.right = rot * self.right;
        self.orthonormalize();
    }

    /// Renormalizes `dir` and re-projects `right` so it stays perpendicular.
    fn orthonormalize(&mut self) {
        self.dir = self.dir.normalize_or(Vec3::Z);
        let right = self.right - self.dir * self.dir.dot(self.right);
        self.right = right.normalize_or(self.dir.any_orthonormal_vector());
    }
}

/// Angle in degrees between `v` and the world +Z axis.
pub fn declination(v: Vec3) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt().atan2(v.z).to_degrees()
}
