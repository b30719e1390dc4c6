//! Cubic Bezier evaluation between two consecutive curve points.

use crate::error::{GenError, GenResult};
use glam::Vec3;

/// One control point of a stem curve.
///
/// `handle_left` and `handle_right` are absolute positions; the segment
/// between two points `a` and `b` is the cubic Bezier
/// `a.co, a.handle_right, b.handle_left, b.co`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CurvePoint {
    pub co: Vec3,
    pub handle_left: Vec3,
    pub handle_right: Vec3,
    pub radius: f32,
}

impl CurvePoint {
    /// A point at `co` whose handles extend `handle` on either side.
    pub fn with_handles(co: Vec3, handle: Vec3) -> Self {
        Self {
            co,
            handle_left: co - handle,
            handle_right: co + handle,
            radius: 0.0,
        }
    }

    /// Shrinks the left handle toward `co` by `factor`.
    pub fn scale_left_handle(&mut self, factor: f32) {
        self.handle_left = self.co + (self.handle_left - self.co) / factor;
    }

    /// Shrinks the right handle toward `co` by `factor`.
    pub fn scale_right_handle(&mut self, factor: f32) {
        self.handle_right = self.co + (self.handle_right - self.co) / factor;
    }
}

fn check_offset(offset: f32) -> GenResult<()> {
    if (0.0..=1.0).contains(&offset) {
        Ok(())
    } else {
        Err(GenError::BezierOffset { offset })
    }
}

/// Point on the segment from `start` to `end` at parameter `offset`.
///
/// ### Errors
/// [`GenError::BezierOffset`] if `offset` is outside `[0, 1]`.
pub fn evaluate(offset: f32, start: &CurvePoint, end: &CurvePoint) -> GenResult<Vec3> {
    check_offset(offset)?;
    let t = offset;
    let u = 1.0 - t;
    Ok(u * u * u * start.co
        + 3.0 * u * u * t * start.handle_right
        + 3.0 * u * t * t * end.handle_left
        + t * t * t * end.co)
}

/// Unnormalized derivative of [`evaluate`] with respect to `offset`.
///
/// ### Errors
/// [`GenError::BezierOffset`] if `offset` is outside `[0, 1]`.
pub fn tangent(offset: f32, start: &CurvePoint, end: &CurvePoint) -> GenResult<Vec3> {
    check_offset(offset)?;
    let t = offset;
    let u = 1.0 - t;
    Ok(3.0 * u * u * (start.handle_right - start.co)
        + 6.0 * u * t * (end.handle_left - start.handle_right)
        + 3.0 * t * t * (end.co - end.handle_left))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> (CurvePoint, CurvePoint) {
        let a = CurvePoint {
            co: Vec3::new(0.0, 0.0, 0.0),
            handle_left: Vec3::new(-0.5, 0.0, -1.0),
            handle_right: Vec3::new(0.5, 0.0, 1.0),
            radius: 1.0,
        };
        let b = CurvePoint {
            co: Vec3::new(2.0, 1.0, 3.0),
            handle_left: Vec3::new(1.0, 1.5, 2.0),
            handle_right: Vec3::new(3.0, 0.5, 4.0),
            radius: 0.5,
        };
        (a, b)
    }

    #[test]
    fn evaluate_hits_endpoints() {
        let (a, b) = segment();
        assert_eq!(evaluate(0.0, &a, &b).unwrap(), a.co);
        assert!((evaluate(1.0, &a, &b).unwrap() - b.co).length() < 1e-6);
    }

    #[test]
    fn tangent_matches_finite_difference() {
        let (a, b) = segment();
        let eps = 1e-3;
        for i in 1..10 {
            let t = i as f32 / 10.0;
            let fd = (evaluate(t + eps, &a, &b).unwrap() - evaluate(t - eps, &a, &b).unwrap())
                / (2.0 * eps);
            let an = tangent(t, &a, &b).unwrap();
            assert!(
                (fd - an).length() < 1e-2,
                "t={t}: finite difference {fd:?} vs analytic {an:?}"
            );
        }
    }

    #[test]
    fn tangent_at_ends_follows_handles() {
        let (a, b) = segment();
        let start = tangent(0.0, &a, &b).unwrap();
        assert!((start - 3.0 * (a.handle_right - a.co)).length() < 1e-6);
        let end = tangent(1.0, &a, &b).unwrap();
        assert!((end - 3.0 * (b.co - b.handle_left)).length() < 1e-6);
    }

    #[test]
    fn out_of_range_offset_is_an_error() {
        let (a, b) = segment();
        assert!(matches!(
            evaluate(1.5, &a, &b),
            Err(GenError::BezierOffset { .. })
        ));
        assert!(matches!(
            tangent(-0.1, &a, &b),
            Err(GenError::BezierOffset { .. })
        ));
    }

    #[test]
    fn scaling_handles_keeps_direction() {
        let mut p = CurvePoint::with_handles(Vec3::ONE, Vec3::new(0.0, 0.0, 3.0));
        p.scale_left_handle(3.0);
        p.scale_right_handle(3.0);
        assert_eq!(p.handle_left, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(p.handle_right, Vec3::new(1.0, 1.0, 2.0));
    }
}
