//! Great-circle interpolation
//!
//! Points are produced by rotating the start vector about the normalized
//! `from × to` axis, so every output stays on the unit sphere.

use facet_core::math::{Quat, Vec3};

/// Points along the great-circle arc from `from` to `to`, both unit vectors.
///
/// Returns `segments + 1` points: `from`, the evenly spaced interior points, then `to`.
/// With zero segments only `from` is returned.
pub fn geodesic(from: Vec3, to: Vec3, segments: usize) -> Vec<Vec3> {
    let mut points = Vec::with_capacity(segments + 1);
    geodesic_into(&mut points, from, to, segments);
    points
}

/// Same as [`geodesic`], appending into an existing buffer.
pub fn geodesic_into(dst: &mut Vec<Vec3>, from: Vec3, to: Vec3, segments: usize) {
    dst.push(from);
    if segments == 0 {
        return;
    }

    let angle = from.dot(to).clamp(-1.0, 1.0).acos();
    // Antipodal endpoints have no unique arc; any perpendicular axis is a valid one.
    let axis = from
        .cross(to)
        .try_normalize()
        .unwrap_or_else(|| from.any_orthonormal_vector());
    let step = angle / segments as f32;

    for i in 1..segments {
        dst.push(Quat::from_axis_angle(axis, step * i as f32) * from);
    }
    dst.push(to);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unit(points: &[Vec3]) {
        for point in points {
            assert!(
                (point.length() - 1.0).abs() < 1.0e-5,
                "point {point} is not unit length"
            );
        }
    }

    #[test]
    fn test_zero_segments() {
        let points = geodesic(Vec3::X, Vec3::Y, 0);
        assert_eq!(points, vec![Vec3::X]);
    }

    #[test]
    fn test_endpoints_and_count() {
        let points = geodesic(Vec3::Z, Vec3::X, 8);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], Vec3::Z);
        assert_eq!(points[8], Vec3::X);
        assert_unit(&points);
    }

    #[test]
    fn test_midpoint() {
        let points = geodesic(Vec3::X, Vec3::Y, 2);
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!(points[1].distance(expected) < 1.0e-6);
    }

    #[test]
    fn test_even_spacing() {
        let points = geodesic(Vec3::Y, Vec3::new(0.6, 0.0, 0.8), 5);
        let first = points[0].angle_between(points[1]);
        for pair in points.windows(2) {
            assert!((pair[0].angle_between(pair[1]) - first).abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_unit_length_for_arbitrary_arcs() {
        let pairs = [
            (Vec3::new(1.0, 2.0, 3.0).normalize(), Vec3::new(-3.0, 0.5, 1.0).normalize()),
            (Vec3::new(0.0, 0.1, 1.0).normalize(), Vec3::new(0.0, 1.0, 0.1).normalize()),
            (Vec3::X, Vec3::NEG_X),
            (Vec3::Y, Vec3::Y),
        ];
        for (from, to) in pairs {
            assert_unit(&geodesic(from, to, 16));
        }
    }

    #[test]
    fn test_appends() {
        let mut points = vec![Vec3::ZERO];
        geodesic_into(&mut points, Vec3::X, Vec3::Z, 3);
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], Vec3::ZERO);
        assert_eq!(points[1], Vec3::X);
    }
}
