//! Shape generation for 2D primitives
//!
//! Outlines are returned as point lists; surfaces fill them as polygons.

use glam::Vec2;
use std::f32::consts::PI;

/// Points of a regular polygon, first vertex at `rotation` radians
pub fn regular_polygon(center: Vec2, radius: f32, sides: u32, rotation: f32) -> Vec<Vec2> {
    let sides = sides.max(3);
    (0..sides)
        .map(|i| {
            let theta = rotation + (i as f32 / sides as f32) * 2.0 * PI;
            center + Vec2::new(theta.cos(), theta.sin()) * radius
        })
        .collect()
}

/// Upward-pointing triangle inscribed in a `size` square centred on `center`
pub fn triangle(center: Vec2, size: f32) -> Vec<Vec2> {
    let half = size / 2.0;
    vec![
        Vec2::new(center.x, center.y - half),
        Vec2::new(center.x + half, center.y + half),
        Vec2::new(center.x - half, center.y + half),
    ]
}

/// Star outline alternating between outer and inner radius
pub fn star(center: Vec2, outer_radius: f32, inner_radius: f32, points: u32) -> Vec<Vec2> {
    let points = points.max(2);
    let steps = points * 2;
    (0..steps)
        .map(|i| {
            // Start at the top (screen y grows downward)
            let theta = -PI / 2.0 + (i as f32 / steps as f32) * 2.0 * PI;
            let r = if i % 2 == 0 { outer_radius } else { inner_radius };
            center + Vec2::new(theta.cos(), theta.sin()) * r
        })
        .collect()
}

/// Interpolate between two colours
pub fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let t = t.clamp(0.0, 1.0);
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_alternates_radii() {
        let pts = star(Vec2::ZERO, 20.0, 8.0, 5);
        assert_eq!(pts.len(), 10);
        assert!((pts[0].length() - 20.0).abs() < 1e-4);
        assert!((pts[1].length() - 8.0).abs() < 1e-4);
        // First point is straight up
        assert!(pts[0].y < 0.0 && pts[0].x.abs() < 1e-4);
    }

    #[test]
    fn test_triangle_fits_square() {
        let pts = triangle(Vec2::new(10.0, 10.0), 20.0);
        for p in pts {
            assert!((0.0..=20.0).contains(&p.x));
            assert!((0.0..=20.0).contains(&p.y));
        }
    }

    #[test]
    fn test_polygon_minimum_sides() {
        assert_eq!(regular_polygon(Vec2::ZERO, 1.0, 1, 0.0).len(), 3);
    }

    #[test]
    fn test_mix_endpoints() {
        let a = [0.0, 0.0, 0.0, 1.0];
        let b = [1.0, 0.5, 0.25, 1.0];
        assert_eq!(mix(a, b, 0.0), a);
        assert_eq!(mix(a, b, 2.0), b);
    }
}
