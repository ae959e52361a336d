mod curve;
mod line;
mod polygon;
mod polyline3;
mod v2;
mod v3;

pub use curve::*;
pub use line::*;
pub use polygon::*;
pub use polyline3::*;
pub use v2::*;
pub use v3::*;

/// Tolerance on squared distances for vector equality tests.
pub const EPSILON: f32 = 1e-4;

pub fn minmax(x: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let mut min: Vec2 = *x.first()?;
    let mut max: Vec2 = min;

    for &v in &x[1..] {
        min = min.min(v);
        max = max.max(v);
    }

    Some((min, max))
}

/// Index of the first point approximately equal to `item`.
pub fn find_vector(list: &[Vec3], item: Vec3) -> Option<usize> {
    list.iter().position(|p| p.approx_eq(item))
}

pub fn triangle_area(v1: Vec3, v2: Vec3, v3: Vec3) -> f32 {
    let a = (v1 - v2).mag();
    let b = (v1 - v3).mag();
    let c = (v2 - v3).mag();
    let s = (a + b + c) * 0.5;
    (s * (s - a) * (s - b) * (s - c)).max(0.0).sqrt()
}

pub fn triangle_normal(v1: Vec3, v2: Vec3, v3: Vec3) -> Vec3 {
    (v2 - v1).cross(v3 - v1).normalize()
}

/// Indices of `points` sorted clockwise around `center` on the ground
/// plane, rotated so that index 0 comes first.
pub fn sort_clockwise(points: &[Vec3], center: Vec3) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    let angle = |i: usize| (points[i] - center).xz().angle_x();
    order.sort_by(|&a, &b| angle(b).total_cmp(&angle(a)));
    if let Some(zero) = order.iter().position(|&i| i == 0) {
        order.rotate_left(zero);
    }
    order
}
