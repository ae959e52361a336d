use crate::{ray_crosses_segment, Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Polygon(pub Vec<Vec2>);

impl Polygon {
    /// Ray-crossing parity against the horizontal ray through `p`.
    pub fn contains(&self, p: Vec2) -> bool {
        let mut count = 0;
        for i in 0..self.0.len() {
            let p1 = self.0[i];
            let p2 = self.0[(i + 1) % self.0.len()];
            if ray_crosses_segment(p, Vec2::X, p1, p2) {
                count += 1;
            }
        }
        count % 2 != 0
    }

    /// Signed-area test. Screen convention: y grows "down" on the
    /// ground plane, so a positive sum means clockwise.
    pub fn is_clockwise(&self) -> bool {
        let mut sum = 0.0;
        for i in 0..self.0.len() {
            let p1 = self.0[i];
            let p2 = self.0[(i + 1) % self.0.len()];
            sum += (p2.x - p1.x) * (p2.y + p1.y);
        }
        sum > 0.0
    }

    pub fn barycenter(&self) -> Vec2 {
        self.0.iter().copied().sum::<Vec2>() / (self.0.len() as f32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Vec2] {
        self.0.as_slice()
    }
}

/// Per-vertex outward normals, averaged between the two adjacent edges.
fn polygon_normals(polygon: &[Vec3]) -> Vec<Vec3> {
    let flat = Polygon(polygon.iter().map(|p| p.xz()).collect());
    let mult = if flat.is_clockwise() { 1.0 } else { -1.0 };
    let n = polygon.len();
    let mut res = Vec::with_capacity(n);
    for i in 0..n {
        let p0 = polygon[(i + n - 1) % n];
        let p1 = polygon[i];
        let p2 = polygon[(i + 1) % n];
        let n1 = (p2 - p1).cross(Vec3::UP);
        let n2 = (p1 - p0).cross(Vec3::UP);
        res.push(((n1 + n2) * 0.5).normalize() * mult);
    }
    res
}

/// Polygon grown outward by `distance` along averaged edge normals.
pub fn offset_polygon(polygon: &[Vec3], distance: f32) -> Vec<Vec3> {
    polygon_normals(polygon)
        .into_iter()
        .zip(polygon)
        .map(|(n, &p)| p + n * distance)
        .collect()
}

/// Point-in-polygon on the ground plane, for 3D point lists.
pub fn polygon_contains_xz(polygon: &[Vec3], point: Vec3) -> bool {
    Polygon(polygon.iter().map(|p| p.xz()).collect()).contains(point.xz())
}

pub fn polygon_is_clockwise_xz(polygon: &[Vec3]) -> bool {
    Polygon(polygon.iter().map(|p| p.xz()).collect()).is_clockwise()
}

/// Squared distance from `point` to the closest polygon edge.
/// `looped` controls whether the closing edge is considered.
pub fn point_polygon_dist2(point: Vec3, polygon: &[Vec3], looped: bool) -> f32 {
    let p = point.xz();
    let mut min_dist = f32::MAX;
    for i in 0..polygon.len() {
        if !looped && i == 0 {
            continue;
        }
        let i0 = (i + polygon.len() - 1) % polygon.len();
        let d = crate::point_segment_dist2(p, polygon[i0].xz(), polygon[i].xz());
        if d < min_dist {
            min_dist = d;
        }
    }
    min_dist
}
