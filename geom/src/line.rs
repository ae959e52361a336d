use crate::{vec3, Vec2, Vec3};

/// Intersection of the two infinite lines (p1a, p1b) and (p2a, p2b) on
/// the ground plane. Parallel lines have no well-defined intersection:
/// the midpoint of the two first points is returned instead so callers
/// always get a usable control point.
pub fn line_intersection(p1a: Vec3, p1b: Vec3, p2a: Vec3, p2b: Vec3) -> Vec3 {
    let a1 = p1b.z - p1a.z;
    let b1 = p1a.x - p1b.x;
    let c1 = a1 * p1a.x + b1 * p1a.z;

    let a2 = p2b.z - p2a.z;
    let b2 = p2a.x - p2b.x;
    let c2 = a2 * p2a.x + b2 * p2a.z;

    let delta = a1 * b2 - a2 * b1;
    if delta == 0.0 {
        return (p1a + p2a) * 0.5;
    }

    let x = (b2 * c1 - b1 * c2) / delta;
    let z = (a1 * c2 - a2 * c1) / delta;
    vec3(x, (p1b.y + p2b.y) * 0.5, z)
}

/// Segment-segment intersection test, endpoints included.
pub fn segment_intersection(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<Vec2> {
    let d = (p2 - p1).perp_dot(p4 - p3);
    if d == 0.0 {
        return None;
    }
    let u = (p3 - p1).perp_dot(p4 - p3) / d;
    let v = (p3 - p1).perp_dot(p2 - p1) / d;
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
        return None;
    }
    Some(p1 + (p2 - p1) * u)
}

/// Does the ray from `point` along `dir` cross the segment (p1, p2)?
/// The far endpoint is excluded so consecutive polygon segments are
/// not counted twice when the ray grazes a shared vertex.
pub fn ray_crosses_segment(point: Vec2, dir: Vec2, p1: Vec2, p2: Vec2) -> bool {
    let v1 = point - p1;
    let v2 = p2 - p1;
    let v3 = dir.perpendicular();
    let dot = v2.dot(v3);
    if dot.abs() < crate::EPSILON {
        return false;
    }
    let t1 = v2.perp_dot(v1) / dot;
    let t2 = v1.dot(v3) / dot;
    t1 >= 0.0 && t2 >= 0.0 && t2 < 1.0
}

/// Parameter of the closest point on segment (a, b), clamped to [0, 1].
pub fn closest_point_factor(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let l2 = (b - a).mag2();
    if l2 == 0.0 {
        return 0.0;
    }
    ((point - a).dot(b - a) / l2).clamp(0.0, 1.0)
}

/// Closest point to `point` on segment (a, b).
pub fn closest_point(point: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    a + (b - a) * closest_point_factor(point, a, b)
}

pub fn point_segment_dist2(p: Vec2, s0: Vec2, s1: Vec2) -> f32 {
    let l2 = s0.distance2(s1);
    if l2 == 0.0 {
        return p.distance2(s0);
    }
    let t = ((p - s0).dot(s1 - s0) / l2).clamp(0.0, 1.0);
    p.distance2(s0 + (s1 - s0) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec2;

    #[test]
    fn crossing_lines() {
        let inter = line_intersection(
            vec3(-1.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 0.0, -1.0),
            vec3(0.0, 0.0, 1.0),
        );
        assert!(inter.approx_eq(Vec3::ZERO));
    }

    #[test]
    fn parallel_lines_fall_back_to_midpoint() {
        let inter = line_intersection(
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 0.0, 2.0),
            vec3(1.0, 0.0, 2.0),
        );
        assert!(inter.approx_eq(vec3(0.0, 0.0, 1.0)));
    }

    #[test]
    fn segments_touching_at_endpoint() {
        let i = segment_intersection(
            vec2(0.0, 0.0),
            vec2(1.0, 0.0),
            vec2(1.0, 0.0),
            vec2(1.0, 1.0),
        );
        assert_eq!(i, Some(vec2(1.0, 0.0)));
    }

    #[test]
    fn disjoint_segments() {
        let i = segment_intersection(
            vec2(0.0, 0.0),
            vec2(1.0, 0.0),
            vec2(0.0, 1.0),
            vec2(1.0, 1.0),
        );
        assert_eq!(i, None);
    }
}
