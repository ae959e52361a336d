use crate::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    #[default]
    Bezier,
    Hermite,
    LowPoly,
}

/// Samples the curve defined by `start`, `controls` and `end`.
///
/// - Bezier: de Casteljau over the full control polygon, any order.
/// - Hermite: piecewise cubic through the control points. `tension`
///   scales the tangents; `subdivide_equally` re-parameterizes alpha
///   proportionally to segment arc length instead of uniformly.
/// - LowPoly: no interpolation, returns the control point at `index`
///   (clamped).
///
/// A degenerate curve (start ~ end) always returns `start`.
pub fn point_on_curve(
    start: Vec3,
    controls: &[Vec3],
    end: Vec3,
    alpha: f32,
    index: usize,
    kind: CurveKind,
    tension: f32,
    subdivide_equally: bool,
) -> Vec3 {
    if start.approx_eq(end) {
        return start;
    }
    let mut points = Vec::with_capacity(controls.len() + 2);
    points.push(start);
    points.extend_from_slice(controls);
    points.push(end);

    match kind {
        CurveKind::Bezier => {
            while points.len() > 1 {
                for i in 0..points.len() - 1 {
                    points[i] = points[i] + (points[i + 1] - points[i]) * alpha;
                }
                points.pop();
            }
            points[0]
        }
        CurveKind::Hermite => hermite(&points, start, end, alpha, tension, subdivide_equally),
        CurveKind::LowPoly => points[index.min(points.len() - 1)],
    }
}

fn hermite(
    points: &[Vec3],
    start: Vec3,
    end: Vec3,
    mut alpha: f32,
    tension: f32,
    subdivide_equally: bool,
) -> Vec3 {
    let segment_count = points.len() - 1;
    let factor = 1.0 / segment_count as f32;

    let mut factors = Vec::new();
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut max = 1.0;
    if subdivide_equally {
        max = 0.0;
        for i in 0..segment_count {
            let f = (points[i + 1] - points[i]).mag();
            factors.push(f);
            starts.push(max);
            max += f;
            ends.push(max);
        }
        alpha *= max;
    }

    for i in 0..segment_count {
        let (start_i, end_i, factor_i) = if subdivide_equally {
            (starts[i], ends[i], factors[i])
        } else {
            (
                i as f32 / segment_count as f32,
                (i + 1) as f32 / segment_count as f32,
                factor,
            )
        };
        let matched = (alpha <= 0.0 && i == 0)
            || (alpha >= max && i == segment_count - 1)
            || (alpha >= start_i && alpha < end_i);
        if !matched {
            continue;
        }

        let a = (alpha - start_i) / factor_i;
        let a2 = a * a;
        let a3 = a2 * a;

        let p0 = if i < 1 { start } else { points[i - 1] };
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = if i + 2 > segment_count { end } else { points[i + 2] };

        let t1 = (p2 - p0) * tension;
        let t2 = (p3 - p1) * tension;

        let b1 = 2.0 * a3 - 3.0 * a2 + 1.0;
        let b2 = -2.0 * a3 + 3.0 * a2;
        let b3 = a3 - 2.0 * a2 + a;
        let b4 = a3 - a2;

        let res = p1 * b1 + p2 * b2 + t1 * b3 + t2 * b4;
        if !res.is_finite() {
            return Vec3::ZERO;
        }
        return res;
    }
    Vec3::ZERO
}

/// Averages each interior point with a symmetric window of `iterations`
/// neighbors on each side, reflecting the window across the path ends.
/// The first and last points never move.
pub fn low_pass_filter(points: &[Vec3], iterations: usize, segments: usize) -> Vec<Vec3> {
    let iterations = iterations.min(segments) as isize;
    let mut res = points.to_vec();
    if segments < 2 {
        return res;
    }
    for i in 1..segments as isize - 1 {
        let mut p = Vec3::ZERO;
        let lpf_start = i - iterations;
        let lpf_end = i + iterations;
        let div = (lpf_end - lpf_start + 1) as f32;
        for j in lpf_start..=lpf_end {
            if j < 0 {
                let first = points[0];
                let next = points[(-j) as usize];
                p += first - (next - first);
            } else if j >= segments as isize {
                let last_i = segments - 1;
                let last = points[last_i];
                let next = points[last_i - (j as usize - last_i)];
                p += last + (last - next);
            } else {
                p += points[j as usize];
            }
        }
        res[i as usize] = p / div;
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    #[test]
    fn bezier_hits_endpoints_exactly() {
        let start = vec3(0.0, 0.0, 0.0);
        let end = vec3(10.0, 0.0, 0.0);
        let controls = [vec3(3.0, 5.0, 0.0)];
        let p0 = point_on_curve(start, &controls, end, 0.0, 0, CurveKind::Bezier, 0.5, false);
        let p1 = point_on_curve(start, &controls, end, 1.0, 0, CurveKind::Bezier, 0.5, false);
        assert_eq!(p0, start);
        assert_eq!(p1, end);
    }

    #[test]
    fn hermite_hits_endpoints_exactly() {
        let start = vec3(0.0, 0.0, 0.0);
        let end = vec3(10.0, 0.0, 4.0);
        let controls = [vec3(5.0, 2.0, 0.0)];
        let p0 = point_on_curve(start, &controls, end, 0.0, 0, CurveKind::Hermite, 0.5, false);
        let p1 = point_on_curve(start, &controls, end, 1.0, 0, CurveKind::Hermite, 0.5, false);
        assert!(p0.approx_eq(start));
        assert!(p1.approx_eq(end));
    }

    #[test]
    fn bezier_stays_in_control_hull() {
        let start = vec3(0.0, 0.0, 0.0);
        let end = vec3(10.0, 0.0, 0.0);
        let controls = [vec3(2.0, 4.0, 0.0), vec3(8.0, 4.0, 0.0)];
        for k in 0..=20 {
            let p = point_on_curve(
                start,
                &controls,
                end,
                k as f32 / 20.0,
                0,
                CurveKind::Bezier,
                0.5,
                false,
            );
            assert!(p.x >= 0.0 && p.x <= 10.0);
            assert!(p.y >= 0.0 && p.y <= 4.0);
            assert_eq!(p.z, 0.0);
        }
    }

    #[test]
    fn low_poly_indexes_controls() {
        let start = vec3(0.0, 0.0, 0.0);
        let end = vec3(3.0, 0.0, 0.0);
        let controls = [vec3(1.0, 1.0, 0.0), vec3(2.0, 1.0, 0.0)];
        let p = point_on_curve(start, &controls, end, 0.0, 1, CurveKind::LowPoly, 0.5, false);
        assert_eq!(p, controls[0]);
        let p = point_on_curve(start, &controls, end, 0.0, 99, CurveKind::LowPoly, 0.5, false);
        assert_eq!(p, end);
    }

    #[test]
    fn degenerate_curve_returns_start() {
        let p = vec3(1.0, 2.0, 3.0);
        let r = point_on_curve(p, &[], p, 0.7, 0, CurveKind::Bezier, 0.5, false);
        assert_eq!(r, p);
    }

    #[test]
    fn low_pass_keeps_ends() {
        let pts = vec![
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 5.0, 0.0),
            vec3(2.0, 0.0, 0.0),
            vec3(3.0, 5.0, 0.0),
            vec3(4.0, 0.0, 0.0),
        ];
        let f = low_pass_filter(&pts, 1, pts.len());
        assert_eq!(f[0], pts[0]);
        assert_eq!(f[4], pts[4]);
        assert!(f[2].y > 0.0); // smoothed toward its neighbors
    }

    use quickcheck::{Arbitrary, Gen, TestResult};

    #[derive(Debug, Copy, Clone)]
    struct Coord(f32);

    impl Arbitrary for Coord {
        fn arbitrary(g: &mut Gen) -> Self {
            let v = <i32 as Arbitrary>::arbitrary(g);
            Coord((v % 1000) as f32 * 0.1)
        }
    }

    fn pts(raw: &[(Coord, Coord, Coord)]) -> Vec<Vec3> {
        raw.iter().map(|&(x, y, z)| vec3(x.0, y.0, z.0)).collect()
    }

    #[test]
    fn quickcheck_bezier_endpoints_and_hull() {
        let mut q = quickcheck::QuickCheck::new().tests(200);
        q.quickcheck(
            (|raw: Vec<(Coord, Coord, Coord)>, a: u8| -> TestResult {
                let p = pts(&raw);
                if p.len() < 2 {
                    return TestResult::discard();
                }
                let (start, end) = (p[0], p[p.len() - 1]);
                let controls = &p[1..p.len() - 1];
                let at = |alpha: f32| {
                    point_on_curve(start, controls, end, alpha, 0, CurveKind::Bezier, 0.5, false)
                };
                if start.approx_eq(end) {
                    return TestResult::from_bool(at(0.5) == start);
                }
                if !(at(0.0).approx_eq(start) && at(1.0).approx_eq(end)) {
                    return TestResult::failed();
                }
                let (min, max) = p.iter().fold((p[0], p[0]), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
                let s = at(a as f32 / 255.0);
                let eps = 1e-2;
                TestResult::from_bool(
                    s.x >= min.x - eps
                        && s.y >= min.y - eps
                        && s.z >= min.z - eps
                        && s.x <= max.x + eps
                        && s.y <= max.y + eps
                        && s.z <= max.z + eps,
                )
            }) as fn(Vec<(Coord, Coord, Coord)>, u8) -> TestResult,
        );
    }

    #[test]
    fn quickcheck_low_pass_keeps_endpoints() {
        let mut q = quickcheck::QuickCheck::new().tests(200);
        q.quickcheck(
            (|raw: Vec<(Coord, Coord, Coord)>, iterations: u8| -> TestResult {
                let p = pts(&raw);
                if p.len() < 3 {
                    return TestResult::discard();
                }
                let f = low_pass_filter(&p, (iterations % 8) as usize + 1, p.len());
                TestResult::from_bool(
                    f.len() == p.len() && f[0] == p[0] && f[f.len() - 1] == p[p.len() - 1],
                )
            }) as fn(Vec<(Coord, Coord, Coord)>, u8) -> TestResult,
        );
    }
}
