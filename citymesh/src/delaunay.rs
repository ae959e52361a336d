//! Constrained Delaunay triangulation on the ground plane. The
//! unconstrained pass is delaunator's; `constrain` then re-carves the
//! triangulation around required edges (the classic remove-and-
//! retriangulate scheme).

use delaunator::{triangulate as delaunator_triangulate, Point};
use geom::{segment_intersection, vec2, Vec2, Vec3};

/// Delaunay triangulation of the points projected on XZ. Fewer than 3
/// points yield no triangles.
pub fn triangulate(points: &[Vec3]) -> Vec<u32> {
    if points.len() < 3 {
        return Vec::new();
    }
    let pts: Vec<Point> = points
        .iter()
        .map(|p| Point {
            x: p.x as f64,
            y: p.z as f64,
        })
        .collect();
    delaunator_triangulate(&pts)
        .triangles
        .into_iter()
        .map(|i| i as u32)
        .collect()
}

/// Forces every edge of `edges` into the triangulation. Edges already
/// present are left alone; for the rest the crossed triangles are
/// removed and the two resulting regions retriangulated.
pub fn constrain(mut triangles: Vec<u32>, points: &[Vec3], edges: &[[usize; 2]]) -> Vec<u32> {
    let pts: Vec<Vec2> = points.iter().map(|p| vec2(p.x, p.z)).collect();
    for &edge in edges {
        triangles = constrain_edge(triangles, &pts, edge);
    }
    triangles
}

fn edge_exists(triangles: &[u32], edge: [usize; 2]) -> bool {
    triangles.chunks_exact(3).any(|t| {
        t.contains(&(edge[0] as u32)) && t.contains(&(edge[1] as u32))
    })
}

/// Triangle crosses the edge when at least two of its sides do; three
/// when the edge shares one of the triangle's vertices, since the two
/// incident sides then always touch at that vertex.
fn triangle_crosses_edge(t: [Vec2; 3], e1: Vec2, e2: Vec2) -> bool {
    let crossings = [(t[0], t[1]), (t[0], t[2]), (t[1], t[2])]
        .iter()
        .filter(|&&(a, b)| segment_intersection(a, b, e1, e2).is_some())
        .count();
    let shares_vertex = t.iter().any(|&v| v == e1 || v == e2);
    crossings >= if shares_vertex { 3 } else { 2 }
}

fn line_side(a: Vec2, b: Vec2, p: Vec2) -> bool {
    (b - a).perp_dot(p - a) > 0.0
}

fn constrain_edge(triangles: Vec<u32>, pts: &[Vec2], edge: [usize; 2]) -> Vec<u32> {
    if edge_exists(&triangles, edge) {
        return triangles;
    }
    let e1 = pts[edge[0]];
    let e2 = pts[edge[1]];

    let mut kept = Vec::with_capacity(triangles.len());
    let mut expelled: Vec<usize> = Vec::new();
    for t in triangles.chunks_exact(3) {
        let corners = [
            pts[t[0] as usize],
            pts[t[1] as usize],
            pts[t[2] as usize],
        ];
        if triangle_crosses_edge(corners, e1, e2) {
            for &v in t {
                let v = v as usize;
                if v != edge[0] && v != edge[1] && !expelled.contains(&v) {
                    expelled.push(v);
                }
            }
        } else {
            kept.extend_from_slice(t);
        }
    }

    let mut part1 = vec![edge[0], edge[1]];
    let mut part2 = vec![edge[0], edge[1]];
    for &v in &expelled {
        if line_side(e1, e2, pts[v]) {
            part1.push(v);
        } else {
            part2.push(v);
        }
    }
    if part1.len() < 3 && part2.len() < 3 {
        return triangles;
    }
    retriangulate_part(&triangles, edge, &mut kept, &part1, pts);
    retriangulate_part(&triangles, edge, &mut kept, &part2, pts);
    kept
}

/// Retriangulates one side of the forced edge and appends the triangles
/// that pass the concavity filter.
fn retriangulate_part(
    triangles0: &[u32],
    edge: [usize; 2],
    out: &mut Vec<u32>,
    part: &[usize],
    pts: &[Vec2],
) {
    if part.len() < 3 {
        return;
    }
    let part_pts: Vec<Vec2> = part.iter().map(|&i| pts[i]).collect();
    let order = polygon_order(triangles0, edge, part);
    let part_pts3: Vec<Vec3> = part_pts.iter().map(|p| geom::vec3(p.x, 0.0, p.y)).collect();
    let tris = triangulate(&part_pts3);
    for t in tris.chunks_exact(3) {
        let (a, b, c) = (t[0] as usize, t[1] as usize, t[2] as usize);
        if check_edge(a, b, &part_pts, order.as_deref())
            && check_edge(b, c, &part_pts, order.as_deref())
            && check_edge(c, a, &part_pts, order.as_deref())
        {
            out.extend_from_slice(&[part[a] as u32, part[b] as u32, part[c] as u32]);
        }
    }
}

/// Recovers the boundary order of the region by walking its edge graph
/// from one forced-edge endpoint to the other. Edges used by more than
/// one removed triangle are interior and skipped. Returns part-local
/// indices, or `None` when the walk cannot close.
fn polygon_order(triangles0: &[u32], edge: [usize; 2], part: &[usize]) -> Option<Vec<usize>> {
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    let in_part = |v: usize| part.contains(&v);
    for t in triangles0.chunks_exact(3) {
        let t = [t[0] as usize, t[1] as usize, t[2] as usize];
        for (a, b, c) in [(t[0], t[1], t[2]), (t[1], t[2], t[0]), (t[2], t[0], t[1])] {
            if !in_part(a) || !in_part(b) {
                continue;
            }
            let e = if a < b { (a, b) } else { (b, a) };
            match edges.iter().position(|&x| x == e) {
                None => {
                    edges.push(e);
                    counts.push(1);
                }
                Some(i) if in_part(c) => counts[i] += 1,
                Some(_) => {}
            }
        }
    }

    // edges that will close a triangle with the forced edge become
    // interior once it is inserted
    for &v in part {
        let mut start_j = None;
        let mut end_j = None;
        for (j, &(a, b)) in edges.iter().enumerate() {
            if a != v && b != v {
                continue;
            }
            if a == edge[0] || b == edge[0] {
                start_j = Some(j);
            } else if a == edge[1] || b == edge[1] {
                end_j = Some(j);
            }
        }
        if let (Some(s), Some(e)) = (start_j, end_j) {
            counts[s] += 1;
            counts[e] += 1;
        }
    }

    let mut boundary: Vec<(usize, usize)> = edges
        .into_iter()
        .zip(counts)
        .filter(|&(_, c)| c == 1)
        .map(|(e, _)| e)
        .collect();

    let mut order = vec![edge[0], edge[1]];
    let mut cur = edge[1];
    while cur != edge[0] {
        let i = boundary
            .iter()
            .position(|&(a, b)| a == cur || b == cur)?;
        let (a, b) = boundary.swap_remove(i);
        cur = if a == cur { b } else { a };
        if cur != edge[0] {
            order.push(cur);
        }
    }
    order
        .into_iter()
        .map(|v| part.iter().position(|&p| p == v))
        .collect()
}

/// Keeps only triangle edges that lie on the region boundary or whose
/// midpoint falls inside it; Delaunay over a concave region otherwise
/// bridges the concavity.
fn check_edge(p1: usize, p2: usize, pts: &[Vec2], order: Option<&[usize]>) -> bool {
    if pts.len() == 3 {
        return true;
    }
    let Some(order) = order else { return false };
    let i1 = order.iter().position(|&o| o == p1);
    let i2 = order.iter().position(|&o| o == p2);
    if let (Some(i1), Some(i2)) = (i1, i2) {
        let diff = i1.abs_diff(i2);
        if diff == 1 || diff == order.len() - 1 {
            return true;
        }
    }
    let m = (pts[p1] + pts[p2]) * 0.5;
    let polygon: Vec<Vec3> = order
        .iter()
        .map(|&i| geom::vec3(pts[i].x, 0.0, pts[i].y))
        .collect();
    geom::polygon_contains_xz(&polygon, geom::vec3(m.x, 0.0, m.y))
}
