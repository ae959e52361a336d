//! Terrain patch meshing: a constrained triangulation of the patch
//! perimeter plus optional interior points, height smoothing, and
//! border wall strips extruded along perimeter stretches.

use crate::extrude::SectionExtruder;
use crate::mesh::{MaterialHandle, MaterialResolver, TriangleMesh};
use crate::state::ObjectState;
use crate::types::RoadLikeType;
use crate::delaunay;
use geom::{polygon_contains_xz, Vec3};
use std::sync::Arc;

/// A wall strip along part of the patch perimeter. `lefts` are the
/// right vectors of the extrusion, pointing away from the patch.
pub struct BorderStrip {
    pub segment: Vec<Vec3>,
    pub lefts: Vec<Vec3>,
    pub ty: Arc<RoadLikeType>,
    pub state: ObjectState,
    pub instance_state: Option<ObjectState>,
}

/// Drops consecutive duplicate perimeter points.
fn clean_perimeter(perimeter: &[Vec3]) -> Vec<Vec3> {
    let mut res: Vec<Vec3> = Vec::with_capacity(perimeter.len());
    for &p in perimeter {
        if res.last().map_or(true, |&l| !l.approx_eq(p)) {
            res.push(p);
        }
    }
    res
}

/// Edge filter for the triangulated patch: an edge between two
/// consecutive perimeter points is always kept, anything else only when
/// its midpoint lies inside the perimeter.
fn check_edge(p1: usize, p2: usize, all: &[Vec3], n_perim: usize, perimeter: &[Vec3]) -> bool {
    if p1 < n_perim && p2 < n_perim {
        let diff = p1.abs_diff(p2);
        if diff == 1 || diff == n_perim - 1 {
            return true;
        }
    }
    let m = (all[p1] + all[p2]) * 0.5;
    polygon_contains_xz(perimeter, m)
}

/// Fixed-iteration Laplacian smoothing of the interior vertices'
/// heights. XZ and the perimeter never move.
fn smooth_heights(vertices: &mut [Vec3], tris: &[u32], n_perim: usize, iterations: u32) {
    let neighbors: Vec<Vec<usize>> = (n_perim..vertices.len())
        .map(|i| {
            let mut list = Vec::new();
            for t in tris.chunks_exact(3) {
                let t = [t[0] as usize, t[1] as usize, t[2] as usize];
                if let Some(k) = t.iter().position(|&v| v == i) {
                    for (j, &v) in t.iter().enumerate() {
                        if j != k && !list.contains(&v) {
                            list.push(v);
                        }
                    }
                }
            }
            list
        })
        .collect();
    for _ in 0..iterations {
        let averages: Vec<f32> = neighbors
            .iter()
            .enumerate()
            .map(|(k, list)| {
                if list.is_empty() {
                    return vertices[n_perim + k].y;
                }
                list.iter().map(|&n| vertices[n].y).sum::<f32>() / list.len() as f32
            })
            .collect();
        for (k, &avg) in averages.iter().enumerate() {
            vertices[n_perim + k].y = avg;
        }
    }
}

/// Builds one terrain patch mesh. The surface goes in the first
/// material slot; every border strip appends its own slots, resolved
/// through the strip state's texture parameters.
pub fn build_patch(
    perimeter: &[Vec3],
    interior: &[Vec3],
    borders: &[BorderStrip],
    surface_texture: &str,
    smooth: u32,
    uv_mult: f32,
    resolver: &dyn MaterialResolver,
) -> TriangleMesh {
    if perimeter.is_empty() {
        return TriangleMesh::default();
    }
    let perimeter = clean_perimeter(perimeter);
    let n_perim = perimeter.len();
    let mut all: Vec<Vec3> = perimeter.clone();
    all.extend_from_slice(interior);
    if all.len() < 3 {
        return TriangleMesh::default();
    }

    let mut edges: Vec<[usize; 2]> = Vec::with_capacity(n_perim);
    for i in 0..n_perim {
        edges.push([i, if i == n_perim - 1 { 0 } else { i + 1 }]);
    }
    let tris_full = delaunay::constrain(delaunay::triangulate(&all), &all, &edges);

    let mut tris: Vec<u32> = Vec::with_capacity(tris_full.len());
    for t in tris_full.chunks_exact(3) {
        let (a, b, c) = (t[0] as usize, t[1] as usize, t[2] as usize);
        if check_edge(a, b, &all, n_perim, &perimeter)
            && check_edge(b, c, &all, n_perim, &perimeter)
            && check_edge(c, a, &all, n_perim, &perimeter)
        {
            tris.extend_from_slice(t);
        }
    }

    let mut vertices = all;
    if smooth > 0 {
        smooth_heights(&mut vertices, &tris, n_perim, smooth);
    }
    let uvs = vertices
        .iter()
        .map(|v| geom::vec2(v.x * uv_mult, v.z * uv_mult))
        .collect();

    let surface_mat = if surface_texture.is_empty() {
        MaterialHandle::PLACEHOLDER
    } else {
        resolver.resolve_or_placeholder(surface_texture)
    };
    let mut mesh = TriangleMesh {
        vertices,
        uvs,
        indices: vec![tris],
        materials: vec![surface_mat],
    };

    for strip in borders {
        add_border_strip(&mut mesh, strip, resolver);
    }
    mesh
}

fn add_border_strip(mesh: &mut TriangleMesh, strip: &BorderStrip, resolver: &dyn MaterialResolver) {
    let segments = strip.segment.len();
    if segments < 2 {
        return;
    }
    let ty = strip.ty.clone();
    let slots = ty.def.textures.len();
    let mut ex = SectionExtruder::new(
        ty.clone(),
        strip.state.clone(),
        strip.instance_state.clone(),
        segments,
        slots,
    );
    ex.points = strip.segment.clone();
    ex.rights = strip.lefts.clone();
    ex.section_rights = strip.lefts.clone();
    ex.ground_heights = vec![0.0; segments];

    let total: f32 = strip
        .segment
        .windows(2)
        .map(|w| (w[1] - w[0]).mag())
        .sum();
    {
        let mut vc = ex.container.clone();
        ty.fill_initial_variables(
            &mut vc,
            &strip.state,
            strip.instance_state.as_ref(),
            None,
            total,
            segments,
        );
        ex.container = vc;
    }
    let mut z = 0.0;
    for i in 0..segments {
        if i > 0 {
            z += (strip.segment[i] - strip.segment[i - 1]).mag();
        }
        ex.markers.push(z);
        let verts = ex.raw_section_vertices(i, None).0;
        ex.section_vertices.push(verts);
    }
    ex.run(None);

    let base = mesh.vertices.len() as u32;
    mesh.vertices.extend_from_slice(&ex.vertices);
    mesh.uvs.extend_from_slice(&ex.uvs);
    for (slot, idx) in ex.indices.iter().enumerate() {
        if idx.is_empty() {
            continue;
        }
        // texture slot names are state parameters holding the real
        // material name
        let name = strip.state.str(&ty.def.textures[slot]);
        let mat = resolver.resolve_or_placeholder(name);
        let out = mesh.slot_for(mat);
        mesh.indices[out].extend(idx.iter().map(|&i| base + i));
    }
}
