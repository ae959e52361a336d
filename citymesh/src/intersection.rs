//! Intersection meshing: sorts the incident road mouths clockwise,
//! spans each adjacent pair with a junction patch, fills the surface
//! from merged sub-road polygons and lays crosswalk quads.

use crate::calc::VariableContainer;
use crate::error::TypeError;
use crate::extrude::SectionExtruder;
use crate::mesh::{section_indices, MaterialResolver, TriangleMesh};
use crate::state::{ObjectState, Value};
use crate::subroad::SubroadManager;
use crate::types::{IntersectionType, JunctionType, ParamKind, RoadLikeType};
use crate::delaunay;
use geom::{
    line_intersection, point_on_curve, polygon_is_clockwise_xz, sort_clockwise, triangle_normal,
    vec2, CurveKind, Vec3, EPSILON,
};
use itertools::Itertools;
use std::sync::Arc;

/// One road mouth feeding the intersection. `standard` carries the
/// road's evaluated standard values and parameters, sampled from its
/// live container by the owning element.
pub struct RoadEnd {
    pub ty: Arc<RoadLikeType>,
    pub state: ObjectState,
    pub standard: ObjectState,
    /// Normalized, pointing from the road toward the center.
    pub dir_to_center: Vec3,
    /// Distance from the center to the road mouth.
    pub size: f32,
    pub crosswalk_size: f32,
    /// This road's own size increase at this intersection.
    pub size_add: f32,
    /// Surface texture override; empty means the default.
    pub texture: String,
    /// True when this intersection is the road's end.
    pub this_is_end: bool,
}

pub struct MesherOutput {
    pub mesh: TriangleMesh,
    /// Anchor polylines emitted by the junction patches, with the
    /// clockwise road-pair indices they run between.
    pub anchor_lines: Vec<Vec<Vec3>>,
    pub anchor_pairs: Vec<(usize, usize)>,
}

/// Copies every state value the layout declares into the container.
fn fill_from_state(vc: &mut VariableContainer, state: &ObjectState) {
    for (name, value) in state.iter() {
        match value {
            Value::Float(v) => vc.set_float(name, *v),
            Value::Int(v) => vc.set_float(name, *v as f32),
            Value::Bool(v) => vc.set_bool(name, *v),
            Value::Vec2(v) => vc.set_vec2(name, *v),
            Value::Vec3(v) => vc.set_vec3(name, *v),
            Value::Str(_) | Value::Nested(_) => {}
        }
    }
}

/// State parameter lookup with the name itself as fallback, so type
/// descriptors may name either a parameter or a material directly.
fn resolve_name<'a>(state: &'a ObjectState, name: &'a str) -> &'a str {
    let v = state.str(name);
    if v.is_empty() {
        name
    } else {
        v
    }
}

struct PairData {
    road_i: usize,
    road_j: usize,
    junction: Arc<JunctionType>,
    state: ObjectState,
    stations: Vec<Vec<Vec3>>,
    ground_heights: Vec<f32>,
}

pub struct Mesher<'a> {
    pub ty: &'a IntersectionType,
    pub state: &'a ObjectState,
    pub instance_state: Option<&'a ObjectState>,
    pub center: Vec3,
    pub roads: &'a [RoadEnd],
}

impl<'a> Mesher<'a> {
    /// Builds the whole intersection mesh. Fails when a road pair has
    /// no junction rule; the orchestrator logs and disables the
    /// element.
    pub fn build(&self, resolver: &dyn MaterialResolver) -> Result<MesherOutput, TypeError> {
        let mut out = MesherOutput {
            mesh: TriangleMesh::default(),
            anchor_lines: Vec::new(),
            anchor_pairs: Vec::new(),
        };
        if self.roads.is_empty() {
            return Ok(out);
        }

        // road mouth frames
        let n = self.roads.len();
        let mut centers = Vec::with_capacity(n);
        let mut centers2 = Vec::with_capacity(n);
        let mut centers2p = Vec::with_capacity(n);
        let mut lefts = Vec::with_capacity(n);
        let mut up_factors = Vec::with_capacity(n);
        let mut crosswalks: Vec<[Vec3; 4]> = Vec::new();
        for road in self.roads {
            let dir = road.dir_to_center.normalize();
            let left = dir.cross(Vec3::UP).normalize() * 0.5;
            let up_factor = Vec3::UP * road.standard.float("height");
            let center = self.center - dir * road.size;
            let center2 = self.center - dir * (road.size - road.crosswalk_size);
            let center2p = self.center - dir * (road.size - road.crosswalk_size - 0.1);
            if road.crosswalk_size > 0.0 {
                let half = left * road.standard.float("roadWidth");
                crosswalks.push([
                    center + half - up_factor,
                    center2 + half - up_factor,
                    center - half - up_factor,
                    center2 - half - up_factor,
                ]);
            }
            centers.push(center);
            centers2.push(center2);
            centers2p.push(center2p);
            lefts.push(left);
            up_factors.push(up_factor);
        }

        let order = sort_clockwise(&centers, self.center);
        let mut manager = SubroadManager::default();
        let mut pairs: Vec<PairData> = Vec::with_capacity(n);

        let default_tex = resolve_name(self.state, &self.ty.surface_texture).to_string();
        let size_increase = self.state.float("sizeIncrease");
        let mid_denominator = self.state.int("sidewalkSegments").max(1) as f32;

        for i in 0..n {
            let j = (i + 1) % n;
            let (true_i, true_j) = (order[i], order[j]);
            let (road_i, road_j) = (&self.roads[true_i], &self.roads[true_j]);

            let junction = self
                .ty
                .junction_for(&road_i.ty.name, &road_j.ty.name)
                .cloned()
                .ok_or_else(|| {
                    TypeError::UnknownType(format!(
                        "no junction for ({}, {})",
                        road_i.ty.name, road_j.ty.name
                    ))
                })?;

            let left_is = self.section_offsets(&junction, road_i, lefts[true_i]);
            let left_js = self.section_offsets(&junction, road_j, lefts[true_j]);
            let rsv = junction.road_spline_vertex.min(left_is.len().saturating_sub(1));
            let left_i_road = left_is[rsv];
            let left_j_road = left_js[rsv];

            // convexity against the first road's mouth plane
            let plane_normal = lefts[true_i];
            let plane_origin = centers[true_i];
            let d0 = plane_normal.dot(left_is[0] * EPSILON);
            let d1 = plane_normal.dot(centers[true_j] - left_js[0] * EPSILON - plane_origin);
            let convex = d0.signum() != d1.signum();
            let self_intersecting = !convex
                && (road_i.size_add + size_increase < 0.0
                    || road_j.size_add + size_increase < 0.0);

            // junction object state for this pair
            let mut pair_state = self.state.clone();
            pair_state.set_bool("thisIsEndA", road_i.this_is_end);
            pair_state.set_bool("thisIsEndB", road_j.this_is_end);
            pair_state.set_bool("convex", convex);
            pair_state.set_bool("selfIntersectingSpline", self_intersecting);

            let tex_i = if road_i.texture.is_empty() { &default_tex } else { &road_i.texture };
            let tex_i_default = road_i.texture.is_empty();
            let tex_j = if road_j.texture.is_empty() { &default_tex } else { &road_j.texture };
            let tex_j_default = road_j.texture.is_empty();
            pair_state.set_bool("notDefaultTex", !tex_i_default || !tex_j_default);

            self.import_parameters(&junction, road_i, road_j, &mut pair_state);

            // initial variables decide the texture definitions and the
            // subdivision count
            let mut jvc = junction.road_like.fork_container();
            junction.road_like.fill_initial_variables(
                &mut jvc,
                &pair_state,
                self.instance_state,
                None,
                0.0,
                mid_denominator as usize,
            );
            for (d, def) in junction.texture_definitions.iter().enumerate() {
                let picked = junction.pick_texture(d, &jvc).to_string();
                let real = pair_state.str(&picked).to_string();
                pair_state.set_str(def.name.clone(), real);
            }
            let mid_sections = junction.eval_segments(&jvc);

            // curve control points per section vertex, dropped when
            // they fall behind either road mouth
            let mut control_points: Vec<Vec<Vec3>> = Vec::with_capacity(left_is.len());
            for vi in 0..left_is.len() {
                let cp = line_intersection(
                    centers[true_i] + left_is[vi],
                    centers2p[true_i] + left_is[vi],
                    centers[true_j] - left_js[vi],
                    centers2p[true_j] - left_js[vi],
                );
                let n1 = left_is[vi].cross(Vec3::UP);
                let n2 = left_js[vi].cross(Vec3::UP);
                let behind_i =
                    n1.dot(cp - centers2p[true_i]).signum() == n1.dot(centers[true_i] - centers2p[true_i]).signum();
                let behind_j =
                    n2.dot(cp - centers2p[true_j]).signum() == n2.dot(centers[true_j] - centers2p[true_j]).signum();
                control_points.push(if behind_i || behind_j { Vec::new() } else { vec![cp] });
            }

            // station stack: two at road I, the curved mids, two at
            // road J
            let mut stations: Vec<Vec<Vec3>> = Vec::new();
            let mut ground_heights: Vec<f32> = Vec::new();
            stations.push(left_is.iter().map(|&sv| centers[true_i] + sv).collect());
            stations.push(left_is.iter().map(|&sv| centers2[true_i] + sv).collect());
            ground_heights.push(up_factors[true_i].y);
            ground_heights.push(up_factors[true_i].y);

            let i_left_point = centers2[true_i] + left_i_road - up_factors[true_i];
            let i_right_point = centers2[true_i] - left_i_road - up_factors[true_i];
            let mut surface_segment = vec![i_left_point];

            let section_center = |vi: usize, alpha: f32| {
                point_on_curve(
                    centers2[true_i] + left_is[vi],
                    &control_points[vi],
                    centers2[true_j] - left_js[vi],
                    alpha,
                    0,
                    CurveKind::Bezier,
                    0.5,
                    false,
                )
            };
            for k in 1..mid_sections {
                let alpha = k as f32 / mid_denominator;
                let row: Vec<Vec3> = (0..left_is.len()).map(|vi| section_center(vi, alpha)).collect();
                let up_k = up_factors[true_i] + (up_factors[true_j] - up_factors[true_i]) * alpha;
                surface_segment.push(row[rsv] - up_k);
                ground_heights.push(up_k.y);
                stations.push(row);
            }

            stations.push(left_js.iter().map(|&sv| centers2[true_j] - sv).collect());
            stations.push(left_js.iter().map(|&sv| centers[true_j] - sv).collect());
            ground_heights.push(up_factors[true_j].y);
            ground_heights.push(up_factors[true_j].y);
            surface_segment.push(centers2[true_j] - left_j_road - up_factors[true_j]);

            // surface sub-roads; the manager reuses default-texture
            // ones and the merge pass unifies the rest
            let sub = manager.create_subroad(
                tex_i,
                tex_i_default,
                false,
                vec2(1.0, 1.0),
                &default_tex,
                0,
            );
            manager.add_segment(
                sub,
                &[i_right_point, i_left_point],
                plane_origin,
                plane_normal,
                false,
            );
            let sub = if tex_j != tex_i && !tex_j_default {
                manager.create_subroad(tex_j, tex_j_default, false, vec2(1.0, 1.0), &default_tex, 0)
            } else {
                sub
            };
            manager.add_segment(sub, &surface_segment, plane_origin, plane_normal, false);

            pairs.push(PairData {
                road_i: true_i,
                road_j: true_j,
                junction,
                state: pair_state,
                stations,
                ground_heights,
            });
        }

        manager.merge_subroads();
        let discord = self.has_discord_roads();
        self.mesh_subroads(&mut out.mesh, &manager, discord, resolver);
        for pair in &pairs {
            self.mesh_junction(&mut out, pair, resolver)?;
        }
        self.mesh_crosswalks(&mut out.mesh, &crosswalks, resolver);
        Ok(out)
    }

    /// Roads disagreeing on sidewalks produce vertical filler triangles
    /// the surface must drop.
    fn has_discord_roads(&self) -> bool {
        let with = self
            .roads
            .iter()
            .filter(|r| r.standard.bool("hasSidewalks"))
            .count();
        with > 0 && with < self.roads.len()
    }

    /// Section-vertex offsets of one road, evaluated with the road's
    /// standard values in the junction's container.
    fn section_offsets(&self, junction: &JunctionType, road: &RoadEnd, left: Vec3) -> Vec<Vec3> {
        let mut vc = junction.road_like.fork_container();
        fill_from_state(&mut vc, &road.standard);
        junction
            .road_like
            .section_vertices
            .iter()
            .map(|&id| left * junction.road_like.arena.scalar(id, &vc))
            .collect()
    }

    fn import_parameters(
        &self,
        junction: &JunctionType,
        road_i: &RoadEnd,
        road_j: &RoadEnd,
        pair_state: &mut ObjectState,
    ) {
        for p in &junction.imported_parameters {
            let road = if p.from_start { road_i } else { road_j };
            match p.kind {
                ParamKind::Float => pair_state.set_float(p.new_name.clone(), road.standard.float(&p.name)),
                ParamKind::Int | ParamKind::Enum => {
                    pair_state.set_int(p.new_name.clone(), road.standard.int(&p.name))
                }
                ParamKind::Bool => pair_state.set_bool(p.new_name.clone(), road.standard.bool(&p.name)),
                ParamKind::Vec2 => pair_state.set_vec2(p.new_name.clone(), road.standard.vec2(&p.name)),
                ParamKind::Vec3 => pair_state.set_vec3(p.new_name.clone(), road.standard.vec3(&p.name)),
                ParamKind::Str => pair_state.set_str(p.new_name.clone(), road.state.str(&p.name)),
            }
        }
    }

    fn mesh_subroads(
        &self,
        mesh: &mut TriangleMesh,
        manager: &SubroadManager,
        discord: bool,
        resolver: &dyn MaterialResolver,
    ) {
        for sub in &manager.subroads {
            let tris_full = delaunay::constrain(
                delaunay::triangulate(&sub.vertices),
                &sub.vertices,
                &sub
                    .segments
                    .iter()
                    .flat_map(|s| s.windows(2).map(|w| [w[0], w[1]]))
                    .collect_vec(),
            );
            let base = mesh.vertices.len() as u32;
            let mut tris: Vec<u32> = Vec::with_capacity(tris_full.len());
            'tri: for t in tris_full.chunks_exact(3) {
                // a triangle lying entirely on one convex boundary
                // segment bridges the outside
                for (segment, &convex) in sub.segments.iter().zip(&sub.convex) {
                    if convex && t.iter().all(|&v| segment.contains(&(v as usize))) {
                        continue 'tri;
                    }
                }
                if discord {
                    let normal = triangle_normal(
                        sub.vertices[t[0] as usize],
                        sub.vertices[t[1] as usize],
                        sub.vertices[t[2] as usize],
                    );
                    if normal.angle(Vec3::UP).to_degrees() > 85.0 {
                        continue;
                    }
                }
                tris.extend(t.iter().map(|&v| base + v));
            }
            if sub.tag == 1 {
                tris.reverse();
            }
            mesh.vertices.extend_from_slice(&sub.vertices);
            mesh.uvs.extend(sub.vertices.iter().map(|v| {
                vec2(
                    v.x * sub.uv_mult.x * self.ty.surface_uv_mult,
                    v.z * sub.uv_mult.y * self.ty.surface_uv_mult,
                )
            }));
            let mat = resolver.resolve_or_placeholder(&sub.texture);
            let slot = mesh.slot_for(mat);
            mesh.indices[slot].extend(tris);
        }
    }

    fn mesh_junction(
        &self,
        out: &mut MesherOutput,
        pair: &PairData,
        resolver: &dyn MaterialResolver,
    ) -> Result<(), TypeError> {
        let junction = &pair.junction;
        let ty = junction.road_like_arc();
        let segments = pair.stations.len();
        if segments < 2 {
            return Ok(());
        }
        let mut ex = SectionExtruder::new(
            ty.clone(),
            pair.state.clone(),
            self.instance_state.cloned(),
            segments,
            ty.def.textures.len(),
        );
        let mut z = 0.0;
        let mut last_mid = Vec3::ZERO;
        for (i, row) in pair.stations.iter().enumerate() {
            let mid = (row[0] + row[1]) * 0.5;
            if i > 0 {
                z += (mid - last_mid).mag();
            }
            last_mid = mid;
            ex.section_vertices.push(row.clone());
            ex.section_rights.push((row[0] - row[1]).normalize());
            ex.markers.push(z);
            ex.ground_heights.push(pair.ground_heights[i]);
            ex.points.push(Vec3::ZERO);
            ex.rights.push(Vec3::ZERO);
        }
        {
            let mut vc = ex.container.clone();
            ty.fill_initial_variables(
                &mut vc,
                &pair.state,
                self.instance_state,
                None,
                z,
                segments,
            );
            ex.container = vc;
        }
        let mut lines = ex.make_side_polylines();
        ex.run(Some(&mut lines));

        let base = out.mesh.vertices.len() as u32;
        out.mesh.vertices.extend_from_slice(&ex.vertices);
        out.mesh.uvs.extend_from_slice(&ex.uvs);
        for (slot, idx) in ex.indices.iter().enumerate() {
            if idx.is_empty() {
                continue;
            }
            let name = pair.state.str(&ty.def.textures[slot]).to_string();
            let real = if name.is_empty() { &ty.def.textures[slot] } else { &name };
            let mat = resolver.resolve_or_placeholder(real);
            let out_slot = out.mesh.slot_for(mat);
            out.mesh.indices[out_slot].extend(idx.iter().map(|&i| base + i));
        }
        for line in lines {
            out.anchor_lines.push(line);
            out.anchor_pairs.push((pair.road_i, pair.road_j));
        }
        Ok(())
    }

    fn mesh_crosswalks(
        &self,
        mesh: &mut TriangleMesh,
        crosswalks: &[[Vec3; 4]],
        resolver: &dyn MaterialResolver,
    ) {
        let Some(def) = &self.ty.crosswalk else { return };
        let mat = resolver.resolve_or_placeholder(resolve_name(self.state, &def.texture));
        let slot = mesh.slot_for(mat);
        for cw in crosswalks {
            let length = (cw[0] - cw[2]).mag();
            let width = (cw[0] - cw[1]).mag();
            let unit = if def.repeat_length > 0.0 { def.repeat_length } else { width };
            let repeats = (length / unit).round().max(1.0);
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend_from_slice(cw);
            mesh.uvs.extend_from_slice(&[
                vec2(0.0, repeats),
                vec2(1.0, repeats),
                vec2(0.0, 0.0),
                vec2(1.0, 0.0),
            ]);
            mesh.indices[slot].extend_from_slice(&section_indices(base, 2));
        }
    }
}

/// Perimeter of an intersection surface for terrain stitching: the
/// outermost anchor points in clockwise order.
pub fn surface_outline(anchor_lines: &[Vec<Vec3>], center: Vec3) -> Vec<Vec3> {
    let mut points: Vec<Vec3> = anchor_lines.iter().flatten().copied().collect();
    if points.len() < 3 {
        return points;
    }
    let order = sort_clockwise(&points, center);
    points = order.into_iter().map(|i| points[i]).collect();
    if !polygon_is_clockwise_xz(&points) {
        points.reverse();
    }
    points
}
