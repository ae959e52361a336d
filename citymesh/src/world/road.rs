//! A road element: control handles between two optional intersections,
//! resampled into curve points and extruded into a mesh.

use super::IntersectionId;
use crate::calc::VariableContainer;
use crate::extrude::SectionExtruder;
use crate::mesh::{MaterialResolver, TriangleMesh};
use crate::state::ObjectState;
use crate::types::RoadLikeType;
use geom::{low_pass_filter, point_on_curve, vec3, CurveKind, Vec2, Vec3, EPSILON};
use std::sync::Arc;

/// State getters return zero for missing keys; these apply the non-zero
/// defaults of the standard road parameters.
pub(crate) fn float_or(state: &ObjectState, name: &str, default: f32) -> f32 {
    if state.contains(name) {
        state.float(name)
    } else {
        default
    }
}

fn int_or(state: &ObjectState, name: &str, default: i32) -> i32 {
    if state.contains(name) {
        state.int(name)
    } else {
        default
    }
}

fn curve_kind(state: &ObjectState) -> CurveKind {
    match state.int("curveType") {
        1 => CurveKind::Hermite,
        2 => CurveKind::LowPoly,
        _ => CurveKind::Bezier,
    }
}

fn flat_dir(v: Vec3) -> Vec3 {
    vec3(v.x, 0.0, v.z).try_normalize().unwrap_or(Vec3::ZERO)
}

/// Size, center and road count of one attached intersection, fed into
/// the mesh rebuild by the world update.
#[derive(Copy, Clone, Debug)]
pub struct EndInfo {
    pub size: f32,
    pub center: Vec3,
    pub n_roads: usize,
}

pub struct RoadElement {
    pub ty: Arc<RoadLikeType>,
    pub state: ObjectState,
    pub instance_state: ObjectState,
    /// Control handles. The first and last snap to the attached
    /// intersection centers.
    pub points: Vec<Vec3>,
    pub start_intersection: Option<IntersectionId>,
    pub end_intersection: Option<IntersectionId>,
    /// Stations sampled from the handles, before any endpoint pull-back.
    pub curve_points: Vec<Vec3>,
    pub mesh: TriangleMesh,
    pub anchor_lines: Vec<Vec<Vec3>>,
    pub(crate) force_remesh: bool,
    container: VariableContainer,
    old_points: Vec<Vec3>,
    old_links: (Option<IntersectionId>, Option<IntersectionId>),
}

impl RoadElement {
    pub fn new(ty: Arc<RoadLikeType>, state: ObjectState, points: Vec<Vec3>) -> Self {
        let container = ty.fork_container();
        Self {
            ty,
            state,
            instance_state: ObjectState::new(),
            points,
            start_intersection: None,
            end_intersection: None,
            curve_points: Vec::new(),
            mesh: TriangleMesh::default(),
            anchor_lines: Vec::new(),
            force_remesh: false,
            container,
            old_points: Vec::new(),
            old_links: (None, None),
        }
    }

    fn line_length(&self) -> f32 {
        self.points.windows(2).map(|w| (w[1] - w[0]).mag()).sum()
    }

    /// Station count of the sampled curve.
    pub fn segments(&self) -> usize {
        if curve_kind(&self.state) == CurveKind::LowPoly {
            return self.points.len();
        }
        if self.points.len() <= 2 && self.standard_bool("canBeSimplified") {
            return 2;
        }
        let base = int_or(&self.state, "segments", 2).max(0) as usize;
        if self.state.bool("segmentsPer100m") {
            (base as f32 * self.line_length() / 100.0).max(2.0) as usize
        } else {
            base + 1
        }
    }

    /// Rebinds the live container from the current states, so the
    /// standard getters see fresh parameter values.
    fn reload(&mut self) {
        let mut vc = self.ty.fork_container();
        self.ty.fill_initial_variables(
            &mut vc,
            &self.state,
            Some(&self.instance_state),
            None,
            self.line_length(),
            0,
        );
        self.container = vc;
    }

    pub fn standard_float(&self, name: &str) -> f32 {
        self.ty.eval_named_float(name, &self.container).unwrap_or(0.0)
    }

    pub fn standard_bool(&self, name: &str) -> bool {
        self.ty.eval_named_bool(name, &self.container).unwrap_or(false)
    }

    pub fn standard_vec2(&self, name: &str) -> Vec2 {
        self.ty.eval_named_vec2(name, &self.container).unwrap_or(Vec2::ZERO)
    }

    pub fn standard_vec3(&self, name: &str) -> Vec3 {
        self.ty.eval_named_vec3(name, &self.container).unwrap_or(Vec3::ZERO)
    }

    pub fn standard_str(&self, name: &str) -> &str {
        self.state.str(name)
    }

    /// Every parameter and definition flattened into one state block,
    /// for consumers that outlive the container (junction imports).
    pub fn standard_state(&self) -> ObjectState {
        let mut out = ObjectState::new();
        self.ty.export_definitions(
            &self.container,
            &self.state,
            Some(&self.instance_state),
            &mut out,
        );
        out.mark_clean();
        out
    }

    pub fn crosswalk_size(&self, at_start: bool) -> f32 {
        let key = if at_start { "startCrosswalkSize" } else { "endCrosswalkSize" };
        float_or(&self.state, key, 1.0)
    }

    pub fn intersection_texture(&self, at_start: bool) -> String {
        let key = if at_start { "startIntersectionTexture" } else { "endIntersectionTexture" };
        self.state.str(key).to_string()
    }

    pub fn intersection_add(&self, at_start: bool) -> f32 {
        let key = if at_start { "startIntersectionAdd" } else { "endIntersectionAdd" };
        self.state.float(key)
    }

    fn did_change(&self) -> bool {
        self.state.is_dirty()
            || self.instance_state.is_dirty()
            || self.old_links != (self.start_intersection, self.end_intersection)
            || self.old_points.len() != self.points.len()
            || self.old_points.iter().zip(&self.points).any(|(a, b)| !a.approx_eq(*b))
    }

    /// Resamples the curve when any input changed. Returns true when the
    /// line was rebuilt, which also flags the mesh for a remesh.
    pub fn update_line(&mut self) -> bool {
        if self.points.len() < 2 || !self.did_change() {
            return false;
        }
        self.reload();
        let segments = self.segments();
        let start = self.points[0];
        let end = self.points[self.points.len() - 1];
        let controls = &self.points[1..self.points.len() - 1];
        let kind = curve_kind(&self.state);
        let tension = float_or(&self.state, "hermiteTension", 0.5);
        let sub_eq = self.state.bool("subdivideEqually");
        self.curve_points.clear();
        if segments >= 2 {
            for i in 0..segments {
                let alpha = i as f32 / (segments - 1) as f32;
                self.curve_points
                    .push(point_on_curve(start, controls, end, alpha, i, kind, tension, sub_eq));
            }
            let lpf = self.state.int("lowPassFilter").max(0) as usize;
            if lpf > 0 {
                self.curve_points = low_pass_filter(&self.curve_points, lpf, segments);
            }
        }
        self.force_remesh = true;
        self.old_points = self.points.clone();
        self.old_links = (self.start_intersection, self.end_intersection);
        self.state.mark_clean();
        self.instance_state.mark_clean();
        true
    }

    /// Rebuilds the mesh when flagged: pulls the endpoints back by the
    /// intersection sizes, resamples, then extrudes every station.
    /// Returns true when a rebuild happened.
    pub fn rebuild_mesh(
        &mut self,
        start_info: Option<EndInfo>,
        end_info: Option<EndInfo>,
        resolver: &dyn MaterialResolver,
    ) -> bool {
        if !self.force_remesh {
            return false;
        }
        self.force_remesh = false;
        let segments = self.segments();
        if self.points.len() < 2 || self.curve_points.len() < 2 || segments < 2 {
            self.mesh = TriangleMesh::default();
            self.anchor_lines.clear();
            return true;
        }

        let kind = curve_kind(&self.state);
        let mut start = self.points[0];
        let mut end = self.points[self.points.len() - 1];
        let mut controls: Vec<Vec3> = self.points[1..self.points.len() - 1].to_vec();
        // a single bezier control between two intersections is promoted
        // to a cubic so the pulled-back endpoints keep the curve shape
        if kind == CurveKind::Bezier
            && start_info.is_some()
            && end_info.is_some()
            && controls.len() == 1
        {
            let cp = controls[0];
            controls = vec![
                start + (cp - start) * (2.0 / 3.0),
                end + (cp - end) * (2.0 / 3.0),
            ];
        }
        if let Some(info) = start_info {
            start += flat_dir(self.curve_points[1] - self.curve_points[0]) * info.size;
        }
        if let Some(info) = end_info {
            let n = self.curve_points.len();
            end += flat_dir(self.curve_points[n - 2] - self.curve_points[n - 1]) * info.size;
        }

        let mut ex = SectionExtruder::new(
            self.ty.clone(),
            self.state.clone(),
            Some(self.instance_state.clone()),
            segments,
            self.ty.def.textures.len(),
        );
        let tension = float_or(&self.state, "hermiteTension", 0.5);
        let sub_eq = self.state.bool("subdivideEqually");
        let mut total = 0.0;
        for i in 0..segments {
            let alpha = i as f32 / (segments - 1) as f32;
            let pos = point_on_curve(start, &controls, end, alpha, i, kind, tension, sub_eq);
            if let Some(&prev) = ex.points.last() {
                total += (pos - prev).mag();
            }
            ex.points.push(pos);
        }
        let lpf = self.state.int("lowPassFilter").max(0) as usize;
        if lpf > 0 {
            ex.points = low_pass_filter(&ex.points, lpf, segments);
        }

        let low_poly = kind == CurveKind::LowPoly || self.state.bool("adjustLowPolyWidth");
        let eps = 0.005;
        let mut z = 0.0;
        for i in 0..segments {
            let pos = ex.points[i];
            if i > 0 {
                z += (pos - ex.points[i - 1]).mag();
            }
            let dir = if low_poly {
                // average of the incoming and outgoing edges
                let mut d = Vec3::ZERO;
                if i > 0 {
                    d += (pos - ex.points[i - 1]).normalize();
                }
                if i + 1 < segments {
                    d += (ex.points[i + 1] - pos).normalize();
                }
                d.normalize()
            } else if i == 0 {
                match start_info {
                    Some(info) => (pos - info.center).normalize(),
                    None => (ex.points[1] - pos).normalize(),
                }
            } else if i == segments - 1 {
                match end_info {
                    Some(info) => (info.center - pos).normalize(),
                    None => (pos - ex.points[i - 1]).normalize(),
                }
            } else if lpf > 0 {
                (ex.points[i + 1] - ex.points[i - 1]).normalize()
            } else {
                let alpha = i as f32 / (segments - 1) as f32;
                let before =
                    point_on_curve(start, &controls, end, alpha - eps, i - 1, kind, tension, sub_eq);
                let after =
                    point_on_curve(start, &controls, end, alpha + eps, i + 1, kind, tension, sub_eq);
                (after - before).normalize()
            };
            ex.markers.push(z);
            ex.rights.push(dir.cross(Vec3::UP).normalize());
            ex.ground_heights.push(0.0);
        }

        let mut rt = ObjectState::new();
        rt.set_bool("throughIntersection", false);
        rt.set_bool("hasStartIntersection", start_info.is_some());
        rt.set_bool("hasEndIntersection", end_info.is_some());
        rt.set_float(
            "startIntersectionNumberOfRoads",
            start_info.map_or(0.0, |i| i.n_roads as f32),
        );
        rt.set_float(
            "endIntersectionNumberOfRoads",
            end_info.map_or(0.0, |i| i.n_roads as f32),
        );
        rt.set_float("maxScoreRoadIndex", 0.0);
        rt.set_vec3("startIntersectionPosition", start_info.map_or(start, |i| i.center));
        rt.set_vec3("endIntersectionPosition", end_info.map_or(end, |i| i.center));
        rt.set_vec3("startDir", Vec3::UP.cross(ex.rights[0]).normalize());
        rt.set_vec3("endDir", Vec3::UP.cross(ex.rights[segments - 1]).normalize());
        {
            let mut vc = ex.container.clone();
            self.ty.fill_initial_variables(
                &mut vc,
                &self.state,
                Some(&self.instance_state),
                Some(&rt),
                total,
                segments,
            );
            ex.container = vc;
        }

        let variable =
            self.ty.def.variable_sections || self.ty.needs_low_poly_fix(&self.state, segments);
        let coplanar = self.state.bool("makeCoplanar");
        let threshold = float_or(&self.state, "pointPlaneTreshold", 0.02);
        for i in 0..segments {
            if variable {
                let mut vc = ex.container.clone();
                self.ty.fill_segment_variables(
                    &mut vc,
                    &self.state,
                    Some(&self.instance_state),
                    ex.points[i],
                    Vec3::ZERO,
                    ex.markers[i],
                    0.0,
                    i + 1,
                    &[],
                    &ex.points,
                    segments,
                );
                ex.container = vc;
            }
            let (mut verts, mut right) = ex.raw_section_vertices(i, None);
            if coplanar && i > 0 && !(i == segments - 1 && end_info.is_some()) {
                let dir = coplanar_dir(&ex, &verts, i, segments, threshold);
                let fixed = ex.raw_section_vertices(i, Some(dir));
                verts = fixed.0;
                right = fixed.1;
            }
            ex.section_vertices.push(verts);
            ex.section_rights.push(right);
        }

        let mut lines = ex.make_side_polylines();
        ex.run(Some(&mut lines));
        self.anchor_lines = lines;
        self.mesh = ex.take_mesh(resolver);
        true
    }
}

fn plane_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize()
}

/// Direction of the section line that keeps station `i` coplanar with
/// its neighbor planes, scaled by the secant of its tilt so the section
/// width is preserved after projection.
fn coplanar_dir(
    ex: &SectionExtruder,
    verts: &[Vec3],
    i: usize,
    segments: usize,
    threshold: f32,
) -> Vec3 {
    let vl = verts[0];
    let vm = verts[verts.len() / 2];
    let vr = verts[verts.len() - 1];
    let original = (vr - vl).normalize();
    let prev = ex.raw_section_vertices(i - 1, None).0;
    let (pl, pr) = (prev[0], prev[prev.len() - 1]);
    let n1 = plane_normal(pl, vm, pr);
    let n2 = if i + 1 < segments {
        let next = ex.raw_section_vertices(i + 1, None).0;
        plane_normal(vl, next[next.len() / 2], vr)
    } else {
        // horizontal plane through the section midpoint
        plane_normal(vm + Vec3::X, vm, vm - Vec3::Z)
    };
    let cross = n1.cross(n2);
    if cross.mag2() < EPSILON {
        return original;
    }
    let mut dir = cross.normalize();
    if dir.dot(vr - vl) < 0.0 {
        dir = -dir;
    }
    let cos = dir.angle(vr - vl).cos();
    if cos.abs() < EPSILON {
        return original;
    }
    // a section already sitting on the neighbor plane keeps its line
    if n1.dot(vl - pl).abs() < threshold {
        return original;
    }
    dir * (1.0 / cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MaterialTable;
    use crate::types::defs::{ComponentDef, MeshDef, ParamKind, ParameterDef, RoadLikeDef};
    use crate::types::VarProfile;

    fn road_type() -> Arc<RoadLikeType> {
        let def = RoadLikeDef {
            name: "street".to_string(),
            parameters: vec![ParameterDef {
                name: "roadWidth".to_string(),
                kind: ParamKind::Float,
                instance_specific: false,
            }],
            textures: vec!["asphalt".to_string()],
            section_vertices: vec!["0 - roadWidth / 2".to_string(), "roadWidth / 2".to_string()],
            components: vec![ComponentDef {
                name: "surface".to_string(),
                main_mesh: Some(MeshDef {
                    vertices: vec!["v0".to_string(), "v1".to_string()],
                    uvs: vec!["(0, z)".to_string(), "(1, z)".to_string()],
                    faces: vec!["0".to_string()],
                    face_textures: vec!["0".to_string()],
                }),
                ..Default::default()
            }],
            textures_mapping: [("surface".to_string(), vec![0])].into_iter().collect(),
            ..Default::default()
        };
        Arc::new(RoadLikeType::new(def, VarProfile::Road).unwrap())
    }

    fn road_state(width: f32) -> ObjectState {
        let mut s = ObjectState::new();
        s.set_float("roadWidth", width);
        s
    }

    fn straight(len: f32) -> Vec<Vec3> {
        vec![Vec3::ZERO, vec3(0.0, 0.0, len)]
    }

    #[test]
    fn line_rebuild_is_gated_on_change() {
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        assert!(road.update_line());
        assert!(road.force_remesh);
        assert!(!road.update_line(), "no input changed");

        road.points[1] = vec3(0.0, 0.0, 30.0);
        assert!(road.update_line());
        road.state.set_float("roadWidth", 6.0);
        assert!(road.update_line(), "dirty state forces a rebuild");
    }

    #[test]
    fn two_station_straight_road_samples_exactly() {
        let mut state = road_state(4.0);
        state.set_int("segments", 1);
        let mut road =
            RoadElement::new(road_type(), state, vec![Vec3::ZERO, vec3(10.0, 0.0, 0.0)]);
        road.update_line();
        assert_eq!(road.curve_points, vec![Vec3::ZERO, vec3(10.0, 0.0, 0.0)]);
    }

    #[test]
    fn default_segments_give_three_stations() {
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        road.update_line();
        // default curve: 2 segments, so segments + 1 stations
        assert_eq!(road.curve_points.len(), 3);
        assert!(road.curve_points[1].approx_eq(vec3(0.0, 0.0, 10.0)));
    }

    #[test]
    fn segments_per_100m_scales_with_length() {
        let mut state = road_state(4.0);
        state.set_bool("segmentsPer100m", true);
        state.set_int("segments", 10);
        let road = RoadElement::new(road_type(), state, straight(50.0));
        assert_eq!(road.segments(), 5);
        let short = RoadElement::new(road_type(), road_state(4.0), straight(1.0));
        // plain mode ignores length
        assert_eq!(short.segments(), 3);
    }

    #[test]
    fn low_poly_uses_one_station_per_handle() {
        let mut state = road_state(4.0);
        state.set_int("curveType", 2);
        let points = vec![
            Vec3::ZERO,
            vec3(0.0, 0.0, 10.0),
            vec3(5.0, 0.0, 20.0),
            vec3(5.0, 0.0, 30.0),
        ];
        let mut road = RoadElement::new(road_type(), state, points.clone());
        road.update_line();
        assert_eq!(road.curve_points.len(), 4);
        for (c, p) in road.curve_points.iter().zip(&points) {
            assert!(c.approx_eq(*p));
        }
    }

    #[test]
    fn mesh_rebuild_consumes_the_flag() {
        let table = MaterialTable::default();
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        road.update_line();
        assert!(road.rebuild_mesh(None, None, &table));
        assert!(!road.mesh.is_empty());
        assert!(!road.rebuild_mesh(None, None, &table));
    }

    #[test]
    fn intersection_size_pulls_the_mouth_back() {
        let table = MaterialTable::default();
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        road.update_line();
        let info = EndInfo { size: 5.0, center: Vec3::ZERO, n_roads: 3 };
        road.rebuild_mesh(Some(info), None, &table);
        for v in &road.mesh.vertices {
            assert!(v.z > 4.9, "vertex {v:?} inside the intersection");
        }
    }

    #[test]
    fn standard_state_exports_parameters() {
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        road.update_line();
        let std_state = road.standard_state();
        assert_eq!(std_state.float("roadWidth"), 4.0);
        assert_eq!(road.standard_float("roadWidth"), 4.0);
    }

    #[test]
    fn crosswalk_size_defaults_to_one() {
        let mut road = RoadElement::new(road_type(), road_state(4.0), straight(20.0));
        assert_eq!(road.crosswalk_size(true), 1.0);
        road.state.set_float("startCrosswalkSize", 0.0);
        assert_eq!(road.crosswalk_size(true), 0.0);
        assert_eq!(road.crosswalk_size(false), 1.0);
    }
}
