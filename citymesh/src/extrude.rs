//! Section extrusion: sweeps a type's cross-section along a sampled
//! path, filling per-material-slot index buffers and side anchor
//! polylines. Roads, junction patches and terrain border walls all
//! build their strips through this.

use crate::calc::VariableContainer;
use crate::mesh::{section_indices, MaterialHandle, MaterialResolver, TriangleMesh};
use crate::state::ObjectState;
use crate::types::{CompiledMesh, RoadLikeType};
use geom::{Vec2, Vec3};
use std::sync::Arc;

/// Mesh and path buffers of one extrusion. The path arrays (`points`,
/// `rights`, `markers`, `ground_heights`, `section_rights`,
/// `section_vertices`) are filled by the caller before the station
/// loop; one entry per station.
pub struct SectionExtruder {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<Vec<u32>>,

    pub points: Vec<Vec3>,
    pub rights: Vec<Vec3>,
    pub markers: Vec<f32>,
    pub ground_heights: Vec<f32>,
    pub section_rights: Vec<Vec3>,
    pub section_vertices: Vec<Vec<Vec3>>,

    pub container: VariableContainer,

    ty: Arc<RoadLikeType>,
    state: ObjectState,
    instance_state: Option<ObjectState>,
    segments: usize,
    n: u32,
    verts_per_section: usize,
}

impl SectionExtruder {
    pub fn new(
        ty: Arc<RoadLikeType>,
        state: ObjectState,
        instance_state: Option<ObjectState>,
        segments: usize,
        slots: usize,
    ) -> Self {
        let container = ty.fork_container();
        Self {
            vertices: Vec::new(),
            uvs: Vec::new(),
            indices: vec![Vec::new(); slots],
            points: Vec::new(),
            rights: Vec::new(),
            markers: Vec::new(),
            ground_heights: Vec::new(),
            section_rights: Vec::new(),
            section_vertices: Vec::new(),
            container,
            ty,
            state,
            instance_state,
            segments,
            n: 0,
            verts_per_section: 0,
        }
    }

    /// Clears every buffer for a fresh extrusion. The container is only
    /// reforked when the type actually changed.
    pub fn reset(
        &mut self,
        ty: Arc<RoadLikeType>,
        state: ObjectState,
        instance_state: Option<ObjectState>,
        segments: usize,
        slots: usize,
    ) {
        if !Arc::ptr_eq(&self.ty, &ty) {
            self.container = ty.fork_container();
            self.ty = ty;
        }
        self.vertices.clear();
        self.uvs.clear();
        self.indices.clear();
        self.indices.resize(slots, Vec::new());
        self.points.clear();
        self.rights.clear();
        self.markers.clear();
        self.ground_heights.clear();
        self.section_rights.clear();
        self.section_vertices.clear();
        self.state = state;
        self.instance_state = instance_state;
        self.segments = segments;
        self.n = 0;
        self.verts_per_section = 0;
    }

    pub fn ty(&self) -> &Arc<RoadLikeType> {
        &self.ty
    }

    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn verts_per_section(&self) -> usize {
        self.verts_per_section
    }

    /// Binds the first and last station frames, used by the cap and
    /// anchor formulas before the loop reaches them.
    pub fn init_base_info(&mut self) {
        match (self.section_vertices.first(), self.section_vertices.last()) {
            (Some(first), Some(last)) => {
                let r0 = self.section_rights[0];
                let r1 = self.section_rights[self.section_rights.len() - 1];
                self.ty
                    .fill_initial_segment_variables(&mut self.container, r0, r1, first, last);
            }
            _ => self.ty.fill_initial_segment_variables(
                &mut self.container,
                Vec3::ZERO,
                Vec3::ZERO,
                &[],
                &[],
            ),
        }
    }

    /// Binds station `i`'s variables. Station 1 also fixes the section
    /// stride used by the quad-strip indices.
    pub fn init_section(&mut self, i: usize) {
        if i == 1 {
            self.n = self.vertices.len() as u32;
        }
        let ground = self.ground_heights.get(i).copied().unwrap_or(0.0);
        self.ty.fill_segment_variables(
            &mut self.container,
            &self.state,
            self.instance_state.as_ref(),
            self.points[i],
            self.section_rights[i],
            self.markers[i],
            ground,
            i + 1,
            &self.section_vertices[i],
            &self.points,
            self.segments,
        );
    }

    /// Emits station `i`: anchor points, component vertices/uvs, the
    /// quad strip back to station `i - 1`, and both caps on the last
    /// station. `side_polylines` receives one point per anchor line.
    pub fn add_section(&mut self, i: usize, mut side_polylines: Option<&mut Vec<Vec<Vec3>>>) {
        self.add_section_from(i, &mut side_polylines, 0)
    }

    pub fn add_section_from(
        &mut self,
        i: usize,
        side_polylines: &mut Option<&mut Vec<Vec<Vec3>>>,
        mut anchor_line: usize,
    ) {
        let ty = self.ty.clone();
        if let Some(lines) = side_polylines.as_deref_mut() {
            for &a in &ty.anchors {
                lines[anchor_line].push(ty.arena.vec3(a, &self.container));
                anchor_line += 1;
            }
        }
        for c in 0..ty.components.len() {
            if !ty.component_enabled(c, &self.container) {
                continue;
            }
            ty.fill_component_variables(&mut self.container, c);
            if let Some(lines) = side_polylines.as_deref_mut() {
                for &a in &ty.components[c].anchors {
                    lines[anchor_line].push(ty.arena.vec3(a, &self.container));
                    anchor_line += 1;
                }
            }
            if let Some(mesh) = &ty.components[c].main_mesh {
                self.add_mesh(i, &ty, c, true, mesh);
            }
        }
        if i == self.segments - 1 {
            // end cap
            for c in 0..ty.components.len() {
                let Some(mesh) = &ty.components[c].end_mesh else { continue };
                if ty.component_enabled(c, &self.container) {
                    ty.fill_component_variables(&mut self.container, c);
                    self.add_mesh(i, &ty, c, false, mesh);
                }
            }
            // start cap, re-evaluated at station 0's parameters
            ty.fill_segment_variables(
                &mut self.container,
                &self.state,
                self.instance_state.as_ref(),
                self.points[0],
                self.section_rights[0],
                self.markers[0],
                0.0,
                1,
                &self.section_vertices[0],
                &self.points,
                self.segments,
            );
            for c in 0..ty.components.len() {
                let Some(mesh) = &ty.components[c].start_mesh else { continue };
                if ty.component_enabled(c, &self.container) {
                    ty.fill_component_variables(&mut self.container, c);
                    self.add_mesh(i, &ty, c, false, mesh);
                }
            }
        }
        if i == 0 {
            self.verts_per_section = self.vertices.len();
        }
    }

    fn add_mesh(&mut self, i: usize, ty: &RoadLikeType, c: usize, main: bool, mesh: &CompiledMesh) {
        let cur_v = if main {
            self.vertices.len() as u32 - self.n
        } else {
            self.vertices.len() as u32
        };
        self.vertices
            .extend(mesh.vertices.iter().map(|&v| ty.arena.vec3(v, &self.container)));
        self.uvs
            .extend(mesh.uvs.iter().map(|&u| ty.arena.vec2(u, &self.container)));

        let comp_name = &ty.components[c].name;
        if main {
            // the strip needs the previous station's vertices
            if i == 0 {
                return;
            }
            for (j, &tex) in mesh.face_textures.iter().enumerate() {
                let slot = ty.texture_slot(comp_name, ty.arena.scalar(tex, &self.container) as usize);
                let face = ty.arena.scalar(mesh.faces[j], &self.container) as u32;
                self.indices[slot].extend_from_slice(&section_indices(cur_v + face, self.n));
            }
        } else {
            for (j, &tex) in mesh.face_textures.iter().enumerate() {
                let slot = ty.texture_slot(comp_name, ty.arena.scalar(tex, &self.container) as usize);
                for k in 0..3 {
                    let v = ty.arena.scalar(mesh.faces[j * 3 + k], &self.container) as u32;
                    self.indices[slot].push(cur_v + v);
                }
            }
        }
    }

    /// World positions of the cross-section vertices at station `i`:
    /// the section-vertex formulas give offsets along the right vector.
    /// A forced right direction keeps the original's length.
    pub fn raw_section_vertices(&self, i: usize, forced_right: Option<Vec3>) -> (Vec<Vec3>, Vec3) {
        let pos = self.points[i];
        let right = forced_right.unwrap_or(self.rights[i]) * self.rights[i].mag();
        let res = self
            .ty
            .section_vertices
            .iter()
            .map(|&id| pos + right * self.ty.arena.scalar(id, &self.container))
            .collect();
        (res, right)
    }

    /// Runs the whole station loop. Fewer than 2 stations yield no
    /// geometry.
    pub fn run(&mut self, mut side_polylines: Option<&mut Vec<Vec<Vec3>>>) {
        if self.segments < 2 {
            return;
        }
        self.init_base_info();
        for i in 0..self.segments {
            self.init_section(i);
            self.add_section_from(i, &mut side_polylines, 0);
        }
    }

    /// One empty polyline per anchor line the type will emit, component
    /// conditions evaluated against the current container.
    pub fn make_side_polylines(&self) -> Vec<Vec<Vec3>> {
        let mut count = self.ty.anchors.len();
        for c in 0..self.ty.components.len() {
            if self.ty.component_enabled(c, &self.container) {
                count += self.ty.components[c].anchors.len();
            }
        }
        vec![Vec::new(); count]
    }

    /// Drains the buffers into a [`TriangleMesh`], resolving the type's
    /// texture names and dropping empty slots.
    pub fn take_mesh(&mut self, resolver: &dyn MaterialResolver) -> TriangleMesh {
        let mut mesh = TriangleMesh {
            vertices: std::mem::take(&mut self.vertices),
            uvs: std::mem::take(&mut self.uvs),
            indices: Vec::new(),
            materials: Vec::new(),
        };
        for (slot, idx) in std::mem::take(&mut self.indices).into_iter().enumerate() {
            if idx.is_empty() {
                continue;
            }
            let mat = self
                .ty
                .def
                .textures
                .get(slot)
                .map(|t| resolver.resolve_or_placeholder(t))
                .unwrap_or(MaterialHandle::PLACEHOLDER);
            mesh.materials.push(mat);
            mesh.indices.push(idx);
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MaterialTable;
    use crate::types::defs::{ComponentDef, MeshDef, ParamKind, ParameterDef, RoadLikeDef};
    use crate::types::VarProfile;
    use geom::vec3;

    fn strip_type() -> Arc<RoadLikeType> {
        let def = RoadLikeDef {
            name: "strip".to_string(),
            parameters: vec![ParameterDef {
                name: "width".to_string(),
                kind: ParamKind::Float,
                instance_specific: false,
            }],
            textures: vec!["asphalt".to_string()],
            textures_mapping: [("surface".to_string(), vec![0])].into_iter().collect(),
            section_vertices: vec!["0 - width / 2".to_string(), "width / 2".to_string()],
            anchors: vec!["v0".to_string(), "v1".to_string()],
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
            ..Default::default()
        };
        Arc::new(RoadLikeType::new(def, VarProfile::Road).unwrap())
    }

    fn straight_extruder(segments: usize) -> SectionExtruder {
        let ty = strip_type();
        let mut state = ObjectState::new();
        state.set_float("width", 2.0);
        let mut ex = SectionExtruder::new(ty.clone(), state.clone(), None, segments, 1);
        let mut vc = ex.container.clone();
        ty.fill_initial_variables(&mut vc, &state, None, None, (segments - 1) as f32, segments);
        ex.container = vc;
        for i in 0..segments {
            let pos = vec3(0.0, 0.0, i as f32);
            ex.points.push(pos);
            ex.rights.push(Vec3::X);
            ex.markers.push(i as f32);
            ex.ground_heights.push(0.0);
            ex.section_rights.push(Vec3::X);
            ex.section_vertices
                .push(vec![pos - vec3(1.0, 0.0, 0.0), pos + vec3(1.0, 0.0, 0.0)]);
        }
        ex
    }

    #[test]
    fn straight_strip_counts() {
        let mut ex = straight_extruder(4);
        let mut lines = ex.make_side_polylines();
        ex.run(Some(&mut lines));
        // 2 vertices per station
        assert_eq!(ex.vertices.len(), 8);
        assert_eq!(ex.uvs.len(), 8);
        // 3 quads of 2 triangles
        assert_eq!(ex.indices[0].len(), 18);
        assert_eq!(ex.verts_per_section(), 2);
        // 2 anchor lines, one point per station
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 4));
        let table = MaterialTable::default();
        let mesh = ex.take_mesh(&table);
        assert_eq!(mesh.n_triangles(), 6);
        assert!(mesh
            .indices
            .iter()
            .flatten()
            .all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn single_station_yields_nothing() {
        let mut ex = straight_extruder(1);
        ex.segments = 1;
        ex.run(None);
        assert!(ex.vertices.is_empty());
        assert!(ex.indices[0].is_empty());
    }

    #[test]
    fn quad_strip_uses_station_stride() {
        let mut ex = straight_extruder(3);
        ex.run(None);
        // first quad connects station 0 (verts 0, 1) to station 1
        assert_eq!(&ex.indices[0][..6], &section_indices(0, 2));
    }

    #[test]
    fn raw_section_vertices_follow_right() {
        let mut ex = straight_extruder(3);
        ex.init_base_info();
        ex.init_section(0);
        let (verts, right) = ex.raw_section_vertices(0, None);
        assert_eq!(right, Vec3::X);
        assert!(verts[0].approx_eq(vec3(-1.0, 0.0, 0.0)));
        assert!(verts[1].approx_eq(vec3(1.0, 0.0, 0.0)));
    }

    #[test]
    fn caps_append_triangles_after_strip() {
        let mut def = RoadLikeDef {
            name: "capped".to_string(),
            textures: vec!["asphalt".to_string()],
            textures_mapping: [("surface".to_string(), vec![0])].into_iter().collect(),
            section_vertices: vec!["0 - 1".to_string(), "1".to_string()],
            components: vec![ComponentDef {
                name: "surface".to_string(),
                main_mesh: Some(MeshDef {
                    vertices: vec!["v0".to_string(), "v1".to_string()],
                    uvs: vec!["(0, z)".to_string(), "(1, z)".to_string()],
                    faces: vec!["0".to_string()],
                    face_textures: vec!["0".to_string()],
                }),
                end_mesh: Some(MeshDef {
                    vertices: vec![
                        "v0".to_string(),
                        "v1".to_string(),
                        "(v0 + v1) / 2 + localUp".to_string(),
                    ],
                    uvs: vec!["(0, 0)".to_string(), "(1, 0)".to_string(), "(0.5, 1)".to_string()],
                    faces: vec!["0".to_string(), "1".to_string(), "2".to_string()],
                    face_textures: vec!["0".to_string()],
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        def.parameters = Vec::new();
        let ty = Arc::new(RoadLikeType::new(def, VarProfile::Road).unwrap());
        let mut ex = SectionExtruder::new(ty, ObjectState::new(), None, 2, 1);
        for i in 0..2 {
            let pos = vec3(0.0, 0.0, i as f32);
            ex.points.push(pos);
            ex.rights.push(Vec3::X);
            ex.markers.push(i as f32);
            ex.ground_heights.push(0.0);
            ex.section_rights.push(Vec3::X);
            ex.section_vertices
                .push(vec![pos - vec3(1.0, 0.0, 0.0), pos + vec3(1.0, 0.0, 0.0)]);
        }
        ex.run(None);
        // 2 strip verts per station + 3 cap verts
        assert_eq!(ex.vertices.len(), 7);
        // 1 strip quad + 1 cap triangle
        assert_eq!(ex.indices[0].len(), 9);
        // cap indices reference the cap's own vertices
        assert!(ex.indices[0][6..].iter().all(|&i| i >= 4));
    }
}
