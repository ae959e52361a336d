//! Compiled form of [`RoadLikeDef`]: every formula parsed into the
//! shared arena, every variable bound to its container slot. Built once
//! per descriptor and shared behind an `Arc`; rebuilds only fork the
//! container and re-fill values.

use super::defs::{DefinitionDef, MeshDef, ParamKind, RoadLikeDef};
use crate::calc::{
    BoolId, ExprArena, Layout, ScalarId, VarKind, VariableContainer, Vec2Id, Vec3Id,
};
use crate::error::TypeError;
use crate::state::ObjectState;
use geom::{Vec2, Vec3};

/// Which standard variables the type declares. Roads carry the
/// intersection-runtime block, junction patches the pair flags, border
/// walls only the common set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarProfile {
    Road,
    Junction,
    Border,
}

#[derive(Copy, Clone, Debug)]
pub enum CompiledValue {
    Float(ScalarId),
    Bool(BoolId),
    Vec2(Vec2Id),
    Vec3(Vec3Id),
}

struct CompiledDefinition {
    name: String,
    value: CompiledValue,
}

pub struct CompiledMesh {
    pub vertices: Vec<Vec3Id>,
    pub uvs: Vec<Vec2Id>,
    pub faces: Vec<ScalarId>,
    pub face_textures: Vec<ScalarId>,
}

pub struct CompiledComponent {
    pub name: String,
    pub condition: Option<BoolId>,
    pub main_mesh: Option<CompiledMesh>,
    pub start_mesh: Option<CompiledMesh>,
    pub end_mesh: Option<CompiledMesh>,
    pub anchors: Vec<Vec3Id>,
    local_defs: Vec<CompiledDefinition>,
}

pub struct RoadLikeType {
    pub name: String,
    pub profile: VarProfile,
    pub def: RoadLikeDef,
    pub arena: ExprArena,
    container_proto: VariableContainer,
    static_defs: Vec<CompiledDefinition>,
    dynamic_defs: Vec<CompiledDefinition>,
    pub section_vertices: Vec<ScalarId>,
    pub anchors: Vec<Vec3Id>,
    pub components: Vec<CompiledComponent>,
}

fn standard_vars(profile: VarProfile, n_section_vertices: usize) -> Vec<(String, VarKind)> {
    use VarKind::*;
    let mut vars: Vec<(String, VarKind)> = Vec::new();
    for f in ["z", "totalLength", "segment", "segments", "ground"] {
        vars.push((f.to_string(), Float));
    }
    for v in [
        "localUp",
        "localRight",
        "localForward",
        "worldUp",
        "worldRight",
        "worldForward",
        "localUp0",
        "localRight0",
        "localForward0",
        "localUp1",
        "localRight1",
        "localForward1",
    ] {
        vars.push((v.to_string(), Vec3));
    }
    for i in 0..n_section_vertices {
        vars.push((format!("x{i}"), Float));
        vars.push((format!("absX{i}"), Float));
        vars.push((format!("absY{i}"), Float));
        vars.push((format!("absZ{i}"), Float));
        vars.push((format!("v{i}"), Vec3));
        vars.push((format!("v{i}_0"), Vec3));
        vars.push((format!("v{i}_1"), Vec3));
    }
    match profile {
        VarProfile::Road => {
            for f in [
                "throughIntersection",
                "startCrosswalkSize",
                "endCrosswalkSize",
                "hasStartIntersection",
                "hasEndIntersection",
                "maxScoreRoadIndex",
                "startIntersectionNumberOfRoads",
                "endIntersectionNumberOfRoads",
            ] {
                vars.push((f.to_string(), Float));
            }
            for v in [
                "startIntersectionPosition",
                "endIntersectionPosition",
                "startDir",
                "endDir",
            ] {
                vars.push((v.to_string(), Vec3));
            }
            for i in 0..n_section_vertices {
                for side in ["0", "1"] {
                    vars.push((format!("x{i}_{side}"), Float));
                    vars.push((format!("absX{i}_{side}"), Float));
                    vars.push((format!("absY{i}_{side}"), Float));
                    vars.push((format!("absZ{i}_{side}"), Float));
                }
            }
        }
        VarProfile::Junction => {
            for f in [
                "thisIsEndA",
                "thisIsEndB",
                "convex",
                "selfIntersectingSpline",
                "notDefaultTex",
            ] {
                vars.push((f.to_string(), Float));
            }
        }
        VarProfile::Border => {}
    }
    vars
}

fn param_var(kind: ParamKind) -> Option<VarKind> {
    match kind {
        ParamKind::Float | ParamKind::Int | ParamKind::Bool | ParamKind::Enum => {
            Some(VarKind::Float)
        }
        ParamKind::Vec2 => Some(VarKind::Vec2),
        ParamKind::Vec3 => Some(VarKind::Vec3),
        ParamKind::Str => None,
    }
}

fn definition_var(kind: ParamKind) -> VarKind {
    param_var(kind).unwrap_or(VarKind::Float)
}

impl RoadLikeType {
    pub fn new(def: RoadLikeDef, profile: VarProfile) -> Result<Self, TypeError> {
        Self::with_extra_vars(def, profile, Vec::new())
    }

    /// `extra_vars` lets the junction compiler declare the imported
    /// parameters' new names before binding.
    pub fn with_extra_vars(
        def: RoadLikeDef,
        profile: VarProfile,
        extra_vars: Vec<(String, VarKind)>,
    ) -> Result<Self, TypeError> {
        let mut vars = standard_vars(profile, def.section_vertices.len());
        vars.extend(extra_vars);
        for p in &def.parameters {
            if let Some(kind) = param_var(p.kind) {
                vars.push((p.name.clone(), kind));
            }
        }
        for d in def
            .static_definitions
            .iter()
            .chain(&def.dynamic_definitions)
        {
            vars.push((d.name.clone(), definition_var(d.kind)));
        }
        for c in &def.components {
            for d in &c.local_definitions {
                vars.push((d.name.clone(), definition_var(d.kind)));
            }
        }
        let container = VariableContainer::new(vars);
        let layout = container.layout();

        let mut arena = ExprArena::default();
        let compile_defs = |arena: &mut ExprArena,
                            defs: &[DefinitionDef]|
         -> Result<Vec<CompiledDefinition>, TypeError> {
            defs.iter()
                .map(|d| {
                    let value = match d.kind {
                        ParamKind::Float | ParamKind::Int | ParamKind::Enum => {
                            CompiledValue::Float(arena.parse_scalar(&d.value, layout)?)
                        }
                        ParamKind::Bool => CompiledValue::Bool(arena.parse_bool(&d.value, layout)?),
                        ParamKind::Vec2 => CompiledValue::Vec2(arena.parse_vec2(&d.value, layout)?),
                        ParamKind::Vec3 | ParamKind::Str => {
                            CompiledValue::Vec3(arena.parse_vec3(&d.value, layout)?)
                        }
                    };
                    Ok(CompiledDefinition {
                        name: d.name.clone(),
                        value,
                    })
                })
                .collect()
        };
        let static_defs = compile_defs(&mut arena, &def.static_definitions)?;
        let dynamic_defs = compile_defs(&mut arena, &def.dynamic_definitions)?;

        let section_vertices = def
            .section_vertices
            .iter()
            .map(|e| arena.parse_scalar(e, layout))
            .collect::<Result<Vec<_>, _>>()?;
        let anchors = def
            .anchors
            .iter()
            .map(|e| arena.parse_vec3(e, layout))
            .collect::<Result<Vec<_>, _>>()?;

        let compile_mesh = |arena: &mut ExprArena, m: &MeshDef| -> Result<CompiledMesh, TypeError> {
            Ok(CompiledMesh {
                vertices: m
                    .vertices
                    .iter()
                    .map(|e| arena.parse_vec3(e, layout))
                    .collect::<Result<_, _>>()?,
                uvs: m
                    .uvs
                    .iter()
                    .map(|e| arena.parse_vec2(e, layout))
                    .collect::<Result<_, _>>()?,
                faces: m
                    .faces
                    .iter()
                    .map(|e| arena.parse_scalar(e, layout))
                    .collect::<Result<_, _>>()?,
                face_textures: m
                    .face_textures
                    .iter()
                    .map(|e| arena.parse_scalar(e, layout))
                    .collect::<Result<_, _>>()?,
            })
        };

        let mut components = Vec::with_capacity(def.components.len());
        for c in &def.components {
            let condition = match &c.condition {
                Some(e) => Some(arena.parse_bool(e, layout)?),
                None => None,
            };
            let main_mesh = c
                .main_mesh
                .as_ref()
                .map(|m| compile_mesh(&mut arena, m))
                .transpose()?;
            let start_mesh = c
                .start_mesh
                .as_ref()
                .map(|m| compile_mesh(&mut arena, m))
                .transpose()?;
            let end_mesh = c
                .end_mesh
                .as_ref()
                .map(|m| compile_mesh(&mut arena, m))
                .transpose()?;
            let comp_anchors = c
                .anchors
                .iter()
                .map(|e| arena.parse_vec3(e, layout))
                .collect::<Result<Vec<_>, _>>()?;
            let local_defs = compile_defs(&mut arena, &c.local_definitions)?;
            components.push(CompiledComponent {
                name: c.name.clone(),
                condition,
                main_mesh,
                start_mesh,
                end_mesh,
                anchors: comp_anchors,
                local_defs,
            });
        }

        Ok(Self {
            name: def.name.clone(),
            profile,
            def,
            arena,
            container_proto: container,
            static_defs,
            dynamic_defs,
            section_vertices,
            anchors,
            components,
        })
    }

    pub fn fork_container(&self) -> VariableContainer {
        self.container_proto.fork()
    }

    pub fn layout(&self) -> &Layout {
        self.container_proto.layout()
    }

    pub fn layout_arc(&self) -> std::sync::Arc<Layout> {
        self.container_proto.layout_arc()
    }

    /// Number of anchor polylines this type emits per extrusion: the
    /// type-level anchors plus every component's.
    pub fn n_anchor_lines(&self) -> usize {
        self.anchors.len() + self.components.iter().map(|c| c.anchors.len()).sum::<usize>()
    }

    pub fn texture_slot(&self, component: &str, face_texture: usize) -> usize {
        self.def
            .textures_mapping
            .get(component)
            .and_then(|m| m.get(face_texture))
            .copied()
            .unwrap_or(face_texture)
    }

    fn fill_defs(&self, vc: &mut VariableContainer, defs: &[CompiledDefinition]) {
        for d in defs {
            match d.value {
                CompiledValue::Float(id) => {
                    let v = self.arena.scalar(id, vc);
                    vc.set_float(&d.name, v);
                }
                CompiledValue::Bool(id) => {
                    let v = self.arena.boolean(id, vc);
                    vc.set_bool(&d.name, v);
                }
                CompiledValue::Vec2(id) => {
                    let v = self.arena.vec2(id, vc);
                    vc.set_vec2(&d.name, v);
                }
                CompiledValue::Vec3(id) => {
                    let v = self.arena.vec3(id, vc);
                    vc.set_vec3(&d.name, v);
                }
            }
        }
    }

    pub fn fill_static_definitions(&self, vc: &mut VariableContainer) {
        self.fill_defs(vc, &self.static_defs);
    }

    fn fill_parameters(
        &self,
        vc: &mut VariableContainer,
        state: &ObjectState,
        instance_state: Option<&ObjectState>,
    ) {
        for p in &self.def.parameters {
            let real = if p.instance_specific {
                instance_state.unwrap_or(state)
            } else {
                state
            };
            match p.kind {
                ParamKind::Float => vc.set_float(&p.name, real.float(&p.name)),
                ParamKind::Int | ParamKind::Enum => vc.set_float(&p.name, real.int(&p.name) as f32),
                ParamKind::Bool => vc.set_bool(&p.name, real.bool(&p.name)),
                ParamKind::Vec2 => vc.set_vec2(&p.name, real.vec2(&p.name)),
                ParamKind::Vec3 => vc.set_vec3(&p.name, real.vec3(&p.name)),
                ParamKind::Str => {}
            }
        }
    }

    /// Once-per-rebuild bindings: world frame, totals, parameters and
    /// static definitions. Profile-specific standard variables are read
    /// from `state` (junction pair flags) or `runtime_state` (road
    /// intersection block).
    pub fn fill_initial_variables(
        &self,
        vc: &mut VariableContainer,
        state: &ObjectState,
        instance_state: Option<&ObjectState>,
        runtime_state: Option<&ObjectState>,
        total_length: f32,
        segments: usize,
    ) {
        vc.set_vec3("worldUp", Vec3::UP);
        vc.set_vec3("worldRight", Vec3::X);
        vc.set_vec3("worldForward", Vec3::Z);
        vc.set_float("totalLength", total_length);
        vc.set_float("segments", segments as f32);
        match self.profile {
            VarProfile::Road => {
                vc.set_float("startCrosswalkSize", state.float("startCrosswalkSize"));
                vc.set_float("endCrosswalkSize", state.float("endCrosswalkSize"));
                if let Some(rt) = runtime_state {
                    for b in ["throughIntersection", "hasStartIntersection", "hasEndIntersection"] {
                        vc.set_bool(b, rt.bool(b));
                    }
                    for f in [
                        "startIntersectionNumberOfRoads",
                        "endIntersectionNumberOfRoads",
                        "maxScoreRoadIndex",
                    ] {
                        vc.set_float(f, rt.float(f));
                    }
                    for v in [
                        "startIntersectionPosition",
                        "endIntersectionPosition",
                        "startDir",
                        "endDir",
                    ] {
                        vc.set_vec3(v, rt.vec3(v));
                    }
                }
            }
            VarProfile::Junction => {
                for b in [
                    "thisIsEndA",
                    "thisIsEndB",
                    "convex",
                    "selfIntersectingSpline",
                    "notDefaultTex",
                ] {
                    vc.set_bool(b, state.bool(b));
                }
            }
            VarProfile::Border => {}
        }
        self.fill_parameters(vc, state, instance_state);
        self.fill_static_definitions(vc);
    }

    /// First/last station frame, bound once before the station loop.
    pub fn fill_initial_segment_variables(
        &self,
        vc: &mut VariableContainer,
        right0: Vec3,
        right1: Vec3,
        section0: &[Vec3],
        section1: &[Vec3],
    ) {
        for (suffix, right) in [("0", right0), ("1", right1)] {
            let fwd = Vec3::UP.cross(right).normalize();
            vc.set_vec3(&format!("localUp{suffix}"), Vec3::UP);
            vc.set_vec3(&format!("localRight{suffix}"), right);
            vc.set_vec3(&format!("localForward{suffix}"), fwd);
        }
        for (i, (&s0, &s1)) in section0.iter().zip(section1).enumerate() {
            vc.set_vec3(&format!("v{i}_0"), s0);
            vc.set_vec3(&format!("v{i}_1"), s1);
        }
    }

    /// Per-station bindings, re-filled at every station before the
    /// component meshes are evaluated.
    #[allow(clippy::too_many_arguments)]
    pub fn fill_segment_variables(
        &self,
        vc: &mut VariableContainer,
        state: &ObjectState,
        instance_state: Option<&ObjectState>,
        pos: Vec3,
        right: Vec3,
        z: f32,
        ground: f32,
        section: usize,
        section_vertices: &[Vec3],
        curve_points: &[Vec3],
        segments: usize,
    ) {
        let fwd = Vec3::UP.cross(right).normalize();
        vc.set_vec3("localUp", Vec3::UP);
        vc.set_vec3("localRight", right);
        vc.set_vec3("localForward", fwd);
        vc.set_float("z", z);
        vc.set_float("ground", ground);
        vc.set_float("segment", section as f32);
        for (i, &v) in section_vertices.iter().enumerate() {
            vc.set_float(&format!("x{i}"), (v - pos).mag());
            vc.set_vec3(&format!("v{i}"), v);
            vc.set_float(&format!("absX{i}"), v.x);
            vc.set_float(&format!("absY{i}"), v.y);
            vc.set_float(&format!("absZ{i}"), v.z);
        }
        if self.profile == VarProfile::Road && self.needs_low_poly_fix(state, segments) {
            let mult = low_poly_curve_mult(section.wrapping_sub(2), curve_points);
            for p in &self.def.parameters {
                if p.kind == ParamKind::Float && self.def.widths.iter().any(|w| w == &p.name) {
                    let real = if p.instance_specific {
                        instance_state.unwrap_or(state)
                    } else {
                        state
                    };
                    vc.set_float(&p.name, real.float(&p.name) * mult);
                }
            }
            // adjusted widths can alter the static definitions
            self.fill_static_definitions(vc);
        }
        self.fill_defs(vc, &self.dynamic_defs);
    }

    /// Start/end section vertex bindings for the cap and anchor
    /// formulas (`x{i}_0`, `v{i}_1`, ...).
    pub fn fill_common_late_variables(
        &self,
        vc: &mut VariableContainer,
        start_pos: Vec3,
        end_pos: Vec3,
        start_section: &[Vec3],
        end_section: &[Vec3],
    ) {
        for (pos, section, suffix) in [(start_pos, start_section, "0"), (end_pos, end_section, "1")]
        {
            for (i, &v) in section.iter().enumerate() {
                vc.set_float(&format!("x{i}_{suffix}"), (v - pos).mag());
                vc.set_vec3(&format!("v{i}_{suffix}"), v);
                vc.set_float(&format!("absX{i}_{suffix}"), v.x);
                vc.set_float(&format!("absY{i}_{suffix}"), v.y);
                vc.set_float(&format!("absZ{i}_{suffix}"), v.z);
            }
        }
    }

    /// Local definitions of component `c`, evaluated only when its
    /// condition holds.
    pub fn fill_component_variables(&self, vc: &mut VariableContainer, c: usize) {
        let comp = &self.components[c];
        let enabled = match comp.condition {
            Some(id) => self.arena.boolean(id, vc),
            None => true,
        };
        if enabled {
            self.fill_defs(vc, &comp.local_defs);
        }
    }

    pub fn component_enabled(&self, c: usize, vc: &VariableContainer) -> bool {
        match self.components[c].condition {
            Some(id) => self.arena.boolean(id, vc),
            None => true,
        }
    }

    /// Compiled id of a named static or dynamic definition.
    pub fn named_definition(&self, name: &str) -> Option<CompiledValue> {
        self.static_defs
            .iter()
            .chain(&self.dynamic_defs)
            .find(|d| d.name == name)
            .map(|d| d.value)
    }

    fn parameter_kind(&self, name: &str) -> Option<ParamKind> {
        self.def.parameters.iter().find(|p| p.name == name).map(|p| p.kind)
    }

    /// Named getters resolve definitions first, then declared
    /// parameters, which live in the container under their own name.
    pub fn eval_named_float(&self, name: &str, vc: &VariableContainer) -> Option<f32> {
        match self.named_definition(name) {
            Some(CompiledValue::Float(id)) => Some(self.arena.scalar(id, vc)),
            Some(_) => None,
            None => match self.parameter_kind(name)? {
                ParamKind::Float | ParamKind::Int | ParamKind::Enum => vc.float(name),
                _ => None,
            },
        }
    }

    pub fn eval_named_vec3(&self, name: &str, vc: &VariableContainer) -> Option<Vec3> {
        match self.named_definition(name) {
            Some(CompiledValue::Vec3(id)) => Some(self.arena.vec3(id, vc)),
            Some(_) => None,
            None => match self.parameter_kind(name)? {
                ParamKind::Vec3 => vc.vec3(name),
                _ => None,
            },
        }
    }

    pub fn eval_named_bool(&self, name: &str, vc: &VariableContainer) -> Option<bool> {
        match self.named_definition(name) {
            Some(CompiledValue::Bool(id)) => Some(self.arena.boolean(id, vc)),
            Some(_) => None,
            None => match self.parameter_kind(name)? {
                ParamKind::Bool => vc.float(name).map(|v| v != 0.0),
                _ => None,
            },
        }
    }

    pub fn eval_named_vec2(&self, name: &str, vc: &VariableContainer) -> Option<Vec2> {
        match self.named_definition(name) {
            Some(CompiledValue::Vec2(id)) => Some(self.arena.vec2(id, vc)),
            Some(_) => None,
            None => match self.parameter_kind(name)? {
                ParamKind::Vec2 => vc.vec2(name),
                _ => None,
            },
        }
    }

    /// Evaluates every parameter and named definition into a state bag,
    /// used when a road's standard values feed another element's
    /// container.
    pub fn export_definitions(
        &self,
        vc: &VariableContainer,
        state: &ObjectState,
        instance_state: Option<&ObjectState>,
        out: &mut ObjectState,
    ) {
        for p in &self.def.parameters {
            let real = if p.instance_specific {
                instance_state.unwrap_or(state)
            } else {
                state
            };
            match p.kind {
                ParamKind::Float => out.set_float(p.name.clone(), real.float(&p.name)),
                ParamKind::Int | ParamKind::Enum => out.set_int(p.name.clone(), real.int(&p.name)),
                ParamKind::Bool => out.set_bool(p.name.clone(), real.bool(&p.name)),
                ParamKind::Vec2 => out.set_vec2(p.name.clone(), real.vec2(&p.name)),
                ParamKind::Vec3 => out.set_vec3(p.name.clone(), real.vec3(&p.name)),
                ParamKind::Str => out.set_str(p.name.clone(), real.str(&p.name)),
            }
        }
        for d in self.static_defs.iter().chain(&self.dynamic_defs) {
            match d.value {
                CompiledValue::Float(id) => out.set_float(d.name.clone(), self.arena.scalar(id, vc)),
                CompiledValue::Bool(id) => out.set_bool(d.name.clone(), self.arena.boolean(id, vc)),
                CompiledValue::Vec2(id) => out.set_vec2(d.name.clone(), self.arena.vec2(id, vc)),
                CompiledValue::Vec3(id) => out.set_vec3(d.name.clone(), self.arena.vec3(id, vc)),
            }
        }
    }

    pub fn needs_low_poly_fix(&self, state: &ObjectState, segments: usize) -> bool {
        segments > 2 && (state.int("curveType") == 2 || state.bool("adjustLowPolyWidth"))
    }
}

/// Widths measured perpendicular to a low-poly segment shrink at sharp
/// corners; stretch them by the half-angle secant.
fn low_poly_curve_mult(i: usize, curve_points: &[Vec3]) -> f32 {
    if curve_points.len() < 3 || i == 0 || i >= curve_points.len() - 1 {
        return 1.0;
    }
    let pos = curve_points[i];
    let ang = std::f32::consts::PI - (curve_points[i - 1] - pos).angle(curve_points[i + 1] - pos);
    1.0 / (ang * 0.5).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::defs::{ComponentDef, ParameterDef};
    use geom::vec3;

    fn simple_def() -> RoadLikeDef {
        RoadLikeDef {
            name: "strip".to_string(),
            parameters: vec![ParameterDef {
                name: "width".to_string(),
                kind: ParamKind::Float,
                instance_specific: false,
            }],
            static_definitions: vec![DefinitionDef {
                name: "halfWidth".to_string(),
                kind: ParamKind::Float,
                value: "width / 2".to_string(),
            }],
            textures: vec!["asphalt".to_string()],
            section_vertices: vec!["-halfWidth".to_string(), "halfWidth".to_string()],
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
        }
    }

    #[test]
    fn compiles_and_evaluates_section_vertices() {
        let ty = RoadLikeType::new(simple_def(), VarProfile::Road).unwrap();
        let mut vc = ty.fork_container();
        let mut state = ObjectState::new();
        state.set_float("width", 8.0);
        ty.fill_initial_variables(&mut vc, &state, None, None, 100.0, 5);
        let offsets: Vec<f32> = ty
            .section_vertices
            .iter()
            .map(|&id| ty.arena.scalar(id, &vc))
            .collect();
        assert_eq!(offsets, vec![-4.0, 4.0]);
    }

    #[test]
    fn named_getters_fall_back_to_parameters() {
        let ty = RoadLikeType::new(simple_def(), VarProfile::Road).unwrap();
        let mut vc = ty.fork_container();
        let mut state = ObjectState::new();
        state.set_float("width", 8.0);
        ty.fill_initial_variables(&mut vc, &state, None, None, 100.0, 5);
        // a definition resolves through its formula
        assert_eq!(ty.eval_named_float("halfWidth", &vc), Some(4.0));
        // a plain parameter resolves to its bound container value
        assert_eq!(ty.eval_named_float("width", &vc), Some(8.0));
        assert_eq!(ty.eval_named_float("bogus", &vc), None);
        // kind mismatches stay None instead of coercing
        assert_eq!(ty.eval_named_bool("width", &vc), None);
    }

    #[test]
    fn undeclared_variable_in_formula_fails() {
        let mut def = simple_def();
        def.section_vertices.push("bogus * 2".to_string());
        assert!(RoadLikeType::new(def, VarProfile::Road).is_err());
    }

    #[test]
    fn component_condition_gates_local_defs() {
        let mut def = simple_def();
        def.components[0].condition = Some("width > 5".to_string());
        let ty = RoadLikeType::new(def, VarProfile::Road).unwrap();
        let mut vc = ty.fork_container();
        let mut state = ObjectState::new();
        state.set_float("width", 3.0);
        ty.fill_initial_variables(&mut vc, &state, None, None, 10.0, 3);
        assert!(!ty.component_enabled(0, &vc));
        state.set_float("width", 6.0);
        ty.fill_initial_variables(&mut vc, &state, None, None, 10.0, 3);
        assert!(ty.component_enabled(0, &vc));
    }

    #[test]
    fn segment_fill_binds_section_frame() {
        let ty = RoadLikeType::new(simple_def(), VarProfile::Road).unwrap();
        let mut vc = ty.fork_container();
        let state = ObjectState::new();
        ty.fill_segment_variables(
            &mut vc,
            &state,
            None,
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            2.5,
            0.0,
            1,
            &[vec3(-4.0, 0.0, 0.0), vec3(4.0, 0.0, 0.0)],
            &[],
            2,
        );
        assert_eq!(vc.float("z"), Some(2.5));
        assert_eq!(vc.float("x0"), Some(4.0));
        assert_eq!(vc.vec3("v1"), Some(vec3(4.0, 0.0, 0.0)));
        // forward is up x right
        assert_eq!(vc.vec3("localForward"), Some(vec3(0.0, 0.0, -1.0)));
    }

    #[test]
    fn low_poly_mult_widens_corners() {
        let pts = [
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(1.0, 0.0, 1.0),
        ];
        let m = low_poly_curve_mult(1, &pts);
        // 90 degree corner: secant of 45 degrees
        assert!((m - std::f32::consts::SQRT_2).abs() < 1e-4);
        assert_eq!(low_poly_curve_mult(0, &pts), 1.0);
    }
}
