//! Compiled intersection types: junction patch types plus the pair
//! rules selecting between them.

use super::defs::{CrosswalkDef, ImportedParamDef, IntersectionDef, JunctionDef, JunctionRule};
use super::roadlike::{RoadLikeType, VarProfile};
use crate::calc::{ScalarId, VarKind, VariableContainer};
use crate::error::TypeError;
use fnv::FnvHashMap;
use std::sync::Arc;

pub struct CompiledTextureDef {
    pub name: String,
    pub options: Vec<String>,
    pub index: ScalarId,
}

/// One junction patch type: a road-like extrusion spanning the gap
/// between two clockwise-adjacent road ends, with extra variables
/// imported from the two roads' parameters.
pub struct JunctionType {
    pub road_like: Arc<RoadLikeType>,
    pub actual_segments: ScalarId,
    pub road_spline_vertex: usize,
    pub imported_parameters: Vec<ImportedParamDef>,
    pub texture_definitions: Vec<CompiledTextureDef>,
}

fn imported_var(kind: super::defs::ParamKind) -> VarKind {
    use super::defs::ParamKind;
    match kind {
        ParamKind::Vec2 => VarKind::Vec2,
        ParamKind::Vec3 => VarKind::Vec3,
        _ => VarKind::Float,
    }
}

impl JunctionType {
    pub fn new(def: JunctionDef) -> Result<Self, TypeError> {
        let extra_vars = def
            .imported_parameters
            .iter()
            .map(|p| (p.new_name.clone(), imported_var(p.kind)))
            .collect();
        let JunctionDef {
            road_like,
            actual_segments,
            road_spline_vertex,
            imported_parameters,
            texture_definitions,
        } = def;
        let mut road_like = RoadLikeType::with_extra_vars(road_like, VarProfile::Junction, extra_vars)?;
        let layout = road_like.layout_arc();
        let actual_segments = road_like.arena.parse_scalar(&actual_segments, &layout)?;
        let texture_definitions = texture_definitions
            .into_iter()
            .map(|t| {
                Ok(CompiledTextureDef {
                    index: road_like.arena.parse_scalar(&t.index, &layout)?,
                    name: t.name,
                    options: t.options,
                })
            })
            .collect::<Result<Vec<_>, TypeError>>()?;
        Ok(Self {
            road_like: Arc::new(road_like),
            actual_segments,
            road_spline_vertex,
            imported_parameters,
            texture_definitions,
        })
    }

    pub fn name(&self) -> &str {
        &self.road_like.name
    }

    pub fn road_like_arc(&self) -> Arc<RoadLikeType> {
        self.road_like.clone()
    }

    /// Interior subdivision count for the current pair, at least 1.
    pub fn eval_segments(&self, vc: &VariableContainer) -> usize {
        (self.road_like.arena.scalar(self.actual_segments, vc) as i32).max(1) as usize
    }

    /// Texture name picked by the definition's index formula, clamped
    /// into its options.
    pub fn pick_texture(&self, def: usize, vc: &VariableContainer) -> &str {
        let t = &self.texture_definitions[def];
        let i = self.road_like.arena.scalar(t.index, vc) as usize;
        &t.options[i.min(t.options.len().saturating_sub(1))]
    }
}

pub struct IntersectionType {
    pub name: String,
    junctions: Vec<Arc<JunctionType>>,
    by_name: FnvHashMap<String, usize>,
    rules: Vec<JunctionRule>,
    default_junction: Option<String>,
    pub surface_texture: String,
    pub surface_uv_mult: f32,
    pub crosswalk: Option<CrosswalkDef>,
}

impl IntersectionType {
    pub fn new(def: IntersectionDef) -> Result<Self, TypeError> {
        let mut junctions = Vec::with_capacity(def.junctions.len());
        let mut by_name = FnvHashMap::default();
        for j in def.junctions {
            let j = Arc::new(JunctionType::new(j)?);
            by_name.insert(j.name().to_string(), junctions.len());
            junctions.push(j);
        }
        Ok(Self {
            name: def.name,
            junctions,
            by_name,
            rules: def.rules,
            default_junction: def.default_junction,
            surface_texture: def.surface_texture,
            surface_uv_mult: def.surface_uv_mult,
            crosswalk: def.crosswalk,
        })
    }

    fn by_name(&self, name: &str) -> Option<&Arc<JunctionType>> {
        self.by_name.get(name).map(|&i| &self.junctions[i])
    }

    /// Junction type for the road-type pair `(a, b)` in clockwise
    /// order. Rules are tried in declaration order, the exact pair
    /// before the swapped one, then the default.
    pub fn junction_for(&self, a: &str, b: &str) -> Option<&Arc<JunctionType>> {
        for r in &self.rules {
            if r.road_a == a && r.road_b == b {
                return self.by_name(&r.junction);
            }
        }
        for r in &self.rules {
            if r.road_a == b && r.road_b == a {
                return self.by_name(&r.junction);
            }
        }
        self.default_junction.as_deref().and_then(|n| self.by_name(n))
    }
}
