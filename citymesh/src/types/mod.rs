//! Element types: serializable descriptors ([`defs`]) and their
//! compiled runtime forms, plus the registry the world looks them up
//! through.

use crate::error::TypeError;
use fnv::FnvHashMap;
use std::sync::Arc;

pub mod defs;
mod intersection;
mod roadlike;
mod terrain;

pub use defs::{
    ComponentDef, CrosswalkDef, DefinitionDef, ImportedParamDef, IntersectionDef, JunctionDef,
    JunctionRule, MeshDef, ParamKind, ParameterDef, RoadLikeDef, TerrainPatchDef,
    TextureDefinitionDef,
};
pub use intersection::{CompiledTextureDef, IntersectionType, JunctionType};
pub use roadlike::{CompiledComponent, CompiledMesh, CompiledValue, RoadLikeType, VarProfile};
pub use terrain::TerrainPatchType;

/// Compiled types by name. Descriptors are compiled on registration so
/// formula errors surface before any element references the type.
#[derive(Default)]
pub struct TypeRegistry {
    road_likes: FnvHashMap<String, Arc<RoadLikeType>>,
    intersections: FnvHashMap<String, Arc<IntersectionType>>,
    terrain_patches: FnvHashMap<String, Arc<TerrainPatchType>>,
}

impl TypeRegistry {
    pub fn register_road(&mut self, def: RoadLikeDef) -> Result<Arc<RoadLikeType>, TypeError> {
        self.register_road_like(def, VarProfile::Road)
    }

    /// Border walls share the road-like machinery but declare no
    /// intersection-runtime variables.
    pub fn register_border(&mut self, def: RoadLikeDef) -> Result<Arc<RoadLikeType>, TypeError> {
        self.register_road_like(def, VarProfile::Border)
    }

    fn register_road_like(
        &mut self,
        def: RoadLikeDef,
        profile: VarProfile,
    ) -> Result<Arc<RoadLikeType>, TypeError> {
        let ty = Arc::new(RoadLikeType::new(def, profile)?);
        self.road_likes.insert(ty.name.clone(), ty.clone());
        Ok(ty)
    }

    pub fn register_intersection(
        &mut self,
        def: IntersectionDef,
    ) -> Result<Arc<IntersectionType>, TypeError> {
        let ty = Arc::new(IntersectionType::new(def)?);
        self.intersections.insert(ty.name.clone(), ty.clone());
        Ok(ty)
    }

    pub fn register_terrain_patch(&mut self, def: TerrainPatchDef) -> Arc<TerrainPatchType> {
        let ty = Arc::new(TerrainPatchType::new(def));
        self.terrain_patches.insert(ty.name.clone(), ty.clone());
        ty
    }

    pub fn road_like(&self, name: &str) -> Result<Arc<RoadLikeType>, TypeError> {
        self.road_likes
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    pub fn intersection(&self, name: &str) -> Result<Arc<IntersectionType>, TypeError> {
        self.intersections
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    pub fn terrain_patch(&self, name: &str) -> Result<Arc<TerrainPatchType>, TypeError> {
        self.terrain_patches
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_an_error() {
        let reg = TypeRegistry::default();
        assert!(matches!(
            reg.road_like("nope"),
            Err(TypeError::UnknownType(_))
        ));
    }

    #[test]
    fn bad_formula_fails_registration() {
        let mut reg = TypeRegistry::default();
        let def = RoadLikeDef {
            name: "broken".to_string(),
            textures: vec![],
            section_vertices: vec!["undeclared + 1".to_string()],
            components: vec![],
            ..Default::default()
        };
        assert!(reg.register_road(def).is_err());
    }
}
