use super::defs::TerrainPatchDef;

/// Terrain patches carry no formulas of their own; the descriptor is
/// used as-is, with the optional border wall resolved through the
/// registry at build time.
pub struct TerrainPatchType {
    pub name: String,
    pub def: TerrainPatchDef,
}

impl TerrainPatchType {
    pub fn new(def: TerrainPatchDef) -> Self {
        Self {
            name: def.name.clone(),
            def,
        }
    }
}
