//! Serializable type descriptors. These are the data-driven side of the
//! engine: plain strings and lists, deserialized once and compiled into
//! the runtime types of the sibling modules.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Float,
    Int,
    Bool,
    Enum,
    Vec2,
    Vec3,
    Str,
}

/// A parameter read from the element's [`ObjectState`] into the
/// variable container before each rebuild.
///
/// [`ObjectState`]: crate::state::ObjectState
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub instance_specific: bool,
}

/// A named formula evaluated into the container. Static definitions
/// are computed once per rebuild, dynamic ones at every station.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefinitionDef {
    pub name: String,
    pub kind: ParamKind,
    pub value: String,
}

/// Vertex, uv, face and face-texture formulas of one mesh block.
/// `faces` yields local vertex indices; `face_textures` picks the
/// texture slot of each quad strip (main mesh) or triangle (caps)
/// through the component's texture mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshDef {
    pub vertices: Vec<String>,
    pub uvs: Vec<String>,
    pub faces: Vec<String>,
    pub face_textures: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComponentDef {
    pub name: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub main_mesh: Option<MeshDef>,
    #[serde(default)]
    pub start_mesh: Option<MeshDef>,
    #[serde(default)]
    pub end_mesh: Option<MeshDef>,
    /// vec3 formulas appended to side polylines, one point per station.
    #[serde(default)]
    pub anchors: Vec<String>,
    #[serde(default)]
    pub local_definitions: Vec<DefinitionDef>,
}

/// Descriptor of a section-extruded element: roads, junction patches
/// and terrain border walls all share this shape.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoadLikeDef {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub static_definitions: Vec<DefinitionDef>,
    #[serde(default)]
    pub dynamic_definitions: Vec<DefinitionDef>,
    /// Material names, one per texture slot, in slot order.
    pub textures: Vec<String>,
    /// Component name to per-component slot remap: the value of a
    /// face-texture formula indexes this list to find the real slot.
    #[serde(default)]
    pub textures_mapping: FnvHashMap<String, Vec<usize>>,
    /// Scalar formulas giving each cross-section vertex's offset along
    /// the right vector.
    pub section_vertices: Vec<String>,
    /// Re-bind the station variables before evaluating each section's
    /// vertices, for sections whose offsets depend on z or position.
    #[serde(default)]
    pub variable_sections: bool,
    /// Type-level anchor line formulas (vec3).
    #[serde(default)]
    pub anchors: Vec<String>,
    /// Width parameters scaled by the low-poly curve correction.
    #[serde(default)]
    pub widths: Vec<String>,
    pub components: Vec<ComponentDef>,
}

/// A parameter copied from an incident road's container into the
/// junction's container under a new name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportedParamDef {
    pub name: String,
    pub new_name: String,
    pub kind: ParamKind,
    /// Pull from the road at the junction's start side, else the end.
    #[serde(default)]
    pub from_start: bool,
}

/// A texture picked at mesh-build time: `index` is a scalar formula
/// selecting among `options`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextureDefinitionDef {
    pub name: String,
    pub options: Vec<String>,
    pub index: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JunctionDef {
    #[serde(flatten)]
    pub road_like: RoadLikeDef,
    /// Interior subdivision count, evaluated per pair.
    pub actual_segments: String,
    /// Which section vertex rides the road edge spline.
    #[serde(default)]
    pub road_spline_vertex: usize,
    #[serde(default)]
    pub imported_parameters: Vec<ImportedParamDef>,
    #[serde(default)]
    pub texture_definitions: Vec<TextureDefinitionDef>,
}

/// Picks the junction type for a clockwise-adjacent road pair by the
/// two roads' type names.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JunctionRule {
    pub road_a: String,
    pub road_b: String,
    pub junction: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrosswalkDef {
    pub texture: String,
    /// World length of one texture repeat; crosswalk UVs are rounded to
    /// whole repeats.
    pub repeat_length: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntersectionDef {
    pub name: String,
    pub junctions: Vec<JunctionDef>,
    pub rules: Vec<JunctionRule>,
    /// Fallback junction when no rule matches the pair.
    #[serde(default)]
    pub default_junction: Option<String>,
    pub surface_texture: String,
    #[serde(default = "default_uv_mult")]
    pub surface_uv_mult: f32,
    #[serde(default)]
    pub crosswalk: Option<CrosswalkDef>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TerrainPatchDef {
    pub name: String,
    pub surface_texture: String,
    #[serde(default = "default_uv_mult")]
    pub uv_mult: f32,
    #[serde(default)]
    pub smooth_iterations: u32,
    /// Name of a registered road-like type extruded along the patch
    /// perimeter as a border wall.
    #[serde(default)]
    pub border: Option<String>,
}

fn default_uv_mult() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_roadlike_json() {
        let json = r#"{
            "name": "basic_road",
            "textures": ["asphalt", "sidewalk"],
            "section_vertices": ["-width / 2", "width / 2"],
            "parameters": [{"name": "width", "kind": "float"}],
            "components": [{
                "name": "surface",
                "main_mesh": {
                    "vertices": ["v0", "v1"],
                    "uvs": ["(0, z)", "(1, z)"],
                    "faces": ["0"],
                    "face_textures": ["0"]
                }
            }],
            "textures_mapping": {"surface": [0]}
        }"#;
        let def: RoadLikeDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.name, "basic_road");
        assert_eq!(def.textures.len(), 2);
        assert!(def.components[0].condition.is_none());
        assert_eq!(def.textures_mapping["surface"], vec![0]);
    }
}
