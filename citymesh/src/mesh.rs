use fnv::FnvHashMap;
use geom::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Opaque handle to a host material. Handle 0 is the placeholder every
/// unresolved name degrades to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialHandle(pub u32);

impl MaterialHandle {
    pub const PLACEHOLDER: Self = Self(0);
}

/// Maps material names to handles. Resolution failures are not errors:
/// a missing texture yields the placeholder and a warning, and the mesh
/// is still built.
pub trait MaterialResolver {
    fn resolve(&self, name: &str) -> Option<MaterialHandle>;

    fn resolve_or_placeholder(&self, name: &str) -> MaterialHandle {
        self.resolve(name).unwrap_or_else(|| {
            log::warn!("unknown material \"{}\", using placeholder", name);
            MaterialHandle::PLACEHOLDER
        })
    }
}

/// Simple interning resolver. Hosts with a real asset store implement
/// [`MaterialResolver`] themselves.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MaterialTable {
    names: FnvHashMap<String, MaterialHandle>,
}

impl MaterialTable {
    pub fn intern(&mut self, name: &str) -> MaterialHandle {
        if let Some(&h) = self.names.get(name) {
            return h;
        }
        let h = MaterialHandle(self.names.len() as u32 + 1);
        self.names.insert(name.to_string(), h);
        h
    }
}

impl MaterialResolver for MaterialTable {
    fn resolve(&self, name: &str) -> Option<MaterialHandle> {
        self.names.get(name).copied()
    }
}

/// Two triangles closing the quad between consecutive cross-sections:
/// vertex `i` of one station, `i + 1`, and their `n`-strided twins on
/// the next station.
pub fn section_indices(i: u32, n: u32) -> [u32; 6] {
    [i, i + 1, i + 1 + n, i, i + 1 + n, i + n]
}

/// Rigid placement applied when merging meshes: scale, then rotation
/// around the up axis, then translation.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    pub y_angle: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: geom::vec3(1.0, 1.0, 1.0),
            y_angle: 0.0,
        }
    }
}

impl Transform {
    pub fn apply(&self, v: Vec3) -> Vec3 {
        (v * self.scale).rotate_about(Vec3::UP, self.y_angle) + self.position
    }

    fn is_identity(&self) -> bool {
        self.position == Vec3::ZERO
            && self.scale == geom::vec3(1.0, 1.0, 1.0)
            && self.y_angle == 0.0
    }
}

/// Vertex/uv buffers plus one index array per material slot. Every
/// triangle lives in exactly one slot; `materials[k]` is the material
/// of `indices[k]`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<Vec<u32>>,
    pub materials: Vec<MaterialHandle>,
}

impl TriangleMesh {
    /// An empty mesh with one index array per given material, in order.
    pub fn with_materials(materials: Vec<MaterialHandle>) -> Self {
        let indices = materials.iter().map(|_| Vec::new()).collect();
        Self {
            vertices: Vec::new(),
            uvs: Vec::new(),
            indices,
            materials,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.iter().all(|i| i.is_empty())
    }

    pub fn n_triangles(&self) -> usize {
        self.indices.iter().map(|i| i.len() / 3).sum()
    }

    /// Index array for the material, adding a new slot when absent.
    pub fn slot_for(&mut self, mat: MaterialHandle) -> usize {
        if let Some(i) = self.materials.iter().position(|&m| m == mat) {
            return i;
        }
        self.materials.push(mat);
        self.indices.push(Vec::new());
        self.materials.len() - 1
    }

    pub fn push_triangle(&mut self, slot: usize, a: u32, b: u32, c: u32) {
        self.indices[slot].extend_from_slice(&[a, b, c]);
    }

    /// Merges `meshes` under one transform, unioning material slots by
    /// handle (first-seen order) and remapping indices.
    pub fn merge(meshes: &[TriangleMesh], transform: &Transform) -> TriangleMesh {
        let mut slot_of: FnvHashMap<MaterialHandle, usize> = FnvHashMap::default();
        let mut res = TriangleMesh::default();
        for m in meshes {
            for &mat in &m.materials {
                slot_of.entry(mat).or_insert_with(|| {
                    res.materials.push(mat);
                    res.indices.push(Vec::new());
                    res.materials.len() - 1
                });
            }
        }
        let identity = transform.is_identity();
        for m in meshes {
            let base = res.vertices.len() as u32;
            if identity {
                res.vertices.extend_from_slice(&m.vertices);
            } else {
                res.vertices.extend(m.vertices.iter().map(|&v| transform.apply(v)));
            }
            res.uvs.extend_from_slice(&m.uvs);
            for (k, idx) in m.indices.iter().enumerate() {
                let slot = slot_of[&m.materials[k]];
                res.indices[slot].extend(idx.iter().map(|&i| base + i));
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{vec2, vec3};

    fn quad_mesh(mat: MaterialHandle, offset: f32) -> TriangleMesh {
        let mut m = TriangleMesh::with_materials(vec![mat]);
        m.vertices = vec![
            vec3(offset, 0.0, 0.0),
            vec3(offset + 1.0, 0.0, 0.0),
            vec3(offset + 1.0, 0.0, 1.0),
            vec3(offset, 0.0, 1.0),
        ];
        m.uvs = vec![
            vec2(0.0, 0.0),
            vec2(1.0, 0.0),
            vec2(1.0, 1.0),
            vec2(0.0, 1.0),
        ];
        m.push_triangle(0, 0, 1, 2);
        m.push_triangle(0, 0, 2, 3);
        m
    }

    #[test]
    fn section_indices_stride() {
        assert_eq!(section_indices(0, 3), [0, 1, 4, 0, 4, 3]);
        assert_eq!(section_indices(5, 2), [5, 6, 8, 5, 8, 7]);
    }

    #[test]
    fn merge_unions_materials_and_remaps() {
        let a = quad_mesh(MaterialHandle(1), 0.0);
        let b = quad_mesh(MaterialHandle(2), 5.0);
        let c = quad_mesh(MaterialHandle(1), 10.0);
        let merged = TriangleMesh::merge(&[a, b, c], &Transform::default());
        assert_eq!(merged.materials, vec![MaterialHandle(1), MaterialHandle(2)]);
        assert_eq!(merged.vertices.len(), 12);
        // the two mat-1 meshes share a slot
        assert_eq!(merged.indices[0].len(), 12);
        assert_eq!(merged.indices[1].len(), 6);
        // every index remapped in range
        for idx in &merged.indices {
            assert!(idx.iter().all(|&i| (i as usize) < merged.vertices.len()));
        }
        assert_eq!(merged.n_triangles(), 6);
    }

    #[test]
    fn merge_applies_transform() {
        let a = quad_mesh(MaterialHandle(1), 0.0);
        let t = Transform {
            position: vec3(10.0, 1.0, 0.0),
            scale: vec3(2.0, 1.0, 1.0),
            y_angle: 0.0,
        };
        let merged = TriangleMesh::merge(&[a], &t);
        assert!(merged.vertices[1].approx_eq(vec3(12.0, 1.0, 0.0)));
    }

    #[test]
    fn resolver_degrades_to_placeholder() {
        let mut table = MaterialTable::default();
        let asphalt = table.intern("asphalt");
        assert_eq!(table.resolve_or_placeholder("asphalt"), asphalt);
        assert_eq!(
            table.resolve_or_placeholder("missing"),
            MaterialHandle::PLACEHOLDER
        );
    }
}
