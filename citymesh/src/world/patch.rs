//! A terrain patch element: a perimeter polygon with optional interior
//! points and border wall strips, rebuilt only when its inputs moved.

use crate::mesh::{MaterialResolver, TriangleMesh};
use crate::state::ObjectState;
use crate::terrain::{self, BorderStrip};
use crate::types::{TerrainPatchType, TypeRegistry};
use geom::{polygon_is_clockwise_xz, Vec3};
use std::sync::Arc;

/// A stretch of the perimeter walled off with a road-like extrusion.
/// `segment` indexes into the patch perimeter.
pub struct BorderMesh {
    pub segment: Vec<usize>,
    pub ty_name: String,
    pub state: ObjectState,
}

pub struct TerrainPatchElement {
    pub ty: Arc<TerrainPatchType>,
    pub state: ObjectState,
    pub perimeter: Vec<Vec3>,
    pub interior: Vec<Vec3>,
    pub borders: Vec<BorderMesh>,
    pub mesh: TriangleMesh,
    old_perimeter: Vec<Vec3>,
    old_interior: Vec<Vec3>,
    old_border_count: usize,
}

impl TerrainPatchElement {
    pub fn new(ty: Arc<TerrainPatchType>, state: ObjectState, perimeter: Vec<Vec3>) -> Self {
        Self {
            ty,
            state,
            perimeter,
            interior: Vec::new(),
            borders: Vec::new(),
            mesh: TriangleMesh::default(),
            old_perimeter: Vec::new(),
            old_interior: Vec::new(),
            old_border_count: usize::MAX,
        }
    }

    fn points_moved(old: &[Vec3], new: &[Vec3]) -> bool {
        old.len() != new.len() || old.iter().zip(new).any(|(a, b)| !a.approx_eq(*b))
    }

    fn did_change(&self) -> bool {
        self.state.is_dirty()
            || self.old_border_count != self.borders.len()
            || self.borders.iter().any(|b| b.state.is_dirty())
            || Self::points_moved(&self.old_perimeter, &self.perimeter)
            || Self::points_moved(&self.old_interior, &self.interior)
    }

    /// Remeshes the patch when anything changed. Returns 1 on a rebuild.
    pub fn update_patch(&mut self, reg: &TypeRegistry, resolver: &dyn MaterialResolver) -> usize {
        if !self.did_change() {
            return 0;
        }
        self.old_perimeter = self.perimeter.clone();
        self.old_interior = self.interior.clone();
        self.old_border_count = self.borders.len();
        self.state.mark_clean();
        for b in &mut self.borders {
            b.state.mark_clean();
        }

        if self.perimeter.len() <= 2 {
            self.mesh = TriangleMesh::default();
            return 1;
        }

        let texture = if self.state.contains("texture") {
            self.state.str("texture").to_string()
        } else {
            self.ty.def.surface_texture.clone()
        };
        let smooth = if self.state.contains("smooth") {
            self.state.int("smooth").max(0) as u32
        } else {
            self.ty.def.smooth_iterations
        };

        let clockwise = polygon_is_clockwise_xz(&self.perimeter);
        let mut strips: Vec<BorderStrip> = Vec::with_capacity(self.borders.len());
        for b in &self.borders {
            let ty = match reg.road_like(&b.ty_name) {
                Ok(ty) => ty,
                Err(err) => {
                    log::warn!("terrain border skipped: {}", err);
                    continue;
                }
            };
            let mut indices = b.segment.clone();
            if !clockwise {
                indices.reverse();
            }
            let points: Vec<Vec3> = indices
                .iter()
                .filter_map(|&i| self.perimeter.get(i).copied())
                .collect();
            if points.len() < 2 {
                continue;
            }
            // left vectors from the averaged neighbor directions,
            // pointing away from the patch
            let n = points.len();
            let mut lefts = Vec::with_capacity(n);
            for j in 0..n {
                let prev = if j > 0 {
                    (points[j] - points[j - 1]).normalize()
                } else {
                    Vec3::ZERO
                };
                let next = if j + 1 < n {
                    (points[j + 1] - points[j]).normalize()
                } else {
                    Vec3::ZERO
                };
                let dir = if j == 0 {
                    next
                } else if j + 1 == n {
                    prev
                } else {
                    (prev + next) * 0.5
                };
                lefts.push(dir.cross(Vec3::UP).normalize());
            }
            strips.push(BorderStrip {
                segment: points,
                lefts,
                ty,
                state: b.state.clone(),
                instance_state: None,
            });
        }

        self.mesh = terrain::build_patch(
            &self.perimeter,
            &self.interior,
            &strips,
            &texture,
            smooth,
            self.ty.def.uv_mult,
            resolver,
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MaterialTable;
    use crate::types::defs::TerrainPatchDef;
    use geom::vec3;

    fn patch_type() -> Arc<TerrainPatchType> {
        Arc::new(TerrainPatchType::new(TerrainPatchDef {
            name: "grass".to_string(),
            surface_texture: "grass".to_string(),
            uv_mult: 1.0,
            smooth_iterations: 0,
            border: None,
        }))
    }

    fn square() -> Vec<Vec3> {
        vec![
            vec3(0.0, 0.0, 0.0),
            vec3(4.0, 0.0, 0.0),
            vec3(4.0, 0.0, 4.0),
            vec3(0.0, 0.0, 4.0),
        ]
    }

    #[test]
    fn rebuild_is_gated_on_change() {
        let reg = TypeRegistry::default();
        let table = MaterialTable::default();
        let mut patch = TerrainPatchElement::new(patch_type(), ObjectState::new(), square());
        assert_eq!(patch.update_patch(&reg, &table), 1);
        assert_eq!(patch.mesh.n_triangles(), 2);
        assert_eq!(patch.update_patch(&reg, &table), 0);

        patch.perimeter[2] = vec3(5.0, 0.0, 5.0);
        assert_eq!(patch.update_patch(&reg, &table), 1);
        patch.state.set_int("smooth", 2);
        assert_eq!(patch.update_patch(&reg, &table), 1, "dirty state remeshes");
    }

    #[test]
    fn tiny_perimeter_clears_the_mesh() {
        let reg = TypeRegistry::default();
        let table = MaterialTable::default();
        let mut patch = TerrainPatchElement::new(patch_type(), ObjectState::new(), square());
        patch.update_patch(&reg, &table);
        patch.perimeter.truncate(2);
        assert_eq!(patch.update_patch(&reg, &table), 1);
        assert!(patch.mesh.is_empty());
    }

    #[test]
    fn unknown_border_type_is_skipped() {
        let reg = TypeRegistry::default();
        let table = MaterialTable::default();
        let mut patch = TerrainPatchElement::new(patch_type(), ObjectState::new(), square());
        patch.borders.push(BorderMesh {
            segment: vec![0, 1],
            ty_name: "missing_wall".to_string(),
            state: ObjectState::new(),
        });
        assert_eq!(patch.update_patch(&reg, &table), 1);
        // surface still built
        assert_eq!(patch.mesh.n_triangles(), 2);
    }
}
