//! The live city: slotmaps of road, intersection and terrain patch
//! elements, updated lazily by [`CityWorld::process_update`].

use crate::mesh::MaterialResolver;
use crate::types::TypeRegistry;
use geom::{Vec3, EPSILON};
use slotmapd::{new_key_type, HopSlotMap};

mod citywide;
mod intersection;
mod patch;
mod road;

pub use citywide::{CitywideParams, CitywideTerrain, StepProgress};
pub use intersection::IntersectionElement;
pub use patch::{BorderMesh, TerrainPatchElement};
pub use road::{EndInfo, RoadElement};

new_key_type! {
    pub struct RoadId;
    pub struct IntersectionId;
    pub struct PatchId;
}

/// Rebuild counts of one update pass, mostly for logging and tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildCounts {
    pub roads: usize,
    pub intersections: usize,
    pub patches: usize,
}

#[derive(Default)]
pub struct CityWorld {
    pub roads: HopSlotMap<RoadId, RoadElement>,
    pub intersections: HopSlotMap<IntersectionId, IntersectionElement>,
    pub patches: HopSlotMap<PatchId, TerrainPatchElement>,
    changed: bool,
}

impl CityWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the world dirty. The next [`process_update`] call walks
    /// the elements; nothing happens before.
    ///
    /// [`process_update`]: CityWorld::process_update
    pub fn flag_changed(&mut self) {
        self.changed = true;
    }

    pub fn add_road(&mut self, road: RoadElement) -> RoadId {
        self.changed = true;
        self.roads.insert(road)
    }

    pub fn add_intersection(&mut self, inter: IntersectionElement) -> IntersectionId {
        self.changed = true;
        self.intersections.insert(inter)
    }

    pub fn add_patch(&mut self, patch: TerrainPatchElement) -> PatchId {
        self.changed = true;
        self.patches.insert(patch)
    }

    /// Attaches one road end to an intersection and snaps the endpoint
    /// handle to the intersection center.
    pub fn connect(&mut self, road: RoadId, inter: IntersectionId, at_start: bool) {
        let Some(r) = self.roads.get_mut(road) else { return };
        let Some(i) = self.intersections.get_mut(inter) else { return };
        if at_start {
            r.start_intersection = Some(inter);
            if let Some(p) = r.points.first_mut() {
                *p = i.center;
            }
        } else {
            r.end_intersection = Some(inter);
            if let Some(p) = r.points.last_mut() {
                *p = i.center;
            }
        }
        if !i.roads.contains(&road) {
            i.roads.push(road);
        }
        i.force_remesh = true;
        self.changed = true;
    }

    pub fn remove_road(&mut self, road: RoadId) {
        if self.roads.remove(road).is_some() {
            for inter in self.intersections.values_mut() {
                if let Some(k) = inter.roads.iter().position(|&r| r == road) {
                    inter.roads.remove(k);
                    inter.force_remesh = true;
                }
            }
            self.changed = true;
        }
    }

    pub fn remove_intersection(&mut self, inter: IntersectionId) {
        if self.intersections.remove(inter).is_some() {
            for road in self.roads.values_mut() {
                if road.start_intersection == Some(inter) {
                    road.start_intersection = None;
                }
                if road.end_intersection == Some(inter) {
                    road.end_intersection = None;
                }
            }
            self.changed = true;
        }
    }

    pub fn remove_patch(&mut self, patch: PatchId) {
        if self.patches.remove(patch).is_some() {
            self.changed = true;
        }
    }

    /// Set the center of an intersection, dragging its road ends along
    /// on the next update.
    pub fn move_intersection(&mut self, inter: IntersectionId, center: Vec3) {
        if let Some(i) = self.intersections.get_mut(inter) {
            i.center = center;
            self.changed = true;
        }
    }

    fn drop_dead_references(&mut self) {
        let roads = &self.roads;
        for inter in self.intersections.values_mut() {
            let before = inter.roads.len();
            inter.roads.retain(|&r| roads.contains_key(r));
            if inter.roads.len() != before {
                inter.force_remesh = true;
            }
        }
        let inters = &self.intersections;
        for road in self.roads.values_mut() {
            if road.start_intersection.is_some_and(|i| !inters.contains_key(i)) {
                road.start_intersection = None;
            }
            if road.end_intersection.is_some_and(|i| !inters.contains_key(i)) {
                road.end_intersection = None;
            }
        }
    }

    fn update_lines(&mut self) {
        for road in self.roads.values_mut() {
            if !road.update_line() {
                continue;
            }
            for inter in [road.start_intersection, road.end_intersection]
                .into_iter()
                .flatten()
            {
                if let Some(i) = self.intersections.get_mut(inter) {
                    i.force_remesh = true;
                }
            }
        }
    }

    /// Syncs each intersection with its center: a moved center flags
    /// the remesh and drags the attached road endpoint handles along.
    fn sync_intersections(&mut self) {
        let ids: Vec<IntersectionId> = self.intersections.keys().collect();
        for iid in ids {
            let inter = &mut self.intersections[iid];
            if inter.state.is_dirty() || inter.instance_state.is_dirty() {
                inter.force_remesh = true;
                inter.state.mark_clean();
                inter.instance_state.mark_clean();
            }
            if (inter.center - inter.old_center).mag2() <= EPSILON * EPSILON {
                continue;
            }
            inter.old_center = inter.center;
            inter.force_remesh = true;
            let center = inter.center;
            let attached = inter.roads.clone();
            for rid in attached {
                let Some(road) = self.roads.get_mut(rid) else { continue };
                if road.points.is_empty() {
                    continue;
                }
                let idx = if road.start_intersection == Some(iid) {
                    0
                } else {
                    road.points.len() - 1
                };
                road.points[idx] = center;
            }
        }
    }

    fn end_info(&self, rid: RoadId, inter: Option<IntersectionId>) -> Option<EndInfo> {
        let inter = self.intersections.get(inter?)?;
        let size = inter
            .roads
            .iter()
            .position(|&r| r == rid)
            .and_then(|k| inter.sizes.get(k))
            .copied()
            .unwrap_or(0.0);
        Some(EndInfo {
            size,
            center: inter.center,
            n_roads: inter.roads.len(),
        })
    }

    /// One full update pass. Does nothing until [`flag_changed`] was
    /// called (adds, removes and moves flag implicitly), then walks the
    /// elements in a fixed order so every rebuilt mesh sees its
    /// neighbors' final geometry:
    ///
    /// 1. road lines, 2. intersection sync, 3. road lines again (the
    /// sync may have moved endpoints), 4. intersection sizes, 5. road
    /// meshes, 6. intersection meshes, 7. terrain patches.
    ///
    /// [`flag_changed`]: CityWorld::flag_changed
    pub fn process_update(
        &mut self,
        reg: &TypeRegistry,
        resolver: &dyn MaterialResolver,
    ) -> RebuildCounts {
        if !self.changed {
            return RebuildCounts::default();
        }
        self.changed = false;
        self.drop_dead_references();

        self.update_lines();
        self.sync_intersections();
        self.update_lines();

        {
            let roads = &mut self.roads;
            for (iid, inter) in self.intersections.iter_mut() {
                inter.recalculate_size(iid, roads);
            }
        }

        let mut counts = RebuildCounts::default();
        let road_ids: Vec<RoadId> = self.roads.keys().collect();
        for rid in road_ids {
            let start = self.end_info(rid, self.roads[rid].start_intersection);
            let end = self.end_info(rid, self.roads[rid].end_intersection);
            if self.roads[rid].rebuild_mesh(start, end, resolver) {
                counts.roads += 1;
            }
        }

        {
            let roads = &self.roads;
            for (iid, inter) in self.intersections.iter_mut() {
                counts.intersections += inter.rebuild_mesh(iid, roads, resolver);
            }
        }

        for patch in self.patches.values_mut() {
            counts.patches += patch.update_patch(reg, resolver);
        }

        log::debug!(
            "world update: {} roads, {} intersections, {} patches rebuilt",
            counts.roads,
            counts.intersections,
            counts.patches
        );
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MaterialTable;
    use crate::state::ObjectState;
    use crate::types::defs::{
        ComponentDef, IntersectionDef, JunctionDef, MeshDef, ParamKind, ParameterDef, RoadLikeDef,
    };
    use geom::{vec3, Vec3};

    fn road_def() -> RoadLikeDef {
        RoadLikeDef {
            name: "street".to_string(),
            parameters: vec![ParameterDef {
                name: "roadWidth".to_string(),
                kind: ParamKind::Float,
                instance_specific: false,
            }],
            static_definitions: vec![crate::types::defs::DefinitionDef {
                name: "totalWidth".to_string(),
                kind: ParamKind::Float,
                value: "roadWidth".to_string(),
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
        }
    }

    fn intersection_def() -> IntersectionDef {
        IntersectionDef {
            name: "plain".to_string(),
            junctions: vec![JunctionDef {
                road_like: RoadLikeDef {
                    name: "curb".to_string(),
                    textures: vec!["curbstone".to_string()],
                    section_vertices: vec!["0 - roadWidthA / 2".to_string(), "roadWidthA / 2".to_string()],
                    components: vec![ComponentDef {
                        name: "strip".to_string(),
                        main_mesh: Some(MeshDef {
                            vertices: vec!["v0".to_string(), "v1".to_string()],
                            uvs: vec!["(0, z)".to_string(), "(1, z)".to_string()],
                            faces: vec!["0".to_string()],
                            face_textures: vec!["0".to_string()],
                        }),
                        ..Default::default()
                    }],
                    textures_mapping: [("strip".to_string(), vec![0])].into_iter().collect(),
                    ..Default::default()
                },
                actual_segments: "4".to_string(),
                road_spline_vertex: 0,
                imported_parameters: vec![crate::types::defs::ImportedParamDef {
                    name: "roadWidth".to_string(),
                    new_name: "roadWidthA".to_string(),
                    kind: ParamKind::Float,
                    from_start: true,
                }],
                texture_definitions: vec![],
            }],
            rules: vec![],
            default_junction: Some("curb".to_string()),
            surface_texture: "asphalt".to_string(),
            surface_uv_mult: 1.0,
            crosswalk: None,
        }
    }

    struct Fixture {
        reg: TypeRegistry,
        table: MaterialTable,
        world: CityWorld,
    }

    fn three_way() -> (Fixture, IntersectionId, Vec<RoadId>) {
        let mut reg = TypeRegistry::default();
        let road_ty = reg.register_road(road_def()).unwrap();
        let inter_ty = reg.register_intersection(intersection_def()).unwrap();
        let mut world = CityWorld::new();

        let mut state = ObjectState::new();
        state.set_float("roadWidth", 4.0);
        state.set_float("sizeIncrease", 0.0);
        let center = Vec3::ZERO;
        let iid = world.add_intersection(IntersectionElement::new(
            inter_ty,
            state.clone(),
            center,
        ));
        let far = [vec3(0.0, 0.0, 40.0), vec3(40.0, 0.0, 0.0), vec3(0.0, 0.0, -40.0)];
        let mut rids = Vec::new();
        for f in far {
            let mut rstate = ObjectState::new();
            rstate.set_float("roadWidth", 4.0);
            let rid = world.add_road(RoadElement::new(
                road_ty.clone(),
                rstate,
                vec![center, f],
            ));
            world.connect(rid, iid, true);
            rids.push(rid);
        }
        let table = MaterialTable::default();
        (Fixture { reg, table, world }, iid, rids)
    }

    #[test]
    fn update_is_idempotent() {
        let (mut f, _, _) = three_way();
        let first = f.world.process_update(&f.reg, &f.table);
        assert_eq!(first.roads, 3);
        assert_eq!(first.intersections, 1);
        let second = f.world.process_update(&f.reg, &f.table);
        assert_eq!(second, RebuildCounts::default());
    }

    #[test]
    fn flag_changed_alone_rebuilds_nothing() {
        let (mut f, _, _) = three_way();
        f.world.process_update(&f.reg, &f.table);
        f.world.flag_changed();
        let counts = f.world.process_update(&f.reg, &f.table);
        assert_eq!(counts, RebuildCounts::default());
    }

    #[test]
    fn road_mouths_clear_the_intersection() {
        let (mut f, iid, rids) = three_way();
        f.world.process_update(&f.reg, &f.table);
        let inter = &f.world.intersections[iid];
        assert_eq!(inter.sizes.len(), 3);
        assert!(inter.sizes.iter().all(|&s| s > 0.0));
        assert!(inter.valid);
        assert!(!inter.mesh.is_empty());
        for &rid in &rids {
            let road = &f.world.roads[rid];
            let k = inter.roads.iter().position(|&r| r == rid).unwrap();
            let min_d2 = road
                .mesh
                .vertices
                .iter()
                .map(|v| v.distance2(inter.center))
                .fold(f32::MAX, f32::min);
            assert!(
                min_d2 >= (inter.sizes[k] - 1e-2).powi(2),
                "road mesh reaches into the intersection"
            );
        }
    }

    #[test]
    fn collinear_pass_through_needs_only_the_crosswalk() {
        let mut reg = TypeRegistry::default();
        let road_ty = reg.register_road(road_def()).unwrap();
        let inter_ty = reg.register_intersection(intersection_def()).unwrap();
        let mut world = CityWorld::new();
        let iid = world.add_intersection(IntersectionElement::new(
            inter_ty,
            ObjectState::new(),
            Vec3::ZERO,
        ));
        for f in [vec3(0.0, 0.0, 40.0), vec3(0.0, 0.0, -40.0)] {
            let mut state = ObjectState::new();
            state.set_float("roadWidth", 4.0);
            let rid = world.add_road(RoadElement::new(
                road_ty.clone(),
                state,
                vec![Vec3::ZERO, f],
            ));
            world.connect(rid, iid, true);
        }
        let table = MaterialTable::default();
        world.process_update(&reg, &table);
        // opposite equal-width arms need no geometric clearance, only
        // the default crosswalk band
        for &s in &world.intersections[iid].sizes {
            assert!((s - 1.0).abs() < 1e-3, "size {s}");
        }
    }

    #[test]
    fn moving_an_intersection_drags_road_ends() {
        let (mut f, iid, rids) = three_way();
        f.world.process_update(&f.reg, &f.table);
        let target = vec3(2.0, 0.0, 1.0);
        f.world.move_intersection(iid, target);
        let counts = f.world.process_update(&f.reg, &f.table);
        assert_eq!(counts.roads, 3);
        assert_eq!(counts.intersections, 1);
        for &rid in &rids {
            assert!(f.world.roads[rid].points[0].approx_eq(target));
        }
    }

    #[test]
    fn removing_a_road_reflows_the_intersection() {
        let (mut f, iid, rids) = three_way();
        f.world.process_update(&f.reg, &f.table);
        f.world.remove_road(rids[2]);
        let counts = f.world.process_update(&f.reg, &f.table);
        assert_eq!(counts.intersections, 1);
        assert_eq!(f.world.intersections[iid].roads.len(), 2);
        assert_eq!(f.world.intersections[iid].sizes.len(), 2);
    }

    #[test]
    fn detached_road_still_meshes() {
        let mut reg = TypeRegistry::default();
        let road_ty = reg.register_road(road_def()).unwrap();
        let mut world = CityWorld::new();
        let mut state = ObjectState::new();
        state.set_float("roadWidth", 4.0);
        let rid = world.add_road(RoadElement::new(
            road_ty,
            state,
            vec![Vec3::ZERO, vec3(0.0, 0.0, 25.0)],
        ));
        let table = MaterialTable::default();
        let counts = world.process_update(&reg, &table);
        assert_eq!(counts.roads, 1);
        assert!(!world.roads[rid].mesh.is_empty());
    }
}
