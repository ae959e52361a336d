//! An intersection element: a center point joining road ends, with the
//! per-road mouth sizes recomputed before every remesh.

use super::road::RoadElement;
use super::{IntersectionId, RoadId};
use crate::intersection::{Mesher, RoadEnd};
use crate::mesh::{MaterialResolver, TriangleMesh};
use crate::state::ObjectState;
use crate::types::IntersectionType;
use geom::{Vec3, EPSILON};
use slotmapd::HopSlotMap;
use std::sync::Arc;

const MAX_OVERLAP_PASSES: usize = 100;

pub struct IntersectionElement {
    pub ty: Arc<IntersectionType>,
    pub state: ObjectState,
    pub instance_state: ObjectState,
    pub center: Vec3,
    /// Attached roads, in attach order. Meshing sorts them clockwise.
    pub roads: Vec<RoadId>,
    /// Mouth pull-back distance per attached road, same order as
    /// `roads`.
    pub sizes: Vec<f32>,
    pub mesh: TriangleMesh,
    pub anchor_lines: Vec<Vec<Vec3>>,
    /// False after a failed remesh (missing junction rule).
    pub valid: bool,
    pub(crate) force_remesh: bool,
    pub(crate) old_center: Vec3,
    old_road_count: usize,
}

impl IntersectionElement {
    pub fn new(ty: Arc<IntersectionType>, state: ObjectState, center: Vec3) -> Self {
        Self {
            ty,
            state,
            instance_state: ObjectState::new(),
            center,
            roads: Vec::new(),
            sizes: Vec::new(),
            mesh: TriangleMesh::default(),
            anchor_lines: Vec::new(),
            valid: true,
            force_remesh: true,
            old_center: center,
            old_road_count: 0,
        }
    }

    /// Direction from the road's mouth toward this center, on the
    /// ground plane. Zero when the road has no usable curve.
    fn dir_to_center(&self, road: &RoadElement, at_start: bool) -> Vec3 {
        if road.curve_points.len() < 2 {
            return Vec3::ZERO;
        }
        let p = if at_start {
            road.curve_points[1]
        } else {
            road.curve_points[road.curve_points.len() - 2]
        };
        let mut d = self.center - p;
        d.y = 0.0;
        d
    }

    /// Recomputes the per-road mouth sizes: the pairwise angular bound,
    /// then an iterative push until no road mouth overlaps another
    /// road's edges, then the crosswalk and per-road additions.
    pub fn recalculate_size(
        &mut self,
        id: IntersectionId,
        roads: &mut HopSlotMap<RoadId, RoadElement>,
    ) {
        if self.roads.len() != self.old_road_count {
            self.old_road_count = self.roads.len();
            self.force_remesh = true;
        }
        if !self.force_remesh {
            return;
        }

        struct Arm {
            id: RoadId,
            dir: Vec3,
            width: f32,
            extra: f32,
        }
        let size_increase = self.state.float("sizeIncrease");
        let mut arms: Vec<Arm> = Vec::with_capacity(self.roads.len());
        for &rid in &self.roads {
            let Some(road) = roads.get(rid) else { continue };
            let at_start = road.start_intersection == Some(id);
            let dir = self.dir_to_center(road, at_start);
            if dir.mag2() < EPSILON {
                continue;
            }
            arms.push(Arm {
                id: rid,
                dir: dir.normalize(),
                width: road.standard_float("totalWidth"),
                extra: road.crosswalk_size(at_start) + road.intersection_add(at_start)
                    + size_increase,
            });
        }

        let mut sizes = vec![0.0f32; arms.len()];
        for (i, a) in arms.iter().enumerate() {
            let mut max = 0.0f32;
            for (j, b) in arms.iter().enumerate() {
                if i != j {
                    max = max.max(pair_size(a.dir, b.dir, a.width, b.width));
                }
            }
            sizes[i] = max;
        }

        // push each mouth out until it clears every other road's edges
        for _ in 0..MAX_OVERLAP_PASSES {
            let mut any = false;
            for i in 0..arms.len() {
                let mouth = self.center - arms[i].dir * sizes[i];
                let left_i = arms[i].dir.cross(Vec3::UP).normalize();
                // plane through the mouth, facing away from the center
                let normal = left_i.cross(Vec3::UP).normalize();
                let mut add = 0.0f32;
                for (j, b) in arms.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let other = self.center - b.dir * sizes[j];
                    let left_j = b.dir.cross(Vec3::UP).normalize() * (0.5 * b.width);
                    for corner in [other + left_j, other - left_j] {
                        let d = normal.dot(corner - mouth);
                        if d > EPSILON {
                            add = add.max(d);
                        }
                    }
                }
                if add > 0.0 {
                    sizes[i] += add;
                    any = true;
                }
            }
            if !any {
                break;
            }
        }

        self.sizes = vec![0.0; self.roads.len()];
        for (k, arm) in arms.iter().enumerate() {
            if let Some(slot) = self.roads.iter().position(|&r| r == arm.id) {
                self.sizes[slot] = sizes[k] + arm.extra;
            }
            if let Some(road) = roads.get_mut(arm.id) {
                road.force_remesh = true;
            }
        }
    }

    /// Rebuilds the surface, junction and crosswalk mesh when flagged.
    /// Returns 1 when a rebuild happened.
    pub fn rebuild_mesh(
        &mut self,
        id: IntersectionId,
        roads: &HopSlotMap<RoadId, RoadElement>,
        resolver: &dyn MaterialResolver,
    ) -> usize {
        if !self.force_remesh {
            return 0;
        }
        self.force_remesh = false;

        let mut ends: Vec<RoadEnd> = Vec::with_capacity(self.roads.len());
        for (k, &rid) in self.roads.iter().enumerate() {
            let Some(road) = roads.get(rid) else { continue };
            let at_start = road.start_intersection == Some(id);
            let dir = self.dir_to_center(road, at_start);
            if dir.mag2() < EPSILON {
                continue;
            }
            ends.push(RoadEnd {
                ty: road.ty.clone(),
                state: road.state.clone(),
                standard: road.standard_state(),
                dir_to_center: dir,
                size: self.sizes.get(k).copied().unwrap_or(0.0),
                crosswalk_size: road.crosswalk_size(at_start),
                size_add: road.intersection_add(at_start),
                texture: road.intersection_texture(at_start),
                this_is_end: road.end_intersection == Some(id),
            });
        }

        let mesher = Mesher {
            ty: self.ty.as_ref(),
            state: &self.state,
            instance_state: Some(&self.instance_state),
            center: self.center,
            roads: &ends,
        };
        match mesher.build(resolver) {
            Ok(out) => {
                self.mesh = out.mesh;
                self.anchor_lines = out.anchor_lines;
                self.valid = true;
            }
            Err(err) => {
                log::error!("intersection {} mesh failed: {}", self.ty.name, err);
                self.mesh = TriangleMesh::default();
                self.anchor_lines.clear();
                self.valid = false;
            }
        }
        1
    }
}

/// Minimal mouth distance keeping two road edges from crossing, from
/// the angle between the arms and both road widths.
fn pair_size(v1: Vec3, v2: Vec3, w1: f32, w2: f32) -> f32 {
    let rad = v1.angle(v2);
    let sin = rad.sin();
    if rad.to_degrees() <= 90.0 {
        if sin.abs() < 1e-5 {
            // coincident arms, no finite answer
            return 0.0;
        }
        0.5 * (w2 / sin + w1 * rad.cos() / sin)
    } else {
        let half = rad * 0.5;
        w2 * half.cos() / (2.0 * half.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::vec3;

    #[test]
    fn perpendicular_pair_size_is_half_width_sum() {
        let s = pair_size(Vec3::Z, Vec3::X, 4.0, 6.0);
        // at 90 degrees: (w2 + w1 * cos) / (2 sin) = w2 / 2
        assert!((s - 3.0).abs() < 1e-4);
    }

    #[test]
    fn opposite_arms_need_no_size() {
        let s = pair_size(Vec3::Z, -Vec3::Z, 4.0, 4.0);
        assert!(s.abs() < 1e-4, "got {s}");
    }

    #[test]
    fn shallow_angle_needs_more_room_than_perpendicular() {
        let shallow = pair_size(Vec3::Z, vec3(1.0, 0.0, 1.0).normalize(), 4.0, 4.0);
        let square = pair_size(Vec3::Z, Vec3::X, 4.0, 4.0);
        assert!(shallow > square);
    }
}
