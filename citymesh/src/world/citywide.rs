//! Citywide terrain fill: traces the terrain anchor lines of every
//! road and intersection into closed loops and fills each loop with a
//! terrain patch, plus an outer ring around the whole network.
//!
//! The work is sliced into [`CitywideTerrain::step`] calls so a host
//! can keep its frame loop alive; nothing lands in the world before
//! the final commit step.

use super::{CityWorld, TerrainPatchElement};
use crate::state::ObjectState;
use crate::types::TerrainPatchType;
use geom::{
    offset_polygon, point_polygon_dist2, polygon_contains_xz, vec3, Vec3, EPSILON,
};
use std::sync::Arc;

const TRACE_SEEDS_PER_STEP: usize = 16;
const FILL_PER_STEP: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StepProgress {
    Working(f32),
    Done,
}

#[derive(Clone, Debug)]
pub struct CitywideParams {
    /// Width of the terrain ring added around the outer network edge.
    pub outer_distance: f32,
    /// Maximal arc length of one outer ring patch.
    pub segment_length: f32,
    /// Ring vertices closer than this are welded; also the loop
    /// tracing tolerance.
    pub vertex_fusion_distance: f32,
    /// Height smoothing iterations stamped on every patch.
    pub smooth: u32,
    /// Interior point spacing, zero for no interior points.
    pub internal_distance: f32,
}

impl Default for CitywideParams {
    fn default() -> Self {
        Self {
            outer_distance: 40.0,
            segment_length: 100.0,
            vertex_fusion_distance: 0.5,
            smooth: 2,
            internal_distance: 8.0,
        }
    }
}

enum Phase {
    Collect,
    Trace,
    Outer,
    Fill,
    Commit,
}

pub struct CitywideTerrain {
    ty: Arc<TerrainPatchType>,
    params: CitywideParams,
    phase: Phase,
    segments: Vec<Vec<Vec3>>,
    used: Vec<bool>,
    /// Perimeter points of patches that already existed; loops touching
    /// them are already covered and get dropped.
    done_points: Vec<Vec3>,
    loops: Vec<Vec<Vec3>>,
    rings: Vec<Vec<Vec3>>,
    cursor: usize,
    pending: Vec<TerrainPatchElement>,
}

impl CitywideTerrain {
    pub fn new(ty: Arc<TerrainPatchType>, params: CitywideParams) -> Self {
        Self {
            ty,
            params,
            phase: Phase::Collect,
            segments: Vec::new(),
            used: Vec::new(),
            done_points: Vec::new(),
            loops: Vec::new(),
            rings: Vec::new(),
            cursor: 0,
            pending: Vec::new(),
        }
    }

    /// Starts from explicit anchor polylines instead of scanning the
    /// world, skipping the collect phase.
    pub fn from_anchor_lines(
        ty: Arc<TerrainPatchType>,
        params: CitywideParams,
        lines: Vec<Vec<Vec3>>,
    ) -> Self {
        let mut s = Self::new(ty, params);
        s.used = vec![false; lines.len()];
        s.segments = lines;
        s.phase = Phase::Trace;
        s
    }

    fn weld2(&self) -> f32 {
        (self.params.vertex_fusion_distance * self.params.vertex_fusion_distance).max(EPSILON)
    }

    /// Runs one bounded slice of work. Call again until [`StepProgress::Done`];
    /// the patches appear in the world only on the last call.
    pub fn step(&mut self, world: &mut CityWorld) -> StepProgress {
        match self.phase {
            Phase::Collect => {
                for road in world.roads.values() {
                    for line in &road.anchor_lines {
                        if line.len() >= 2 {
                            self.segments.push(line.clone());
                        }
                    }
                }
                for inter in world.intersections.values() {
                    for line in &inter.anchor_lines {
                        if line.len() >= 2 {
                            self.segments.push(line.clone());
                        }
                    }
                }
                for patch in world.patches.values() {
                    self.done_points.extend_from_slice(&patch.perimeter);
                }
                self.used = vec![false; self.segments.len()];
                self.phase = Phase::Trace;
                StepProgress::Working(0.05)
            }
            Phase::Trace => {
                for _ in 0..TRACE_SEEDS_PER_STEP {
                    let Some(first) = self.used.iter().position(|u| !u) else {
                        self.phase = Phase::Outer;
                        self.cursor = 0;
                        return StepProgress::Working(0.4);
                    };
                    if let Some(lp) = self.trace_loop(first) {
                        if !self.touches_done(&lp) {
                            self.loops.push(lp);
                        }
                    }
                }
                let used = self.used.iter().filter(|u| **u).count();
                let total = self.segments.len().max(1);
                StepProgress::Working(0.05 + 0.35 * used as f32 / total as f32)
            }
            Phase::Outer => {
                // one outer contour reworked per step
                while self.cursor < self.loops.len() {
                    if self.is_outer(self.cursor) {
                        let inner = self.loops.swap_remove(self.cursor);
                        let mut rings = self.ring_patches(&inner);
                        self.rings.append(&mut rings);
                        let total = (self.loops.len() + 1).max(1);
                        return StepProgress::Working(0.4 + 0.2 * self.cursor as f32 / total as f32);
                    }
                    self.cursor += 1;
                }
                self.loops.append(&mut self.rings);
                self.phase = Phase::Fill;
                self.cursor = 0;
                StepProgress::Working(0.6)
            }
            Phase::Fill => {
                let end = (self.cursor + FILL_PER_STEP).min(self.loops.len());
                while self.cursor < end {
                    let lp = self.loops[self.cursor].clone();
                    self.cursor += 1;
                    if lp.len() < 3 {
                        continue;
                    }
                    let mut state = ObjectState::new();
                    state.set_int("smooth", self.params.smooth as i32);
                    let mut el = TerrainPatchElement::new(self.ty.clone(), state, lp.clone());
                    if self.params.internal_distance > EPSILON {
                        el.interior = interior_grid(&lp, self.params.internal_distance);
                    }
                    self.pending.push(el);
                }
                if self.cursor >= self.loops.len() {
                    self.phase = Phase::Commit;
                }
                let total = self.loops.len().max(1);
                StepProgress::Working(0.6 + 0.4 * self.cursor as f32 / total as f32)
            }
            Phase::Commit => {
                for el in self.pending.drain(..) {
                    world.add_patch(el);
                }
                world.flag_changed();
                StepProgress::Done
            }
        }
    }

    /// Chains unused segments starting at `first` into a closed loop by
    /// endpoint proximity. Consumed segments stay consumed even when
    /// the chain turns out open.
    fn trace_loop(&mut self, first: usize) -> Option<Vec<Vec3>> {
        self.used[first] = true;
        let mut lp = self.segments[first].clone();
        let weld2 = self.weld2();
        loop {
            let head = *lp.first()?;
            let tail = *lp.last()?;
            if lp.len() > 2 && tail.distance2(head) <= weld2 {
                lp.pop();
                return Some(lp);
            }
            let mut found = None;
            for (k, seg) in self.segments.iter().enumerate() {
                if self.used[k] || seg.is_empty() {
                    continue;
                }
                if seg[0].distance2(tail) <= weld2 {
                    found = Some((k, false));
                    break;
                }
                if seg[seg.len() - 1].distance2(tail) <= weld2 {
                    found = Some((k, true));
                    break;
                }
            }
            let (k, rev) = found?;
            self.used[k] = true;
            let mut seg = self.segments[k].clone();
            if rev {
                seg.reverse();
            }
            lp.extend(seg.into_iter().skip(1));
        }
    }

    fn touches_done(&self, lp: &[Vec3]) -> bool {
        let weld2 = self.weld2();
        lp.iter()
            .any(|p| self.done_points.iter().any(|d| d.distance2(*p) <= weld2))
    }

    /// The outer contour encloses every other loop; anything with a
    /// foreign point inside is it.
    fn is_outer(&self, idx: usize) -> bool {
        let lp = &self.loops[idx];
        for (k, other) in self.loops.iter().enumerate() {
            if k != idx && other.iter().any(|&p| polygon_contains_xz(lp, p)) {
                return true;
            }
        }
        self.done_points.iter().any(|&p| polygon_contains_xz(lp, p))
    }

    /// Splits the ring between the outer contour and its outward offset
    /// into arc-length-bounded patches.
    fn ring_patches(&self, inner: &[Vec3]) -> Vec<Vec<Vec3>> {
        let outer = offset_polygon(inner, self.params.outer_distance);
        let fusion = self.params.vertex_fusion_distance;
        let spacing = self.params.internal_distance;
        let n = inner.len();
        let mut res = Vec::new();
        if n < 2 || outer.len() != n {
            return res;
        }
        let mut start_j = 0;
        let mut cur = 0.0;
        for j in 1..n {
            cur += inner[j].distance(inner[j - 1]);
            if cur <= self.params.segment_length && j != n - 1 {
                continue;
            }
            let mut per: Vec<Vec3> = inner[start_j..=j].to_vec();
            per.extend(subdivide(inner[j], outer[j], spacing));
            per.push(outer[j]);
            let mut last = outer[j];
            for k in (start_j..j).rev() {
                let p = outer[k];
                if k == start_j || (last.distance(p) > fusion && outer[j].distance(p) > fusion) {
                    per.push(p);
                    last = p;
                }
            }
            per.extend(subdivide(outer[start_j], inner[start_j], spacing));
            res.push(per);
            cur = 0.0;
            start_j = j;
        }
        // the sector closing the ring between the last and first vertex
        let mut sector = vec![inner[0], inner[n - 1]];
        sector.extend(subdivide(inner[n - 1], outer[n - 1], spacing));
        sector.push(outer[n - 1]);
        sector.push(outer[0]);
        sector.extend(subdivide(outer[0], inner[0], spacing));
        res.push(sector);
        res
    }
}

fn subdivide(from: Vec3, to: Vec3, spacing: f32) -> Vec<Vec3> {
    let mut out = Vec::new();
    if spacing <= EPSILON {
        return out;
    }
    let step = match (to - from).try_normalize() {
        Some(d) => d * spacing,
        None => return out,
    };
    let mut p = from;
    while p.distance(to) > 2.0 * spacing {
        p += step;
        out.push(p);
    }
    out
}

/// Interior points on a jittered grid, kept `spacing` away from the
/// polygon edge. The jitter is a pure hash of the grid index, so
/// repeated runs produce the same terrain.
fn interior_grid(polygon: &[Vec3], spacing: f32) -> Vec<Vec3> {
    let mut min = vec3(f32::MAX, 0.0, f32::MAX);
    let mut max = vec3(f32::MIN, 0.0, f32::MIN);
    let mut y = 0.0;
    for p in polygon {
        min.x = min.x.min(p.x);
        min.z = min.z.min(p.z);
        max.x = max.x.max(p.x);
        max.z = max.z.max(p.z);
        y += p.y;
    }
    y /= polygon.len().max(1) as f32;

    let d2 = spacing * spacing;
    let mut out = Vec::new();
    let mut i = 0u32;
    let mut x = min.x + spacing;
    while x < max.x {
        let mut j = 0u32;
        let mut z = min.z + spacing;
        while z < max.z {
            let (jx, jz) = jitter(i, j);
            let p = vec3(x + jx * spacing, y, z + jz * spacing);
            if polygon_contains_xz(polygon, p) && point_polygon_dist2(p, polygon, true) > d2 {
                out.push(p);
            }
            z += spacing;
            j += 1;
        }
        x += spacing;
        i += 1;
    }
    out
}

fn jitter(i: u32, j: u32) -> (f32, f32) {
    let mut h = i.wrapping_mul(0x9E37_79B9) ^ j.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7FEB_352D);
    h ^= h >> 15;
    let a = (h & 0xFFFF) as f32 / 65535.0 - 0.5;
    let b = (h >> 16) as f32 / 65535.0 - 0.5;
    (a * 0.5, b * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::defs::TerrainPatchDef;

    fn patch_type() -> Arc<TerrainPatchType> {
        Arc::new(TerrainPatchType::new(TerrainPatchDef {
            name: "grass".to_string(),
            surface_texture: "grass".to_string(),
            uv_mult: 1.0,
            smooth_iterations: 0,
            border: None,
        }))
    }

    fn params() -> CitywideParams {
        CitywideParams {
            outer_distance: 5.0,
            segment_length: 1000.0,
            vertex_fusion_distance: 0.1,
            smooth: 1,
            internal_distance: 0.0,
        }
    }

    fn square_lines(off: Vec3, side: f32) -> Vec<Vec<Vec3>> {
        let c = [
            off,
            off + vec3(side, 0.0, 0.0),
            off + vec3(side, 0.0, side),
            off + vec3(0.0, 0.0, side),
        ];
        vec![
            vec![c[0], c[1]],
            vec![c[1], c[2]],
            vec![c[2], c[3]],
            vec![c[3], c[0]],
        ]
    }

    fn run(gen: &mut CitywideTerrain, world: &mut CityWorld) -> usize {
        let mut steps = 0;
        let mut last = 0.0;
        loop {
            steps += 1;
            assert!(steps < 1000, "generator never finished");
            match gen.step(world) {
                StepProgress::Done => return steps,
                StepProgress::Working(p) => {
                    assert!((0.0..=1.0).contains(&p));
                    assert!(p >= last, "progress went backwards: {p} < {last}");
                    last = p;
                }
            }
        }
    }

    #[test]
    fn empty_world_finishes_with_no_patches() {
        let mut world = CityWorld::new();
        let mut gen = CitywideTerrain::new(patch_type(), params());
        run(&mut gen, &mut world);
        assert!(world.patches.is_empty());
    }

    #[test]
    fn closed_square_becomes_one_patch() {
        let mut world = CityWorld::new();
        let lines = square_lines(Vec3::ZERO, 10.0);
        let mut gen = CitywideTerrain::from_anchor_lines(patch_type(), params(), lines);
        run(&mut gen, &mut world);
        assert_eq!(world.patches.len(), 1);
        let patch = world.patches.values().next().unwrap();
        assert_eq!(patch.perimeter.len(), 4);
        assert_eq!(patch.state.int("smooth"), 1);
    }

    #[test]
    fn reversed_segments_still_close_the_loop() {
        let mut lines = square_lines(Vec3::ZERO, 10.0);
        lines[1].reverse();
        lines[3].reverse();
        let mut world = CityWorld::new();
        let mut gen = CitywideTerrain::from_anchor_lines(patch_type(), params(), lines);
        run(&mut gen, &mut world);
        assert_eq!(world.patches.len(), 1);
    }

    #[test]
    fn open_chains_produce_nothing() {
        let mut lines = square_lines(Vec3::ZERO, 10.0);
        lines.pop();
        let mut world = CityWorld::new();
        let mut gen = CitywideTerrain::from_anchor_lines(patch_type(), params(), lines);
        run(&mut gen, &mut world);
        assert!(world.patches.is_empty());
    }

    #[test]
    fn outer_contour_becomes_a_ring() {
        // a small block inside a big contour: the big one is the
        // outside of the network and is replaced by an offset ring
        let mut lines = square_lines(Vec3::ZERO, 40.0);
        lines.extend(square_lines(vec3(10.0, 0.0, 10.0), 5.0));
        let mut world = CityWorld::new();
        let mut gen = CitywideTerrain::from_anchor_lines(patch_type(), params(), lines);
        run(&mut gen, &mut world);
        // the inner block, the ring and the ring-closing sector
        assert_eq!(world.patches.len(), 3);
        let has_ring = world
            .patches
            .values()
            .any(|p| p.perimeter.iter().any(|v| v.x < -1.0 || v.x > 41.0));
        assert!(has_ring, "no perimeter point outside the traced contour");
    }

    #[test]
    fn interior_grid_respects_the_margin() {
        let square = [
            Vec3::ZERO,
            vec3(20.0, 0.0, 0.0),
            vec3(20.0, 0.0, 20.0),
            vec3(0.0, 0.0, 20.0),
        ];
        let pts = interior_grid(&square, 3.0);
        assert!(!pts.is_empty());
        for p in &pts {
            assert!(polygon_contains_xz(&square, *p));
            assert!(point_polygon_dist2(*p, &square, true) > 9.0);
        }
    }

    #[test]
    fn loops_touching_existing_patches_are_dropped() {
        let mut world = CityWorld::new();
        let lines = square_lines(Vec3::ZERO, 10.0);
        let existing = TerrainPatchElement::new(
            patch_type(),
            ObjectState::new(),
            vec![Vec3::ZERO, vec3(10.0, 0.0, 0.0), vec3(10.0, 0.0, 10.0), vec3(0.0, 0.0, 10.0)],
        );
        world.add_patch(existing);
        let mut gen = CitywideTerrain::from_anchor_lines(patch_type(), params(), lines);
        gen.done_points = world.patches.values().next().unwrap().perimeter.clone();
        run(&mut gen, &mut world);
        assert_eq!(world.patches.len(), 1, "duplicate patch created");
    }
}
