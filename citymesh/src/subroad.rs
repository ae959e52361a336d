//! Sub-road bookkeeping for intersection meshing: the junction surface
//! is split into sub-roads (one polygon each), which share vertices,
//! remember which boundary segments are convex, and merge when they
//! touch and carry the same texture.

use geom::{find_vector, Vec2, Vec3};

/// One surface polygon in the making. `segments` holds indices into
/// `vertices`; `convex[k]` tells whether segment `k` stays on one side
/// of its road's mouth plane.
#[derive(Clone, Debug, Default)]
pub struct Subroad {
    pub vertices: Vec<Vec3>,
    pub segments: Vec<Vec<usize>>,
    pub convex: Vec<bool>,
    pub texture: String,
    pub uv_mult: Vec2,
    /// 0 is a plain surface; other tags never merge.
    pub tag: i32,
}

#[derive(Debug, Default)]
pub struct SubroadManager {
    pub subroads: Vec<Subroad>,
}

impl SubroadManager {
    pub fn clear(&mut self) {
        self.subroads.clear();
    }

    /// Starts a sub-road, or reuses an existing one with the same
    /// texture when the texture is the default and no real road feeds
    /// this stretch.
    pub fn create_subroad(
        &mut self,
        texture: &str,
        tex_is_default: bool,
        has_roads: bool,
        uv_mult: Vec2,
        default_tex: &str,
        tag: i32,
    ) -> usize {
        let texture = if texture.is_empty() { default_tex } else { texture };
        if tex_is_default && !has_roads {
            if let Some(i) = self.subroads.iter().position(|s| s.texture == texture) {
                return i;
            }
        }
        self.subroads.push(Subroad {
            texture: texture.to_string(),
            uv_mult,
            tag,
            ..Default::default()
        });
        self.subroads.len() - 1
    }

    /// Appends a boundary segment, deduplicating vertices against the
    /// sub-road's buffer. The segment counts as convex when both its
    /// endpoints fall on the same side of the plane through
    /// `plane_origin` with `plane_normal`.
    pub fn add_segment(
        &mut self,
        sub: usize,
        new_vertices: &[Vec3],
        plane_origin: Vec3,
        plane_normal: Vec3,
        force_convex: bool,
    ) {
        let s = &mut self.subroads[sub];
        let mut segment = Vec::with_capacity(new_vertices.len());
        for &v in new_vertices {
            match find_vector(&s.vertices, v) {
                Some(i) => segment.push(i),
                None => {
                    s.vertices.push(v);
                    segment.push(s.vertices.len() - 1);
                }
            }
        }
        let mut convex = true;
        if !segment.is_empty() && !force_convex {
            let d0 = plane_normal.dot(s.vertices[segment[0]] - plane_origin);
            let d1 = plane_normal.dot(s.vertices[segment[segment.len() - 1]] - plane_origin);
            if d0.signum() != d1.signum() {
                convex = false;
            }
        }
        s.segments.push(segment);
        s.convex.push(convex);
    }

    /// Merges touching same-texture plain sub-roads until none are
    /// left, so one continuous surface triangulates as one polygon.
    pub fn merge_subroads(&mut self) {
        if self.subroads.len() < 2 {
            return;
        }
        let mut i = 0;
        let mut j = 1;
        while i < self.subroads.len() - 1 {
            if !self.try_merge(i, j) {
                j += 1;
            }
            if j >= self.subroads.len() {
                i += 1;
                j = i + 1;
            }
        }
    }

    fn try_merge(&mut self, i0: usize, i1: usize) -> bool {
        {
            let (a, b) = (&self.subroads[i0], &self.subroads[i1]);
            if a.tag != 0 || b.tag != 0 || a.texture != b.texture {
                return false;
            }
            let touching = a
                .vertices
                .iter()
                .any(|&v| find_vector(&b.vertices, v).is_some());
            if !touching {
                return false;
            }
        }
        let src = self.subroads.remove(i1);
        let dst = &mut self.subroads[i0];
        for (segment, convex) in src.segments.into_iter().zip(src.convex) {
            let remapped = segment
                .into_iter()
                .map(|v| {
                    let p = src.vertices[v];
                    find_vector(&dst.vertices, p).unwrap_or_else(|| {
                        dst.vertices.push(p);
                        dst.vertices.len() - 1
                    })
                })
                .collect();
            dst.segments.push(remapped);
            dst.convex.push(convex);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{vec2, vec3};

    fn mgr() -> SubroadManager {
        SubroadManager::default()
    }

    #[test]
    fn default_texture_subroads_are_reused() {
        let mut m = mgr();
        let a = m.create_subroad("", true, false, vec2(1.0, 1.0), "asphalt", 0);
        let b = m.create_subroad("asphalt", true, false, vec2(1.0, 1.0), "asphalt", 0);
        assert_eq!(a, b);
        // a real road on the stretch forces a separate sub-road
        let c = m.create_subroad("asphalt", true, true, vec2(1.0, 1.0), "asphalt", 0);
        assert_ne!(a, c);
    }

    #[test]
    fn segments_share_vertices() {
        let mut m = mgr();
        let s = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 0);
        let up = vec3(0.0, 1.0, 0.0);
        m.add_segment(
            s,
            &[vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0)],
            Vec3::ZERO,
            up,
            true,
        );
        m.add_segment(
            s,
            &[vec3(1.0, 0.0, 0.0), vec3(1.0, 0.0, 1.0)],
            Vec3::ZERO,
            up,
            true,
        );
        let sub = &m.subroads[s];
        assert_eq!(sub.vertices.len(), 3);
        assert_eq!(sub.segments[1][0], sub.segments[0][1]);
    }

    #[test]
    fn convexity_flags_side_changes() {
        let mut m = mgr();
        let s = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 0);
        let origin = Vec3::ZERO;
        let normal = vec3(1.0, 0.0, 0.0);
        m.add_segment(
            s,
            &[vec3(1.0, 0.0, 0.0), vec3(2.0, 0.0, 1.0)],
            origin,
            normal,
            false,
        );
        m.add_segment(
            s,
            &[vec3(1.0, 0.0, 2.0), vec3(-1.0, 0.0, 2.0)],
            origin,
            normal,
            false,
        );
        assert!(m.subroads[s].convex[0]);
        assert!(!m.subroads[s].convex[1]);
    }

    #[test]
    fn touching_same_texture_subroads_merge() {
        let mut m = mgr();
        let up = vec3(0.0, 1.0, 0.0);
        let a = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 0);
        let b = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 0);
        let c = m.create_subroad("gravel", false, true, vec2(1.0, 1.0), "asphalt", 0);
        m.add_segment(a, &[vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0)], Vec3::ZERO, up, true);
        m.add_segment(b, &[vec3(1.0, 0.0, 0.0), vec3(2.0, 0.0, 0.0)], Vec3::ZERO, up, true);
        m.add_segment(c, &[vec3(5.0, 0.0, 0.0), vec3(6.0, 0.0, 0.0)], Vec3::ZERO, up, true);
        m.merge_subroads();
        assert_eq!(m.subroads.len(), 2);
        let merged = &m.subroads[0];
        assert_eq!(merged.segments.len(), 2);
        assert_eq!(merged.vertices.len(), 3);
        // the shared vertex keeps one index
        assert_eq!(merged.segments[1][0], merged.segments[0][1]);
    }

    #[test]
    fn tagged_subroads_never_merge() {
        let mut m = mgr();
        let up = vec3(0.0, 1.0, 0.0);
        let a = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 1);
        let b = m.create_subroad("asphalt", false, true, vec2(1.0, 1.0), "asphalt", 0);
        m.add_segment(a, &[vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0)], Vec3::ZERO, up, true);
        m.add_segment(b, &[vec3(1.0, 0.0, 0.0), vec3(2.0, 0.0, 0.0)], Vec3::ZERO, up, true);
        m.merge_subroads();
        assert_eq!(m.subroads.len(), 2);
    }
}
