use crate::{closest_point, segment_intersection, vec3, Vec3};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// An ordered sequence of 3D points.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolyLine3(pub Vec<Vec3>);

impl PolyLine3 {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self(points)
    }

    pub fn n_points(&self) -> usize {
        self.0.len()
    }

    pub fn length(&self) -> f32 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point at curvilinear distance `dist` from the start, clamped to
    /// the ends. An empty polyline yields the origin.
    pub fn point_along(&self, dist: f32) -> Vec3 {
        let Some(&first) = self.0.first() else {
            return Vec3::ZERO;
        };
        if dist <= 0.0 {
            return first;
        }
        let mut cur = 0.0;
        for w in self.0.windows(2) {
            let d = w[0].distance(w[1]);
            if cur + d > dist {
                return w[0].lerp(w[1], (dist - cur) / d);
            }
            cur += d;
        }
        *self.0.last().unwrap()
    }

    /// Nearest point on the polyline and the index of its segment.
    pub fn project(&self, p: Vec3) -> Option<(Vec3, usize)> {
        self.0
            .windows(2)
            .enumerate()
            .map(|(i, w)| (closest_point(p, w[0], w[1]), i))
            .min_by_key(|&(proj, _)| OrderedFloat(p.distance2(proj)))
    }

    pub fn first(&self) -> Vec3 {
        self.0[0]
    }

    pub fn last(&self) -> Vec3 {
        *self.0.last().unwrap()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Vec3] {
        self.0.as_slice()
    }
}

/// Removes self-intersecting loops: whenever segment i crosses a later
/// segment j on the ground plane, the run (i+1 ..= j) is replaced by the
/// crossing point. Lines of up to 3 points are returned untouched.
pub fn remove_self_intersections(line: &[Vec3]) -> Vec<Vec3> {
    let mut res: Vec<Vec3> = line.to_vec();
    if res.len() <= 3 {
        return res;
    }
    let mut i = 0;
    while i + 1 < res.len() {
        let mut found = None;
        for j in i + 2..res.len().saturating_sub(1) {
            if let Some(inter) =
                segment_intersection(res[i].xz(), res[i + 1].xz(), res[j].xz(), res[j + 1].xz())
            {
                let y = (res[i].y + res[i + 1].y + res[j].y + res[j + 1].y) * 0.25;
                found = Some((j, vec3(inter.x, y, inter.y)));
                break;
            }
        }
        if let Some((j, p)) = found {
            res.drain(i + 1..=j);
            res.insert(i + 1, p);
        }
        i += 1;
    }
    res
}
