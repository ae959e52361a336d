use fnv::FnvHashMap;
use geom::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Float,
    Vec2,
    Vec3,
}

/// Name-to-slot maps, one per storage kind. Built once per type and
/// shared by every container forked from it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Layout {
    float_index: FnvHashMap<String, usize>,
    vec2_index: FnvHashMap<String, usize>,
    vec3_index: FnvHashMap<String, usize>,
}

impl Layout {
    pub fn float_slot(&self, name: &str) -> Option<usize> {
        self.float_index.get(name).copied()
    }

    pub fn vec2_slot(&self, name: &str) -> Option<usize> {
        self.vec2_index.get(name).copied()
    }

    pub fn vec3_slot(&self, name: &str) -> Option<usize> {
        self.vec3_index.get(name).copied()
    }
}

/// Flat typed storage for every variable an expression tree can read.
/// The layout is fixed at construction; only the values change between
/// evaluations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableContainer {
    layout: Arc<Layout>,
    pub floats: Vec<f32>,
    pub vec2s: Vec<Vec2>,
    pub vec3s: Vec<Vec3>,
}

impl VariableContainer {
    /// Declaration order fixes the slot order. A name declared twice
    /// with the same kind keeps its first slot.
    pub fn new(decls: impl IntoIterator<Item = (String, VarKind)>) -> Self {
        let mut layout = Layout::default();
        let mut n_floats = 0;
        let mut n_vec2s = 0;
        let mut n_vec3s = 0;
        for (name, kind) in decls {
            let (index, count) = match kind {
                VarKind::Float => (&mut layout.float_index, &mut n_floats),
                VarKind::Vec2 => (&mut layout.vec2_index, &mut n_vec2s),
                VarKind::Vec3 => (&mut layout.vec3_index, &mut n_vec3s),
            };
            index.entry(name).or_insert_with(|| {
                *count += 1;
                *count - 1
            });
        }
        Self {
            layout: Arc::new(layout),
            floats: vec![0.0; n_floats],
            vec2s: vec![Vec2::ZERO; n_vec2s],
            vec3s: vec![Vec3::ZERO; n_vec3s],
        }
    }

    /// A fresh container sharing this one's layout, all values zeroed.
    pub fn fork(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            floats: vec![0.0; self.floats.len()],
            vec2s: vec![Vec2::ZERO; self.vec2s.len()],
            vec3s: vec![Vec3::ZERO; self.vec3s.len()],
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_arc(&self) -> Arc<Layout> {
        self.layout.clone()
    }

    /// By-name setters skip names the layout does not declare. A type
    /// only ever fills the names it declared itself.
    pub fn set_float(&mut self, name: &str, v: f32) {
        if let Some(i) = self.layout.float_slot(name) {
            self.floats[i] = v;
        }
    }

    pub fn set_bool(&mut self, name: &str, v: bool) {
        self.set_float(name, if v { 1.0 } else { 0.0 });
    }

    pub fn set_vec2(&mut self, name: &str, v: Vec2) {
        if let Some(i) = self.layout.vec2_slot(name) {
            self.vec2s[i] = v;
        }
    }

    pub fn set_vec3(&mut self, name: &str, v: Vec3) {
        if let Some(i) = self.layout.vec3_slot(name) {
            self.vec3s[i] = v;
        }
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.layout.float_slot(name).map(|i| self.floats[i])
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        self.layout.vec2_slot(name).map(|i| self.vec2s[i])
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        self.layout.vec3_slot(name).map(|i| self.vec3s[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{vec2, vec3};

    #[test]
    fn slots_follow_declaration_order() {
        let vc = VariableContainer::new(vec![
            ("a".to_string(), VarKind::Float),
            ("b".to_string(), VarKind::Float),
            ("p".to_string(), VarKind::Vec3),
            ("a".to_string(), VarKind::Float), // duplicate keeps slot 0
        ]);
        assert_eq!(vc.layout().float_slot("a"), Some(0));
        assert_eq!(vc.layout().float_slot("b"), Some(1));
        assert_eq!(vc.layout().vec3_slot("p"), Some(0));
        assert_eq!(vc.floats.len(), 2);
    }

    #[test]
    fn fork_shares_layout_zeroes_values() {
        let mut vc = VariableContainer::new(vec![
            ("w".to_string(), VarKind::Float),
            ("uv".to_string(), VarKind::Vec2),
        ]);
        vc.set_float("w", 4.5);
        vc.set_vec2("uv", vec2(1.0, 2.0));
        let f = vc.fork();
        assert_eq!(f.float("w"), Some(0.0));
        assert_eq!(f.vec2s[0], Vec2::ZERO);
        assert_eq!(vc.float("w"), Some(4.5));
    }

    #[test]
    fn container_survives_serde_round_trip() {
        let mut vc = VariableContainer::new(vec![
            ("w".to_string(), VarKind::Float),
            ("p".to_string(), VarKind::Vec3),
        ]);
        vc.set_float("w", 4.5);
        vc.set_vec3("p", vec3(1.0, 2.0, 3.0));
        let json = serde_json::to_string(&vc).unwrap();
        let back: VariableContainer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.float("w"), Some(4.5));
        assert_eq!(back.vec3("p"), Some(vec3(1.0, 2.0, 3.0)));
        assert_eq!(back.layout().float_slot("w"), Some(0));
    }

    #[test]
    fn unknown_name_is_ignored() {
        let mut vc = VariableContainer::new(vec![("x".to_string(), VarKind::Float)]);
        vc.set_float("nope", 1.0);
        vc.set_vec3("nope", vec3(1.0, 1.0, 1.0));
        assert_eq!(vc.float("x"), Some(0.0));
    }
}
