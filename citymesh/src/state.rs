use geom::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Nested(ObjectState),
}

/// Ordered bag of named parameters backing an element. Typed getters
/// return a neutral default when the name is absent or holds another
/// type; every setter marks the state dirty until a rebuild consumes
/// the flag.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ObjectState {
    values: BTreeMap<String, Value>,
    #[serde(skip)]
    dirty: bool,
}

impl PartialEq for ObjectState {
    /// Deep value comparison; the dirty flag is transient.
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl ObjectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.values.get(name) {
            Some(Value::Float(v)) => *v,
            Some(Value::Int(v)) => *v as f32,
            _ => 0.0,
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.values.get(name) {
            Some(Value::Int(v)) => *v,
            Some(Value::Float(v)) => *v as i32,
            _ => 0,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(Value::Bool(true)))
    }

    pub fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(Value::Str(v)) => v,
            _ => "",
        }
    }

    pub fn vec2(&self, name: &str) -> Vec2 {
        match self.values.get(name) {
            Some(Value::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    pub fn vec3(&self, name: &str) -> Vec3 {
        match self.values.get(name) {
            Some(Value::Vec3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }

    pub fn nested(&self, name: &str) -> Option<&ObjectState> {
        match self.values.get(name) {
            Some(Value::Nested(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, v: Value) {
        self.values.insert(name.into(), v);
        self.dirty = true;
    }

    pub fn set_float(&mut self, name: impl Into<String>, v: f32) {
        self.set(name, Value::Float(v));
    }

    pub fn set_int(&mut self, name: impl Into<String>, v: i32) {
        self.set(name, Value::Int(v));
    }

    pub fn set_bool(&mut self, name: impl Into<String>, v: bool) {
        self.set(name, Value::Bool(v));
    }

    pub fn set_str(&mut self, name: impl Into<String>, v: impl Into<String>) {
        self.set(name, Value::Str(v.into()));
    }

    pub fn set_vec2(&mut self, name: impl Into<String>, v: Vec2) {
        self.set(name, Value::Vec2(v));
    }

    pub fn set_vec3(&mut self, name: impl Into<String>, v: Vec3) {
        self.set(name, Value::Vec3(v));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::vec3;

    #[test]
    fn defaults_when_missing() {
        let s = ObjectState::new();
        assert_eq!(s.float("width"), 0.0);
        assert_eq!(s.str("texture"), "");
        assert!(!s.bool("flag"));
        assert_eq!(s.vec3("pos"), Vec3::ZERO);
    }

    #[test]
    fn mutation_sets_dirty() {
        let mut s = ObjectState::new();
        assert!(!s.is_dirty());
        s.set_float("width", 2.0);
        assert!(s.is_dirty());
        s.mark_clean();
        assert!(!s.is_dirty());
        s.set_str("texture", "asphalt");
        assert!(s.is_dirty());
    }

    #[test]
    fn equality_ignores_dirty() {
        let mut a = ObjectState::new();
        a.set_float("w", 1.0);
        a.set_vec3("p", vec3(1.0, 2.0, 3.0));
        let mut b = a.clone();
        b.mark_clean();
        assert_eq!(a, b);
        b.set_float("w", 2.0);
        assert_ne!(a, b);
    }

    #[test]
    fn int_float_coercion() {
        let mut s = ObjectState::new();
        s.set_int("n", 3);
        assert_eq!(s.float("n"), 3.0);
        s.set_float("m", 2.7);
        assert_eq!(s.int("m"), 2);
    }
}
