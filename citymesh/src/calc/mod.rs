//! Expression interpreter for the string formulas carried by type
//! descriptors.
//!
//! Four strongly typed node kinds (scalar, boolean, 2D and 3D vector)
//! live in one arena and reference each other through plain `u32` ids.
//! Variable references are resolved to container slots at parse time,
//! so evaluation is a pure walk over flat arrays. Subtrees whose inputs
//! are all constant are folded at construction; `if` and `rnd` never
//! fold.

use geom::{Vec2, Vec3};
use std::sync::OnceLock;

mod container;
mod parse;

pub use container::{Layout, VarKind, VariableContainer};

pub use crate::error::CalcError;

macro_rules! expr_id {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            fn idx(self) -> usize {
                self.0 as usize
            }
        }
    };
}

expr_id!(ScalarId);
expr_id!(BoolId);
expr_id!(Vec2Id);
expr_id!(Vec3Id);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fn1 {
    Sin,
    Cos,
    Tan,
    Sign,
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Copy, Clone, Debug)]
pub enum ScalarNode {
    Const(f32),
    Var(u32),
    Neg(ScalarId),
    Add(ScalarId, ScalarId),
    Sub(ScalarId, ScalarId),
    Mul(ScalarId, ScalarId),
    Div(ScalarId, ScalarId),
    Rem(ScalarId, ScalarId),
    Pow(ScalarId, ScalarId),
    Fn1(Fn1, ScalarId),
    Min(ScalarId, ScalarId),
    Max(ScalarId, ScalarId),
    Clamp(ScalarId, ScalarId, ScalarId),
    Lerp(ScalarId, ScalarId, ScalarId),
    Rnd(ScalarId, ScalarId, Option<ScalarId>),
    If(BoolId, ScalarId, ScalarId),
    Dot3(Vec3Id, Vec3Id),
    Angle3(Vec3Id, Vec3Id),
    SignedAngle3(Vec3Id, Vec3Id, Vec3Id),
    Mag3(Vec3Id),
    Dist3(Vec3Id, Vec3Id),
    X3(Vec3Id),
    Y3(Vec3Id),
    Z3(Vec3Id),
    Dot2(Vec2Id, Vec2Id),
    Angle2(Vec2Id, Vec2Id),
    SignedAngle2(Vec2Id, Vec2Id),
    Dist2(Vec2Id, Vec2Id),
    X2(Vec2Id),
    Y2(Vec2Id),
}

#[derive(Copy, Clone, Debug)]
pub enum BoolNode {
    Const(bool),
    /// Reads the float storage; nonzero is true.
    Var(u32),
    Not(BoolId),
    And(BoolId, BoolId),
    Or(BoolId, BoolId),
    Cmp(Cmp, ScalarId, ScalarId),
}

#[derive(Copy, Clone, Debug)]
pub enum Vec2Node {
    Const(Vec2),
    Var(u32),
    Neg(Vec2Id),
    Add(Vec2Id, Vec2Id),
    Sub(Vec2Id, Vec2Id),
    MulF(Vec2Id, ScalarId),
    DivF(Vec2Id, ScalarId),
    Scale(Vec2Id, Vec2Id),
    Min(Vec2Id, Vec2Id),
    Max(Vec2Id, Vec2Id),
    Reflect(Vec2Id, Vec2Id),
    Lerp(Vec2Id, Vec2Id, ScalarId),
    If(BoolId, Vec2Id, Vec2Id),
    Build(ScalarId, ScalarId),
}

#[derive(Copy, Clone, Debug)]
pub enum Vec3Node {
    Const(Vec3),
    Var(u32),
    Neg(Vec3Id),
    Add(Vec3Id, Vec3Id),
    Sub(Vec3Id, Vec3Id),
    MulF(Vec3Id, ScalarId),
    DivF(Vec3Id, ScalarId),
    Cross(Vec3Id, Vec3Id),
    Scale(Vec3Id, Vec3Id),
    Normalize(Vec3Id),
    Min(Vec3Id, Vec3Id),
    Max(Vec3Id, Vec3Id),
    Project(Vec3Id, Vec3Id),
    Reflect(Vec3Id, Vec3Id),
    Lerp(Vec3Id, Vec3Id, ScalarId),
    Rotate(Vec3Id, Vec3Id, ScalarId),
    If(BoolId, Vec3Id, Vec3Id),
    Build(ScalarId, ScalarId, ScalarId),
}

/// Owns every node of every expression a type declares. Ids are only
/// meaningful within the arena that produced them.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    scalars: Vec<ScalarNode>,
    bools: Vec<BoolNode>,
    vec2s: Vec<Vec2Node>,
    vec3s: Vec<Vec3Node>,
}

fn scratch() -> &'static VariableContainer {
    static SCRATCH: OnceLock<VariableContainer> = OnceLock::new();
    SCRATCH.get_or_init(|| VariableContainer::new(std::iter::empty()))
}

impl ExprArena {
    pub fn parse_scalar(&mut self, expr: &str, layout: &Layout) -> Result<ScalarId, CalcError> {
        parse::Parser::new(expr, layout, self)?.scalar_root()
    }

    pub fn parse_bool(&mut self, expr: &str, layout: &Layout) -> Result<BoolId, CalcError> {
        parse::Parser::new(expr, layout, self)?.bool_root()
    }

    pub fn parse_vec2(&mut self, expr: &str, layout: &Layout) -> Result<Vec2Id, CalcError> {
        parse::Parser::new(expr, layout, self)?.vec2_root()
    }

    pub fn parse_vec3(&mut self, expr: &str, layout: &Layout) -> Result<Vec3Id, CalcError> {
        parse::Parser::new(expr, layout, self)?.vec3_root()
    }

    pub(crate) fn push_scalar(&mut self, node: ScalarNode) -> ScalarId {
        let foldable = self.scalar_foldable(&node);
        let id = ScalarId(self.scalars.len() as u32);
        self.scalars.push(node);
        if foldable {
            self.scalars[id.idx()] = ScalarNode::Const(self.scalar(id, scratch()));
        }
        id
    }

    pub(crate) fn push_bool(&mut self, node: BoolNode) -> BoolId {
        let foldable = self.bool_foldable(&node);
        let id = BoolId(self.bools.len() as u32);
        self.bools.push(node);
        if foldable {
            self.bools[id.idx()] = BoolNode::Const(self.boolean(id, scratch()));
        }
        id
    }

    pub(crate) fn push_vec2(&mut self, node: Vec2Node) -> Vec2Id {
        let foldable = self.vec2_foldable(&node);
        let id = Vec2Id(self.vec2s.len() as u32);
        self.vec2s.push(node);
        if foldable {
            self.vec2s[id.idx()] = Vec2Node::Const(self.vec2(id, scratch()));
        }
        id
    }

    pub(crate) fn push_vec3(&mut self, node: Vec3Node) -> Vec3Id {
        let foldable = self.vec3_foldable(&node);
        let id = Vec3Id(self.vec3s.len() as u32);
        self.vec3s.push(node);
        if foldable {
            self.vec3s[id.idx()] = Vec3Node::Const(self.vec3(id, scratch()));
        }
        id
    }

    fn sc(&self, id: ScalarId) -> bool {
        matches!(self.scalars[id.idx()], ScalarNode::Const(_))
    }

    fn bc(&self, id: BoolId) -> bool {
        matches!(self.bools[id.idx()], BoolNode::Const(_))
    }

    fn v2c(&self, id: Vec2Id) -> bool {
        matches!(self.vec2s[id.idx()], Vec2Node::Const(_))
    }

    fn v3c(&self, id: Vec3Id) -> bool {
        matches!(self.vec3s[id.idx()], Vec3Node::Const(_))
    }

    fn scalar_foldable(&self, n: &ScalarNode) -> bool {
        use ScalarNode::*;
        match *n {
            Const(_) | Var(_) | Rnd(..) | If(..) => false,
            Neg(a) | Fn1(_, a) => self.sc(a),
            Add(a, b) | Sub(a, b) | Mul(a, b) | Div(a, b) | Rem(a, b) | Pow(a, b) | Min(a, b)
            | Max(a, b) => self.sc(a) && self.sc(b),
            Clamp(a, b, c) | Lerp(a, b, c) => self.sc(a) && self.sc(b) && self.sc(c),
            Dot3(a, b) | Angle3(a, b) | Dist3(a, b) => self.v3c(a) && self.v3c(b),
            SignedAngle3(a, b, c) => self.v3c(a) && self.v3c(b) && self.v3c(c),
            Mag3(a) | X3(a) | Y3(a) | Z3(a) => self.v3c(a),
            Dot2(a, b) | Angle2(a, b) | SignedAngle2(a, b) | Dist2(a, b) => {
                self.v2c(a) && self.v2c(b)
            }
            X2(a) | Y2(a) => self.v2c(a),
        }
    }

    fn bool_foldable(&self, n: &BoolNode) -> bool {
        use BoolNode::*;
        match *n {
            Const(_) | Var(_) => false,
            Not(a) => self.bc(a),
            And(a, b) | Or(a, b) => self.bc(a) && self.bc(b),
            Cmp(_, a, b) => self.sc(a) && self.sc(b),
        }
    }

    fn vec2_foldable(&self, n: &Vec2Node) -> bool {
        use Vec2Node::*;
        match *n {
            Const(_) | Var(_) | If(..) => false,
            Neg(a) => self.v2c(a),
            Add(a, b) | Sub(a, b) | Scale(a, b) | Min(a, b) | Max(a, b) | Reflect(a, b) => {
                self.v2c(a) && self.v2c(b)
            }
            MulF(a, f) | DivF(a, f) => self.v2c(a) && self.sc(f),
            Lerp(a, b, f) => self.v2c(a) && self.v2c(b) && self.sc(f),
            Build(x, y) => self.sc(x) && self.sc(y),
        }
    }

    fn vec3_foldable(&self, n: &Vec3Node) -> bool {
        use Vec3Node::*;
        match *n {
            Const(_) | Var(_) | If(..) => false,
            Neg(a) | Normalize(a) => self.v3c(a),
            Add(a, b) | Sub(a, b) | Cross(a, b) | Scale(a, b) | Min(a, b) | Max(a, b)
            | Project(a, b) | Reflect(a, b) => self.v3c(a) && self.v3c(b),
            MulF(a, f) | DivF(a, f) => self.v3c(a) && self.sc(f),
            Lerp(a, b, f) | Rotate(a, b, f) => self.v3c(a) && self.v3c(b) && self.sc(f),
            Build(x, y, z) => self.sc(x) && self.sc(y) && self.sc(z),
        }
    }

    pub fn scalar(&self, id: ScalarId, vc: &VariableContainer) -> f32 {
        use ScalarNode::*;
        match self.scalars[id.idx()] {
            Const(v) => v,
            Var(slot) => vc.floats[slot as usize],
            Neg(a) => -self.scalar(a, vc),
            Add(a, b) => self.scalar(a, vc) + self.scalar(b, vc),
            Sub(a, b) => self.scalar(a, vc) - self.scalar(b, vc),
            Mul(a, b) => self.scalar(a, vc) * self.scalar(b, vc),
            Div(a, b) => self.scalar(a, vc) / self.scalar(b, vc),
            Rem(a, b) => self.scalar(a, vc) % self.scalar(b, vc),
            Pow(a, b) => self.scalar(a, vc).powf(self.scalar(b, vc)),
            Fn1(f, a) => {
                let x = self.scalar(a, vc);
                match f {
                    self::Fn1::Sin => x.sin(),
                    self::Fn1::Cos => x.cos(),
                    self::Fn1::Tan => x.tan(),
                    self::Fn1::Sign => {
                        if x < 0.0 {
                            -1.0
                        } else {
                            1.0
                        }
                    }
                    self::Fn1::Abs => x.abs(),
                    self::Fn1::Ceil => x.ceil(),
                    self::Fn1::Floor => x.floor(),
                    self::Fn1::Round => x.round(),
                    self::Fn1::Sqrt => x.sqrt(),
                }
            }
            Min(a, b) => self.scalar(a, vc).min(self.scalar(b, vc)),
            Max(a, b) => self.scalar(a, vc).max(self.scalar(b, vc)),
            Clamp(a, lo, hi) => {
                let (v, lo, hi) = (self.scalar(a, vc), self.scalar(lo, vc), self.scalar(hi, vc));
                v.max(lo).min(hi)
            }
            Lerp(a, b, t) => {
                let t = self.scalar(t, vc).clamp(0.0, 1.0);
                let a = self.scalar(a, vc);
                a + (self.scalar(b, vc) - a) * t
            }
            Rnd(lo, hi, seed) => {
                let lo = self.scalar(lo, vc);
                let hi = self.scalar(hi, vc);
                let r = match seed {
                    Some(s) => det_rand(self.scalar(s, vc).to_bits()),
                    None => det_rand2(lo.to_bits(), hi.to_bits()),
                };
                lo + r * (hi - lo)
            }
            If(c, a, b) => {
                if self.boolean(c, vc) {
                    self.scalar(a, vc)
                } else {
                    self.scalar(b, vc)
                }
            }
            Dot3(a, b) => self.vec3(a, vc).dot(self.vec3(b, vc)),
            Angle3(a, b) => self.vec3(a, vc).angle(self.vec3(b, vc)).to_degrees(),
            SignedAngle3(a, b, axis) => self
                .vec3(a, vc)
                .signed_angle(self.vec3(b, vc), self.vec3(axis, vc))
                .to_degrees(),
            Mag3(a) => self.vec3(a, vc).mag(),
            Dist3(a, b) => self.vec3(a, vc).distance(self.vec3(b, vc)),
            X3(a) => self.vec3(a, vc).x,
            Y3(a) => self.vec3(a, vc).y,
            Z3(a) => self.vec3(a, vc).z,
            Dot2(a, b) => self.vec2(a, vc).dot(self.vec2(b, vc)),
            Angle2(a, b) => {
                let (a, b) = (self.vec2(a, vc), self.vec2(b, vc));
                a.perp_dot(b).atan2(a.dot(b)).to_degrees().abs()
            }
            SignedAngle2(a, b) => {
                let (a, b) = (self.vec2(a, vc), self.vec2(b, vc));
                a.perp_dot(b).atan2(a.dot(b)).to_degrees()
            }
            Dist2(a, b) => self.vec2(a, vc).distance(self.vec2(b, vc)),
            X2(a) => self.vec2(a, vc).x,
            Y2(a) => self.vec2(a, vc).y,
        }
    }

    pub fn boolean(&self, id: BoolId, vc: &VariableContainer) -> bool {
        use BoolNode::*;
        match self.bools[id.idx()] {
            Const(v) => v,
            Var(slot) => vc.floats[slot as usize] != 0.0,
            Not(a) => !self.boolean(a, vc),
            And(a, b) => self.boolean(a, vc) && self.boolean(b, vc),
            Or(a, b) => self.boolean(a, vc) || self.boolean(b, vc),
            Cmp(op, a, b) => {
                let (a, b) = (self.scalar(a, vc), self.scalar(b, vc));
                match op {
                    self::Cmp::Lt => a < b,
                    self::Cmp::Le => a <= b,
                    self::Cmp::Gt => a > b,
                    self::Cmp::Ge => a >= b,
                    self::Cmp::Eq => a == b,
                    self::Cmp::Ne => a != b,
                }
            }
        }
    }

    pub fn vec2(&self, id: Vec2Id, vc: &VariableContainer) -> Vec2 {
        use Vec2Node::*;
        match self.vec2s[id.idx()] {
            Const(v) => v,
            Var(slot) => vc.vec2s[slot as usize],
            Neg(a) => -self.vec2(a, vc),
            Add(a, b) => self.vec2(a, vc) + self.vec2(b, vc),
            Sub(a, b) => self.vec2(a, vc) - self.vec2(b, vc),
            MulF(a, f) => self.vec2(a, vc) * self.scalar(f, vc),
            DivF(a, f) => self.vec2(a, vc) / self.scalar(f, vc),
            Scale(a, b) => self.vec2(a, vc) * self.vec2(b, vc),
            Min(a, b) => self.vec2(a, vc).min(self.vec2(b, vc)),
            Max(a, b) => self.vec2(a, vc).max(self.vec2(b, vc)),
            Reflect(a, n) => {
                let (a, n) = (self.vec2(a, vc), self.vec2(n, vc));
                a - n * (2.0 * a.dot(n))
            }
            Lerp(a, b, t) => {
                let t = self.scalar(t, vc).clamp(0.0, 1.0);
                self.vec2(a, vc).lerp(self.vec2(b, vc), t)
            }
            If(c, a, b) => {
                if self.boolean(c, vc) {
                    self.vec2(a, vc)
                } else {
                    self.vec2(b, vc)
                }
            }
            Build(x, y) => geom::vec2(self.scalar(x, vc), self.scalar(y, vc)),
        }
    }

    pub fn vec3(&self, id: Vec3Id, vc: &VariableContainer) -> Vec3 {
        use Vec3Node::*;
        match self.vec3s[id.idx()] {
            Const(v) => v,
            Var(slot) => vc.vec3s[slot as usize],
            Neg(a) => -self.vec3(a, vc),
            Add(a, b) => self.vec3(a, vc) + self.vec3(b, vc),
            Sub(a, b) => self.vec3(a, vc) - self.vec3(b, vc),
            MulF(a, f) => self.vec3(a, vc) * self.scalar(f, vc),
            DivF(a, f) => self.vec3(a, vc) / self.scalar(f, vc),
            Cross(a, b) => self.vec3(a, vc).cross(self.vec3(b, vc)),
            Scale(a, b) => self.vec3(a, vc) * self.vec3(b, vc),
            Normalize(a) => self.vec3(a, vc).normalize(),
            Min(a, b) => self.vec3(a, vc).min(self.vec3(b, vc)),
            Max(a, b) => self.vec3(a, vc).max(self.vec3(b, vc)),
            Project(a, b) => self.vec3(a, vc).project_on(self.vec3(b, vc)),
            Reflect(a, n) => self.vec3(a, vc).reflect(self.vec3(n, vc)),
            Lerp(a, b, t) => {
                let t = self.scalar(t, vc).clamp(0.0, 1.0);
                self.vec3(a, vc).lerp(self.vec3(b, vc), t)
            }
            Rotate(a, axis, deg) => self
                .vec3(a, vc)
                .rotate_about(self.vec3(axis, vc), self.scalar(deg, vc).to_radians()),
            If(c, a, b) => {
                if self.boolean(c, vc) {
                    self.vec3(a, vc)
                } else {
                    self.vec3(b, vc)
                }
            }
            Build(x, y, z) => geom::vec3(
                self.scalar(x, vc),
                self.scalar(y, vc),
                self.scalar(z, vc),
            ),
        }
    }

    pub(crate) fn truncate_to(&mut self, mark: ArenaMark) {
        self.scalars.truncate(mark.0);
        self.bools.truncate(mark.1);
        self.vec2s.truncate(mark.2);
        self.vec3s.truncate(mark.3);
    }

    pub(crate) fn mark(&self) -> ArenaMark {
        ArenaMark(
            self.scalars.len(),
            self.bools.len(),
            self.vec2s.len(),
            self.vec3s.len(),
        )
    }
}

#[derive(Copy, Clone)]
pub(crate) struct ArenaMark(usize, usize, usize, usize);

// One-at-a-time hash, same construction as the deterministic noise the
// rest of the engine uses. Keeps `rnd` reproducible without an RNG
// dependency.
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_add(x << 10);
    x ^= x >> 6;
    x = x.wrapping_add(x << 3);
    x ^= x >> 11;
    x = x.wrapping_add(x << 15);
    x
}

// Half-open [0:1) from the low 23 bits.
fn float_construct(m: u32) -> f32 {
    const IEEE_MANTISSA: u32 = 0x007F_FFFF;
    const IEEE_ONE: u32 = 0x3F80_0000;
    f32::from_bits((m & IEEE_MANTISSA) | IEEE_ONE) - 1.0
}

fn det_rand(x: u32) -> f32 {
    float_construct(hash_u32(x))
}

fn det_rand2(x: u32, y: u32) -> f32 {
    float_construct(hash_u32(x ^ hash_u32(y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::{vec3, Vec3};

    fn layout_xy() -> VariableContainer {
        VariableContainer::new(vec![
            ("x".to_string(), VarKind::Float),
            ("y".to_string(), VarKind::Float),
            ("p".to_string(), VarKind::Vec3),
            ("q".to_string(), VarKind::Vec3),
        ])
    }

    #[test]
    fn constant_subtrees_fold() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        let id = arena.parse_scalar("2 * 3 + 1", vc.layout()).unwrap();
        assert!(matches!(arena.scalars[id.idx()], ScalarNode::Const(v) if v == 7.0));
    }

    #[test]
    fn variables_do_not_fold() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        let id = arena.parse_scalar("x + 1", vc.layout()).unwrap();
        assert!(!matches!(arena.scalars[id.idx()], ScalarNode::Const(_)));
    }

    #[test]
    fn eval_reads_container_slots() {
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        let id = arena.parse_scalar("x * y + 1", vc.layout()).unwrap();
        vc.set_float("x", 3.0);
        vc.set_float("y", 4.0);
        assert_eq!(arena.scalar(id, &vc), 13.0);
        vc.set_float("y", 5.0);
        assert_eq!(arena.scalar(id, &vc), 16.0);
    }

    #[test]
    fn if_takes_exactly_one_branch() {
        // 1/0 in the dead branch must not poison the live one
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        let id = arena
            .parse_scalar("if(x > 0, 2, 1 / 0)", vc.layout())
            .unwrap();
        vc.set_float("x", 1.0);
        assert_eq!(arena.scalar(id, &vc), 2.0);
        vc.set_float("x", -1.0);
        assert!(arena.scalar(id, &vc).is_infinite());
    }

    #[test]
    fn seeded_rnd_is_deterministic_and_in_range() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        let id = arena.parse_scalar("rnd(2, 5, 7)", vc.layout()).unwrap();
        let a = arena.scalar(id, &vc);
        let b = arena.scalar(id, &vc);
        assert_eq!(a, b);
        assert!((2.0..5.0).contains(&a));
    }

    #[test]
    fn vec3_ops_eval() {
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        vc.set_vec3("p", vec3(1.0, 0.0, 0.0));
        vc.set_vec3("q", vec3(0.0, 1.0, 0.0));
        let id = arena.parse_vec3("cross(p, q) * 2", vc.layout()).unwrap();
        assert!(arena.vec3(id, &vc).approx_eq(vec3(0.0, 0.0, 2.0)));
        let d = arena.parse_scalar("dot(p, q)", vc.layout()).unwrap();
        assert_eq!(arena.scalar(d, &vc), 0.0);
        let ang = arena.parse_scalar("angle(p, q)", vc.layout()).unwrap();
        assert!((arena.scalar(ang, &vc) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn vec3_literal_and_components() {
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        vc.set_float("x", 5.0);
        let id = arena.parse_vec3("(x, 2, 3)", vc.layout()).unwrap();
        assert_eq!(arena.vec3(id, &vc), vec3(5.0, 2.0, 3.0));
        let y = arena.parse_scalar("v3y((1, 8, 2))", vc.layout()).unwrap();
        assert_eq!(arena.scalar(y, &vc), 8.0);
    }

    #[test]
    fn unknown_variable_fails_at_parse_time() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        assert!(arena.parse_scalar("nope + 1", vc.layout()).is_err());
        assert!(arena.parse_vec3("missing * 2", vc.layout()).is_err());
    }

    #[test]
    fn named_constants() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        let id = arena.parse_scalar("cos(pi)", vc.layout()).unwrap();
        assert!((arena.scalar(id, &vc) + 1.0).abs() < 1e-6);
        let id = arena.parse_scalar("90 * deg2rad", vc.layout()).unwrap();
        assert!((arena.scalar(id, &vc) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn bool_grammar() {
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        let id = arena
            .parse_bool("x > 1 && !(y >= 10) || x == -3", vc.layout())
            .unwrap();
        vc.set_float("x", 2.0);
        vc.set_float("y", 3.0);
        assert!(arena.boolean(id, &vc));
        vc.set_float("y", 20.0);
        assert!(!arena.boolean(id, &vc));
        vc.set_float("x", -3.0);
        assert!(arena.boolean(id, &vc));
    }

    #[test]
    fn lerp_rotate_vec3() {
        let mut arena = ExprArena::default();
        let vc = layout_xy();
        let id = arena
            .parse_vec3("lerp((0,0,0), (2,0,0), 0.5)", vc.layout())
            .unwrap();
        assert!(arena.vec3(id, &vc).approx_eq(vec3(1.0, 0.0, 0.0)));
        let id = arena
            .parse_vec3("rotate((1,0,0), (0,1,0), 90)", vc.layout())
            .unwrap();
        assert!(arena.vec3(id, &vc).approx_eq(vec3(0.0, 0.0, -1.0)));
    }

    #[test]
    fn folding_keeps_evaluation_equal() {
        // a folded tree and an unfoldable copy through a variable agree
        let mut arena = ExprArena::default();
        let mut vc = layout_xy();
        vc.set_float("x", 1.0);
        let folded = arena
            .parse_scalar("sqrt(16) + min(2, 3)", vc.layout())
            .unwrap();
        let live = arena
            .parse_scalar("sqrt(16) * x + min(2, 3) * x", vc.layout())
            .unwrap();
        assert_eq!(arena.scalar(folded, &vc), arena.scalar(live, &vc));
    }

    #[test]
    fn rotate_of_up_axis() {
        let v = vec3(1.0, 0.0, 0.0).rotate_about(Vec3::UP, std::f32::consts::FRAC_PI_2);
        assert!(v.approx_eq(vec3(0.0, 0.0, -1.0)));
    }
}
