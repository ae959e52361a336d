//! Recursive-descent parser over the formula grammar: infix arithmetic,
//! comparisons, `&&`/`||`/`!`, typed function calls, `(x, y)` /
//! `(x, y, z)` vector literals and the named constants `pi` and
//! `deg2rad`. Variable names are resolved against the container layout
//! while parsing, so an undeclared name is rejected before any mesh is
//! built.

use super::container::Layout;
use super::{
    ArenaMark, BoolId, BoolNode, Cmp, ExprArena, Fn1, ScalarId, ScalarNode, Vec2Id, Vec2Node,
    Vec3Id, Vec3Node,
};
use crate::error::CalcError;

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(f32),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Bang,
}

pub(crate) struct Parser<'a> {
    toks: Vec<Tok>,
    pos: usize,
    layout: &'a Layout,
    arena: &'a mut ExprArena,
    expr: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(expr: &'a str, layout: &'a Layout, arena: &'a mut ExprArena) -> Result<Self, CalcError> {
        let toks = tokenize(expr)?;
        Ok(Self {
            toks,
            pos: 0,
            layout,
            arena,
            expr,
        })
    }

    pub fn scalar_root(mut self) -> Result<ScalarId, CalcError> {
        let id = self.scalar_expr()?;
        self.expect_eof()?;
        Ok(id)
    }

    pub fn bool_root(mut self) -> Result<BoolId, CalcError> {
        let id = self.bool_expr()?;
        self.expect_eof()?;
        Ok(id)
    }

    pub fn vec2_root(mut self) -> Result<Vec2Id, CalcError> {
        let id = self.vec2_expr()?;
        self.expect_eof()?;
        Ok(id)
    }

    pub fn vec3_root(mut self) -> Result<Vec3Id, CalcError> {
        let id = self.vec3_expr()?;
        self.expect_eof()?;
        Ok(id)
    }

    fn err(&self, msg: impl Into<String>) -> CalcError {
        CalcError::Parse {
            expr: self.expr.to_string(),
            msg: msg.into(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.peek() == Some(t) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, t: &Tok) -> Result<(), CalcError> {
        if self.eat(t) {
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", t, self.peek())))
        }
    }

    fn expect_eof(&self) -> Result<(), CalcError> {
        if self.pos == self.toks.len() {
            Ok(())
        } else {
            Err(self.err(format!("trailing tokens from {:?}", self.peek())))
        }
    }

    fn snapshot(&self) -> (usize, ArenaMark) {
        (self.pos, self.arena.mark())
    }

    fn rollback(&mut self, snap: (usize, ArenaMark)) {
        self.pos = snap.0;
        self.arena.truncate_to(snap.1);
    }

    /// Number of top-level commas inside the parenthesized group that
    /// starts at the current `(`. Distinguishes vector literals from
    /// plain grouping.
    fn top_level_commas(&self) -> usize {
        let mut depth = 0usize;
        let mut commas = 0usize;
        for t in &self.toks[self.pos..] {
            match t {
                Tok::LParen => depth += 1,
                Tok::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Tok::Comma if depth == 1 => commas += 1,
                _ => {}
            }
        }
        commas
    }

    // ----- scalars -----

    fn scalar_expr(&mut self) -> Result<ScalarId, CalcError> {
        let mut lhs = self.scalar_term()?;
        loop {
            if self.eat(&Tok::Plus) {
                let rhs = self.scalar_term()?;
                lhs = self.arena.push_scalar(ScalarNode::Add(lhs, rhs));
            } else if self.eat(&Tok::Minus) {
                let rhs = self.scalar_term()?;
                lhs = self.arena.push_scalar(ScalarNode::Sub(lhs, rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn scalar_term(&mut self) -> Result<ScalarId, CalcError> {
        let mut lhs = self.scalar_factor()?;
        loop {
            let node = if self.eat(&Tok::Star) {
                ScalarNode::Mul(lhs, self.scalar_factor()?)
            } else if self.eat(&Tok::Slash) {
                ScalarNode::Div(lhs, self.scalar_factor()?)
            } else if self.eat(&Tok::Percent) {
                ScalarNode::Rem(lhs, self.scalar_factor()?)
            } else {
                return Ok(lhs);
            };
            lhs = self.arena.push_scalar(node);
        }
    }

    fn scalar_factor(&mut self) -> Result<ScalarId, CalcError> {
        if self.eat(&Tok::Minus) {
            let inner = self.scalar_factor()?;
            return Ok(self.arena.push_scalar(ScalarNode::Neg(inner)));
        }
        let base = self.scalar_primary()?;
        if self.eat(&Tok::Caret) {
            let exp = self.scalar_factor()?;
            return Ok(self.arena.push_scalar(ScalarNode::Pow(base, exp)));
        }
        Ok(base)
    }

    fn scalar_primary(&mut self) -> Result<ScalarId, CalcError> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(self.arena.push_scalar(ScalarNode::Const(n))),
            Some(Tok::LParen) => {
                let id = self.scalar_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(id)
            }
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.scalar_call(&name)
                } else {
                    match name.as_str() {
                        "pi" => Ok(self.arena.push_scalar(ScalarNode::Const(std::f32::consts::PI))),
                        "deg2rad" => Ok(self
                            .arena
                            .push_scalar(ScalarNode::Const(std::f32::consts::PI / 180.0))),
                        _ => {
                            let slot = self.layout.float_slot(&name).ok_or_else(|| {
                                CalcError::UnknownVariable {
                                    kind: "float",
                                    name: name.clone(),
                                }
                            })?;
                            Ok(self.arena.push_scalar(ScalarNode::Var(slot as u32)))
                        }
                    }
                }
            }
            other => Err(self.err(format!("expected a value, found {:?}", other))),
        }
    }

    fn scalar_call(&mut self, name: &str) -> Result<ScalarId, CalcError> {
        self.expect(&Tok::LParen)?;
        let fn1 = match name {
            "sin" => Some(Fn1::Sin),
            "cos" => Some(Fn1::Cos),
            "tan" => Some(Fn1::Tan),
            "sign" => Some(Fn1::Sign),
            "abs" => Some(Fn1::Abs),
            "ceil" => Some(Fn1::Ceil),
            "floor" => Some(Fn1::Floor),
            "round" => Some(Fn1::Round),
            "sqrt" => Some(Fn1::Sqrt),
            _ => None,
        };
        if let Some(f) = fn1 {
            let a = self.scalar_expr()?;
            self.expect(&Tok::RParen)?;
            return Ok(self.arena.push_scalar(ScalarNode::Fn1(f, a)));
        }
        let node = match name {
            "min" | "max" => {
                let a = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.scalar_expr()?;
                if name == "min" {
                    ScalarNode::Min(a, b)
                } else {
                    ScalarNode::Max(a, b)
                }
            }
            "clamp" | "lerp" => {
                let a = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let c = self.scalar_expr()?;
                if name == "clamp" {
                    ScalarNode::Clamp(a, b, c)
                } else {
                    ScalarNode::Lerp(a, b, c)
                }
            }
            "rnd" => {
                let a = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.scalar_expr()?;
                let seed = if self.eat(&Tok::Comma) {
                    Some(self.scalar_expr()?)
                } else {
                    None
                };
                ScalarNode::Rnd(a, b, seed)
            }
            "if" => {
                let c = self.bool_expr()?;
                self.expect(&Tok::Comma)?;
                let a = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.scalar_expr()?;
                ScalarNode::If(c, a, b)
            }
            "dot" | "angle" | "distance" => {
                let a = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec3_expr()?;
                match name {
                    "dot" => ScalarNode::Dot3(a, b),
                    "angle" => ScalarNode::Angle3(a, b),
                    _ => ScalarNode::Dist3(a, b),
                }
            }
            "signedAngle" => {
                let a = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let axis = self.vec3_expr()?;
                ScalarNode::SignedAngle3(a, b, axis)
            }
            "magnitude" | "v3x" | "v3y" | "v3z" => {
                let a = self.vec3_expr()?;
                match name {
                    "magnitude" => ScalarNode::Mag3(a),
                    "v3x" => ScalarNode::X3(a),
                    "v3y" => ScalarNode::Y3(a),
                    _ => ScalarNode::Z3(a),
                }
            }
            "dot2" | "angle2" | "signedAngle2" | "distance2" => {
                let a = self.vec2_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec2_expr()?;
                match name {
                    "dot2" => ScalarNode::Dot2(a, b),
                    "angle2" => ScalarNode::Angle2(a, b),
                    "signedAngle2" => ScalarNode::SignedAngle2(a, b),
                    _ => ScalarNode::Dist2(a, b),
                }
            }
            "v2x" | "v2y" => {
                let a = self.vec2_expr()?;
                if name == "v2x" {
                    ScalarNode::X2(a)
                } else {
                    ScalarNode::Y2(a)
                }
            }
            _ => return Err(self.err(format!("unknown function: {name}"))),
        };
        self.expect(&Tok::RParen)?;
        Ok(self.arena.push_scalar(node))
    }

    // ----- booleans -----

    fn bool_expr(&mut self) -> Result<BoolId, CalcError> {
        let mut lhs = self.bool_and()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.bool_and()?;
            lhs = self.arena.push_bool(BoolNode::Or(lhs, rhs));
        }
        Ok(lhs)
    }

    fn bool_and(&mut self) -> Result<BoolId, CalcError> {
        let mut lhs = self.bool_unary()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.bool_unary()?;
            lhs = self.arena.push_bool(BoolNode::And(lhs, rhs));
        }
        Ok(lhs)
    }

    fn bool_unary(&mut self) -> Result<BoolId, CalcError> {
        if self.eat(&Tok::Bang) {
            let inner = self.bool_unary()?;
            return Ok(self.arena.push_bool(BoolNode::Not(inner)));
        }
        self.bool_primary()
    }

    fn bool_primary(&mut self) -> Result<BoolId, CalcError> {
        // comparison first; on any mismatch the arena is rewound and the
        // other readings are tried
        let snap = self.snapshot();
        if let Ok(a) = self.scalar_expr() {
            let cmp = match self.peek() {
                Some(Tok::Lt) => Some(Cmp::Lt),
                Some(Tok::Le) => Some(Cmp::Le),
                Some(Tok::Gt) => Some(Cmp::Gt),
                Some(Tok::Ge) => Some(Cmp::Ge),
                Some(Tok::EqEq) => Some(Cmp::Eq),
                Some(Tok::Ne) => Some(Cmp::Ne),
                _ => None,
            };
            if let Some(op) = cmp {
                self.pos += 1;
                let b = self.scalar_expr()?;
                return Ok(self.arena.push_bool(BoolNode::Cmp(op, a, b)));
            }
        }
        self.rollback(snap);

        if self.eat(&Tok::LParen) {
            let id = self.bool_expr()?;
            self.expect(&Tok::RParen)?;
            return Ok(id);
        }
        match self.bump() {
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(self.arena.push_bool(BoolNode::Const(true))),
                "false" => Ok(self.arena.push_bool(BoolNode::Const(false))),
                _ => {
                    let slot =
                        self.layout
                            .float_slot(&name)
                            .ok_or_else(|| CalcError::UnknownVariable {
                                kind: "bool",
                                name: name.clone(),
                            })?;
                    Ok(self.arena.push_bool(BoolNode::Var(slot as u32)))
                }
            },
            other => Err(self.err(format!("expected a condition, found {:?}", other))),
        }
    }

    // ----- vec3 -----

    fn vec3_expr(&mut self) -> Result<Vec3Id, CalcError> {
        let mut lhs = self.vec3_term()?;
        loop {
            if self.eat(&Tok::Plus) {
                let rhs = self.vec3_term()?;
                lhs = self.arena.push_vec3(Vec3Node::Add(lhs, rhs));
            } else if self.eat(&Tok::Minus) {
                let rhs = self.vec3_term()?;
                lhs = self.arena.push_vec3(Vec3Node::Sub(lhs, rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn vec3_term(&mut self) -> Result<Vec3Id, CalcError> {
        // the scalar operand of * and / always sits on the right
        let mut lhs = self.vec3_factor()?;
        loop {
            let node = if self.eat(&Tok::Star) {
                Vec3Node::MulF(lhs, self.scalar_factor()?)
            } else if self.eat(&Tok::Slash) {
                Vec3Node::DivF(lhs, self.scalar_factor()?)
            } else {
                return Ok(lhs);
            };
            lhs = self.arena.push_vec3(node);
        }
    }

    fn vec3_factor(&mut self) -> Result<Vec3Id, CalcError> {
        if self.eat(&Tok::Minus) {
            let inner = self.vec3_factor()?;
            return Ok(self.arena.push_vec3(Vec3Node::Neg(inner)));
        }
        self.vec3_primary()
    }

    fn vec3_primary(&mut self) -> Result<Vec3Id, CalcError> {
        if self.peek() == Some(&Tok::LParen) {
            if self.top_level_commas() == 2 {
                self.pos += 1;
                let x = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let y = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let z = self.scalar_expr()?;
                self.expect(&Tok::RParen)?;
                return Ok(self.arena.push_vec3(Vec3Node::Build(x, y, z)));
            }
            self.pos += 1;
            let id = self.vec3_expr()?;
            self.expect(&Tok::RParen)?;
            return Ok(id);
        }
        match self.bump() {
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.vec3_call(&name)
                } else {
                    let slot =
                        self.layout
                            .vec3_slot(&name)
                            .ok_or_else(|| CalcError::UnknownVariable {
                                kind: "vec3",
                                name: name.clone(),
                            })?;
                    Ok(self.arena.push_vec3(Vec3Node::Var(slot as u32)))
                }
            }
            other => Err(self.err(format!("expected a vec3, found {:?}", other))),
        }
    }

    fn vec3_call(&mut self, name: &str) -> Result<Vec3Id, CalcError> {
        self.expect(&Tok::LParen)?;
        let node = match name {
            "normalize" => Vec3Node::Normalize(self.vec3_expr()?),
            "cross" | "scale" | "min" | "max" | "project" | "reflect" => {
                let a = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec3_expr()?;
                match name {
                    "cross" => Vec3Node::Cross(a, b),
                    "scale" => Vec3Node::Scale(a, b),
                    "min" => Vec3Node::Min(a, b),
                    "max" => Vec3Node::Max(a, b),
                    "project" => Vec3Node::Project(a, b),
                    _ => Vec3Node::Reflect(a, b),
                }
            }
            "lerp" | "rotate" => {
                let a = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let f = self.scalar_expr()?;
                if name == "lerp" {
                    Vec3Node::Lerp(a, b, f)
                } else {
                    Vec3Node::Rotate(a, b, f)
                }
            }
            "if" => {
                let c = self.bool_expr()?;
                self.expect(&Tok::Comma)?;
                let a = self.vec3_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec3_expr()?;
                Vec3Node::If(c, a, b)
            }
            _ => return Err(self.err(format!("unknown vec3 function: {name}"))),
        };
        self.expect(&Tok::RParen)?;
        Ok(self.arena.push_vec3(node))
    }

    // ----- vec2 -----

    fn vec2_expr(&mut self) -> Result<Vec2Id, CalcError> {
        let mut lhs = self.vec2_term()?;
        loop {
            if self.eat(&Tok::Plus) {
                let rhs = self.vec2_term()?;
                lhs = self.arena.push_vec2(Vec2Node::Add(lhs, rhs));
            } else if self.eat(&Tok::Minus) {
                let rhs = self.vec2_term()?;
                lhs = self.arena.push_vec2(Vec2Node::Sub(lhs, rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn vec2_term(&mut self) -> Result<Vec2Id, CalcError> {
        let mut lhs = self.vec2_factor()?;
        loop {
            let node = if self.eat(&Tok::Star) {
                Vec2Node::MulF(lhs, self.scalar_factor()?)
            } else if self.eat(&Tok::Slash) {
                Vec2Node::DivF(lhs, self.scalar_factor()?)
            } else {
                return Ok(lhs);
            };
            lhs = self.arena.push_vec2(node);
        }
    }

    fn vec2_factor(&mut self) -> Result<Vec2Id, CalcError> {
        if self.eat(&Tok::Minus) {
            let inner = self.vec2_factor()?;
            return Ok(self.arena.push_vec2(Vec2Node::Neg(inner)));
        }
        self.vec2_primary()
    }

    fn vec2_primary(&mut self) -> Result<Vec2Id, CalcError> {
        if self.peek() == Some(&Tok::LParen) {
            if self.top_level_commas() == 1 {
                self.pos += 1;
                let x = self.scalar_expr()?;
                self.expect(&Tok::Comma)?;
                let y = self.scalar_expr()?;
                self.expect(&Tok::RParen)?;
                return Ok(self.arena.push_vec2(Vec2Node::Build(x, y)));
            }
            self.pos += 1;
            let id = self.vec2_expr()?;
            self.expect(&Tok::RParen)?;
            return Ok(id);
        }
        match self.bump() {
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.vec2_call(&name)
                } else {
                    let slot =
                        self.layout
                            .vec2_slot(&name)
                            .ok_or_else(|| CalcError::UnknownVariable {
                                kind: "vec2",
                                name: name.clone(),
                            })?;
                    Ok(self.arena.push_vec2(Vec2Node::Var(slot as u32)))
                }
            }
            other => Err(self.err(format!("expected a vec2, found {:?}", other))),
        }
    }

    fn vec2_call(&mut self, name: &str) -> Result<Vec2Id, CalcError> {
        self.expect(&Tok::LParen)?;
        let node = match name {
            "scale" | "min" | "max" | "reflect" => {
                let a = self.vec2_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec2_expr()?;
                match name {
                    "scale" => Vec2Node::Scale(a, b),
                    "min" => Vec2Node::Min(a, b),
                    "max" => Vec2Node::Max(a, b),
                    _ => Vec2Node::Reflect(a, b),
                }
            }
            "lerp" => {
                let a = self.vec2_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec2_expr()?;
                self.expect(&Tok::Comma)?;
                let f = self.scalar_expr()?;
                Vec2Node::Lerp(a, b, f)
            }
            "if" => {
                let c = self.bool_expr()?;
                self.expect(&Tok::Comma)?;
                let a = self.vec2_expr()?;
                self.expect(&Tok::Comma)?;
                let b = self.vec2_expr()?;
                Vec2Node::If(c, a, b)
            }
            _ => return Err(self.err(format!("unknown vec2 function: {name}"))),
        };
        self.expect(&Tok::RParen)?;
        Ok(self.arena.push_vec2(node))
    }
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, CalcError> {
    let bytes = expr.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    let parse_err = |msg: String| CalcError::Parse {
        expr: expr.to_string(),
        msg,
    };
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '%' => {
                toks.push(Tok::Percent);
                i += 1;
            }
            '^' => {
                toks.push(Tok::Caret);
                i += 1;
            }
            '<' | '>' | '=' | '!' | '&' | '|' => {
                let next = bytes.get(i + 1).map(|&b| b as char);
                let (tok, len) = match (c, next) {
                    ('<', Some('=')) => (Tok::Le, 2),
                    ('<', _) => (Tok::Lt, 1),
                    ('>', Some('=')) => (Tok::Ge, 2),
                    ('>', _) => (Tok::Gt, 1),
                    ('=', Some('=')) => (Tok::EqEq, 2),
                    ('!', Some('=')) => (Tok::Ne, 2),
                    ('!', _) => (Tok::Bang, 1),
                    ('&', Some('&')) => (Tok::AndAnd, 2),
                    ('|', Some('|')) => (Tok::OrOr, 2),
                    _ => return Err(parse_err(format!("unexpected character '{c}'"))),
                };
                toks.push(tok);
                i += len;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && matches!(bytes[i] as char, '0'..='9' | '.') {
                    i += 1;
                }
                let text = &expr[start..i];
                let n: f32 = text
                    .parse()
                    .map_err(|_| parse_err(format!("bad number '{text}'")))?;
                toks.push(Tok::Num(n));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i] as char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(expr[start..i].to_string()));
            }
            _ => return Err(parse_err(format!("unexpected character '{c}'"))),
        }
    }
    Ok(toks)
}

#[cfg(test)]
mod tests {
    use super::super::{ExprArena, VarKind, VariableContainer};

    fn vc() -> VariableContainer {
        VariableContainer::new(vec![
            ("width".to_string(), VarKind::Float),
            ("pos".to_string(), VarKind::Vec3),
            ("uv".to_string(), VarKind::Vec2),
        ])
    }

    #[test]
    fn precedence() {
        let mut a = ExprArena::default();
        let vc = vc();
        let id = a.parse_scalar("1 + 2 * 3 ^ 2", vc.layout()).unwrap();
        assert_eq!(a.scalar(id, &vc), 19.0);
        let id = a.parse_scalar("10 % 4 / 2", vc.layout()).unwrap();
        assert_eq!(a.scalar(id, &vc), 1.0);
    }

    #[test]
    fn unary_minus_chains() {
        let mut a = ExprArena::default();
        let vc = vc();
        let id = a.parse_scalar("--2 + -3", vc.layout()).unwrap();
        assert_eq!(a.scalar(id, &vc), -1.0);
    }

    #[test]
    fn vec_scalar_mixing() {
        let mut a = ExprArena::default();
        let mut c = vc();
        c.set_float("width", 3.0);
        c.set_vec3("pos", geom::vec3(1.0, 0.0, 0.0));
        let id = a
            .parse_vec3("pos * width + (0, 1, 0)", c.layout())
            .unwrap();
        assert_eq!(a.vec3(id, &c), geom::vec3(3.0, 1.0, 0.0));
    }

    #[test]
    fn vec2_literal_vs_group() {
        let mut a = ExprArena::default();
        let c = vc();
        let id = a.parse_vec2("((1, 2) + (3, 4)) * 0.5", c.layout()).unwrap();
        assert_eq!(a.vec2(id, &c), geom::vec2(2.0, 3.0));
    }

    #[test]
    fn parenthesized_bool_vs_comparison() {
        let mut a = ExprArena::default();
        let mut c = vc();
        c.set_float("width", 2.0);
        let id = a
            .parse_bool("(width + 1) > 2 && (width > 0 || false)", c.layout())
            .unwrap();
        assert!(a.boolean(id, &c));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut a = ExprArena::default();
        let c = vc();
        assert!(a.parse_scalar("1 + 2 )", c.layout()).is_err());
        assert!(a.parse_scalar("width width", c.layout()).is_err());
    }
}
