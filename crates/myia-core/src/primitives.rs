//! The closed set of primitive operators the IR and VM know about.
//!
//! Mirrors the way the teacher crate enumerates its op catalog as a flat,
//! exhaustively-matched enum (see `ops::ComputeOp`) rather than an open trait
//! object hierarchy: primitives are symbolic tags, not behavior.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A symbolic identifier for a built-in operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    // Control
    Return,
    If,
    Partial,
    Resolve,

    // Arithmetic / comparison
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    LShift,
    RShift,
    And,
    Or,
    Xor,
    Pos,
    Neg,
    Invert,
    Not,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Is,
    IsNot,
    Contains,

    // Structural
    ConsTuple,
    GetItem,
    GetAttr,

    // Array family (inference-only contracts; no host implementation required)
    MapArray,
    ScanArray,
    ReduceArray,
    Distribute,
    Reshape,
    Dot,
}

impl Primitive {
    /// The fixed arity of this primitive, or `None` if it is variadic.
    ///
    /// `Partial` and `ConsTuple`-folding call sites are variadic at the
    /// `Apply` level; the primitive itself still expects at least one input
    /// (the function, or the list being folded), enforced by the parser and
    /// VM rather than here.
    pub fn arity(self) -> Option<usize> {
        use Primitive::*;
        match self {
            Return => Some(1),
            If => Some(3),
            Partial => None,
            Resolve => Some(2),
            Add | Sub | Mul | TrueDiv | FloorDiv | Mod | Pow | MatMul | LShift | RShift | And
            | Or | Xor | Eq | Ne | Lt | Gt | Le | Ge | Is | IsNot | Contains | GetItem => Some(2),
            Pos | Neg | Invert | Not => Some(1),
            ConsTuple => Some(2),
            GetAttr => Some(2),
            MapArray => Some(2),
            ScanArray => Some(4),
            ReduceArray => Some(4),
            Distribute => Some(2),
            Reshape => Some(2),
            Dot => Some(2),
        }
    }

    /// The operator-module symbol this primitive resolves from, for the
    /// subset reachable directly from surface-language operators.
    pub fn operator_symbol(self) -> Option<&'static str> {
        use Primitive::*;
        Some(match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            TrueDiv => "truediv",
            FloorDiv => "floordiv",
            Mod => "mod",
            Pow => "pow",
            MatMul => "matmul",
            LShift => "lshift",
            RShift => "rshift",
            And => "and_",
            Or => "or_",
            Xor => "xor",
            Pos => "pos",
            Neg => "neg",
            Invert => "invert",
            Not => "not_",
            Eq => "eq",
            Ne => "ne",
            Lt => "lt",
            Gt => "gt",
            Le => "le",
            Ge => "ge",
            Is => "is_",
            IsNot => "is_not",
            Contains => "contains",
            GetItem => "getitem",
            _ => return None,
        })
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arities_match_the_closed_set() {
        assert_eq!(Primitive::If.arity(), Some(3));
        assert_eq!(Primitive::Partial.arity(), None);
        assert_eq!(Primitive::Not.arity(), Some(1));
        assert_eq!(Primitive::Dot.arity(), Some(2));
    }

    #[test]
    fn operator_symbols_round_trip_for_binops() {
        assert_eq!(Primitive::Add.operator_symbol(), Some("add"));
        assert_eq!(Primitive::Not.operator_symbol(), Some("not_"));
        assert_eq!(Primitive::Return.operator_symbol(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&Primitive::Dot).unwrap();
        let back: Primitive = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Primitive::Dot);
    }
}
