//! Constant values embedded in the node arena.

use crate::{Name, ValueType};

/// A constant as it appears in a compiled program.
///
/// Floats are stored as bits and strings as interned names so literals stay
/// `Copy + Eq + Hash`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Name),
}

impl Literal {
    pub fn float(value: f64) -> Self {
        Literal::Float(value.to_bits())
    }

    /// The type a literal's runtime value carries.
    pub fn value_type(self) -> ValueType {
        match self {
            Literal::Null => ValueType::Null,
            Literal::Bool(_) => ValueType::Bool,
            Literal::Int(_) => ValueType::Int,
            Literal::Float(_) => ValueType::Float,
            Literal::Str(_) => ValueType::Str,
        }
    }
}
