//! Static type tags for program egress/ingress typing.

use std::fmt;

/// Static type of a value as far as the compiler knows it.
///
/// `Any` is the top type. `Float` accepts `Int` (numeric widening); every
/// other tag only accepts itself, `Null`, or is accepted by `Any`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValueType {
    #[default]
    Any,
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Set,
    /// A resolved native type handle.
    Class,
}

impl ValueType {
    /// Whether a value of type `other` may be stored where `self` is expected.
    pub fn is_assignable_from(self, other: ValueType) -> bool {
        match (self, other) {
            (ValueType::Any, _) | (_, ValueType::Null) => true,
            (ValueType::Float, ValueType::Int) => true,
            (expected, actual) => expected == actual,
        }
    }

    /// Whether the type is a container the runtime accounts memory for.
    pub fn is_container(self) -> bool {
        matches!(self, ValueType::List | ValueType::Map | ValueType::Set)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Set => "set",
            ValueType::Class => "class",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
