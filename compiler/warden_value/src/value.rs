//! Runtime values.
//!
//! Scalars are inline; strings share an `Arc<str>`. Containers are handles:
//! cloning a `Value::List` yields another handle to the same accounted list,
//! which is how scripts observe aliasing.

use std::fmt;
use std::sync::Arc;

use warden_ir::ValueType;
use warden_sandbox::ClassPath;

use crate::{ExecList, ExecMap, ExecSet};

/// A resolved native type, as produced by a type reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassHandle {
    pub path: ClassPath,
    /// Fully-qualified dotted name, kept for display and error messages.
    pub name: Arc<str>,
}

/// Runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ExecList),
    Map(ExecMap),
    Set(ExecSet),
    Class(ClassHandle),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Set(_) => ValueType::Set,
            Value::Class(_) => ValueType::Class,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[expect(
                clippy::cast_precision_loss,
                reason = "mixed int/float arithmetic widens like the host language"
            )]
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers, and strings that parse as numbers.
    pub fn numeric_text(&self) -> Option<f64> {
        match self {
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
    }

    /// Cost of this value as stored inside a container: containers count
    /// their own running memory size.
    pub fn estimated_size(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Class(_) => 8,
            Value::Str(s) => i64::try_from(s.len()).unwrap_or(i64::MAX),
            Value::List(list) => list.memory_size(),
            Value::Map(map) => map.memory_size(),
            Value::Set(set) => set.memory_size(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.content_eq(b),
            (Value::Map(a), Value::Map(b)) => a.content_eq(b),
            (Value::Set(a), Value::Set(b)) => a.content_eq(b),
            (Value::Class(a), Value::Class(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<ExecList> for Value {
    fn from(list: ExecList) -> Self {
        Value::List(list)
    }
}

impl From<ExecMap> for Value {
    fn from(map: ExecMap) -> Self {
        Value::Map(map)
    }
}

impl From<ExecSet> for Value {
    fn from(set: ExecSet) -> Self {
        Value::Set(set)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.values().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.pairs().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Value::Set(set) => {
                f.write_str("[")?;
                for (i, key) in set.keys().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}")?;
                }
                f.write_str("]")
            }
            Value::Class(class) => write!(f, "class {}", class.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(list) => write!(f, "List#{}({self})", list.id()),
            Value::Map(map) => write!(f, "Map#{}({self})", map.id()),
            Value::Set(set) => write!(f, "Set#{}({self})", set.id()),
            other => write!(f, "{other}"),
        }
    }
}
