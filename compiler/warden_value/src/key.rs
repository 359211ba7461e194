//! Hashable projection of scalar values, used for map keys and set elements.

use std::fmt;
use std::sync::Arc;

use crate::errors::type_mismatch;
use crate::{EvalError, Value};

/// A scalar value usable as a map key or set element.
///
/// Floats are stored as bits with `-0.0` folded into `0.0` and every NaN
/// folded into one canonical NaN, so equal-looking keys hash equally.
/// `Int(1)` and `Float(1.0)` remain distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Arc<str>),
}

impl Key {
    pub fn float(value: f64) -> Self {
        let canonical = if value == 0.0 {
            0.0
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        Key::Float(canonical.to_bits())
    }

    pub fn str(value: &str) -> Self {
        Key::Str(Arc::from(value))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Null => Value::Null,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Key::Str(s) => Value::Str(Arc::clone(s)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Key::Null => "null",
            Key::Bool(_) => "bool",
            Key::Int(_) => "int",
            Key::Float(_) => "float",
            Key::Str(_) => "str",
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = EvalError;

    /// Containers and type handles are not hashable.
    fn try_from(value: &Value) -> Result<Self, EvalError> {
        match value {
            Value::Null => Ok(Key::Null),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Float(f) => Ok(Key::float(*f)),
            Value::Str(s) => Ok(Key::Str(Arc::clone(s))),
            other => Err(type_mismatch("hashable scalar", other.type_name())),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}
