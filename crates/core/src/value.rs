//! Values passed to and returned from test bodies
//!
//! One variant per declarable parameter type. Equality follows the usual
//! type rules: different variants are never equal, `Int(1) != Long(1)`.

use crate::decl::ParamType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A runtime value flowing through a test, check or run body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value (`void` return)
    Void,
    /// `boolean`
    Bool(bool),
    /// `byte`
    Byte(i8),
    /// `char` (UTF-16 code unit)
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Instance of the named reference type
    Object(String),
    /// Null reference
    Null,
}

impl Value {
    /// True if this value can be passed where `ty` is expected.
    pub fn fits(&self, ty: &ParamType) -> bool {
        matches!(
            (self, ty),
            (Value::Void, ParamType::Void)
                | (Value::Bool(_), ParamType::Boolean)
                | (Value::Byte(_), ParamType::Byte)
                | (Value::Char(_), ParamType::Char)
                | (Value::Short(_), ParamType::Short)
                | (Value::Int(_), ParamType::Int)
                | (Value::Long(_), ParamType::Long)
                | (Value::Float(_), ParamType::Float)
                | (Value::Double(_), ParamType::Double)
                | (Value::Object(_), ParamType::Object(_))
                | (Value::Null, ParamType::Object(_))
        )
    }

    /// Zero value of a primitive type, `Null` for references and `Void` otherwise.
    pub fn zero(ty: &ParamType) -> Value {
        match ty {
            ParamType::Boolean => Value::Bool(false),
            ParamType::Byte => Value::Byte(0),
            ParamType::Char => Value::Char(0),
            ParamType::Short => Value::Short(0),
            ParamType::Int => Value::Int(0),
            ParamType::Long => Value::Long(0),
            ParamType::Float => Value::Float(0.0),
            ParamType::Double => Value::Double(0.0),
            ParamType::Object(_) => Value::Null,
            ParamType::Void | ParamType::TestInfo | ParamType::RunInfo => Value::Void,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral payload widened to `i64`, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Char(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'\\u{:04x}'", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{}f", v),
            Value::Double(v) => write!(f, "{}d", v),
            Value::Object(class) => write!(f, "{}@instance", class),
            Value::Null => f.write_str("null"),
        }
    }
}
