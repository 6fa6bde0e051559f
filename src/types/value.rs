//! Tagged values for parameters, metadata and event payloads
//!
//! Instead of a universal type-erased container, the runtime uses one tagged
//! union over the supported scalar kinds plus strings. All string
//! conversions go through this module so coercion rules live in one place.

use crate::error::{RadioError, Result};
use crate::types::{Complex, TypeId};
use std::cmp::Ordering;
use std::fmt;

/// The kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    ComplexFloat32,
    ComplexFloat64,
    String,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Uint8 => "u8",
            ValueKind::Uint16 => "u16",
            ValueKind::Uint32 => "u32",
            ValueKind::Uint64 => "u64",
            ValueKind::Int8 => "i8",
            ValueKind::Int16 => "i16",
            ValueKind::Int32 => "i32",
            ValueKind::Int64 => "i64",
            ValueKind::Float32 => "f32",
            ValueKind::Float64 => "f64",
            ValueKind::ComplexFloat32 => "cf32",
            ValueKind::ComplexFloat64 => "cf64",
            ValueKind::String => "string",
        }
    }

    /// The storage kind for an element type id. The 80-bit alias lanes map
    /// onto their 64-bit storages.
    pub fn for_type_id(tid: TypeId) -> ValueKind {
        match tid {
            TypeId::Uint8 => ValueKind::Uint8,
            TypeId::Uint16 => ValueKind::Uint16,
            TypeId::Uint32 => ValueKind::Uint32,
            TypeId::Uint64 => ValueKind::Uint64,
            TypeId::Int8 => ValueKind::Int8,
            TypeId::Int16 => ValueKind::Int16,
            TypeId::Int32 => ValueKind::Int32,
            TypeId::Int64 => ValueKind::Int64,
            TypeId::Float32 => ValueKind::Float32,
            TypeId::Float64 | TypeId::Float80 => ValueKind::Float64,
            TypeId::ComplexFloat32 => ValueKind::ComplexFloat32,
            TypeId::ComplexFloat64 | TypeId::ComplexFloat80 => ValueKind::ComplexFloat64,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged scalar or string value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    ComplexFloat32(Complex<f32>),
    ComplexFloat64(Complex<f64>),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Uint8(_) => ValueKind::Uint8,
            Value::Uint16(_) => ValueKind::Uint16,
            Value::Uint32(_) => ValueKind::Uint32,
            Value::Uint64(_) => ValueKind::Uint64,
            Value::Int8(_) => ValueKind::Int8,
            Value::Int16(_) => ValueKind::Int16,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::ComplexFloat32(_) => ValueKind::ComplexFloat32,
            Value::ComplexFloat64(_) => ValueKind::ComplexFloat64,
            Value::String(_) => ValueKind::String,
        }
    }

    /// Parse a string into a value of the given kind.
    ///
    /// Booleans accept yes/true/on/1 and no/false/off/0 (case-insensitive);
    /// anything else is an `InvalidDataType` error. Complex values accept
    /// either a plain real part or a `(re,im)` pair.
    pub fn parse(kind: ValueKind, s: &str) -> Result<Value> {
        let s = s.trim();
        let bad = |what: &str| {
            RadioError::InvalidDataType(format!("'{}' could not be converted to {}", s, what))
        };
        let v = match kind {
            ValueKind::Bool => match s.to_ascii_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => Value::Bool(true),
                "no" | "false" | "off" | "0" => Value::Bool(false),
                _ => return Err(bad("bool")),
            },
            ValueKind::Uint8 => Value::Uint8(s.parse().map_err(|_| bad("u8"))?),
            ValueKind::Uint16 => Value::Uint16(s.parse().map_err(|_| bad("u16"))?),
            ValueKind::Uint32 => Value::Uint32(s.parse().map_err(|_| bad("u32"))?),
            ValueKind::Uint64 => Value::Uint64(s.parse().map_err(|_| bad("u64"))?),
            ValueKind::Int8 => Value::Int8(s.parse().map_err(|_| bad("i8"))?),
            ValueKind::Int16 => Value::Int16(s.parse().map_err(|_| bad("i16"))?),
            ValueKind::Int32 => Value::Int32(s.parse().map_err(|_| bad("i32"))?),
            ValueKind::Int64 => Value::Int64(s.parse().map_err(|_| bad("i64"))?),
            ValueKind::Float32 => Value::Float32(s.parse().map_err(|_| bad("f32"))?),
            ValueKind::Float64 => Value::Float64(s.parse().map_err(|_| bad("f64"))?),
            ValueKind::ComplexFloat32 => {
                let (re, im) = parse_complex(s).ok_or_else(|| bad("cf32"))?;
                Value::ComplexFloat32(Complex::new(re as f32, im as f32))
            }
            ValueKind::ComplexFloat64 => {
                let (re, im) = parse_complex(s).ok_or_else(|| bad("cf64"))?;
                Value::ComplexFloat64(Complex::new(re, im))
            }
            ValueKind::String => Value::String(s.to_string()),
        };
        Ok(v)
    }

    /// Numeric view used for interval and step checks. None for bools,
    /// strings and complex values.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Uint8(x) => Some(x as f64),
            Value::Uint16(x) => Some(x as f64),
            Value::Uint32(x) => Some(x as f64),
            Value::Uint64(x) => Some(x as f64),
            Value::Int8(x) => Some(x as f64),
            Value::Int16(x) => Some(x as f64),
            Value::Int32(x) => Some(x as f64),
            Value::Int64(x) => Some(x as f64),
            Value::Float32(x) => Some(x as f64),
            Value::Float64(x) => Some(x),
            _ => None,
        }
    }

    /// Compare two values of the same numeric kind
    pub fn numeric_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.kind() != other.kind() {
            return None;
        }
        self.as_f64()?.partial_cmp(&other.as_f64()?)
    }
}

fn parse_complex(s: &str) -> Option<(f64, f64)> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let (re, im) = inner.split_once(',')?;
        Some((re.trim().parse().ok()?, im.trim().parse().ok()?))
    } else {
        Some((s.parse().ok()?, 0.0))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Uint8(x) => write!(f, "{}", x),
            Value::Uint16(x) => write!(f, "{}", x),
            Value::Uint32(x) => write!(f, "{}", x),
            Value::Uint64(x) => write!(f, "{}", x),
            Value::Int8(x) => write!(f, "{}", x),
            Value::Int16(x) => write!(f, "{}", x),
            Value::Int32(x) => write!(f, "{}", x),
            Value::Int64(x) => write!(f, "{}", x),
            Value::Float32(x) => write!(f, "{}", x),
            Value::Float64(x) => write!(f, "{}", x),
            Value::ComplexFloat32(x) => write!(f, "({},{})", x.re, x.im),
            Value::ComplexFloat64(x) => write!(f, "({},{})", x.re, x.im),
            Value::String(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $var:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Value { Value::$var(v) }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Complex<f32> => ComplexFloat32,
    Complex<f64> => ComplexFloat64,
    String => String,
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_coercion_words() {
        for s in ["yes", "TRUE", "on", "1"] {
            assert_eq!(Value::parse(ValueKind::Bool, s).unwrap(), Value::Bool(true));
        }
        for s in ["no", "False", "OFF", "0"] {
            assert_eq!(Value::parse(ValueKind::Bool, s).unwrap(), Value::Bool(false));
        }
        assert!(matches!(
            Value::parse(ValueKind::Bool, "maybe"),
            Err(RadioError::InvalidDataType(_))
        ));
    }

    #[test]
    fn test_numeric_parse_and_display() {
        assert_eq!(Value::parse(ValueKind::Int32, "-42").unwrap(), Value::Int32(-42));
        assert_eq!(Value::parse(ValueKind::Float64, "2.5").unwrap(), Value::Float64(2.5));
        assert!(Value::parse(ValueKind::Int32, "2.5").is_err());
        assert_eq!(Value::Int32(7).to_string(), "7");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_complex_parse_forms() {
        assert_eq!(
            Value::parse(ValueKind::ComplexFloat32, "(1.5,-2)").unwrap(),
            Value::ComplexFloat32(Complex::new(1.5, -2.0))
        );
        assert_eq!(
            Value::parse(ValueKind::ComplexFloat64, "3").unwrap(),
            Value::ComplexFloat64(Complex::new(3.0, 0.0))
        );
    }

    #[test]
    fn test_numeric_cmp_requires_same_kind() {
        assert_eq!(
            Value::Int32(3).numeric_cmp(&Value::Int32(5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int32(3).numeric_cmp(&Value::Int64(5)), None);
    }

    #[test]
    fn test_storage_kind_for_alias_lanes() {
        assert_eq!(ValueKind::for_type_id(TypeId::Float80), ValueKind::Float64);
        assert_eq!(
            ValueKind::for_type_id(TypeId::ComplexFloat80),
            ValueKind::ComplexFloat64
        );
        assert_eq!(ValueKind::for_type_id(TypeId::Int16), ValueKind::Int16);
    }
}
