//! Field types and tagged values.
//!
//! The 13 wire types are a closed set; [`Value`] is a tagged variant over
//! them.  Cross-type assignment goes through [`Value::convert`], a total
//! function that either produces a value of the target type or `None`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire type tag, stored in the low nibble of a field's flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FieldType {
    U8     = 0,
    I8     = 1,
    U16    = 2,
    I16    = 3,
    U32    = 4,
    I32    = 5,
    U64    = 6,
    I64    = 7,
    F32    = 8,
    F64    = 9,
    String = 10,
    Blob   = 11,
    Guid   = 12,
}

impl FieldType {
    pub const ALL: [FieldType; 13] = [
        FieldType::U8,  FieldType::I8,
        FieldType::U16, FieldType::I16,
        FieldType::U32, FieldType::I32,
        FieldType::U64, FieldType::I64,
        FieldType::F32, FieldType::F64,
        FieldType::String, FieldType::Blob, FieldType::Guid,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    #[inline]
    pub fn tag(self) -> u8 { self as u8 }

    /// Bytes the type occupies inline, in a row record or a constant
    /// default.  Strings are a 4-byte pool offset, blobs an 8-byte
    /// (offset, length) pair.
    pub fn width(self) -> u16 {
        match self {
            FieldType::U8  | FieldType::I8  => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 | FieldType::String => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 | FieldType::Blob   => 8,
            FieldType::Guid => 16,
        }
    }

    /// Zero / empty sentinel for the type.
    pub fn zero(self) -> Value {
        match self {
            FieldType::U8     => Value::U8(0),
            FieldType::I8     => Value::I8(0),
            FieldType::U16    => Value::U16(0),
            FieldType::I16    => Value::I16(0),
            FieldType::U32    => Value::U32(0),
            FieldType::I32    => Value::I32(0),
            FieldType::U64    => Value::U64(0),
            FieldType::I64    => Value::I64(0),
            FieldType::F32    => Value::F32(0.0),
            FieldType::F64    => Value::F64(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Blob   => Value::Blob(Vec::new()),
            FieldType::Guid   => Value::Guid(Uuid::nil()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::U8     => "u8",
            FieldType::I8     => "i8",
            FieldType::U16    => "u16",
            FieldType::I16    => "i16",
            FieldType::U32    => "u32",
            FieldType::I32    => "i32",
            FieldType::U64    => "u64",
            FieldType::I64    => "i64",
            FieldType::F32    => "f32",
            FieldType::F64    => "f64",
            FieldType::String => "string",
            FieldType::Blob   => "blob",
            FieldType::Guid   => "guid",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn is_integer(self) -> bool {
        self.tag() <= FieldType::I64.tag()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A value of one of the 13 wire types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Blob(Vec<u8>),
    Guid(Uuid),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::U8(_)     => FieldType::U8,
            Value::I8(_)     => FieldType::I8,
            Value::U16(_)    => FieldType::U16,
            Value::I16(_)    => FieldType::I16,
            Value::U32(_)    => FieldType::U32,
            Value::I32(_)    => FieldType::I32,
            Value::U64(_)    => FieldType::U64,
            Value::I64(_)    => FieldType::I64,
            Value::F32(_)    => FieldType::F32,
            Value::F64(_)    => FieldType::F64,
            Value::String(_) => FieldType::String,
            Value::Blob(_)   => FieldType::Blob,
            Value::Guid(_)   => FieldType::Guid,
        }
    }

    /// True for the type's zero / empty sentinel.
    pub fn is_zero(&self) -> bool {
        *self == self.field_type().zero()
    }

    fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::U8(v)  => v as i128,
            Value::I8(v)  => v as i128,
            Value::U16(v) => v as i128,
            Value::I16(v) => v as i128,
            Value::U32(v) => v as i128,
            Value::I32(v) => v as i128,
            Value::U64(v) => v as i128,
            Value::I64(v) => v as i128,
            _ => return None,
        })
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_i128().map(|i| i as f64),
        }
    }

    /// Convert into `target`, or `None` when the value is not representable
    /// there (out-of-range integers, fractional floats into integers,
    /// unparsable strings, blobs that are not 16 bytes into GUIDs).
    pub fn convert(&self, target: FieldType) -> Option<Value> {
        if self.field_type() == target {
            return Some(self.clone());
        }
        match (self, target) {
            (Value::String(s), t)    => parse_str(s.trim(), t),
            (v, FieldType::String)   => v.display_string().map(Value::String),
            (Value::Guid(g), FieldType::Blob) => Some(Value::Blob(g.to_bytes_le().to_vec())),
            (Value::Blob(b), FieldType::Guid) => {
                let bytes: [u8; 16] = b.as_slice().try_into().ok()?;
                Some(Value::Guid(Uuid::from_bytes_le(bytes)))
            }
            (Value::F32(_) | Value::F64(_), t) if t.is_integer() => {
                let f = self.as_f64()?;
                if !f.is_finite() || f.fract() != 0.0 || f.abs() > 1.9e19 {
                    return None;
                }
                from_i128(f as i128, t)
            }
            (v, FieldType::F32) => v.as_f64().map(|f| Value::F32(f as f32)),
            (v, FieldType::F64) => v.as_f64().map(Value::F64),
            (v, t) if t.is_integer() => from_i128(v.as_i128()?, t),
            _ => None,
        }
    }

    /// Bit-level identity: unlike `==`, `-0.0` and `+0.0` differ and a NaN
    /// matches a NaN with the same payload.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }

    fn display_string(&self) -> Option<String> {
        Some(match self {
            Value::U8(v)     => v.to_string(),
            Value::I8(v)     => v.to_string(),
            Value::U16(v)    => v.to_string(),
            Value::I16(v)    => v.to_string(),
            Value::U32(v)    => v.to_string(),
            Value::I32(v)    => v.to_string(),
            Value::U64(v)    => v.to_string(),
            Value::I64(v)    => v.to_string(),
            Value::F32(v)    => v.to_string(),
            Value::F64(v)    => v.to_string(),
            Value::String(s) => s.clone(),
            Value::Guid(g)   => g.to_string(),
            Value::Blob(_)   => return None,
        })
    }

    // ── JSON mapping ─────────────────────────────────────────────────────────

    /// Plain JSON rendering: numbers, strings, hex for blobs, hyphenated
    /// GUIDs.  Non-finite floats become `"NaN"`, `"inf"` or `"-inf"`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::U8(v)     => J::from(*v),
            Value::I8(v)     => J::from(*v),
            Value::U16(v)    => J::from(*v),
            Value::I16(v)    => J::from(*v),
            Value::U32(v)    => J::from(*v),
            Value::I32(v)    => J::from(*v),
            Value::U64(v)    => J::from(*v),
            Value::I64(v)    => J::from(*v),
            Value::F32(v) if !v.is_finite() => J::from(v.to_string()),
            Value::F64(v) if !v.is_finite() => J::from(v.to_string()),
            Value::F32(v)    => J::from(*v as f64),
            Value::F64(v)    => J::from(*v),
            Value::String(s) => J::from(s.as_str()),
            Value::Blob(b)   => J::from(hex::encode(b)),
            Value::Guid(g)   => J::from(g.to_string()),
        }
    }

    /// Inverse of [`Value::to_json`] for a known target type.
    pub fn from_json(json: &serde_json::Value, target: FieldType) -> Option<Value> {
        use serde_json::Value as J;
        match (json, target) {
            (J::Null, t) => Some(t.zero()),
            (J::String(s), FieldType::Blob) => hex::decode(s).ok().map(Value::Blob),
            (J::String(s), t) => parse_str(s, t),
            (J::Number(n), t) => {
                let v = if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else {
                    Value::F64(n.as_f64()?)
                };
                v.convert(t)
            }
            _ => None,
        }
    }
}

fn from_i128(i: i128, target: FieldType) -> Option<Value> {
    Some(match target {
        FieldType::U8  => Value::U8(i.try_into().ok()?),
        FieldType::I8  => Value::I8(i.try_into().ok()?),
        FieldType::U16 => Value::U16(i.try_into().ok()?),
        FieldType::I16 => Value::I16(i.try_into().ok()?),
        FieldType::U32 => Value::U32(i.try_into().ok()?),
        FieldType::I32 => Value::I32(i.try_into().ok()?),
        FieldType::U64 => Value::U64(i.try_into().ok()?),
        FieldType::I64 => Value::I64(i.try_into().ok()?),
        _ => return None,
    })
}

fn parse_str(s: &str, target: FieldType) -> Option<Value> {
    Some(match target {
        FieldType::U8     => Value::U8(s.parse().ok()?),
        FieldType::I8     => Value::I8(s.parse().ok()?),
        FieldType::U16    => Value::U16(s.parse().ok()?),
        FieldType::I16    => Value::I16(s.parse().ok()?),
        FieldType::U32    => Value::U32(s.parse().ok()?),
        FieldType::I32    => Value::I32(s.parse().ok()?),
        FieldType::U64    => Value::U64(s.parse().ok()?),
        FieldType::I64    => Value::I64(s.parse().ok()?),
        FieldType::F32    => Value::F32(s.parse().ok()?),
        FieldType::F64    => Value::F64(s.parse().ok()?),
        FieldType::String => Value::String(s.to_owned()),
        FieldType::Guid   => Value::Guid(Uuid::parse_str(s).ok()?),
        FieldType::Blob   => return None,
    })
}

// ── Native conversions ───────────────────────────────────────────────────────

/// A Rust type that maps 1:1 onto one wire type.
pub trait NativeValue: Into<Value> + TryFrom<Value, Error = Value> {
    const FIELD_TYPE: FieldType;
}

macro_rules! native {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl NativeValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::$variant;
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self { Value::$variant(v) }
            }

            impl TryFrom<Value> for $ty {
                type Error = Value;
                fn try_from(v: Value) -> Result<Self, Value> {
                    match v {
                        Value::$variant(x) => Ok(x),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

native! {
    U8 => u8, I8 => i8, U16 => u16, I16 => i16,
    U32 => u32, I32 => i32, U64 => u64, I64 => i64,
    F32 => f32, F64 => f64,
    String => String, Blob => Vec<u8>, Guid => Uuid,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::String(v.to_owned()) }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self { Value::Blob(v.to_vec()) }
}
