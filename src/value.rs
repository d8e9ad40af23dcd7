use smol_str::SmolStr;
use std::hash::{Hash, Hasher};

use crate::record::HeapRecord;

// ─── FieldValue ─────────────────────────────────────────────────────────────

/// A decoded field value, independent of which representation produced it.
///
/// `get_value` on a heap record and on a native record bound to the same
/// bytes return equal `FieldValue`s; that is the representation-blind
/// equality contract in one type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(SmolStr),
    /// Enum ordinal.
    Enum(u32),
    /// A nested record, decoded into its own heap copy.
    Record(Box<HeapRecord>),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name used in type-mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Enum(_) => "enum",
            FieldValue::Record(_) => "record",
            FieldValue::Array(_) => "array",
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            FieldValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[inline]
    pub fn as_enum(&self) -> Option<u32> {
        match self {
            FieldValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_record(&self) -> Option<&HeapRecord> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl Hash for FieldValue {
    /// Floats hash by bit pattern; equal decoded values hash equal no matter
    /// which representation decoded them.
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            FieldValue::Bool(b) => {
                state.write_u8(0);
                b.hash(state);
            }
            FieldValue::Int(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            FieldValue::UInt(v) => {
                state.write_u8(2);
                v.hash(state);
            }
            FieldValue::Float(v) => {
                state.write_u8(3);
                v.to_bits().hash(state);
            }
            FieldValue::Text(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            FieldValue::Enum(v) => {
                state.write_u8(5);
                v.hash(state);
            }
            FieldValue::Record(r) => {
                state.write_u8(6);
                r.hash(state);
            }
            FieldValue::Array(vs) => {
                state.write_u8(7);
                state.write_usize(vs.len());
                for v in vs {
                    v.hash(state);
                }
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(SmolStr::from(v))
    }
}
