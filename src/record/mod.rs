//! The two interchangeable record representations and their shared contract.
//!
//! A [`HeapRecord`] owns one storage cell per field. A [`NativeRecord`] owns
//! nothing: it overlays a caller-supplied byte region and resolves every
//! field access to a read/write at a precomputed offset. Equal field values
//! compare equal and hash equal regardless of which representation produced
//! them.

mod codec;
pub mod heap;
pub mod native;

pub use heap::HeapRecord;
pub use native::NativeRecord;

use smol_str::SmolStr;
use std::hash::Hasher;
use std::sync::Arc;

use crate::descriptor::{FieldDescriptor, LayoutConfig};
use crate::error::{AccessError, LayoutError};
use crate::layout::{LayoutPlan, Planner};
use crate::value::FieldValue;

// ─── Read contract ──────────────────────────────────────────────────────────

/// Decoded read access shared by both representations.
///
/// Implementors provide [`plan`](Readable::plan) plus positional decoding;
/// everything name-based is derived here.
pub trait Readable {
    fn plan(&self) -> &Arc<LayoutPlan>;

    /// Decode the field at slot index `idx`.
    fn read_field(&self, idx: usize) -> Result<FieldValue, AccessError>;

    /// Decode one array element of the field at slot index `idx`.
    fn read_element(&self, idx: usize, index: usize) -> Result<FieldValue, AccessError>;

    /// Decode a field by name.
    fn get_value(&self, name: &str) -> Result<FieldValue, AccessError> {
        let (idx, _) = self.plan().find(name)?;
        self.read_field(idx)
    }

    /// Decode one array element by field name.
    fn element(&self, name: &str, index: usize) -> Result<FieldValue, AccessError> {
        let (idx, _) = self.plan().find(name)?;
        self.read_element(idx, index)
    }

    #[inline]
    fn get_bool(&self, name: &str) -> Result<bool, AccessError> {
        expect_kind(self.get_value(name)?, FieldValue::as_bool, "bool")
    }

    #[inline]
    fn get_int(&self, name: &str) -> Result<i64, AccessError> {
        expect_kind(self.get_value(name)?, FieldValue::as_int, "int")
    }

    #[inline]
    fn get_uint(&self, name: &str) -> Result<u64, AccessError> {
        expect_kind(self.get_value(name)?, FieldValue::as_uint, "uint")
    }

    #[inline]
    fn get_float(&self, name: &str) -> Result<f64, AccessError> {
        expect_kind(self.get_value(name)?, FieldValue::as_float, "float")
    }

    #[inline]
    fn get_text(&self, name: &str) -> Result<SmolStr, AccessError> {
        match self.get_value(name)? {
            FieldValue::Text(s) => Ok(s),
            v => Err(AccessError::TypeMismatch {
                expected: "text",
                actual: v.kind_name(),
            }),
        }
    }

    #[inline]
    fn get_enum(&self, name: &str) -> Result<u32, AccessError> {
        expect_kind(self.get_value(name)?, FieldValue::as_enum, "enum")
    }

    /// Typed array-element fast path for integers.
    #[inline]
    fn get_int_at(&self, name: &str, index: usize) -> Result<i64, AccessError> {
        expect_kind(self.element(name, index)?, FieldValue::as_int, "int")
    }

    /// Typed array-element fast path for floats.
    #[inline]
    fn get_float_at(&self, name: &str, index: usize) -> Result<f64, AccessError> {
        expect_kind(self.element(name, index)?, FieldValue::as_float, "float")
    }
}

#[inline]
fn expect_kind<T>(
    value: FieldValue,
    pick: impl FnOnce(&FieldValue) -> Option<T>,
    expected: &'static str,
) -> Result<T, AccessError> {
    match pick(&value) {
        Some(v) => Ok(v),
        None => Err(AccessError::TypeMismatch {
            expected,
            actual: value.kind_name(),
        }),
    }
}

// ─── Write contract ─────────────────────────────────────────────────────────

/// Write access shared by both representations. Values are validated and
/// normalized before anything is stored; a failed set stores nothing.
pub trait Writable: Readable {
    fn write_field(&mut self, idx: usize, value: &FieldValue) -> Result<(), AccessError>;

    fn write_element(
        &mut self,
        idx: usize,
        index: usize,
        value: &FieldValue,
    ) -> Result<(), AccessError>;

    fn set_value(&mut self, name: &str, value: &FieldValue) -> Result<(), AccessError> {
        let (idx, _) = self.plan().find(name)?;
        self.write_field(idx, value)
    }

    fn set_element(&mut self, name: &str, index: usize, value: &FieldValue) -> Result<(), AccessError> {
        let (idx, _) = self.plan().find(name)?;
        self.write_element(idx, index, value)
    }

    #[inline]
    fn set_bool(&mut self, name: &str, v: bool) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Bool(v))
    }

    #[inline]
    fn set_int(&mut self, name: &str, v: i64) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Int(v))
    }

    #[inline]
    fn set_uint(&mut self, name: &str, v: u64) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::UInt(v))
    }

    #[inline]
    fn set_float(&mut self, name: &str, v: f64) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Float(v))
    }

    #[inline]
    fn set_text(&mut self, name: &str, v: &str) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Text(SmolStr::from(v)))
    }

    #[inline]
    fn set_enum(&mut self, name: &str, ordinal: u32) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Enum(ordinal))
    }

    /// Copy a source record's values into a nested-record field. The source
    /// is read once and never retained.
    fn set_record(&mut self, name: &str, src: &HeapRecord) -> Result<(), AccessError> {
        self.set_value(name, &FieldValue::Record(Box::new(src.clone())))
    }

    #[inline]
    fn set_int_at(&mut self, name: &str, index: usize, v: i64) -> Result<(), AccessError> {
        self.set_element(name, index, &FieldValue::Int(v))
    }

    #[inline]
    fn set_float_at(&mut self, name: &str, index: usize, v: f64) -> Result<(), AccessError> {
        self.set_element(name, index, &FieldValue::Float(v))
    }
}

// ─── Representation-blind equality ──────────────────────────────────────────

/// Decoded-value equality over any two readables of the same shape.
///
/// A read failure (an unbound native record) makes the comparison false
/// rather than panicking, which is why an unbound record equals nothing,
/// itself included.
pub(crate) fn records_equal<A, B>(a: &A, b: &B) -> bool
where
    A: Readable + ?Sized,
    B: Readable + ?Sized,
{
    let plan = a.plan();
    if !Arc::ptr_eq(plan, b.plan()) && plan.as_ref() != b.plan().as_ref() {
        return false;
    }
    for i in 0..plan.field_count() {
        match (a.read_field(i), b.read_field(i)) {
            (Ok(x), Ok(y)) if x == y => {}
            _ => return false,
        }
    }
    true
}

/// Decoded-value hashing; equal records hash equal across representations.
pub(crate) fn hash_record<T, H>(record: &T, state: &mut H)
where
    T: Readable + ?Sized,
    H: Hasher,
{
    use std::hash::Hash;
    let plan = record.plan();
    state.write_usize(plan.field_count());
    for i in 0..plan.field_count() {
        // Unreadable fields contribute nothing; such a record is already
        // unequal to everything.
        if let Ok(v) = record.read_field(i) {
            v.hash(state);
        }
    }
}

// ─── Shape factory ──────────────────────────────────────────────────────────

/// Per-shape entry point: mints heap and (unbound) native records over one
/// shared layout plan.
#[derive(Debug, Clone)]
pub struct ShapeFactory {
    name: SmolStr,
    plan: Arc<LayoutPlan>,
}

impl ShapeFactory {
    pub fn new(name: impl Into<SmolStr>, plan: Arc<LayoutPlan>) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }

    /// Plan a descriptor list and wrap the result.
    pub fn from_fields(
        name: impl Into<SmolStr>,
        fields: &[FieldDescriptor],
        config: LayoutConfig,
    ) -> Result<Self, LayoutError> {
        let plan = Planner::new(config).plan(fields)?;
        Ok(Self::new(name, plan))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn plan(&self) -> &Arc<LayoutPlan> {
        &self.plan
    }

    /// Fixed byte size of the shape's native form.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.plan.total_size()
    }

    /// A fresh heap record, zero-initialized: it equals a native record
    /// bound to a zeroed region.
    pub fn heap_record(&self) -> HeapRecord {
        HeapRecord::zeroed(Arc::clone(&self.plan))
    }

    /// A fresh native record, unbound. Field access fails until `bind`.
    pub fn native_record(&self) -> NativeRecord {
        NativeRecord::unbound(Arc::clone(&self.plan))
    }
}
