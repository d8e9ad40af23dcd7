use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::AccessError;
use crate::layout::LayoutPlan;
use crate::record::native::NativeRecord;
use crate::record::{Readable, Writable, codec, hash_record, records_equal};
use crate::value::FieldValue;

// ─── Heap record ────────────────────────────────────────────────────────────

/// The conventional representation: one owned, decoded cell per field.
/// Always valid once constructed; no external resources.
#[derive(Debug, Clone)]
pub struct HeapRecord {
    plan: Arc<LayoutPlan>,
    cells: Vec<FieldValue>,
}

impl HeapRecord {
    /// Zero-initialized record: every cell holds what a zeroed region
    /// decodes to, so a fresh heap record equals a native record bound to
    /// zeroed bytes.
    pub(crate) fn zeroed(plan: Arc<LayoutPlan>) -> Self {
        let cells = plan
            .slots()
            .iter()
            .map(|s| codec::zero_value(&s.field.kind, s.nested.as_ref()))
            .collect();
        Self { plan, cells }
    }

    pub(crate) fn from_cells(plan: Arc<LayoutPlan>, cells: Vec<FieldValue>) -> Self {
        debug_assert_eq!(cells.len(), plan.field_count());
        Self { plan, cells }
    }

    #[inline]
    pub(crate) fn cells(&self) -> &[FieldValue] {
        &self.cells
    }

    #[inline]
    pub fn total_size(&self) -> usize {
        self.plan.total_size()
    }

    /// Borrow a nested record cell.
    pub fn record(&self, name: &str) -> Result<&HeapRecord, AccessError> {
        let (idx, _) = self.plan.find(name)?;
        match &self.cells[idx] {
            FieldValue::Record(r) => Ok(r),
            v => Err(AccessError::TypeMismatch {
                expected: "record",
                actual: v.kind_name(),
            }),
        }
    }

    /// Borrow a nested record cell mutably.
    pub fn record_mut(&mut self, name: &str) -> Result<&mut HeapRecord, AccessError> {
        let (idx, _) = self.plan.find(name)?;
        match &mut self.cells[idx] {
            FieldValue::Record(r) => Ok(r),
            v => Err(AccessError::TypeMismatch {
                expected: "record",
                actual: v.kind_name(),
            }),
        }
    }

    /// Decode a text field into a caller-owned buffer, appending nothing on
    /// failure. Returns the decoded byte length. The buffer is cleared first
    /// and never retained.
    pub fn get_text_into(&self, name: &str, buf: &mut String) -> Result<usize, AccessError> {
        let (idx, _) = self.plan.find(name)?;
        match &self.cells[idx] {
            FieldValue::Text(s) => {
                buf.clear();
                buf.push_str(s);
                Ok(s.len())
            }
            v => Err(AccessError::TypeMismatch {
                expected: "text",
                actual: v.kind_name(),
            }),
        }
    }

    /// Copy every field into a bound native record of the same shape.
    pub fn store_into(&self, dst: &NativeRecord) -> Result<(), AccessError> {
        dst.copy_from(self)
    }
}

impl Readable for HeapRecord {
    #[inline]
    fn plan(&self) -> &Arc<LayoutPlan> {
        &self.plan
    }

    #[inline]
    fn read_field(&self, idx: usize) -> Result<FieldValue, AccessError> {
        Ok(self.cells[idx].clone())
    }

    fn read_element(&self, idx: usize, index: usize) -> Result<FieldValue, AccessError> {
        match &self.cells[idx] {
            FieldValue::Array(values) => values.get(index).cloned().ok_or_else(|| {
                AccessError::IndexOutOfBounds {
                    index,
                    len: values.len(),
                }
            }),
            v => Err(AccessError::TypeMismatch {
                expected: "array",
                actual: v.kind_name(),
            }),
        }
    }
}

impl Writable for HeapRecord {
    fn write_field(&mut self, idx: usize, value: &FieldValue) -> Result<(), AccessError> {
        let slot = self.plan.slot(idx);
        self.cells[idx] = codec::normalize(&slot.field.kind, slot.nested.as_ref(), value)?;
        Ok(())
    }

    fn write_element(
        &mut self,
        idx: usize,
        index: usize,
        value: &FieldValue,
    ) -> Result<(), AccessError> {
        let slot = self.plan.slot(idx);
        let (elem_kind, len) = match &slot.field.kind {
            crate::descriptor::FieldKind::Array { elem, len } => (elem.as_ref(), *len as usize),
            k => {
                return Err(AccessError::TypeMismatch {
                    expected: "array",
                    actual: k.name(),
                });
            }
        };
        if index >= len {
            return Err(AccessError::IndexOutOfBounds { index, len });
        }
        let normalized = codec::normalize(elem_kind, slot.nested.as_ref(), value)?;
        match &mut self.cells[idx] {
            FieldValue::Array(values) => {
                values[index] = normalized;
                Ok(())
            }
            v => Err(AccessError::TypeMismatch {
                expected: "array",
                actual: v.kind_name(),
            }),
        }
    }
}

impl PartialEq for HeapRecord {
    fn eq(&self, other: &Self) -> bool {
        records_equal(self, other)
    }
}

impl PartialEq<NativeRecord> for HeapRecord {
    fn eq(&self, other: &NativeRecord) -> bool {
        records_equal(self, other)
    }
}

impl Hash for HeapRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_record(self, state);
    }
}
