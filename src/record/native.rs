use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::descriptor::FieldKind;
use crate::error::AccessError;
use crate::layout::{FieldSlot, LayoutPlan};
use crate::record::heap::HeapRecord;
use crate::record::{Readable, Writable, codec, hash_record, records_equal};
use crate::region::Region;
use crate::value::FieldValue;

// ─── Binding ────────────────────────────────────────────────────────────────

/// One successful `bind`: a region handle plus the base offset into it.
/// Replaced wholesale on rebind, dropped on unbind. Sub-records hold a `Weak`
/// to this, so they die with the binding they were carved out of.
#[derive(Debug)]
struct Binding {
    region: Rc<Region>,
    base: usize,
}

#[derive(Debug, Clone)]
enum BindState {
    Unbound,
    Root(Rc<Binding>),
    /// A nested view into a parent's binding at a fixed relative offset.
    Sub { root: Weak<Binding>, offset: usize },
}

// ─── Native record ──────────────────────────────────────────────────────────

/// The flyweight representation: no owned storage. Every field access
/// resolves to a region read/write at `base + field offset`. Constructed
/// unbound; usable only after a successful [`bind`](NativeRecord::bind).
#[derive(Debug, Clone)]
pub struct NativeRecord {
    plan: Arc<LayoutPlan>,
    state: BindState,
}

impl NativeRecord {
    pub(crate) fn unbound(plan: Arc<LayoutPlan>) -> Self {
        Self {
            plan,
            state: BindState::Unbound,
        }
    }

    /// Fixed byte size this record occupies when bound.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.plan.total_size()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.location().is_ok()
    }

    /// Bind to `available` bytes of `region` starting at `base`. Fails with
    /// `BufferTooSmall` (leaving any prior binding untouched) when fewer than
    /// `total_size` bytes are actually usable. Rebinding is allowed at any
    /// time and invalidates every sub-record of the previous binding.
    pub fn bind(
        &mut self,
        region: &Rc<Region>,
        base: usize,
        available: usize,
    ) -> Result<(), AccessError> {
        let usable = available.min(region.len().saturating_sub(base));
        let needed = self.plan.total_size();
        if usable < needed {
            return Err(AccessError::BufferTooSmall {
                needed,
                available: usable,
            });
        }
        self.state = BindState::Root(Rc::new(Binding {
            region: Rc::clone(region),
            base,
        }));
        Ok(())
    }

    /// Release the region reference without touching its contents.
    pub fn unbind(&mut self) {
        self.state = BindState::Unbound;
    }

    /// Resolve the current binding to (region, absolute base).
    fn location(&self) -> Result<(Rc<Region>, usize), AccessError> {
        match &self.state {
            BindState::Unbound => Err(AccessError::Unbound),
            BindState::Root(b) => Ok((Rc::clone(&b.region), b.base)),
            BindState::Sub { root, offset } => match root.upgrade() {
                Some(b) => Ok((Rc::clone(&b.region), b.base + offset)),
                None => Err(AccessError::Unbound),
            },
        }
    }

    /// The root binding this record hangs off, plus this record's offset
    /// relative to it. Used to carve out sub-records.
    fn sub_root(&self) -> Result<(Weak<Binding>, usize), AccessError> {
        match &self.state {
            BindState::Unbound => Err(AccessError::Unbound),
            BindState::Root(b) => Ok((Rc::downgrade(b), 0)),
            BindState::Sub { root, offset } => {
                if root.strong_count() == 0 {
                    return Err(AccessError::Unbound);
                }
                Ok((root.clone(), *offset))
            }
        }
    }

    fn record_slot(&self, name: &str) -> Result<(usize, &FieldSlot), AccessError> {
        let (idx, slot) = self.plan.find(name)?;
        match slot.field.kind {
            FieldKind::Record(_) => Ok((idx, slot)),
            ref k => Err(AccessError::TypeMismatch {
                expected: "record",
                actual: k.name(),
            }),
        }
    }

    /// A nested record field as its own flyweight, transparently bound to
    /// the sub-range of this record's region. It loses validity the moment
    /// this record (or its root) rebinds or unbinds.
    pub fn record(&self, name: &str) -> Result<NativeRecord, AccessError> {
        let (_, slot) = self.record_slot(name)?;
        let (root, rel) = self.sub_root()?;
        Ok(NativeRecord {
            plan: Arc::clone(slot.nested.as_ref().expect("record slot carries its nested plan")),
            state: BindState::Sub {
                root,
                offset: rel + slot.offset,
            },
        })
    }

    /// One element of an array-of-record field, as a sub-bound flyweight.
    pub fn record_at(&self, name: &str, index: usize) -> Result<NativeRecord, AccessError> {
        let (_, slot) = self.plan.find(name)?;
        let len = match &slot.field.kind {
            FieldKind::Array { elem, len } if matches!(**elem, FieldKind::Record(_)) => {
                *len as usize
            }
            k => {
                return Err(AccessError::TypeMismatch {
                    expected: "array of record",
                    actual: k.name(),
                });
            }
        };
        if index >= len {
            return Err(AccessError::IndexOutOfBounds { index, len });
        }
        let (root, rel) = self.sub_root()?;
        Ok(NativeRecord {
            plan: Arc::clone(slot.nested.as_ref().expect("record slot carries its nested plan")),
            state: BindState::Sub {
                root,
                offset: rel + slot.offset + index * slot.elem_size(),
            },
        })
    }

    /// Decode a text field straight into a caller-owned buffer (cleared
    /// first, never retained). Returns the decoded byte length.
    pub fn get_text_into(&self, name: &str, buf: &mut String) -> Result<usize, AccessError> {
        let (region, base) = self.location()?;
        let (_, slot) = self.plan.find(name)?;
        let capacity = match slot.field.kind {
            FieldKind::Text { capacity } => capacity as usize,
            ref k => {
                return Err(AccessError::TypeMismatch {
                    expected: "text",
                    actual: k.name(),
                });
            }
        };
        region.with_bytes(|bytes| {
            let text = codec::read_text(bytes, base + slot.offset, slot.size, capacity)?;
            buf.clear();
            buf.push_str(text);
            Ok(text.len())
        })
    }

    /// Copy every field of a heap record of the same shape into the bound
    /// range. The source is never retained.
    pub fn copy_from(&self, src: &HeapRecord) -> Result<(), AccessError> {
        if src.plan().as_ref() != self.plan.as_ref() {
            return Err(AccessError::ShapeMismatch);
        }
        let (region, base) = self.location()?;
        region.with_bytes_mut(|bytes| codec::write_record(bytes, base, src));
        Ok(())
    }

    /// Decode the whole record into a heap copy.
    pub fn to_heap(&self) -> Result<HeapRecord, AccessError> {
        let (region, base) = self.location()?;
        region.with_bytes(|bytes| codec::read_record(bytes, base, &self.plan))
    }

    /// Copy the bound `[base, base + total_size)` range verbatim to `dst` at
    /// its write cursor, advancing it. The copied block is the complete
    /// serialized form of the record.
    pub fn write_out(&self, dst: &Rc<Region>) -> Result<(), AccessError> {
        let (region, base) = self.location()?;
        let total = self.plan.total_size();
        if Rc::ptr_eq(&region, dst) {
            let pos = dst.write_pos();
            region.with_bytes_mut(|bytes| {
                let remaining = bytes.len().saturating_sub(pos);
                if total > remaining {
                    return Err(AccessError::RegionExhausted {
                        needed: total,
                        remaining,
                    });
                }
                bytes.copy_within(base..base + total, pos);
                Ok(())
            })?;
            dst.set_write_pos(pos + total);
            return Ok(());
        }
        region.with_bytes(|bytes| dst.put_bytes(&bytes[base..base + total]))
    }

    /// Fill the bound range with `total_size` bytes taken from `src` at its
    /// read cursor, advancing it.
    pub fn read_in(&self, src: &Rc<Region>) -> Result<(), AccessError> {
        let (region, base) = self.location()?;
        let total = self.plan.total_size();
        if Rc::ptr_eq(&region, src) {
            let pos = src.read_pos();
            region.with_bytes_mut(|bytes| {
                let remaining = bytes.len().saturating_sub(pos);
                if total > remaining {
                    return Err(AccessError::RegionExhausted {
                        needed: total,
                        remaining,
                    });
                }
                bytes.copy_within(pos..pos + total, base);
                Ok(())
            })?;
            src.set_read_pos(pos + total);
            return Ok(());
        }
        region.with_bytes_mut(|bytes| src.take_bytes(&mut bytes[base..base + total]))
    }
}

impl Readable for NativeRecord {
    #[inline]
    fn plan(&self) -> &Arc<LayoutPlan> {
        &self.plan
    }

    fn read_field(&self, idx: usize) -> Result<FieldValue, AccessError> {
        let (region, base) = self.location()?;
        let slot = self.plan.slot(idx);
        region.with_bytes(|bytes| {
            codec::read_value(
                bytes,
                base + slot.offset,
                &slot.field.kind,
                slot.size,
                slot.nested.as_ref(),
            )
        })
    }

    fn read_element(&self, idx: usize, index: usize) -> Result<FieldValue, AccessError> {
        let (region, base) = self.location()?;
        let slot = self.plan.slot(idx);
        let (elem, len) = match &slot.field.kind {
            FieldKind::Array { elem, len } => (elem.as_ref(), *len as usize),
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
        let elem_size = slot.elem_size();
        region.with_bytes(|bytes| {
            codec::read_value(
                bytes,
                base + slot.offset + index * elem_size,
                elem,
                elem_size,
                slot.nested.as_ref(),
            )
        })
    }
}

impl Writable for NativeRecord {
    fn write_field(&mut self, idx: usize, value: &FieldValue) -> Result<(), AccessError> {
        let (region, base) = self.location()?;
        let slot = self.plan.slot(idx);
        region.with_bytes_mut(|bytes| {
            codec::write_value(
                bytes,
                base + slot.offset,
                &slot.field.kind,
                slot.size,
                slot.nested.as_ref(),
                value,
            )
        })
    }

    fn write_element(
        &mut self,
        idx: usize,
        index: usize,
        value: &FieldValue,
    ) -> Result<(), AccessError> {
        let (region, base) = self.location()?;
        let slot = self.plan.slot(idx);
        let (elem, len) = match &slot.field.kind {
            FieldKind::Array { elem, len } => (elem.as_ref(), *len as usize),
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
        let elem_size = slot.elem_size();
        region.with_bytes_mut(|bytes| {
            codec::write_value(
                bytes,
                base + slot.offset + index * elem_size,
                elem,
                elem_size,
                slot.nested.as_ref(),
                value,
            )
        })
    }
}

impl PartialEq for NativeRecord {
    /// Decoded-value equality. An unbound record equals nothing, itself
    /// included, which is why there is no `Eq` impl.
    fn eq(&self, other: &Self) -> bool {
        records_equal(self, other)
    }
}

impl PartialEq<HeapRecord> for NativeRecord {
    fn eq(&self, other: &HeapRecord) -> bool {
        records_equal(self, other)
    }
}

impl Hash for NativeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_record(self, state);
    }
}
