use rustc_hash::FxHashMap;
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

use crate::descriptor::{FieldDescriptor, FieldKind, LayoutConfig};
use crate::error::{AccessError, LayoutError};

pub type FastMap<K, V> = FxHashMap<K, V>;

// ─── Layout Plan ────────────────────────────────────────────────────────────

/// One field's place in the layout: the descriptor plus its resolved
/// byte range `[offset, offset + size)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub field: FieldDescriptor,
    pub offset: usize,
    pub size: usize,
    /// Resolved nested plan for `Record` fields and for array elements of
    /// record kind. `None` for everything else.
    pub nested: Option<Arc<LayoutPlan>>,
}

impl FieldSlot {
    /// Byte size of one array element. Meaningless for non-array slots.
    #[inline]
    pub fn elem_size(&self) -> usize {
        match self.field.kind {
            FieldKind::Array { len, .. } => self.size / len as usize,
            _ => self.size,
        }
    }
}

/// The complete offset/size assignment for a record shape. Computed once per
/// distinct shape, immutable, shared across every instance of the shape.
#[derive(Debug)]
pub struct LayoutPlan {
    slots: Vec<FieldSlot>,
    total_size: usize,
    /// xxh64(name) -> slot index. First writer wins on the (astronomically
    /// unlikely) hash collision; lookups verify the name and fall back to a
    /// linear scan.
    by_hash: FastMap<u64, u32>,
    config: LayoutConfig,
}

impl LayoutPlan {
    /// Total byte size of the shape. Zero only for a zero-field shape.
    #[inline]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    #[inline]
    pub fn slot(&self, i: usize) -> &FieldSlot {
        &self.slots[i]
    }

    #[inline]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Find a field's slot index by name.
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        let hash = xxh64(name.as_bytes(), 0);
        if let Some(&i) = self.by_hash.get(&hash) {
            if self.slots[i as usize].field.name == name {
                return Some(i as usize);
            }
        }
        // Hash collision with a different name: resolve by scanning.
        self.slots.iter().position(|s| s.field.name == name)
    }

    /// Find a field by name. Returns (slot_index, slot).
    #[inline]
    pub fn find(&self, name: &str) -> Result<(usize, &FieldSlot), AccessError> {
        match self.slot_index(name) {
            Some(i) => Ok((i, &self.slots[i])),
            None => Err(AccessError::FieldNotFound),
        }
    }
}

impl PartialEq for LayoutPlan {
    /// Structural shape equality: same fields at the same offsets with the
    /// same total. The name index is derived state and not compared.
    fn eq(&self, other: &Self) -> bool {
        self.total_size == other.total_size && self.slots == other.slots
    }
}

// ─── Planner ────────────────────────────────────────────────────────────────

/// Computes layout plans from ordered field descriptor lists.
///
/// Deterministic for a given input order and config. Nested shapes are
/// memoized by structural key, so the same nested shape always resolves to
/// the same shared plan (and therefore the same total size) no matter where
/// it appears.
#[derive(Debug)]
pub struct Planner {
    config: LayoutConfig,
    memo: FastMap<Arc<[FieldDescriptor]>, Arc<LayoutPlan>>,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl Planner {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            memo: FastMap::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Plan a shape. Fields are placed tightly packed in declared order; no
    /// padding is ever inserted. Never drops or reorders fields.
    pub fn plan(&mut self, fields: &[FieldDescriptor]) -> Result<Arc<LayoutPlan>, LayoutError> {
        if let Some(plan) = self.memo.get(fields) {
            return Ok(Arc::clone(plan));
        }

        let mut seen: FastMap<&str, ()> = FastMap::default();
        for f in fields {
            if seen.insert(f.name.as_str(), ()).is_some() {
                return Err(LayoutError::DuplicateField {
                    name: f.name.to_string(),
                });
            }
        }

        let mut slots = Vec::with_capacity(fields.len());
        let mut by_hash: FastMap<u64, u32> = FastMap::default();
        let mut offset = 0usize;

        for (i, f) in fields.iter().enumerate() {
            let (size, nested) = self.field_size(&f.name, &f.kind)?;
            slots.push(FieldSlot {
                field: f.clone(),
                offset,
                size,
                nested,
            });
            by_hash
                .entry(xxh64(f.name.as_bytes(), 0))
                .or_insert(i as u32);
            offset += size;
        }

        let total_size = offset;
        check_disjoint(&slots)?;

        let plan = Arc::new(LayoutPlan {
            slots,
            total_size,
            by_hash,
            config: self.config,
        });
        self.memo
            .insert(Arc::from(fields.to_vec()), Arc::clone(&plan));
        Ok(plan)
    }

    /// Byte size of one field, plus the resolved nested plan where the kind
    /// carries one. Recurses through records and array elements.
    fn field_size(
        &mut self,
        name: &str,
        kind: &FieldKind,
    ) -> Result<(usize, Option<Arc<LayoutPlan>>), LayoutError> {
        match kind {
            FieldKind::Bool => Ok((1, None)),
            FieldKind::Int(w) | FieldKind::UInt(w) => Ok((w.bytes(), None)),
            FieldKind::Float(w) => Ok((w.bytes(), None)),
            FieldKind::Text { capacity } => {
                if *capacity == 0 {
                    return Err(LayoutError::ZeroCapacity {
                        field: name.to_string(),
                    });
                }
                let prefix = self.config.text_prefix;
                if *capacity > prefix.max_capacity() {
                    return Err(LayoutError::CapacityTooLarge {
                        field: name.to_string(),
                        capacity: *capacity,
                        max: prefix.max_capacity(),
                    });
                }
                Ok((prefix.bytes() + *capacity as usize, None))
            }
            FieldKind::Enum { variants } => {
                if *variants == 0 {
                    return Err(LayoutError::EmptyEnum {
                        field: name.to_string(),
                    });
                }
                let width = self.config.enum_width;
                if *variants - 1 > width.max_ordinal() {
                    return Err(LayoutError::TooManyVariants {
                        field: name.to_string(),
                        variants: *variants,
                        max: width.max_ordinal(),
                    });
                }
                Ok((width.bytes(), None))
            }
            FieldKind::Record(inner) => {
                let nested = self.plan(inner)?;
                Ok((nested.total_size(), Some(nested)))
            }
            FieldKind::Array { elem, len } => {
                if *len == 0 {
                    return Err(LayoutError::ZeroLengthArray {
                        field: name.to_string(),
                    });
                }
                if matches!(**elem, FieldKind::Array { .. }) {
                    return Err(LayoutError::NestedArray {
                        field: name.to_string(),
                    });
                }
                let (elem_size, nested) = self.field_size(name, elem)?;
                Ok((elem_size * *len as usize, nested))
            }
        }
    }
}

/// Defensive pass over a finished plan: every slot must start exactly where
/// its predecessor ended.
fn check_disjoint(slots: &[FieldSlot]) -> Result<(), LayoutError> {
    let mut end = 0usize;
    for s in slots {
        if s.offset != end {
            return Err(LayoutError::Overlap {
                field: s.field.name.to_string(),
            });
        }
        end = s.offset + s.size;
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EnumWidth, FloatWidth, IntWidth, PrefixWidth};

    fn fd(name: &str, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor::new(name, kind)
    }

    #[test]
    fn test_scalar_widths_tightly_packed() {
        let fields = [
            fd("flag", FieldKind::Bool),
            fd("b", FieldKind::Int(IntWidth::W1)),
            fd("s", FieldKind::Int(IntWidth::W2)),
            fd("i", FieldKind::Int(IntWidth::W4)),
            fd("l", FieldKind::Int(IntWidth::W8)),
            fd("f", FieldKind::Float(FloatWidth::W4)),
            fd("d", FieldKind::Float(FloatWidth::W8)),
        ];
        let plan = Planner::default().plan(&fields).unwrap();

        let offsets: Vec<usize> = plan.slots().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 4, 8, 16, 20]);
        assert_eq!(plan.total_size(), 28);
    }

    #[test]
    fn test_ranges_disjoint_and_cover_total() {
        let fields = [
            fd("a", FieldKind::UInt(IntWidth::W2)),
            fd("t", FieldKind::Text { capacity: 11 }),
            fd("e", FieldKind::Enum { variants: 3 }),
            fd(
                "xs",
                FieldKind::Array {
                    elem: Box::new(FieldKind::Int(IntWidth::W4)),
                    len: 5,
                },
            ),
        ];
        let plan = Planner::default().plan(&fields).unwrap();

        let mut end = 0;
        for slot in plan.slots() {
            assert_eq!(slot.offset, end, "slot `{}` overlaps", slot.field.name);
            end = slot.offset + slot.size;
        }
        assert_eq!(end, plan.total_size());
        // text: 2-byte prefix + 11, enum: 4, array: 4 * 5
        assert_eq!(plan.total_size(), 2 + 13 + 4 + 20);
    }

    #[test]
    fn test_zero_field_shape_has_zero_size() {
        let plan = Planner::default().plan(&[]).unwrap();
        assert_eq!(plan.total_size(), 0);
        assert_eq!(plan.field_count(), 0);
    }

    #[test]
    fn test_nested_record_reserves_inner_total() {
        let inner: Arc<[FieldDescriptor]> = Arc::from(vec![
            fd("bid", FieldKind::Float(FloatWidth::W8)),
            fd("ask", FieldKind::Float(FloatWidth::W8)),
        ]);
        let fields = [
            fd("key", FieldKind::Text { capacity: 8 }),
            fd("quote", FieldKind::Record(Arc::clone(&inner))),
        ];
        let plan = Planner::default().plan(&fields).unwrap();

        let quote = plan.slot(1);
        assert_eq!(quote.size, 16);
        assert_eq!(quote.nested.as_ref().unwrap().total_size(), 16);
        assert_eq!(plan.total_size(), 10 + 16);
    }

    #[test]
    fn test_nested_shape_memoized() {
        let inner: Arc<[FieldDescriptor]> =
            Arc::from(vec![fd("v", FieldKind::Int(IntWidth::W8))]);
        let fields = [
            fd("one", FieldKind::Record(Arc::clone(&inner))),
            fd("two", FieldKind::Record(Arc::clone(&inner))),
        ];
        let mut planner = Planner::default();
        let plan = planner.plan(&fields).unwrap();

        let a = plan.slot(0).nested.as_ref().unwrap();
        let b = plan.slot(1).nested.as_ref().unwrap();
        assert!(Arc::ptr_eq(a, b), "same nested shape must share one plan");

        // Planning the nested shape directly resolves to the memoized plan.
        let again = planner.plan(&inner).unwrap();
        assert!(Arc::ptr_eq(&again, a));
    }

    #[test]
    fn test_lookup_by_name() {
        let fields = [
            fd("alpha", FieldKind::Bool),
            fd("beta", FieldKind::Int(IntWidth::W4)),
        ];
        let plan = Planner::default().plan(&fields).unwrap();
        assert_eq!(plan.slot_index("alpha"), Some(0));
        assert_eq!(plan.slot_index("beta"), Some(1));
        assert_eq!(plan.slot_index("gamma"), None);
        assert!(plan.find("gamma").is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let fields = [fd("x", FieldKind::Bool), fd("x", FieldKind::Bool)];
        let err = Planner::default().plan(&fields).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateField { .. }));
    }

    #[test]
    fn test_malformed_descriptors_rejected() {
        let cases: Vec<(FieldKind, fn(&LayoutError) -> bool)> = vec![
            (FieldKind::Text { capacity: 0 }, |e| {
                matches!(e, LayoutError::ZeroCapacity { .. })
            }),
            (FieldKind::Enum { variants: 0 }, |e| {
                matches!(e, LayoutError::EmptyEnum { .. })
            }),
            (
                FieldKind::Array {
                    elem: Box::new(FieldKind::Bool),
                    len: 0,
                },
                |e| matches!(e, LayoutError::ZeroLengthArray { .. }),
            ),
            (
                FieldKind::Array {
                    elem: Box::new(FieldKind::Array {
                        elem: Box::new(FieldKind::Bool),
                        len: 2,
                    }),
                    len: 2,
                },
                |e| matches!(e, LayoutError::NestedArray { .. }),
            ),
        ];
        for (kind, check) in cases {
            let err = Planner::default().plan(&[fd("bad", kind)]).unwrap_err();
            assert!(check(&err), "unexpected error: {err:?}");
        }
    }

    #[test]
    fn test_capacity_must_fit_prefix() {
        let fields = [fd("t", FieldKind::Text { capacity: 70_000 })];
        let err = Planner::default().plan(&fields).unwrap_err();
        assert!(matches!(err, LayoutError::CapacityTooLarge { .. }));

        // A 4-byte prefix accepts the same capacity.
        let cfg = LayoutConfig {
            text_prefix: PrefixWidth::U4,
            ..LayoutConfig::default()
        };
        let plan = Planner::new(cfg).plan(&fields).unwrap();
        assert_eq!(plan.total_size(), 4 + 70_000);
    }

    #[test]
    fn test_enum_width_config() {
        let fields = [fd("e", FieldKind::Enum { variants: 300 })];
        let cfg = LayoutConfig {
            enum_width: EnumWidth::U1,
            ..LayoutConfig::default()
        };
        let err = Planner::new(cfg).plan(&fields).unwrap_err();
        assert!(matches!(err, LayoutError::TooManyVariants { .. }));

        let plan = Planner::default().plan(&fields).unwrap();
        assert_eq!(plan.slot(0).size, 4);
    }

    #[test]
    fn test_array_of_text_elem_size() {
        let fields = [fd(
            "names",
            FieldKind::Array {
                elem: Box::new(FieldKind::Text { capacity: 6 }),
                len: 3,
            },
        )];
        let plan = Planner::default().plan(&fields).unwrap();
        let slot = plan.slot(0);
        assert_eq!(slot.elem_size(), 8);
        assert_eq!(slot.size, 24);
    }
}
