use smol_str::SmolStr;
use std::sync::Arc;

// ─── Field Kinds ────────────────────────────────────────────────────────────

/// Byte width of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W1,
    W2,
    W4,
    W8,
}

impl IntWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::W1 => 1,
            IntWidth::W2 => 2,
            IntWidth::W4 => 4,
            IntWidth::W8 => 8,
        }
    }
}

/// Byte width of a floating-point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    W4,
    W8,
}

impl FloatWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            FloatWidth::W4 => 4,
            FloatWidth::W8 => 8,
        }
    }
}

/// The kind of a single field. Determines its byte size in the layout and the
/// accessors that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One byte, 0 or 1.
    Bool,
    /// Signed little-endian integer of the given width.
    Int(IntWidth),
    /// Unsigned little-endian integer of the given width.
    UInt(IntWidth),
    /// IEEE-754 little-endian float of the given width.
    Float(FloatWidth),
    /// UTF-8 text with a fixed byte capacity. Stored as a length prefix
    /// followed by `capacity` bytes; unused tail bytes stay zero.
    Text { capacity: u32 },
    /// Enumerated value stored as an unsigned ordinal. Width comes from
    /// [`LayoutConfig::enum_width`].
    Enum { variants: u32 },
    /// Nested record stored inline, occupying the nested shape's total size.
    Record(Arc<[FieldDescriptor]>),
    /// Fixed-length array of `len` contiguous elements. Element kind may not
    /// itself be an array.
    Array { elem: Box<FieldKind>, len: u32 },
}

impl FieldKind {
    /// Short name used in type-mismatch errors.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Int(_) => "int",
            FieldKind::UInt(_) => "uint",
            FieldKind::Float(_) => "float",
            FieldKind::Text { .. } => "text",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Record(_) => "record",
            FieldKind::Array { .. } => "array",
        }
    }
}

// ─── Field Descriptor ───────────────────────────────────────────────────────

/// One named, typed field of a record shape. Immutable once produced by the
/// descriptor-discovery step; declared order is the order of the slice the
/// planner receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: SmolStr,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<SmolStr>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// ─── Layout Configuration ───────────────────────────────────────────────────

/// Storage width for enum ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumWidth {
    U1,
    U2,
    U4,
}

impl EnumWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            EnumWidth::U1 => 1,
            EnumWidth::U2 => 2,
            EnumWidth::U4 => 4,
        }
    }

    /// Largest ordinal the width can store.
    #[inline]
    pub fn max_ordinal(self) -> u32 {
        match self {
            EnumWidth::U1 => u8::MAX as u32,
            EnumWidth::U2 => u16::MAX as u32,
            EnumWidth::U4 => u32::MAX,
        }
    }
}

/// Width of the used-length prefix in front of a text field's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixWidth {
    U2,
    U4,
}

impl PrefixWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            PrefixWidth::U2 => 2,
            PrefixWidth::U4 => 4,
        }
    }

    /// Largest capacity the prefix can record.
    #[inline]
    pub fn max_capacity(self) -> u32 {
        match self {
            PrefixWidth::U2 => u16::MAX as u32,
            PrefixWidth::U4 => u32::MAX,
        }
    }
}

/// Layout policy knobs. Fixed per planner; two plans of the same shape under
/// the same config are byte-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutConfig {
    /// Storage width for enum ordinals. Default: 4 bytes, wide enough for any
    /// ordinal without per-enum sizing.
    pub enum_width: EnumWidth,
    /// Width of the used-length prefix on text fields. Default: 2 bytes.
    /// Text capacities above 65 535 bytes require `PrefixWidth::U4`.
    pub text_prefix: PrefixWidth,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            enum_width: EnumWidth::U4,
            text_prefix: PrefixWidth::U2,
        }
    }
}
