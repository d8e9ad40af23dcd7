// ─── Errors ─────────────────────────────────────────────────────────────────
use thiserror::Error;

/// Planning-time failures. Fatal for the shape: no instance of it can be
/// created until the descriptor list is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("duplicate field name `{name}`")]
    DuplicateField { name: String },
    #[error("field `{field}`: text capacity must be non-zero")]
    ZeroCapacity { field: String },
    #[error("field `{field}`: capacity {capacity} exceeds the {max} recordable by the length prefix")]
    CapacityTooLarge {
        field: String,
        capacity: u32,
        max: u32,
    },
    #[error("field `{field}`: enum must declare at least one variant")]
    EmptyEnum { field: String },
    #[error("field `{field}`: {variants} variants exceed the configured ordinal width (max ordinal {max})")]
    TooManyVariants {
        field: String,
        variants: u32,
        max: u32,
    },
    #[error("field `{field}`: array length must be non-zero")]
    ZeroLengthArray { field: String },
    #[error("field `{field}`: array elements may not themselves be arrays")]
    NestedArray { field: String },
    /// Consistency check on the finished plan failed.
    #[error("field `{field}`: computed range overlaps its predecessor")]
    Overlap { field: String },
}

/// Runtime failures on heap and native records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("field not found")]
    FieldNotFound,
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Field access on a native record before a successful `bind`.
    #[error("record is not bound to a region")]
    Unbound,
    /// `bind` with fewer available bytes than the shape needs. No binding
    /// takes effect.
    #[error("region too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    /// Marshal cursor ran past the end of its region.
    #[error("region exhausted: need {needed} bytes, {remaining} remaining")]
    RegionExhausted { needed: usize, remaining: usize },
    #[error("text of {len} bytes exceeds field capacity {capacity}")]
    CapacityExceeded { capacity: usize, len: usize },
    /// Stored text bytes are not valid UTF-8 or the length prefix exceeds
    /// capacity. Only possible when the region was scribbled on externally.
    #[error("stored text is malformed")]
    MalformedText,
    #[error("value {value} does not fit a {width}-byte field")]
    IntOutOfRange { value: i64, width: usize },
    #[error("value {value} does not fit a {width}-byte unsigned field")]
    UintOutOfRange { value: u64, width: usize },
    #[error("ordinal {ordinal} out of range for enum with {variants} variants")]
    OrdinalOutOfRange { ordinal: u32, variants: u32 },
    #[error("index {index} out of bounds for array of {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    /// Source record has a different shape than the destination field.
    #[error("record shapes do not match")]
    ShapeMismatch,
}
