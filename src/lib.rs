//! Fixed-layout records with two interchangeable representations.
//!
//! Describe a record shape once (named, typed fields in declared order) and
//! get both a heap record that owns its field storage and a native flyweight
//! record that overlays a caller-owned byte region, reading and writing
//! fields at precomputed offsets. Equal field values compare equal and hash
//! equal regardless of representation, and a bound native record's bytes are
//! its complete serialized form: copy them anywhere, bind a fresh record,
//! and the value is back.
//!
//! The [`cache`] module adds the on-demand generation path: source units
//! (JSON manifests, see [`manifest`]) are compiled and linked into
//! [`record::ShapeFactory`] artifacts at most once per (scope, name) pair,
//! concurrency and partial failure included.

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod record;
pub mod region;
pub mod value;

pub use cache::{Backend, CacheError, CompilationError, ImplCache, Registry, Scope};
pub use descriptor::{FieldDescriptor, FieldKind, LayoutConfig};
pub use error::{AccessError, LayoutError};
pub use layout::{LayoutPlan, Planner};
pub use manifest::ManifestBackend;
pub use record::{HeapRecord, NativeRecord, Readable, ShapeFactory, Writable};
pub use region::Region;
pub use value::FieldValue;
