//! JSON manifest front-end.
//!
//! A manifest is this crate's source-text format: one JSON document per
//! [`SourceUnit`], declaring records with named fields. Nested records are
//! referenced by name and may live in a different unit of the same cache
//! instance, which is why compilation always runs over the full accumulated
//! unit set. Compiled bytes are the CBOR encoding of the fully resolved
//! field tree; linking decodes and plans them into a [`ShapeFactory`].
//!
//! ```json
//! { "records": [
//!   { "name": "Quote", "fields": [
//!     { "name": "sym",  "kind": "text", "capacity": 12 },
//!     { "name": "bid",  "kind": "f64" },
//!     { "name": "side", "kind": "enum", "variants": 3 },
//!     { "name": "leg",  "kind": "record", "record": "Leg" },
//!     { "name": "qty",  "kind": "array", "len": 4, "elem": { "kind": "i32" } }
//!   ] }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;

use crate::cache::{Backend, CompileReport, Diagnostic, ProducedUnit, SourceUnit};
use crate::descriptor::{FieldDescriptor, FieldKind, FloatWidth, IntWidth, LayoutConfig};
use crate::layout::{FastMap, Planner};
use crate::record::ShapeFactory;

// ─── Manifest document ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestDoc {
    records: Vec<ManifestRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestRecord {
    name: SmolStr,
    fields: Vec<ManifestField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestField {
    name: SmolStr,
    #[serde(flatten)]
    kind: ManifestKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ManifestKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text { capacity: u32 },
    Enum { variants: u32 },
    Record { record: SmolStr },
    Array { elem: Box<ManifestKind>, len: u32 },
}

// ─── Wire form (compiled artifact bytes) ────────────────────────────────────

/// Fully resolved field tree, CBOR-encoded as a produced unit's code. Self
/// contained: nested records are inlined, no cross-unit references remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRecord {
    name: SmolStr,
    fields: Vec<WireField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireField {
    name: SmolStr,
    kind: WireKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum WireKind {
    Bool,
    Int(u8),
    UInt(u8),
    Float(u8),
    Text(u32),
    Enum(u32),
    Record(Vec<WireField>),
    Array(Box<WireKind>, u32),
}

fn to_wire_kind(kind: &FieldKind) -> WireKind {
    match kind {
        FieldKind::Bool => WireKind::Bool,
        FieldKind::Int(w) => WireKind::Int(w.bytes() as u8),
        FieldKind::UInt(w) => WireKind::UInt(w.bytes() as u8),
        FieldKind::Float(w) => WireKind::Float(w.bytes() as u8),
        FieldKind::Text { capacity } => WireKind::Text(*capacity),
        FieldKind::Enum { variants } => WireKind::Enum(*variants),
        FieldKind::Record(fields) => WireKind::Record(to_wire_fields(fields)),
        FieldKind::Array { elem, len } => WireKind::Array(Box::new(to_wire_kind(elem)), *len),
    }
}

fn to_wire_fields(fields: &[FieldDescriptor]) -> Vec<WireField> {
    fields
        .iter()
        .map(|f| WireField {
            name: f.name.clone(),
            kind: to_wire_kind(&f.kind),
        })
        .collect()
}

fn int_width(bytes: u8) -> Result<IntWidth, String> {
    match bytes {
        1 => Ok(IntWidth::W1),
        2 => Ok(IntWidth::W2),
        4 => Ok(IntWidth::W4),
        8 => Ok(IntWidth::W8),
        w => Err(format!("invalid integer width {w}")),
    }
}

fn from_wire_kind(kind: &WireKind) -> Result<FieldKind, String> {
    Ok(match kind {
        WireKind::Bool => FieldKind::Bool,
        WireKind::Int(w) => FieldKind::Int(int_width(*w)?),
        WireKind::UInt(w) => FieldKind::UInt(int_width(*w)?),
        WireKind::Float(4) => FieldKind::Float(FloatWidth::W4),
        WireKind::Float(8) => FieldKind::Float(FloatWidth::W8),
        WireKind::Float(w) => return Err(format!("invalid float width {w}")),
        WireKind::Text(capacity) => FieldKind::Text {
            capacity: *capacity,
        },
        WireKind::Enum(variants) => FieldKind::Enum {
            variants: *variants,
        },
        WireKind::Record(fields) => FieldKind::Record(Arc::from(from_wire_fields(fields)?)),
        WireKind::Array(elem, len) => FieldKind::Array {
            elem: Box::new(from_wire_kind(elem)?),
            len: *len,
        },
    })
}

fn from_wire_fields(fields: &[WireField]) -> Result<Vec<FieldDescriptor>, String> {
    fields
        .iter()
        .map(|f| Ok(FieldDescriptor::new(f.name.clone(), from_wire_kind(&f.kind)?)))
        .collect()
}

// ─── Cross-unit resolution ──────────────────────────────────────────────────

type RecordTable<'a> = FastMap<SmolStr, (SmolStr, &'a ManifestRecord)>;

struct Resolver<'a> {
    table: &'a RecordTable<'a>,
    resolved: FastMap<SmolStr, Arc<[FieldDescriptor]>>,
    visiting: Vec<SmolStr>,
}

impl<'a> Resolver<'a> {
    fn new(table: &'a RecordTable<'a>) -> Self {
        Self {
            table,
            resolved: FastMap::default(),
            visiting: Vec::new(),
        }
    }

    fn resolve_record(&mut self, name: &SmolStr) -> Result<Arc<[FieldDescriptor]>, String> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(Arc::clone(done));
        }
        if self.visiting.contains(name) {
            return Err(format!("record `{name}` is part of a reference cycle"));
        }
        let (_, record) = self
            .table
            .get(name)
            .ok_or_else(|| format!("record `{name}` is not defined in any unit"))?;

        self.visiting.push(name.clone());
        let fields: Result<Vec<FieldDescriptor>, String> = record
            .fields
            .iter()
            .map(|f| Ok(FieldDescriptor::new(f.name.clone(), self.resolve_kind(&f.kind)?)))
            .collect();
        self.visiting.pop();

        let fields: Arc<[FieldDescriptor]> = Arc::from(fields?);
        self.resolved.insert(name.clone(), Arc::clone(&fields));
        Ok(fields)
    }

    fn resolve_kind(&mut self, kind: &ManifestKind) -> Result<FieldKind, String> {
        Ok(match kind {
            ManifestKind::Bool => FieldKind::Bool,
            ManifestKind::I8 => FieldKind::Int(IntWidth::W1),
            ManifestKind::I16 => FieldKind::Int(IntWidth::W2),
            ManifestKind::I32 => FieldKind::Int(IntWidth::W4),
            ManifestKind::I64 => FieldKind::Int(IntWidth::W8),
            ManifestKind::U8 => FieldKind::UInt(IntWidth::W1),
            ManifestKind::U16 => FieldKind::UInt(IntWidth::W2),
            ManifestKind::U32 => FieldKind::UInt(IntWidth::W4),
            ManifestKind::U64 => FieldKind::UInt(IntWidth::W8),
            ManifestKind::F32 => FieldKind::Float(FloatWidth::W4),
            ManifestKind::F64 => FieldKind::Float(FloatWidth::W8),
            ManifestKind::Text { capacity } => FieldKind::Text {
                capacity: *capacity,
            },
            ManifestKind::Enum { variants } => FieldKind::Enum {
                variants: *variants,
            },
            ManifestKind::Record { record } => FieldKind::Record(self.resolve_record(record)?),
            ManifestKind::Array { elem, len } => FieldKind::Array {
                elem: Box::new(self.resolve_kind(elem)?),
                len: *len,
            },
        })
    }
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// [`Backend`] over JSON manifests, producing [`ShapeFactory`] artifacts.
#[derive(Debug, Clone, Default)]
pub struct ManifestBackend {
    config: LayoutConfig,
}

impl ManifestBackend {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }
}

impl Backend for ManifestBackend {
    type Artifact = ShapeFactory;

    fn compile(&self, units: &[SourceUnit]) -> CompileReport {
        let mut diagnostics = Vec::new();

        let mut docs: Vec<(SmolStr, ManifestDoc)> = Vec::with_capacity(units.len());
        for unit in units {
            match serde_json::from_str::<ManifestDoc>(&unit.text) {
                Ok(doc) => docs.push((unit.name.clone(), doc)),
                Err(e) => diagnostics.push(Diagnostic::error(
                    unit.name.clone(),
                    format!("manifest parse error: {e}"),
                )),
            }
        }

        let mut table: RecordTable<'_> = FastMap::default();
        for (unit, doc) in &docs {
            for record in &doc.records {
                match table.get(&record.name) {
                    Some((owner, _)) => diagnostics.push(Diagnostic::error(
                        unit.clone(),
                        format!(
                            "record `{}` is already defined in unit `{owner}`",
                            record.name
                        ),
                    )),
                    None => {
                        table.insert(record.name.clone(), (unit.clone(), record));
                    }
                }
            }
        }

        let mut produced = Vec::new();
        let mut resolver = Resolver::new(&table);
        for (unit, doc) in &docs {
            for record in &doc.records {
                // Skip duplicates: only the table's owner compiles.
                match table.get(&record.name) {
                    Some((_, owner)) if std::ptr::eq(*owner, record) => {}
                    _ => continue,
                }
                if record.fields.is_empty() {
                    diagnostics.push(Diagnostic::warning(
                        unit.clone(),
                        format!("record `{}` has no fields", record.name),
                    ));
                }
                let fields = match resolver.resolve_record(&record.name) {
                    Ok(fields) => fields,
                    Err(msg) => {
                        diagnostics.push(Diagnostic::error(unit.clone(), msg));
                        continue;
                    }
                };
                if let Err(e) = Planner::new(self.config).plan(&fields) {
                    diagnostics.push(Diagnostic::error(
                        unit.clone(),
                        format!("record `{}`: {e}", record.name),
                    ));
                    continue;
                }
                let wire = WireRecord {
                    name: record.name.clone(),
                    fields: to_wire_fields(&fields),
                };
                match cbor4ii::serde::to_vec(Vec::new(), &wire) {
                    Ok(code) => produced.push(ProducedUnit {
                        name: record.name.clone(),
                        code,
                    }),
                    Err(e) => diagnostics.push(Diagnostic::error(
                        unit.clone(),
                        format!("record `{}`: artifact encode failed: {e}", record.name),
                    )),
                }
            }
        }

        CompileReport {
            produced,
            diagnostics,
        }
    }

    fn link(&self, name: &str, code: &[u8]) -> Result<ShapeFactory, String> {
        let wire: WireRecord =
            cbor4ii::serde::from_slice(code).map_err(|e| format!("artifact decode failed: {e}"))?;
        if wire.name != name {
            return Err(format!(
                "artifact names `{}` but was produced as `{name}`",
                wire.name
            ));
        }
        let fields = from_wire_fields(&wire.fields)?;
        let plan = Planner::new(self.config)
            .plan(&fields)
            .map_err(|e| e.to_string())?;
        Ok(ShapeFactory::new(wire.name, plan))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Severity;

    fn unit(name: &str, text: &str) -> SourceUnit {
        SourceUnit {
            name: SmolStr::from(name),
            text: text.to_string(),
        }
    }

    const QUOTE: &str = r#"{
        "records": [
            { "name": "Quote", "fields": [
                { "name": "sym", "kind": "text", "capacity": 12 },
                { "name": "bid", "kind": "f64" },
                { "name": "ask", "kind": "f64" },
                { "name": "side", "kind": "enum", "variants": 3 }
            ] }
        ]
    }"#;

    #[test]
    fn test_compile_and_link_round_trip() {
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("quote", QUOTE)]);

        assert!(!report.has_errors(), "{:?}", report.diagnostics);
        assert_eq!(report.produced.len(), 1);

        let p = &report.produced[0];
        let factory = backend.link(&p.name, &p.code).unwrap();
        assert_eq!(factory.name(), "Quote");
        // text: 2 + 12, two f64, enum: 4
        assert_eq!(factory.total_size(), 14 + 8 + 8 + 4);
    }

    #[test]
    fn test_cross_unit_reference() {
        let leg = r#"{ "records": [ { "name": "Leg", "fields": [
            { "name": "qty", "kind": "i32" },
            { "name": "px", "kind": "f64" }
        ] } ] }"#;
        let order = r#"{ "records": [ { "name": "Order", "fields": [
            { "name": "id", "kind": "u64" },
            { "name": "leg", "kind": "record", "record": "Leg" }
        ] } ] }"#;

        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("leg", leg), unit("order", order)]);

        assert!(!report.has_errors(), "{:?}", report.diagnostics);
        let names: Vec<&str> = report.produced.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Leg", "Order"]);

        let order_factory = backend
            .link("Order", &report.produced[1].code)
            .unwrap();
        // u64 + (i32 + f64)
        assert_eq!(order_factory.total_size(), 8 + 12);
    }

    #[test]
    fn test_parse_error_names_the_unit() {
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("broken", "{ not json")]);
        assert!(report.has_errors());
        assert_eq!(report.diagnostics[0].unit, "broken");
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let a = r#"{ "records": [ { "name": "R", "fields": [ { "name": "x", "kind": "i64" } ] } ] }"#;
        let b = r#"{ "records": [ { "name": "R", "fields": [ { "name": "y", "kind": "i64" } ] } ] }"#;
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("a", a), unit("b", b)]);

        assert!(report.has_errors());
        assert!(report.diagnostics[0].message.contains("already defined"));
        // The first definition still compiles.
        assert_eq!(report.produced.len(), 1);
    }

    #[test]
    fn test_unresolved_reference_rejected() {
        let text = r#"{ "records": [ { "name": "A", "fields": [
            { "name": "b", "kind": "record", "record": "Missing" }
        ] } ] }"#;
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("a", text)]);
        assert!(report.has_errors());
        assert!(report.diagnostics[0].message.contains("not defined"));
    }

    #[test]
    fn test_reference_cycle_rejected() {
        let text = r#"{ "records": [
            { "name": "A", "fields": [ { "name": "b", "kind": "record", "record": "B" } ] },
            { "name": "B", "fields": [ { "name": "a", "kind": "record", "record": "A" } ] }
        ] }"#;
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("cyc", text)]);
        assert!(report.has_errors());
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("cycle"))
        );
    }

    #[test]
    fn test_zero_field_record_is_a_warning() {
        let text = r#"{ "records": [ { "name": "Empty", "fields": [] } ] }"#;
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("e", text)]);

        assert!(!report.has_errors());
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Warning)
        );
        let factory = backend
            .link("Empty", &report.produced[0].code)
            .unwrap();
        assert_eq!(factory.total_size(), 0);
    }

    #[test]
    fn test_layout_failure_is_a_diagnostic() {
        let text = r#"{ "records": [ { "name": "Bad", "fields": [
            { "name": "t", "kind": "text", "capacity": 0 }
        ] } ] }"#;
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("bad", text)]);
        assert!(report.has_errors());
        assert!(report.diagnostics[0].message.contains("capacity"));
    }

    #[test]
    fn test_link_rejects_mismatched_name() {
        let backend = ManifestBackend::default();
        let report = backend.compile(&[unit("quote", QUOTE)]);
        let p = &report.produced[0];
        let err = backend.link("SomethingElse", &p.code).unwrap_err();
        assert!(err.contains("SomethingElse"));
    }
}
