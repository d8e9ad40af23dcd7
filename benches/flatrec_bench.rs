use criterion::{Criterion, criterion_group, criterion_main};
use flatrec::descriptor::{FieldDescriptor, FieldKind, FloatWidth, IntWidth, LayoutConfig};
use flatrec::layout::Planner;
use flatrec::record::{Readable, ShapeFactory, Writable};
use flatrec::region::Region;
use std::hint::black_box;

// ─── Test shape ─────────────────────────────────────────────────────────────

/// A ten-field trading-style record: text key, scalars of every width, an
/// enum, and a small fixed array.
fn bench_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("sym", FieldKind::Text { capacity: 12 }),
        FieldDescriptor::new("bid", FieldKind::Float(FloatWidth::W8)),
        FieldDescriptor::new("ask", FieldKind::Float(FloatWidth::W8)),
        FieldDescriptor::new("last", FieldKind::Float(FloatWidth::W4)),
        FieldDescriptor::new("size", FieldKind::Int(IntWidth::W4)),
        FieldDescriptor::new("seq", FieldKind::UInt(IntWidth::W8)),
        FieldDescriptor::new("live", FieldKind::Bool),
        FieldDescriptor::new("side", FieldKind::Enum { variants: 3 }),
        FieldDescriptor::new("flags", FieldKind::Int(IntWidth::W1)),
        FieldDescriptor::new(
            "depth",
            FieldKind::Array {
                elem: Box::new(FieldKind::Int(IntWidth::W4)),
                len: 8,
            },
        ),
    ]
}

fn factory() -> ShapeFactory {
    ShapeFactory::from_fields("Tick", &bench_fields(), LayoutConfig::default()).unwrap()
}

fn fill<W: Writable>(rec: &mut W) {
    rec.set_text("sym", "ACME.XNYS").unwrap();
    rec.set_float("bid", 101.25).unwrap();
    rec.set_float("ask", 101.27).unwrap();
    rec.set_float("last", 101.26).unwrap();
    rec.set_int("size", 400).unwrap();
    rec.set_uint("seq", 987_654_321).unwrap();
    rec.set_bool("live", true).unwrap();
    rec.set_enum("side", 1).unwrap();
    rec.set_int("flags", 3).unwrap();
    for i in 0..8 {
        rec.set_int_at("depth", i, i as i64 * 100).unwrap();
    }
}

// ─── Benchmarks ─────────────────────────────────────────────────────────────

fn bench_plan(c: &mut Criterion) {
    let fields = bench_fields();
    c.bench_function("plan_ten_field_shape", |b| {
        b.iter(|| {
            let plan = Planner::default().plan(black_box(&fields)).unwrap();
            black_box(plan.total_size())
        });
    });
}

fn bench_heap_access(c: &mut Criterion) {
    let factory = factory();
    let mut rec = factory.heap_record();
    fill(&mut rec);

    c.bench_function("heap_get_float", |b| {
        b.iter(|| black_box(rec.get_float(black_box("bid")).unwrap()));
    });
    c.bench_function("heap_set_int", |b| {
        b.iter(|| rec.set_int(black_box("size"), black_box(500)).unwrap());
    });
}

fn bench_native_access(c: &mut Criterion) {
    let factory = factory();
    let region = Region::new(factory.total_size());
    let mut rec = factory.native_record();
    rec.bind(&region, 0, region.len()).unwrap();
    fill(&mut rec);

    c.bench_function("native_get_float", |b| {
        b.iter(|| black_box(rec.get_float(black_box("bid")).unwrap()));
    });
    c.bench_function("native_set_int", |b| {
        b.iter(|| rec.set_int(black_box("size"), black_box(500)).unwrap());
    });
    c.bench_function("native_get_text_into", |b| {
        let mut buf = String::with_capacity(16);
        b.iter(|| {
            rec.get_text_into(black_box("sym"), &mut buf).unwrap();
            black_box(buf.len())
        });
    });
}

fn bench_marshal(c: &mut Criterion) {
    let factory = factory();
    let region = Region::new(factory.total_size());
    let mut rec = factory.native_record();
    rec.bind(&region, 0, region.len()).unwrap();
    fill(&mut rec);

    let wire = Region::new(factory.total_size());
    c.bench_function("native_write_out", |b| {
        b.iter(|| {
            wire.set_write_pos(0);
            rec.write_out(black_box(&wire)).unwrap();
        });
    });
}

fn bench_equality(c: &mut Criterion) {
    let factory = factory();
    let mut heap = factory.heap_record();
    fill(&mut heap);

    let region = Region::new(factory.total_size());
    let mut native = factory.native_record();
    native.bind(&region, 0, region.len()).unwrap();
    fill(&mut native);

    c.bench_function("cross_representation_eq", |b| {
        b.iter(|| black_box(heap == native));
    });
}

criterion_group!(
    benches,
    bench_plan,
    bench_heap_access,
    bench_native_access,
    bench_marshal,
    bench_equality
);
criterion_main!(benches);
