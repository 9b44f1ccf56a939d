//! Criterion benchmarks for the load pipeline.
//!
//! Two benchmark groups:
//! - `parse`: documents of 1k and 10k prototypes sharing one abstract base
//! - `serialize`: writing the 10k roots back out

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use protoform_core::test_utils::*;
use std::hint::black_box;

fn bench_parse(c: &mut Criterion) {
    let loader = loader();
    let mut group = c.benchmark_group("parse");
    group.sample_size(10);

    for count in [1_000, 10_000] {
        let doc = prototype_document(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &doc, |b, doc| {
            b.iter(|| {
                let out = loader
                    .parse(&[doc.as_str()], &["bench.xml"], None)
                    .unwrap();
                black_box(out.roots.len())
            });
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let loader = loader();
    let doc = prototype_document(10_000);
    let parsed = loader.parse(&[doc.as_str()], &["bench.xml"], None).unwrap();

    let mut group = c.benchmark_group("serialize");
    group.sample_size(10);
    group.bench_function("10000", |b| {
        b.iter(|| black_box(loader.serialize_pool(&parsed.roots).text.len()));
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_serialize);
criterion_main!(benches);
