//! Criterion benchmarks for in-place affine transforms.
//! Focus sizes: n in {1k, 64k, 1M} vertices, interleaved 24-byte records.
//! Results land under target/criterion.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::Vector2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use stridekit::prelude::*;

fn random_records(n: usize, enc: PositionEncoding, seed: u64) -> (VertexLayout, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let layout = VertexLayout::new(24, 4, enc).unwrap();
    let pts: Vec<Vector2<f64>> = (0..n)
        .map(|_| Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let bytes = layout.pack(&pts);
    (layout, bytes)
}

fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let engines = [
        ("pool", Engine::new(EngineCfg::default()).unwrap()),
        (
            "inline",
            Engine::with_runner(EngineCfg::with_tasks(1), Box::new(Inline)).unwrap(),
        ),
    ];
    for &n in &[1_000usize, 64_000, 1_000_000] {
        for enc in [PositionEncoding::F32x2, PositionEncoding::F64x2] {
            for (name, engine) in &engines {
                let id = format!("rotate_{name}_{enc:?}");
                group.bench_with_input(BenchmarkId::new(id, n), &n, |b, &n| {
                    b.iter_batched(
                        || random_records(n, enc, 7),
                        |(layout, mut bytes)| {
                            let mut view = VertexViewMut::new(&mut bytes, layout, n).unwrap();
                            engine.rotate_2d(&mut view, 0.3, Vector2::zeros()).unwrap();
                        },
                        BatchSize::LargeInput,
                    )
                });
            }
        }
    }
    group.finish();
}

criterion_group!(benches, bench_transforms);
criterion_main!(benches);
