//! Benchmarks for structuring filters and correction.
//!
//! Run with: `cargo bench -p cosmetic-ops`

use std::hint::black_box;

use cosmetic_core::Image;
use cosmetic_ops::structure::{Layout, Shape, Statistic, apply};
use cosmetic_ops::{AutoDetect, CancelToken, CorrectionPlan};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn noisy(size: u32) -> Image {
    let data = (0..size * size)
        .map(|i| 0.1 + ((i.wrapping_mul(2654435761) >> 20) % 100) as f32 * 1e-4)
        .collect();
    Image::from_planar(size, size, 1, data).expect("bench image")
}

/// Benchmark derived-image filters.
fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("structure");

    for size in [256u32, 1024] {
        let img = noisy(size);
        group.throughput(Throughput::Elements((size * size) as u64));

        for (name, shape, stat) in [
            ("local_mean", Shape::Local, Statistic::MEAN),
            ("local_median", Shape::Local, Statistic::Median),
            ("background_median", Shape::Background, Statistic::Median),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &img, |b, img| {
                b.iter(|| apply(black_box(img), Layout::Plain, shape, stat))
            });
        }
    }

    group.finish();
}

/// Benchmark a full auto-detect pass.
fn bench_auto(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_detect");
    let img = noisy(512);
    let plan = CorrectionPlan {
        auto: AutoDetect {
            hot: Some(3.0),
            cold: Some(3.0),
        },
        ..CorrectionPlan::new(Layout::Plain, 1.0)
    };
    let cancel = CancelToken::new();

    group.throughput(Throughput::Elements(512 * 512));
    group.bench_function("plain_512", |b| {
        b.iter(|| {
            let mut target = img.clone();
            plan.run(black_box(&mut target), &cancel)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_filters, bench_auto);
criterion_main!(benches);
