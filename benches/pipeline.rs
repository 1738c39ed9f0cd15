//! Benchmarks for the repair stages and the full pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshmend::algo::clean::{clean, CleanOptions};
use meshmend::algo::decimate::{decimate, DecimateOptions};
use meshmend::algo::reconstruct::{reconstruct, ReconstructOptions};
use meshmend::algo::smooth::{smooth, SmoothOptions};
use meshmend::mesh::shapes::{icosphere, open_cube};
use meshmend::prelude::*;

fn bench_stages(c: &mut Criterion) {
    let sphere = icosphere(4);

    c.bench_function("clean_icosphere4", |b| {
        b.iter(|| clean(black_box(&sphere), &CleanOptions::default()));
    });

    let mut group = c.benchmark_group("smooth_icosphere4");
    for parallel in [false, true] {
        let options = SmoothOptions::default().with_parallel(parallel);
        group.bench_with_input(BenchmarkId::from_parameter(parallel), &options, |b, o| {
            b.iter(|| smooth(black_box(&sphere), o).unwrap());
        });
    }
    group.finish();

    c.bench_function("decimate_icosphere4_half", |b| {
        let options = DecimateOptions::with_reduction(0.5);
        b.iter(|| decimate(black_box(&sphere), &options).unwrap());
    });
}

fn bench_reconstruct(c: &mut Criterion) {
    let sphere = icosphere(3);
    let mut group = c.benchmark_group("reconstruct_icosphere3");
    group.sample_size(10);
    for resolution in [16, 32] {
        let options = ReconstructOptions::default()
            .with_resolution(resolution)
            .with_parallel(true);
        group.bench_with_input(BenchmarkId::from_parameter(resolution), &options, |b, o| {
            b.iter(|| reconstruct(black_box(&sphere), o).unwrap());
        });
    }
    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let mesh = open_cube(8);
    let config = RepairConfig::default().with_reconstruct_resolution(24);
    let mut group = c.benchmark_group("repair");
    group.sample_size(10);
    group.bench_function("open_cube8", |b| {
        b.iter(|| repair(black_box(&mesh), &config).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_stages, bench_reconstruct, bench_repair);
criterion_main!(benches);
