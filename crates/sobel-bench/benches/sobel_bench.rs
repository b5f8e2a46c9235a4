//! Benchmarks for the gradient kernel and the executors.
//!
//! Run with: `cargo bench -p sobel-bench`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sobel_compute::{
    Distribution, PassExecutor, Pipeline, PipelineConfig, ProcessGroupExecutor, ThreadedConfig,
    ThreadedExecutor,
};
use sobel_core::{gradient_image, ImageBuffer, Pass};

fn test_image(size: u32) -> ImageBuffer {
    let pixels = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            (x * 7 + y * 13 + (x ^ y)) % 256
        })
        .collect();
    ImageBuffer::new(size, size, 255, pixels).unwrap()
}

/// Single-threaded kernel over the whole image.
fn bench_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");

    for size in [256u32, 1024] {
        let img = test_image(size);
        group.throughput(Throughput::Elements(img.len() as u64));
        group.bench_with_input(BenchmarkId::new("gradient_image", size), &img, |b, img| {
            b.iter(|| gradient_image(black_box(&img.snapshot())))
        });
    }

    group.finish();
}

/// Threaded gradient pass across team sizes.
fn bench_threaded_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded_gradient");
    let img = test_image(1024);
    group.throughput(Throughput::Elements(img.len() as u64));

    for workers in [1u32, 2, 4, 8] {
        let mut exec = ThreadedExecutor::new(ThreadedConfig { workers }).unwrap();
        let parts = exec.plan(img.height()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &parts, |b, parts| {
            b.iter(|| {
                let mut work = img.clone();
                exec.run_pass(&mut work, parts, &Pass::Gradient).unwrap();
                black_box(work)
            })
        });
    }

    group.finish();
}

/// Full pipeline, threads vs in-process message passing.
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    let img = test_image(512);
    group.throughput(Throughput::Elements(img.len() as u64));

    let mut threads = Pipeline::new(
        ThreadedExecutor::new(ThreadedConfig { workers: 4 }).unwrap(),
        PipelineConfig::default(),
    );
    group.bench_function("threads_4", |b| {
        b.iter(|| {
            let mut work = img.clone();
            threads.process(&mut work).unwrap();
            black_box(work)
        })
    });

    for distribution in [Distribution::Broadcast, Distribution::Halo] {
        let exec = ProcessGroupExecutor::in_process(4, distribution).unwrap();
        let mut group_pipeline = Pipeline::new(exec, PipelineConfig::default());
        let name = format!("message_passing_4_{distribution:?}").to_lowercase();
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut work = img.clone();
                group_pipeline.process(&mut work).unwrap();
                black_box(work)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernel, bench_threaded_gradient, bench_pipeline);
criterion_main!(benches);
