//! Benchmarking for frame assembly: bundling many planes
//! into one frame, sequentially and on the rayon pool, with
//! and without a pixel type conversion.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::BenchmarkId;

use ndframes::source::memory::InMemorySource;
use ndframes::{FramesSequenceND, PixelType};

const PLANE : (usize, usize) = (256, 256);

fn zstack(z_size : usize) -> FramesSequenceND<InMemorySource> {
    let source = InMemorySource::random(&[("t", 4), ("z", z_size)], PLANE, PixelType::U16)
        .with_defaults(&["t"], &["z"]);
    FramesSequenceND::open(source).unwrap()
}

/// Assemble z-stacks of increasing depth one plane at a time,
/// then split across threads in chunks of varying size.
fn criterion_benchmark_assemble(c : &mut Criterion) {
    let mut assemble_bench = c.benchmark_group("Assemble z-stacks");

    for z_size in [1, 8, 32] {
        let frames = zstack(z_size);
        assemble_bench.bench_with_input(
            BenchmarkId::new("Sequential", z_size),
            &frames,
            |bench, frames| {
                bench.iter(|| black_box(frames.get_frame(1).unwrap()))
            },
        );

        assemble_bench.bench_with_input(
            BenchmarkId::new("Parallel", z_size),
            &frames,
            |bench, frames| {
                bench.iter(|| black_box(frames.get_frame_parallel(1).unwrap()))
            },
        );
    }

    let mut frames = zstack(32);
    for chunk_size in [1, 4, 16] {
        frames.set_chunk_size(chunk_size);
        assemble_bench.bench_with_input(
            BenchmarkId::new("Parallel, chunk size", chunk_size),
            &frames,
            |bench, frames| {
                bench.iter(|| black_box(frames.get_frame_parallel(1).unwrap()))
            },
        );
    }

    frames.set_pixel_type(Some(PixelType::F32));
    assemble_bench.bench_with_input(
        BenchmarkId::new("Sequential, cast to f32", 32),
        &frames,
        |bench, frames| {
            bench.iter(|| black_box(frames.get_frame(1).unwrap()))
        },
    );

    assemble_bench.finish();
}

/// Iterate over every frame of a slice.
fn criterion_benchmark_slices(c : &mut Criterion) {
    let mut slice_bench = c.benchmark_group("Slices");
    let source = InMemorySource::random(&[("t", 64), ("c", 2)], (128, 128), PixelType::U8)
        .with_defaults(&["t"], &["c"]);
    let frames = FramesSequenceND::open(source).unwrap();

    slice_bench.bench_function("Every other frame, sequential", |bench| {
        bench.iter(|| {
            let slice = frames.slice(None, None, 2).unwrap();
            black_box(slice.iter().collect::<Result<Vec<_>, _>>().unwrap())
        })
    });

    slice_bench.bench_function("Every other frame, parallel", |bench| {
        bench.iter(|| {
            let slice = frames.slice(None, None, 2).unwrap();
            black_box(slice.collect_parallel().unwrap())
        })
    });

    slice_bench.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = criterion_benchmark_assemble, criterion_benchmark_slices,
);
criterion_main!(benches);
