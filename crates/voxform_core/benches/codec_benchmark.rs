//! Benchmark for reading, writing and face resolution.
//!
//! Run with: cargo bench --package voxform_core --bench codec_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxform_core::faces::resolve_faces;
use voxform_core::{GridSize, Rgba, VoxCodec, VoxelModel, VoxelRecord};

/// Solid 32³ block, colored by height.
fn solid_block() -> VoxelModel {
    let mut model = VoxelModel::new(GridSize::new(32, 32, 32));
    for z in 0..32u8 {
        for y in 0..32u8 {
            for x in 0..32u8 {
                model.push(x, y, z, Rgba::opaque(z * 8, 128, 255 - z * 8));
            }
        }
    }
    model
}

fn benchmark_encode(c: &mut Criterion) {
    let codec = VoxCodec::default();
    let model = solid_block();

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(model.len() as u64));
    group.bench_function("solid_32", |b| {
        b.iter(|| black_box(codec.encode(black_box(&model)).unwrap()));
    });
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let codec = VoxCodec::default();
    let model = solid_block();
    let bytes = codec.encode(&model).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("solid_32", |b| {
        b.iter(|| black_box(codec.read_bytes(black_box(&bytes)).unwrap()));
    });
    group.finish();
}

fn benchmark_faces(c: &mut Criterion) {
    let size = GridSize::new(64, 64, 64);
    let records: Vec<_> = (0..64u8)
        .flat_map(|z| (0..64u8).flat_map(move |y| (0..64u8).map(move |x| VoxelRecord::new(x, y, z, 1))))
        .filter(|r| (u32::from(r.x) + u32::from(r.y) + u32::from(r.z)) % 3 != 0)
        .collect();

    let mut group = c.benchmark_group("faces");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("sparse_64", |b| {
        b.iter(|| black_box(resolve_faces(size, black_box(&records))));
    });
    group.finish();
}

criterion_group!(benches, benchmark_encode, benchmark_decode, benchmark_faces);
criterion_main!(benches);
