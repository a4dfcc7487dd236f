//! Benchmarks for stack-map decoding.

extern crate jitlower;

use criterion::{criterion_group, criterion_main, Criterion};
use jitlower::stackmap::StackMaps;
use std::hint::black_box;

/// A version 3 section with one function and `records` records of four spilled locations.
fn section(records: u32) -> Vec<u8> {
    let mut out = vec![3, 0, 0, 0];
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&records.to_le_bytes());

    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&64u64.to_le_bytes());
    out.extend_from_slice(&u64::from(records).to_le_bytes());

    for id in 0..records {
        out.extend_from_slice(&i64::from(id).to_le_bytes());
        out.extend_from_slice(&(id * 16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        for slot in 0..4i32 {
            out.extend_from_slice(&[3, 0]);
            out.extend_from_slice(&8u16.to_le_bytes());
            out.extend_from_slice(&7u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(-8 * (slot + 1)).to_le_bytes());
        }
        // 4 * 12 location bytes leave the record 8-aligned
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
    }
    out
}

/// Benchmark decoding a section of 1024 records.
fn bench_parse(c: &mut Criterion) {
    let data = section(1024);

    c.bench_function("stackmaps_parse_1024", |b| {
        b.iter(|| black_box(StackMaps::parse(black_box(&data)).unwrap()));
    });
}

/// Benchmark grouping decoded records by offset.
fn bench_record_map(c: &mut Criterion) {
    let maps = StackMaps::parse(&section(1024)).unwrap();

    c.bench_function("stackmaps_record_map_1024", |b| {
        b.iter(|| black_box(maps.compute_record_map().len()));
    });
}

criterion_group!(benches, bench_parse, bench_record_map);
criterion_main!(benches);
