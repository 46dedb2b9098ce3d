//! Criterion benchmarks for controller frame encoding and decoding.
//!
//! A temperature-aware sweep encodes and decodes a frame for every poll, so these
//! establish a baseline for the codec hot path.
//!
//! Run with: cargo bench --bench frame_codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lcr_daq::frame::{compute_checksum, FrameCodec};

fn frame_encode(c: &mut Criterion) {
    let codec = FrameCodec::default();
    let mut group = c.benchmark_group("frame_encode");

    group.bench_function("read_request", |b| {
        b.iter(|| codec.encode_read_request(black_box(0x4700), black_box(2)));
    });
    group.bench_function("write_setpoint", |b| {
        b.iter(|| codec.encode_write_frame(black_box(0x4701), black_box(400)));
    });

    group.finish();
}

fn frame_decode(c: &mut Criterion) {
    let codec = FrameCodec::default();
    let mut group = c.benchmark_group("frame_decode");

    let body = "01030400FD0190";
    let valid = format!(":{}{}\r\n", body, compute_checksum(body).unwrap());
    let corrupted = ":01030400FD019000\r\n".to_string();
    let foreign = "exec success\n".to_string();

    for (name, raw) in [("valid", &valid), ("bad_lrc", &corrupted), ("no_sentinel", &foreign)] {
        group.bench_with_input(BenchmarkId::new("decode", name), raw, |b, raw| {
            b.iter(|| codec.decode_read_frame(black_box(raw)));
        });
    }

    group.finish();
}

fn checksum(c: &mut Criterion) {
    c.bench_function("lrc_checksum", |b| {
        b.iter(|| compute_checksum(black_box("010647010190")));
    });
}

criterion_group!(benches, frame_encode, frame_decode, checksum);
criterion_main!(benches);
