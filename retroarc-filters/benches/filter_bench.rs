//! Throughput benchmarks for the hot codec paths.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use retroarc_core::filter::run_filter;
use retroarc_filters::{
    BashRle, BashUnrle, DDaveRle, DDaveUnrle, LZW_BASH, LzwDecoder, LzwEncoder,
};

fn tileset_like(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if i % 13 < 9 { (i / 13) as u8 } else { i as u8 })
        .collect()
}

fn bench_rle(c: &mut Criterion) {
    let data = tileset_like(64 * 1024);
    let bash = run_filter(&mut BashRle::new(), &data, None).unwrap();
    let ddave = run_filter(&mut DDaveRle::new(), &data, None).unwrap();

    c.bench_function("bash_rle_encode_64k", |b| {
        b.iter(|| run_filter(&mut BashRle::new(), black_box(&data), None).unwrap())
    });
    c.bench_function("bash_rle_decode_64k", |b| {
        b.iter(|| run_filter(&mut BashUnrle::new(), black_box(&bash), None).unwrap())
    });
    c.bench_function("ddave_rle_encode_64k", |b| {
        b.iter(|| run_filter(&mut DDaveRle::new(), black_box(&data), None).unwrap())
    });
    c.bench_function("ddave_rle_decode_64k", |b| {
        b.iter(|| run_filter(&mut DDaveUnrle::new(), black_box(&ddave), None).unwrap())
    });
}

fn bench_lzw(c: &mut Criterion) {
    let data = tileset_like(64 * 1024);
    let encoded = run_filter(&mut LzwEncoder::new(LZW_BASH), &data, None).unwrap();

    c.bench_function("lzw_encode_64k", |b| {
        b.iter(|| run_filter(&mut LzwEncoder::new(LZW_BASH), black_box(&data), None).unwrap())
    });
    c.bench_function("lzw_decode_64k", |b| {
        b.iter(|| run_filter(&mut LzwDecoder::new(LZW_BASH), black_box(&encoded), None).unwrap())
    });
}

criterion_group!(benches, bench_rle, bench_lzw);
criterion_main!(benches);
