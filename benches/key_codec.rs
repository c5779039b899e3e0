//! 短 ID 与身份令牌编解码基准测试

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use shortener::identity::IdentityCodec;
use shortener::services::{MAX_WORKERS_PER_REQUEST, decode_keys};
use shortener::storage::{decode_key, derive_key, encode_key};

// ============== derive / encode / decode ==============

fn bench_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("key");

    let short_url = "https://ya.ru";
    let long_url = format!("https://example.com/{}", "segment/".repeat(64));

    group.bench_function("derive_short_url", |b| {
        b.iter(|| derive_key(black_box(short_url)));
    });
    group.bench_function("derive_long_url", |b| {
        b.iter(|| derive_key(black_box(&long_url)));
    });

    let key = derive_key(short_url);
    group.bench_function("encode", |b| {
        b.iter(|| encode_key(black_box(key)));
    });

    let id = encode_key(key);
    group.bench_function("decode", |b| {
        b.iter(|| decode_key(black_box(&id)).unwrap());
    });

    group.finish();
}

// ============== 批量解码 ==============

fn bench_batch_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_decode");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for size in [10usize, 1000] {
        let ids: Vec<String> = (0..size)
            .map(|i| encode_key(derive_key(&format!("https://example.com/{}", i))))
            .collect();

        for workers in [1, MAX_WORKERS_PER_REQUEST] {
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), size),
                &ids,
                |b, ids| {
                    b.to_async(&rt)
                        .iter(|| async { decode_keys(ids.clone(), workers).await.unwrap() });
                },
            );
        }
    }

    group.finish();
}

// ============== 身份令牌 ==============

fn bench_identity(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity");
    let codec = IdentityCodec::generate();

    group.bench_function("encode", |b| {
        b.iter(|| codec.encode(black_box(42)).unwrap());
    });

    let token = codec.encode(42).unwrap();
    group.bench_function("decode", |b| {
        b.iter(|| codec.decode(black_box(Some(token.as_str()))).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_key, bench_batch_decode, bench_identity);
criterion_main!(benches);
