//! Throughput Benchmark for respkv
//!
//! Measures the frame codec, the keyspace, and the full
//! bytes-in/bytes-out request path.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use respkv::commands::CommandHandler;
use respkv::protocol::{parse_message, RespParser, RespValue};
use respkv::storage::Keyspace;
use std::sync::Arc;
use std::time::Duration;

fn set_command(key: &str, value: &[u8]) -> Vec<u8> {
    RespValue::array(vec![
        RespValue::bulk_string(Bytes::from("SET")),
        RespValue::bulk_string(Bytes::from(key.to_string())),
        RespValue::bulk_string(Bytes::copy_from_slice(value)),
    ])
    .serialize()
}

/// Benchmark decoding and encoding
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let small = set_command("fruit:42", b"mango");
    let large = set_command("blob", &vec![b'x'; 64 * 1024]);

    group.throughput(Throughput::Bytes(small.len() as u64));
    group.bench_function("decode_small", |b| {
        b.iter(|| black_box(parse_message(black_box(&small)).unwrap()));
    });

    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("decode_64k", |b| {
        b.iter(|| black_box(parse_message(black_box(&large)).unwrap()));
    });

    let reply = RespValue::bulk_string(Bytes::from(vec![b'y'; 1024]));
    group.throughput(Throughput::Elements(1));
    group.bench_function("encode_1k_bulk", |b| {
        let mut buf = Vec::with_capacity(2048);
        b.iter(|| {
            buf.clear();
            reply.serialize_into(&mut buf);
            black_box(buf.len());
        });
    });

    group.finish();
}

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let keyspace = Arc::new(Keyspace::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            keyspace.set(key, Bytes::from("small_value"), None);
            i += 1;
        });
    });

    group.bench_function("set_with_expiry", |b| {
        let mut i = 0u64;
        let expire_at = keyspace.now_ms() + 3_600_000;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            keyspace.set(key, Bytes::from("value"), Some(expire_at));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let keyspace = Arc::new(Keyspace::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        keyspace.set(key, value, None);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(keyspace.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(keyspace.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark the whole request path: decode, parse, execute, encode
fn bench_pipeline(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(Keyspace::new()));
    let mut parser = RespParser::new();

    let batch: Vec<u8> = (0..100)
        .flat_map(|i| set_command(&format!("key:{}", i), b"value"))
        .collect();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(100));

    group.bench_function("100_sets", |b| {
        b.iter(|| black_box(handler.process(&mut parser, black_box(&batch))));
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let keyspace = Arc::new(Keyspace::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let keyspace = Arc::clone(&keyspace);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            keyspace.set(key.clone(), Bytes::from("value"), None);
                            keyspace.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(keyspace.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_set,
    bench_get,
    bench_pipeline,
    bench_concurrent,
);

criterion_main!(benches);
