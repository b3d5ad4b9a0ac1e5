use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use keyv::Keyv;
use rand::prelude::*;
use tempfile::TempDir;

const BACKENDS: [&str; 3] = ["mem", "file", "sled"];

/// Opens a fresh store for `scheme`; the directory must outlive it.
fn open(scheme: &str) -> (TempDir, Keyv) {
    keyv::register_builtin_adapters();
    let dir = TempDir::new().unwrap();
    // mem stores are named after the directory so each batch starts empty.
    let uri = format!("{}://{}", scheme, dir.path().display());
    let store = Keyv::new(&uri, "bench").unwrap();
    (dir, store)
}

fn write_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    for scheme in BACKENDS {
        group.bench_function(scheme, |b| {
            b.iter_batched(
                || open(scheme),
                |(_dir, store)| {
                    for i in 0..100 {
                        store.set(&format!("key{}", i), &i).unwrap();
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn read_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    for scheme in BACKENDS {
        group.bench_function(scheme, |b| {
            b.iter_batched(
                || {
                    let (dir, store) = open(scheme);
                    for i in 0..100 {
                        store.set(&format!("key{}", i), &i).unwrap();
                    }
                    (dir, store)
                },
                |(_dir, store)| {
                    let mut rng = thread_rng();
                    for _ in 0..100 {
                        let key = format!("key{}", rng.gen_range(0..100));
                        store.get_int(&key).unwrap();
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, write_bench, read_bench);
criterion_main!(benches);
