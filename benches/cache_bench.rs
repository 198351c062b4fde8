//! Benchmarks for oxicache
//!
//! Measures edit/commit and snapshot read throughput against a cache in a
//! temporary directory.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::prelude::*;
use tempfile::TempDir;

use oxicache::DiskLruCache;

/// Create a single-value cache in a fresh temp directory.
fn create_cache(dir: &TempDir) -> DiskLruCache {
    DiskLruCache::open(dir.path(), 1, 1, u64::MAX).unwrap()
}

/// Benchmark edit/commit of small values
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    let dir = TempDir::new().unwrap();
    let cache = create_cache(&dir);
    let mut key = 0u64;

    group.bench_function("sequential", |b| {
        b.iter(|| {
            let mut editor = cache.edit(&format!("key{key}")).unwrap().unwrap();
            editor.set(0, black_box("value bytes for the benchmark")).unwrap();
            editor.commit().unwrap();
            key += 1;
        })
    });

    group.finish();
}

/// Benchmark snapshot reads after population
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    let dir = TempDir::new().unwrap();
    let cache = create_cache(&dir);
    let num_keys = 100u64;
    for i in 0..num_keys {
        let mut editor = cache.edit(&format!("key{i}")).unwrap().unwrap();
        editor.set(0, "value bytes for the benchmark").unwrap();
        editor.commit().unwrap();
    }

    let mut rng = StdRng::seed_from_u64(42);
    group.bench_function("random_hit", |b| {
        b.iter(|| {
            let key = format!("key{}", rng.gen_range(0..num_keys));
            let snapshot = cache.get(black_box(&key)).unwrap().unwrap();
            black_box(snapshot.length(0));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_commit, bench_get);
criterion_main!(benches);
