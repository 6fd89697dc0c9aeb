use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use graft_store::{MemoryStore, Store, Transaction};

const CF: &str = "bench";

/// `n` pairs shaped like engine rows: a tagged string key and a small
/// encoded document.
fn generate_rows(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| {
            let key = format!("s{:08x}-0000-4000-8000-{i:012x}", i).into_bytes();
            let value = format!("{{\"pk\":{i},\"fields\":{{\"body\":\"{}\"}}}}", "x".repeat(120))
                .into_bytes();
            (key, value)
        })
        .collect()
}

fn seeded_store(n: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_cf(CF).unwrap();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf(CF).unwrap();
    for (k, v) in generate_rows(n) {
        txn.put(&cf, &k, &v).unwrap();
    }
    txn.commit().unwrap();
    store
}

// ── Put ─────────────────────────────────────────────────────

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory/put");
    for n in [100, 1_000] {
        let store = MemoryStore::new();
        store.create_cf(CF).unwrap();
        let rows = generate_rows(n);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || {
                    let txn = store.begin(false).unwrap();
                    let cf = txn.cf(CF).unwrap();
                    (txn, cf)
                },
                |(txn, cf)| {
                    for (k, v) in &rows {
                        txn.put(&cf, k, v).unwrap();
                    }
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

// ── Get ─────────────────────────────────────────────────────

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory/get");
    for n in [100, 1_000] {
        let store = seeded_store(n);
        let rows = generate_rows(n);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let txn = store.begin(true).unwrap();
                let cf = txn.cf(CF).unwrap();
                let found = rows
                    .iter()
                    .filter(|(k, _)| txn.get(&cf, k).unwrap().is_some())
                    .count();
                assert_eq!(found, rows.len());
            })
        });
    }
    group.finish();
}

// ── Scan ────────────────────────────────────────────────────

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory/scan");
    for n in [100, 1_000] {
        let store = seeded_store(n);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let txn = store.begin(true).unwrap();
                let cf = txn.cf(CF).unwrap();
                let count = txn.scan_prefix(&cf, &[]).unwrap().count();
                assert_eq!(count, n);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_scan);
criterion_main!(benches);
