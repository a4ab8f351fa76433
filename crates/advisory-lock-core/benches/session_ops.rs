//! Benchmarks for session lock round trips

use advisory_lock_core::memory::{MemoryLockTable, MemorySessionSource};
use advisory_lock_core::prelude::*;
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_memory_session_ops(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let source = MemorySessionSource::new(MemoryLockTable::new(), 8);
    let mut session = runtime
        .block_on(LockSession::bind(&source, 42, None))
        .unwrap();

    let mut group = c.benchmark_group("memory_session");
    group.bench_function("try_exclusive_release", |b| {
        b.iter(|| {
            runtime.block_on(async {
                assert!(session.try_exclusive().await.unwrap());
                session.release_exclusive().await.unwrap();
            });
        });
    });

    group.bench_function("try_shared_release", |b| {
        b.iter(|| {
            runtime.block_on(async {
                assert!(session.try_shared().await.unwrap());
                session.release_shared().await.unwrap();
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_session_ops);
criterion_main!(benches);
