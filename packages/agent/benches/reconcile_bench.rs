// packages/agent/benches/reconcile_bench.rs
//! Reconciliation pass throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use intercept_agent::{Arbitrator, Disposition, Forwarder, ForwarderTarget, InterceptRequest};
use std::sync::Arc;

fn snapshot(len: usize, served: bool) -> Vec<InterceptRequest> {
    (0..len)
        .map(|i| {
            let id = format!("intercept-{:04}", i);
            match (i, served) {
                (0, true) => InterceptRequest::new(id, Disposition::Active).with_destination_port(1138),
                _ if i % 5 == 4 => InterceptRequest::new(id, Disposition::NoClient),
                _ => InterceptRequest::new(id, Disposition::Waiting),
            }
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let forwarder = Arc::new(Forwarder::new("127.0.0.1:0".parse().unwrap()));
    let arbitrator = Arbitrator::new(forwarder, "managerHost", ForwarderTarget::new("appHost", 5000));

    let mut group = c.benchmark_group("reconcile");
    for len in [2, 16, 256] {
        let waiting = snapshot(len, false);
        group.bench_with_input(BenchmarkId::new("waiting", len), &waiting, |b, s| {
            b.iter(|| arbitrator.reconcile(black_box(s)))
        });

        let served = snapshot(len, true);
        group.bench_with_input(BenchmarkId::new("served", len), &served, |b, s| {
            b.iter(|| arbitrator.reconcile(black_box(s)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
