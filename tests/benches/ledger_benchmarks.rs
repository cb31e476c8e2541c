//! # Capacity Ledger Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | reserve + release, one opportunity | < 10µs |
//! | reserve across many opportunities | flat per opportunity |
//! | 8 threads contending on one opportunity | no oversell, lock-bound |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use ic_01_capacity_ledger::{CapacityApi, CapacityLedger, LedgerConfig};
use shared_types::{
    InMemoryOpportunityDirectory, InvestmentOpportunity, OpportunityDirectory, OpportunityId,
    OpportunityStatus,
};

fn ledger_with(count: usize) -> (CapacityLedger<InMemoryOpportunityDirectory>, Vec<OpportunityId>) {
    let directory = Arc::new(InMemoryOpportunityDirectory::new());
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let opportunity =
            InvestmentOpportunity::new(format!("Bond {}", i), "BND", u128::MAX / 2, 100)
                .with_status(OpportunityStatus::Active);
        ids.push(opportunity.id);
        directory.insert(opportunity).unwrap();
    }
    (CapacityLedger::new(LedgerConfig::default(), directory), ids)
}

fn bench_reserve_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("ic-01-capacity-ledger");
    group.measurement_time(Duration::from_secs(5));

    let (ledger, ids) = ledger_with(1);
    let id = ids[0];
    group.bench_function("reserve_release_single", |b| {
        b.iter(|| {
            ledger.reserve(&id, black_box(100)).unwrap();
            ledger.release(&id, black_box(100)).unwrap();
        })
    });

    for count in [10usize, 100, 1_000] {
        let (ledger, ids) = ledger_with(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("reserve_spread", count), &ids, |b, ids| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let id = &ids[rng.gen_range(0..ids.len())];
                black_box(ledger.reserve(id, 100).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_contended_reserve(c: &mut Criterion) {
    let mut group = c.benchmark_group("ic-01-contention");
    group.measurement_time(Duration::from_secs(5));

    let (ledger, ids) = ledger_with(1);
    let ledger = Arc::new(ledger);
    let id = ids[0];

    group.throughput(Throughput::Elements(8 * 100));
    group.bench_function("reserve_8_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ledger = Arc::clone(&ledger);
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            ledger.reserve(&id, 100).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_reserve_release, bench_contended_reserve);
criterion_main!(benches);
