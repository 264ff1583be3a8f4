use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use contract_creation_monitor::ledger::Ledger;
use contract_creation_monitor::models::ContractRecord;

fn create_test_record(id: u64) -> ContractRecord {
    ContractRecord::created(1000 + id, &format!("0x{:064x}", id), &format!("0x{:040x}", id))
}

fn bench_ledger_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");

    for size in [1u64, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("record", size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let temp_dir = TempDir::new().expect("Failed to create temp directory");
                    let ledger = Ledger::open(temp_dir.path().join("bench.csv")).expect("Failed to open ledger");
                    (temp_dir, ledger)
                },
                |(_temp_dir, mut ledger)| {
                    for i in 0..size {
                        let _ = ledger.record(black_box(&create_test_record(i)));
                    }
                },
            );
        });
    }

    group.finish();
}

fn bench_ledger_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_replay");

    for size in [100u64, 1000, 10000].iter() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("replay.csv");
        {
            let mut ledger = Ledger::open(&path).expect("Failed to open ledger");
            for i in 0..*size {
                ledger.record(&create_test_record(i)).expect("Failed to record");
            }
        }

        group.bench_with_input(BenchmarkId::new("open", size), &path, |b, path| {
            b.iter(|| {
                let ledger = Ledger::open(black_box(path)).expect("Failed to open ledger");
                black_box(ledger.recorded_count())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ledger_append, bench_ledger_replay);
criterion_main!(benches);
