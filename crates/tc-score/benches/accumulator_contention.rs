use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use tc_score::{ScoringAccumulator, ScoringConfig, ScoringPlan, StepEvent};

const EVENTS_PER_THREAD: usize = 20_000;

fn make_accumulator() -> ScoringAccumulator {
    let plan = ScoringPlan::from_config(&ScoringConfig::default()).unwrap();
    ScoringAccumulator::new(Arc::new(plan))
}

fn bench_contended_deposits(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator_contention");

    for threads in [1usize, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * EVENTS_PER_THREAD) as u64));
        group.bench_with_input(BenchmarkId::new("score_deposit", threads), &threads, |b, &n| {
            b.iter(|| {
                let acc = make_accumulator();
                std::thread::scope(|s| {
                    for t in 0..n {
                        let acc = &acc;
                        s.spawn(move || {
                            for i in 0..EVENTS_PER_THREAD {
                                // Deterministic depth spread over [0, 2.2) so ~10% fall off-mesh.
                                let z = ((t * EVENTS_PER_THREAD + i) % 2200) as f64 * 1e-3;
                                let ev = StepEvent::Deposit { position: [0.0, 0.0, z], edep: 1e-4 };
                                acc.score(&ev).unwrap();
                            }
                        });
                    }
                });
                black_box(acc.snapshot())
            })
        });
    }

    group.finish();
}

fn bench_log_index(c: &mut Criterion) {
    let plan = ScoringPlan::from_config(&ScoringConfig::default()).unwrap();
    let binning = plan.exit_spectrum.binning;
    let energies: Vec<f64> = (0..4096).map(|i| 10f64.powf(-12.0 + i as f64 * 3.2e-3)).collect();
    c.bench_function("log_index_4096", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for &e in &energies {
                hits += binning.index(black_box(e)).is_some() as usize;
            }
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_contended_deposits, bench_log_index);
criterion_main!(benches);
