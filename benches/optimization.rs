#[allow(dead_code)]
mod test_functions;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use acq_ensemble::prelude::*;

fn small_moea() -> MoeaConfig {
    MoeaConfig {
        population_size: 30,
        generations: 30,
        ..MoeaConfig::default()
    }
}

fn bench_branin(c: &mut Criterion) {
    let mut group = c.benchmark_group("branin");
    group.sample_size(10);

    for batch_size in [1, 4] {
        group.bench_with_input(
            BenchmarkId::new("batch_size", batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    let mut opt = Optimizer::builder(
                        Scalar(test_functions::branin),
                        vec![-5.0, 0.0],
                        vec![10.0, 15.0],
                    )
                    .init_size(8)
                    .max_eval(24)
                    .batch_size(batch_size)
                    .moea(small_moea())
                    .hyperparameter_candidates(100)
                    .seed(42)
                    .build()
                    .unwrap();
                    opt.optimize().unwrap();
                });
            },
        );
    }
    group.finish();
}

fn bench_hartmann6(c: &mut Criterion) {
    let mut group = c.benchmark_group("hartmann6");
    group.sample_size(10);

    for (name, blcb) in [("ensemble", false), ("blcb", true)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut opt = Optimizer::builder(
                    Scalar(test_functions::hartmann6),
                    vec![0.0; 6],
                    vec![1.0; 6],
                )
                .init_size(12)
                .max_eval(24)
                .batch_size(4)
                .moea(small_moea())
                .hyperparameter_candidates(100)
                .seed(7)
                .build()
                .unwrap();
                if blcb {
                    opt.optimize_blcb().unwrap();
                } else {
                    opt.optimize().unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_constrained(c: &mut Criterion) {
    let mut group = c.benchmark_group("gardner_feasibility");
    group.sample_size(10);
    group.bench_function("to_first_feasible", |b| {
        b.iter(|| {
            let mut opt = Optimizer::builder(test_functions::gardner, vec![0.0; 2], vec![6.0; 2])
                .num_outputs(2)
                .init_size(6)
                .max_eval(16)
                .moea(small_moea())
                .hyperparameter_candidates(100)
                .seed(3)
                .build()
                .unwrap();
            opt.initialize(6).unwrap();
            while !opt.has_feasible() && opt.eval_counter() < 16 {
                opt.step_with(Branch::Feasibility).unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_branin, bench_hartmann6, bench_constrained);
criterion_main!(benches);
