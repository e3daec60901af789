use acq_ensemble::duplicate::DuplicateGuard;
use acq_ensemble::prelude::*;
use acq_ensemble::space::distance;

use crate::{bowl_builder, corner_design, small_moea};

/// Minimize `x0 + x1` subject to `x0 >= 0.5`.
fn constrained(x: &[f64]) -> Vec<f64> {
    vec![x[0] + x[1], 0.5 - x[0]]
}

type Constrained = fn(&[f64]) -> Vec<f64>;

fn constrained_optimizer() -> Optimizer<Constrained> {
    let mut opt = Optimizer::builder(
        constrained as Constrained,
        vec![0.0, 0.0],
        vec![1.0, 1.0],
    )
    .num_outputs(2)
    .moea(small_moea())
    .hyperparameter_candidates(30)
    .seed(5)
    .build()
    .unwrap();
    let x = vec![vec![0.1, 0.1], vec![0.2, 0.8], vec![0.4, 0.3], vec![0.3, 0.6]];
    let y: Vec<Vec<f64>> = x.iter().map(|p| constrained(p)).collect();
    opt.initialize_with(&x, &y).unwrap();
    opt
}

#[test]
fn infeasible_start_runs_feasibility_search() {
    let mut opt = constrained_optimizer();
    assert!(!opt.has_feasible());
    assert_eq!(opt.next_branch(), Branch::Feasibility);

    let record = opt.one_step().unwrap();
    assert_eq!(record.branch, Branch::Feasibility);
    assert_eq!(record.points.len(), 1);
    assert_eq!(record.points[0].observed.len(), 2);
    assert_eq!(record.points[0].predicted_mean.len(), 2);
    assert_eq!(opt.eval_counter(), 1);
}

#[test]
fn constrained_problems_only_support_feasibility() {
    let mut opt = constrained_optimizer();
    for branch in [Branch::Exploitation, Branch::Exploration, Branch::BatchLcb] {
        assert!(matches!(
            opt.step_with(branch),
            Err(Error::ConstrainedUnsupported { outputs: 2 })
        ));
    }
    assert_eq!(opt.eval_counter(), 0);
    assert_eq!(opt.database().len(), 4);
}

#[test]
fn exploration_fills_the_batch_with_distinct_points() {
    let (x, y) = corner_design();
    let mut opt = bowl_builder().batch_size(3).build().unwrap();
    opt.initialize_with(&x, &y).unwrap();

    let record = opt.step_with(Branch::Exploration).unwrap();
    assert_eq!(record.branch, Branch::Exploration);
    assert_eq!(record.points.len(), 3);
    assert_eq!(opt.eval_counter(), 3);
    for (i, a) in record.points.iter().enumerate() {
        for b in &record.points[..i] {
            assert!(distance(&a.x, &b.x) > 1e-3);
        }
    }
}

#[test]
fn batch_lcb_uses_the_kappa_schedule() {
    let mut opt = bowl_builder()
        .init_size(5)
        .max_eval(9)
        .batch_size(2)
        .build()
        .unwrap();
    let records = opt.optimize_blcb().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(opt.phase(), Phase::Terminated);
    let schedule = KappaSchedule::default();
    for record in &records {
        assert_eq!(record.branch, Branch::BatchLcb);
        assert_eq!(record.points.len(), 2);
        let before = record.eval_counter - 2;
        assert!((record.kappa - schedule.kappa(before, 5, 2, 2)).abs() < 1e-12);
    }
    assert!(records[1].kappa > records[0].kappa);
    assert_eq!(opt.kappa(), records[1].kappa);
}

#[test]
fn new_points_keep_their_distance_from_the_database() {
    let threshold = DuplicateGuard::default().threshold();
    let (x, y) = corner_design();
    let mut opt = bowl_builder().batch_size(3).build().unwrap();
    opt.initialize_with(&x, &y).unwrap();
    opt.step_with(Branch::Exploitation).unwrap();
    opt.step_with(Branch::BatchLcb).unwrap();

    let inputs = opt.database().inputs();
    for (i, a) in inputs.iter().enumerate().skip(5) {
        for b in &inputs[..i] {
            assert!(distance(a, b) >= threshold, "{a:?} too close to {b:?}");
        }
    }
}

#[test]
fn hyperparameters_stay_one_set_per_output() {
    let mut opt = constrained_optimizer();
    assert_eq!(opt.hyperparameters().len(), 2);
    opt.one_step().unwrap();
    assert_eq!(opt.hyperparameters().len(), 2);
    assert!(opt.surrogate().is_some());
}
