use acq_ensemble::prelude::*;

use crate::{bowl, bowl_builder, corner_design, small_moea};

#[test]
fn feasibility_then_exploitation_improves_the_corner_design() {
    let (x, y) = corner_design();
    let start = bowl(&[0.1, 0.9]);
    let mut opt = bowl_builder().batch_size(2).build().unwrap();
    opt.initialize_with(&x, &y).unwrap();

    let record = opt.step_with(Branch::Feasibility).unwrap();
    assert_eq!(record.branch, Branch::Feasibility);
    assert_eq!(record.points.len(), 1);
    for _ in 0..3 {
        let record = opt.step_with(Branch::Exploitation).unwrap();
        assert_eq!(record.points.len(), 2);
    }

    assert!(opt.best_y().unwrap()[0] < start);
    let best = opt.best_x().unwrap();
    assert!(best.iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(opt.eval_counter(), 7);
    assert_eq!(opt.database().len(), 12);
    assert_eq!(opt.phase(), Phase::Iterating);
    assert!(opt.best_posterior().is_some());
}

#[test]
fn random_design_then_one_feasibility_and_one_exploitation_step() {
    let mut opt = bowl_builder()
        .use_sobol(false)
        .batch_size(4)
        .build()
        .unwrap();
    opt.initialize(5).unwrap();
    let initial_best = opt.best_y().unwrap()[0];

    let record = opt.step_with(Branch::Feasibility).unwrap();
    assert_eq!(record.points.len(), 1);
    let record = opt.step_with(Branch::Exploitation).unwrap();
    assert_eq!(record.points.len(), 4);

    assert!(opt.best_y().unwrap()[0] < initial_best);
    let best = opt.best_x().unwrap();
    assert!(best.iter().all(|v| (0.0..=1.0).contains(v)), "{best:?}");
    assert_eq!(opt.eval_counter(), 5 + 1 + 4);
    assert_eq!(opt.database().len(), 10);
}

#[test]
fn non_finite_evaluation_during_a_step_is_an_error() {
    let (x, y) = corner_design();
    let mut opt = Optimizer::builder(
        Scalar(|_: &[f64]| f64::NAN),
        vec![0.0, 0.0],
        vec![1.0, 1.0],
    )
    .moea(small_moea())
    .hyperparameter_candidates(30)
    .seed(42)
    .build()
    .unwrap();
    opt.initialize_with(&x, &y).unwrap();

    let err = opt.step_with(Branch::Exploitation).unwrap_err();
    assert!(matches!(err, Error::NonFiniteOutputs));
    assert_eq!(err.to_string(), "objective returned non-finite outputs");
}

#[test]
fn optimize_spends_the_budget() {
    let mut opt = bowl_builder()
        .init_size(6)
        .max_eval(12)
        .batch_size(2)
        .build()
        .unwrap();
    let records = opt.optimize().unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(opt.eval_counter(), 12);
    assert_eq!(opt.database().len(), 12);
    assert_eq!(opt.phase(), Phase::Terminated);

    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.iteration, i);
        assert_eq!(record.eval_counter, 6 + 2 * (i + 1));
        assert_eq!(record.points.len(), 2);
        for point in &record.points {
            assert_eq!(point.observed, vec![bowl(&point.x)]);
            assert_eq!(point.predicted_mean.len(), 1);
            assert!(point.predicted_std[0] >= 0.0);
        }
    }
}

#[test]
fn incumbent_never_gets_worse() {
    let mut opt = bowl_builder().init_size(5).max_eval(11).build().unwrap();
    let records = opt.optimize().unwrap();

    for pair in records.windows(2) {
        assert!(pair[1].best_y[0] <= pair[0].best_y[0]);
    }
    for record in &records {
        let improved_here = record
            .points
            .iter()
            .any(|p| p.observed[0] == record.best_y[0]);
        if record.no_improve_counter == 0 {
            assert!(improved_here);
        }
    }
    let observed_min = opt
        .database()
        .outputs()
        .iter()
        .map(|y| y[0])
        .fold(f64::INFINITY, f64::min);
    assert_eq!(opt.best_y().unwrap()[0], observed_min);
}

#[test]
fn same_seed_same_history() {
    let run = || {
        let mut opt = bowl_builder().init_size(5).max_eval(8).build().unwrap();
        opt.optimize().unwrap();
        opt.database().outputs().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
fn stepping_past_the_budget_keeps_terminated() {
    let mut opt = bowl_builder().init_size(4).max_eval(5).build().unwrap();
    opt.optimize().unwrap();
    assert_eq!(opt.phase(), Phase::Terminated);

    // Explicit steps are still allowed; they only add evaluations.
    opt.one_step().unwrap();
    assert_eq!(opt.eval_counter(), 6);
    assert_eq!(opt.phase(), Phase::Terminated);
}

#[test]
fn optimize_with_user_data_uses_it() {
    let (x, y) = corner_design();
    let mut opt = bowl_builder().max_eval(3).build().unwrap();
    opt.initialize_with(&x, &y).unwrap();
    let records = opt.optimize().unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(opt.eval_counter(), 3);
    assert_eq!(opt.database().len(), 8);
}

#[test]
fn selection_strategies_fill_the_batch() {
    for strategy in [
        SelectionStrategy::Random,
        SelectionStrategy::Greedy,
        SelectionStrategy::Extreme,
    ] {
        let (x, y) = corner_design();
        let mut opt = bowl_builder()
            .batch_size(4)
            .selection(strategy)
            .build()
            .unwrap();
        opt.initialize_with(&x, &y).unwrap();
        let record = opt.one_step().unwrap();
        assert_eq!(record.branch, Branch::Exploitation);
        assert_eq!(record.points.len(), 4, "{strategy}");
    }
}

#[cfg(feature = "journal")]
#[test]
fn journal_receives_every_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    let mut opt = bowl_builder()
        .init_size(5)
        .max_eval(8)
        .journal(&path)
        .build()
        .unwrap();
    let records = opt.optimize().unwrap();

    let loaded = IterationJournal::load(&path).unwrap();
    assert_eq!(loaded.len(), records.len());
    for (stored, record) in loaded.iter().zip(&records) {
        assert_eq!(stored.iteration, record.iteration);
        assert_eq!(stored.branch, record.branch);
        assert_eq!(stored.eval_counter, record.eval_counter);
        assert_eq!(stored.points.len(), record.points.len());
    }
}
