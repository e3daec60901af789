use std::io::Write;

use acq_ensemble::prelude::*;

use crate::{bowl, bowl_builder, corner_design};

#[test]
fn design_of_experiments_counts_evaluations() {
    let mut opt = bowl_builder().build().unwrap();
    opt.initialize(6).unwrap();

    assert_eq!(opt.phase(), Phase::Initialized);
    assert_eq!(opt.eval_counter(), 6);
    assert_eq!(opt.no_improve_counter(), 0);
    assert_eq!(opt.database().len(), 6);

    let best = opt.best_y().unwrap()[0];
    let min = opt
        .database()
        .outputs()
        .iter()
        .map(|y| y[0])
        .fold(f64::INFINITY, f64::min);
    assert_eq!(best, min);
    let x = opt.best_x().unwrap();
    assert!(x.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn supplied_data_is_not_counted() {
    let (x, y) = corner_design();
    let mut opt = bowl_builder().build().unwrap();
    opt.initialize_with(&x, &y).unwrap();

    assert_eq!(opt.eval_counter(), 0);
    assert_eq!(opt.database().len(), 5);
    assert!(opt.has_feasible());
    let best = opt.best_x().unwrap();
    assert!((best[0] - 0.1).abs() < 1e-12 && (best[1] - 0.9).abs() < 1e-12);
    assert!((opt.best_y().unwrap()[0] - bowl(&[0.1, 0.9])).abs() < 1e-15);
}

#[test]
fn database_holds_canonical_points() {
    let (x, y) = corner_design();
    let mut opt = bowl_builder().build().unwrap();
    opt.initialize_with(&x, &y).unwrap();

    let first = &opt.database().inputs()[0];
    assert!((first[0] + 25.0).abs() < 1e-12 && (first[1] + 25.0).abs() < 1e-12);
    let last = &opt.database().inputs()[3];
    assert!((last[0] - 25.0).abs() < 1e-12 && (last[1] - 25.0).abs() < 1e-12);
}

#[test]
fn second_initialization_is_rejected() {
    let (x, y) = corner_design();
    let mut opt = bowl_builder().build().unwrap();
    opt.initialize_with(&x, &y).unwrap();

    assert!(matches!(opt.initialize_with(&x, &y), Err(Error::AlreadyInitialized)));
    assert!(matches!(opt.initialize(4), Err(Error::AlreadyInitialized)));
}

#[test]
fn too_few_samples() {
    let mut opt = bowl_builder().build().unwrap();
    assert!(matches!(opt.initialize(1), Err(Error::TooFewSamples(1))));
    assert!(matches!(
        opt.initialize_with(&[vec![0.5, 0.5]], &[vec![0.0]]),
        Err(Error::TooFewSamples(1))
    ));
    assert_eq!(opt.phase(), Phase::Uninitialized);
}

#[test]
fn inconsistent_data_is_rejected() {
    let mut opt = bowl_builder().build().unwrap();
    let x = vec![vec![0.2, 0.2], vec![0.4, 0.4, 0.4]];
    let y = vec![vec![1.0], vec![2.0]];
    assert!(matches!(
        opt.initialize_with(&x, &y),
        Err(Error::DimensionMismatch { expected: 2, got: 3 })
    ));

    let x = vec![vec![0.2, 0.2], vec![0.4, 0.4]];
    assert!(matches!(
        opt.initialize_with(&x, &y[..1]),
        Err(Error::DimensionMismatch { .. })
    ));

    let y = vec![vec![1.0], vec![2.0, 3.0]];
    assert!(matches!(
        opt.initialize_with(&x, &y),
        Err(Error::DimensionMismatch { expected: 1, got: 2 })
    ));
}

#[test]
fn out_of_bounds_and_non_finite_data_are_rejected() {
    let mut opt = bowl_builder().build().unwrap();
    let x = vec![vec![0.2, 0.2], vec![1.5, 0.4]];
    let y = vec![vec![1.0], vec![2.0]];
    assert!(matches!(
        opt.initialize_with(&x, &y),
        Err(Error::OutOfBounds { index: 1 })
    ));

    let x = vec![vec![0.2, 0.2], vec![0.5, 0.4]];
    let y = vec![vec![f64::NAN], vec![2.0]];
    assert!(matches!(opt.initialize_with(&x, &y), Err(Error::NonFiniteOutputs)));
    assert_eq!(opt.phase(), Phase::Uninitialized);
}

#[test]
fn stepping_requires_initialization() {
    let mut opt = bowl_builder().build().unwrap();
    assert!(matches!(opt.one_step(), Err(Error::NotInitialized)));
    assert!(matches!(opt.blcb_step(), Err(Error::NotInitialized)));
}

#[test]
fn objective_output_count_is_checked() {
    let mut opt = bowl_builder().num_outputs(2).build().unwrap();
    assert!(matches!(
        opt.initialize(4),
        Err(Error::ObjectiveDimensionMismatch { expected: 2, got: 1 })
    ));
}

#[test]
fn initialization_from_matrix_files() {
    let dir = tempfile::tempdir().unwrap();
    let x_path = dir.path().join("dbx.txt");
    let y_path = dir.path().join("dby.txt");

    // One point per column.
    let mut fx = std::fs::File::create(&x_path).unwrap();
    writeln!(fx, "0.0 1.0 0.0 1.0 0.1").unwrap();
    writeln!(fx, "0.0 0.0 1.0 1.0 0.9").unwrap();
    let (_, y) = corner_design();
    let row: Vec<String> = y.iter().map(|v| format!("{:e}", v[0])).collect();
    std::fs::write(&y_path, row.join(" ")).unwrap();

    let mut opt = bowl_builder().build().unwrap();
    opt.initialize_from_files(&x_path, &y_path).unwrap();
    assert_eq!(opt.database().len(), 5);
    assert_eq!(opt.eval_counter(), 0);
    assert!((opt.best_x().unwrap()[1] - 0.9).abs() < 1e-12);
}

#[test]
fn missing_matrix_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut opt = bowl_builder().build().unwrap();
    let result = opt.initialize_from_files(dir.path().join("x.txt"), dir.path().join("y.txt"));
    assert!(matches!(result, Err(Error::MatrixFile { .. })));
}

#[test]
fn builder_validates_bounds_and_settings() {
    let inverted = Optimizer::builder(
        Scalar(bowl as fn(&[f64]) -> f64),
        vec![0.0, 1.0],
        vec![1.0, 0.5],
    )
    .build();
    assert!(matches!(inverted, Err(Error::InvalidBounds { dim: 1, .. })));

    assert!(matches!(
        bowl_builder().acquisition_pool(Vec::new()).build(),
        Err(Error::EmptyAcquisitionPool)
    ));
    assert!(matches!(
        bowl_builder().batch_size(0).build(),
        Err(Error::InvalidSetting { name: "batch_size", .. })
    ));
    assert!(matches!(
        bowl_builder().tol_no_improvement(0).build(),
        Err(Error::InvalidSetting { name: "tol_no_improvement", .. })
    ));
}

#[test]
fn eval_fixed_follows_max_eval() {
    let opt = bowl_builder().max_eval(37).build().unwrap();
    assert_eq!(opt.settings().eval_fixed, 37);

    let opt = bowl_builder().max_eval(37).eval_fixed(12).build().unwrap();
    assert_eq!(opt.settings().eval_fixed, 12);

    let opt = bowl_builder().build().unwrap();
    assert_eq!(opt.settings().eval_fixed, Settings::default().eval_fixed);
}
