use super::Branch;

/// Prediction and outcome for one evaluated point.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointRecord {
    /// The point, in the user's domain.
    pub x: Vec<f64>,
    /// Posterior mean of every output before the evaluation.
    pub predicted_mean: Vec<f64>,
    /// Posterior standard deviation of every output before the evaluation.
    pub predicted_std: Vec<f64>,
    /// Observed outputs.
    pub observed: Vec<f64>,
}

/// Summary of one optimizer iteration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// How the batch was proposed.
    pub branch: Branch,
    /// One entry per evaluated point, in batch order.
    pub points: Vec<PointRecord>,
    /// Exploration coefficient in effect.
    pub kappa: f64,
    /// Best outputs after the batch.
    pub best_y: Vec<f64>,
    /// Consecutive iterations without improvement.
    pub no_improve_counter: usize,
    /// True evaluations spent so far.
    pub eval_counter: usize,
}
