#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Batch Bayesian optimization of expensive black-box functions, driven by a
//! multi-objective ensemble of acquisition functions.
//!
//! Each iteration fits a Gaussian-process surrogate, optimizes several
//! acquisition functions *jointly* with a multi-objective evolutionary
//! search, and draws a batch of points from the resulting Pareto set. Points
//! are evaluated in parallel. Problems may carry inequality constraints
//! (outputs `1..` must be `<= 0`); a feasibility search runs until the first
//! feasible point is found.
//!
//! # Getting Started
//!
//! ```
//! use acq_ensemble::prelude::*;
//!
//! let mut optimizer = Optimizer::builder(
//!     Scalar(|x: &[f64]| (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)),
//!     vec![-5.0, -5.0],
//!     vec![5.0, 5.0],
//! )
//! .init_size(6)
//! .max_eval(10)
//! .batch_size(2)
//! .moea(MoeaConfig { population_size: 16, generations: 10, ..MoeaConfig::default() })
//! .hyperparameter_candidates(50)
//! .seed(42)
//! .build()
//! .unwrap();
//!
//! let history = optimizer.optimize().unwrap();
//! println!("best {:?} at {:?} after {} iterations",
//!     optimizer.best_y().unwrap(), optimizer.best_x().unwrap(), history.len());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Optimizer`] | The optimization loop: surrogate, database, incumbent, counters. |
//! | [`Objective`](objective::Objective) | The black-box function; outputs after the first are constraints. |
//! | [`Acquisition`](acquisition::Acquisition) | One member of the acquisition ensemble. |
//! | [`SelectionStrategy`](selection::SelectionStrategy) | How a batch is drawn from the Pareto set. |
//! | [`Branch`] | How an iteration proposes points: feasibility, exploration, exploitation or batch LCB. |
//! | [`GaussianProcess`](surrogate::GaussianProcess) | The surrogate model. |
//!
//! All searches run on the canonical box `[-25, 25]^d`; [`SearchSpace`](space::SearchSpace)
//! maps between it and the user's bounds.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on settings, records and enums | off |
//! | `journal` | [`IterationJournal`](driver::IterationJournal): JSONL iteration log with file locking (enables `serde`) | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at every iteration | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod driver;
pub mod duplicate;
pub mod ensemble;
mod error;
pub mod io;
pub mod kappa;
pub mod normal;
pub mod objective;
pub mod posterior;
mod rng_util;
pub mod selection;
pub mod solver;
pub mod space;
pub mod surrogate;

#[cfg(feature = "journal")]
pub use driver::IterationJournal;
pub use driver::{
    BestSolution, Branch, Counters, Database, IterationRecord, Optimizer, OptimizerBuilder,
    Phase, PointRecord, Settings,
};
pub use error::{Error, Result};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use acq_ensemble::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::Acquisition;
    #[cfg(feature = "journal")]
    pub use crate::driver::IterationJournal;
    pub use crate::driver::{
        Branch, IterationRecord, Optimizer, OptimizerBuilder, Phase, PointRecord, Settings,
    };
    pub use crate::error::{Error, Result};
    pub use crate::kappa::KappaSchedule;
    pub use crate::objective::{Objective, Scalar};
    pub use crate::selection::SelectionStrategy;
    pub use crate::solver::moo::MoeaConfig;
}
