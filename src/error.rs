/// Errors returned by the optimizer and its building blocks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a lower bound is not strictly below its upper bound.
    #[error("invalid bounds in dimension {dim}: low ({low}) must be less than high ({high})")]
    InvalidBounds {
        /// The offending dimension.
        dim: usize,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a point or matrix has the wrong number of entries.
    #[error("dimension mismatch: expected {expected} but got {got}")]
    DimensionMismatch {
        /// The expected size.
        expected: usize,
        /// The actual size.
        got: usize,
    },

    /// Returned when a multi-output (constrained) problem reaches a code
    /// path that only handles a single unconstrained objective.
    #[error("{outputs} outputs requested, but this step only handles unconstrained problems")]
    ConstrainedUnsupported {
        /// Number of outputs of the problem.
        outputs: usize,
    },

    /// Returned when initialization is requested twice.
    #[error("the surrogate model is already initialized")]
    AlreadyInitialized,

    /// Returned when a step is requested before initialization.
    #[error("the surrogate model has not been initialized")]
    NotInitialized,

    /// Returned when a surrogate is queried before it was trained.
    #[error("the surrogate model must be trained before it is queried")]
    SurrogateNotTrained,

    /// Returned when fewer than two initial samples are supplied.
    #[error("at least 2 initial samples are required, got {0}")]
    TooFewSamples(usize),

    /// Returned when supplied or evaluated outputs contain `NaN` or
    /// infinite values.
    #[error("objective returned non-finite outputs")]
    NonFiniteOutputs,

    /// Returned when a supplied input lies outside `[lb, ub]`.
    #[error("initial input {index} lies outside the search bounds")]
    OutOfBounds {
        /// Column index of the offending input.
        index: usize,
    },

    /// Returned when an acquisition name does not resolve.
    #[error("unknown acquisition function: {0}")]
    UnknownAcquisition(String),

    /// Returned when the acquisition pool is empty.
    #[error("the acquisition pool must not be empty")]
    EmptyAcquisitionPool,

    /// Returned when a local search fails in a way that cannot be recovered.
    #[error("local search failed: {0}")]
    LocalSearch(String),

    /// Returned when the kernel matrix cannot be factorized even with jitter.
    #[error("Cholesky factorization of the kernel matrix failed")]
    Cholesky,

    /// Returned when a setting is outside its valid range.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting {
        /// Name of the setting.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when the objective returns the wrong number of values.
    #[error("objective dimension mismatch: expected {expected} values, got {got}")]
    ObjectiveDimensionMismatch {
        /// The expected number of objective values.
        expected: usize,
        /// The actual number of objective values returned.
        got: usize,
    },

    /// Returned when a matrix file cannot be read or parsed.
    #[error("failed to read matrix from {path}: {reason}")]
    MatrixFile {
        /// The file path.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an iteration record cannot be written.
    #[cfg(feature = "journal")]
    #[error("journal error: {0}")]
    Journal(String),
}

pub type Result<T> = core::result::Result<T, Error>;
