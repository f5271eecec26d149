//! Error types for parameter registration, sampling and integration.

use thiserror::Error;

/// Invalid registration or integration arguments. Raised synchronously by the call that caused
/// it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A parameter name was registered or selected twice.
    #[error("duplicate parameter `{0}`")]
    DuplicateParameter(String),

    /// The bounds of a parameter are inverted, equal or not finite.
    #[error("invalid bounds for parameter `{name}`: [{left}, {right}]")]
    InvalidBounds {
        /// Name of the parameter.
        name: String,
        /// Left bound.
        left: f64,
        /// Right bound.
        right: f64,
    },

    /// The parameter is not registered.
    #[error("parameter `{0}` is not registered")]
    UnknownParameter(String),

    /// The parameter name collides with a reserved identifier.
    #[error("parameter name `{0}` is reserved; pass `no_protect_names` to use it anyway")]
    ReservedName(String),

    /// No parameters were selected for the integration.
    #[error("at least one parameter must be integrated over")]
    EmptyParameterList,

    /// `nmax` must be positive.
    #[error("the maximum number of samples must be positive")]
    ZeroSamples,

    /// The batch size must be positive.
    #[error("the batch size must be positive")]
    ZeroBatchSize,

    /// The requested effective sample size is not a positive number.
    #[error("invalid effective sample size target {0}")]
    InvalidNeffTarget(f64),

    /// The integrand returned a different number of values than points it was given.
    #[error("integrand returned {found} values for {expected} points")]
    IntegrandLength {
        /// Number of points in the batch.
        expected: usize,
        /// Number of values returned.
        found: usize,
    },
}

/// Failure to construct a proposal or to draw from it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// The density returned a negative or non-finite value.
    #[error("density of `{name}` is invalid at x = {x}: {value}")]
    InvalidDensity {
        /// Name of the parameter.
        name: String,
        /// Point of evaluation.
        x: f64,
        /// Offending value.
        value: f64,
    },

    /// The density does not integrate to a positive finite number over its bounds.
    #[error("density of `{name}` is not integrable over its bounds (integral = {integral})")]
    NotIntegrable {
        /// Name of the parameter.
        name: String,
        /// Result of the quadrature.
        integral: f64,
    },

    /// Rejection sampling did not accept a value within its retry budget.
    #[error("rejection sampling of `{name}` exhausted {attempts} attempts")]
    RejectionBudgetExhausted {
        /// Name of the parameter.
        name: String,
        /// Number of attempts made for a single value.
        attempts: usize,
    },

    /// The envelope used for rejection sampling is not positive.
    #[error("rejection envelope of `{name}` must be positive, got {envelope}")]
    InvalidEnvelope {
        /// Name of the parameter.
        name: String,
        /// The envelope.
        envelope: f64,
    },

    /// The supplied inverse CDF decreases somewhere on `[0, 1]`.
    #[error("inverse CDF of `{0}` is not monotonically non-decreasing")]
    NonMonotonicInverse(String),

    /// The supplied inverse CDF maps outside of the parameter's bounds.
    #[error("inverse CDF of `{name}` returned {value}, outside of [{left}, {right}]")]
    InverseOutOfBounds {
        /// Name of the parameter.
        name: String,
        /// Returned value.
        value: f64,
        /// Left bound.
        left: f64,
        /// Right bound.
        right: f64,
    },
}

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Sampling failure.
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited table error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure of a statistical test.
    #[error("statistics error: {0}")]
    Statistics(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
