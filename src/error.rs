use thiserror::Error;

pub type Result<T> = std::result::Result<T, FitError>;

/// Everything that can go wrong while sampling or fitting a quadratic.
///
/// Gradient descent blowing up is deliberately absent: a diverged run is a
/// valid outcome and is reported through `DescentOutcome::diverged_at`.
#[derive(Error, Debug)]
pub enum FitError {
    #[error("degenerate input: need at least {required} distinct x values, got {distinct}")]
    DegenerateInput { required: usize, distinct: usize },

    #[error("length mismatch: x has {x} elements, y has {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("singular {what} matrix")]
    SingularMatrix { what: &'static str },

    #[error("ill-conditioned {what} matrix: reciprocal condition number {rcond:e}")]
    IllConditioned { what: &'static str, rcond: f64 },

    #[error("non-finite {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("{method} did not converge after {iterations} iterations ({status})")]
    NotConverged {
        method: &'static str,
        iterations: u64,
        status: String,
    },

    #[error("autodiff update failed: {0}")]
    Autodiff(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
