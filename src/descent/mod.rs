//! Fixed-step gradient descent on the quadratic's coefficients.
//!
//! Both variants share one loop: evaluate cost and gradient, record them,
//! step `params -= learning_rate * gradient`. They run for exactly
//! `max_iters` iterations with no convergence check, so a too-large learning
//! rate shows up in the trace as non-finite values instead of an error.
//!
//! [`autodiff`] minimizes the sum of squared residuals with a dfdx tape.
//! [`analytic`] minimizes the mean squared residual with hand-derived
//! partials. Their gradients therefore differ by a factor of `N`.

pub mod analytic;
pub mod autodiff;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FitError, Result};
use crate::model::QuadraticParams;
use crate::trace::OptimizationTrace;

pub use analytic::analytic_gradient_descent;
pub use autodiff::autodiff_gradient_descent;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescentOptions {
    pub learning_rate: f64,
    pub max_iters: usize,
}

impl Default for DescentOptions {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            max_iters: 100,
        }
    }
}

impl DescentOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(FitError::InvalidConfig {
                field: "learning_rate",
                reason: format!("must be positive and finite, got {}", self.learning_rate),
            });
        }

        if self.max_iters == 0 {
            return Err(FitError::InvalidConfig {
                field: "max_iters",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescentOutcome {
    pub trace: OptimizationTrace,
    /// Parameters of the lowest-cost record, not necessarily the last one.
    pub best: QuadraticParams,
    pub best_cost: f64,
    pub final_cost: f64,
    pub diverged_at: Option<usize>,
}

impl DescentOutcome {
    fn from_trace(method: &'static str, trace: OptimizationTrace) -> Result<Self> {
        // validate() rules out max_iters == 0, so this only fires on a caller bug
        let last = trace
            .last()
            .copied()
            .ok_or_else(|| FitError::Solver(format!("{method} descent produced no iterations")))?;
        let best = trace.best().copied().unwrap_or(last);

        let outcome = Self {
            best: best.params,
            best_cost: best.cost,
            final_cost: last.cost,
            diverged_at: trace.diverged_at(),
            trace,
        };

        match outcome.diverged_at {
            Some(iteration) => warn!(method, iteration, "gradient descent diverged"),
            None => info!(
                method,
                best = %outcome.best,
                best_cost = outcome.best_cost,
                final_cost = outcome.final_cost,
                "gradient descent finished"
            ),
        }

        Ok(outcome)
    }

    pub fn diverged(&self) -> bool {
        self.diverged_at.is_some()
    }
}
