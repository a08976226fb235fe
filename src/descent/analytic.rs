use rand::Rng;
use tracing::debug;

use super::{DescentOptions, DescentOutcome};
use crate::error::Result;
use crate::loss::{mean_gradient, mean_squared};
use crate::model::{QuadraticParams, SampleSet};
use crate::trace::{OptimizationTrace, TraceRecord};

/// Descent on the mean squared residual with the partials
/// `2·mean(x²·r), 2·mean(x·r), 2·mean(r)`, starting from standard normal
/// draws taken from `rng`.
pub fn analytic_gradient_descent<R: Rng + ?Sized>(
    samples: &SampleSet,
    opts: &DescentOptions,
    rng: &mut R,
) -> Result<DescentOutcome> {
    opts.validate()?;

    let start = QuadraticParams::standard_normal(rng);

    let trace = (0..opts.max_iters)
        .scan(start, |params, i| {
            let record = TraceRecord {
                params: *params,
                gradient: mean_gradient(samples, params),
                cost: mean_squared(samples, params),
            };

            debug!(iteration = i, cost = record.cost, grad_norm = record.gradient_norm(), "step");

            let [ga, gb, gc] = record.gradient;
            params.a -= opts.learning_rate * ga;
            params.b -= opts.learning_rate * gb;
            params.c -= opts.learning_rate * gc;

            Some(record)
        })
        .collect::<OptimizationTrace>();

    DescentOutcome::from_trace("analytic", trace)
}
