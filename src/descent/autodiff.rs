use dfdx::prelude::*;
use dfdx::optim::Sgd;
use tracing::debug;

use super::{DescentOptions, DescentOutcome};
use crate::error::{FitError, Result};
use crate::model::{QuadraticParams, SampleSet};
use crate::trace::{OptimizationTrace, TraceRecord};

type Design<D> = Tensor<(Const<3>, usize), f64, D>;
type Targets<D> = Tensor<(Const<1>, usize), f64, D>;

/// Transposed design matrix: rows `x²`, `x`, `1`.
fn design<D: Device<f64>>(dev: &D, samples: &SampleSet) -> Design<D> {
    let x = samples.x();

    let rows = x
        .iter()
        .map(|x| x.powi(2))
        .chain(x.iter().copied())
        .chain(std::iter::repeat(1.).take(samples.len()))
        .collect::<Vec<_>>();

    dev.tensor_from_vec(rows, (Const::<3>, samples.len()))
}

fn targets<D: Device<f64>>(dev: &D, samples: &SampleSet) -> Targets<D> {
    dev.tensor_from_vec(samples.y().to_vec(), (Const::<1>, samples.len()))
}

fn loss<D>(
    theta: Tensor<Rank2<1, 3>, f64, D, OwnedTape<f64, D>>,
    design: &Design<D>,
    targets: &Targets<D>,
) -> Tensor<Rank0, f64, D, OwnedTape<f64, D>>
where
    D: Device<f64>,
{
    let predicted = theta.matmul(design.clone());

    (predicted - targets.clone()).square().sum()
}

/// Descent on the sum of squared residuals, starting at `(1, 1, 1)`, with the
/// gradient taken from the backward pass.
pub fn autodiff_gradient_descent(
    samples: &SampleSet,
    opts: &DescentOptions,
) -> Result<DescentOutcome> {
    opts.validate()?;

    let dev = AutoDevice::default();

    let design = design(&dev, samples);
    let targets = targets(&dev, samples);

    let mut theta: Tensor<Rank2<1, 3>, f64, _> = dev.tensor([[1., 1., 1.]]);

    let mut sgd = Sgd::new(
        &theta,
        SgdConfig {
            lr: opts.learning_rate,
            momentum: None,
            weight_decay: None,
        },
    );

    let mut trace = OptimizationTrace::with_capacity(opts.max_iters);

    for i in 0..opts.max_iters {
        let [params] = theta.array();

        let loss = loss(theta.trace(Gradients::leaky()), &design, &targets);
        let cost = loss.array();

        let grads = loss.backward();
        let [gradient] = grads.get(&theta).array();

        let record = TraceRecord {
            params: QuadraticParams::from_array(params),
            gradient,
            cost,
        };

        debug!(iteration = i, cost, grad_norm = record.gradient_norm(), "step");

        trace.push(record);

        sgd.update(&mut theta, &grads)
            .map_err(|e| FitError::Autodiff(format!("{e:?}")))?;
    }

    DescentOutcome::from_trace("autodiff", trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::{sum_gradient, sum_of_squares};
    use approx::assert_relative_eq;

    fn samples() -> SampleSet {
        SampleSet::from_vecs(
            vec![-1., -0.5, 0., 0.5, 1., 1.5],
            vec![2.1, 0.4, -0.9, -0.2, 1.8, 5.2],
        )
        .unwrap()
    }

    #[test]
    fn first_record_matches_analytic_cost_and_gradient() {
        let samples = samples();
        let opts = DescentOptions {
            learning_rate: 1e-3,
            max_iters: 1,
        };

        let outcome = autodiff_gradient_descent(&samples, &opts).unwrap();
        let first = outcome.trace.records()[0];
        let start = QuadraticParams::new(1., 1., 1.);

        assert_eq!(first.params, start);
        assert_relative_eq!(first.cost, sum_of_squares(&samples, &start), max_relative = 1e-12);
        for (g, expected) in first.gradient.iter().zip(sum_gradient(&samples, &start)) {
            assert_relative_eq!(*g, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn update_subtracts_scaled_gradient() {
        let samples = samples();
        let opts = DescentOptions {
            learning_rate: 1e-2,
            max_iters: 2,
        };

        let outcome = autodiff_gradient_descent(&samples, &opts).unwrap();
        let [first, second] = [outcome.trace.records()[0], outcome.trace.records()[1]];

        for ((before, after), g) in first
            .params
            .to_array()
            .iter()
            .zip(second.params.to_array())
            .zip(first.gradient)
        {
            assert_relative_eq!(after, before - 1e-2 * g, max_relative = 1e-12);
        }
    }

    #[test]
    fn cost_decreases_with_small_step() {
        let outcome = autodiff_gradient_descent(&samples(), &DescentOptions::default()).unwrap();

        assert_eq!(outcome.trace.len(), 100);
        assert!(outcome.best_cost < outcome.trace.records()[0].cost);
        assert!(!outcome.diverged());
    }
}
