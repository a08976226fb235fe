use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::ExperimentConfig;
use crate::descent::{analytic_gradient_descent, autodiff_gradient_descent, DescentOutcome};
use crate::error::Result;
use crate::loss;
use crate::model::{QuadraticParams, SampleSet};
use crate::reg_lin::{normal_equations, RegressionFit};
use crate::second_order::{bfgs, newton_cg, newton_step_with, SolverReport};

/// Where the fixed-start optimizers begin.
pub const START: QuadraticParams = QuadraticParams::new(1., 1., 1.);

/// Seed of the stream the analytic descent draws its start from, kept apart
/// from the sample noise stream.
pub fn start_seed(seed: u64) -> u64 {
    seed.wrapping_add(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub method: &'static str,
    pub params: QuadraticParams,
    /// Largest coefficient distance from the ground truth.
    pub max_abs_error: f64,
}

/// All optimizers side by side on one sample set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub config: ExperimentConfig,
    pub closed_form: RegressionFit,
    pub autodiff: DescentOutcome,
    pub analytic: DescentOutcome,
    pub bfgs: SolverReport,
    pub newton_cg: SolverReport,
    pub newton_step: QuadraticParams,
    pub summaries: Vec<FitSummary>,
}

impl ComparisonReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Distance between the one-step Newton result and the normal equations.
    pub fn newton_gap(&self) -> f64 {
        self.newton_step.max_abs_diff(&self.closed_form.params)
    }
}

pub fn run_experiment(config: &ExperimentConfig) -> Result<ComparisonReport> {
    config.validate()?;

    let samples = SampleSet::generate(
        config.ground_truth,
        config.samples,
        (config.x_min, config.x_max),
        config.sigma,
        &mut StdRng::seed_from_u64(config.seed),
    )?;

    info!(
        samples = samples.len(),
        sigma = config.sigma,
        seed = config.seed,
        truth = %config.ground_truth,
        "samples generated"
    );

    let closed_form = normal_equations(&samples)?;
    let autodiff = autodiff_gradient_descent(&samples, &config.autodiff)?;
    let mut start_rng = StdRng::seed_from_u64(start_seed(config.seed));
    let analytic = analytic_gradient_descent(&samples, &config.analytic, &mut start_rng)?;
    let bfgs = bfgs(&samples, START, &config.solver)?;
    let newton_cg = newton_cg(&samples, START, &config.solver)?;

    let hessian = loss::hessian(&samples);
    let newton_step = newton_step_with(&hessian, &samples, START)?;

    let summaries = [
        ("normal equations", closed_form.params),
        ("autodiff descent", autodiff.best),
        ("analytic descent", analytic.best),
        ("BFGS", bfgs.params),
        ("Newton-CG", newton_cg.params),
        ("Newton step", newton_step),
    ]
    .into_iter()
    .map(|(method, params)| FitSummary {
        method,
        params,
        max_abs_error: params.max_abs_diff(&config.ground_truth),
    })
    .collect();

    Ok(ComparisonReport {
        config: config.clone(),
        closed_form,
        autodiff,
        analytic,
        bfgs,
        newton_cg,
        newton_step,
        summaries,
    })
}
