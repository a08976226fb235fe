//! Newton-family solvers.
//!
//! [`bfgs`] and [`newton_cg`] hand a [`LeastSquaresProblem`] to argmin.
//! [`newton_step`] takes one exact Newton step without any solver: the loss
//! is quadratic in the coefficients, so a single step from anywhere lands on
//! the normal-equations solution.
use argmin::core::{
    CostFunction, Error, Executor, Gradient, Hessian, State, TerminationReason, TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::newton::NewtonCG;
use argmin::solver::quasinewton::BFGS;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FitError, Result};
use crate::loss::{self, LossForm};
use crate::model::{QuadraticParams, SampleSet};

type Param = Array1<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondOrderMethod {
    Bfgs,
    NewtonCg,
}

impl SecondOrderMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SecondOrderMethod::Bfgs => "BFGS",
            SecondOrderMethod::NewtonCg => "Newton-CG",
        }
    }

    /// BFGS works on the root-sum objective. Newton-CG works on the plain
    /// sum of squares, the only form the constant Hessian is exact for.
    pub fn default_loss_form(&self) -> LossForm {
        match self {
            SecondOrderMethod::Bfgs => LossForm::Root,
            SecondOrderMethod::NewtonCg => LossForm::Squared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iters: u64,
    /// Gradient-norm tolerance (BFGS).
    pub tol_grad: f64,
    /// Cost-change tolerance.
    pub tol_cost: f64,
    /// Overrides [`SecondOrderMethod::default_loss_form`].
    pub loss_form: Option<LossForm>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            tol_grad: 1e-6,
            tol_cost: 1e-10,
            loss_form: None,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_iters == 0 {
            return Err(FitError::InvalidConfig {
                field: "max_iters",
                reason: "must be at least 1".to_owned(),
            });
        }

        for (field, tol) in [("tol_grad", self.tol_grad), ("tol_cost", self.tol_cost)] {
            if !(tol.is_finite() && tol > 0.) {
                return Err(FitError::InvalidConfig {
                    field,
                    reason: format!("must be positive and finite, got {tol}"),
                });
            }
        }

        Ok(())
    }
}

/// Least-squares objective over a borrowed sample set.
///
/// The Hessian is computed once on construction and cloned out on every
/// request.
pub struct LeastSquaresProblem<'a> {
    samples: &'a SampleSet,
    form: LossForm,
    hessian: Array2<f64>,
}

impl<'a> LeastSquaresProblem<'a> {
    pub fn new(samples: &'a SampleSet, form: LossForm) -> Self {
        let h = loss::hessian(samples);

        Self {
            samples,
            form,
            hessian: Array2::from_shape_fn((3, 3), |(i, j)| h[(i, j)]),
        }
    }
}

fn to_params(param: &Param) -> Result<QuadraticParams> {
    match param.as_slice() {
        Some(&[a, b, c]) => Ok(QuadraticParams::new(a, b, c)),
        _ => Err(FitError::InvalidConfig {
            field: "initial",
            reason: format!("expected 3 coefficients, got {}", param.len()),
        }),
    }
}

impl CostFunction for LeastSquaresProblem<'_> {
    type Param = Param;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, Error> {
        let cost = self.form.cost(self.samples, &to_params(param)?);
        if !cost.is_finite() {
            return Err(FitError::NonFinite { what: "cost", value: cost }.into());
        }

        Ok(cost)
    }
}

impl Gradient for LeastSquaresProblem<'_> {
    type Param = Param;
    type Gradient = Param;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
        let gradient = self.form.gradient(self.samples, &to_params(param)?);

        Ok(Array1::from(gradient.to_vec()))
    }
}

impl Hessian for LeastSquaresProblem<'_> {
    type Param = Param;
    type Hessian = Array2<f64>;

    fn hessian(&self, _param: &Self::Param) -> std::result::Result<Self::Hessian, Error> {
        Ok(self.hessian.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverReport {
    pub method: SecondOrderMethod,
    pub loss_form: LossForm,
    pub params: QuadraticParams,
    pub cost: f64,
    pub iterations: u64,
    pub converged: bool,
    /// argmin's termination text, kept so a failed run explains itself.
    pub status: String,
}

impl SolverReport {
    pub fn ensure_converged(self) -> Result<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(FitError::NotConverged {
                method: self.method.name(),
                iterations: self.iterations,
                status: self.status,
            })
        }
    }
}

/// Minimize with the chosen method from `initial`. Running out of iterations
/// is reported through [`SolverReport::converged`], not as an error.
pub fn minimize(
    samples: &SampleSet,
    initial: QuadraticParams,
    method: SecondOrderMethod,
    opts: &SolverOptions,
) -> Result<SolverReport> {
    opts.validate()?;

    let form = opts.loss_form.unwrap_or_else(|| method.default_loss_form());
    let problem = LeastSquaresProblem::new(samples, form);
    let x0 = Array1::from(initial.to_array().to_vec());
    let solver_err = |e: Error| FitError::Solver(format!("{}: {e}", method.name()));

    let state = match method {
        SecondOrderMethod::Bfgs => {
            let solver = BFGS::new(MoreThuenteLineSearch::new())
                .with_tolerance_grad(opts.tol_grad)
                .and_then(|s| s.with_tolerance_cost(opts.tol_cost))
                .map_err(solver_err)?;

            Executor::new(problem, solver)
                .configure(|state| {
                    state
                        .param(x0)
                        .inv_hessian(Array2::eye(3))
                        .max_iters(opts.max_iters)
                })
                .run()
                .map_err(solver_err)?
                .state()
                .clone()
        }
        SecondOrderMethod::NewtonCg => {
            let solver = NewtonCG::new(MoreThuenteLineSearch::new())
                .with_tolerance(opts.tol_cost)
                .map_err(solver_err)?;

            Executor::new(problem, solver)
                .configure(|state| state.param(x0).max_iters(opts.max_iters))
                .run()
                .map_err(solver_err)?
                .state()
                .clone()
        }
    };

    let params = state
        .get_best_param()
        .map(to_params)
        .transpose()?
        .ok_or_else(|| FitError::Solver(format!("{}: no best parameter", method.name())))?;

    let status = state.get_termination_status().clone();
    let converged = matches!(
        status,
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    );

    let report = SolverReport {
        method,
        loss_form: form,
        params,
        cost: state.get_best_cost(),
        iterations: state.get_iter(),
        converged,
        status: status.to_string(),
    };

    if report.converged {
        info!(
            method = method.name(),
            params = %report.params,
            cost = report.cost,
            iterations = report.iterations,
            "solver converged"
        );
    } else {
        warn!(
            method = method.name(),
            status = %report.status,
            iterations = report.iterations,
            "solver did not converge"
        );
    }

    Ok(report)
}

pub fn bfgs(
    samples: &SampleSet,
    initial: QuadraticParams,
    opts: &SolverOptions,
) -> Result<SolverReport> {
    minimize(samples, initial, SecondOrderMethod::Bfgs, opts)
}

pub fn newton_cg(
    samples: &SampleSet,
    initial: QuadraticParams,
    opts: &SolverOptions,
) -> Result<SolverReport> {
    minimize(samples, initial, SecondOrderMethod::NewtonCg, opts)
}

/// `estimate − H⁻¹·J(estimate)` on the sum of squares, with `H` from
/// [`loss::hessian`].
pub fn newton_step(samples: &SampleSet, estimate: QuadraticParams) -> Result<QuadraticParams> {
    newton_step_with(&loss::hessian(samples), samples, estimate)
}

/// Same as [`newton_step`] with a Hessian computed earlier, so repeated steps
/// on one sample set don't rebuild it.
pub fn newton_step_with(
    hessian: &Matrix3<f64>,
    samples: &SampleSet,
    estimate: QuadraticParams,
) -> Result<QuadraticParams> {
    loss::ensure_well_conditioned(hessian, "Hessian")?;

    let inverse = hessian
        .try_inverse()
        .ok_or(FitError::SingularMatrix { what: "Hessian" })?;

    let jacobian = Vector3::from(loss::sum_gradient(samples, &estimate));
    let step = inverse * jacobian;

    let [a, b, c] = estimate.to_array();
    let next = QuadraticParams::new(a - step[0], b - step[1], c - step[2]);

    if !next.is_finite() {
        return Err(FitError::SingularMatrix { what: "Hessian" });
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg_lin::normal_equations;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn noisy_samples() -> SampleSet {
        let mut rng = StdRng::seed_from_u64(11);
        SampleSet::generate(QuadraticParams::new(4., 3., -1.), 50, (-5., 5.), 5., &mut rng)
            .unwrap()
    }

    #[test]
    fn newton_step_lands_on_normal_equations() {
        let samples = noisy_samples();
        let fit = normal_equations(&samples).unwrap();

        let stepped = newton_step(&samples, QuadraticParams::new(1., 1., 1.)).unwrap();

        assert!(stepped.max_abs_diff(&fit.params) < 1e-8);
    }

    #[test]
    fn newton_step_is_idempotent_at_optimum() {
        let samples = noisy_samples();
        let hessian = loss::hessian(&samples);

        let once = newton_step_with(&hessian, &samples, QuadraticParams::new(-7., 0., 12.)).unwrap();
        let twice = newton_step_with(&hessian, &samples, once).unwrap();

        assert!(once.max_abs_diff(&twice) < 1e-8);
    }

    #[test]
    fn newton_step_rejects_single_point() {
        let samples = SampleSet::from_vecs(vec![2., 2., 2.], vec![1., 2., 3.]).unwrap();

        assert!(matches!(
            newton_step(&samples, QuadraticParams::new(1., 1., 1.)),
            Err(FitError::SingularMatrix { .. } | FitError::IllConditioned { .. })
        ));
    }

    #[test]
    fn newton_step_rejects_clustered_far_x() {
        let truth = QuadraticParams::new(4., 3., -1.);
        let x = (0..10).map(|i| 1e5 + i as f64 * 1e-3).collect::<Vec<_>>();
        let y = x.iter().map(|&x| truth.eval(x)).collect();
        let samples = SampleSet::from_vecs(x, y).unwrap();

        assert!(matches!(
            newton_step(&samples, QuadraticParams::new(1., 1., 1.)),
            Err(FitError::IllConditioned { what: "Hessian", .. })
        ));
    }

    #[test]
    fn newton_cg_reaches_normal_equations() {
        let samples = noisy_samples();
        let fit = normal_equations(&samples).unwrap();

        let report =
            newton_cg(&samples, QuadraticParams::new(1., 1., 1.), &SolverOptions::default()).unwrap();

        assert_eq!(report.loss_form, LossForm::Squared);
        assert!(report.params.max_abs_diff(&fit.params) < 1e-4, "{}", report.params);
    }

    #[test]
    fn bfgs_reaches_normal_equations() {
        let samples = noisy_samples();
        let fit = normal_equations(&samples).unwrap();

        let report =
            bfgs(&samples, QuadraticParams::new(1., 1., 1.), &SolverOptions::default()).unwrap();

        assert_eq!(report.loss_form, LossForm::Root);
        assert!(report.params.max_abs_diff(&fit.params) < 1e-2, "{}", report.params);
        assert_abs_diff_eq!(
            report.cost,
            loss::root_sum_of_squares(&samples, &report.params),
            epsilon = 1e-9
        );
    }

    #[test]
    fn iteration_cap_is_reported_not_raised() {
        let opts = SolverOptions {
            max_iters: 1,
            ..Default::default()
        };

        let report = bfgs(&noisy_samples(), QuadraticParams::new(1., 1., 1.), &opts).unwrap();

        assert!(!report.converged);
        assert!(matches!(
            report.ensure_converged(),
            Err(FitError::NotConverged { method: "BFGS", .. })
        ));
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let opts = SolverOptions {
            tol_grad: -1.,
            ..Default::default()
        };

        assert!(bfgs(&noisy_samples(), QuadraticParams::new(1., 1., 1.), &opts).is_err());
    }
}
