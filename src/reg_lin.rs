use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::Serialize;
use tracing::info;

use crate::error::{FitError, Result};
use crate::loss::{ensure_well_conditioned, mean_squared};
use crate::model::{QuadraticParams, SampleSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionFit {
    pub params: QuadraticParams,
    /// Mean squared residual of `params` on the fitted samples.
    pub mse: f64,
}

/// Rows `[x², x, 1]`.
pub fn design_matrix(samples: &SampleSet) -> DMatrix<f64> {
    let x = samples.x();

    DMatrix::from_fn(samples.len(), 3, |i, j| x[i].powi(2 - j as i32))
}

/// Least squares through `(XᵀX)⁻¹·Xᵀ·y`.
///
/// Fewer than three distinct x values make `XᵀX` singular, so those inputs
/// are rejected before anything is inverted. Distinct but tightly clustered
/// x values far from zero leave `XᵀX` numerically singular and are rejected
/// by the conditioning check.
pub fn normal_equations(samples: &SampleSet) -> Result<RegressionFit> {
    let distinct = samples.distinct_x();
    if distinct < 3 {
        return Err(FitError::DegenerateInput {
            required: 3,
            distinct,
        });
    }

    let design = design_matrix(samples);
    let y = DVector::from_iterator(samples.len(), samples.y().iter().copied());

    let normal = Matrix3::from_iterator((design.transpose() * &design).iter().copied());
    ensure_well_conditioned(&normal, "normal")?;

    let normal_inv = normal
        .try_inverse()
        .ok_or(FitError::SingularMatrix { what: "normal" })?;

    let xty = design.transpose() * y;
    let theta = normal_inv * Vector3::from_iterator(xty.iter().copied());

    let params = QuadraticParams::new(theta[0], theta[1], theta[2]);
    if !params.is_finite() {
        return Err(FitError::SingularMatrix { what: "normal" });
    }

    let fit = RegressionFit {
        params,
        mse: mean_squared(samples, &params),
    };

    info!(params = %fit.params, mse = fit.mse, "normal equations solved");

    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn design_rows_are_powers() {
        let samples = SampleSet::from_vecs(vec![2., -1., 0.], vec![0.; 3]).unwrap();

        let design = design_matrix(&samples);

        assert_eq!(design.row(0).iter().copied().collect::<Vec<_>>(), [4., 2., 1.]);
        assert_eq!(design.row(1).iter().copied().collect::<Vec<_>>(), [1., -1., 1.]);
        assert_eq!(design.row(2).iter().copied().collect::<Vec<_>>(), [0., 0., 1.]);
    }

    #[test]
    fn three_points_fit_exactly() {
        let samples = SampleSet::from_vecs(vec![0., 1., 2.], vec![-1., 6., 21.]).unwrap();

        let fit = normal_equations(&samples).unwrap();

        assert_abs_diff_eq!(fit.params.a, 4., epsilon = 1e-9);
        assert_abs_diff_eq!(fit.params.b, 3., epsilon = 1e-9);
        assert_abs_diff_eq!(fit.params.c, -1., epsilon = 1e-9);
        assert_abs_diff_eq!(fit.mse, 0., epsilon = 1e-12);
    }

    #[test]
    fn two_distinct_values_are_degenerate() {
        let samples = SampleSet::from_vecs(vec![1., 1., 2., 2.], vec![0., 1., 2., 3.]).unwrap();

        let err = normal_equations(&samples).unwrap_err();

        assert!(matches!(
            err,
            FitError::DegenerateInput {
                required: 3,
                distinct: 2
            }
        ));
    }

    #[test]
    fn clustered_far_x_is_ill_conditioned() {
        let truth = QuadraticParams::new(4., 3., -1.);
        let x = (0..10).map(|i| 1e5 + i as f64 * 1e-3).collect::<Vec<_>>();
        let y = x.iter().map(|&x| truth.eval(x)).collect();
        let samples = SampleSet::from_vecs(x, y).unwrap();

        assert!(matches!(
            normal_equations(&samples),
            Err(FitError::IllConditioned { what: "normal", .. })
        ));
    }

    #[test]
    fn too_few_samples_are_degenerate() {
        let samples = SampleSet::from_vecs(vec![1., 2.], vec![0., 1.]).unwrap();

        assert!(normal_equations(&samples).is_err());
    }
}
