use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::model::{QuadraticParams, SampleSet};

/// Smallest accepted ratio of smallest to largest singular value.
pub const MIN_RCOND: f64 = 1e-12;

/// Σ(ŷ − y)²
pub fn sum_of_squares(samples: &SampleSet, params: &QuadraticParams) -> f64 {
    samples.residuals(params).mapv(|r| r.powi(2)).sum()
}

/// mean((ŷ − y)²)
pub fn mean_squared(samples: &SampleSet, params: &QuadraticParams) -> f64 {
    sum_of_squares(samples, params) / samples.len() as f64
}

/// √Σ(ŷ − y)²
pub fn root_sum_of_squares(samples: &SampleSet, params: &QuadraticParams) -> f64 {
    sum_of_squares(samples, params).sqrt()
}

/// Gradient of [`sum_of_squares`]: `2·Σ(x²·r), 2·Σ(x·r), 2·Σr`.
pub fn sum_gradient(samples: &SampleSet, params: &QuadraticParams) -> [f64; 3] {
    let residuals = samples.residuals(params);

    let (da, db, dc) = samples.x().iter().zip(residuals.iter()).fold(
        (0., 0., 0.),
        |(da, db, dc), (&x, &r)| (da + x.powi(2) * r, db + x * r, dc + r),
    );

    [2. * da, 2. * db, 2. * dc]
}

/// Gradient of [`mean_squared`]: `2·mean(x²·r), 2·mean(x·r), 2·mean(r)`.
pub fn mean_gradient(samples: &SampleSet, params: &QuadraticParams) -> [f64; 3] {
    let n = samples.len() as f64;

    sum_gradient(samples, params).map(|g| g / n)
}

/// Gradient of [`root_sum_of_squares`]. Zero at an exact fit, where the root
/// has no derivative.
pub fn root_gradient(samples: &SampleSet, params: &QuadraticParams) -> [f64; 3] {
    let root = root_sum_of_squares(samples, params);
    if root == 0. {
        return [0.; 3];
    }

    sum_gradient(samples, params).map(|g| g / (2. * root))
}

/// Hessian of [`sum_of_squares`]. The model is linear in its parameters so
/// this does not depend on where it is evaluated.
///
/// `2·[[Σx⁴, Σx³, Σx²], [Σx³, Σx², Σx], [Σx², Σx, N]]`
pub fn hessian(samples: &SampleSet) -> Matrix3<f64> {
    let power_sum = |k: i32| samples.x().iter().map(|x| x.powi(k)).sum::<f64>();

    let (s4, s3, s2, s1) = (power_sum(4), power_sum(3), power_sum(2), power_sum(1));
    let n = samples.len() as f64;

    #[rustfmt::skip]
    let h = Matrix3::new(
        s4, s3, s2,
        s3, s2, s1,
        s2, s1, n,
    );

    h * 2.
}

/// Rejects curvature matrices too close to singular to invert meaningfully.
pub fn ensure_well_conditioned(m: &Matrix3<f64>, what: &'static str) -> Result<()> {
    let singular = m.svd(false, false).singular_values;
    let (min, max) = (singular.min(), singular.max());

    let rcond = if max > 0. { min / max } else { 0. };
    if !(rcond >= MIN_RCOND) {
        return Err(FitError::IllConditioned { what, rcond });
    }

    Ok(())
}

/// Which residual aggregate a solver minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossForm {
    Squared,
    Root,
}

impl LossForm {
    pub fn cost(&self, samples: &SampleSet, params: &QuadraticParams) -> f64 {
        match self {
            LossForm::Squared => sum_of_squares(samples, params),
            LossForm::Root => root_sum_of_squares(samples, params),
        }
    }

    pub fn gradient(&self, samples: &SampleSet, params: &QuadraticParams) -> [f64; 3] {
        match self {
            LossForm::Squared => sum_gradient(samples, params),
            LossForm::Root => root_gradient(samples, params),
        }
    }
}
