use itertools::Itertools;
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Coefficients of `a·x² + b·x + c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticParams {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn from_array([a, b, c]: [f64; 3]) -> Self {
        Self { a, b, c }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Draws every coefficient from a standard normal distribution.
    pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            a: rng.sample(StandardNormal),
            b: rng.sample(StandardNormal),
            c: rng.sample(StandardNormal),
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.a * x.powi(2) + self.b * x + self.c
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    /// Largest absolute coefficient difference.
    pub fn max_abs_diff(&self, other: &QuadraticParams) -> f64 {
        self.to_array()
            .iter()
            .zip(other.to_array())
            .map(|(l, r)| (l - r).abs())
            .fold(0., f64::max)
    }
}

impl std::fmt::Display for QuadraticParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a = {:.6}, b = {:.6}, c = {:.6}", self.a, self.b, self.c)
    }
}

pub fn quadratic(params: QuadraticParams) -> impl Fn(f64) -> f64 + Copy {
    move |x| params.eval(x)
}

/// Wraps `f` so that every evaluated element gets its own `N(0, sigma²)` draw.
pub fn noisy<'r, F, R>(
    f: F,
    sigma: f64,
    rng: &'r mut R,
) -> Result<impl FnMut(&Array1<f64>) -> Array1<f64> + 'r>
where
    F: Fn(f64) -> f64 + 'r,
    R: Rng + ?Sized,
{
    if !(sigma.is_finite() && sigma >= 0.) {
        return Err(FitError::InvalidConfig {
            field: "sigma",
            reason: format!("must be non-negative and finite, got {sigma}"),
        });
    }

    let normal = Normal::new(0., sigma).map_err(|e| FitError::InvalidConfig {
        field: "sigma",
        reason: e.to_string(),
    })?;

    Ok(move |x: &Array1<f64>| x.mapv(|x| f(x) + normal.sample(&mut *rng)))
}

/// Observed points `(x, y)`, equal length, read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    x: Array1<f64>,
    y: Array1<f64>,
}

impl SampleSet {
    pub fn from_vecs(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        Self::new(Array1::from(x), Array1::from(y))
    }

    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }

        if let Some(&value) = x.iter().chain(y.iter()).find(|v| !v.is_finite()) {
            return Err(FitError::NonFinite {
                what: "sample",
                value,
            });
        }

        Ok(Self { x, y })
    }

    /// `n` evenly spaced points on `[x_min, x_max]` with noisy targets.
    pub fn generate<R: Rng + ?Sized>(
        params: QuadraticParams,
        n: usize,
        (x_min, x_max): (f64, f64),
        sigma: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let x = Array1::linspace(x_min, x_max, n);

        let mut sample = noisy(quadratic(params), sigma, rng)?;
        let y = sample(&x);

        Self::new(x, y)
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn distinct_x(&self) -> usize {
        self.x
            .iter()
            .copied()
            .sorted_by(f64::total_cmp)
            .dedup()
            .count()
    }

    /// Residuals `ŷ − y` of `params` on this set.
    pub fn residuals(&self, params: &QuadraticParams) -> Array1<f64> {
        self.x.mapv(|x| params.eval(x)) - &self.y
    }
}
