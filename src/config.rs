use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descent::DescentOptions;
use crate::error::{FitError, Result};
use crate::model::QuadraticParams;
use crate::second_order::SolverOptions;

/// One comparison run. Every field has a default, so a JSON file only needs
/// to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub ground_truth: QuadraticParams,
    pub samples: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub sigma: f64,
    pub seed: u64,
    pub autodiff: DescentOptions,
    pub analytic: DescentOptions,
    pub solver: SolverOptions,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            ground_truth: QuadraticParams::new(4., 3., -1.),
            samples: 50,
            x_min: -5.,
            x_max: 5.,
            sigma: 5.,
            seed: 42,
            autodiff: DescentOptions::default(),
            analytic: DescentOptions::default(),
            solver: SolverOptions::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples < 3 {
            return Err(FitError::InvalidConfig {
                field: "samples",
                reason: format!("need at least 3, got {}", self.samples),
            });
        }

        if !(self.x_min.is_finite() && self.x_max.is_finite() && self.x_min < self.x_max) {
            return Err(FitError::InvalidConfig {
                field: "x_min",
                reason: format!("[{}, {}] is not a finite interval", self.x_min, self.x_max),
            });
        }

        if !(self.sigma.is_finite() && self.sigma >= 0.) {
            return Err(FitError::InvalidConfig {
                field: "sigma",
                reason: format!("must be non-negative and finite, got {}", self.sigma),
            });
        }

        if !self.ground_truth.is_finite() {
            return Err(FitError::InvalidConfig {
                field: "ground_truth",
                reason: format!("{} is not finite", self.ground_truth),
            });
        }

        self.autodiff.validate()?;
        self.analytic.validate()?;
        self.solver.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{ "seed": 7, "analytic": { "learning_rate": 0.1, "max_iters": 10 } }"#)
                .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.analytic.learning_rate, 0.1);
        assert_eq!(config.samples, 50);
        assert_eq!(config.solver, SolverOptions::default());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("dopasowanie_config_{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "sigma": 0.0, "samples": 10 }}"#).unwrap();

        let config = ExperimentConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.sigma, 0.);
        assert_eq!(config.samples, 10);
    }

    #[test]
    fn rejects_bad_fields() {
        let too_few = ExperimentConfig {
            samples: 2,
            ..Default::default()
        };
        let inverted = ExperimentConfig {
            x_min: 1.,
            x_max: -1.,
            ..Default::default()
        };
        let negative_sigma = ExperimentConfig {
            sigma: -0.5,
            ..Default::default()
        };

        assert!(too_few.validate().is_err());
        assert!(inverted.validate().is_err());
        assert!(negative_sigma.validate().is_err());
    }
}
