pub mod config;
pub mod descent;
pub mod error;
pub mod experiment;
pub mod loss;
pub mod model;
pub mod reg_lin;
pub mod second_order;
pub mod trace;

pub use config::ExperimentConfig;
pub use error::{FitError, Result};
pub use experiment::{run_experiment, ComparisonReport};
pub use model::{QuadraticParams, SampleSet};
pub use trace::{OptimizationTrace, TraceRecord};
