use clap::{Parser, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dopasowanie_fuw::descent::{
    analytic_gradient_descent, autodiff_gradient_descent, DescentOptions,
};
use dopasowanie_fuw::experiment::start_seed;
use dopasowanie_fuw::{ExperimentConfig, SampleSet};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Variant {
    Autodiff,
    Analytic,
}

/// Sweeps gradient descent learning rates to show where it stops being stable.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value = "analytic")]
    variant: Variant,

    #[arg(long, value_delimiter = ',', default_values_t = [1e-5, 1e-4, 1e-3, 1e-2, 1e-1])]
    rates: Vec<f64>,

    #[arg(long, default_value_t = 100)]
    iters: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the sweep as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SweepRow {
    learning_rate: f64,
    best_cost: f64,
    final_cost: f64,
    diverged_at: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ExperimentConfig {
        seed: args.seed,
        ..Default::default()
    };

    let samples = SampleSet::generate(
        config.ground_truth,
        config.samples,
        (config.x_min, config.x_max),
        config.sigma,
        &mut StdRng::seed_from_u64(config.seed),
    )?;

    let rows = args
        .rates
        .iter()
        .map(|&learning_rate| {
            let opts = DescentOptions {
                learning_rate,
                max_iters: args.iters,
            };

            // same start for every rate
            let mut start_rng = StdRng::seed_from_u64(start_seed(config.seed));
            let outcome = match args.variant {
                Variant::Autodiff => autodiff_gradient_descent(&samples, &opts)?,
                Variant::Analytic => analytic_gradient_descent(&samples, &opts, &mut start_rng)?,
            };

            Ok(SweepRow {
                learning_rate,
                best_cost: outcome.best_cost,
                final_cost: outcome.final_cost,
                diverged_at: outcome.diverged_at,
            })
        })
        .collect::<Result<Vec<_>, dopasowanie_fuw::FitError>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:>10} {:>14} {:>14}  diverged", "lr", "best cost", "final cost");
    for row in &rows {
        println!(
            "{:>10.0e} {:>14.6e} {:>14.6e}  {}",
            row.learning_rate,
            row.best_cost,
            row.final_cost,
            row.diverged_at
                .map_or_else(|| "-".to_owned(), |i| format!("at {i}"))
        );
    }

    Ok(())
}
