use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dopasowanie_fuw::{run_experiment, ExperimentConfig};

/// Fits a·x² + b·x + c to noisy samples with every optimizer and compares them.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON experiment config; missing fields use the defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Noise standard deviation
    #[arg(long)]
    sigma: Option<f64>,

    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Learning rate for both gradient descent variants
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Iteration count for both gradient descent variants
    #[arg(long)]
    iters: Option<usize>,

    /// Write the full report (traces included) as JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_config(args: &Args) -> Result<ExperimentConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(sigma) = args.sigma {
        config.sigma = sigma;
    }
    if let Some(samples) = args.samples {
        config.samples = samples;
    }
    if let Some(lr) = args.learning_rate {
        config.autodiff.learning_rate = lr;
        config.analytic.learning_rate = lr;
    }
    if let Some(iters) = args.iters {
        config.autodiff.max_iters = iters;
        config.analytic.max_iters = iters;
    }

    config.validate()?;

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    let config = build_config(&args)?;
    let report = run_experiment(&config)?;

    println!("ground truth:     {}", config.ground_truth);
    for summary in &report.summaries {
        println!(
            "{:<17} {}  (max error {:.3e})",
            format!("{}:", summary.method),
            summary.params,
            summary.max_abs_error
        );
    }

    println!("closed-form mse:  {:.6}", report.closed_form.mse);
    println!("newton gap:       {:.3e}", report.newton_gap());

    for (name, outcome) in [("autodiff", &report.autodiff), ("analytic", &report.analytic)] {
        match outcome.diverged_at {
            Some(i) => println!("{name} descent diverged at iteration {i}"),
            None => println!(
                "{name} descent: best cost {:.6}, final cost {:.6}",
                outcome.best_cost, outcome.final_cost
            ),
        }
    }

    for solver in [&report.bfgs, &report.newton_cg] {
        println!(
            "{}: cost {:.6} after {} iterations ({})",
            solver.method.name(),
            solver.cost,
            solver.iterations,
            solver.status
        );
    }

    if let Some(path) = &args.output {
        std::fs::write(path, report.to_json()?)?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}
