//! Bitcoin regime analysis CLI
//!
//! Loads OHLCV candles from CSV, fits a Gaussian HMM over derived features
//! and prints per-regime statistics.

use anyhow::Result;
use btc_regimes::data::load_candles;
use btc_regimes::pipeline::{PipelineConfig, PipelineContext};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "btc-regimes")]
#[command(about = "Gaussian HMM market regime segmentation over OHLCV candle history")]
struct Cli {
    /// Input CSV file with timestamp (epoch seconds) and OHLCV columns
    input: PathBuf,

    /// Symbol label used in output
    #[arg(short, long, default_value = "BTCUSD")]
    symbol: String,

    /// Number of hidden states (regimes)
    #[arg(short = 'n', long, default_value_t = 4)]
    states: usize,

    /// Maximum EM iterations
    #[arg(long, default_value_t = 200)]
    max_iter: usize,

    /// Convergence tolerance on log-likelihood improvement
    #[arg(long, default_value_t = 1e-2)]
    tol: f64,

    /// RNG seed; the same seed and input reproduce the fit exactly
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Rolling window (in candles) for the volatility feature
    #[arg(long, default_value_t = 24)]
    window: usize,

    /// Print per-state descriptive statistics of the raw features
    #[arg(long)]
    describe: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("btc_regimes=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    println!("{}", format!("Loading candles from {}...", cli.input.display()).cyan());
    let dataset = load_candles(&cli.input, &cli.symbol)?;
    if let Some((start, end)) = dataset.time_span() {
        println!("Loaded {} candles spanning {} to {}", dataset.len(), start, end);
    }

    let config = PipelineConfig {
        n_states: cli.states,
        max_iter: cli.max_iter,
        tol: cli.tol,
        seed: cli.seed,
        volatility_window: cli.window,
    };

    println!(
        "{}",
        format!(
            "Fitting {}-state HMM (max {} iterations, tol {})...",
            config.n_states, config.max_iter, config.tol
        )
        .cyan()
    );
    let context = PipelineContext::run(dataset, &config)?;

    if context.fit.converged {
        println!(
            "{}",
            format!(
                "Converged after {} iterations (log-likelihood {:.4})",
                context.fit.iterations, context.fit.log_likelihood
            )
            .green()
        );
    } else {
        println!(
            "{}",
            format!(
                "Did not converge within {} iterations; using best-effort parameters",
                context.fit.iterations
            )
            .yellow()
        );
    }

    let report = context.report()?;
    report.render(cli.describe);

    Ok(())
}
