//! Batch pipeline wiring
//!
//! Threads every stage output through an explicit context: raw candles,
//! feature table, retained scaler, fitted model, fit summary and decoded
//! state sequence. No stage reads ambient state; the run is one-way and
//! full-batch (no incremental refit).

use crate::data::{Dataset, FeatureBuilder, FeatureTable, DEFAULT_VOLATILITY_WINDOW};
use crate::error::PipelineResult;
use crate::models::{FitSummary, GaussianHMM, DEFAULT_SEED, DEFAULT_TOL};
use crate::regime::RegimeReport;
use crate::scale::StandardScaler;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of hidden states K
    pub n_states: usize,
    /// Maximum EM iterations
    pub max_iter: usize,
    /// Convergence tolerance on log-likelihood improvement
    pub tol: f64,
    /// RNG seed for reproducible fits
    pub seed: u64,
    /// Rolling window for the volatility feature
    pub volatility_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_states: 4,
            max_iter: 200,
            tol: DEFAULT_TOL,
            seed: DEFAULT_SEED,
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Raw candle dataset
    pub dataset: Dataset,
    /// Raw (unstandardized) feature table
    pub features: FeatureTable,
    /// Retained standardization parameters
    pub scaler: StandardScaler,
    /// Fitted regime model, frozen after the fit
    pub model: GaussianHMM,
    /// Fit outcome; `converged: false` is a warning, not a failure
    pub fit: FitSummary,
    /// One state label per feature row, in `[0, n_states)`
    pub states: Vec<usize>,
}

impl PipelineContext {
    /// Run the full pipeline:
    /// raw candles -> features -> standardized matrix -> fitted model -> states.
    pub fn run(dataset: Dataset, config: &PipelineConfig) -> PipelineResult<Self> {
        tracing::info!(
            candles = dataset.len(),
            symbol = %dataset.symbol,
            "starting regime analysis"
        );

        let features = FeatureBuilder::new()
            .with_volatility_window(config.volatility_window)
            .build(&dataset)?;

        let (scaler, scaled) = StandardScaler::fit_transform(&features)?;

        let mut model = GaussianHMM::new(config.n_states)
            .with_tol(config.tol)
            .with_seed(config.seed);
        let fit = model.fit(&scaled, config.max_iter)?;

        let states = model.decode(&scaled)?;

        tracing::info!(
            rows = features.n_samples(),
            states = config.n_states,
            converged = fit.converged,
            iterations = fit.iterations,
            "pipeline complete"
        );

        Ok(Self {
            dataset,
            features,
            scaler,
            model,
            fit,
            states,
        })
    }

    /// Build the per-state report for this run
    pub fn report(&self) -> PipelineResult<RegimeReport> {
        RegimeReport::build(&self.features, &self.model, &self.states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Candle;

    fn synthetic_dataset(n: usize) -> Dataset {
        let candles = (0..n)
            .map(|i| {
                let t = i as f64;
                let close = 30_000.0 + 2_000.0 * (t * 0.1).sin();
                Candle {
                    timestamp: 3600 * i as i64,
                    open: close * 0.999,
                    high: close * 1.002,
                    low: close * 0.998,
                    close,
                    volume: 1_000.0 + 100.0 * (t * 0.3).sin(),
                }
            })
            .collect();
        Dataset::new(candles, "BTCUSD")
    }

    #[test]
    fn test_run_produces_aligned_outputs() {
        let context = PipelineContext::run(synthetic_dataset(200), &PipelineConfig::default())
            .unwrap();

        assert_eq!(context.features.n_samples(), 200 - 24);
        assert_eq!(context.states.len(), context.features.n_samples());
        assert!(context.states.iter().all(|&s| s < 4));
        assert_eq!(context.scaler.means().len(), 3);
    }

    #[test]
    fn test_report_from_context() {
        let config = PipelineConfig {
            n_states: 2,
            ..Default::default()
        };
        let context = PipelineContext::run(synthetic_dataset(120), &config).unwrap();
        let report = context.report().unwrap();
        assert_eq!(report.states.len(), 2);
    }
}
