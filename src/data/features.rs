//! Feature engineering for regime detection
//!
//! Derives the three model inputs from raw candles: close-to-close returns,
//! rolling volatility of returns, and fractional volume change. Rows with any
//! undefined or non-finite value are dropped whole, never repaired.

use super::types::Dataset;
use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array1, Array2};
use statrs::statistics::Statistics;

/// Feature column names, in matrix column order
pub const FEATURE_NAMES: [&str; 3] = ["returns", "volatility", "volume_change"];

/// Default rolling window for volatility (24 trailing returns)
pub const DEFAULT_VOLATILITY_WINDOW: usize = 24;

/// Feature matrix with aligned timestamps
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Feature matrix (rows = observations, cols = features)
    pub data: Array2<f64>,
    /// Timestamps corresponding to each row
    pub timestamps: Vec<i64>,
}

impl FeatureTable {
    /// Number of observations
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Get a feature column by name
    pub fn column(&self, name: &str) -> Option<Array1<f64>> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.data.column(idx).to_owned())
    }
}

/// Builds the feature table from a candle dataset
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    /// Trailing window of returns for the volatility column
    pub volatility_window: usize,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self {
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
        }
    }
}

impl FeatureBuilder {
    /// Create builder with default window
    pub fn new() -> Self {
        Self::default()
    }

    /// Set volatility window
    pub fn with_volatility_window(mut self, window: usize) -> Self {
        self.volatility_window = window;
        self
    }

    /// Build the feature table.
    ///
    /// For `n` candles and window `w`, a candle at index `t` produces a row
    /// when `t >= w`: the return and volume change need a previous candle,
    /// and the volatility needs `w` trailing returns. A fully clean input
    /// therefore yields `n - w` rows.
    pub fn build(&self, dataset: &Dataset) -> PipelineResult<FeatureTable> {
        let w = self.volatility_window;
        let n = dataset.len();

        if w == 0 {
            return Err(PipelineError::InvalidInput(
                "volatility window must be at least 1".to_string(),
            ));
        }
        if n <= w {
            return Err(PipelineError::InsufficientData { needed: w + 1, got: n });
        }

        let closes = dataset.closes();
        let volumes = dataset.volumes();
        let timestamps = dataset.timestamps();

        // returns[i] is the return of candle i+1 over candle i
        let returns: Vec<f64> = closes.windows(2).map(|p| p[1] / p[0] - 1.0).collect();
        let volume_changes: Vec<f64> = volumes.windows(2).map(|v| v[1] / v[0] - 1.0).collect();

        let mut rows = Vec::new();
        let mut row_timestamps = Vec::new();
        let mut dropped = 0usize;

        for t in w..n {
            let ret = returns[t - 1];
            let vol = returns[t - w..t].iter().std_dev();
            let vol_change = volume_changes[t - 1];

            if ret.is_finite() && vol.is_finite() && vol_change.is_finite() {
                rows.extend([ret, vol, vol_change]);
                row_timestamps.push(timestamps[t]);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, "dropped feature rows with non-finite values");
        }

        if row_timestamps.is_empty() {
            return Err(PipelineError::InsufficientData { needed: w + 1, got: n });
        }

        let data = Array2::from_shape_vec((row_timestamps.len(), FEATURE_NAMES.len()), rows)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        tracing::info!(
            rows = data.nrows(),
            window = w,
            "built feature table"
        );

        Ok(FeatureTable {
            data,
            timestamps: row_timestamps,
        })
    }
}
