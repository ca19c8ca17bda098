//! Feature standardization
//!
//! Z-score scaling with retained per-column statistics. The scaler is fit once
//! over the training table and the same (mean, std) pair must be reapplied to
//! any later rows before decoding, keeping train and inference consistent.

use crate::data::{FeatureTable, FEATURE_NAMES};
use crate::error::{PipelineError, PipelineResult};
use ndarray::Array2;
use statrs::statistics::Statistics;

const MIN_STD: f64 = 1e-12;

/// Per-column z-score scaler
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit the scaler over all rows of the feature table.
    ///
    /// Uses the sample standard deviation. A column with zero variance makes
    /// standardization undefined and is rejected.
    pub fn fit(table: &FeatureTable) -> PipelineResult<Self> {
        let mut means = Vec::with_capacity(table.n_features());
        let mut stds = Vec::with_capacity(table.n_features());

        for (idx, col) in table.data.columns().into_iter().enumerate() {
            let mean = col.iter().mean();
            let std = col.iter().std_dev();

            if !std.is_finite() || std < MIN_STD {
                return Err(PipelineError::DegenerateFeature {
                    column: FEATURE_NAMES.get(idx).copied().unwrap_or("?").to_string(),
                });
            }

            means.push(mean);
            stds.push(std);
        }

        Ok(Self { means, stds })
    }

    /// Transform a matrix with the retained training statistics.
    pub fn transform(&self, data: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        if data.ncols() != self.means.len() {
            return Err(PipelineError::InvalidInput(format!(
                "expected {} feature columns, got {}",
                self.means.len(),
                data.ncols()
            )));
        }

        let mut scaled = data.clone();
        for (idx, mut col) in scaled.columns_mut().into_iter().enumerate() {
            let (mean, std) = (self.means[idx], self.stds[idx]);
            col.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(scaled)
    }

    /// Fit over the table, then transform its matrix
    pub fn fit_transform(table: &FeatureTable) -> PipelineResult<(Self, Array2<f64>)> {
        let scaler = Self::fit(table)?;
        let scaled = scaler.transform(&table.data)?;
        Ok((scaler, scaled))
    }

    /// Retained per-column means
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Retained per-column standard deviations
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }
}
