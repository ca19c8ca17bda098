//! Market regime segmentation for Bitcoin OHLCV history.
//!
//! Loads candle data from CSV, derives return/volatility/volume features,
//! standardizes them, fits a Gaussian Hidden Markov Model by EM, decodes a
//! regime label per time step with Viterbi, and reports per-state statistics.

pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod regime;
pub mod scale;

pub use data::{Candle, Dataset, FeatureBuilder, FeatureTable};
pub use error::{PipelineError, PipelineResult};
pub use models::{FitSummary, GaussianHMM};
pub use pipeline::{PipelineConfig, PipelineContext};
pub use regime::RegimeReport;
pub use scale::StandardScaler;
