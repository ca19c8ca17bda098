//! Candle data loading and feature engineering
//!
//! Provides the raw candle types, the CSV loader and the feature table
//! consumed by the regime model.

mod features;
mod loader;
mod types;

pub use features::{FeatureBuilder, FeatureTable, DEFAULT_VOLATILITY_WINDOW, FEATURE_NAMES};
pub use loader::load_candles;
pub use types::{Candle, Dataset};
