//! Per-regime reporting
//!
//! Descriptive statistics per decoded state plus the fitted model parameters.

mod report;

pub use report::{FeatureStats, RegimeReport, StateSummary};
