//! CSV candle loader
//!
//! Reads a delimited OHLCV table with a header row. Columns are located by
//! name, so extra columns and arbitrary column order are tolerated.

use super::types::{Candle, Dataset};
use crate::error::{PipelineError, PipelineResult};
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Load candles from a CSV file into a time-indexed dataset.
///
/// The header must contain `timestamp` (Unix epoch seconds) and the OHLCV
/// columns; timestamps must be strictly increasing.
pub fn load_candles<P: AsRef<Path>>(path: P, symbol: &str) -> PipelineResult<Dataset> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let column_index = |name: &str| -> PipelineResult<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                PipelineError::DataFormat(format!(
                    "missing required column '{}' in {}",
                    name,
                    path.display()
                ))
            })
    };

    let mut indices = [0usize; 6];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = column_index(name)?;
    }
    let [ts_idx, open_idx, high_idx, low_idx, close_idx, volume_idx] = indices;

    let mut candles: Vec<Candle> = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        // CSV line number: 1-based, header on line 1
        let line = row + 2;

        let timestamp = raw_field(&record, ts_idx, "timestamp", line)?
            .trim()
            .parse::<i64>()
            .map_err(|_| {
                PipelineError::DataFormat(format!(
                    "line {}: cannot parse timestamp '{}'",
                    line,
                    record.get(ts_idx).unwrap_or("")
                ))
            })?;

        if let Some(prev) = candles.last() {
            if timestamp <= prev.timestamp {
                return Err(PipelineError::DataFormat(format!(
                    "line {}: timestamp {} not strictly increasing (previous {})",
                    line, timestamp, prev.timestamp
                )));
            }
        }

        candles.push(Candle {
            timestamp,
            open: numeric_field(&record, open_idx, "open", line)?,
            high: numeric_field(&record, high_idx, "high", line)?,
            low: numeric_field(&record, low_idx, "low", line)?,
            close: numeric_field(&record, close_idx, "close", line)?,
            volume: numeric_field(&record, volume_idx, "volume", line)?,
        });
    }

    tracing::info!(rows = candles.len(), path = %path.display(), "loaded candles");
    Ok(Dataset::new(candles, symbol))
}

fn raw_field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> PipelineResult<&'r str> {
    record.get(idx).ok_or_else(|| {
        PipelineError::DataFormat(format!("line {}: truncated record, no {} field", line, name))
    })
}

fn numeric_field(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> PipelineResult<f64> {
    raw_field(record, idx, name, line)?
        .trim()
        .parse::<f64>()
        .map_err(|_| {
            PipelineError::DataFormat(format!(
                "line {}: cannot parse {} value '{}'",
                line,
                name,
                record.get(idx).unwrap_or("")
            ))
        })
}
