//! Data types for market data

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl Candle {
    /// Candle time as UTC datetime
    pub fn datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_default()
    }

    /// Return from open to close
    pub fn return_oc(&self) -> f64 {
        (self.close - self.open) / self.open
    }
}

/// Time-indexed candle table, ordered strictly ascending by timestamp
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Raw candle data
    pub candles: Vec<Candle>,
    /// Symbol name
    pub symbol: String,
}

impl Dataset {
    /// Create new dataset from candles
    pub fn new(candles: Vec<Candle>, symbol: &str) -> Self {
        Self {
            candles,
            symbol: symbol.to_string(),
        }
    }

    /// Get closing prices
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Get volumes
    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Get timestamps
    pub fn timestamps(&self) -> Vec<i64> {
        self.candles.iter().map(|c| c.timestamp).collect()
    }

    /// Time span of the dataset as UTC datetimes
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.candles.first()?;
        let last = self.candles.last()?;
        Some((first.datetime(), last.datetime()))
    }

    /// Number of candles
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}
