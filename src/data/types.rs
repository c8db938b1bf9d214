//! Core data types for the gainers report.
//!
//! Provider responses are loosely typed JSON. They are mapped into these
//! types once, at the client boundary, so downstream code can assume
//! well-formed input.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lookback for price history, in calendar days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Rejected closing-price input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("price at index {index} is not finite")]
    NotFinite { index: usize },

    #[error("price at index {index} is not positive: {value}")]
    NonPositive { index: usize, value: f64 },
}

/// Closing price for a single trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Closing prices for one symbol, one per trading day, oldest first.
///
/// Every value is finite and strictly positive. An empty series is valid;
/// the metrics calculator reports it as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceSeries {
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Validate and wrap a vector of closing prices.
    pub fn new(closes: Vec<f64>) -> Result<Self, SeriesError> {
        for (index, &value) in closes.iter().enumerate() {
            if !value.is_finite() {
                return Err(SeriesError::NotFinite { index });
            }
            if value <= 0.0 {
                return Err(SeriesError::NonPositive { index, value });
            }
        }
        Ok(Self { closes })
    }

    /// Build a series from dated closes in any order.
    ///
    /// Records are sorted by date; when a date repeats, the last record wins.
    pub fn from_daily(mut days: Vec<DailyClose>) -> Result<Self, SeriesError> {
        // Stable sort keeps provider order within a date, so the later
        // duplicate is the one retained below.
        days.sort_by_key(|d| d.date);

        let mut closes: Vec<f64> = Vec::with_capacity(days.len());
        let mut last_date: Option<NaiveDate> = None;
        for day in days {
            if last_date == Some(day.date) {
                if let Some(last) = closes.last_mut() {
                    *last = day.close;
                }
            } else {
                closes.push(day.close);
                last_date = Some(day.date);
            }
        }

        Self::new(closes)
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.closes.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

/// One entry of the candidate symbol list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainerQuote {
    /// Exchange symbol (e.g., "RELIANCE")
    pub symbol: String,

    /// Last traded price (INR)
    pub last_price: f64,

    /// Percentage change on the day
    pub change_pct: f64,
}

/// Inclusive calendar-date range of requested history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LookbackWindow {
    /// Window covering `days` calendar days before `end`, up to and including `end`.
    pub fn ending_on(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}
