//! Performance metrics module.
//!
//! Provides the per-symbol summary used in the report:
//! - Profit/loss over the lookback window
//! - Win rate of daily returns
//! - Maximum drawdown
//! - Annualized Sharpe ratio

pub mod calculator;

pub use calculator::{MetricsCalculator, MetricsOutcome, SymbolMetrics, TRADING_DAYS_PER_YEAR};
