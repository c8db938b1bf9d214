//! Per-symbol metrics calculator.
//!
//! Summarises one symbol's recent closing prices into profit/loss, win rate,
//! maximum drawdown and Sharpe ratio. Profit/loss and drawdown are absolute
//! price units (INR), not percentages.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::PriceSeries;

/// Trading days per year, used to annualize the Sharpe ratio.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    /// Last close minus first close.
    pub profit_loss: f64,
    /// Share of positive daily returns, 0-100.
    pub win_rate_pct: f64,
    /// Largest fall from a running peak close.
    pub max_drawdown: f64,
    /// Annualized mean/stddev of daily returns.
    pub sharpe_ratio: f64,
}

impl SymbolMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Profit/Loss: {:.2} INR\n\
             Win Rate: {:.2}%\n\
             Max Drawdown: {:.2} INR\n\
             Sharpe Ratio: {:.2}",
            self.profit_loss, self.win_rate_pct, self.max_drawdown, self.sharpe_ratio
        )
    }
}

/// Metrics for a symbol, or a marker that none could be computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricsOutcome {
    Available(SymbolMetrics),
    Unavailable,
}

impl MetricsOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn metrics(&self) -> Option<&SymbolMetrics> {
        match self {
            Self::Available(m) => Some(m),
            Self::Unavailable => None,
        }
    }
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics for a price series.
    ///
    /// An empty series is `Unavailable`. A single close is `Available` with
    /// every metric at zero.
    pub fn compute(prices: &PriceSeries) -> MetricsOutcome {
        let closes = prices.closes();
        let (first, last) = match (prices.first(), prices.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return MetricsOutcome::Unavailable,
        };

        let returns = Self::daily_returns(closes);

        MetricsOutcome::Available(SymbolMetrics {
            profit_loss: last - first,
            win_rate_pct: Self::win_rate_pct(&returns),
            max_drawdown: Self::max_drawdown(closes),
            sharpe_ratio: Self::sharpe_ratio(&returns),
        })
    }

    /// Simple returns between consecutive closes.
    pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
        closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
    }

    /// Percentage of strictly positive returns; 0 when there are none.
    pub fn win_rate_pct(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let winners = returns.iter().filter(|&&r| r > 0.0).count();
        winners as f64 / returns.len() as f64 * 100.0
    }

    /// Largest absolute peak-to-trough decline.
    pub fn max_drawdown(closes: &[f64]) -> f64 {
        let mut peak = f64::MIN;
        let mut max_drawdown = 0.0;

        for &close in closes {
            peak = peak.max(close);
            let drawdown = peak - close;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown
    }

    /// Annualized Sharpe ratio (zero risk-free rate, population stddev).
    pub fn sharpe_ratio(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }

        let mean = returns.mean();
        let std_dev = returns.population_std_dev();

        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }

        mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }
}
