//! Markdown report assembly.

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

use crate::data::PriceSeries;
use crate::metrics::{MetricsCalculator, MetricsOutcome};

/// Placeholder for every metric column of an unavailable row.
pub const UNAVAILABLE: &str = "N/A";

/// Timestamp format of the "Last updated" line.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S IST %Y";

const TABLE_HEADER: &str =
    "| Stock Symbol | Profit/Loss (INR) | Win Rate (%) | Max Drawdown (INR) | Sharpe Ratio |\n";
const TABLE_SEPARATOR: &str =
    "| ------------ | ----------------- | ------------ | ------------------ | ------------ |\n";

/// Indian Standard Time, UTC+05:30.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is in range")
}

/// Format a moment as the report's "Last updated" timestamp.
pub fn format_timestamp<Tz: TimeZone>(moment: &DateTime<Tz>) -> String {
    moment.with_timezone(&ist()).format(TIMESTAMP_FORMAT).to_string()
}

/// One symbol's line in the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub symbol: String,
    pub metrics: MetricsOutcome,
}

impl ReportRow {
    /// Render as a newline-terminated markdown table line.
    pub fn to_line(&self) -> String {
        match &self.metrics {
            MetricsOutcome::Available(m) => format!(
                "| {} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
                self.symbol, m.profit_loss, m.win_rate_pct, m.max_drawdown, m.sharpe_ratio
            ),
            MetricsOutcome::Unavailable => format!(
                "| {} | {u} | {u} | {u} | {u} |\n",
                self.symbol,
                u = UNAVAILABLE
            ),
        }
    }
}

/// A generated report, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub generated_at: String,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Header lines: title, timestamp, table header and separator.
    pub fn header_lines(&self) -> Vec<String> {
        vec![
            format!("# {}\n\n", self.title),
            format!("*Last updated on: {}*\n\n", self.generated_at),
            TABLE_HEADER.to_string(),
            TABLE_SEPARATOR.to_string(),
        ]
    }

    /// All lines of the document, header first, rows in input order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.header_lines();
        lines.extend(self.rows.iter().map(ReportRow::to_line));
        lines
    }

    /// Render the full markdown document.
    pub fn render(&self) -> String {
        self.lines().concat()
    }

    pub fn available_count(&self) -> usize {
        self.rows.iter().filter(|r| r.metrics.is_available()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows ({} with metrics, {} N/A), generated {}",
            self.rows.len(),
            self.available_count(),
            self.rows.len() - self.available_count(),
            self.generated_at
        )
    }
}

/// Builds a report by computing metrics for each symbol in turn.
pub struct ReportAssembler {
    title: String,
}

impl ReportAssembler {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Fetch, compute and collect one row per symbol.
    ///
    /// A fetch error or an empty series produces an `N/A` row; the loop
    /// always covers every symbol. Rows keep the order of `symbols`.
    pub fn build<S, F, E>(&self, symbols: &[S], generated_at: &str, mut fetch: F) -> Report
    where
        S: AsRef<str>,
        F: FnMut(&str) -> Result<PriceSeries, E>,
        E: Display,
    {
        let rows = symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.as_ref();
                let metrics = match fetch(symbol) {
                    Ok(prices) => {
                        let metrics = MetricsCalculator::compute(&prices);
                        if !metrics.is_available() {
                            warn!("{}: empty price history, writing {}", symbol, UNAVAILABLE);
                        }
                        metrics
                    }
                    Err(e) => {
                        warn!("{}: {}, writing {}", symbol, e, UNAVAILABLE);
                        MetricsOutcome::Unavailable
                    }
                };
                ReportRow {
                    symbol: symbol.to_string(),
                    metrics,
                }
            })
            .collect();

        let report = Report {
            title: self.title.clone(),
            generated_at: generated_at.to_string(),
            rows,
        };
        info!("Assembled report: {}", report.summary());
        report
    }
}
