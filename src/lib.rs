pub mod config;
pub mod data;
pub mod metrics;
pub mod report;

// Re-export commonly used types
pub use config::{load_config, AppConfig, ConfigError, ProviderConfig, ReportConfig};
pub use data::{GainerQuote, LookbackWindow, NSEClient, NSEError, PriceSeries, SeriesError};
pub use metrics::{MetricsCalculator, MetricsOutcome, SymbolMetrics};
pub use report::{PersistenceError, PublishOutcome, Report, ReportAssembler, ReportRow, ReportWriter};
