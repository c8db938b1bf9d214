pub mod nse;
pub mod types;

pub use nse::{records_to_gainers, records_to_series, NSEClient, NSEError, RawHistoryRecord, RawIndexRecord};
pub use types::{DailyClose, GainerQuote, LookbackWindow, PriceSeries, SeriesError, DEFAULT_LOOKBACK_DAYS};
