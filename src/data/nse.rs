//! NSE (National Stock Exchange of India) API client.
//!
//! API Constraints:
//! - The JSON API rejects requests without session cookies; hit the site
//!   root once (`warm_up`) before calling any endpoint
//! - Requests need a browser-like User-Agent
//! - Aggressive polling gets throttled (HTTP 429) or blocked outright
//! - Historical endpoints return newest records first

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::types::{DailyClose, GainerQuote, LookbackWindow, PriceSeries, SeriesError};
use crate::config::ProviderConfig;

/// Index constituents endpoint.
const INDEX_ENDPOINT: &str = "api/equity-stockIndices";

/// Daily equity history endpoint.
const HISTORY_ENDPOINT: &str = "api/historical/cm/equity";

/// Only ordinary equity trades count towards closing prices.
const EQUITY_SERIES: &str = "[\"EQ\"]";

/// NSE API errors.
#[derive(Error, Debug)]
pub enum NSEError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid price data: {0}")]
    Series(#[from] SeriesError),

    #[error("No price history for {symbol}")]
    NoData { symbol: String },
}

/// API response wrapper - NSE wraps list responses in {"data": [...]}
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Raw index constituent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndexRecord {
    pub symbol: String,

    /// 1 marks the index's own summary row.
    #[serde(default)]
    pub priority: i64,

    #[serde(default)]
    pub last_price: Option<f64>,

    #[serde(default)]
    pub p_change: Option<f64>,
}

impl RawIndexRecord {
    pub fn is_index_row(&self) -> bool {
        self.priority == 1
    }

    pub fn to_quote(&self) -> Option<GainerQuote> {
        Some(GainerQuote {
            symbol: self.symbol.clone(),
            last_price: self.last_price?,
            change_pct: self.p_change?,
        })
    }
}

/// Raw daily history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHistoryRecord {
    #[serde(rename = "CH_SYMBOL", default)]
    pub symbol: Option<String>,

    #[serde(rename = "CH_SERIES", default)]
    pub series: Option<String>,

    #[serde(rename = "CH_TIMESTAMP")]
    pub timestamp: String,

    #[serde(rename = "CH_CLOSING_PRICE")]
    pub closing_price: f64,
}

impl RawHistoryRecord {
    pub fn to_daily_close(&self) -> Option<DailyClose> {
        let date = NaiveDate::parse_from_str(&self.timestamp, "%Y-%m-%d").ok()?;
        Some(DailyClose {
            date,
            close: self.closing_price,
        })
    }
}

/// NSE API client.
pub struct NSEClient {
    client: Client,
    base_url: String,
    index: String,
    min_interval: Duration,
    last_request: Instant,
    request_count: u64,
}

impl NSEClient {
    /// Create a client from provider settings.
    pub fn new(config: &ProviderConfig) -> Result<Self, NSEError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let min_interval = Duration::from_millis(config.request_interval_ms);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            min_interval,
            last_request: Instant::now() - min_interval,
            request_count: 0,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn throttle(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
    }

    /// Rate-limited request helper.
    async fn request<T: for<'de> Deserialize<'de>>(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, NSEError> {
        self.throttle().await;

        let url = self.url(endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await?;

        self.last_request = Instant::now();
        self.request_count += 1;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NSEError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NSEError::ApiError(format!("{}: {}", status, text)));
        }

        response.json().await.map_err(|e| {
            NSEError::InvalidResponse(format!("Failed to parse response: {}", e))
        })
    }

    /// Get request count for monitoring.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Load the site root so the cookie jar holds a session.
    pub async fn warm_up(&mut self) -> Result<(), NSEError> {
        self.throttle().await;

        let response = self.client.get(&self.base_url).send().await?;
        self.last_request = Instant::now();
        self.request_count += 1;

        if !response.status().is_success() {
            return Err(NSEError::ApiError(format!(
                "session warm-up returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Get the top gaining constituents of the configured index.
    pub async fn top_gainers(&mut self, limit: usize) -> Result<Vec<GainerQuote>, NSEError> {
        let index = self.index.clone();
        let response: ApiResponse<Vec<RawIndexRecord>> =
            self.request(INDEX_ENDPOINT, &[("index", index.as_str())]).await?;
        Ok(records_to_gainers(response.data, limit))
    }

    /// Get closing prices for one symbol over a lookback window.
    pub async fn closing_prices(
        &mut self,
        symbol: &str,
        window: LookbackWindow,
    ) -> Result<PriceSeries, NSEError> {
        let from = window.start.format("%d-%m-%Y").to_string();
        let to = window.end.format("%d-%m-%Y").to_string();
        let params = [
            ("symbol", symbol),
            ("series", EQUITY_SERIES),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ];

        let response: ApiResponse<Vec<RawHistoryRecord>> =
            self.request(HISTORY_ENDPOINT, &params).await?;
        if response.data.is_empty() {
            return Err(NSEError::NoData {
                symbol: symbol.to_string(),
            });
        }
        records_to_series(response.data)
    }

    /// Fetch closing prices for every symbol, one request at a time.
    ///
    /// Results come back in input order. A failed symbol does not stop the
    /// remaining fetches.
    pub async fn fetch_all(
        &mut self,
        symbols: &[String],
        window: LookbackWindow,
    ) -> Vec<(String, Result<PriceSeries, NSEError>)> {
        let pb = ProgressBar::new(symbols.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            pb.set_message(symbol.clone());
            let result = self.closing_prices(symbol, window).await;
            results.push((symbol.clone(), result));
            pb.inc(1);
        }

        pb.finish_with_message("history fetched");
        results
    }
}

/// Drop the index summary row, rank by percentage change, keep the top `limit`.
pub fn records_to_gainers(records: Vec<RawIndexRecord>, limit: usize) -> Vec<GainerQuote> {
    let mut quotes: Vec<GainerQuote> = records
        .iter()
        .filter(|r| !r.is_index_row())
        .filter_map(RawIndexRecord::to_quote)
        .collect();

    quotes.sort_by(|a, b| b.change_pct.total_cmp(&a.change_pct));
    quotes.truncate(limit);
    quotes
}

/// Convert raw history records into a validated, oldest-first series.
pub fn records_to_series(records: Vec<RawHistoryRecord>) -> Result<PriceSeries, NSEError> {
    let days = records
        .iter()
        .map(|r| {
            r.to_daily_close().ok_or_else(|| {
                NSEError::InvalidResponse(format!("bad CH_TIMESTAMP: {}", r.timestamp))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PriceSeries::from_daily(days)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_SAMPLE: &str = r#"{
        "name": "SECURITIES IN F&O",
        "data": [
            {"priority": 1, "symbol": "SECURITIES IN F&O", "lastPrice": 1000.0, "pChange": 0.4},
            {"priority": 0, "symbol": "TCS", "lastPrice": 3900.5, "pChange": 1.25},
            {"priority": 0, "symbol": "SBIN", "lastPrice": 812.1, "pChange": 3.8},
            {"priority": 0, "symbol": "ITC", "lastPrice": 430.0, "pChange": -0.7},
            {"priority": 0, "symbol": "NOPRICE"}
        ]
    }"#;

    const HISTORY_SAMPLE: &str = r#"{
        "data": [
            {"CH_SYMBOL": "SBIN", "CH_SERIES": "EQ", "CH_TIMESTAMP": "2024-01-03", "CH_CLOSING_PRICE": 105.0},
            {"CH_SYMBOL": "SBIN", "CH_SERIES": "EQ", "CH_TIMESTAMP": "2024-01-02", "CH_CLOSING_PRICE": 110.0},
            {"CH_SYMBOL": "SBIN", "CH_SERIES": "EQ", "CH_TIMESTAMP": "2024-01-01", "CH_CLOSING_PRICE": 100.0}
        ],
        "meta": {}
    }"#;

    #[test]
    fn test_gainers_ranked_by_change() {
        let response: ApiResponse<Vec<RawIndexRecord>> =
            serde_json::from_str(INDEX_SAMPLE).unwrap();
        let gainers = records_to_gainers(response.data, 50);

        let symbols: Vec<&str> = gainers.iter().map(|g| g.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SBIN", "TCS", "ITC"]);
        assert_eq!(gainers[0].last_price, 812.1);
    }

    #[test]
    fn test_gainers_limit() {
        let response: ApiResponse<Vec<RawIndexRecord>> =
            serde_json::from_str(INDEX_SAMPLE).unwrap();
        let gainers = records_to_gainers(response.data, 1);
        assert_eq!(gainers.len(), 1);
        assert_eq!(gainers[0].symbol, "SBIN");
    }

    #[test]
    fn test_history_newest_first_becomes_oldest_first() {
        let response: ApiResponse<Vec<RawHistoryRecord>> =
            serde_json::from_str(HISTORY_SAMPLE).unwrap();
        let series = records_to_series(response.data).unwrap();
        assert_eq!(series.closes(), &[100.0, 110.0, 105.0]);
    }

    #[test]
    fn test_history_bad_timestamp() {
        let records = vec![RawHistoryRecord {
            symbol: None,
            series: None,
            timestamp: "03-Jan-2024".to_string(),
            closing_price: 10.0,
        }];
        assert!(matches!(
            records_to_series(records),
            Err(NSEError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_history_non_positive_close() {
        let records = vec![RawHistoryRecord {
            symbol: None,
            series: None,
            timestamp: "2024-01-03".to_string(),
            closing_price: 0.0,
        }];
        assert!(matches!(records_to_series(records), Err(NSEError::Series(_))));
    }

    #[test]
    fn test_client_url_join() {
        let config = ProviderConfig {
            base_url: "https://example.test/".to_string(),
            ..ProviderConfig::default()
        };
        let client = NSEClient::new(&config).unwrap();
        assert_eq!(
            client.url(HISTORY_ENDPOINT),
            "https://example.test/api/historical/cm/equity"
        );
        assert_eq!(client.request_count(), 0);
    }
    fn client_for(base_url: &str) -> NSEClient {
        let config = ProviderConfig {
            base_url: base_url.to_string(),
            request_interval_ms: 0,
            timeout_secs: 5,
            ..ProviderConfig::default()
        };
        NSEClient::new(&config).unwrap()
    }

    fn window() -> LookbackWindow {
        LookbackWindow::ending_on(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 30)
    }

    /// Serve one canned HTTP response to every connection; returns the base URL.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_order_and_continues_after_failures() {
        let mut client = client_for("http://127.0.0.1:1");
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let results = client.fetch_all(&symbols, window()).await;

        assert_eq!(results.len(), 3);
        let order: Vec<&str> = results.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        for (symbol, result) in &results {
            assert!(
                matches!(result, Err(NSEError::HttpError(_))),
                "{}: {:?}",
                symbol,
                result
            );
        }
    }

    #[tokio::test]
    async fn test_empty_history_is_no_data() {
        let base = serve("200 OK", r#"{"data": []}"#).await;
        let mut client = client_for(&base);

        let result = client.closing_prices("SBIN", window()).await;
        assert!(matches!(result, Err(NSEError::NoData { ref symbol }) if symbol == "SBIN"));
    }

    #[tokio::test]
    async fn test_history_served_oldest_first() {
        let base = serve("200 OK", HISTORY_SAMPLE).await;
        let mut client = client_for(&base);

        let series = client.closing_prices("SBIN", window()).await.unwrap();
        assert_eq!(series.closes(), &[100.0, 110.0, 105.0]);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limit() {
        let base = serve("429 Too Many Requests", "{}").await;
        let mut client = client_for(&base);

        let result = client.closing_prices("SBIN", window()).await;
        assert!(matches!(result, Err(NSEError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let base = serve("503 Service Unavailable", "maintenance").await;
        let mut client = client_for(&base);

        match client.top_gainers(10).await {
            Err(NSEError::ApiError(msg)) => assert!(msg.contains("503")),
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_response() {
        let base = serve("200 OK", "<html>blocked</html>").await;
        let mut client = client_for(&base);

        let result = client.closing_prices("SBIN", window()).await;
        assert!(matches!(result, Err(NSEError::InvalidResponse(_))));
    }
}
