//! Exchange connectivity
//!
//! Each supported exchange implements [`ExchangeSource`] over its public REST
//! API. [`ExchangeHub`] owns the adapters and guards every call with a timeout
//! and a per-exchange concurrency limit, so a burst of enrichment requests can't
//! flood a single provider.

pub mod binance;
pub mod bybit;
pub mod mexc;


pub use binance::BinanceSource;
pub use bybit::BybitSource;
pub use mexc::MexcSource;

use crate::config::ExchangesConfig;
use crate::error::{Result, ScreenerError};
use crate::types::{BookLevel, Candle, ExchangeId, OrderBook, Ticker};
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Market data capabilities of one exchange
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeSource: Send + Sync {
    fn id(&self) -> ExchangeId;

    /// 24h tickers for every listed contract
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>>;

    /// Most recent candles, oldest first
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Current funding rate as a fraction (0.0001 = 0.01%)
    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Decimal>;

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook>;
}

/// Shared HTTP client for the REST adapters
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent("futures-screener/0.1")
        .build()?)
}

/// GET a JSON document, mapping non-success statuses to an API error
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let response = http.get(url).query(query).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScreenerError::Api(format!(
            "GET {} returned {}: {}",
            url,
            status,
            body.chars().take(200).collect::<String>()
        )));
    }
    Ok(response.json().await?)
}

/// `BTCUSDT` -> `BTC/USDT` for the quotes we know about
pub(crate) fn unify_concatenated(native: &str) -> Option<String> {
    const QUOTES: [&str; 3] = ["USDT", "USDC", "USD"];
    QUOTES.iter().find_map(|quote| {
        native
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| format!("{}/{}", base, quote))
    })
}

/// Adapter registry with per-exchange guards
#[derive(Clone)]
pub struct ExchangeHub {
    sources: HashMap<ExchangeId, Arc<dyn ExchangeSource>>,
    limiters: HashMap<ExchangeId, Arc<Semaphore>>,
    max_concurrent: usize,
    timeout: Duration,
}

impl ExchangeHub {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            limiters: HashMap::new(),
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Build REST adapters for every enabled exchange
    pub fn from_config(config: &ExchangesConfig) -> Result<Self> {
        let mut hub = Self::new(config.max_concurrent_requests, config.request_timeout());
        let http = http_client(config.request_timeout())?;

        for exchange in &config.enabled {
            let source: Arc<dyn ExchangeSource> = match exchange {
                ExchangeId::Binance => Arc::new(BinanceSource::new(
                    http.clone(),
                    config.binance_url.as_deref(),
                )),
                ExchangeId::Bybit => {
                    Arc::new(BybitSource::new(http.clone(), config.bybit_url.as_deref()))
                }
                ExchangeId::Mexc => {
                    Arc::new(MexcSource::new(http.clone(), config.mexc_url.as_deref()))
                }
            };
            hub.register(source);
        }

        Ok(hub)
    }

    pub fn register(&mut self, source: Arc<dyn ExchangeSource>) {
        let id = source.id();
        self.limiters
            .insert(id, Arc::new(Semaphore::new(self.max_concurrent)));
        self.sources.insert(id, source);
    }

    /// Registered exchanges in a stable order
    pub fn exchanges(&self) -> Vec<ExchangeId> {
        let mut ids: Vec<ExchangeId> = self.sources.keys().copied().collect();
        ids.sort();
        ids
    }

    fn source(&self, exchange: ExchangeId) -> Result<(&Arc<dyn ExchangeSource>, &Arc<Semaphore>)> {
        match (self.sources.get(&exchange), self.limiters.get(&exchange)) {
            (Some(source), Some(limiter)) => Ok((source, limiter)),
            _ => Err(ScreenerError::UnknownExchange(exchange.to_string())),
        }
    }

    /// Run one adapter call under the exchange's permit and the request timeout
    async fn guarded<T, F>(&self, limiter: &Semaphore, context: String, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        // queueing for a permit counts against the same budget
        let guarded_call = async {
            let _permit = limiter
                .acquire()
                .await
                .map_err(|_| ScreenerError::Internal("exchange limiter closed".to_string()))?;
            call.await
        };

        match tokio::time::timeout(self.timeout, guarded_call).await {
            Ok(result) => result,
            Err(_) => Err(ScreenerError::Timeout {
                context,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    pub async fn fetch_tickers(&self, exchange: ExchangeId) -> Result<Vec<Ticker>> {
        let (source, limiter) = self.source(exchange)?;
        self.guarded(limiter, format!("{} tickers", exchange), source.fetch_tickers())
            .await
    }

    pub async fn fetch_candles(
        &self,
        exchange: ExchangeId,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let (source, limiter) = self.source(exchange)?;
        self.guarded(
            limiter,
            format!("{} {} candles", exchange, symbol),
            source.fetch_candles(symbol, timeframe, limit),
        )
        .await
    }

    pub async fn fetch_funding_rate(&self, exchange: ExchangeId, symbol: &str) -> Result<Decimal> {
        let (source, limiter) = self.source(exchange)?;
        self.guarded(
            limiter,
            format!("{} {} funding", exchange, symbol),
            source.fetch_funding_rate(symbol),
        )
        .await
    }

    pub async fn fetch_order_book(
        &self,
        exchange: ExchangeId,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBook> {
        let (source, limiter) = self.source(exchange)?;
        self.guarded(
            limiter,
            format!("{} {} order book", exchange, symbol),
            source.fetch_order_book(symbol, depth),
        )
        .await
    }

    /// Fetch tickers from every exchange concurrently. A failing exchange
    /// contributes an empty set instead of failing the whole snapshot.
    pub async fn fetch_all_tickers(&self) -> Vec<(ExchangeId, Vec<Ticker>)> {
        let exchanges = self.exchanges();
        let results = join_all(exchanges.iter().map(|ex| self.fetch_tickers(*ex))).await;

        exchanges
            .into_iter()
            .zip(results)
            .map(|(exchange, result)| match result {
                Ok(tickers) if tickers.is_empty() => {
                    warn!("[Exchange] {} returned no tickers", exchange);
                    (exchange, tickers)
                }
                Ok(tickers) => {
                    debug!("[Exchange] {} returned {} tickers", exchange, tickers.len());
                    (exchange, tickers)
                }
                Err(e) => {
                    warn!("[Exchange] {} ticker fetch failed: {}", exchange, e);
                    (exchange, Vec::new())
                }
            })
            .collect()
    }
}

/// Decimal from a JSON string or number; exchanges mix both
pub(crate) fn value_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            text.parse()
                .ok()
                .or_else(|| Decimal::from_scientific(&text).ok())
        }
        _ => None,
    }
}

/// `[price, volume, ...]` rows into book levels, keeping at most `depth`
pub(crate) fn book_levels(rows: &[Vec<serde_json::Value>], depth: usize) -> Vec<BookLevel> {
    rows.iter()
        .filter_map(|row| {
            let price = value_decimal(row.first()?)?;
            let volume = value_decimal(row.get(1)?)?;
            Some(BookLevel::new(price, volume))
        })
        .take(depth)
        .collect()
}
