//! In-process fakes for the screener's collaborators
//!
//! Provides:
//! - [`FakeExchange`]: scripted tickers, candles, funding and depth
//! - [`RecordingNotifier`]: captures messages instead of delivering them
//!
//! Used by unit tests and for running full scan cycles without network access.

use crate::error::{Result, ScreenerError};
use crate::exchange::ExchangeSource;
use crate::notify::NotificationChannel;
use crate::types::{BookLevel, Candle, ExchangeId, OrderBook, Ticker, UserId};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted market state behind a [`FakeExchange`]
#[derive(Debug, Default)]
pub struct FakeMarket {
    pub tickers: HashMap<String, Ticker>,
    pub candles: HashMap<String, Vec<Candle>>,
    pub funding: HashMap<String, Decimal>,
    pub books: HashMap<String, OrderBook>,
    pub fail_tickers: bool,
    pub fail_candles: bool,
}

/// Exchange source answering from a [`FakeMarket`]
#[derive(Clone)]
pub struct FakeExchange {
    id: ExchangeId,
    market: Arc<RwLock<FakeMarket>>,
    candle_calls: Arc<AtomicUsize>,
    ticker_calls: Arc<AtomicUsize>,
}

impl FakeExchange {
    pub fn new(id: ExchangeId) -> Self {
        Self {
            id,
            market: Arc::new(RwLock::new(FakeMarket::default())),
            candle_calls: Arc::new(AtomicUsize::new(0)),
            ticker_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Candles whose closes follow `closes`, one minute apart
    pub fn with_closes(self, symbol: &str, closes: &[Decimal]) -> Self {
        let start = Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                time: start + Duration::minutes(i as i64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: Decimal::ONE,
            })
            .collect();
        self.market.write().candles.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_funding(self, symbol: &str, rate: Decimal) -> Self {
        self.market.write().funding.insert(symbol.to_string(), rate);
        self
    }

    /// Single-level book with the given bid and ask volume
    pub fn with_book(self, symbol: &str, bid_volume: Decimal, ask_volume: Decimal) -> Self {
        let book = OrderBook {
            bids: vec![BookLevel::new(Decimal::ONE, bid_volume)],
            asks: vec![BookLevel::new(Decimal::ONE, ask_volume)],
        };
        self.market.write().books.insert(symbol.to_string(), book);
        self
    }

    pub fn with_24h(self, symbol: &str, change_pct: Decimal, quote_volume: Decimal) -> Self {
        if let Some(ticker) = self.market.write().tickers.get_mut(symbol) {
            ticker.change_24h_pct = Some(change_pct);
            ticker.quote_volume = Some(quote_volume);
        }
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        let mut market = self.market.write();
        market
            .tickers
            .entry(symbol.to_string())
            .and_modify(|t| t.last_price = price)
            .or_insert_with(|| Ticker {
                symbol: symbol.to_string(),
                last_price: price,
                change_24h_pct: None,
                quote_volume: None,
            });
    }

    pub fn fail_tickers(&self, fail: bool) {
        self.market.write().fail_tickers = fail;
    }

    pub fn fail_candles(&self, fail: bool) {
        self.market.write().fail_candles = fail;
    }

    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::Relaxed)
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::Relaxed)
    }

    fn unavailable(&self, what: &str) -> ScreenerError {
        ScreenerError::exchange(self.id, format!("{what} unavailable"))
    }
}

#[async_trait]
impl ExchangeSource for FakeExchange {
    fn id(&self) -> ExchangeId {
        self.id
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        self.ticker_calls.fetch_add(1, Ordering::Relaxed);
        let market = self.market.read();
        if market.fail_tickers {
            return Err(self.unavailable("tickers"));
        }
        let mut tickers: Vec<Ticker> = market.tickers.values().cloned().collect();
        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tickers)
    }

    async fn fetch_candles(&self, symbol: &str, _timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        self.candle_calls.fetch_add(1, Ordering::Relaxed);
        let market = self.market.read();
        if market.fail_candles {
            return Err(self.unavailable("candles"));
        }
        let candles = market
            .candles
            .get(symbol)
            .ok_or_else(|| self.unavailable("candles"))?;
        Ok(candles[candles.len().saturating_sub(limit)..].to_vec())
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Decimal> {
        self.market
            .read()
            .funding
            .get(symbol)
            .copied()
            .ok_or_else(|| self.unavailable("funding"))
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let market = self.market.read();
        let book = market
            .books
            .get(symbol)
            .ok_or_else(|| self.unavailable("order book"))?;
        Ok(OrderBook {
            bids: book.bids.iter().take(depth).copied().collect(),
            asks: book.asks.iter().take(depth).copied().collect(),
        })
    }
}

/// Notification channel that records every message
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<(UserId, String)>>>,
    failing_users: Arc<RwLock<HashSet<UserId>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to `user_id` fail from now on
    pub fn fail_for(&self, user_id: UserId) {
        self.failing_users.write().insert(user_id);
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.read().clone()
    }

    pub fn sent_to(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .read()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<()> {
        if self.failing_users.read().contains(&user_id) {
            return Err(ScreenerError::Delivery(format!("user {user_id} blocked the bot")));
        }
        self.sent.write().push((user_id, text.to_string()));
        Ok(())
    }
}
