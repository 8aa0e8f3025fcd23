//! Bybit v5 linear perpetuals REST adapter

use super::{book_levels, get_json, unify_concatenated, value_decimal, ExchangeSource};
use crate::error::{Result, ScreenerError};
use crate::types::{Candle, ExchangeId, OrderBook, Ticker};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

const BYBIT_API_URL: &str = "https://api.bybit.com";

/// Every v5 response is wrapped in this envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    symbol: String,
    last_price: String,
    /// Fraction, 0.0123 = +1.23%
    #[serde(rename = "price24hPcnt")]
    price_24h_pcnt: Option<String>,
    #[serde(rename = "turnover24h")]
    turnover_24h: Option<String>,
    funding_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookData {
    b: Vec<Vec<serde_json::Value>>,
    a: Vec<Vec<serde_json::Value>>,
}

pub struct BybitSource {
    http: Client,
    base_url: String,
}

impl BybitSource {
    pub fn new(http: Client, base_url: Option<&str>) -> Self {
        Self {
            http,
            base_url: base_url
                .unwrap_or(BYBIT_API_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn native_symbol(symbol: &str) -> String {
        symbol.replace('/', "")
    }

    /// `5m` -> `5`, `1h` -> `60`
    fn interval(timeframe: &str) -> Result<&'static str> {
        match timeframe {
            "1m" => Ok("1"),
            "3m" => Ok("3"),
            "5m" => Ok("5"),
            "15m" => Ok("15"),
            "30m" => Ok("30"),
            "1h" => Ok("60"),
            "4h" => Ok("240"),
            other => Err(ScreenerError::exchange(
                ExchangeId::Bybit,
                format!("unsupported timeframe {other}"),
            )),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let envelope: Envelope<T> = get_json(&self.http, &url, query).await?;
        if envelope.ret_code != 0 {
            return Err(ScreenerError::exchange(
                ExchangeId::Bybit,
                format!("retCode {}: {}", envelope.ret_code, envelope.ret_msg),
            ));
        }
        envelope
            .result
            .ok_or_else(|| ScreenerError::exchange(ExchangeId::Bybit, "empty result"))
    }

    fn parse_ticker(data: TickerData) -> Option<Ticker> {
        Some(Ticker {
            symbol: unify_concatenated(&data.symbol)?,
            last_price: data.last_price.parse().ok()?,
            change_24h_pct: data
                .price_24h_pcnt
                .and_then(|v| v.parse::<Decimal>().ok())
                .map(|fraction| fraction * Decimal::ONE_HUNDRED),
            quote_volume: data.turnover_24h.and_then(|v| v.parse().ok()),
        })
    }

    /// Kline rows: `[startTime, open, high, low, close, volume, turnover]`
    fn parse_kline(row: &[serde_json::Value]) -> Option<Candle> {
        let start_ms: i64 = row.first()?.as_str()?.parse().ok()?;
        Some(Candle {
            time: Utc.timestamp_millis_opt(start_ms).single()?,
            open: value_decimal(row.get(1)?)?,
            high: value_decimal(row.get(2)?)?,
            low: value_decimal(row.get(3)?)?,
            close: value_decimal(row.get(4)?)?,
            volume: value_decimal(row.get(5)?)?,
        })
    }
}

#[async_trait]
impl ExchangeSource for BybitSource {
    fn id(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        let result: ListResult<TickerData> = self
            .get("/v5/market/tickers", &[("category", "linear".to_string())])
            .await?;
        Ok(result.list.into_iter().filter_map(Self::parse_ticker).collect())
    }

    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let result: ListResult<Vec<serde_json::Value>> = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", "linear".to_string()),
                    ("symbol", Self::native_symbol(symbol)),
                    ("interval", Self::interval(timeframe)?.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        // Newest first on the wire
        let mut candles: Vec<Candle> = result
            .list
            .iter()
            .filter_map(|row| Self::parse_kline(row))
            .collect();
        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Decimal> {
        let result: ListResult<TickerData> = self
            .get(
                "/v5/market/tickers",
                &[
                    ("category", "linear".to_string()),
                    ("symbol", Self::native_symbol(symbol)),
                ],
            )
            .await?;

        result
            .list
            .into_iter()
            .next()
            .and_then(|t| t.funding_rate)
            .and_then(|rate| rate.parse().ok())
            .ok_or_else(|| ScreenerError::exchange(self.id(), "funding rate missing"))
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let book: BookData = self
            .get(
                "/v5/market/orderbook",
                &[
                    ("category", "linear".to_string()),
                    ("symbol", Self::native_symbol(symbol)),
                    ("limit", depth.clamp(1, 500).to_string()),
                ],
            )
            .await?;

        Ok(OrderBook {
            bids: book_levels(&book.b, depth),
            asks: book_levels(&book.a, depth),
        })
    }
}
