//! Binance USDT-M futures REST adapter

use super::{book_levels, get_json, unify_concatenated, value_decimal, ExchangeSource};
use crate::error::{Result, ScreenerError};
use crate::types::{Candle, ExchangeId, OrderBook, Ticker};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

/// Depth values the endpoint accepts
const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    symbol: String,
    last_price: String,
    price_change_percent: Option<String>,
    quote_volume: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    last_funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct DepthData {
    bids: Vec<Vec<serde_json::Value>>,
    asks: Vec<Vec<serde_json::Value>>,
}

pub struct BinanceSource {
    http: Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(http: Client, base_url: Option<&str>) -> Self {
        Self {
            http,
            base_url: base_url
                .unwrap_or(BINANCE_FUTURES_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// `BTC/USDT` -> `BTCUSDT`
    fn native_symbol(symbol: &str) -> String {
        symbol.replace('/', "")
    }

    /// Binance names its kline intervals the way users write them
    fn interval(timeframe: &str) -> Result<&'static str> {
        match timeframe {
            "1m" => Ok("1m"),
            "3m" => Ok("3m"),
            "5m" => Ok("5m"),
            "15m" => Ok("15m"),
            "30m" => Ok("30m"),
            "1h" => Ok("1h"),
            "4h" => Ok("4h"),
            other => Err(ScreenerError::exchange(
                ExchangeId::Binance,
                format!("unsupported timeframe {other}"),
            )),
        }
    }

    fn parse_ticker(data: TickerData) -> Option<Ticker> {
        Some(Ticker {
            symbol: unify_concatenated(&data.symbol)?,
            last_price: data.last_price.parse().ok()?,
            change_24h_pct: data.price_change_percent.and_then(|v| v.parse().ok()),
            quote_volume: data.quote_volume.and_then(|v| v.parse().ok()),
        })
    }

    /// Kline rows: `[openTime, open, high, low, close, volume, ...]`
    fn parse_kline(row: &[serde_json::Value]) -> Option<Candle> {
        let open_ms = row.first()?.as_i64()?;
        Some(Candle {
            time: Utc.timestamp_millis_opt(open_ms).single()?,
            open: value_decimal(row.get(1)?)?,
            high: value_decimal(row.get(2)?)?,
            low: value_decimal(row.get(3)?)?,
            close: value_decimal(row.get(4)?)?,
            volume: value_decimal(row.get(5)?)?,
        })
    }
}

#[async_trait]
impl ExchangeSource for BinanceSource {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let data: Vec<TickerData> = get_json(&self.http, &url, &[]).await?;
        Ok(data.into_iter().filter_map(Self::parse_ticker).collect())
    }

    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let interval = Self::interval(timeframe)?;
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let rows: Vec<Vec<serde_json::Value>> = get_json(
            &self.http,
            &url,
            &[
                ("symbol", Self::native_symbol(symbol)),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await?;

        Ok(rows.iter().filter_map(|row| Self::parse_kline(row)).collect())
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/fapi/v1/premiumIndex", self.base_url);
        let index: PremiumIndex =
            get_json(&self.http, &url, &[("symbol", Self::native_symbol(symbol))]).await?;

        index
            .last_funding_rate
            .parse()
            .map_err(|_| ScreenerError::exchange(self.id(), "malformed funding rate"))
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let url = format!("{}/fapi/v1/depth", self.base_url);
        let limit = DEPTH_LIMITS
            .iter()
            .copied()
            .find(|l| *l >= depth)
            .unwrap_or(1000);
        let data: DepthData = get_json(
            &self.http,
            &url,
            &[
                ("symbol", Self::native_symbol(symbol)),
                ("limit", limit.to_string()),
            ],
        )
        .await?;

        Ok(OrderBook {
            bids: book_levels(&data.bids, depth),
            asks: book_levels(&data.asks, depth),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_every_oscillator_timeframe_is_supported() {
        for timeframe in crate::types::OSCILLATOR_TIMEFRAMES {
            assert_eq!(BinanceSource::interval(timeframe).unwrap(), timeframe);
        }
        assert!(BinanceSource::interval("7m").is_err());
    }

    #[test]
    fn test_parse_ticker() {
        let data: TickerData = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","lastPrice":"65000.10","priceChangePercent":"-1.25","quoteVolume":"12345678.9","count":1}"#,
        )
        .unwrap();
        let ticker = BinanceSource::parse_ticker(data).unwrap();
        assert_eq!(ticker.symbol, "BTC/USDT");
        assert_eq!(ticker.last_price, dec!(65000.10));
        assert_eq!(ticker.change_24h_pct, Some(dec!(-1.25)));
        assert_eq!(ticker.quote_volume, Some(dec!(12345678.9)));
    }

    #[test]
    fn test_parse_kline_row() {
        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(
            r#"[[1718452800000,"100.0","101.5","99.5","101.0","1234.5",1718453099999,"0",10,"0","0","0"]]"#,
        )
        .unwrap();
        let candle = BinanceSource::parse_kline(&rows[0]).unwrap();
        assert_eq!(candle.close, dec!(101.0));
        assert_eq!(candle.time.timestamp_millis(), 1718452800000);
    }

    #[test]
    fn test_native_symbol() {
        assert_eq!(BinanceSource::native_symbol("ETH/USDT"), "ETHUSDT");
    }
}
