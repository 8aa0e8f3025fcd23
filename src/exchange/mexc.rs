//! MEXC perpetual contract REST adapter

use super::{book_levels, get_json, value_decimal, ExchangeSource};
use crate::error::{Result, ScreenerError};
use crate::types::{Candle, ExchangeId, OrderBook, Ticker};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

const MEXC_CONTRACT_URL: &str = "https://contract.mexc.com";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    code: i64,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    symbol: String,
    last_price: Value,
    /// Fraction, -0.0123 = -1.23%
    rise_fall_rate: Option<Value>,
    /// 24h turnover in quote currency
    amount24: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingData {
    funding_rate: Value,
}

/// Column-oriented kline payload
#[derive(Debug, Deserialize)]
struct KlineData {
    time: Vec<i64>,
    open: Vec<Value>,
    close: Vec<Value>,
    high: Vec<Value>,
    low: Vec<Value>,
    vol: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DepthData {
    asks: Vec<Vec<Value>>,
    bids: Vec<Vec<Value>>,
}

pub struct MexcSource {
    http: Client,
    base_url: String,
}

impl MexcSource {
    pub fn new(http: Client, base_url: Option<&str>) -> Self {
        Self {
            http,
            base_url: base_url
                .unwrap_or(MEXC_CONTRACT_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// `BTC/USDT` -> `BTC_USDT`
    fn native_symbol(symbol: &str) -> String {
        symbol.replace('/', "_")
    }

    fn unified_symbol(native: &str) -> Option<String> {
        let (base, quote) = native.split_once('_')?;
        (!base.is_empty() && !quote.is_empty()).then(|| format!("{}/{}", base, quote))
    }

    /// Native interval name, its length in seconds, and how many native candles
    /// make up one candle of `timeframe`. MEXC has no 3-minute klines, so those
    /// are merged from 1-minute ones.
    fn interval(timeframe: &str) -> Result<(&'static str, i64, usize)> {
        match timeframe {
            "1m" => Ok(("Min1", 60, 1)),
            "3m" => Ok(("Min1", 60, 3)),
            "5m" => Ok(("Min5", 300, 1)),
            "15m" => Ok(("Min15", 900, 1)),
            "30m" => Ok(("Min30", 1800, 1)),
            "1h" => Ok(("Min60", 3600, 1)),
            "4h" => Ok(("Hour4", 14400, 1)),
            other => Err(ScreenerError::exchange(
                ExchangeId::Mexc,
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
        if !envelope.success {
            return Err(ScreenerError::exchange(
                ExchangeId::Mexc,
                format!("request rejected with code {}", envelope.code),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ScreenerError::exchange(ExchangeId::Mexc, "empty data"))
    }

    fn parse_ticker(data: TickerData) -> Option<Ticker> {
        Some(Ticker {
            symbol: Self::unified_symbol(&data.symbol)?,
            last_price: value_decimal(&data.last_price)?,
            change_24h_pct: data
                .rise_fall_rate
                .as_ref()
                .and_then(value_decimal)
                .map(|fraction| fraction * Decimal::ONE_HUNDRED),
            quote_volume: data.amount24.as_ref().and_then(value_decimal),
        })
    }

    fn parse_klines(data: &KlineData) -> Vec<Candle> {
        data.time
            .iter()
            .enumerate()
            .filter_map(|(i, secs)| {
                Some(Candle {
                    time: Utc.timestamp_opt(*secs, 0).single()?,
                    open: value_decimal(data.open.get(i)?)?,
                    high: value_decimal(data.high.get(i)?)?,
                    low: value_decimal(data.low.get(i)?)?,
                    close: value_decimal(data.close.get(i)?)?,
                    volume: value_decimal(data.vol.get(i)?)?,
                })
            })
            .collect()
    }

    /// Merge sorted candles into buckets of `group` native steps, aligned to
    /// the bucket length
    fn merge_candles(candles: Vec<Candle>, step_secs: i64, group: usize) -> Vec<Candle> {
        if group <= 1 {
            return candles;
        }
        let bucket_secs = step_secs * group as i64;
        let mut merged: Vec<Candle> = Vec::new();

        for candle in candles {
            let ts = candle.time.timestamp();
            let start = ts - ts.rem_euclid(bucket_secs);
            match merged.last_mut() {
                Some(last) if last.time.timestamp() == start => {
                    last.high = last.high.max(candle.high);
                    last.low = last.low.min(candle.low);
                    last.close = candle.close;
                    last.volume += candle.volume;
                }
                _ => {
                    let Some(time) = Utc.timestamp_opt(start, 0).single() else {
                        continue;
                    };
                    merged.push(Candle { time, ..candle });
                }
            }
        }
        merged
    }
}

#[async_trait]
impl ExchangeSource for MexcSource {
    fn id(&self) -> ExchangeId {
        ExchangeId::Mexc
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        let data: Vec<TickerData> = self.get("/api/v1/contract/ticker", &[]).await?;
        Ok(data.into_iter().filter_map(Self::parse_ticker).collect())
    }

    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let (interval, step_secs, group) = Self::interval(timeframe)?;
        let end = Utc::now().timestamp();
        // one extra bucket so a partial leading bucket still leaves `limit` candles
        let start = end - step_secs * (group * (limit + 1)) as i64;

        let data: KlineData = self
            .get(
                &format!("/api/v1/contract/kline/{}", Self::native_symbol(symbol)),
                &[
                    ("interval", interval.to_string()),
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                ],
            )
            .await?;

        let mut candles = Self::parse_klines(&data);
        candles.sort_by_key(|c| c.time);
        let mut candles = Self::merge_candles(candles, step_secs, group);
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        Ok(candles)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<Decimal> {
        let data: FundingData = self
            .get(
                &format!("/api/v1/contract/funding_rate/{}", Self::native_symbol(symbol)),
                &[],
            )
            .await?;

        value_decimal(&data.funding_rate)
            .ok_or_else(|| ScreenerError::exchange(self.id(), "malformed funding rate"))
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let data: DepthData = self
            .get(
                &format!("/api/v1/contract/depth/{}", Self::native_symbol(symbol)),
                &[("limit", depth.to_string())],
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
    fn test_parse_ticker_numeric_fields() {
        let envelope: Envelope<Vec<TickerData>> = serde_json::from_str(
            r#"{"success":true,"code":0,"data":[
                {"symbol":"PEPE_USDT","lastPrice":0.0000125,"riseFallRate":-0.05,"amount24":2500000.5}
            ]}"#,
        )
        .unwrap();
        let data = envelope.data.unwrap().into_iter().next().unwrap();
        let ticker = MexcSource::parse_ticker(data).unwrap();

        assert_eq!(ticker.symbol, "PEPE/USDT");
        assert_eq!(ticker.last_price, dec!(0.0000125));
        assert_eq!(ticker.change_24h_pct, Some(dec!(-5)));
        assert_eq!(ticker.quote_volume, Some(dec!(2500000.5)));
    }

    #[test]
    fn test_parse_columnar_klines() {
        let data: KlineData = serde_json::from_str(
            r#"{"time":[1718452800,1718453100],"open":[1,2],"close":[2,3],"high":[2,3],"low":[1,2],"vol":[10,20]}"#,
        )
        .unwrap();
        let candles = MexcSource::parse_klines(&data);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, dec!(3));
    }

    fn candle(secs: i64, close: Decimal) -> Candle {
        Candle {
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            open: close - dec!(1),
            high: close + dec!(1),
            low: close - dec!(2),
            close,
            volume: dec!(10),
        }
    }

    #[test]
    fn test_every_oscillator_timeframe_is_supported() {
        for timeframe in crate::types::OSCILLATOR_TIMEFRAMES {
            assert!(MexcSource::interval(timeframe).is_ok(), "{timeframe}");
        }
        assert!(MexcSource::interval("2h").is_err());
    }

    #[test]
    fn test_three_minute_candles_from_one_minute() {
        let (interval, step, group) = MexcSource::interval("3m").unwrap();
        assert_eq!((interval, step, group), ("Min1", 60, 3));

        // 1718452800 is a multiple of 180; the first minute is a partial bucket
        let base = 1_718_452_800;
        let minutes: Vec<Candle> = (-1..6)
            .map(|i| candle(base + i * 60, Decimal::from(100 + i)))
            .collect();
        let merged = MexcSource::merge_candles(minutes, step, group);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].time.timestamp(), base);
        assert_eq!(merged[1].open, dec!(99));
        assert_eq!(merged[1].close, dec!(102));
        assert_eq!(merged[1].high, dec!(103));
        assert_eq!(merged[1].low, dec!(98));
        assert_eq!(merged[1].volume, dec!(30));
        assert_eq!(merged[2].close, dec!(105));
    }

    #[test]
    fn test_merge_is_noop_for_native_intervals() {
        let candles = vec![candle(0, dec!(1)), candle(300, dec!(2))];
        assert_eq!(MexcSource::merge_candles(candles.clone(), 300, 1), candles);
    }

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(MexcSource::native_symbol("BTC/USDT"), "BTC_USDT");
        assert_eq!(MexcSource::unified_symbol("BTC_USDT").as_deref(), Some("BTC/USDT"));
        assert!(MexcSource::unified_symbol("BTCUSDT").is_none());
    }
}
