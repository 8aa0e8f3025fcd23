//! Technical context for qualifying moves
//!
//! Pure indicator math (oscillator, book imbalance) plus the [`Enricher`], which
//! pulls candles, funding and depth for one (exchange, symbol) and composes them
//! into [`Technicals`]. Only the candle fetch is mandatory; every other sub-result
//! degrades to `None` on failure.


use crate::error::{Result, ScreenerError};
use crate::exchange::ExchangeHub;
use crate::types::{ExchangeId, OrderBook, OscillatorSettings, Ticker};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// RSI-style momentum oscillator over the most recent `period` close-to-close deltas.
///
/// Gains and losses are plain means over the window (no Wilder smoothing).
/// Returns `None` when fewer than two closes are available. A window without any
/// loss reads 100.
pub fn oscillator(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if closes.len() < 2 || period == 0 {
        return None;
    }

    let deltas: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = &deltas[deltas.len().saturating_sub(period)..];
    let n = Decimal::from(window.len() as u64);

    let avg_gain = window
        .iter()
        .filter(|d| **d > Decimal::ZERO)
        .sum::<Decimal>()
        / n;
    let avg_loss = window
        .iter()
        .filter(|d| **d < Decimal::ZERO)
        .map(|d| d.abs())
        .sum::<Decimal>()
        / n;

    if avg_loss == Decimal::ZERO {
        return Some(dec!(100));
    }

    let rs = avg_gain / avg_loss;
    let value = dec!(100) - dec!(100) / (Decimal::ONE + rs);
    Some(value.round_dp(1))
}

/// Bid volume excess over ask volume, in percent of ask volume.
///
/// `(bid - ask) / ask * 100`; zero when the ask side is empty.
pub fn order_book_imbalance(book: &OrderBook) -> Decimal {
    let bid_volume: Decimal = book.bids.iter().map(|l| l.volume).sum();
    let ask_volume: Decimal = book.asks.iter().map(|l| l.volume).sum();

    if ask_volume == Decimal::ZERO {
        return Decimal::ZERO;
    }

    (bid_volume - ask_volume) / ask_volume * Decimal::ONE_HUNDRED
}

/// Indicator snapshot for one (exchange, symbol)
#[derive(Debug, Clone, PartialEq)]
pub struct Technicals {
    /// Oscillator value in [0, 100], one decimal
    pub oscillator: Decimal,
    /// Funding rate as a fraction; `None` when the fetch failed
    pub funding_rate: Option<Decimal>,
    /// Book imbalance in percent; `None` when the fetch failed
    pub imbalance_pct: Option<Decimal>,
    /// 24h quote volume
    pub volume_24h: Option<Decimal>,
    /// 24h change in percent
    pub change_24h_pct: Option<Decimal>,
}

impl Technicals {
    /// Funding rate as a percent string, `0%` when unknown
    pub fn funding_label(&self) -> String {
        match self.funding_rate {
            Some(rate) => format!("{:.4}%", (rate * Decimal::ONE_HUNDRED).round_dp(4)),
            None => "0%".to_string(),
        }
    }

    /// 24h quote volume in millions, e.g. `$12.3M`
    pub fn volume_label(&self) -> String {
        let millions = self.volume_24h.unwrap_or(Decimal::ZERO) / dec!(1000000);
        format!("${:.1}M", millions.round_dp(1))
    }

    pub fn change_24h_or_zero(&self) -> Decimal {
        self.change_24h_pct.unwrap_or(Decimal::ZERO)
    }
}

/// Identifies enrichment work that can be shared between users in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnrichmentKey {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub timeframe: String,
    pub period: u32,
}

impl EnrichmentKey {
    pub fn new(exchange: ExchangeId, symbol: &str, settings: &OscillatorSettings) -> Self {
        Self {
            exchange,
            symbol: symbol.to_string(),
            timeframe: settings.timeframe.clone(),
            period: settings.period,
        }
    }
}

/// Fetches and computes [`Technicals`]
#[derive(Clone)]
pub struct Enricher {
    hub: ExchangeHub,
    book_depth: usize,
    candle_margin: usize,
}

impl Enricher {
    pub fn new(hub: ExchangeHub, book_depth: usize, candle_margin: usize) -> Self {
        Self {
            hub,
            book_depth,
            candle_margin,
        }
    }

    /// Compute technicals for `key`. Fails only when the candle series is
    /// unavailable; funding and depth failures are recorded as `None`.
    pub async fn enrich(&self, key: &EnrichmentKey, ticker: Option<&Ticker>) -> Result<Technicals> {
        let period = key.period as usize;
        let limit = period + self.candle_margin;

        let (candles, funding, book) = tokio::join!(
            self.hub
                .fetch_candles(key.exchange, &key.symbol, &key.timeframe, limit),
            self.hub.fetch_funding_rate(key.exchange, &key.symbol),
            self.hub
                .fetch_order_book(key.exchange, &key.symbol, self.book_depth),
        );

        let candles = candles.map_err(|e| {
            ScreenerError::IndicatorUnavailable(format!(
                "{} {} candles: {}",
                key.exchange, key.symbol, e
            ))
        })?;

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let oscillator = oscillator(&closes, period).ok_or_else(|| {
            ScreenerError::IndicatorUnavailable(format!(
                "{} {}: {} candles are not enough",
                key.exchange,
                key.symbol,
                closes.len()
            ))
        })?;

        let funding_rate = funding
            .map_err(|e| debug!("[Enricher] {} {} funding unavailable: {}", key.exchange, key.symbol, e))
            .ok();
        let imbalance_pct = book
            .map(|b| order_book_imbalance(&b))
            .map_err(|e| debug!("[Enricher] {} {} order book unavailable: {}", key.exchange, key.symbol, e))
            .ok();

        Ok(Technicals {
            oscillator,
            funding_rate,
            imbalance_pct,
            volume_24h: ticker.and_then(|t| t.quote_volume),
            change_24h_pct: ticker.and_then(|t| t.change_24h_pct),
        })
    }
}
