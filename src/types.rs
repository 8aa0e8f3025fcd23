//! Core domain types shared across the screener

use crate::error::{Result, ScreenerError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Telegram user id; doubles as the chat id for private chats.
pub type UserId = i64;

/// Supported futures exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Mexc,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Binance, ExchangeId::Bybit, ExchangeId::Mexc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bybit => "bybit",
            Self::Mexc => "mexc",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "bybit" => Ok(Self::Bybit),
            "mexc" => Ok(Self::Mexc),
            other => Err(ScreenerError::UnknownExchange(other.to_string())),
        }
    }
}

/// 24h ticker snapshot for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Unified symbol, e.g. `BTC/USDT`
    pub symbol: String,
    pub last_price: Decimal,
    /// 24h change in percent (5.2 means +5.2%)
    pub change_24h_pct: Option<Decimal>,
    /// 24h turnover in quote currency
    pub quote_volume: Option<Decimal>,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

/// Top of the order book, best levels first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Which moves a user wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    #[default]
    Both,
    Pump,
    Dump,
}

impl SignalType {
    /// Direction predicate: PUMP needs a strictly positive change, DUMP a strictly negative one.
    pub fn admits(&self, change_pct: Decimal) -> bool {
        match self {
            Self::Both => true,
            Self::Pump => change_pct > Decimal::ZERO,
            Self::Dump => change_pct < Decimal::ZERO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "BOTH",
            Self::Pump => "PUMP",
            Self::Dump => "DUMP",
        }
    }
}

impl FromStr for SignalType {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOTH" => Ok(Self::Both),
            "PUMP" => Ok(Self::Pump),
            "DUMP" => Ok(Self::Dump),
            other => Err(ScreenerError::InvalidSetting(format!(
                "unknown signal type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Pump,
    Dump,
}

impl MoveDirection {
    pub fn of(change_pct: Decimal) -> Self {
        if change_pct > Decimal::ZERO {
            Self::Pump
        } else {
            Self::Dump
        }
    }
}

/// Timeframes accepted for the oscillator candles
pub const OSCILLATOR_TIMEFRAMES: [&str; 7] = ["1m", "3m", "5m", "15m", "30m", "1h", "4h"];

/// RSI-style oscillator preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillatorSettings {
    pub enabled: bool,
    pub timeframe: String,
    pub period: u32,
    /// Pumps above this value are already overbought
    pub upper_limit: Decimal,
    /// Dumps below this value are already oversold
    pub lower_limit: Decimal,
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            timeframe: "5m".to_string(),
            period: 14,
            upper_limit: dec!(70),
            lower_limit: dec!(30),
        }
    }
}

/// 24h trend filter; applies to pumps only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFilter {
    pub enabled: bool,
    pub min_growth_pct: Decimal,
}

impl Default for TrendFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            min_growth_pct: dec!(5),
        }
    }
}

/// Which optional lines appear in an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayToggles {
    pub imbalance: bool,
    pub funding: bool,
    pub volume_24h: bool,
    pub listing_date: bool,
    pub hashtag: bool,
}

impl Default for DisplayToggles {
    fn default() -> Self {
        Self {
            imbalance: true,
            funding: true,
            volume_24h: true,
            listing_date: false,
            hashtag: true,
        }
    }
}

impl DisplayToggles {
    pub fn none() -> Self {
        Self {
            imbalance: false,
            funding: false,
            volume_24h: false,
            listing_date: false,
            hashtag: false,
        }
    }
}

/// Per-user screener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub user_id: UserId,
    /// Never empty
    pub exchanges: BTreeSet<ExchangeId>,
    /// Lookback in minutes
    pub interval_mins: u32,
    /// Minimum absolute change in percent
    pub threshold_pct: Decimal,
    pub signal_type: SignalType,
    pub oscillator: OscillatorSettings,
    pub trend_filter: TrendFilter,
    pub display: DisplayToggles,
}

impl UserConfig {
    pub const INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=120;
    pub const PERIOD_RANGE: std::ops::RangeInclusive<u32> = 2..=100;

    /// Default settings for a newly registered user
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            exchanges: BTreeSet::from([ExchangeId::Binance]),
            interval_mins: 5,
            threshold_pct: dec!(3),
            signal_type: SignalType::Both,
            oscillator: OscillatorSettings::default(),
            trend_filter: TrendFilter::default(),
            display: DisplayToggles::default(),
        }
    }

    pub fn subscribes_to(&self, exchange: ExchangeId) -> bool {
        self.exchanges.contains(&exchange)
    }

    pub fn subscribe(&mut self, exchange: ExchangeId) {
        self.exchanges.insert(exchange);
    }

    /// Removes an exchange; the last remaining one cannot be removed.
    pub fn unsubscribe(&mut self, exchange: ExchangeId) -> Result<()> {
        if self.exchanges.len() == 1 && self.subscribes_to(exchange) {
            return Err(ScreenerError::InvalidSetting(
                "at least one exchange must stay subscribed".to_string(),
            ));
        }
        self.exchanges.remove(&exchange);
        Ok(())
    }

    /// Range checks applied before a config is accepted into the store
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ScreenerError::InvalidSetting(msg));

        if self.exchanges.is_empty() {
            return invalid("exchange set is empty".to_string());
        }
        if !Self::INTERVAL_RANGE.contains(&self.interval_mins) {
            return invalid(format!("interval {} outside 1..=120", self.interval_mins));
        }
        if self.threshold_pct < dec!(0.1) || self.threshold_pct > dec!(100) {
            return invalid(format!("threshold {} outside 0.1..=100", self.threshold_pct));
        }

        let osc = &self.oscillator;
        if !Self::PERIOD_RANGE.contains(&osc.period) {
            return invalid(format!("oscillator period {} outside 2..=100", osc.period));
        }
        if !OSCILLATOR_TIMEFRAMES.contains(&osc.timeframe.as_str()) {
            return invalid(format!("unsupported timeframe {}", osc.timeframe));
        }
        let limit_range = Decimal::ZERO..=dec!(100);
        if !limit_range.contains(&osc.upper_limit) || !limit_range.contains(&osc.lower_limit) {
            return invalid("oscillator limits must be within 0..=100".to_string());
        }
        if osc.lower_limit > osc.upper_limit {
            return invalid(format!(
                "oscillator lower limit {} above upper limit {}",
                osc.lower_limit, osc.upper_limit
            ));
        }

        let growth = self.trend_filter.min_growth_pct;
        if growth < dec!(-100) || growth > dec!(1000) {
            return invalid(format!("minimum 24h growth {} outside -100..=1000", growth));
        }

        Ok(())
    }
}

/// Partial edit of a user's settings; unset fields stay as they are
#[derive(Debug, Clone, Default, PartialEq, clap::Args)]
pub struct SettingsUpdate {
    /// Subscribe to an exchange (repeatable)
    #[arg(long)]
    pub subscribe: Vec<ExchangeId>,
    /// Unsubscribe from an exchange (repeatable)
    #[arg(long)]
    pub unsubscribe: Vec<ExchangeId>,
    /// Lookback in minutes (1-120)
    #[arg(long)]
    pub interval: Option<u32>,
    /// Minimum change in percent
    #[arg(long)]
    pub threshold: Option<Decimal>,
    /// BOTH, PUMP or DUMP
    #[arg(long)]
    pub signal: Option<SignalType>,
    #[arg(long)]
    pub oscillator: Option<bool>,
    #[arg(long)]
    pub oscillator_timeframe: Option<String>,
    #[arg(long)]
    pub oscillator_period: Option<u32>,
    #[arg(long)]
    pub oscillator_upper: Option<Decimal>,
    #[arg(long)]
    pub oscillator_lower: Option<Decimal>,
    /// Require 24h growth before sending pumps
    #[arg(long)]
    pub trend_filter: Option<bool>,
    #[arg(long, allow_negative_numbers = true)]
    pub min_growth: Option<Decimal>,
    #[arg(long)]
    pub show_imbalance: Option<bool>,
    #[arg(long)]
    pub show_funding: Option<bool>,
    #[arg(long)]
    pub show_volume: Option<bool>,
    #[arg(long)]
    pub show_listing_date: Option<bool>,
    #[arg(long)]
    pub show_hashtag: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply onto `config`. Nothing changes unless the result validates.
    pub fn apply(&self, config: &mut UserConfig) -> Result<()> {
        let mut next = config.clone();

        for exchange in &self.subscribe {
            next.subscribe(*exchange);
        }
        for exchange in &self.unsubscribe {
            next.unsubscribe(*exchange)?;
        }

        set(&mut next.interval_mins, self.interval);
        set(&mut next.threshold_pct, self.threshold);
        set(&mut next.signal_type, self.signal);

        let osc = &mut next.oscillator;
        set(&mut osc.enabled, self.oscillator);
        set(&mut osc.timeframe, self.oscillator_timeframe.clone());
        set(&mut osc.period, self.oscillator_period);
        set(&mut osc.upper_limit, self.oscillator_upper);
        set(&mut osc.lower_limit, self.oscillator_lower);

        set(&mut next.trend_filter.enabled, self.trend_filter);
        set(&mut next.trend_filter.min_growth_pct, self.min_growth);

        let display = &mut next.display;
        set(&mut display.imbalance, self.show_imbalance);
        set(&mut display.funding, self.show_funding);
        set(&mut display.volume_24h, self.show_volume);
        set(&mut display.listing_date, self.show_listing_date);
        set(&mut display.hashtag, self.show_hashtag);

        next.validate()?;
        *config = next;
        Ok(())
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Raw windowed move for one (exchange, symbol, interval)
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMove {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub interval_mins: u32,
    pub current_price: Decimal,
    pub historical_price: Decimal,
    pub matched_at: DateTime<Utc>,
    pub change_pct: Decimal,
}

/// A move that passed one user's filters and awaits enrichment
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user: Arc<UserConfig>,
    pub exchange: ExchangeId,
    pub symbol: String,
    pub current_price: Decimal,
    pub historical_price: Decimal,
    pub change_pct: Decimal,
    pub interval_mins: u32,
}

impl Candidate {
    pub fn from_move(user: Arc<UserConfig>, mv: &PriceMove) -> Self {
        Self {
            user,
            exchange: mv.exchange,
            symbol: mv.symbol.clone(),
            current_price: mv.current_price,
            historical_price: mv.historical_price,
            change_pct: mv.change_pct,
            interval_mins: mv.interval_mins,
        }
    }

    pub fn direction(&self) -> MoveDirection {
        MoveDirection::of(self.change_pct)
    }
}
