//! Rolling in-memory price history
//!
//! Holds last-trade prices per exchange and symbol, keyed by sample timestamp,
//! for as long as the retention window allows. The scanner owns one buffer and
//! is the only writer.

pub mod window;


pub use window::WindowMatcher;

use crate::types::ExchangeId;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Time-ordered prices for one (exchange, symbol) pair
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    samples: BTreeMap<DateTime<Utc>, Decimal>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sample; an existing sample at the same timestamp is replaced
    pub fn insert(&mut self, timestamp: DateTime<Utc>, price: Decimal) {
        self.samples.insert(timestamp, price);
    }

    pub fn get(&self, timestamp: &DateTime<Utc>) -> Option<Decimal> {
        self.samples.get(timestamp).copied()
    }

    pub fn latest(&self) -> Option<(DateTime<Utc>, Decimal)> {
        self.samples.last_key_value().map(|(ts, p)| (*ts, *p))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples with `from <= timestamp <= to`, oldest first
    pub fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = (DateTime<Utc>, Decimal)> + '_ {
        self.samples.range(from..=to).map(|(ts, p)| (*ts, *p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, Decimal)> + '_ {
        self.samples.iter().map(|(ts, p)| (*ts, *p))
    }

    /// Drop samples older than `cutoff`; returns how many were removed
    fn retain_from(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.samples.len();
        self.samples = self.samples.split_off(&cutoff);
        before - self.samples.len()
    }
}

/// Buffer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub exchanges: usize,
    pub symbols: usize,
    pub samples: usize,
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eviction {
    pub samples_removed: usize,
    pub symbols_removed: usize,
}

/// Exchange -> symbol -> price series
#[derive(Debug, Default)]
pub struct PriceBuffer {
    series: HashMap<ExchangeId, HashMap<String, PriceSeries>>,
}

impl PriceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a last-trade price. Non-positive prices are ignored; returns whether
    /// the sample was stored.
    pub fn record(
        &mut self,
        exchange: ExchangeId,
        symbol: &str,
        timestamp: DateTime<Utc>,
        price: Decimal,
    ) -> bool {
        if price <= Decimal::ZERO {
            return false;
        }

        let symbols = self.series.entry(exchange).or_default();
        match symbols.get_mut(symbol) {
            Some(series) => series.insert(timestamp, price),
            None => {
                let mut series = PriceSeries::new();
                series.insert(timestamp, price);
                symbols.insert(symbol.to_string(), series);
            }
        }
        true
    }

    pub fn series(&self, exchange: ExchangeId, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(&exchange)?.get(symbol)
    }

    /// All tracked symbols of one exchange
    pub fn symbols(&self, exchange: ExchangeId) -> impl Iterator<Item = (&str, &PriceSeries)> + '_ {
        self.series
            .get(&exchange)
            .into_iter()
            .flat_map(|symbols| symbols.iter().map(|(s, series)| (s.as_str(), series)))
    }

    pub fn exchanges(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.series.keys().copied()
    }

    /// Remove every sample older than `now - retention`; a sample exactly
    /// `retention` old is kept. Symbols left without samples are dropped.
    pub fn evict(&mut self, now: DateTime<Utc>, retention: Duration) -> Eviction {
        let cutoff = now - retention;
        let mut eviction = Eviction::default();

        for symbols in self.series.values_mut() {
            symbols.retain(|_, series| {
                eviction.samples_removed += series.retain_from(cutoff);
                if series.is_empty() {
                    eviction.symbols_removed += 1;
                    false
                } else {
                    true
                }
            });
        }

        eviction
    }

    pub fn stats(&self) -> BufferStats {
        let mut stats = BufferStats {
            exchanges: self.series.len(),
            ..Default::default()
        };
        for symbols in self.series.values() {
            stats.symbols += symbols.len();
            stats.samples += symbols.values().map(PriceSeries::len).sum::<usize>();
        }
        stats
    }
}
