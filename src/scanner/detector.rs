//! Windowed change detection over the price buffer

use crate::buffer::{PriceBuffer, WindowMatcher};
use crate::types::{ExchangeId, PriceMove, UserConfig};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Percent change from `historical` to `current`; `None` for a zero base
pub fn percent_change(current: Decimal, historical: Decimal) -> Option<Decimal> {
    if historical.is_zero() {
        return None;
    }
    Some((current - historical) / historical * Decimal::ONE_HUNDRED)
}

/// Distinct lookback intervals wanted per exchange, ascending
pub fn intervals_by_exchange(users: &[Arc<UserConfig>]) -> HashMap<ExchangeId, BTreeSet<u32>> {
    let mut wanted: HashMap<ExchangeId, BTreeSet<u32>> = HashMap::new();
    for user in users {
        for exchange in &user.exchanges {
            wanted.entry(*exchange).or_default().insert(user.interval_mins);
        }
    }
    wanted
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    matcher: WindowMatcher,
}

impl ChangeDetector {
    pub fn new(matcher: WindowMatcher) -> Self {
        Self { matcher }
    }

    /// Raw moves for every symbol of `exchange` sampled at `now`, one per
    /// matched interval. The sample at `now` itself never serves as history.
    pub fn detect(
        &self,
        buffer: &PriceBuffer,
        exchange: ExchangeId,
        now: DateTime<Utc>,
        intervals: &BTreeSet<u32>,
    ) -> Vec<PriceMove> {
        let mut moves = Vec::new();
        if intervals.is_empty() {
            return moves;
        }

        for (symbol, series) in buffer.symbols(exchange) {
            let Some(current) = series.get(&now) else {
                continue;
            };

            for &mins in intervals {
                let lookback = Duration::minutes(i64::from(mins));
                let Some(found) = self
                    .matcher
                    .find(series, now, lookback)
                    .filter(|m| m.timestamp < now)
                else {
                    continue;
                };

                if let Some(change_pct) = percent_change(current, found.price) {
                    moves.push(PriceMove {
                        exchange,
                        symbol: symbol.to_string(),
                        interval_mins: mins,
                        current_price: current,
                        historical_price: found.price,
                        matched_at: found.timestamp,
                        change_pct,
                    });
                }
            }
        }

        moves
    }
}
