//! Nearest-timestamp lookup for a lookback window

use super::PriceSeries;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Historical sample selected for a lookback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    /// Absolute distance between the sample and the lookback target
    pub distance: Duration,
}

/// Finds the sample closest to `now - lookback`, within a fixed tolerance.
///
/// Only samples inside `[target - tolerance, target + tolerance]` are visited,
/// oldest first. A later sample replaces the best one only when it is strictly
/// closer, so on equal distance the earliest timestamp wins.
#[derive(Debug, Clone, Copy)]
pub struct WindowMatcher {
    tolerance: Duration,
}

impl Default for WindowMatcher {
    fn default() -> Self {
        Self::new(Duration::seconds(60))
    }
}

impl WindowMatcher {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    pub fn find(
        &self,
        series: &PriceSeries,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Option<WindowMatch> {
        let target = now - lookback;
        let mut best: Option<WindowMatch> = None;

        for (timestamp, price) in series.range(target - self.tolerance, target + self.tolerance) {
            let distance = (timestamp - target).abs();
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(WindowMatch {
                    timestamp,
                    price,
                    distance,
                });
            }
        }

        best.filter(|m| m.distance <= self.tolerance)
    }
}
