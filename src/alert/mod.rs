//! Alert evaluation, formatting and delivery
//!
//! A candidate that survived the tenant filter is checked once more against the
//! user's settings, then against the trend and oscillator filters that need
//! [`Technicals`]. Survivors are rendered as Telegram HTML and handed to the
//! notification channel.

#[cfg(test)]
mod tests;

use crate::indicators::Technicals;
use crate::notify::NotificationChannel;
use crate::types::{Candidate, MoveDirection};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

const SEPARATOR: &str = "───────────────────";

/// Why a candidate did not become an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NotSubscribed,
    WrongInterval,
    BelowThreshold,
    DirectionMismatch,
    /// Pump without enough 24h growth
    WeakTrend,
    /// Pump with the oscillator above the upper limit
    Overbought,
    /// Dump with the oscillator below the lower limit
    Oversold,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotSubscribed => "exchange not subscribed",
            Self::WrongInterval => "interval mismatch",
            Self::BelowThreshold => "below threshold",
            Self::DirectionMismatch => "direction filtered",
            Self::WeakTrend => "24h trend too weak",
            Self::Overbought => "oscillator above upper limit",
            Self::Oversold => "oscillator below lower limit",
        };
        f.write_str(text)
    }
}

/// Result of the alert checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Send,
    Suppress(SuppressReason),
}

/// Apply every per-user check to an enriched candidate
pub fn evaluate(candidate: &Candidate, tech: &Technicals) -> Verdict {
    let user = &candidate.user;
    let pct = candidate.change_pct;

    if !user.subscribes_to(candidate.exchange) {
        return Verdict::Suppress(SuppressReason::NotSubscribed);
    }
    if user.interval_mins != candidate.interval_mins {
        return Verdict::Suppress(SuppressReason::WrongInterval);
    }
    if pct.abs() < user.threshold_pct {
        return Verdict::Suppress(SuppressReason::BelowThreshold);
    }
    if !user.signal_type.admits(pct) {
        return Verdict::Suppress(SuppressReason::DirectionMismatch);
    }

    let direction = candidate.direction();

    // Dumps are never checked against the 24h trend
    if user.trend_filter.enabled
        && direction == MoveDirection::Pump
        && tech.change_24h_or_zero() < user.trend_filter.min_growth_pct
    {
        return Verdict::Suppress(SuppressReason::WeakTrend);
    }

    if user.oscillator.enabled {
        match direction {
            MoveDirection::Pump if tech.oscillator > user.oscillator.upper_limit => {
                return Verdict::Suppress(SuppressReason::Overbought);
            }
            MoveDirection::Dump if tech.oscillator < user.oscillator.lower_limit => {
                return Verdict::Suppress(SuppressReason::Oversold);
            }
            _ => {}
        }
    }

    Verdict::Send
}

fn oscillator_status(value: Decimal) -> &'static str {
    if value > dec!(70) {
        "Overbought"
    } else if value < dec!(30) {
        "Oversold"
    } else {
        "Neutral"
    }
}

/// `BTC/USDT` -> `BTC`
fn base_asset(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol)
}

/// Render the alert as Telegram HTML
pub fn compose(candidate: &Candidate, tech: &Technicals, alert_id: u64) -> String {
    let user = &candidate.user;
    let display = &user.display;

    let (header_emoji, side_emoji, action) = match candidate.direction() {
        MoveDirection::Pump => ("⚡️", "🟢", "PRICE UP"),
        MoveDirection::Dump => ("🔻", "🔴", "PRICE DOWN"),
    };

    let base = base_asset(&candidate.symbol);
    let pair = if display.hashtag {
        format!("#{}", base)
    } else {
        base.to_string()
    };

    let mut lines = vec![
        format!(
            "{} <b>{}</b> | {} Futures",
            header_emoji,
            pair,
            candidate.exchange.as_str().to_uppercase()
        ),
        format!(
            "{} <b>{}: {:+.2}%</b> ({} min)",
            side_emoji,
            action,
            candidate.change_pct.round_dp(2),
            candidate.interval_mins
        ),
        format!(
            "💵 Price: <code>{}</code> ➔ <code>{}</code>",
            candidate.historical_price.normalize(),
            candidate.current_price.normalize()
        ),
        SEPARATOR.to_string(),
    ];

    let mut tech_lines = Vec::new();
    if user.oscillator.enabled {
        tech_lines.push(format!(
            "📊 RSI ({}): <b>{:.1}</b> ({})",
            user.oscillator.timeframe,
            tech.oscillator,
            oscillator_status(tech.oscillator)
        ));
    }
    if display.volume_24h {
        tech_lines.push(format!(
            "💰 24h volume: <b>{}</b> ({:+.1}%)",
            tech.volume_label(),
            tech.change_24h_or_zero().round_dp(1)
        ));
    }
    if display.imbalance {
        if let Some(imbalance) = tech.imbalance_pct {
            let imbalance = imbalance.round_dp(1);
            let line = if imbalance > Decimal::ZERO {
                format!("🟢 Buyers +{:.1}%", imbalance)
            } else {
                format!("🔴 Sellers +{:.1}%", imbalance.abs())
            };
            tech_lines.push(format!("⚖️ Order book: {}", line));
        }
    }
    if display.funding {
        tech_lines.push(format!("🧩 Funding: {}", tech.funding_label()));
    }

    if !tech_lines.is_empty() {
        lines.extend(tech_lines);
        lines.push(SEPARATOR.to_string());
    }

    lines.push(format!("📡 ID: {}", alert_id));
    lines.join("\n")
}

/// What happened to one enriched candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Suppressed(SuppressReason),
    Failed,
}

/// Evaluates, composes and delivers alerts
pub struct Dispatcher {
    channel: Arc<dyn NotificationChannel>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        // Seeded from the clock so ids stay unique across restarts
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self {
            channel,
            next_id: AtomicU64::new(seed),
        }
    }

    fn next_alert_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Delivery failures are logged and reported, never propagated
    pub async fn dispatch(&self, candidate: &Candidate, tech: &Technicals) -> DispatchOutcome {
        let user_id = candidate.user.user_id;

        if let Verdict::Suppress(reason) = evaluate(candidate, tech) {
            debug!(
                "[Alert] {} {} {:+.2}% suppressed for {}: {}",
                candidate.exchange, candidate.symbol, candidate.change_pct, user_id, reason
            );
            return DispatchOutcome::Suppressed(reason);
        }

        let text = compose(candidate, tech, self.next_alert_id());
        match self.channel.send(user_id, &text).await {
            Ok(()) => {
                info!(
                    "[Alert] {} {} {:+.2}% in {}m -> user {}",
                    candidate.exchange,
                    candidate.symbol,
                    candidate.change_pct.round_dp(2),
                    candidate.interval_mins,
                    user_id
                );
                DispatchOutcome::Delivered
            }
            Err(e) => {
                error!("[Alert] Delivery to {} failed: {}", user_id, e);
                DispatchOutcome::Failed
            }
        }
    }
}
