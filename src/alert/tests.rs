//! Tests for alert evaluation and formatting

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::notify::MockNotificationChannel;
    use crate::error::ScreenerError;
    use crate::types::{DisplayToggles, ExchangeId, SignalType, UserConfig};
    use rust_decimal_macros::dec;

    fn user() -> UserConfig {
        let mut config = UserConfig::new(42);
        config.interval_mins = 5;
        config.threshold_pct = dec!(2);
        config.display = DisplayToggles::none();
        config
    }

    fn candidate(config: UserConfig, old: Decimal, new: Decimal) -> Candidate {
        Candidate {
            user: Arc::new(config),
            exchange: ExchangeId::Binance,
            symbol: "BTC/USDT".to_string(),
            current_price: new,
            historical_price: old,
            change_pct: (new - old) / old * dec!(100),
            interval_mins: 5,
        }
    }

    fn tech(oscillator: Decimal) -> Technicals {
        Technicals {
            oscillator,
            funding_rate: Some(dec!(0.0001)),
            imbalance_pct: Some(dec!(50)),
            volume_24h: Some(dec!(12345678)),
            change_24h_pct: Some(dec!(4.5)),
        }
    }

    #[test]
    fn test_evaluate_passes_plain_pump() {
        let c = candidate(user(), dec!(100), dec!(103));
        assert_eq!(evaluate(&c, &tech(dec!(50))), Verdict::Send);
    }

    #[test]
    fn test_evaluate_threshold_boundary() {
        let mut config = user();
        config.threshold_pct = dec!(3);
        let c = candidate(config.clone(), dec!(100), dec!(103));
        assert_eq!(evaluate(&c, &tech(dec!(50))), Verdict::Send);

        config.threshold_pct = dec!(5);
        let c = candidate(config, dec!(100), dec!(103));
        assert_eq!(
            evaluate(&c, &tech(dec!(50))),
            Verdict::Suppress(SuppressReason::BelowThreshold)
        );
    }

    #[test]
    fn test_evaluate_rechecks_subscription_and_direction() {
        let mut config = user();
        config.exchanges = [ExchangeId::Bybit].into_iter().collect();
        let c = candidate(config, dec!(100), dec!(103));
        assert_eq!(
            evaluate(&c, &tech(dec!(50))),
            Verdict::Suppress(SuppressReason::NotSubscribed)
        );

        let mut config = user();
        config.signal_type = SignalType::Pump;
        let c = candidate(config, dec!(100), dec!(95));
        assert_eq!(
            evaluate(&c, &tech(dec!(50))),
            Verdict::Suppress(SuppressReason::DirectionMismatch)
        );
    }

    #[test]
    fn test_evaluate_oscillator_limits() {
        let mut config = user();
        config.oscillator.enabled = true;
        config.oscillator.upper_limit = dec!(70);
        config.oscillator.lower_limit = dec!(30);

        let pump = candidate(config.clone(), dec!(100), dec!(104));
        assert_eq!(
            evaluate(&pump, &tech(dec!(75))),
            Verdict::Suppress(SuppressReason::Overbought)
        );
        assert_eq!(evaluate(&pump, &tech(dec!(70))), Verdict::Send);

        let dump = candidate(config, dec!(100), dec!(96));
        assert_eq!(
            evaluate(&dump, &tech(dec!(25))),
            Verdict::Suppress(SuppressReason::Oversold)
        );
        // A high reading never blocks a dump
        assert_eq!(evaluate(&dump, &tech(dec!(90))), Verdict::Send);
    }

    #[test]
    fn test_evaluate_trend_filter_only_checks_pumps() {
        let mut config = user();
        config.trend_filter.enabled = true;
        config.trend_filter.min_growth_pct = dec!(5);

        let pump = candidate(config.clone(), dec!(100), dec!(103));
        assert_eq!(
            evaluate(&pump, &tech(dec!(50))),
            Verdict::Suppress(SuppressReason::WeakTrend)
        );

        let mut strong = tech(dec!(50));
        strong.change_24h_pct = Some(dec!(5));
        assert_eq!(evaluate(&pump, &strong), Verdict::Send);

        let dump = candidate(config, dec!(100), dec!(97));
        assert_eq!(evaluate(&dump, &tech(dec!(50))), Verdict::Send);
    }

    #[test]
    fn test_evaluate_missing_24h_change_counts_as_zero() {
        let mut config = user();
        config.trend_filter.enabled = true;
        config.trend_filter.min_growth_pct = dec!(-1);

        let mut missing = tech(dec!(50));
        missing.change_24h_pct = None;
        let pump = candidate(config.clone(), dec!(100), dec!(103));
        assert_eq!(evaluate(&pump, &missing), Verdict::Send);

        config.trend_filter.min_growth_pct = dec!(0.5);
        let pump = candidate(config, dec!(100), dec!(103));
        assert_eq!(
            evaluate(&pump, &missing),
            Verdict::Suppress(SuppressReason::WeakTrend)
        );
    }

    #[test]
    fn test_compose_without_technical_lines() {
        let c = candidate(user(), dec!(100), dec!(103));
        let text = compose(&c, &tech(dec!(50)), 77);

        assert!(text.starts_with("⚡️ <b>BTC</b> | BINANCE Futures"));
        assert!(text.contains("PRICE UP: +3.00%</b> (5 min)"));
        assert!(text.contains("<code>100</code> ➔ <code>103</code>"));
        assert!(!text.contains("RSI"));
        assert!(!text.contains("Funding"));
        assert!(!text.contains("volume"));
        assert!(text.ends_with("📡 ID: 77"));
        assert_eq!(text.matches(SEPARATOR).count(), 1);
    }

    #[test]
    fn test_compose_with_every_line() {
        let mut config = user();
        config.display = DisplayToggles::default();
        config.oscillator.enabled = true;
        let c = candidate(config, dec!(100), dec!(95));
        let text = compose(&c, &tech(dec!(25)), 1);

        assert!(text.starts_with("🔻 <b>#BTC</b>"));
        assert!(text.contains("PRICE DOWN: -5.00%"));
        assert!(text.contains("RSI (5m): <b>25.0</b> (Oversold)"));
        assert!(text.contains("24h volume: <b>$12.3M</b> (+4.5%)"));
        assert!(text.contains("Buyers +50.0%"));
        assert!(text.contains("Funding: 0.0100%"));
        assert_eq!(text.matches(SEPARATOR).count(), 2);
    }

    #[test]
    fn test_compose_degraded_technicals() {
        let mut config = user();
        config.display.funding = true;
        config.display.imbalance = true;
        let c = candidate(config, dec!(100), dec!(103));
        let degraded = Technicals {
            oscillator: dec!(50),
            funding_rate: None,
            imbalance_pct: None,
            volume_24h: None,
            change_24h_pct: None,
        };
        let text = compose(&c, &degraded, 1);

        assert!(text.contains("Funding: 0%"));
        assert!(!text.contains("Order book"));
    }

    #[test]
    fn test_compose_sell_side_imbalance() {
        let mut config = user();
        config.display.imbalance = true;
        let c = candidate(config, dec!(100), dec!(103));
        let mut t = tech(dec!(50));
        t.imbalance_pct = Some(dec!(-33.33));
        assert!(compose(&c, &t, 1).contains("🔴 Sellers +33.3%"));
    }

    #[tokio::test]
    async fn test_dispatch_delivers() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_send()
            .withf(|user, text| *user == 42 && text.contains("+3.00%"))
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = Dispatcher::new(Arc::new(channel));
        let c = candidate(user(), dec!(100), dec!(103));
        assert_eq!(
            dispatcher.dispatch(&c, &tech(dec!(50))).await,
            DispatchOutcome::Delivered
        );
    }

    #[tokio::test]
    async fn test_dispatch_suppressed_never_sends() {
        let mut channel = MockNotificationChannel::new();
        channel.expect_send().never();

        let mut config = user();
        config.threshold_pct = dec!(5);
        let dispatcher = Dispatcher::new(Arc::new(channel));
        let c = candidate(config, dec!(100), dec!(103));
        assert_eq!(
            dispatcher.dispatch(&c, &tech(dec!(50))).await,
            DispatchOutcome::Suppressed(SuppressReason::BelowThreshold)
        );
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_reported() {
        let mut channel = MockNotificationChannel::new();
        channel
            .expect_send()
            .returning(|_, _| Err(ScreenerError::Delivery("bot blocked".to_string())));

        let dispatcher = Dispatcher::new(Arc::new(channel));
        let c = candidate(user(), dec!(100), dec!(103));
        assert_eq!(
            dispatcher.dispatch(&c, &tech(dec!(50))).await,
            DispatchOutcome::Failed
        );
    }

    #[test]
    fn test_alert_ids_are_unique() {
        let dispatcher = Dispatcher::new(Arc::new(MockNotificationChannel::new()));
        let first = dispatcher.next_alert_id();
        assert_eq!(dispatcher.next_alert_id(), first + 1);
    }
}
