//! Tests for domain types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_id_parse_and_display() {
        assert_eq!("Binance".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
        assert_eq!(" mexc ".parse::<ExchangeId>().unwrap(), ExchangeId::Mexc);
        assert_eq!(ExchangeId::Bybit.to_string(), "bybit");
        assert!("kraken".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn test_exchange_id_serialization() {
        assert_eq!(serde_json::to_string(&ExchangeId::Bybit).unwrap(), "\"bybit\"");
    }

    #[test]
    fn test_signal_type_admits() {
        assert!(SignalType::Both.admits(dec!(-1)));
        assert!(SignalType::Both.admits(dec!(1)));
        assert!(SignalType::Pump.admits(dec!(0.01)));
        assert!(!SignalType::Pump.admits(Decimal::ZERO));
        assert!(!SignalType::Pump.admits(dec!(-3)));
        assert!(SignalType::Dump.admits(dec!(-0.01)));
        assert!(!SignalType::Dump.admits(Decimal::ZERO));
    }

    #[test]
    fn test_signal_type_parse() {
        assert_eq!("pump".parse::<SignalType>().unwrap(), SignalType::Pump);
        assert!("SIDEWAYS".parse::<SignalType>().is_err());
        assert_eq!(serde_json::to_string(&SignalType::Dump).unwrap(), "\"DUMP\"");
    }

    #[test]
    fn test_default_user_config_is_valid() {
        let user = UserConfig::new(42);
        assert!(user.validate().is_ok());
        assert_eq!(user.interval_mins, 5);
        assert_eq!(user.threshold_pct, dec!(3));
        assert!(user.subscribes_to(ExchangeId::Binance));
        assert!(!user.oscillator.enabled);
    }

    #[test]
    fn test_unsubscribe_last_exchange_refused() {
        let mut user = UserConfig::new(1);
        assert!(user.unsubscribe(ExchangeId::Binance).is_err());
        assert_eq!(user.exchanges.len(), 1);

        user.subscribe(ExchangeId::Bybit);
        assert!(user.unsubscribe(ExchangeId::Binance).is_ok());
        assert!(!user.subscribes_to(ExchangeId::Binance));
        assert!(user.subscribes_to(ExchangeId::Bybit));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut user = UserConfig::new(1);
        user.interval_mins = 0;
        assert!(user.validate().is_err());

        let mut user = UserConfig::new(1);
        user.interval_mins = 121;
        assert!(user.validate().is_err());

        let mut user = UserConfig::new(1);
        user.threshold_pct = dec!(0.05);
        assert!(user.validate().is_err());

        let mut user = UserConfig::new(1);
        user.oscillator.timeframe = "7m".to_string();
        assert!(user.validate().is_err());

        let mut user = UserConfig::new(1);
        user.oscillator.lower_limit = dec!(80);
        assert!(user.validate().is_err());

        let mut user = UserConfig::new(1);
        user.exchanges.clear();
        assert!(user.validate().is_err());
    }

    #[derive(clap::Parser)]
    struct Edit {
        #[command(flatten)]
        update: SettingsUpdate,
    }

    fn parse_update(args: &[&str]) -> SettingsUpdate {
        use clap::Parser;
        let argv = std::iter::once("edit").chain(args.iter().copied());
        Edit::try_parse_from(argv).unwrap().update
    }

    #[test]
    fn test_settings_update_from_args() {
        let update = parse_update(&[
            "--subscribe", "mexc",
            "--interval", "15",
            "--threshold", "2.5",
            "--signal", "pump",
            "--oscillator", "true",
            "--oscillator-timeframe", "3m",
            "--show-funding", "false",
        ]);

        let mut config = UserConfig::new(1);
        update.apply(&mut config).unwrap();

        assert!(config.subscribes_to(ExchangeId::Binance));
        assert!(config.subscribes_to(ExchangeId::Mexc));
        assert_eq!(config.interval_mins, 15);
        assert_eq!(config.threshold_pct, dec!(2.5));
        assert_eq!(config.signal_type, SignalType::Pump);
        assert!(config.oscillator.enabled);
        assert_eq!(config.oscillator.timeframe, "3m");
        assert!(!config.display.funding);
        // untouched fields keep their values
        assert_eq!(config.oscillator.period, 14);
        assert!(config.display.imbalance);
    }

    #[test]
    fn test_empty_settings_update() {
        let update = parse_update(&[]);
        assert!(update.is_empty());

        let mut config = UserConfig::new(1);
        update.apply(&mut config).unwrap();
        assert_eq!(config, UserConfig::new(1));
    }

    #[test]
    fn test_invalid_settings_update_changes_nothing() {
        let mut config = UserConfig::new(1);

        let update = SettingsUpdate {
            interval: Some(30),
            threshold: Some(dec!(0)),
            ..Default::default()
        };
        assert!(update.apply(&mut config).is_err());

        let update = SettingsUpdate {
            oscillator_lower: Some(dec!(80)),
            ..Default::default()
        };
        assert!(update.apply(&mut config).is_err());

        let update = SettingsUpdate {
            unsubscribe: vec![ExchangeId::Binance],
            ..Default::default()
        };
        assert!(update.apply(&mut config).is_err());

        assert_eq!(config, UserConfig::new(1));
    }

    #[test]
    fn test_move_direction() {
        assert_eq!(MoveDirection::of(dec!(2.5)), MoveDirection::Pump);
        assert_eq!(MoveDirection::of(dec!(-2.5)), MoveDirection::Dump);
    }
}
