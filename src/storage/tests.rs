//! Tests for storage module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::types::{ExchangeId, SettingsUpdate, SignalType, UserConfig};
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    fn custom_user(user_id: i64) -> UserConfig {
        let mut config = UserConfig::new(user_id);
        config.subscribe(ExchangeId::Mexc);
        config.interval_mins = 15;
        config.threshold_pct = dec!(7.5);
        config.signal_type = SignalType::Dump;
        config.oscillator.enabled = true;
        config.oscillator.timeframe = "1h".to_string();
        config.oscillator.period = 21;
        config.oscillator.upper_limit = dec!(80);
        config.oscillator.lower_limit = dec!(20);
        config.trend_filter.enabled = true;
        config.trend_filter.min_growth_pct = dec!(-12.5);
        config.display.funding = false;
        config.display.listing_date = true;
        config
    }

    #[tokio::test]
    async fn test_get_or_create_registers_defaults() {
        let store = SqliteUserStore::in_memory().await.unwrap();

        let created = store.get_or_create(1001).await.unwrap();
        assert_eq!(created, UserConfig::new(1001));
        assert_eq!(store.count().await.unwrap(), 1);

        // Second call reads the stored row
        let again = store.get_or_create(1001).await.unwrap();
        assert_eq!(again, created);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_persists_every_setting() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        let config = custom_user(7);

        assert_ok!(store.save(&config).await);
        let loaded = store.get(7).await.unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        let mut config = store.get_or_create(5).await.unwrap();

        config.threshold_pct = dec!(12);
        store.save(&config).await.unwrap();

        assert_eq!(store.get(5).await.unwrap().unwrap().threshold_pct, dec!(12));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_settings() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        let mut config = UserConfig::new(9);
        config.interval_mins = 500;

        assert_err!(store.save(&config).await);
        assert!(store.get(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_users_skips_inactive() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        store.get_or_create(1).await.unwrap();
        store.get_or_create(2).await.unwrap();
        store.get_or_create(3).await.unwrap();

        assert!(store.set_active(2, false).await.unwrap());
        assert!(!store.set_active(99, false).await.unwrap());

        let ids: Vec<i64> = store
            .list_active_users()
            .await
            .unwrap()
            .iter()
            .map(|u| u.user_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_settings_update_while_paused() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        let mut user = store.get_or_create(5).await.unwrap();
        assert!(store.set_active(5, false).await.unwrap());

        let update = SettingsUpdate {
            subscribe: vec![ExchangeId::Bybit],
            threshold: Some(dec!(4)),
            signal: Some(SignalType::Pump),
            ..Default::default()
        };
        assert_ok!(update.apply(&mut user));
        assert_ok!(store.save(&user).await);

        // still paused after the edit
        assert!(store.list_active_users().await.unwrap().is_empty());
        assert_eq!(store.get(5).await.unwrap(), Some(user.clone()));

        assert!(store.set_active(5, true).await.unwrap());
        assert_eq!(store.list_active_users().await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn test_list_active_users_skips_corrupt_rows() {
        let store = SqliteUserStore::in_memory().await.unwrap();
        store.get_or_create(1).await.unwrap();
        store.get_or_create(2).await.unwrap();

        sqlx::query("UPDATE users SET signal_type = 'SIDEWAYS' WHERE user_id = 2")
            .execute(&store.pool)
            .await
            .unwrap();

        let users = store.list_active_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, 1);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryUserStore::with_users([UserConfig::new(1), custom_user(2)]).unwrap();
        assert_eq!(store.len(), 2);

        store.set_active(1, false);
        let active = store.list_active_users().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, 2);

        // Re-saving keeps the user paused
        store.save(UserConfig::new(1)).unwrap();
        assert_eq!(store.list_active_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_validates() {
        let mut config = UserConfig::new(3);
        config.exchanges.clear();
        assert!(MemoryUserStore::new().save(config).is_err());
    }

    #[tokio::test]
    async fn test_mock_store() {
        let mut store = MockUserStore::new();
        store
            .expect_list_active_users()
            .returning(|| Ok(vec![UserConfig::new(11)]));

        let users = store.list_active_users().await.unwrap();
        assert_eq!(users[0].user_id, 11);
    }
}
