//! User settings persistence
//!
//! One flat row per user. The scanner only needs [`UserStore::list_active_users`];
//! the rest of the API serves the CLI and the settings surface.

pub mod memory;

#[cfg(test)]
mod tests;

pub use memory::MemoryUserStore;

use crate::error::{Result, ScreenerError};
use crate::types::{
    DisplayToggles, ExchangeId, OscillatorSettings, SignalType, TrendFilter, UserConfig, UserId,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Read side used by the scanner, once per cycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Snapshot of every active user's settings
    async fn list_active_users(&self) -> Result<Vec<UserConfig>>;
}

/// SQLite-backed user store
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Private in-memory database; a single connection keeps it alive
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 1,
                exchanges TEXT NOT NULL,
                interval_mins INTEGER NOT NULL,
                threshold_pct TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                osc_enabled INTEGER NOT NULL,
                osc_timeframe TEXT NOT NULL,
                osc_period INTEGER NOT NULL,
                osc_upper TEXT NOT NULL,
                osc_lower TEXT NOT NULL,
                trend_enabled INTEGER NOT NULL,
                trend_min_growth TEXT NOT NULL,
                show_imbalance INTEGER NOT NULL,
                show_funding INTEGER NOT NULL,
                show_volume INTEGER NOT NULL,
                show_listing INTEGER NOT NULL,
                show_hashtag INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Settings for `user_id`, if the user exists
    pub async fn get(&self, user_id: UserId) -> Result<Option<UserConfig>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            UserConfig::try_from(r).map_err(|e| ScreenerError::InvalidSetting(e.to_string()))
        })
        .transpose()
    }

    /// Settings for `user_id`, registering the user with defaults first if needed
    pub async fn get_or_create(&self, user_id: UserId) -> Result<UserConfig> {
        if let Some(existing) = self.get(user_id).await? {
            return Ok(existing);
        }

        let config = UserConfig::new(user_id);
        self.save(&config).await?;
        tracing::info!("[Storage] Registered user {}", user_id);
        Ok(config)
    }

    /// Validate and upsert a user's settings. The active flag is left unchanged
    /// for existing users.
    pub async fn save(&self, config: &UserConfig) -> Result<()> {
        config.validate()?;

        let exchanges = serde_json::to_string(&config.exchanges)?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (
                user_id, active, exchanges, interval_mins, threshold_pct, signal_type,
                osc_enabled, osc_timeframe, osc_period, osc_upper, osc_lower,
                trend_enabled, trend_min_growth,
                show_imbalance, show_funding, show_volume, show_listing, show_hashtag,
                created_at, updated_at
            )
            VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
            ON CONFLICT(user_id) DO UPDATE SET
                exchanges = excluded.exchanges,
                interval_mins = excluded.interval_mins,
                threshold_pct = excluded.threshold_pct,
                signal_type = excluded.signal_type,
                osc_enabled = excluded.osc_enabled,
                osc_timeframe = excluded.osc_timeframe,
                osc_period = excluded.osc_period,
                osc_upper = excluded.osc_upper,
                osc_lower = excluded.osc_lower,
                trend_enabled = excluded.trend_enabled,
                trend_min_growth = excluded.trend_min_growth,
                show_imbalance = excluded.show_imbalance,
                show_funding = excluded.show_funding,
                show_volume = excluded.show_volume,
                show_listing = excluded.show_listing,
                show_hashtag = excluded.show_hashtag,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(config.user_id)
        .bind(exchanges)
        .bind(i64::from(config.interval_mins))
        .bind(config.threshold_pct.to_string())
        .bind(config.signal_type.as_str())
        .bind(config.oscillator.enabled)
        .bind(&config.oscillator.timeframe)
        .bind(i64::from(config.oscillator.period))
        .bind(config.oscillator.upper_limit.to_string())
        .bind(config.oscillator.lower_limit.to_string())
        .bind(config.trend_filter.enabled)
        .bind(config.trend_filter.min_growth_pct.to_string())
        .bind(config.display.imbalance)
        .bind(config.display.funding)
        .bind(config.display.volume_24h)
        .bind(config.display.listing_date)
        .bind(config.display.hashtag)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Pause or resume alerts for a user. Returns false for unknown users.
    pub async fn set_active(&self, user_id: UserId, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET active = ?, updated_at = ? WHERE user_id = ?")
            .bind(active)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of registered users, active or not
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn list_active_users(&self) -> Result<Vec<UserConfig>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{SELECT_USER} WHERE active = 1 ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id = row.user_id;
            match UserConfig::try_from(row) {
                Ok(config) => users.push(config),
                Err(e) => warn!("[Storage] Skipping user {} with invalid settings: {}", user_id, e),
            }
        }

        Ok(users)
    }
}

const SELECT_USER: &str = r#"
    SELECT user_id, exchanges, interval_mins, threshold_pct, signal_type,
           osc_enabled, osc_timeframe, osc_period, osc_upper, osc_lower,
           trend_enabled, trend_min_growth,
           show_imbalance, show_funding, show_volume, show_listing, show_hashtag
    FROM users
"#;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    exchanges: String,
    interval_mins: i64,
    threshold_pct: String,
    signal_type: String,
    osc_enabled: bool,
    osc_timeframe: String,
    osc_period: i64,
    osc_upper: String,
    osc_lower: String,
    trend_enabled: bool,
    trend_min_growth: String,
    show_imbalance: bool,
    show_funding: bool,
    show_volume: bool,
    show_listing: bool,
    show_hashtag: bool,
}

impl TryFrom<UserRow> for UserConfig {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> std::result::Result<Self, Self::Error> {
        let exchanges: BTreeSet<ExchangeId> = serde_json::from_str(&row.exchanges)?;
        let signal_type: SignalType = row.signal_type.parse()?;

        let config = UserConfig {
            user_id: row.user_id,
            exchanges,
            interval_mins: u32::try_from(row.interval_mins)?,
            threshold_pct: row.threshold_pct.parse()?,
            signal_type,
            oscillator: OscillatorSettings {
                enabled: row.osc_enabled,
                timeframe: row.osc_timeframe,
                period: u32::try_from(row.osc_period)?,
                upper_limit: row.osc_upper.parse()?,
                lower_limit: row.osc_lower.parse()?,
            },
            trend_filter: TrendFilter {
                enabled: row.trend_enabled,
                min_growth_pct: row.trend_min_growth.parse()?,
            },
            display: DisplayToggles {
                imbalance: row.show_imbalance,
                funding: row.show_funding,
                volume_24h: row.show_volume,
                listing_date: row.show_listing,
                hashtag: row.show_hashtag,
            },
        };

        config.validate()?;
        Ok(config)
    }
}
