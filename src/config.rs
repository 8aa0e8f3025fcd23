//! Configuration management

use crate::types::ExchangeId;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub scanner: ScannerConfig,
    pub exchanges: ExchangesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token; empty disables delivery
    pub bot_token: String,
    /// Bot API base URL
    pub api_url: String,
    /// Per-message delivery timeout
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Target time between cycle starts
    pub cadence_secs: u64,
    /// Minimum sleep between cycles, even when a cycle overruns
    pub min_sleep_secs: u64,
    /// How long price samples stay in the buffer
    pub retention_mins: i64,
    /// Maximum distance between the lookback target and the matched sample
    pub match_tolerance_secs: i64,
    /// Only contracts quoted in this asset are tracked
    pub quote_asset: String,
    /// How often the status line is logged
    pub status_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangesConfig {
    /// Exchanges polled every cycle
    pub enabled: Vec<ExchangeId>,
    /// Upper bound for a single adapter call
    pub request_timeout_secs: u64,
    /// Concurrent in-flight calls allowed per exchange
    pub max_concurrent_requests: usize,
    /// Order book levels summed for the imbalance
    pub order_book_depth: usize,
    /// Extra candles fetched on top of the oscillator period
    pub candle_margin: usize,
    pub binance_url: Option<String>,
    pub bybit_url: Option<String>,
    pub mexc_url: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "screener.db".to_string(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 5,
            min_sleep_secs: 1,
            retention_mins: 130,
            match_tolerance_secs: 60,
            quote_asset: "USDT".to_string(),
            status_interval_secs: 60,
        }
    }
}

impl Default for ExchangesConfig {
    fn default() -> Self {
        Self {
            enabled: ExchangeId::ALL.to_vec(),
            request_timeout_secs: 30,
            max_concurrent_requests: 4,
            order_book_depth: 5,
            candle_margin: 6,
            binance_url: None,
            bybit_url: None,
            mexc_url: None,
        }
    }
}

impl ScannerConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }

    pub fn min_sleep(&self) -> Duration {
        Duration::from_secs(self.min_sleep_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retention_mins)
    }

    pub fn match_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.match_tolerance_secs)
    }
}

impl ExchangesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file, overlaid with `SCREENER__*` environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8: {}", path.display()))?;

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path_str).required(false))
            .add_source(
                config::Environment::with_prefix("SCREENER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("exchanges.enabled"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;

        if config.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("BOT_TOKEN") {
                config.telegram.bot_token = token;
            }
        }
        config.database.path = shellexpand::tilde(&config.database.path).into_owned();

        config.validate()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "~/.config/futures-screener/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        tracing::warn!("No configuration file found, using defaults and environment");
        Self::load("config.toml")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exchanges.enabled.is_empty() {
            anyhow::bail!("exchanges.enabled must list at least one exchange");
        }
        if self.exchanges.max_concurrent_requests == 0 {
            anyhow::bail!("exchanges.max_concurrent_requests must be positive");
        }
        if self.telegram.request_timeout_secs == 0 {
            anyhow::bail!("telegram.request_timeout_secs must be positive");
        }
        if self.scanner.cadence_secs == 0 {
            anyhow::bail!("scanner.cadence_secs must be positive");
        }
        if self.scanner.retention_mins <= 120 {
            anyhow::bail!("scanner.retention_mins must exceed the longest lookback (120)");
        }
        Ok(())
    }
}
