//! Futures pump/dump screener
//!
//! Polls futures tickers across exchanges and alerts subscribed users about
//! sharp price moves.

use clap::{Parser, Subcommand};
use futures_screener::{
    config::Config,
    exchange::ExchangeHub,
    notify::{NotificationChannel, TelegramNotifier},
    scanner::MarketScanner,
    storage::{SqliteUserStore, UserStore},
    types::{ExchangeId, SettingsUpdate, UserConfig, UserId},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "futures-screener")]
#[command(about = "Multi-exchange futures pump/dump screener with per-user alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to ./config.toml or ~/.config/futures-screener/config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the screener
    Run {
        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// List active users and their settings
    Users,
    /// Register a user with default settings
    AddUser {
        /// Telegram user id
        user_id: UserId,
        /// Exchanges to subscribe to (repeatable)
        #[arg(short, long)]
        exchange: Vec<ExchangeId>,
    },
    /// Change a registered user's settings
    Configure {
        user_id: UserId,
        #[command(flatten)]
        update: SettingsUpdate,
    },
    /// Stop sending alerts to a user, keeping their settings
    Pause { user_id: UserId },
    /// Resume alerts for a paused user
    Resume { user_id: UserId },
    /// Show the current ticker snapshot of one exchange
    Tickers {
        exchange: ExchangeId,
        /// Number of tickers to show, largest 24h movers first
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Run { dry_run } => run_screener(config, dry_run).await,
        Commands::Users => show_users(config).await,
        Commands::AddUser { user_id, exchange } => add_user(config, user_id, exchange).await,
        Commands::Configure { user_id, update } => configure_user(config, user_id, update).await,
        Commands::Pause { user_id } => set_active(config, user_id, false).await,
        Commands::Resume { user_id } => set_active(config, user_id, true).await,
        Commands::Tickers { exchange, limit } => show_tickers(config, exchange, limit).await,
    }
}

async fn run_screener(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting futures screener");

    let notifier = if dry_run {
        tracing::warn!("Running in DRY RUN mode - alerts are logged, not sent");
        TelegramNotifier::disabled()
    } else {
        let notifier = TelegramNotifier::from_config(&config.telegram)?;
        if !notifier.is_enabled() {
            anyhow::bail!("telegram.bot_token is not set (use --dry-run to run without it)");
        }
        notifier
    };

    let store = SqliteUserStore::connect(&config.database.path).await?;
    let hub = ExchangeHub::from_config(&config.exchanges)?;
    let channel: Arc<dyn NotificationChannel> = Arc::new(notifier);

    let mut scanner = MarketScanner::new(&config, hub, Arc::new(store), channel);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, finishing current cycle");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                // hold the sender so the scanner keeps running
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    scanner.run(shutdown_rx).await;
    Ok(())
}

async fn show_users(config: Config) -> anyhow::Result<()> {
    let store = SqliteUserStore::connect(&config.database.path).await?;
    let users = store.list_active_users().await?;

    println!("\n👥 Active users: {}\n", users.len());
    println!(
        "{:<14} {:<22} {:>6} {:>8} {:<6} {:<10}",
        "User", "Exchanges", "Mins", "Thresh", "Type", "Oscillator"
    );
    println!("{}", "-".repeat(72));

    for user in users {
        let exchanges: Vec<&str> = user.exchanges.iter().map(|e| e.as_str()).collect();
        let oscillator = if user.oscillator.enabled {
            format!("{} {}", user.oscillator.timeframe, user.oscillator.period)
        } else {
            "off".to_string()
        };
        println!(
            "{:<14} {:<22} {:>6} {:>7}% {:<6} {:<10}",
            user.user_id,
            exchanges.join(","),
            user.interval_mins,
            user.threshold_pct,
            user.signal_type.as_str(),
            oscillator,
        );
    }

    Ok(())
}

async fn add_user(config: Config, user_id: UserId, exchanges: Vec<ExchangeId>) -> anyhow::Result<()> {
    let store = SqliteUserStore::connect(&config.database.path).await?;
    let mut user = store.get_or_create(user_id).await?;

    if !exchanges.is_empty() {
        user.exchanges = exchanges.into_iter().collect();
        store.save(&user).await?;
    }
    store.set_active(user_id, true).await?;

    let subscribed: Vec<&str> = user.exchanges.iter().map(|e| e.as_str()).collect();
    println!("✅ User {} active on {}", user_id, subscribed.join(", "));
    Ok(())
}

async fn configure_user(config: Config, user_id: UserId, update: SettingsUpdate) -> anyhow::Result<()> {
    let store = SqliteUserStore::connect(&config.database.path).await?;
    let Some(mut user) = store.get(user_id).await? else {
        anyhow::bail!("user {} is not registered (use add-user first)", user_id);
    };

    if update.is_empty() {
        print_settings(&user);
        return Ok(());
    }

    update.apply(&mut user)?;
    store.save(&user).await?;
    println!("✅ Settings saved for {}", user_id);
    print_settings(&user);
    Ok(())
}

async fn set_active(config: Config, user_id: UserId, active: bool) -> anyhow::Result<()> {
    let store = SqliteUserStore::connect(&config.database.path).await?;
    if !store.set_active(user_id, active).await? {
        anyhow::bail!("user {} is not registered", user_id);
    }

    if active {
        println!("▶️ Alerts resumed for {}", user_id);
    } else {
        println!("⏸ Alerts paused for {}", user_id);
    }
    Ok(())
}

fn print_settings(user: &UserConfig) {
    let exchanges: Vec<&str> = user.exchanges.iter().map(|e| e.as_str()).collect();
    let osc = &user.oscillator;
    let display = &user.display;

    println!("\n⚙️ Settings for {}\n", user.user_id);
    println!("  Exchanges:    {}", exchanges.join(", "));
    println!("  Interval:     {} min", user.interval_mins);
    println!("  Threshold:    {}%", user.threshold_pct);
    println!("  Signals:      {}", user.signal_type.as_str());
    println!(
        "  Oscillator:   {} ({} x{}, limits {}/{})",
        on_off(osc.enabled),
        osc.timeframe,
        osc.period,
        osc.lower_limit,
        osc.upper_limit
    );
    println!(
        "  24h trend:    {} (min {}%)",
        on_off(user.trend_filter.enabled),
        user.trend_filter.min_growth_pct
    );
    println!(
        "  Display:      imbalance {}, funding {}, volume {}, listing {}, hashtag {}",
        on_off(display.imbalance),
        on_off(display.funding),
        on_off(display.volume_24h),
        on_off(display.listing_date),
        on_off(display.hashtag)
    );
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

async fn show_tickers(config: Config, exchange: ExchangeId, limit: usize) -> anyhow::Result<()> {
    let mut exchanges_config = config.exchanges.clone();
    exchanges_config.enabled = vec![exchange];
    let hub = ExchangeHub::from_config(&exchanges_config)?;

    let suffix = format!("/{}", config.scanner.quote_asset);
    let mut tickers: Vec<_> = hub
        .fetch_tickers(exchange)
        .await?
        .into_iter()
        .filter(|t| t.symbol.ends_with(&suffix))
        .collect();
    tickers.sort_by(|a, b| {
        let a = a.change_24h_pct.unwrap_or_default().abs();
        let b = b.change_24h_pct.unwrap_or_default().abs();
        b.cmp(&a)
    });

    println!("\n📊 {} {} futures (top {} by 24h move):\n", exchange.as_str().to_uppercase(), suffix, limit);
    println!("{:<16} {:>16} {:>10} {:>14}", "Symbol", "Last", "24h", "Volume");
    println!("{}", "-".repeat(60));

    for ticker in tickers.iter().take(limit) {
        println!(
            "{:<16} {:>16} {:>9.2}% {:>13.1}M",
            ticker.symbol,
            ticker.last_price.normalize(),
            ticker.change_24h_pct.unwrap_or_default().round_dp(2),
            (ticker.quote_volume.unwrap_or_default() / rust_decimal::Decimal::from(1_000_000)).round_dp(1),
        );
    }

    Ok(())
}
