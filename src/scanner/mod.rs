//! Scan scheduler
//!
//! Drives the cycle `fetch -> buffer -> detect -> filter -> enrich/dispatch -> evict`
//! at a fixed cadence until shutdown. The price buffer lives here and nowhere
//! else; enrichment and delivery only read the cycle's snapshots.

pub mod detector;
pub mod filter;


pub use detector::{intervals_by_exchange, percent_change, ChangeDetector};

use crate::alert::{DispatchOutcome, Dispatcher};
use crate::buffer::{Eviction, PriceBuffer, WindowMatcher};
use crate::config::{Config, ScannerConfig};
use crate::exchange::ExchangeHub;
use crate::indicators::{EnrichmentKey, Enricher, Technicals};
use crate::notify::NotificationChannel;
use crate::storage::UserStore;
use crate::types::{Candidate, ExchangeId, Ticker, UserConfig};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

/// Where the scheduler currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Idle,
    Fetching,
    Buffering,
    Detecting,
    Filtering,
    Dispatching,
    Evicting,
    Sleeping,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Counters for one completed cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub users: usize,
    pub tickers: usize,
    pub recorded: usize,
    pub moves: usize,
    pub candidates: usize,
    pub enrichments: usize,
    pub enrichment_failures: usize,
    pub delivered: usize,
    pub suppressed: usize,
    pub delivery_failures: usize,
    pub evicted: Eviction,
}

/// Time to sleep after a cycle that took `elapsed`
pub fn pacing_delay(elapsed: Duration, cadence: Duration, min_sleep: Duration) -> Duration {
    cadence.saturating_sub(elapsed).max(min_sleep)
}

pub struct MarketScanner {
    config: ScannerConfig,
    hub: ExchangeHub,
    store: Arc<dyn UserStore>,
    enricher: Enricher,
    dispatcher: Dispatcher,
    detector: ChangeDetector,
    buffer: PriceBuffer,
    phase: ScanPhase,
    last_status: Option<Instant>,
}

impl MarketScanner {
    pub fn new(
        config: &Config,
        hub: ExchangeHub,
        store: Arc<dyn UserStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let enricher = Enricher::new(
            hub.clone(),
            config.exchanges.order_book_depth,
            config.exchanges.candle_margin,
        );
        let matcher = WindowMatcher::new(config.scanner.match_tolerance());

        Self {
            config: config.scanner.clone(),
            hub,
            store,
            enricher,
            dispatcher: Dispatcher::new(channel),
            detector: ChangeDetector::new(matcher),
            buffer: PriceBuffer::new(),
            phase: ScanPhase::Idle,
            last_status: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn buffer(&self) -> &PriceBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub(crate) fn buffer_mut(&mut self) -> &mut PriceBuffer {
        &mut self.buffer
    }

    fn enter(&mut self, phase: ScanPhase) {
        debug!("[Scanner] {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run until `shutdown` fires. A cycle in flight always completes; the signal
    /// is observed between cycles and while sleeping.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "[Scanner] Starting: exchanges={:?}, cadence={}s, retention={}m",
            self.hub.exchanges(),
            self.config.cadence_secs,
            self.config.retention_mins
        );

        // false once every sender is gone; no shutdown can arrive after that
        let mut listening = true;

        loop {
            if listening {
                match shutdown.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Closed) => {
                        warn!("[Scanner] Shutdown channel closed, running until the process exits");
                        listening = false;
                    }
                    Ok(()) | Err(TryRecvError::Lagged(_)) => {
                        info!("[Scanner] Shutdown requested");
                        break;
                    }
                }
            }

            let started = Instant::now();
            let report = self.run_cycle(Utc::now()).await;
            debug!("[Scanner] Cycle done in {:?}: {:?}", started.elapsed(), report);
            self.log_status(&report);

            self.enter(ScanPhase::Sleeping);
            let delay = pacing_delay(
                started.elapsed(),
                self.config.cadence(),
                self.config.min_sleep(),
            );

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            if listening {
                tokio::select! {
                    _ = &mut sleep => continue,
                    signal = shutdown.recv() => match signal {
                        Err(RecvError::Closed) => {
                            warn!("[Scanner] Shutdown channel closed, running until the process exits");
                            listening = false;
                        }
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            info!("[Scanner] Shutdown during sleep");
                            break;
                        }
                    },
                }
            }
            sleep.await;
        }

        self.phase = ScanPhase::Idle;
        info!("[Scanner] Stopped");
    }

    /// One full scan at `now`
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        self.enter(ScanPhase::Fetching);
        let (users, snapshot) = tokio::join!(self.store.list_active_users(), self.hub.fetch_all_tickers());
        let users: Vec<Arc<UserConfig>> = match users {
            Ok(users) => users.into_iter().map(Arc::new).collect(),
            Err(e) => {
                warn!("[Scanner] Loading users failed: {}", e);
                Vec::new()
            }
        };
        report.users = users.len();

        self.enter(ScanPhase::Buffering);
        let tickers = self.record_snapshot(snapshot, now, &mut report);

        self.enter(ScanPhase::Detecting);
        let wanted = intervals_by_exchange(&users);
        let mut moves = Vec::new();
        for exchange in self.hub.exchanges() {
            if let Some(intervals) = wanted.get(&exchange) {
                moves.extend(self.detector.detect(&self.buffer, exchange, now, intervals));
            }
        }
        report.moves = moves.len();

        self.enter(ScanPhase::Filtering);
        let candidates = filter::fan_out(&users, &moves);
        report.candidates = candidates.len();
        if !candidates.is_empty() {
            debug!(
                "[Scanner] {} moves, {} candidates for {} users",
                moves.len(),
                candidates.len(),
                users.len()
            );
        }

        self.enter(ScanPhase::Dispatching);
        if !candidates.is_empty() {
            self.enrich_and_dispatch(&candidates, &tickers, &mut report).await;
        }

        self.enter(ScanPhase::Evicting);
        report.evicted = self.buffer.evict(now, self.config.retention());

        report
    }

    /// Record every quoted ticker at `now`; returns the snapshot keyed for lookup
    fn record_snapshot(
        &mut self,
        snapshot: Vec<(ExchangeId, Vec<Ticker>)>,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> HashMap<(ExchangeId, String), Ticker> {
        let suffix = format!("/{}", self.config.quote_asset);
        let mut tickers = HashMap::new();

        for (exchange, batch) in snapshot {
            report.tickers += batch.len();
            for ticker in batch {
                if !ticker.symbol.ends_with(&suffix) {
                    continue;
                }
                if self.buffer.record(exchange, &ticker.symbol, now, ticker.last_price) {
                    report.recorded += 1;
                    tickers.insert((exchange, ticker.symbol.clone()), ticker);
                }
            }
        }

        tickers
    }

    async fn enrich_and_dispatch(
        &self,
        candidates: &[Candidate],
        tickers: &HashMap<(ExchangeId, String), Ticker>,
        report: &mut CycleReport,
    ) {
        let mut keys: Vec<EnrichmentKey> = Vec::new();
        for candidate in candidates {
            let key = EnrichmentKey::new(
                candidate.exchange,
                &candidate.symbol,
                &candidate.user.oscillator,
            );
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        report.enrichments = keys.len();

        let results = join_all(keys.iter().map(|key| {
            let ticker = tickers.get(&(key.exchange, key.symbol.clone()));
            self.enricher.enrich(key, ticker)
        }))
        .await;

        let mut technicals: HashMap<EnrichmentKey, Technicals> = HashMap::new();
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(tech) => {
                    technicals.insert(key, tech);
                }
                Err(e) => {
                    report.enrichment_failures += 1;
                    debug!("[Scanner] Dropping {} {}: {}", key.exchange, key.symbol, e);
                }
            }
        }

        let outcomes = join_all(candidates.iter().filter_map(|candidate| {
            let key = EnrichmentKey::new(
                candidate.exchange,
                &candidate.symbol,
                &candidate.user.oscillator,
            );
            let tech = technicals.get(&key)?;
            Some(self.dispatcher.dispatch(candidate, tech))
        }))
        .await;

        for outcome in outcomes {
            match outcome {
                DispatchOutcome::Delivered => report.delivered += 1,
                DispatchOutcome::Suppressed(_) => report.suppressed += 1,
                DispatchOutcome::Failed => report.delivery_failures += 1,
            }
        }
    }

    /// Status line, at most once per status interval
    fn log_status(&mut self, report: &CycleReport) {
        let interval = Duration::from_secs(self.config.status_interval_secs);
        if self.last_status.is_some_and(|at| at.elapsed() < interval) {
            return;
        }
        self.last_status = Some(Instant::now());

        let stats = self.buffer.stats();
        info!(
            "[Scanner] Status: active users={}, tracked symbols={}, samples={}",
            report.users, stats.symbols, stats.samples
        );
    }
}
