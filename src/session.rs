//! Live session controller.
//!
//! Owns the simulation behind the LIVE/PAUSED switch and two independent
//! timer tasks: the tick cadence (agent updater, then series append) and the
//! market refresh, which runs immediately on start and then on its own
//! period regardless of the switch. Both tasks share one cancellation token;
//! teardown, dropping the session, or either task exiting for any reason
//! (including a panic) cancels both.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::decisions::{generate_decisions, Decision};
use crate::market::{Aggregator, MarketDataSource, MarketSnapshot, Token, Trade};
use crate::metrics::Metrics;
use crate::roster::build_roster;
use crate::simulation::{LiveSnapshot, SessionState, Simulation};

const MARKET_STREAM: u64 = 3;
const DECISION_STREAM: u64 = 4;

pub struct LiveSession {
    simulation: Arc<Mutex<Simulation>>,
    aggregator: Arc<Aggregator>,
    live_tx: watch::Sender<bool>,
    decision_rng: Mutex<StdRng>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSession {
    /// Build the simulation and spawn both timers. Must run inside a tokio runtime.
    pub fn start(config: &Config, source: Arc<dyn MarketDataSource>) -> Self {
        let sim_config = &config.simulation;
        let simulation = Simulation::new(
            sim_config,
            build_roster(&config.agents),
            Utc::now().timestamp_millis(),
        );
        let simulation = Arc::new(Mutex::new(simulation));
        let aggregator = Arc::new(Aggregator::new(
            config.aggregator.clone(),
            source,
            sim_config.rng(MARKET_STREAM),
        ));

        let (live_tx, live_rx) = watch::channel(true);
        let cancel = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(run_ticks(
                simulation.clone(),
                live_rx,
                sim_config.tick_interval(),
                cancel.clone(),
            )),
            tokio::spawn(run_refresh(
                aggregator.clone(),
                config.aggregator.refresh_interval(),
                cancel.clone(),
            )),
        ];

        info!(
            tick_ms = sim_config.tick_interval_ms,
            refresh_secs = config.aggregator.refresh_interval_secs,
            "live session started"
        );

        Self {
            simulation,
            aggregator,
            live_tx,
            decision_rng: Mutex::new(sim_config.rng(DECISION_STREAM)),
            cancel,
            tasks,
        }
    }

    /// Flip between LIVE and PAUSED.
    pub async fn toggle(&self) -> SessionState {
        let state = self.simulation.lock().await.toggle();
        self.live_tx.send_replace(state == SessionState::Live);
        state
    }

    pub async fn state(&self) -> SessionState {
        self.simulation.lock().await.state()
    }

    pub async fn live_snapshot(&self) -> LiveSnapshot {
        self.simulation.lock().await.snapshot()
    }

    pub async fn market_snapshot(&self) -> MarketSnapshot {
        self.aggregator.snapshot().await
    }

    /// Manual refresh outside the timer.
    pub async fn refresh_now(&self) -> MarketSnapshot {
        self.aggregator.refresh().await
    }

    pub async fn token_by_address(&self, address: &str) -> Option<Token> {
        self.aggregator.token_by_address(address).await
    }

    pub async fn token_by_symbol(&self, symbol: &str) -> Option<Token> {
        self.aggregator.token_by_symbol(symbol).await
    }

    pub async fn token_price(&self, address: &str) -> Option<Token> {
        self.aggregator.token_price(address).await
    }

    pub async fn live_trades(&self, address: &str, limit: Option<usize>) -> Vec<Trade> {
        self.aggregator.live_trades(address, limit).await
    }

    /// Agent calls on the current top tokens.
    pub async fn decisions(&self) -> Vec<Decision> {
        let agents = self.simulation.lock().await.agents().to_vec();
        let tokens = self.aggregator.snapshot().await.tokens;
        let mut rng = self.decision_rng.lock().await;
        generate_decisions(&agents, &tokens, &mut *rng, Utc::now())
    }

    pub async fn metrics(&self) -> Metrics {
        let sim = self.simulation.lock().await.metrics().clone();
        sim.combined(&self.aggregator.metrics().await)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel both timers and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!("live session stopped");
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_ticks(
    simulation: Arc<Mutex<Simulation>>,
    mut live_rx: watch::Receiver<bool>,
    period: Duration,
    cancel: CancellationToken,
) {
    let _guard = cancel.clone().drop_guard();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if !*live_rx.borrow_and_update() {
            // Paused: no timer runs until the switch flips back
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = live_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    interval.reset();
                    continue;
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = live_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {
                let ticked = simulation.lock().await.tick(Utc::now().timestamp_millis());
                debug!(ticked, "tick");
            }
        }
    }
}

async fn run_refresh(aggregator: Arc<Aggregator>, period: Duration, cancel: CancellationToken) {
    let _guard = cancel.clone().drop_guard();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = aggregator.refresh() => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::OfflineSource;

    fn config() -> Config {
        let mut config = Config::default();
        config.simulation.seed = Some(21);
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_cadence() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        tokio::time::sleep(Duration::from_millis(7000)).await;
        let snap = session.live_snapshot().await;
        assert_eq!(snap.tick_count, 3);
        assert!(snap.is_live);
        assert!(snap.series_window.len() <= 100);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_state() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(session.toggle().await, SessionState::Paused);

        let frozen = session.live_snapshot().await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        let later = session.live_snapshot().await;
        assert_eq!(frozen.agents, later.agents);
        assert_eq!(frozen.series_window, later.series_window);
        assert_eq!(frozen.tick_count, later.tick_count);
        assert!(!later.is_live);

        assert_eq!(session.toggle().await, SessionState::Live);
        tokio::time::sleep(Duration::from_millis(4500)).await;
        let resumed = session.live_snapshot().await;
        assert_eq!(resumed.tick_count, frozen.tick_count + 2);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_runs_immediately_and_while_paused() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        session.toggle().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let first = session.market_snapshot().await;
        assert_eq!(first.tokens.len(), 5);
        assert!(first.error.is_some());

        tokio::time::sleep(Duration::from_secs(31)).await;
        let metrics = session.metrics().await;
        assert_eq!(metrics.refreshes_total, 2);
        assert_eq!(metrics.ticks_total, 0);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_mutation_after_shutdown() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        let simulation = session.simulation.clone();
        let aggregator = session.aggregator.clone();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.shutdown().await;

        let ticks = simulation.lock().await.metrics().ticks_total;
        let refreshes = aggregator.metrics().await.refreshes_total;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(simulation.lock().await.metrics().ticks_total, ticks);
        assert_eq!(aggregator.metrics().await.refreshes_total, refreshes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        let simulation = session.simulation.clone();
        let cancel = session.cancel.clone();
        drop(session);
        assert!(cancel.is_cancelled());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(simulation.lock().await.metrics().ticks_total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decisions_use_market_tokens() {
        let session = LiveSession::start(&config(), Arc::new(OfflineSource));
        session.refresh_now().await;
        let decisions = session.decisions().await;
        assert_eq!(decisions.len(), 21);
        assert!(session.is_running());
        session.shutdown().await;
    }
}
