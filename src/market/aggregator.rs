//! Best-effort aggregate view of the token catalog.
//!
//! Every refresh resolves each catalog token independently: a good upstream
//! quote is merged over the catalog entry, anything else degrades to a
//! jittered copy of the entry. Trades come from upstream when it has any and
//! are synthesized from the resolved tokens otherwise. The published
//! [`MarketSnapshot`] is never blanked: a failed refresh only sets `error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::source::{merge_quote, parse_trades};
use super::{sort_newest_first, synth, FetchError, MarketDataSource, Token, Trade};
use crate::config::AggregatorConfig;
use crate::metrics::Metrics;

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("token catalog is empty")]
    EmptyCatalog,
    #[error("market data unavailable: {failed} of {total} lookups failed")]
    Unavailable { failed: usize, total: usize },
}

/// Read model for token cards, the trade feed and trending lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub tokens: Vec<Token>,
    pub trades: Vec<Trade>,
    pub trending_tokens: Vec<Token>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    pub fn token_by_address(&self, address: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.address == address)
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}

/// One refresh worth of resolved data
struct Batch {
    tokens: Vec<Token>,
    trades: Vec<Trade>,
    trending: Vec<Token>,
    fallbacks: usize,
    synthesized: bool,
    failure: Option<AggregatorError>,
}

struct State {
    snapshot: MarketSnapshot,
    applied_seq: u64,
}

pub struct Aggregator {
    source: Arc<dyn MarketDataSource>,
    config: AggregatorConfig,
    state: RwLock<State>,
    rng: Mutex<StdRng>,
    issued_seq: AtomicU64,
    metrics: Mutex<Metrics>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, source: Arc<dyn MarketDataSource>, rng: StdRng) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(State {
                snapshot: MarketSnapshot {
                    loading: true,
                    ..MarketSnapshot::default()
                },
                applied_seq: 0,
            }),
            rng: Mutex::new(rng),
            issued_seq: AtomicU64::new(0),
            metrics: Mutex::new(Metrics::new()),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Refresh tokens, trades and trending tokens, then publish.
    ///
    /// Results that complete after a newer refresh was applied are dropped.
    pub async fn refresh(&self) -> MarketSnapshot {
        let seq = self.issued_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().await.snapshot.loading = true;

        let outcome = self.collect().await;

        let mut state = self.state.write().await;
        if seq < state.applied_seq {
            debug!(seq, applied = state.applied_seq, "dropping stale refresh");
            self.metrics.lock().await.record_stale();
            return state.snapshot.clone();
        }
        state.applied_seq = seq;

        let mut metrics = self.metrics.lock().await;
        let snapshot = &mut state.snapshot;
        match outcome {
            Ok(batch) => {
                metrics.record_fallbacks(batch.fallbacks);
                if batch.synthesized {
                    metrics.record_synthesized();
                }
                if let Some(failure) = &batch.failure {
                    warn!(error = %failure, "market refresh degraded to fallback data");
                }
                info!(
                    tokens = batch.tokens.len(),
                    trades = batch.trades.len(),
                    fallbacks = batch.fallbacks,
                    synthesized = batch.synthesized,
                    "market data refreshed"
                );
                if !batch.tokens.is_empty() {
                    snapshot.tokens = batch.tokens;
                    snapshot.trending_tokens = batch.trending;
                }
                if !batch.trades.is_empty() {
                    snapshot.trades = batch.trades;
                }
                snapshot.error = batch.failure.map(|e| e.to_string());
                snapshot.last_refreshed = Some(Utc::now());
            }
            Err(e) => {
                warn!(error = %e, "market refresh failed");
                snapshot.error = Some(e.to_string());
            }
        }
        // An older refresh finishing first must not hide a newer one in flight
        if seq == self.issued_seq.load(Ordering::SeqCst) {
            snapshot.loading = false;
        }
        metrics.record_refresh(snapshot.error.is_some());
        snapshot.clone()
    }

    pub async fn snapshot(&self) -> MarketSnapshot {
        self.state.read().await.snapshot.clone()
    }

    pub async fn token_by_address(&self, address: &str) -> Option<Token> {
        self.state.read().await.snapshot.token_by_address(address).cloned()
    }

    pub async fn token_by_symbol(&self, symbol: &str) -> Option<Token> {
        self.state.read().await.snapshot.token_by_symbol(symbol).cloned()
    }

    /// Fresh single-token lookup with the same fallback rules as `refresh`.
    ///
    /// `None` only for addresses outside the catalog.
    pub async fn token_price(&self, address: &str) -> Option<Token> {
        let entry = self.config.catalog.iter().find(|t| t.address == address)?;
        let quote = self.quote(address).await;
        let mut rng = self.rng.lock().await;
        Some(resolve_token(entry, quote, &mut *rng).0)
    }

    /// Newest synthesized trades for one token, `limit` defaulting to the configured cap.
    pub async fn live_trades(&self, address: &str, limit: Option<usize>) -> Vec<Trade> {
        let token = match self.token_price(address).await {
            Some(token) => token,
            None => return Vec::new(),
        };
        let mut rng = self.rng.lock().await;
        let mut trades = synth::synthesize_trades(
            std::slice::from_ref(&token),
            self.config.synthetic_trade_count,
            self.recency(),
            Utc::now(),
            &mut *rng,
        );
        trades.truncate(limit.unwrap_or(self.config.live_trade_limit));
        trades
    }

    pub async fn metrics(&self) -> Metrics {
        self.metrics.lock().await.clone()
    }

    fn recency(&self) -> Duration {
        Duration::seconds(self.config.trade_recency_secs as i64)
    }

    async fn quote(&self, address: &str) -> Result<Value, FetchError> {
        let lookup = self.source.token_quote(address);
        match tokio::time::timeout(self.config.request_timeout(), lookup).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn trades(&self, address: &str) -> Result<Value, FetchError> {
        let lookup = self.source.recent_trades(address);
        match tokio::time::timeout(self.config.request_timeout(), lookup).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn collect(&self) -> Result<Batch, AggregatorError> {
        let catalog = &self.config.catalog;
        if catalog.is_empty() {
            return Err(AggregatorError::EmptyCatalog);
        }

        let quotes = join_all(catalog.iter().map(|entry| self.quote(&entry.address))).await;

        let mut tokens = Vec::with_capacity(catalog.len());
        let mut fallbacks = 0;
        let mut failed = 0;
        {
            let mut rng = self.rng.lock().await;
            for (entry, quote) in catalog.iter().zip(quotes) {
                let (token, fell_back, errored) = resolve_token(entry, quote, &mut *rng);
                fallbacks += fell_back as usize;
                failed += errored as usize;
                tokens.push(token);
            }
        }

        let lookups: Vec<&Token> = tokens.iter().take(self.config.trade_lookup_count).collect();
        let trade_results = join_all(lookups.iter().map(|t| self.trades(&t.address))).await;

        let now = Utc::now();
        let mut rng = self.rng.lock().await;
        let mut trades: Vec<Trade> = Vec::new();
        for (token, result) in lookups.iter().zip(trade_results) {
            match result {
                Ok(payload) => trades.extend(parse_trades(token, &payload, now, &mut *rng)),
                Err(e) => debug!(token = %token.symbol, error = %e, "trade lookup failed"),
            }
        }
        sort_newest_first(&mut trades);
        trades.truncate(self.config.max_remote_trades);

        let synthesized = trades.is_empty();
        if synthesized {
            trades = synth::synthesize_trades(
                &tokens,
                self.config.synthetic_trade_count,
                self.recency(),
                now,
                &mut *rng,
            );
        }

        let trending = synth::trending(&tokens, self.config.trending_count, &mut *rng);

        let failure = if failed == catalog.len() {
            Some(AggregatorError::Unavailable {
                failed,
                total: catalog.len(),
            })
        } else {
            None
        };

        Ok(Batch {
            tokens,
            trades,
            trending,
            fallbacks,
            synthesized,
            failure,
        })
    }
}

/// Returns the token plus whether it fell back and whether the lookup errored.
fn resolve_token(
    entry: &Token,
    quote: Result<Value, FetchError>,
    rng: &mut StdRng,
) -> (Token, bool, bool) {
    match quote {
        Ok(payload) => match merge_quote(entry, &payload) {
            Some(token) => (token, false, false),
            None => {
                debug!(token = %entry.symbol, "quote missing price, using fallback");
                (synth::fallback_token(entry, rng), true, false)
            }
        },
        Err(e) => {
            debug!(token = %entry.symbol, error = %e, "quote lookup failed, using fallback");
            (synth::fallback_token(entry, rng), true, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::seeded_rng;
    use crate::market::catalog::{default_catalog, BONK, SOL};
    use crate::market::source::MockMarketDataSource;
    use crate::market::Side;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration as StdDuration;

    /// Upstream that never answers
    struct HangingSource;

    #[async_trait]
    impl MarketDataSource for HangingSource {
        async fn token_quote(&self, _address: &str) -> Result<Value, FetchError> {
            std::future::pending().await
        }

        async fn recent_trades(&self, _address: &str) -> Result<Value, FetchError> {
            std::future::pending().await
        }
    }

    /// First batch of quotes answers after 1s, every later one after 3s
    struct StaggeredSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for StaggeredSource {
        async fn token_quote(&self, _address: &str) -> Result<Value, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if call < 5 { 1 } else { 3 };
            tokio::time::sleep(StdDuration::from_secs(delay)).await;
            Ok(json!({ "price": 4.0 }))
        }

        async fn recent_trades(&self, _address: &str) -> Result<Value, FetchError> {
            Ok(json!([]))
        }
    }

    fn aggregator(source: MockMarketDataSource) -> Aggregator {
        Aggregator::new(AggregatorConfig::default(), Arc::new(source), seeded_rng(Some(5)))
    }

    fn failing_source() -> MockMarketDataSource {
        let mut source = MockMarketDataSource::new();
        source
            .expect_token_quote()
            .returning(|_| Err(FetchError::Status(503)));
        source
            .expect_recent_trades()
            .returning(|_| Err(FetchError::Status(503)));
        source
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_loading() {
        let agg = aggregator(failing_source());
        let snap = agg.snapshot().await;
        assert!(snap.loading);
        assert!(snap.tokens.is_empty());
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_refresh_merges_upstream_quotes_and_trades() {
        let mut source = MockMarketDataSource::new();
        source
            .expect_token_quote()
            .returning(|_| Ok(json!({"price": 2.0, "volume": 10})));
        source.expect_recent_trades().returning(|address| {
            Ok(json!([{ "signature": format!("sig-{}", address), "side": "buy",
                        "amount": 3, "price": 2.0, "time": 1_700_000_000 }]))
        });
        let agg = aggregator(source);

        let snap = agg.refresh().await;
        assert!(!snap.loading);
        assert!(snap.error.is_none());
        assert_eq!(snap.tokens.len(), 5);
        assert!(snap.tokens.iter().all(|t| t.price == 2.0 && t.volume_24h == 10.0));
        assert_eq!(snap.trades.len(), 5);
        assert!(snap.trades.iter().all(|t| t.side == Side::Buy));
        assert_eq!(snap.trending_tokens.len(), 5);
        assert!(snap.last_refreshed.is_some());

        let metrics = agg.metrics().await;
        assert_eq!(metrics.fallback_tokens, 0);
        assert_eq!(metrics.synthesized_batches, 0);
    }

    #[tokio::test]
    async fn test_refresh_with_failing_source_falls_back() {
        let agg = aggregator(failing_source());
        let snap = agg.refresh().await;

        assert_eq!(snap.tokens.len(), 5);
        assert_eq!(snap.trades.len(), 50);
        assert!(snap.error.as_deref().unwrap().contains("5 of 5"));
        assert!(!snap.loading);

        let metrics = agg.metrics().await;
        assert_eq!(metrics.fallback_tokens, 5);
        assert_eq!(metrics.synthesized_batches, 1);
        assert_eq!(metrics.refreshes_failed, 1);
    }

    #[tokio::test]
    async fn test_malformed_payloads_fall_back_silently() {
        let mut source = MockMarketDataSource::new();
        source
            .expect_token_quote()
            .returning(|_| Ok(json!({"unexpected": true})));
        source
            .expect_recent_trades()
            .returning(|_| Ok(json!({"not": "a list"})));
        let agg = aggregator(source);

        let snap = agg.refresh().await;
        assert!(snap.error.is_none());
        assert_eq!(snap.tokens.len(), 5);
        assert_eq!(snap.trades.len(), 50);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_an_error() {
        let mut source = MockMarketDataSource::new();
        source.expect_token_quote().returning(|address| {
            if address == BONK {
                Err(FetchError::Timeout)
            } else {
                Ok(json!({"price": 7.0}))
            }
        });
        source.expect_recent_trades().returning(|_| Ok(json!([])));
        let agg = aggregator(source);

        let snap = agg.refresh().await;
        assert!(snap.error.is_none());
        let bonk = snap.token_by_address(BONK).unwrap();
        assert!(bonk.price < 0.001);
        assert_eq!(snap.token_by_symbol("sol").unwrap().price, 7.0);
        assert_eq!(agg.metrics().await.fallback_tokens, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_data_visible() {
        let online = Arc::new(AtomicBool::new(true));
        let flag = online.clone();
        let mut source = MockMarketDataSource::new();
        source.expect_token_quote().returning(move |_| {
            if flag.load(Ordering::SeqCst) {
                Ok(json!({"price": 3.0}))
            } else {
                Err(FetchError::Offline)
            }
        });
        source
            .expect_recent_trades()
            .returning(|_| Err(FetchError::Offline));
        let agg = aggregator(source);

        let first = agg.refresh().await;
        assert!(first.error.is_none());
        assert_eq!(first.tokens.len(), 5);

        online.store(false, Ordering::SeqCst);
        let second = agg.refresh().await;
        assert!(second.error.is_some());
        assert_eq!(second.tokens.len(), 5);
        assert!(!second.trades.is_empty());
        assert!(!agg.snapshot().await.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_sets_error_and_keeps_data() {
        let config = AggregatorConfig {
            catalog: Vec::new(),
            ..AggregatorConfig::default()
        };
        let agg = Aggregator::new(config, Arc::new(failing_source()), seeded_rng(Some(1)));
        let snap = agg.refresh().await;
        assert_eq!(snap.error.as_deref(), Some("token catalog is empty"));
        assert!(!snap.loading);
        assert!(snap.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_token_price_lookup() {
        let mut source = MockMarketDataSource::new();
        source
            .expect_token_quote()
            .withf(|address: &str| address == SOL)
            .returning(|_| Ok(json!({"currentPrice": "150.25"})));
        let agg = aggregator(source);

        let sol = agg.token_price(SOL).await.unwrap();
        assert_eq!(sol.price, 150.25);
        assert!(agg.token_price("unknown-address").await.is_none());
    }

    #[tokio::test]
    async fn test_live_trades_for_one_token() {
        let agg = aggregator(failing_source());
        let trades = agg.live_trades(BONK, None).await;
        assert_eq!(trades.len(), 20);
        assert!(trades.iter().all(|t| t.token_address == BONK));
        for pair in trades.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        assert_eq!(agg.live_trades(BONK, Some(3)).await.len(), 3);
        assert!(agg.live_trades("unknown-address", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_before_refresh_are_empty() {
        let agg = aggregator(failing_source());
        assert!(agg.token_by_address(SOL).await.is_none());
        agg.refresh().await;
        assert_eq!(agg.token_by_address(SOL).await.unwrap().symbol, "SOL");
        assert_eq!(agg.token_by_symbol("Bonk").await.unwrap().address, BONK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_upstream_times_out_to_fallback() {
        let agg = Aggregator::new(
            AggregatorConfig::default(),
            Arc::new(HangingSource),
            seeded_rng(Some(12)),
        );
        let started = tokio::time::Instant::now();
        let snap = agg.refresh().await;

        assert_eq!(snap.tokens.len(), 5);
        assert_eq!(snap.trades.len(), 50);
        assert!(snap.error.as_deref().unwrap().contains("5 of 5"));
        assert!(!snap.loading);
        // quotes then trades, each bounded by the request timeout
        assert!(started.elapsed() <= StdDuration::from_millis(10_000 + 100));

        let metrics = agg.metrics().await;
        assert_eq!(metrics.fallback_tokens, 5);
        assert_eq!(metrics.synthesized_batches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_stays_set_while_newer_refresh_runs() {
        let agg = Arc::new(Aggregator::new(
            AggregatorConfig::default(),
            Arc::new(StaggeredSource {
                calls: AtomicUsize::new(0),
            }),
            seeded_rng(Some(13)),
        ));

        let older = tokio::spawn({
            let agg = agg.clone();
            async move { agg.refresh().await }
        });
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let newer = tokio::spawn({
            let agg = agg.clone();
            async move { agg.refresh().await }
        });

        let first = older.await.unwrap();
        assert_eq!(first.tokens.len(), 5);
        assert!(first.loading);
        assert!(agg.snapshot().await.loading);

        let second = newer.await.unwrap();
        assert!(!second.loading);
        assert!(!agg.snapshot().await.loading);
        assert_eq!(agg.metrics().await.refreshes_stale, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = MarketSnapshot {
            tokens: default_catalog(),
            ..MarketSnapshot::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["tokens"].as_array().unwrap().len(), 5);
        assert_eq!(json["error"], serde_json::Value::Null);
    }
}
