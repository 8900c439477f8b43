use serde::{Deserialize, Serialize};

/// Engine counters for ticks and market refreshes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub ticks_total: u64,
    pub refreshes_total: u64,
    pub refreshes_failed: u64,
    pub refreshes_stale: u64,
    pub fallback_tokens: u64,
    pub synthesized_batches: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks_total += 1;
    }

    /// Record a completed refresh; `failed` when an error was surfaced
    pub fn record_refresh(&mut self, failed: bool) {
        self.refreshes_total += 1;
        if failed {
            self.refreshes_failed += 1;
        }
    }

    /// Record a refresh whose results arrived after a newer one was applied
    pub fn record_stale(&mut self) {
        self.refreshes_stale += 1;
    }

    pub fn record_fallbacks(&mut self, count: usize) {
        self.fallback_tokens += count as u64;
    }

    pub fn record_synthesized(&mut self) {
        self.synthesized_batches += 1;
    }

    /// Get refresh success rate as percentage
    pub fn refresh_success_rate(&self) -> f64 {
        if self.refreshes_total == 0 {
            return 100.0;
        }
        let ok = self.refreshes_total - self.refreshes_failed;
        (ok as f64 / self.refreshes_total as f64) * 100.0
    }

    /// Sum two sets of counters.
    pub fn combined(&self, other: &Metrics) -> Metrics {
        Metrics {
            ticks_total: self.ticks_total + other.ticks_total,
            refreshes_total: self.refreshes_total + other.refreshes_total,
            refreshes_failed: self.refreshes_failed + other.refreshes_failed,
            refreshes_stale: self.refreshes_stale + other.refreshes_stale,
            fallback_tokens: self.fallback_tokens + other.fallback_tokens,
            synthesized_batches: self.synthesized_batches + other.synthesized_batches,
        }
    }
}
