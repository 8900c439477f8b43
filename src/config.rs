use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market::catalog;
use crate::market::Token;
use crate::roster;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tick cadence and series shape
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Competing agents, in display order
    #[serde(default = "roster::default_agent_configs")]
    pub agents: Vec<AgentConfig>,

    /// Mock external market feed
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Team membership persistence
    #[serde(default)]
    pub team: TeamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed seed for reproducible runs; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Sliding window bound, also the number of synthesized history points
    #[serde(default = "default_window_points")]
    pub window_points: usize,
    #[serde(default = "default_history_hours")]
    pub history_hours: u64,
    /// Fraction of the previous step's relative change carried into the next
    #[serde(default = "default_momentum_factor")]
    pub momentum_factor: f64,
    /// Centre of the per-step noise draw; below 0.5 skews the walk upward
    #[serde(default = "default_noise_center")]
    pub noise_center: f64,
    #[serde(default = "default_oscillation_amplitude")]
    pub oscillation_amplitude: f64,
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    #[serde(default = "default_spike_probability")]
    pub spike_probability: f64,
    #[serde(default = "default_spike_amplitude")]
    pub spike_amplitude: f64,
    /// Walk the series from each agent's roster value instead of its own last point
    #[serde(default)]
    pub anchor_series_to_roster: bool,
}

/// One roster entry: identity, starting stats and simulation profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub display_name: String,
    pub color: String,
    pub current_value: f64,
    #[serde(default)]
    pub trades: u64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub rank: u32,
    pub profile: roster::AgentProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_synthetic_trade_count")]
    pub synthetic_trade_count: usize,
    #[serde(default = "default_trade_recency_secs")]
    pub trade_recency_secs: u64,
    #[serde(default = "default_trending_count")]
    pub trending_count: usize,
    /// How many catalog tokens are asked for remote trades
    #[serde(default = "default_trade_lookup_count")]
    pub trade_lookup_count: usize,
    #[serde(default = "default_max_remote_trades")]
    pub max_remote_trades: usize,
    #[serde(default = "default_live_trade_limit")]
    pub live_trade_limit: usize,
    #[serde(default = "catalog::default_catalog")]
    pub catalog: Vec<Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default = "default_team_path")]
    pub path: String,
}

fn default_tick_interval_ms() -> u64 {
    2000
}

fn default_window_points() -> usize {
    100
}

fn default_history_hours() -> u64 {
    24
}

fn default_momentum_factor() -> f64 {
    0.1
}

fn default_noise_center() -> f64 {
    0.4
}

fn default_oscillation_amplitude() -> f64 {
    20.0
}

fn default_noise_amplitude() -> f64 {
    5.0
}

fn default_spike_probability() -> f64 {
    0.05
}

fn default_spike_amplitude() -> f64 {
    40.0
}

fn default_base_url() -> String {
    "https://data.solanatracker.io".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_synthetic_trade_count() -> usize {
    50
}

fn default_trade_recency_secs() -> u64 {
    3600
}

fn default_trending_count() -> usize {
    5
}

fn default_trade_lookup_count() -> usize {
    5
}

fn default_max_remote_trades() -> usize {
    20
}

fn default_live_trade_limit() -> usize {
    20
}

fn default_team_path() -> String {
    "trenchmark-team.json".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_interval_ms: default_tick_interval_ms(),
            window_points: default_window_points(),
            history_hours: default_history_hours(),
            momentum_factor: default_momentum_factor(),
            noise_center: default_noise_center(),
            oscillation_amplitude: default_oscillation_amplitude(),
            noise_amplitude: default_noise_amplitude(),
            spike_probability: default_spike_probability(),
            spike_amplitude: default_spike_amplitude(),
            anchor_series_to_roster: false,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn history_span_ms(&self) -> i64 {
        (self.history_hours * 60 * 60 * 1000) as i64
    }

    /// Independent RNG stream for one subsystem.
    pub fn rng(&self, stream: u64) -> StdRng {
        seeded_rng(self.seed.map(|s| s.wrapping_add(stream)))
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            synthetic_trade_count: default_synthetic_trade_count(),
            trade_recency_secs: default_trade_recency_secs(),
            trending_count: default_trending_count(),
            trade_lookup_count: default_trade_lookup_count(),
            max_remote_trades: default_max_remote_trades(),
            live_trade_limit: default_live_trade_limit(),
            catalog: catalog::default_catalog(),
        }
    }
}

impl AggregatorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            path: default_team_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            agents: roster::default_agent_configs(),
            aggregator: AggregatorConfig::default(),
            team: TeamConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!(
            agents = config.agents.len(),
            tokens = config.aggregator.catalog.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be > 0".into()));
        }
        if sim.window_points < 2 {
            return Err(ConfigError::Invalid("window_points must be >= 2".into()));
        }
        if sim.history_hours == 0 {
            return Err(ConfigError::Invalid("history_hours must be > 0".into()));
        }
        check_probability("spike_probability", sim.spike_probability)?;
        check_probability("noise_center", sim.noise_center)?;

        if self.agents.is_empty() {
            return Err(ConfigError::Invalid("roster is empty".into()));
        }
        let mut ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.is_empty() {
                return Err(ConfigError::Invalid("agent id must not be empty".into()));
            }
            if !ids.insert(agent.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate agent id '{}'", agent.id)));
            }
            if agent.profile.baseline <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "agent '{}' baseline must be > 0",
                    agent.id
                )));
            }
            check_probability("trading_frequency", agent.profile.trading_frequency)?;
        }

        let agg = &self.aggregator;
        if agg.refresh_interval_secs == 0 || agg.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "aggregator intervals must be > 0".into(),
            ));
        }
        let mut addresses = HashSet::new();
        for token in &agg.catalog {
            if !addresses.insert(token.address.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate catalog address '{}'",
                    token.address
                )));
            }
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be within [0, 1]", name)))
    }
}

/// Seeded RNG when a seed is given, entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
