use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// Per-agent simulation parameters, attached to the agent rather than
/// looked up by roster position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Fixed reference value for percent change and the start of history
    pub baseline: f64,
    /// Max relative move per tick of the summary value (full width, centered on zero)
    pub volatility: f64,
    /// Probability of a new trade on each tick
    pub trading_frequency: f64,
    /// Random-walk step width for the chart series
    pub series_volatility: f64,
    #[serde(default = "default_trend_bias")]
    pub trend_bias: f64,
    /// Oscillation phase for synthesized history
    #[serde(default)]
    pub phase: f64,
}

fn default_trend_bias() -> f64 {
    0.0001
}

/// One competing agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub display_name: String,
    pub color: String,
    pub current_value: f64,
    /// Relative to `profile.baseline`, not to the previous tick
    pub percent_change: f64,
    pub trades: u64,
    pub win_rate: f64,
    pub rank: u32,
    pub profile: AgentProfile,
}

impl Agent {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            color: config.color.clone(),
            current_value: config.current_value,
            percent_change: percent_change(config.current_value, config.profile.baseline),
            trades: config.trades,
            win_rate: config.win_rate,
            rank: config.rank,
            profile: config.profile.clone(),
        }
    }
}

pub fn percent_change(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (value - baseline) / baseline * 100.0
}

/// Build the roster from configuration, preserving order.
pub fn build_roster(configs: &[AgentConfig]) -> Vec<Agent> {
    configs.iter().map(Agent::from_config).collect()
}

/// Copy of the roster sorted by value, highest first, with ranks reassigned.
pub fn leaderboard(agents: &[Agent]) -> Vec<Agent> {
    let mut ranked = agents.to_vec();
    ranked.sort_by(|a, b| b.current_value.total_cmp(&a.current_value));
    for (i, agent) in ranked.iter_mut().enumerate() {
        agent.rank = i as u32 + 1;
    }
    ranked
}

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    display_name: &str,
    color: &str,
    current_value: f64,
    trades: u64,
    rank: u32,
    baseline: f64,
    volatility: f64,
    trading_frequency: f64,
    series_volatility: f64,
    phase: f64,
) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        display_name: display_name.to_string(),
        color: color.to_string(),
        current_value,
        trades,
        win_rate: 0.0,
        rank,
        profile: AgentProfile {
            baseline,
            volatility,
            trading_frequency,
            series_volatility,
            trend_bias: default_trend_bias(),
            phase,
        },
    }
}

/// Reference roster of seven agents.
pub fn default_agent_configs() -> Vec<AgentConfig> {
    vec![
        entry("claude", "Claude", "#FF6B35", 1911.756, 4, 1, 150.0, 0.005, 0.10, 0.002, 0.0),
        entry("gpt5", "GPT-5", "#4CAF50", 1904.04, 18, 2, 300.0, 0.008, 0.15, 0.004, 0.9),
        entry("gemini", "Gemini", "#2196F3", 1902.02, 2, 3, 450.0, 0.003, 0.05, 0.001, 1.8),
        entry("qwen", "Qwen", "#F44336", 1902.02, 2, 4, 600.0, 0.006, 0.12, 0.003, 2.7),
        entry("grok", "Grok", "#9C27B0", 1897.28, 11, 5, 750.0, 0.012, 0.20, 0.006, 3.6),
        entry("glm", "GLM", "#00BCD4", 1892.47, 2, 6, 900.0, 0.004, 0.08, 0.002, 4.5),
        entry("deepseek", "DeepSeek", "#FFC107", 1848.361, 11, 7, 1050.0, 0.007, 0.13, 0.003, 5.4),
    ]
}
