use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimulationConfig;
use crate::metrics::Metrics;
use crate::roster::{self, Agent};
use crate::series::{SeriesBuffer, SeriesGenerator, SeriesPoint};
use crate::updater::AgentUpdater;

pub(crate) const UPDATER_STREAM: u64 = 1;
pub(crate) const SERIES_STREAM: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Live,
    Paused,
}

/// Read model handed to chart, card and leaderboard consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub agents: Vec<Agent>,
    pub series_window: Vec<SeriesPoint>,
    pub is_live: bool,
    pub tick_count: u64,
}

impl LiveSnapshot {
    pub fn leaderboard(&self) -> Vec<Agent> {
        roster::leaderboard(&self.agents)
    }
}

/// Agent roster and series window with the LIVE/PAUSED switch.
///
/// Holds no timers; callers drive `tick` on their own cadence.
pub struct Simulation {
    agents: Vec<Agent>,
    series: SeriesBuffer,
    updater: AgentUpdater,
    generator: SeriesGenerator,
    state: SessionState,
    metrics: Metrics,
}

impl Simulation {
    pub fn new(config: &SimulationConfig, agents: Vec<Agent>, now_ms: i64) -> Self {
        let mut generator = SeriesGenerator::new(config, config.rng(SERIES_STREAM));
        let series = generator.initialize(&agents, now_ms);
        info!(
            agents = agents.len(),
            points = series.len(),
            "simulation initialized"
        );
        Self {
            agents,
            series,
            updater: AgentUpdater::new(config.rng(UPDATER_STREAM)),
            generator,
            state: SessionState::Live,
            metrics: Metrics::new(),
        }
    }

    /// Run the agent updater then append one series point.
    ///
    /// Returns false without touching anything while paused.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        if self.state == SessionState::Paused {
            return false;
        }
        self.updater.tick(&mut self.agents);
        self.generator.append(&mut self.series, &self.agents, now_ms);
        self.metrics.record_tick();
        true
    }

    pub fn toggle(&mut self) -> SessionState {
        self.state = match self.state {
            SessionState::Live => SessionState::Paused,
            SessionState::Paused => SessionState::Live,
        };
        info!(state = ?self.state, "session toggled");
        self.state
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn series(&self) -> &SeriesBuffer {
        &self.series
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            agents: self.agents.clone(),
            series_window: self.series.to_vec(),
            is_live: self.is_live(),
            tick_count: self.metrics.ticks_total,
        }
    }
}
