//! Synthetic multi-agent time series.
//!
//! A [`SeriesBuffer`] holds one [`SeriesPoint`] per tick, ordered by strictly
//! increasing timestamp and bounded to a sliding window. The
//! [`SeriesGenerator`] synthesizes a plausible history for the window and
//! then extends it one random-walk step per tick.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::roster::Agent;

/// One timestamp with a value per agent id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl SeriesPoint {
    pub fn value(&self, agent_id: &str) -> Option<f64> {
        self.values.get(agent_id).copied()
    }
}

/// Bounded, time-ordered window of series points
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBuffer {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
}

impl SeriesBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a point and drop the oldest ones beyond capacity.
    pub fn push(&mut self, point: SeriesPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.front()
    }

    /// Point `n` places before the newest (0 = newest).
    pub fn nth_back(&self, n: usize) -> Option<&SeriesPoint> {
        self.points.len().checked_sub(n + 1).and_then(|i| self.points.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<SeriesPoint> {
        self.points.iter().cloned().collect()
    }
}

/// Shape parameters shared by all agents
#[derive(Debug, Clone)]
struct SeriesShape {
    window_points: usize,
    history_span_ms: i64,
    momentum_factor: f64,
    noise_center: f64,
    oscillation_amplitude: f64,
    noise_amplitude: f64,
    spike_probability: f64,
    spike_amplitude: f64,
    anchor_to_roster: bool,
}

pub struct SeriesGenerator {
    rng: StdRng,
    shape: SeriesShape,
}

impl SeriesGenerator {
    pub fn new(config: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            rng,
            shape: SeriesShape {
                window_points: config.window_points.max(2),
                history_span_ms: config.history_span_ms(),
                momentum_factor: config.momentum_factor,
                noise_center: config.noise_center,
                oscillation_amplitude: config.oscillation_amplitude,
                noise_amplitude: config.noise_amplitude,
                spike_probability: config.spike_probability,
                spike_amplitude: config.spike_amplitude,
                anchor_to_roster: config.anchor_series_to_roster,
            },
        }
    }

    /// Largest distance a synthesized history point can sit from its linear
    /// baseline-to-current path.
    pub fn deviation_bound(&self) -> f64 {
        self.shape.oscillation_amplitude.abs()
            + self.shape.noise_amplitude.abs()
            + self.shape.spike_amplitude.abs()
    }

    /// Synthesize the history window ending at `now_ms`.
    ///
    /// Each agent moves linearly from its baseline at the first point to its
    /// current value at the last, with oscillation, noise and rare spikes on top.
    pub fn initialize(&mut self, agents: &[Agent], now_ms: i64) -> SeriesBuffer {
        let steps = self.shape.window_points;
        let span = self.shape.history_span_ms;
        let start = now_ms - span;
        let mut buffer = SeriesBuffer::new(steps);
        let mut previous_ts: Option<i64> = None;

        for i in 0..steps {
            let mut timestamp = start + (i as i64) * span / (steps as i64);
            if let Some(prev) = previous_ts {
                timestamp = timestamp.max(prev + 1);
            }
            previous_ts = Some(timestamp);

            let progress = i as f64 / (steps - 1) as f64;
            let mut values = BTreeMap::new();
            for agent in agents {
                let baseline = agent.profile.baseline;
                let trend = baseline + (agent.current_value - baseline) * progress;
                let value = trend + self.oscillation(i, agent.profile.phase) + self.jitter();
                values.insert(agent.id.clone(), value);
            }
            buffer.push(SeriesPoint { timestamp, values });
        }

        buffer
    }

    /// Extend the buffer with one point at `now_ms`.
    pub fn append(&mut self, buffer: &mut SeriesBuffer, agents: &[Agent], now_ms: i64) {
        let timestamp = match buffer.last() {
            Some(last) => now_ms.max(last.timestamp + 1),
            None => now_ms,
        };

        let mut values = BTreeMap::new();
        for agent in agents {
            let last = buffer.last().and_then(|p| p.value(&agent.id));
            let prev = buffer.nth_back(1).and_then(|p| p.value(&agent.id));

            let momentum = match (last, prev) {
                (Some(last), Some(prev)) if last != 0.0 => {
                    (last - prev) / last * self.shape.momentum_factor
                }
                _ => 0.0,
            };

            let base = if self.shape.anchor_to_roster {
                agent.current_value
            } else {
                last.unwrap_or(agent.current_value)
            };

            let noise =
                (self.rng.gen::<f64>() - self.shape.noise_center) * agent.profile.series_volatility;
            let value = base * (1.0 + noise + agent.profile.trend_bias + momentum);
            values.insert(agent.id.clone(), value);
        }

        buffer.push(SeriesPoint { timestamp, values });
    }

    fn oscillation(&self, step: usize, phase: f64) -> f64 {
        let x = step as f64;
        let wave = 0.7 * (x * 0.5 + phase).sin() + 0.3 * (x * 0.13 + 2.0 * phase).sin();
        self.shape.oscillation_amplitude * wave
    }

    fn jitter(&mut self) -> f64 {
        let mut value = (self.rng.gen::<f64>() * 2.0 - 1.0) * self.shape.noise_amplitude;
        if self.rng.gen::<f64>() < self.shape.spike_probability {
            value += (self.rng.gen::<f64>() * 2.0 - 1.0) * self.shape.spike_amplitude;
        }
        value
    }
}
