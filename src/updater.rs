use rand::rngs::StdRng;
use rand::Rng;

use crate::roster::{percent_change, Agent};

/// Evolves each agent's summary fields once per tick.
///
/// Runs independently of the series random walk; the two describe the same
/// quantity with separate random processes.
pub struct AgentUpdater {
    rng: StdRng,
}

impl AgentUpdater {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Apply one tick to every agent in place.
    pub fn tick(&mut self, agents: &mut [Agent]) {
        for agent in agents.iter_mut() {
            let profile = &agent.profile;
            let change = (self.rng.gen::<f64>() - 0.5) * profile.volatility;
            let new_value = agent.current_value * (1.0 + change);
            let traded = self.rng.gen::<f64>() < profile.trading_frequency;

            agent.current_value = new_value;
            agent.percent_change = percent_change(new_value, profile.baseline);
            if traded {
                agent.trades += 1;
            }
        }
    }
}
