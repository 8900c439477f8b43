use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::market::Token;
use crate::roster::Agent;

/// Tokens each agent weighs in on
const TOKENS_CONSIDERED: usize = 3;
const LOOKBACK_HOURS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Fade,
}

/// An agent's call on one token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub agent_color: String,
    pub verdict: Verdict,
    pub timestamp: DateTime<Utc>,
    pub reasoning: String,
    pub token: String,
}

/// One decision per agent for each of the first three tokens, newest first.
pub fn generate_decisions<R: Rng>(
    agents: &[Agent],
    tokens: &[Token],
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vec<Decision> {
    let lookback_ms = Duration::hours(LOOKBACK_HOURS).num_milliseconds();
    let mut decisions = Vec::new();

    for (token_index, token) in tokens.iter().take(TOKENS_CONSIDERED).enumerate() {
        for (agent_index, agent) in agents.iter().enumerate() {
            let verdict = if rng.gen_bool(0.5) {
                Verdict::Buy
            } else {
                Verdict::Fade
            };
            let age = Duration::milliseconds(rng.gen_range(0..lookback_ms));
            decisions.push(Decision {
                id: format!("decision_{}_{}", token_index, agent_index),
                agent_id: agent.id.clone(),
                agent_name: agent.display_name.clone(),
                agent_color: agent.color.clone(),
                verdict,
                timestamp: now - age,
                reasoning: reasoning(token, verdict),
                token: token.symbol.clone(),
            });
        }
    }

    decisions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    decisions
}

fn reasoning(token: &Token, verdict: Verdict) -> String {
    let mut factors = Vec::new();

    if token.price_change_24h > 5.0 {
        factors.push(format!(
            "Strong momentum with {:.1}% gain in 24h",
            token.price_change_24h
        ));
    } else if token.price_change_24h < -5.0 {
        factors.push(format!(
            "Concerning decline of {:.1}% in 24h",
            token.price_change_24h.abs()
        ));
    }

    if token.volume_24h > token.market_cap * 0.1 {
        factors.push("High trading volume indicates strong interest".to_string());
    }

    if token.holders > 100_000 {
        factors.push("Large holder base provides stability".to_string());
    } else if token.holders < 10_000 {
        factors.push("Small holder base increases volatility risk".to_string());
    }

    if token.liquidity > token.market_cap * 0.05 {
        factors.push("Good liquidity for entry/exit".to_string());
    } else {
        factors.push("Low liquidity poses slippage risk".to_string());
    }

    let summary = format!("Analysis of {}: {}. ", token.symbol, factors.join(", "));
    let outlook = match verdict {
        Verdict::Buy => concat!(
            "Technical indicators suggest upward momentum. ",
            "Risk-reward ratio favorable for position entry."
        ),
        Verdict::Fade => concat!(
            "Risk factors outweigh potential gains. ",
            "Maintaining conservative position."
        ),
    };
    summary + outlook
}
