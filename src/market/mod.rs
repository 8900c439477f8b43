//! Mock external token market: catalog, upstream lookups with fallback,
//! synthesized trades and the periodically refreshed aggregate view.

pub mod aggregator;
pub mod catalog;
pub mod source;
pub mod synth;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use aggregator::{Aggregator, AggregatorError, MarketSnapshot};
pub use source::{FetchError, MarketDataSource, OfflineSource, TrackerClient};

/// Catalog token with its latest numeric fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Unique key
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub liquidity: f64,
    pub holders: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Ephemeral trade record; the whole set is replaced on every refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub token_address: String,
    pub token_symbol: String,
    pub side: Side,
    pub amount: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub trader: String,
    pub signature: String,
}

/// Sort newest first.
pub fn sort_newest_first(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
