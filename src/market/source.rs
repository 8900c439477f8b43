use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{synth, Side, Token, Trade};
use crate::config::AggregatorConfig;

/// Trades read from a single upstream payload
const MAX_TRADES_PER_PAYLOAD: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("upstream unavailable (offline mode)")]
    Offline,
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Remote price/metadata lookup keyed by token address.
///
/// Payloads are arbitrary JSON; callers coerce every field.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn token_quote(&self, address: &str) -> Result<Value, FetchError>;

    async fn recent_trades(&self, address: &str) -> Result<Value, FetchError>;
}

/// HTTP client for the token tracker API
pub struct TrackerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TrackerClient {
    pub fn new(config: &AggregatorConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "upstream error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketDataSource for TrackerClient {
    async fn token_quote(&self, address: &str) -> Result<Value, FetchError> {
        self.get("/price", &[("token", address)]).await
    }

    async fn recent_trades(&self, address: &str) -> Result<Value, FetchError> {
        self.get("/token/trades", &[("address", address)]).await
    }
}

/// Source that always fails; every view degrades to fallback and synthesis
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSource;

#[async_trait]
impl MarketDataSource for OfflineSource {
    async fn token_quote(&self, _address: &str) -> Result<Value, FetchError> {
        Err(FetchError::Offline)
    }

    async fn recent_trades(&self, _address: &str) -> Result<Value, FetchError> {
        Err(FetchError::Offline)
    }
}

/// Number or numeric string, finite only.
pub(crate) fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// First key holding a non-zero number
fn first_nonzero(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| payload.get(*k).and_then(lenient_f64))
        .find(|v| *v != 0.0)
}

fn first_str(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| payload.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn lenient_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().and_then(epoch_time)),
        Value::Number(n) => n.as_f64().and_then(epoch_time),
        _ => None,
    }
}

/// Epoch seconds or milliseconds, told apart by magnitude
fn epoch_time(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let millis = if raw >= 1e12 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Merge a quote payload over the catalog entry.
///
/// Returns `None` when the payload carries no usable price, which callers
/// treat like a failed lookup.
pub fn merge_quote(entry: &Token, payload: &Value) -> Option<Token> {
    if !payload.is_object() {
        return None;
    }
    let price = first_nonzero(payload, &["currentPrice", "price", "value"]).filter(|p| *p > 0.0)?;

    let holders = ["holders", "holderCount"]
        .iter()
        .filter_map(|k| payload.get(*k).and_then(lenient_f64))
        .find(|v| *v > 0.0)
        .map(|v| v as u64)
        .unwrap_or(entry.holders);

    let created_at = payload
        .get("createdAt")
        .and_then(lenient_time)
        .unwrap_or(entry.created_at);

    Some(Token {
        address: entry.address.clone(),
        symbol: entry.symbol.clone(),
        name: entry.name.clone(),
        price,
        market_cap: first_nonzero(payload, &["marketCap", "mc"]).unwrap_or(entry.market_cap),
        volume_24h: first_nonzero(payload, &["volume", "volume24h"]).unwrap_or(0.0),
        price_change_24h: first_nonzero(payload, &["priceChangePercent", "priceChange24h"])
            .unwrap_or(entry.price_change_24h),
        liquidity: first_nonzero(payload, &["liquidity"]).unwrap_or(0.0),
        holders,
        created_at,
        image: first_str(payload, &["image", "logoURI"]).or_else(|| entry.image.clone()),
        website: first_str(payload, &["website"]).or_else(|| entry.website.clone()),
        twitter: first_str(payload, &["twitter"]).or_else(|| entry.twitter.clone()),
        telegram: first_str(payload, &["telegram"]).or_else(|| entry.telegram.clone()),
    })
}

/// Coerce an upstream trade list; anything but an array yields no trades.
pub fn parse_trades<R: Rng>(
    token: &Token,
    payload: &Value,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Trade> {
    let items = match payload.as_array() {
        Some(items) => items,
        None => return Vec::new(),
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .take(MAX_TRADES_PER_PAYLOAD)
        .map(|item| {
            let signature = first_str(item, &["signature", "txHash"]);
            let side = match first_str(item, &["type", "side"]) {
                Some(s) if s.eq_ignore_ascii_case("buy") => Side::Buy,
                _ => Side::Sell,
            };
            let amount = ["amount", "quantity", "size"]
                .iter()
                .find_map(|k| item.get(*k).and_then(lenient_f64))
                .unwrap_or(0.0);
            let timestamp = ["timestamp", "time"]
                .iter()
                .find_map(|k| item.get(*k).and_then(lenient_time))
                .unwrap_or(now);

            Trade {
                id: signature.clone().unwrap_or_else(|| synth::random_id(rng)),
                token_address: token.address.clone(),
                token_symbol: first_str(item, &["symbol"]).unwrap_or_else(|| token.symbol.clone()),
                side,
                amount,
                price: item.get("price").and_then(lenient_f64).unwrap_or(0.0),
                timestamp,
                trader: first_str(item, &["trader", "owner"])
                    .unwrap_or_else(|| "Unknown".to_string()),
                signature: signature.unwrap_or_default(),
            }
        })
        .collect()
}
