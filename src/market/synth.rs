use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::{sort_newest_first, Side, Token, Trade};

const BASE58: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz123456789";

/// Random v4 UUID drawn from the caller's RNG, so seeded runs stay reproducible.
pub fn random_id<R: Rng>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

/// Shortened base58-looking string, e.g. `Ab3dEfGh...k`
pub fn short_address<R: Rng>(rng: &mut R) -> String {
    let mut pick = || BASE58[rng.gen_range(0..BASE58.len())] as char;
    let head: String = (0..8).map(|_| pick()).collect();
    format!("{}...{}", head, pick())
}

/// Catalog entry with bounded jitter so repeated failures don't look static.
///
/// Price moves within ±2.5% and volume within ±15%; the reported 24h change
/// is the price jitter itself.
pub fn fallback_token<R: Rng>(entry: &Token, rng: &mut R) -> Token {
    let price_jitter = (rng.gen::<f64>() - 0.5) * 0.05;
    let volume_jitter = (rng.gen::<f64>() - 0.5) * 0.3;
    Token {
        price: entry.price * (1.0 + price_jitter),
        volume_24h: entry.volume_24h * (1.0 + volume_jitter),
        price_change_24h: price_jitter * 100.0,
        ..entry.clone()
    }
}

/// Unit count for a plausible trade at the token's price scale
fn trade_amount<R: Rng>(price: f64, rng: &mut R) -> f64 {
    let r = rng.gen::<f64>();
    let amount = if price > 10.0 {
        r * 50.0 + 5.0
    } else if price > 1.0 {
        r * 1_000.0 + 100.0
    } else if price > 0.001 {
        r * 10_000.0 + 1_000.0
    } else {
        r * 1_000_000.0 + 100_000.0
    };
    amount.floor()
}

/// Synthesize `count` trades across `tokens`, newest first.
pub fn synthesize_trades<R: Rng>(
    tokens: &[Token],
    count: usize,
    recency: Duration,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Trade> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let window_ms = recency.num_milliseconds().max(1);

    let mut trades: Vec<Trade> = (0..count)
        .map(|_| {
            let token = &tokens[rng.gen_range(0..tokens.len())];
            let age = Duration::milliseconds(rng.gen_range(0..window_ms));
            let amount = trade_amount(token.price, rng);

            let base_volatility = token.price_change_24h.abs() / 100.0;
            let jitter = (rng.gen::<f64>() - 0.5) * base_volatility * 2.0;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };

            Trade {
                id: random_id(rng),
                token_address: token.address.clone(),
                token_symbol: token.symbol.clone(),
                side,
                amount,
                price: token.price * (1.0 + jitter),
                timestamp: now - age,
                trader: short_address(rng),
                signature: short_address(rng),
            }
        })
        .collect();

    sort_newest_first(&mut trades);
    trades
}

/// First `count` tokens with inflated movement: ±10 points of 24h change
/// and up to +50% volume.
pub fn trending<R: Rng>(tokens: &[Token], count: usize, rng: &mut R) -> Vec<Token> {
    tokens
        .iter()
        .take(count)
        .map(|token| Token {
            price_change_24h: token.price_change_24h + (rng.gen::<f64>() - 0.5) * 20.0,
            volume_24h: token.volume_24h * (1.0 + rng.gen::<f64>() * 0.5),
            ..token.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::seeded_rng;
    use crate::market::catalog::{default_catalog, BONK, PEPE, SOL, USDC, WIF};

    #[test]
    fn test_fallback_jitter_bounds() {
        let mut rng = seeded_rng(Some(1));
        for entry in default_catalog() {
            for _ in 0..50 {
                let t = fallback_token(&entry, &mut rng);
                assert_eq!(t.address, entry.address);
                assert_eq!(t.symbol, entry.symbol);
                assert!((t.price / entry.price - 1.0).abs() <= 0.025 + 1e-12);
                assert!((t.volume_24h / entry.volume_24h - 1.0).abs() <= 0.15 + 1e-12);
                assert!(t.price_change_24h.abs() <= 2.5 + 1e-9);
                assert_eq!(t.market_cap, entry.market_cap);
            }
        }
    }

    #[test]
    fn test_synthesize_count_order_and_window() {
        let mut rng = seeded_rng(Some(2));
        let now = Utc::now();
        let trades = synthesize_trades(&default_catalog(), 50, Duration::hours(1), now, &mut rng);
        assert_eq!(trades.len(), 50);
        for pair in trades.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        for t in &trades {
            assert!(t.timestamp <= now);
            assert!(t.timestamp > now - Duration::hours(1));
        }
    }

    #[test]
    fn test_synthesize_amount_tiers() {
        let mut rng = seeded_rng(Some(3));
        let trades = synthesize_trades(
            &default_catalog(),
            500,
            Duration::hours(1),
            Utc::now(),
            &mut rng,
        );
        for t in &trades {
            let range = match t.token_address.as_str() {
                a if a == SOL => 5.0..=55.0,
                a if a == USDC => 1_000.0..=11_000.0,
                a if a == WIF => 100.0..=1_100.0,
                a if a == BONK || a == PEPE => 100_000.0..=1_100_000.0,
                other => panic!("unexpected token {}", other),
            };
            assert!(range.contains(&t.amount), "{} {}", t.token_symbol, t.amount);
            assert_eq!(t.amount, t.amount.floor());
        }
    }

    #[test]
    fn test_synthesize_price_jitter_follows_volatility() {
        let mut rng = seeded_rng(Some(4));
        let catalog = default_catalog();
        let trades = synthesize_trades(&catalog, 300, Duration::hours(1), Utc::now(), &mut rng);
        for t in &trades {
            let token = catalog.iter().find(|c| c.address == t.token_address).unwrap();
            let bound = token.price_change_24h.abs() / 100.0;
            assert!((t.price / token.price - 1.0).abs() <= bound + 1e-12);
        }
    }

    #[test]
    fn test_synthesize_both_sides() {
        let mut rng = seeded_rng(Some(5));
        let trades = synthesize_trades(
            &default_catalog(),
            100,
            Duration::hours(1),
            Utc::now(),
            &mut rng,
        );
        assert!(trades.iter().any(|t| t.side == Side::Buy));
        assert!(trades.iter().any(|t| t.side == Side::Sell));
    }

    #[test]
    fn test_synthesize_empty_tokens() {
        let mut rng = seeded_rng(Some(6));
        assert!(synthesize_trades(&[], 50, Duration::hours(1), Utc::now(), &mut rng).is_empty());
    }

    #[test]
    fn test_trending_inflates() {
        let mut rng = seeded_rng(Some(7));
        let catalog = default_catalog();
        let hot = trending(&catalog, 3, &mut rng);
        assert_eq!(hot.len(), 3);
        for (t, base) in hot.iter().zip(catalog.iter()) {
            assert_eq!(t.address, base.address);
            assert!(t.volume_24h >= base.volume_24h);
            assert!(t.volume_24h <= base.volume_24h * 1.5);
            assert!((t.price_change_24h - base.price_change_24h).abs() <= 10.0);
        }
    }

    #[test]
    fn test_short_address_shape() {
        let mut rng = seeded_rng(Some(8));
        let addr = short_address(&mut rng);
        assert_eq!(addr.len(), 12);
        assert_eq!(&addr[8..11], "...");
    }

    #[test]
    fn test_random_id_is_reproducible_uuid() {
        let a = random_id(&mut seeded_rng(Some(9)));
        let b = random_id(&mut seeded_rng(Some(9)));
        assert_eq!(a, b);
        let parsed = uuid::Uuid::parse_str(&a).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }
}
