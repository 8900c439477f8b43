use chrono::{DateTime, TimeZone, Utc};

use super::Token;

pub const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const SOL: &str = "So11111111111111111111111111111111111111112";
pub const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const WIF: &str = "5oVNBeEEQvYi1cX3ir8Dx5n1P7pdxydbGF2X4TxVusJm";
pub const PEPE: &str = "HZ1JovNiVvGrGNiiYvEozEVgZ58xaU3RKwX8eACQBCt3";

const TOKEN_LIST_ASSETS: &str =
    "https://raw.githubusercontent.com/solana-labs/token-list/main/assets/mainnet";

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn token(
    address: &str,
    symbol: &str,
    name: &str,
    price: f64,
    market_cap: f64,
    volume_24h: f64,
    price_change_24h: f64,
    liquidity: f64,
    holders: u64,
    created_at: DateTime<Utc>,
    image: String,
) -> Token {
    Token {
        address: address.to_string(),
        symbol: symbol.to_string(),
        name: name.to_string(),
        price,
        market_cap,
        volume_24h,
        price_change_24h,
        liquidity,
        holders,
        created_at,
        image: Some(image),
        website: None,
        twitter: None,
        telegram: None,
    }
}

/// Stablecoin, base network token and three meme tokens with last-known figures.
pub fn default_catalog() -> Vec<Token> {
    vec![
        token(
            USDC, "USDC", "USD Coin", 1.00, 32_000_000_000.0, 2_500_000_000.0, 0.01,
            500_000_000.0, 2_500_000, date(2021, 1, 1),
            "https://cryptologos.cc/logos/usd-coin-usdc-logo.png".to_string(),
        ),
        token(
            SOL, "SOL", "Solana", 95.50, 42_000_000_000.0, 1_800_000_000.0, 2.5,
            800_000_000.0, 1_200_000, date(2020, 3, 1),
            "https://cryptologos.cc/logos/solana-sol-logo.png".to_string(),
        ),
        token(
            BONK, "BONK", "Bonk", 0.000012, 800_000_000.0, 45_000_000.0, -5.2,
            25_000_000.0, 180_000, date(2022, 12, 25),
            format!("{}/{}/logo.png", TOKEN_LIST_ASSETS, BONK),
        ),
        token(
            WIF, "WIF", "dogwifhat", 2.85, 2_850_000_000.0, 120_000_000.0, 8.7,
            45_000_000.0, 95_000, date(2023, 11, 17),
            format!("{}/{}/logo.png", TOKEN_LIST_ASSETS, WIF),
        ),
        token(
            PEPE, "PEPE", "Pepe", 0.0000085, 3_500_000_000.0, 280_000_000.0, 12.3,
            85_000_000.0, 220_000, date(2023, 4, 14),
            format!("{}/{}/logo.png", TOKEN_LIST_ASSETS, PEPE),
        ),
    ]
}
