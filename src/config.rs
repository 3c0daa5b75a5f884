//! Configuration loader and application settings.

use crate::errors::{AppError, Result};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SERVER_URL: &str = "http://localhost:4000";
const DEFAULT_PRICE_API_URL: &str = "https://www.albion-online-data.com/api/v2/stats/prices";

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base address of the broadcast server.
    pub server_url: String,
    /// Base address of the upstream price API; the item id is appended as a path segment.
    pub price_api_url: String,
    /// Items polled each cycle, in order.
    pub items: Vec<String>,
    /// Market locations quoted for every item. Order is significant.
    pub locations: Vec<String>,
    /// Pause between full poll cycles.
    pub interval: Duration,
    /// Pause between two items inside one cycle.
    pub item_delay: Duration,
    /// Marketplace fee deducted from the sell side, in percent.
    pub fee_percent: f64,
    /// Minimum rounded profit for a flip to be reported.
    pub min_profit: i64,
    /// Listen port for the broadcast server.
    pub port: u16,
    pub fetch_timeout: Duration,
    pub publish_timeout: Duration,
    /// Outbound queue depth per subscriber connection.
    pub subscriber_buffer: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_url = get("SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.into());
        let price_api_url = get("PRICE_API_URL").unwrap_or_else(|| DEFAULT_PRICE_API_URL.into());

        let items = parse_list(&get("ITEMS").unwrap_or_else(|| "T4_SWORD,T4_HELMET".into()));
        if items.is_empty() {
            return Err(AppError::config("ITEMS", "no item identifiers given"));
        }
        let locations =
            parse_list(&get("LOCATIONS").unwrap_or_else(|| "Caerleon,BlackMarket".into()));
        if locations.is_empty() {
            return Err(AppError::config("LOCATIONS", "no locations given"));
        }
        if locations.len() < 2 {
            tracing::warn!(
                ?locations,
                "[CONFIG] fewer than two locations configured, no flips can be detected"
            );
        }

        let interval = parse_seconds("INTERVAL", get("INTERVAL"), 5.0)?;
        let item_delay =
            Duration::from_millis(parse_or("ITEM_DELAY_MS", get("ITEM_DELAY_MS"), 300u64)?);
        let fee_percent: f64 = parse_or("FEE_PERCENT", get("FEE_PERCENT"), 5.0)?;
        if !fee_percent.is_finite() || !(0.0..=100.0).contains(&fee_percent) {
            return Err(AppError::config(
                "FEE_PERCENT",
                format!("{fee_percent} is not a percentage between 0 and 100"),
            ));
        }
        let min_profit = parse_or("MIN_PROFIT", get("MIN_PROFIT"), 50i64)?;
        let port = parse_or("PORT", get("PORT"), 4000u16)?;
        let fetch_timeout = parse_seconds("FETCH_TIMEOUT_SECS", get("FETCH_TIMEOUT_SECS"), 10.0)?;
        let publish_timeout =
            parse_seconds("PUBLISH_TIMEOUT_SECS", get("PUBLISH_TIMEOUT_SECS"), 5.0)?;
        let subscriber_buffer = parse_or("SUBSCRIBER_BUFFER", get("SUBSCRIBER_BUFFER"), 256usize)?;
        if subscriber_buffer == 0 {
            return Err(AppError::config("SUBSCRIBER_BUFFER", "must be at least 1"));
        }

        Ok(Self {
            server_url,
            price_api_url,
            items,
            locations,
            interval,
            item_delay,
            fee_percent,
            min_profit,
            port,
            fetch_timeout,
            publish_timeout,
            subscriber_buffer,
        })
    }
}

/// Split a comma separated list, trimming entries and dropping blanks and repeats.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen == entry) {
            out.push(entry.to_string());
        }
    }
    out
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| AppError::config(key, format!("invalid value {v:?}: {e}"))),
        None => Ok(default),
    }
}

fn parse_seconds(key: &str, raw: Option<String>, default: f64) -> Result<Duration> {
    let secs: f64 = parse_or(key, raw, default)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| AppError::config(key, format!("{secs} is not a valid number of seconds")))
}
