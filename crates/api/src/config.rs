//! Process configuration from environment variables.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use bankd_engine::{IntervalUnit, WorkerConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PAYOUT_INTERVAL: u64 = 24;
const DEFAULT_PAYOUT_UNIT: IntervalUnit = IntervalUnit::Hours;
const DEFAULT_INTEREST_RATE: Decimal = dec!(0.05);

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub worker: WorkerConfig,
    pub default_interest_rate: Decimal,
}

impl Config {
    /// Read configuration from the environment. Every variable except
    /// `DATABASE_URL` has a default; each fallback is logged.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;

        let bind_addr = env_or("BIND_ADDR", DEFAULT_BIND_ADDR.to_string(), |s| {
            Ok(s.to_string())
        });
        let interval = env_or("PAYOUT_INTERVAL", DEFAULT_PAYOUT_INTERVAL, |s| {
            s.parse::<u64>().map_err(|e| e.to_string())
        });
        let unit = env_or("PAYOUT_TIME_UNIT", DEFAULT_PAYOUT_UNIT, |s| {
            IntervalUnit::from_str(s).map_err(|e| e.to_string())
        });
        let default_interest_rate = env_or("DEFAULT_INTEREST_RATE", DEFAULT_INTEREST_RATE, |s| {
            Decimal::from_str(s).map_err(|e| e.to_string())
        });

        Ok(Self {
            database_url,
            bind_addr,
            worker: WorkerConfig::new(interval, unit),
            default_interest_rate,
        })
    }
}

fn env_or<T, F>(name: &str, default: T, parse: F) -> T
where
    T: std::fmt::Debug,
    F: FnOnce(&str) -> Result<T, String>,
{
    match std::env::var(name) {
        Ok(raw) => match parse(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(name, raw, error = %err, default = ?default, "unparsable env var; using default");
                default
            }
        },
        Err(_) => {
            warn!(name, default = ?default, "env var not set; using default");
            default
        }
    }
}
