use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::{Error, Result};
use super::narrator::NarratorConfig;
use super::seed::SeedConfig;
use super::store::StoreOptions;

const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Ten years.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub store: StoreOptions,
    /// Upper bound on a single core call made from the HTTP layer.
    pub call_timeout: Duration,
    pub session_ttl: Option<chrono::Duration>,
    pub seed: SeedConfig,
    pub narrator: Option<NarratorConfig>,
}

fn parse<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Failed to parse ${}: {:?}", name, raw))),
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to
    /// its value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port: u16 = parse("PORT", var("PORT"), 1234)?;
        let ip: IpAddr = parse("LISTEN_IP", var("LISTEN_IP"), IpAddr::from([127, 0, 0, 1]))?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| Error::Config("DATABASE_URL must be set!".into()))?;

        let defaults = StoreOptions::default();
        let pool_size: u32 = parse("DATABASE_POOL_SIZE", var("DATABASE_POOL_SIZE"), defaults.pool_size)?;
        if pool_size == 0 {
            return Err(Error::Config("$DATABASE_POOL_SIZE must be at least 1".into()));
        }

        let call_timeout_ms: u64 = parse("CALL_TIMEOUT_MS", var("CALL_TIMEOUT_MS"), 5000)?;
        let call_timeout = Duration::from_millis(call_timeout_ms);

        let session_ttl = match var("SESSION_TTL_HOURS") {
            None => None,
            Some(raw) => {
                let hours: i64 = parse("SESSION_TTL_HOURS", Some(raw), 0)?;
                if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
                    return Err(Error::Config(format!(
                        "$SESSION_TTL_HOURS must be between 1 and {}",
                        MAX_SESSION_TTL_HOURS
                    )));
                }

                Some(chrono::Duration::try_hours(hours).ok_or_else(|| {
                    Error::Config("$SESSION_TTL_HOURS is out of range".into())
                })?)
            }
        };

        let seed = SeedConfig {
            beers_path: PathBuf::from(
                var("SEED_BEERS_PATH").unwrap_or_else(|| "data/beers.json".into()),
            ),
            breweries_path: PathBuf::from(
                var("SEED_BREWERIES_PATH").unwrap_or_else(|| "data/breweries.json".into()),
            ),
            admin_password: var("ADMIN_PASSWORD"),
        };

        let narrator = var("LLM_API_URL").map(|api_url| NarratorConfig {
            api_url,
            api_key: var("LLM_API_KEY"),
            model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            timeout: call_timeout,
        });

        Ok(Config {
            listen_addr: SocketAddr::new(ip, port),
            database_url,
            store: StoreOptions {
                pool_size,
                busy_timeout: call_timeout,
                connection_timeout: call_timeout,
            },
            call_timeout,
            session_ttl,
            seed,
            narrator,
        })
    }
}
