//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::simulation::SimulationConfig;

/// Supabase connection settings
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Remote store; in-memory stores are used when absent
    pub supabase: Option<SupabaseConfig>,
    /// Match clock and event tuning
    pub simulation: SimulationConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),
            supabase,
            simulation: simulation_from_env()?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            client_origin: String::new(),
            supabase: None,
            simulation: SimulationConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn probability(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = parse_var(name, default)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(name))
    }
}

fn simulation_from_env() -> Result<SimulationConfig, ConfigError> {
    let defaults = SimulationConfig::default();

    let tick_ms = parse_var("MATCH_TICK_INTERVAL_MS", defaults.tick_interval.as_millis() as u64)?;
    let minutes_per_tick = parse_var("MATCH_MINUTES_PER_TICK", defaults.minutes_per_tick)?;
    let half_time_minute = parse_var("MATCH_HALF_TIME_MINUTE", defaults.half_time_minute)?;
    let full_time_minute = parse_var("MATCH_FULL_TIME_MINUTE", defaults.full_time_minute)?;

    let flush_ms = parse_var(
        "MATCH_STATS_FLUSH_TIMEOUT_MS",
        defaults.stats_flush_timeout.as_millis() as u64,
    )?;
    validate_clock(tick_ms, minutes_per_tick, half_time_minute, full_time_minute)?;

    Ok(SimulationConfig {
        tick_interval: Duration::from_millis(tick_ms),
        minutes_per_tick,
        half_time_minute,
        full_time_minute,
        event_probability: probability("MATCH_EVENT_PROBABILITY", defaults.event_probability)?,
        home_advantage: probability("MATCH_HOME_ADVANTAGE", defaults.home_advantage)?,
        assist_probability: probability("MATCH_ASSIST_PROBABILITY", defaults.assist_probability)?,
        season: env::var("STATS_SEASON").ok().filter(|s| !s.trim().is_empty()),
        stats_flush_timeout: Duration::from_millis(flush_ms),
        ..defaults
    })
}

/// Half time must land exactly on a tick or it is never announced
fn validate_clock(
    tick_ms: u64,
    minutes_per_tick: u32,
    half_time_minute: u32,
    full_time_minute: u32,
) -> Result<(), ConfigError> {
    if tick_ms == 0 {
        return Err(ConfigError::Invalid("MATCH_TICK_INTERVAL_MS"));
    }
    if minutes_per_tick == 0 {
        return Err(ConfigError::Invalid("MATCH_MINUTES_PER_TICK"));
    }
    if half_time_minute >= full_time_minute {
        return Err(ConfigError::Invalid("MATCH_HALF_TIME_MINUTE"));
    }
    if half_time_minute % minutes_per_tick != 0 {
        return Err(ConfigError::Invalid("MATCH_MINUTES_PER_TICK"));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
