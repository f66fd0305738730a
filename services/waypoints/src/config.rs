//! services/waypoints/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::engine::state::EngineSettings;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub log_level: Level,
    pub campus_slug: String,
    pub campus_radius_km: f64,
    pub waypoint_ttl_hours: u32,
    pub event_match_epsilon: f64,
    pub event_feed_limit: u32,
    pub popup_settle: Duration,
    pub auto_open_popup: bool,
    pub http_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend and Auth ---
        let api_url = lookup("WAYPOINT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("WAYPOINT_API_URL".to_string()))?;

        let token = lookup("WAYPOINT_TOKEN").filter(|t| !t.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Waypoint Settings ---
        let campus_slug = lookup("CAMPUS_SLUG").unwrap_or_else(|| "tmu".to_string());
        let campus_radius_km: f64 = parse_or(&lookup, "CAMPUS_RADIUS_KM", 5.0)?;
        if campus_radius_km <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "CAMPUS_RADIUS_KM".to_string(),
                "radius must be positive".to_string(),
            ));
        }
        let waypoint_ttl_hours: u32 = parse_or(&lookup, "WAYPOINT_TTL_HOURS", 168)?;

        // --- Event Cross-Referencing ---
        let event_match_epsilon: f64 = parse_or(&lookup, "EVENT_MATCH_EPSILON", 0.0001)?;
        let event_feed_limit: u32 = parse_or(&lookup, "EVENT_FEED_LIMIT", 100)?;

        // --- Saved Navigation and HTTP ---
        let popup_settle = Duration::from_millis(parse_or(&lookup, "POPUP_SETTLE_MS", 600)?);
        let auto_open_popup: bool = parse_or(&lookup, "AUTO_OPEN_POPUP", true)?;
        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 15)?);

        Ok(Self {
            api_url,
            token,
            log_level,
            campus_slug,
            campus_radius_km,
            waypoint_ttl_hours,
            event_match_epsilon,
            event_feed_limit,
            popup_settle,
            auto_open_popup,
            http_timeout,
        })
    }

    /// The subset of settings the engine itself consumes.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            campus_radius_km: self.campus_radius_km,
            waypoint_ttl_hours: self.waypoint_ttl_hours,
            event_match_epsilon: self.event_match_epsilon,
            event_feed_limit: self.event_feed_limit,
            popup_settle: self.popup_settle,
            auto_open_popup: self.auto_open_popup,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
