// src/config.rs
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use dotenv::dotenv;
use log::{info, warn};

use crate::services::analysis::{AnalysisOptions, BreachConfirmation};

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub analysis: AnalysisSettings,
}

/// Zone used to turn stored timestamps into calendar dates, plus analyzer options.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub zone: Tz,
    pub options: AnalysisOptions,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            zone: DEFAULT_TIMEZONE,
            options: AnalysisOptions::default(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("VITE_DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let port = match lookup("PORT") {
            Some(raw) => parse_value("PORT", &raw)?,
            None => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let max_connections = parse_or("DB_MAX_CONNECTIONS", &lookup, DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
        }

        Ok(AppConfig {
            database_url,
            port,
            max_connections,
            analysis: AnalysisSettings::from_lookup(&lookup)?,
        })
    }
}

impl AnalysisSettings {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AnalysisOptions::default();
        let zone = parse_or("MARKET_TIMEZONE", lookup, DEFAULT_TIMEZONE)?;

        let options = AnalysisOptions {
            threshold_fraction: parse_or("DRAWDOWN_THRESHOLD", lookup, defaults.threshold_fraction)?,
            require_data: parse_or("ANALYSIS_REQUIRE_DATA", lookup, defaults.require_data)?,
            breach_confirmation: BreachConfirmation {
                days: parse_or("BREACH_CONFIRM_DAYS", lookup, defaults.breach_confirmation.days)?,
                max_gap_days: parse_or("BREACH_MAX_GAP_DAYS", lookup, defaults.breach_confirmation.max_gap_days)?,
            },
            horizon_years: match lookup("ANALYSIS_HORIZON_YEARS") {
                Some(raw) => Some(parse_value("ANALYSIS_HORIZON_YEARS", &raw)?),
                None => None,
            },
        };
        options.validate().map_err(|e| anyhow!("analysis settings: {}", e))?;

        info!(
            "Analysis settings: zone {}, threshold {}, breach confirmation {} day(s) within {} day gaps, horizon {:?}",
            zone,
            options.threshold_fraction,
            options.breach_confirmation.days,
            options.breach_confirmation.max_gap_days,
            options.horizon_years
        );

        Ok(AnalysisSettings { zone, options })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, raw, e))
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
