//! Startup configuration
//!
//! Nothing is persisted. Defaults can be overridden through environment
//! variables:
//!
//! - `EDGE_OVERLAY_LOG`: `trace`, `debug`, `info`, `warn`, `error` or `off`
//! - `EDGE_OVERLAY_MONITOR`: index of the monitor captured before the
//!   overlay reports its first region

use edge_filter::EdgeSettings;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

pub const LOG_ENV: &str = "EDGE_OVERLAY_LOG";
pub const MONITOR_ENV: &str = "EDGE_OVERLAY_MONITOR";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: LevelFilter,
    pub initial_monitor: usize,
    pub settings: EdgeSettings,
    /// Values that were set but could not be parsed, reported once logging
    /// is up.
    pub rejected: Vec<(&'static str, String)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            initial_monitor: 0,
            settings: EdgeSettings::default(),
            rejected: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOG_ENV) {
            match LevelFilter::from_str(raw.trim()) {
                Ok(level) => config.log_level = level,
                Err(_) => config.rejected.push((LOG_ENV, raw)),
            }
        }

        if let Some(raw) = lookup(MONITOR_ENV) {
            match raw.trim().parse() {
                Ok(index) => config.initial_monitor = index,
                Err(_) => config.rejected.push((MONITOR_ENV, raw)),
            }
        }

        config
    }
}
