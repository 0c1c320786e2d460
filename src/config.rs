use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::TrafficState;
use crate::pipeline::accumulator::DEFAULT_MAX_GAP_SECS;
use crate::utils::LocalZone;

#[derive(Debug, Clone)]
pub struct ClimateConfig {
    /// MAC address of the RuuviTag in the monitored room, upper case.
    pub sensor_mac: String,
    /// PostgreSQL sink; outputs are only logged when unset.
    pub database_url: Option<String>,
    pub room: String,
    pub app: String,
    /// Durable state location; `None` keeps state in memory only.
    pub state_file: Option<PathBuf>,
    pub tick_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub max_gap_secs: i64,
    /// Zone used for day/week keys and alert timestamps.
    pub timezone: LocalZone,
    /// Override mode for checking downstream wiring.
    pub force_state: Option<TrafficState>,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        ClimateConfig {
            sensor_mac: String::new(),
            database_url: None,
            room: "office".to_string(),
            app: "climate".to_string(),
            state_file: Some(PathBuf::from("climate_state.json")),
            tick_interval_secs: 60,
            poll_interval_secs: 30,
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
            timezone: LocalZone::default(),
            force_state: None,
        }
    }
}

impl ClimateConfig {
    /// Load configuration from the environment (and `.env`, if present)
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;

        if env::var("CLIMATE_TIMEZONE").map_or(true, |raw| raw.trim().is_empty()) {
            config.timezone = match LocalZone::system() {
                Ok(zone) => zone,
                Err(e) => {
                    warn!("Could not determine the system time zone ({}), using UTC", e);
                    LocalZone::default()
                }
            };
        }

        info!(
            "Monitoring room '{}' with sensor {} (time zone {})",
            config.room, config.sensor_mac, config.timezone
        );
        if config.database_url.is_none() {
            info!("DATABASE_URL not set, outputs will only be logged");
        }
        if let Some(state) = config.force_state {
            warn!("Override mode active: every reading is classified as {}", state);
        }

        Ok(config)
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClimateConfig::default();

        let sensor_mac = match lookup("CLIMATE_SENSOR_MAC") {
            Some(mac) if !mac.trim().is_empty() => mac.trim().to_uppercase(),
            _ => lookup("RUUVI_TAGS")
                .and_then(|tags| first_tag_mac(&tags))
                .ok_or("No sensor configured. Please set CLIMATE_SENSOR_MAC or RUUVI_TAGS=<MAC>=<name>")?,
        };

        let timezone = match lookup("CLIMATE_TIMEZONE").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => LocalZone::named(&raw)
                .ok_or_else(|| format!("Unknown time zone '{}' in CLIMATE_TIMEZONE", raw))?,
            None => defaults.timezone,
        };

        let force_state = lookup("CLIMATE_FORCE_STATE")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.parse::<TrafficState>())
            .transpose()?;

        let tick_interval_secs = parse_or(&lookup, "CLIMATE_TICK_SECS", defaults.tick_interval_secs)?;
        let poll_interval_secs = parse_or(&lookup, "CLIMATE_POLL_SECS", defaults.poll_interval_secs)?;
        if tick_interval_secs == 0 || poll_interval_secs == 0 {
            return Err("CLIMATE_TICK_SECS and CLIMATE_POLL_SECS must be greater than zero".into());
        }

        let max_gap_secs = parse_or(&lookup, "CLIMATE_MAX_GAP_SECS", defaults.max_gap_secs)?;
        if max_gap_secs < 0 {
            return Err(format!("CLIMATE_MAX_GAP_SECS must not be negative, got {}", max_gap_secs).into());
        }

        Ok(ClimateConfig {
            sensor_mac,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            room: lookup("CLIMATE_ROOM").unwrap_or(defaults.room),
            app: lookup("CLIMATE_APP").unwrap_or(defaults.app),
            // An explicitly empty value selects the in-memory store
            state_file: match lookup("CLIMATE_STATE_FILE") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path.trim())),
                None => defaults.state_file,
            },
            tick_interval_secs,
            poll_interval_secs,
            max_gap_secs,
            timezone,
            force_state,
        })
    }
}

/// First MAC of a `RUUVI_TAGS=<MAC>=<name>,...` list
fn first_tag_mac(tags: &str) -> Option<String> {
    tags.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(mac, _)| mac.trim())
        .find(|mac| !mac.is_empty())
        .map(str::to_uppercase)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value '{}' for {}: {}", raw, key, e).into()),
        None => Ok(default),
    }
}
