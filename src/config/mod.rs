// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::obd::SimulationConfig;

/// Main application configuration.
///
/// Threshold and debounce defaults live on the sensors themselves; entries
/// under `[sensors.<id>]` override them and are validated fatally at engine
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vehicle identifier used in reports
    pub vehicle_id: String,

    /// Default sensor polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Diagnostic report cadence in seconds
    pub report_interval_s: u64,

    /// Default consecutive-sample debounce count for raise and clear
    pub default_debounce: u32,

    /// Bounded queue depth per bus subscriber
    pub bus_queue_capacity: usize,

    /// Grace period for feed tasks and bus workers at shutdown, milliseconds
    pub shutdown_timeout_ms: u64,

    /// Log level
    pub log_level: String,

    /// Simulated acquisition tuning
    pub simulation: SimulationConfig,

    /// Per-sensor overrides keyed by sensor id
    pub sensors: BTreeMap<String, SensorOverrides>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle_id: "TDV6".to_string(),
            poll_interval_ms: 500,
            report_interval_s: 30,
            default_debounce: 3,
            bus_queue_capacity: 256,
            shutdown_timeout_ms: 2000,
            log_level: "info".to_string(),
            simulation: SimulationConfig::default(),
            sensors: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("dervmon"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Per-sensor configuration overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorOverrides {
    /// Polling interval override in milliseconds
    pub interval_ms: Option<u64>,

    /// Debounce override applied to all of the sensor's fault codes
    pub debounce: Option<u32>,

    /// Per-code band/debounce overrides
    pub thresholds: Vec<ThresholdOverride>,
}

/// Override for one fault code's band boundaries or debounce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdOverride {
    /// Fault code the override targets
    pub code: String,

    /// Outer band boundary override
    pub raise: Option<f64>,

    /// Inner band boundary override
    pub clear: Option<f64>,

    /// Debounce override for this code only
    pub debounce: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.default_debounce, 3);
        assert_eq!(config.report_interval_s, 30);
        assert!(config.sensors.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            vehicle_id = "E60-530d"
            poll_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.vehicle_id, "E60-530d");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.default_debounce, 3);
    }

    #[test]
    fn sensor_overrides_parse() {
        let config: Config = toml::from_str(
            r#"
            [sensors.boost_pressure]
            interval_ms = 250
            debounce = 5

            [[sensors.boost_pressure.thresholds]]
            code = "P0236"
            raise = 65.0
            clear = 58.0
            "#,
        )
        .unwrap();

        let overrides = config.sensors.get("boost_pressure").unwrap();
        assert_eq!(overrides.interval_ms, Some(250));
        assert_eq!(overrides.debounce, Some(5));
        assert_eq!(overrides.thresholds[0].code, "P0236");
        assert_eq!(overrides.thresholds[0].raise, Some(65.0));
        assert_eq!(overrides.thresholds[0].debounce, None);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.sensors.insert(
            "dpf".to_string(),
            SensorOverrides {
                interval_ms: Some(5000),
                ..Default::default()
            },
        );

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.vehicle_id, config.vehicle_id);
        assert_eq!(
            parsed.sensors.get("dpf").unwrap().interval_ms,
            Some(5000)
        );
    }
}
