// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Temperature sensors - oil and coolant

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Oil temperature monitor.
///
/// Normal operating range 80-130°C. Defaults: P0197 too low below 60°C
/// (clears above 65), P0196 elevated above 130°C (clears below 125),
/// P0198 critically high above 150°C (clears below 140).
pub struct OilTemperatureSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl OilTemperatureSensor {
    /// Stable sensor id
    pub const ID: &'static str = "oil_temperature";
    const CIRCUIT_CODE: &'static str = "P0195";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0197",
                "Oil temperature too low, engine not at operating temp",
                Severity::Warning,
                Band::Below {
                    raise: 60.0,
                    clear: 65.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0196",
                "Oil temperature elevated",
                Severity::Warning,
                Band::Above {
                    raise: 130.0,
                    clear: 125.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0198",
                "Oil temperature critically high, risk of engine damage",
                Severity::Critical,
                Band::Above {
                    raise: 150.0,
                    clear: 140.0,
                },
                debounce,
            ),
        ]
    }

    /// Build with an acquisition link and finalized configuration.
    pub fn new(link: Arc<dyn ObdLink>, interval: Duration, thresholds: Vec<ThresholdSpec>) -> Self {
        Self {
            link,
            interval,
            thresholds,
        }
    }
}

#[async_trait]
impl Sensor for OilTemperatureSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Oil Temperature"
    }

    fn unit(&self) -> &str {
        "°C"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let temp = self
            .link
            .query(Pid::OilTemperature)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: temp,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Coolant temperature monitor.
///
/// Thermostat opens around 88°C; normal range 85-105°C. Defaults: P0128
/// below thermostat regulating temperature 75°C (clears above 80), P0116
/// elevated above 110°C (clears below 105), P0118 critically high above
/// 120°C (clears below 115).
pub struct CoolantTemperatureSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl CoolantTemperatureSensor {
    /// Stable sensor id
    pub const ID: &'static str = "coolant_temperature";
    const CIRCUIT_CODE: &'static str = "P0115";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0128",
                "Coolant temperature below thermostat regulating temp",
                Severity::Warning,
                Band::Below {
                    raise: 75.0,
                    clear: 80.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0116",
                "Coolant temperature elevated",
                Severity::Warning,
                Band::Above {
                    raise: 110.0,
                    clear: 105.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0118",
                "Coolant temperature critically high, check cooling system",
                Severity::Critical,
                Band::Above {
                    raise: 120.0,
                    clear: 115.0,
                },
                debounce,
            ),
        ]
    }

    /// Build with an acquisition link and finalized configuration.
    pub fn new(link: Arc<dyn ObdLink>, interval: Duration, thresholds: Vec<ThresholdSpec>) -> Self {
        Self {
            link,
            interval,
            thresholds,
        }
    }
}

#[async_trait]
impl Sensor for CoolantTemperatureSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Coolant Temperature"
    }

    fn unit(&self) -> &str {
        "°C"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let temp = self
            .link
            .query(Pid::CoolantTemperature)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: temp,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}
