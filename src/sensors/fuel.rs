// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Fuelling sensors - common-rail pressure and injector balance rates

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Common-rail fuel pressure monitor.
///
/// The rail runs 300-1800 bar; the high-pressure pump is a known weak
/// point. Defaults: P1093 critically low below 200 bar (clears above 250),
/// P0087 low below 300 bar (clears above 330), P0088 above 1800 bar
/// (clears below 1750).
pub struct FuelPressureSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl FuelPressureSensor {
    /// Stable sensor id
    pub const ID: &'static str = "fuel_pressure";
    const CIRCUIT_CODE: &'static str = "P0190";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P1093",
                "Fuel rail pressure critically low, HP pump failure likely",
                Severity::Critical,
                Band::Below {
                    raise: 200.0,
                    clear: 250.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0087",
                "Fuel rail pressure low",
                Severity::High,
                Band::Below {
                    raise: 300.0,
                    clear: 330.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0088",
                "Fuel rail pressure above maximum",
                Severity::High,
                Band::Above {
                    raise: 1800.0,
                    clear: 1750.0,
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
impl Sensor for FuelPressureSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Fuel Pressure"
    }

    fn unit(&self) -> &str {
        "bar"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let pressure = self
            .link
            .query(Pid::FuelRailPressure)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: pressure,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Injector balance rate monitor.
///
/// Balance rates show how much the ECU trims each injector to equalise
/// cylinder contribution; the value is the worst-cylinder magnitude.
/// Defaults: P1141 elevated above 3.0 mg/stroke (clears below 2.5),
/// P1146 critical above 6.0 mg/stroke (clears below 5.0).
pub struct InjectorSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl InjectorSensor {
    /// Stable sensor id
    pub const ID: &'static str = "injectors";
    const CIRCUIT_CODE: &'static str = "P0200";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P1141",
                "Injector balance rate elevated",
                Severity::Warning,
                Band::Above {
                    raise: 3.0,
                    clear: 2.5,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P1146",
                "Injector balance rate critical, injector over- or under-delivering",
                Severity::Critical,
                Band::Above {
                    raise: 6.0,
                    clear: 5.0,
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
impl Sensor for InjectorSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Injectors"
    }

    fn unit(&self) -> &str {
        "mg/stroke"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let balance = self
            .link
            .query(Pid::InjectorBalance)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: balance,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}
