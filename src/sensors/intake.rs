// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Intake path sensors - mass air flow and swirl flap position

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Mass air flow monitor.
///
/// Idle sits around 20-30 g/s, full load 250-400 g/s. Defaults: P0102
/// critically low below 5 g/s (clears above 10), P0101 below idle minimum
/// 15 g/s (clears above 18), P0103 above 420 g/s (clears below 400).
pub struct MafSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl MafSensor {
    /// Stable sensor id
    pub const ID: &'static str = "maf";
    const CIRCUIT_CODE: &'static str = "P0100";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0102",
                "MAF reading critically low, sensor may be failed or disconnected",
                Severity::Critical,
                Band::Below {
                    raise: 5.0,
                    clear: 10.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0101",
                "MAF reading below idle minimum, check for air leaks or dirty sensor",
                Severity::Warning,
                Band::Below {
                    raise: 15.0,
                    clear: 18.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0103",
                "MAF reading above maximum load value",
                Severity::Warning,
                Band::Above {
                    raise: 420.0,
                    clear: 400.0,
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
impl Sensor for MafSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Mass Air Flow"
    }

    fn unit(&self) -> &str {
        "g/s"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let rate = self
            .link
            .query(Pid::MafRate)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: rate,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Swirl flap position monitor.
///
/// Flap spindle failure is a notorious weak point on this engine family;
/// the value is the worst-bank deviation from commanded position. Defaults:
/// P1530 deviation above 5% (clears below 3), P2004 stuck above 20%
/// deviation (clears below 15).
pub struct SwirlFlapSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl SwirlFlapSensor {
    /// Stable sensor id
    pub const ID: &'static str = "swirl_flaps";
    const CIRCUIT_CODE: &'static str = "P1529";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P1530",
                "Swirl flap position deviation from commanded",
                Severity::Warning,
                Band::Above {
                    raise: 5.0,
                    clear: 3.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P2004",
                "Swirl flap stuck, spindle failure risk",
                Severity::Critical,
                Band::Above {
                    raise: 20.0,
                    clear: 15.0,
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
impl Sensor for SwirlFlapSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Swirl Flaps"
    }

    fn unit(&self) -> &str {
        "%"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let deviation = self
            .link
            .query(Pid::SwirlFlapDeviation)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: deviation,
            unit: self.unit().to_string(),
            deviation: Some(deviation),
        })
    }
}
