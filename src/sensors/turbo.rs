// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Turbocharging sensors - VGT boost and manifold pressure tracking

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Variable-geometry turbocharger boost monitor.
///
/// Default thresholds: P0299 underboost below 1.4 bar (clears above 1.5),
/// P0234 overboost above 2.8 bar (clears below 2.6).
pub struct TurbochargerSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl TurbochargerSensor {
    /// Stable sensor id
    pub const ID: &'static str = "turbocharger";
    const CIRCUIT_CODE: &'static str = "P2563";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0299",
                "Turbocharger underboost condition",
                Severity::Warning,
                Band::Below {
                    raise: 1.4,
                    clear: 1.5,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0234",
                "Turbocharger overboost condition",
                Severity::Critical,
                Band::Above {
                    raise: 2.8,
                    clear: 2.6,
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
impl Sensor for TurbochargerSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Turbocharger"
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
        let boost = self
            .link
            .query(Pid::TurboBoost)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: boost,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Manifold boost pressure monitor, actual against commanded target.
///
/// The reading value is actual boost as percent of reference; the derived
/// deviation field carries actual minus target. Default threshold: P0236
/// above 60% (clears at 55%).
pub struct BoostPressureSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl BoostPressureSensor {
    /// Stable sensor id
    pub const ID: &'static str = "boost_pressure";
    const CIRCUIT_CODE: &'static str = "P0105";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![ThresholdSpec::new(
            "P0236",
            "Boost pressure deviation from target",
            Severity::High,
            Band::Above {
                raise: 60.0,
                clear: 55.0,
            },
            debounce,
        )]
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
impl Sensor for BoostPressureSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Boost Pressure"
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
        let actual = self
            .link
            .query(Pid::ManifoldPressurePct)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;
        let target = self
            .link
            .query(Pid::BoostTargetPct)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: actual,
            unit: self.unit().to_string(),
            deviation: Some(actual - target),
        })
    }
}
