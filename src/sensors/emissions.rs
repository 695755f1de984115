// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Emissions sensors - DPF soot load, EGR flow, NOx concentration

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Diesel particulate filter soot load monitor.
///
/// Defaults: P2002 regeneration needed above 80% soot (clears below 70),
/// P2463 soot accumulation critical above 95% (clears below 90).
pub struct DpfSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl DpfSensor {
    /// Stable sensor id
    pub const ID: &'static str = "dpf";
    const CIRCUIT_CODE: &'static str = "P2452";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P2002",
                "DPF soot load high, regeneration needed",
                Severity::Warning,
                Band::Above {
                    raise: 80.0,
                    clear: 70.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P2463",
                "DPF soot accumulation critical, immediate regeneration required",
                Severity::Critical,
                Band::Above {
                    raise: 95.0,
                    clear: 90.0,
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
impl Sensor for DpfSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Particulate Filter"
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
        let soot = self
            .link
            .query(Pid::DpfSootLoad)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: soot,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Exhaust gas recirculation flow monitor.
///
/// Defaults: P0401 insufficient flow below 0.5 kg/h (clears above 0.8,
/// valve may be coked or stuck), P0402 excessive flow above 8.0 kg/h
/// (clears below 7.0).
pub struct EgrSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl EgrSensor {
    /// Stable sensor id
    pub const ID: &'static str = "egr";
    const CIRCUIT_CODE: &'static str = "P0403";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0401",
                "EGR insufficient flow, valve may be coked or stuck",
                Severity::Warning,
                Band::Below {
                    raise: 0.5,
                    clear: 0.8,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0402",
                "EGR excessive flow detected",
                Severity::Warning,
                Band::Above {
                    raise: 8.0,
                    clear: 7.0,
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
impl Sensor for EgrSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "EGR"
    }

    fn unit(&self) -> &str {
        "kg/h"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let flow = self
            .link
            .query(Pid::EgrFlow)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: flow,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}

/// Post-DPF NOx concentration monitor.
///
/// Defaults: P2201 above the Euro 5 limit region at 200 ppm (clears below
/// 180), P2200 critically high above 500 ppm (clears below 450).
pub struct NoxSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl NoxSensor {
    /// Stable sensor id
    pub const ID: &'static str = "nox";
    const CIRCUIT_CODE: &'static str = "P0130";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P2201",
                "NOx above Euro 5 limit",
                Severity::Warning,
                Band::Above {
                    raise: 200.0,
                    clear: 180.0,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P2200",
                "NOx critically high, emissions system failure",
                Severity::Critical,
                Band::Above {
                    raise: 500.0,
                    clear: 450.0,
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
impl Sensor for NoxSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "NOx"
    }

    fn unit(&self) -> &str {
        "ppm"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let ppm = self
            .link
            .query(Pid::NoxConcentration)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: ppm,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}
