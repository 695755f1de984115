// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Electrical sensors - glow plug circuit health

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{Sensor, SensorError, SensorReading};
use crate::detection::{Band, Severity, ThresholdSpec};
use crate::obd::{ObdLink, Pid};

/// Glow plug resistance monitor.
///
/// Nominal plug resistance sits around 0.5 Ω; high resistance means a
/// failing plug. The value is the worst cylinder. Defaults: P0671 degraded
/// above 2.0 Ω (clears below 1.5), P0670 failed above 5.0 Ω (clears
/// below 4.0).
pub struct GlowPlugSensor {
    link: Arc<dyn ObdLink>,
    interval: Duration,
    thresholds: Vec<ThresholdSpec>,
}

impl GlowPlugSensor {
    /// Stable sensor id
    pub const ID: &'static str = "glow_plugs";
    const CIRCUIT_CODE: &'static str = "P0380";

    /// Documented default thresholds at the given debounce count.
    pub fn default_thresholds(debounce: u32) -> Vec<ThresholdSpec> {
        vec![
            ThresholdSpec::new(
                "P0671",
                "Glow plug degraded, resistance above spec",
                Severity::Warning,
                Band::Above {
                    raise: 2.0,
                    clear: 1.5,
                },
                debounce,
            ),
            ThresholdSpec::new(
                "P0670",
                "Glow plug circuit failed",
                Severity::High,
                Band::Above {
                    raise: 5.0,
                    clear: 4.0,
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
impl Sensor for GlowPlugSensor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Glow Plugs"
    }

    fn unit(&self) -> &str {
        "Ω"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn thresholds(&self) -> &[ThresholdSpec] {
        &self.thresholds
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let resistance = self
            .link
            .query(Pid::GlowPlugResistance)
            .await
            .map_err(|e| SensorError::from_link(e, Self::CIRCUIT_CODE))?;

        Ok(SensorReading {
            sensor_id: Self::ID.to_string(),
            timestamp: Utc::now(),
            value: resistance,
            unit: self.unit().to_string(),
            deviation: None,
        })
    }
}
