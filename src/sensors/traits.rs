// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Sensor capability contract and common types

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::ThresholdSpec;
use crate::obd::LinkError;

/// A single sensor reading.
///
/// Ephemeral; produced per poll and retained only as latest-per-sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Owning sensor id
    pub sensor_id: String,
    /// When the value was read
    pub timestamp: DateTime<Utc>,
    /// Measured value in the sensor's unit
    pub value: f64,
    /// Unit string, e.g. "bar", "°C"
    pub unit: String,
    /// Derived deviation from a commanded target, where the sensor has one
    pub deviation: Option<f64>,
}

/// Read failures, contained at the feed level.
#[derive(Debug, Clone, Error)]
pub enum SensorError {
    /// Transient: skip this cycle, retry next interval
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    /// Hardware-reported anomaly, distinct from a threshold breach
    #[error("sensor fault {code}: {message}")]
    Fault {
        /// Circuit fault code for the failing sensor
        code: String,
        /// Driver-reported detail
        message: String,
    },
}

impl SensorError {
    /// Map an acquisition error onto the sensor's own fault taxonomy.
    pub(crate) fn from_link(err: LinkError, circuit_code: &str) -> Self {
        match err {
            LinkError::NoResponse(pid) => SensorError::Unavailable(format!("no response for {pid}")),
            LinkError::SignalFault { message, .. } => SensorError::Fault {
                code: circuit_code.to_string(),
                message,
            },
        }
    }
}

/// Capability contract every monitored subsystem satisfies.
///
/// Variants differ only in the PIDs they query, the reading shape, and
/// their threshold defaults; the feed and evaluator treat them uniformly.
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Unique sensor id, stable across the process lifetime
    fn id(&self) -> &str;

    /// Display name for reports and logs
    fn name(&self) -> &str;

    /// Unit of the reading value
    fn unit(&self) -> &str;

    /// Effective polling interval
    fn interval(&self) -> Duration;

    /// Threshold/debounce configuration for this sensor's fault codes
    fn thresholds(&self) -> &[ThresholdSpec];

    /// Produce one reading, or fail transiently / with a hardware fault
    async fn read(&mut self) -> Result<SensorReading, SensorError>;
}
