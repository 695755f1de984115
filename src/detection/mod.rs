//! Fault detection - threshold bands, fault codes, and the debounced evaluator

mod evaluator;

pub use evaluator::{FaultEvaluator, FaultTransition};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered fault severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A diagnostic trouble code raised against one sensor.
///
/// Exactly one live instance exists per (sensor, code) pair at any time;
/// `cleared_at` stays `None` while the fault is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultCode {
    /// OBD-II trouble code, e.g. "P0236"
    pub code: String,
    /// Human-readable description
    pub description: String,
    /// Fault severity
    pub severity: Severity,
    /// Owning sensor id
    pub sensor_id: String,
    /// When the fault transitioned to active
    pub raised_at: DateTime<Utc>,
    /// When the fault cleared; `None` while active
    pub cleared_at: Option<DateTime<Utc>>,
    /// Whether the fault is currently active
    pub active: bool,
}

impl FaultCode {
    pub(crate) fn raise(spec: &ThresholdSpec, sensor_id: &str) -> Self {
        Self {
            code: spec.code.clone(),
            description: spec.description.clone(),
            severity: spec.severity,
            sensor_id: sensor_id.to_string(),
            raised_at: Utc::now(),
            cleared_at: None,
            active: true,
        }
    }
}

/// Hysteresis threshold pair for one breach direction.
///
/// `raise` is the outer band boundary (breach when crossed), `clear` the
/// inner band boundary (clearing progress only once back past it). The gap
/// between the two keeps a borderline value from toggling every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum Band {
    /// Breach when value >= `raise`; in-band when value <= `clear`
    Above {
        /// Outer band boundary
        raise: f64,
        /// Inner band boundary
        clear: f64,
    },
    /// Breach when value <= `raise`; in-band when value >= `clear`
    Below {
        /// Outer band boundary
        raise: f64,
        /// Inner band boundary
        clear: f64,
    },
}

impl Band {
    /// True when the value is outside the outer band.
    pub fn breached(&self, value: f64) -> bool {
        match *self {
            Band::Above { raise, .. } => value >= raise,
            Band::Below { raise, .. } => value <= raise,
        }
    }

    /// True when the value is back inside the inner band.
    pub fn in_clear_band(&self, value: f64) -> bool {
        match *self {
            Band::Above { clear, .. } => value <= clear,
            Band::Below { clear, .. } => value >= clear,
        }
    }

    fn validate(&self, code: &str) -> Result<(), ThresholdConfigError> {
        let (raise, clear) = match *self {
            Band::Above { raise, clear } | Band::Below { raise, clear } => (raise, clear),
        };
        if !raise.is_finite() || !clear.is_finite() {
            return Err(ThresholdConfigError::InvalidBand {
                code: code.to_string(),
                reason: "threshold values must be finite".to_string(),
            });
        }
        let ordered = match *self {
            Band::Above { raise, clear } => clear < raise,
            Band::Below { raise, clear } => clear > raise,
        };
        if !ordered {
            return Err(ThresholdConfigError::InvalidBand {
                code: code.to_string(),
                reason: format!(
                    "inner band ({clear}) must sit strictly inside outer band ({raise})"
                ),
            });
        }
        Ok(())
    }
}

/// Threshold and debounce configuration for one fault code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSpec {
    /// Fault code raised when the band is breached past debounce
    pub code: String,
    /// Description attached to the raised fault
    pub description: String,
    /// Severity attached to the raised fault
    pub severity: Severity,
    /// Hysteresis band
    pub band: Band,
    /// Consecutive samples required to raise, and symmetrically to clear
    pub debounce: u32,
}

impl ThresholdSpec {
    /// Build a spec from its parts.
    pub fn new(
        code: &str,
        description: &str,
        severity: Severity,
        band: Band,
        debounce: u32,
    ) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            severity,
            band,
            debounce,
        }
    }

    /// Check band ordering and debounce sanity.
    pub fn validate(&self) -> Result<(), ThresholdConfigError> {
        if self.debounce == 0 {
            return Err(ThresholdConfigError::ZeroDebounce {
                code: self.code.clone(),
            });
        }
        self.band.validate(&self.code)
    }
}

/// Per-(sensor, code) fault lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultState {
    /// No breach in progress
    Inactive,
    /// Consecutive breaches counted, not yet at debounce
    PendingRaise(u32),
    /// Fault raised and live
    Active,
    /// Consecutive in-band samples counted, not yet at debounce
    PendingClear(u32),
}

/// Malformed or missing threshold configuration. Fatal at engine construction.
#[derive(Debug, Error)]
pub enum ThresholdConfigError {
    /// Configuration names a sensor the fleet does not have
    #[error("unknown sensor id in configuration: {0}")]
    UnknownSensor(String),

    /// Configuration names a fault code the sensor does not carry
    #[error("sensor {sensor} has no fault code {code}")]
    UnknownCode {
        /// Sensor id the override targeted
        sensor: String,
        /// Unmatched fault code
        code: String,
    },

    /// Band boundaries are inverted or non-finite
    #[error("fault code {code}: {reason}")]
    InvalidBand {
        /// Fault code carrying the bad band
        code: String,
        /// What is wrong with it
        reason: String,
    },

    /// Debounce of zero would raise on the first sample unconditionally
    #[error("fault code {code}: debounce count must be at least 1")]
    ZeroDebounce {
        /// Fault code carrying the bad debounce
        code: String,
    },
}
