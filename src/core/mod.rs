//! Core module - engine, event bus, and the polling feed

mod engine;
mod event_bus;
mod feed;

pub use engine::{DiagnosticEngine, EngineError};
pub use event_bus::{
    Event, EventBus, EventPayload, EventType, HandlerFailure, SubscriptionHandle,
};
pub use feed::EventFeed;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::detection::FaultEvaluator;
use crate::sensors::SensorReading;

/// Per-sensor mutable state: latest reading plus fault evaluator.
///
/// Both sides are updated under one lock scope per poll cycle, and report
/// snapshots read through the same scope, so a reading and the fault state
/// it implies always come from the same evaluation cycle.
pub struct SensorCell {
    /// Owning sensor id
    pub sensor_id: String,
    /// Most recent successful reading, if any
    pub latest: Option<SensorReading>,
    /// Debounced fault state machine for this sensor
    pub evaluator: FaultEvaluator,
}

impl SensorCell {
    /// Build an empty cell for `sensor_id`.
    pub fn new(sensor_id: &str, evaluator: FaultEvaluator) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            latest: None,
            evaluator,
        }
    }
}

/// Cells are guarded per sensor so one sensor's update never blocks
/// another's poll or another's report read.
pub type SharedCell = Arc<Mutex<SensorCell>>;

/// Feed-wide counters, updated by the polling tasks.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub(crate) ticks: AtomicU64,
    pub(crate) readings: AtomicU64,
    pub(crate) read_errors: AtomicU64,
    pub(crate) faults_raised: AtomicU64,
    pub(crate) faults_cleared: AtomicU64,
}

impl FeedStats {
    /// Copy the counters into a plain snapshot.
    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            readings: self.readings.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            faults_raised: self.faults_raised.load(Ordering::Relaxed),
            faults_cleared: self.faults_cleared.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FeedStats`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedStatsSnapshot {
    /// Poll cycles started
    pub ticks: u64,
    /// Successful readings produced
    pub readings: u64,
    /// Cycles skipped on read failure
    pub read_errors: u64,
    /// Fault raise transitions
    pub faults_raised: u64,
    /// Fault clear transitions
    pub faults_cleared: u64,
}
