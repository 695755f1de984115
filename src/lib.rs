// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! DervMon - Diesel Engine Sensor Monitor
//!
//! An event-driven diagnostic engine for diesel powertrains:
//! - 12 sensor modules covering turbo, fuelling, temperatures and emissions
//! - Debounced, hysteresis-banded fault detection per OBD-II trouble code
//! - Non-blocking pub/sub event bus with bounded per-subscriber queues
//! - Staggered per-sensor polling with graceful, bounded-time shutdown
//! - Consistent diagnostic report snapshots on demand or on a cadence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Diagnostic Engine                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌───────────┐   ┌───────────┐                │
//! │  │  Event  │ → │  Sensors  │ → │   Fault   │                │
//! │  │  Feed   │   │ (12 PIDs) │   │ Evaluator │                │
//! │  └─────────┘   └───────────┘   └───────────┘                │
//! │       ↓              ↓               ↓                      │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                     Event Bus                       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │       ↓              ↓               ↓                      │
//! │  ┌─────────┐   ┌───────────┐   ┌───────────┐                │
//! │  │  Report │   │  Alert    │   │ External  │                │
//! │  │Assembler│   │  Logging  │   │Subscribers│                │
//! │  └─────────┘   └───────────┘   └───────────┘                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod config;
pub mod core;
pub mod detection;
pub mod obd;
pub mod reporting;
pub mod sensors;

// Re-exports for convenience
pub use config::Config;
pub use core::{DiagnosticEngine, Event, EventBus, EventType};
pub use detection::{FaultCode, Severity};
pub use obd::{ObdLink, SimulatedLink};
pub use reporting::DiagnosticReport;
pub use sensors::{Sensor, SensorReading};

/// DervMon version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// DervMon name
pub const NAME: &str = "DervMon";
