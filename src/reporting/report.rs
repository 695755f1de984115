// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Diagnostic report model and assembler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::SharedCell;
use crate::detection::{FaultCode, Severity};
use crate::sensors::SensorReading;

/// A consistent snapshot of latest readings and active faults.
///
/// Readings appear one per polled sensor, in sensor declaration order.
/// Summary severity is the maximum across active faults, `None` when the
/// active set is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    /// Vehicle the snapshot describes
    pub vehicle_id: String,
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Latest reading per sensor, declaration order
    pub readings: Vec<SensorReading>,
    /// Currently active faults
    pub faults: Vec<FaultCode>,
    /// Max severity across active faults; `None` with no active faults
    pub summary_severity: Option<Severity>,
}

/// Snapshot failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The engine was built with no sensors to report on
    #[error("no sensors configured")]
    EmptySensorSet,
}

/// Assembles reports from the per-sensor cells.
///
/// Each cell is read under its own lock, the same scope the polling path
/// updates, so a sensor's reading and fault state always reflect one
/// evaluation cycle. No global lock: a snapshot never stalls polling.
pub struct ReportAssembler {
    vehicle_id: String,
    cells: Vec<SharedCell>,
}

impl ReportAssembler {
    /// Build an assembler over cells in sensor declaration order.
    pub fn new(vehicle_id: &str, cells: Vec<SharedCell>) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            cells,
        }
    }

    /// Take one consistent snapshot.
    pub fn assemble(&self) -> Result<DiagnosticReport, ReportError> {
        if self.cells.is_empty() {
            return Err(ReportError::EmptySensorSet);
        }

        let mut readings = Vec::with_capacity(self.cells.len());
        let mut faults = Vec::new();

        for cell in &self.cells {
            let cell = cell.lock();
            if let Some(reading) = &cell.latest {
                readings.push(reading.clone());
            }
            faults.extend(cell.evaluator.active_faults());
        }

        let summary_severity = faults.iter().map(|f| f.severity).max();

        Ok(DiagnosticReport {
            vehicle_id: self.vehicle_id.clone(),
            generated_at: Utc::now(),
            readings,
            faults,
            summary_severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SensorCell;
    use crate::detection::{Band, FaultEvaluator, ThresholdSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn cell_with_thresholds(sensor_id: &str, specs: Vec<ThresholdSpec>) -> SharedCell {
        Arc::new(Mutex::new(SensorCell::new(
            sensor_id,
            FaultEvaluator::new(sensor_id, &specs),
        )))
    }

    fn reading(sensor_id: &str, value: f64) -> SensorReading {
        SensorReading {
            sensor_id: sensor_id.to_string(),
            timestamp: Utc::now(),
            value,
            unit: "%".to_string(),
            deviation: None,
        }
    }

    fn feed_value(cell: &SharedCell, value: f64) {
        let mut guard = cell.lock();
        let id = guard.sensor_id.clone();
        let r = reading(&id, value);
        guard.evaluator.observe(&r);
        guard.latest = Some(r);
    }

    fn breach_spec(code: &str, severity: Severity) -> ThresholdSpec {
        ThresholdSpec::new(
            code,
            "test threshold",
            severity,
            Band::Above {
                raise: 60.0,
                clear: 55.0,
            },
            1,
        )
    }

    #[test]
    fn empty_sensor_set_is_an_error() {
        let assembler = ReportAssembler::new("TDV6", Vec::new());
        assert!(matches!(
            assembler.assemble(),
            Err(ReportError::EmptySensorSet)
        ));
    }

    #[test]
    fn clean_cells_yield_reading_per_sensor_and_no_faults() {
        let cells = vec![
            cell_with_thresholds("turbocharger", vec![breach_spec("P0234", Severity::Critical)]),
            cell_with_thresholds("maf", Vec::new()),
        ];
        feed_value(&cells[0], 10.0);
        feed_value(&cells[1], 20.0);

        let report = ReportAssembler::new("E60-530d", cells).assemble().unwrap();
        assert_eq!(report.vehicle_id, "E60-530d");
        assert_eq!(report.readings.len(), 2);
        assert_eq!(report.readings[0].sensor_id, "turbocharger");
        assert_eq!(report.readings[1].sensor_id, "maf");
        assert!(report.faults.is_empty());
        assert_eq!(report.summary_severity, None);
    }

    #[test]
    fn unpolled_sensors_are_omitted_from_readings() {
        let cells = vec![
            cell_with_thresholds("turbocharger", Vec::new()),
            cell_with_thresholds("maf", Vec::new()),
        ];
        feed_value(&cells[0], 2.0);

        let report = ReportAssembler::new("TDV6", cells).assemble().unwrap();
        assert_eq!(report.readings.len(), 1);
        assert_eq!(report.readings[0].sensor_id, "turbocharger");
    }

    #[test]
    fn summary_severity_is_max_over_active_faults() {
        let cells = vec![
            cell_with_thresholds("boost_pressure", vec![breach_spec("P0236", Severity::High)]),
            cell_with_thresholds("dpf", vec![breach_spec("P2002", Severity::Warning)]),
        ];
        feed_value(&cells[0], 70.0);
        feed_value(&cells[1], 70.0);

        let report = ReportAssembler::new("TDV6", cells).assemble().unwrap();
        assert_eq!(report.faults.len(), 2);
        assert_eq!(report.summary_severity, Some(Severity::High));
    }

    #[test]
    fn report_serializes_in_renderer_shape() {
        let cells = vec![cell_with_thresholds(
            "boost_pressure",
            vec![breach_spec("P0236", Severity::High)],
        )];
        feed_value(&cells[0], 70.0);

        let report = ReportAssembler::new("TDV6", cells).assemble().unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();

        assert!(value.get("vehicleId").is_some());
        assert!(value.get("generatedAt").is_some());
        assert!(value["readings"][0].get("sensorId").is_some());
        assert!(value["faults"][0].get("raisedAt").is_some());
        assert_eq!(value["summarySeverity"], "high");
    }
}
