// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Debounced fault state machine, one instance per sensor

use chrono::Utc;
use tracing::debug;

use super::{FaultCode, FaultState, Severity, ThresholdSpec};
use crate::sensors::SensorReading;

/// A fault lifecycle transition produced by one evaluation cycle.
#[derive(Debug, Clone)]
pub enum FaultTransition {
    /// A fault crossed its debounce count and went active
    Raised(FaultCode),
    /// An active fault sustained in-band samples and cleared
    Cleared(FaultCode),
}

struct CodeSlot {
    spec: ThresholdSpec,
    state: FaultState,
    fault: Option<FaultCode>,
}

/// Evaluates readings for one sensor against its threshold specs.
///
/// State is mutated only by the polling path; reporting reads it through the
/// same lock scope that guards the latest reading, so a snapshot never
/// observes a torn transition.
pub struct FaultEvaluator {
    sensor_id: String,
    slots: Vec<CodeSlot>,
    /// Self-reported hardware anomaly, raised without debounce
    hardware: Option<FaultCode>,
}

impl FaultEvaluator {
    /// Build an evaluator for `sensor_id` over its threshold specs.
    pub fn new(sensor_id: &str, specs: &[ThresholdSpec]) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            slots: specs
                .iter()
                .map(|spec| CodeSlot {
                    spec: spec.clone(),
                    state: FaultState::Inactive,
                    fault: None,
                })
                .collect(),
            hardware: None,
        }
    }

    /// Feed one reading through every threshold state machine.
    ///
    /// Returns the transitions this cycle produced, raise/clear only; a
    /// re-breach while active or a broken pending streak produces nothing.
    pub fn observe(&mut self, reading: &SensorReading) -> Vec<FaultTransition> {
        let mut transitions = Vec::new();

        // A successful read clears any self-reported hardware anomaly.
        if let Some(mut fault) = self.hardware.take() {
            fault.active = false;
            fault.cleared_at = Some(Utc::now());
            debug!(sensor = %self.sensor_id, code = %fault.code, "hardware fault cleared");
            transitions.push(FaultTransition::Cleared(fault));
        }

        let value = reading.value;
        for slot in &mut self.slots {
            let breached = slot.spec.band.breached(value);
            let in_band = slot.spec.band.in_clear_band(value);

            slot.state = match slot.state {
                FaultState::Inactive => {
                    if breached {
                        if slot.spec.debounce <= 1 {
                            transitions.push(slot.raise(&self.sensor_id));
                            FaultState::Active
                        } else {
                            FaultState::PendingRaise(1)
                        }
                    } else {
                        FaultState::Inactive
                    }
                }
                FaultState::PendingRaise(count) => {
                    if breached {
                        if count + 1 >= slot.spec.debounce {
                            transitions.push(slot.raise(&self.sensor_id));
                            FaultState::Active
                        } else {
                            FaultState::PendingRaise(count + 1)
                        }
                    } else {
                        // streak broken: pending count back to zero
                        FaultState::Inactive
                    }
                }
                FaultState::Active => {
                    if in_band {
                        if slot.spec.debounce <= 1 {
                            transitions.push(slot.clear(&self.sensor_id));
                            FaultState::Inactive
                        } else {
                            FaultState::PendingClear(1)
                        }
                    } else {
                        // re-breach or hysteresis gap: stays active, no re-raise
                        FaultState::Active
                    }
                }
                FaultState::PendingClear(count) => {
                    if in_band {
                        if count + 1 >= slot.spec.debounce {
                            transitions.push(slot.clear(&self.sensor_id));
                            FaultState::Inactive
                        } else {
                            FaultState::PendingClear(count + 1)
                        }
                    } else {
                        FaultState::Active
                    }
                }
            };
        }

        transitions
    }

    /// Raise a sensor-reported hardware anomaly, bypassing debounce.
    ///
    /// Idempotent while the anomaly persists; cleared by the next
    /// successful read in [`observe`](Self::observe).
    pub fn hardware_fault(&mut self, code: &str, message: &str) -> Option<FaultTransition> {
        if self.hardware.is_some() {
            return None;
        }
        let fault = FaultCode {
            code: code.to_string(),
            description: message.to_string(),
            severity: Severity::High,
            sensor_id: self.sensor_id.clone(),
            raised_at: Utc::now(),
            cleared_at: None,
            active: true,
        };
        self.hardware = Some(fault.clone());
        Some(FaultTransition::Raised(fault))
    }

    /// Currently active faults, threshold and hardware alike.
    pub fn active_faults(&self) -> Vec<FaultCode> {
        self.slots
            .iter()
            .filter_map(|slot| slot.fault.clone())
            .chain(self.hardware.clone())
            .collect()
    }
}

impl CodeSlot {
    fn raise(&mut self, sensor_id: &str) -> FaultTransition {
        let fault = FaultCode::raise(&self.spec, sensor_id);
        self.fault = Some(fault.clone());
        FaultTransition::Raised(fault)
    }

    fn clear(&mut self, sensor_id: &str) -> FaultTransition {
        // a live fault instance always exists in Active/PendingClear
        let mut fault = self
            .fault
            .take()
            .unwrap_or_else(|| FaultCode::raise(&self.spec, sensor_id));
        fault.active = false;
        fault.cleared_at = Some(Utc::now());
        FaultTransition::Cleared(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Band;
    use chrono::Utc;

    fn reading(value: f64) -> SensorReading {
        SensorReading {
            sensor_id: "boost_pressure".to_string(),
            timestamp: Utc::now(),
            value,
            unit: "%".to_string(),
            deviation: None,
        }
    }

    fn boost_spec(debounce: u32) -> Vec<ThresholdSpec> {
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

    fn raised(transitions: &[FaultTransition]) -> Vec<&FaultCode> {
        transitions
            .iter()
            .filter_map(|t| match t {
                FaultTransition::Raised(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }

    fn cleared(transitions: &[FaultTransition]) -> Vec<&FaultCode> {
        transitions
            .iter()
            .filter_map(|t| match t {
                FaultTransition::Cleared(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn raises_only_after_debounce_count() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(3));

        assert!(raised(&eval.observe(&reading(70.0))).is_empty());
        assert!(raised(&eval.observe(&reading(70.0))).is_empty());

        let third = eval.observe(&reading(70.0));
        let fc = raised(&third);
        assert_eq!(fc.len(), 1);
        assert_eq!(fc[0].code, "P0236");
        assert_eq!(fc[0].severity, Severity::High);
        assert!(fc[0].active);
        assert!(fc[0].cleared_at.is_none());
    }

    #[test]
    fn broken_streak_yields_no_raise() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(3));

        eval.observe(&reading(70.0));
        eval.observe(&reading(70.0));
        // in-band reading resets the pending count to zero
        assert!(eval.observe(&reading(50.0)).is_empty());

        // two more breaches are not enough again
        eval.observe(&reading(70.0));
        assert!(raised(&eval.observe(&reading(70.0))).is_empty());
        assert_eq!(raised(&eval.observe(&reading(70.0))).len(), 1);
    }

    #[test]
    fn re_breach_while_active_is_idempotent() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(3));
        for _ in 0..3 {
            eval.observe(&reading(70.0));
        }
        assert_eq!(eval.active_faults().len(), 1);

        for _ in 0..10 {
            assert!(eval.observe(&reading(75.0)).is_empty());
        }
        assert_eq!(eval.active_faults().len(), 1);
    }

    #[test]
    fn clears_after_symmetric_debounce() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(3));
        for _ in 0..3 {
            eval.observe(&reading(70.0));
        }

        assert!(cleared(&eval.observe(&reading(54.0))).is_empty());
        assert!(cleared(&eval.observe(&reading(53.0))).is_empty());

        let third = eval.observe(&reading(52.0));
        let fc = cleared(&third);
        assert_eq!(fc.len(), 1);
        assert_eq!(fc[0].code, "P0236");
        assert!(!fc[0].active);
        assert!(fc[0].cleared_at.is_some());
        assert!(eval.active_faults().is_empty());
    }

    #[test]
    fn isolated_in_band_reading_does_not_clear() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(3));
        for _ in 0..3 {
            eval.observe(&reading(70.0));
        }

        // one in-band sample amid breaches: clear streak broken, still active
        eval.observe(&reading(50.0));
        assert!(eval.observe(&reading(70.0)).is_empty());
        assert_eq!(eval.active_faults().len(), 1);
    }

    #[test]
    fn hysteresis_gap_neither_raises_nor_clears() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(2));
        eval.observe(&reading(70.0));
        eval.observe(&reading(70.0));
        assert_eq!(eval.active_faults().len(), 1);

        // 58 is inside the outer band but outside the inner band
        for _ in 0..5 {
            assert!(eval.observe(&reading(58.0)).is_empty());
        }
        assert_eq!(eval.active_faults().len(), 1);
    }

    #[test]
    fn debounce_of_one_raises_immediately() {
        let mut eval = FaultEvaluator::new("boost_pressure", &boost_spec(1));
        assert_eq!(raised(&eval.observe(&reading(70.0))).len(), 1);
        assert_eq!(cleared(&eval.observe(&reading(50.0))).len(), 1);
    }

    #[test]
    fn hardware_fault_raises_once_and_clears_on_read() {
        let mut eval = FaultEvaluator::new("maf", &[]);

        let first = eval.hardware_fault("P0100", "MAF circuit malfunction");
        assert!(matches!(first, Some(FaultTransition::Raised(_))));
        assert!(eval.hardware_fault("P0100", "MAF circuit malfunction").is_none());
        assert_eq!(eval.active_faults().len(), 1);

        let transitions = eval.observe(&reading(25.0));
        assert_eq!(cleared(&transitions).len(), 1);
        assert!(eval.active_faults().is_empty());
    }

    #[test]
    fn independent_codes_track_independently() {
        let specs = vec![
            ThresholdSpec::new(
                "P0299",
                "Turbocharger underboost condition",
                Severity::Warning,
                Band::Below {
                    raise: 1.4,
                    clear: 1.5,
                },
                2,
            ),
            ThresholdSpec::new(
                "P0234",
                "Turbocharger overboost condition",
                Severity::Critical,
                Band::Above {
                    raise: 2.8,
                    clear: 2.6,
                },
                2,
            ),
        ];
        let mut eval = FaultEvaluator::new("turbocharger", &specs);

        eval.observe(&reading(1.2));
        let t = eval.observe(&reading(1.2));
        assert_eq!(raised(&t).len(), 1);
        assert_eq!(raised(&t)[0].code, "P0299");

        // swinging high clears the low code and pends the high one
        eval.observe(&reading(3.0));
        let t = eval.observe(&reading(3.0));
        assert_eq!(raised(&t)[0].code, "P0234");
        assert_eq!(cleared(&t)[0].code, "P0299");
    }
}
