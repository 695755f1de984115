//! Sensor module - capability contract and the twelve monitored subsystems

mod electrical;
mod emissions;
mod fuel;
mod intake;
mod temperature;
mod traits;
mod turbo;

pub use electrical::GlowPlugSensor;
pub use emissions::{DpfSensor, EgrSensor, NoxSensor};
pub use fuel::{FuelPressureSensor, InjectorSensor};
pub use intake::{MafSensor, SwirlFlapSensor};
pub use temperature::{CoolantTemperatureSensor, OilTemperatureSensor};
pub use traits::{Sensor, SensorError, SensorReading};
pub use turbo::{BoostPressureSensor, TurbochargerSensor};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SensorOverrides};
use crate::detection::{ThresholdConfigError, ThresholdSpec};
use crate::obd::ObdLink;

type Defaults = fn(u32) -> Vec<ThresholdSpec>;
type Ctor = fn(Arc<dyn ObdLink>, Duration, Vec<ThresholdSpec>) -> Box<dyn Sensor>;

/// The fleet in declaration order: reports list sensors in this order.
const FLEET: [(&str, Defaults, Ctor); 12] = [
    (
        TurbochargerSensor::ID,
        TurbochargerSensor::default_thresholds,
        |l, i, t| Box::new(TurbochargerSensor::new(l, i, t)),
    ),
    (
        BoostPressureSensor::ID,
        BoostPressureSensor::default_thresholds,
        |l, i, t| Box::new(BoostPressureSensor::new(l, i, t)),
    ),
    (
        MafSensor::ID,
        MafSensor::default_thresholds,
        |l, i, t| Box::new(MafSensor::new(l, i, t)),
    ),
    (
        FuelPressureSensor::ID,
        FuelPressureSensor::default_thresholds,
        |l, i, t| Box::new(FuelPressureSensor::new(l, i, t)),
    ),
    (
        OilTemperatureSensor::ID,
        OilTemperatureSensor::default_thresholds,
        |l, i, t| Box::new(OilTemperatureSensor::new(l, i, t)),
    ),
    (
        CoolantTemperatureSensor::ID,
        CoolantTemperatureSensor::default_thresholds,
        |l, i, t| Box::new(CoolantTemperatureSensor::new(l, i, t)),
    ),
    (
        DpfSensor::ID,
        DpfSensor::default_thresholds,
        |l, i, t| Box::new(DpfSensor::new(l, i, t)),
    ),
    (
        EgrSensor::ID,
        EgrSensor::default_thresholds,
        |l, i, t| Box::new(EgrSensor::new(l, i, t)),
    ),
    (
        NoxSensor::ID,
        NoxSensor::default_thresholds,
        |l, i, t| Box::new(NoxSensor::new(l, i, t)),
    ),
    (
        GlowPlugSensor::ID,
        GlowPlugSensor::default_thresholds,
        |l, i, t| Box::new(GlowPlugSensor::new(l, i, t)),
    ),
    (
        SwirlFlapSensor::ID,
        SwirlFlapSensor::default_thresholds,
        |l, i, t| Box::new(SwirlFlapSensor::new(l, i, t)),
    ),
    (
        InjectorSensor::ID,
        InjectorSensor::default_thresholds,
        |l, i, t| Box::new(InjectorSensor::new(l, i, t)),
    ),
];

/// Sensor ids in declaration order.
pub fn sensor_ids() -> Vec<&'static str> {
    FLEET.iter().map(|(id, _, _)| *id).collect()
}

/// Build the full fleet with configuration applied and validated.
///
/// Unknown sensor ids or fault codes in the configuration, inverted bands,
/// and zero debounce counts all abort construction.
pub fn build_fleet(
    link: Arc<dyn ObdLink>,
    config: &Config,
) -> Result<Vec<Box<dyn Sensor>>, ThresholdConfigError> {
    for id in config.sensors.keys() {
        if !FLEET.iter().any(|(fleet_id, _, _)| *fleet_id == id.as_str()) {
            return Err(ThresholdConfigError::UnknownSensor(id.clone()));
        }
    }

    let default_interval = Duration::from_millis(config.poll_interval_ms);
    let mut sensors: Vec<Box<dyn Sensor>> = Vec::with_capacity(FLEET.len());

    for (id, defaults, ctor) in FLEET {
        let overrides = config.sensors.get(id);
        let mut specs = defaults(config.default_debounce);

        if let Some(overrides) = overrides {
            apply_overrides(id, overrides, &mut specs)?;
        }
        for spec in &specs {
            spec.validate()?;
        }

        let interval = overrides
            .and_then(|o| o.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(default_interval);

        sensors.push(ctor(link.clone(), interval, specs));
    }

    Ok(sensors)
}

fn apply_overrides(
    sensor_id: &str,
    overrides: &SensorOverrides,
    specs: &mut [ThresholdSpec],
) -> Result<(), ThresholdConfigError> {
    if let Some(debounce) = overrides.debounce {
        for spec in specs.iter_mut() {
            spec.debounce = debounce;
        }
    }

    for threshold in &overrides.thresholds {
        let spec = specs
            .iter_mut()
            .find(|s| s.code == threshold.code)
            .ok_or_else(|| ThresholdConfigError::UnknownCode {
                sensor: sensor_id.to_string(),
                code: threshold.code.clone(),
            })?;

        spec.band = match spec.band {
            crate::detection::Band::Above { raise, clear } => crate::detection::Band::Above {
                raise: threshold.raise.unwrap_or(raise),
                clear: threshold.clear.unwrap_or(clear),
            },
            crate::detection::Band::Below { raise, clear } => crate::detection::Band::Below {
                raise: threshold.raise.unwrap_or(raise),
                clear: threshold.clear.unwrap_or(clear),
            },
        };
        if let Some(debounce) = threshold.debounce {
            spec.debounce = debounce;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SensorOverrides, ThresholdOverride};
    use crate::obd::{SimulatedLink, SimulationConfig};

    fn sim_link() -> Arc<dyn ObdLink> {
        Arc::new(SimulatedLink::new(SimulationConfig {
            seed: Some(1),
            excursion_probability: 0.0,
            dropout_probability: 0.0,
            signal_fault_probability: 0.0,
        }))
    }

    #[test]
    fn fleet_has_twelve_unique_sensors_in_order() {
        let fleet = build_fleet(sim_link(), &Config::default()).unwrap();
        assert_eq!(fleet.len(), 12);

        let ids: Vec<&str> = fleet.iter().map(|s| s.id()).collect();
        assert_eq!(ids, sensor_ids());

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 12);
    }

    #[test]
    fn every_sensor_carries_validated_thresholds() {
        let fleet = build_fleet(sim_link(), &Config::default()).unwrap();
        for sensor in &fleet {
            assert!(!sensor.thresholds().is_empty(), "{} has no thresholds", sensor.id());
            for spec in sensor.thresholds() {
                spec.validate().unwrap();
            }
        }
    }

    #[test]
    fn interval_override_applies_to_one_sensor_only() {
        let mut config = Config::default();
        config.sensors.insert(
            "dpf".to_string(),
            SensorOverrides {
                interval_ms: Some(5000),
                ..Default::default()
            },
        );

        let fleet = build_fleet(sim_link(), &config).unwrap();
        for sensor in &fleet {
            let expected = if sensor.id() == "dpf" { 5000 } else { config.poll_interval_ms };
            assert_eq!(sensor.interval(), Duration::from_millis(expected));
        }
    }

    #[test]
    fn threshold_override_rewrites_band_and_debounce() {
        let mut config = Config::default();
        config.sensors.insert(
            "boost_pressure".to_string(),
            SensorOverrides {
                thresholds: vec![ThresholdOverride {
                    code: "P0236".to_string(),
                    raise: Some(65.0),
                    clear: Some(58.0),
                    debounce: Some(5),
                }],
                ..Default::default()
            },
        );

        let fleet = build_fleet(sim_link(), &config).unwrap();
        let boost = fleet.iter().find(|s| s.id() == "boost_pressure").unwrap();
        let spec = &boost.thresholds()[0];
        assert_eq!(spec.debounce, 5);
        assert!(spec.band.breached(65.0));
        assert!(!spec.band.breached(63.0));
        assert!(spec.band.in_clear_band(58.0));
    }

    #[test]
    fn unknown_sensor_id_is_fatal() {
        let mut config = Config::default();
        config
            .sensors
            .insert("flux_capacitor".to_string(), SensorOverrides::default());

        assert!(matches!(
            build_fleet(sim_link(), &config),
            Err(ThresholdConfigError::UnknownSensor(_))
        ));
    }

    #[test]
    fn unknown_code_is_fatal() {
        let mut config = Config::default();
        config.sensors.insert(
            "maf".to_string(),
            SensorOverrides {
                thresholds: vec![ThresholdOverride {
                    code: "P9999".to_string(),
                    raise: None,
                    clear: None,
                    debounce: None,
                }],
                ..Default::default()
            },
        );

        assert!(matches!(
            build_fleet(sim_link(), &config),
            Err(ThresholdConfigError::UnknownCode { .. })
        ));
    }

    #[test]
    fn inverted_override_is_fatal() {
        let mut config = Config::default();
        config.sensors.insert(
            "boost_pressure".to_string(),
            SensorOverrides {
                thresholds: vec![ThresholdOverride {
                    code: "P0236".to_string(),
                    raise: Some(50.0),
                    clear: Some(60.0),
                    debounce: None,
                }],
                ..Default::default()
            },
        );

        assert!(matches!(
            build_fleet(sim_link(), &config),
            Err(ThresholdConfigError::InvalidBand { .. })
        ));
    }

    #[tokio::test]
    async fn sensors_read_through_the_link() {
        let mut fleet = build_fleet(sim_link(), &Config::default()).unwrap();
        for sensor in fleet.iter_mut() {
            let reading = sensor.read().await.unwrap();
            assert_eq!(reading.sensor_id, sensor.id());
            assert_eq!(reading.unit, sensor.unit());
            assert!(reading.value.is_finite());
        }
    }

    #[tokio::test]
    async fn boost_reading_carries_deviation() {
        let mut fleet = build_fleet(sim_link(), &Config::default()).unwrap();
        let boost = fleet
            .iter_mut()
            .find(|s| s.id() == "boost_pressure")
            .unwrap();
        let reading = boost.read().await.unwrap();
        assert!(reading.deviation.is_some());
    }
}
