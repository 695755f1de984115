// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Simulated acquisition adapter for demo/testing

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use super::{LinkError, ObdLink, Pid};

/// Tuning knobs for the simulated link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for reproducible runs; entropy-seeded when `None`
    pub seed: Option<u64>,
    /// Per-query probability of starting an out-of-band excursion
    pub excursion_probability: f64,
    /// Per-query probability of a transient no-response
    pub dropout_probability: f64,
    /// Per-query probability of a reported signal fault
    pub signal_fault_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            excursion_probability: 0.02,
            dropout_probability: 0.005,
            signal_fault_probability: 0.0,
        }
    }
}

struct SimState {
    rng: StdRng,
    // PID -> remaining excursion cycles; excursions persist long enough
    // for a debounced fault to develop
    excursions: HashMap<Pid, u32>,
}

/// Generates plausible engine telemetry per PID.
///
/// Values hover around nominal operating points; occasional excursions push
/// a PID out of band for several consecutive cycles so downstream debounce
/// logic sees realistic sustained breaches.
pub struct SimulatedLink {
    config: SimulationConfig,
    state: Mutex<SimState>,
}

impl SimulatedLink {
    /// Build a link, entropy-seeded unless the config pins a seed.
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            state: Mutex::new(SimState {
                rng,
                excursions: HashMap::new(),
            }),
        }
    }

    /// Nominal and excursion distributions per PID: (mean, std).
    fn profiles(pid: Pid) -> ((f64, f64), (f64, f64)) {
        match pid {
            Pid::TurboBoost => ((2.0, 0.15), (3.0, 0.1)),
            Pid::ManifoldPressurePct => ((48.0, 3.0), (70.0, 3.0)),
            Pid::BoostTargetPct => ((50.0, 1.5), (50.0, 1.5)),
            Pid::MafRate => ((120.0, 30.0), (10.0, 3.0)),
            Pid::FuelRailPressure => ((900.0, 150.0), (250.0, 30.0)),
            Pid::OilTemperature => ((105.0, 8.0), (138.0, 4.0)),
            Pid::CoolantTemperature => ((95.0, 4.0), (113.0, 2.5)),
            Pid::DpfSootLoad => ((45.0, 10.0), (85.0, 4.0)),
            Pid::EgrFlow => ((4.0, 1.2), (0.3, 0.1)),
            Pid::NoxConcentration => ((120.0, 30.0), (230.0, 20.0)),
            Pid::GlowPlugResistance => ((0.6, 0.15), (2.5, 0.4)),
            Pid::SwirlFlapDeviation => ((2.0, 1.0), (8.0, 1.5)),
            Pid::InjectorBalance => ((1.2, 0.6), (4.0, 0.5)),
        }
    }
}

#[async_trait]
impl ObdLink for SimulatedLink {
    async fn query(&self, pid: Pid) -> Result<f64, LinkError> {
        let mut state = self.state.lock();

        if state.rng.gen::<f64>() < self.config.dropout_probability {
            return Err(LinkError::NoResponse(pid));
        }
        if state.rng.gen::<f64>() < self.config.signal_fault_probability {
            return Err(LinkError::SignalFault {
                pid,
                message: "implausible signal level".to_string(),
            });
        }

        let excursion_left = state.excursions.get(&pid).copied().unwrap_or(0);
        let in_excursion = if excursion_left > 0 {
            if excursion_left == 1 {
                state.excursions.remove(&pid);
            } else {
                state.excursions.insert(pid, excursion_left - 1);
            }
            true
        } else if state.rng.gen::<f64>() < self.config.excursion_probability {
            let duration = state.rng.gen_range(6..=12);
            state.excursions.insert(pid, duration);
            true
        } else {
            false
        };

        let ((nominal_mean, nominal_std), (exc_mean, exc_std)) = Self::profiles(pid);
        let (mean, std) = if in_excursion {
            (exc_mean, exc_std)
        } else {
            (nominal_mean, nominal_std)
        };

        let value = state.rng.sample::<f64, _>(Normal::new(mean, std).unwrap());

        // resistances, flows and percentages cannot go negative
        let value = match pid {
            Pid::GlowPlugResistance
            | Pid::SwirlFlapDeviation
            | Pid::InjectorBalance
            | Pid::EgrFlow
            | Pid::DpfSootLoad
            | Pid::NoxConcentration => value.abs(),
            _ => value,
        };

        Ok((value * 1000.0).round() / 1000.0)
    }
}
