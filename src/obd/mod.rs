//! OBD acquisition seam - the capability the core needs from a protocol driver

mod sim;

pub use sim::{SimulatedLink, SimulationConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Parameter identifiers the sensor fleet queries.
///
/// One logical value per identifier; wire-level PID encoding belongs to the
/// protocol driver behind [`ObdLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    /// Turbocharger boost pressure, bar absolute
    TurboBoost,
    /// Manifold boost as percent of commanded target
    ManifoldPressurePct,
    /// Commanded boost target percent
    BoostTargetPct,
    /// Mass air flow, g/s
    MafRate,
    /// Common-rail fuel pressure, bar
    FuelRailPressure,
    /// Engine oil temperature, °C
    OilTemperature,
    /// Coolant temperature, °C
    CoolantTemperature,
    /// DPF soot load, percent
    DpfSootLoad,
    /// EGR flow rate, kg/h
    EgrFlow,
    /// Post-DPF NOx concentration, ppm
    NoxConcentration,
    /// Worst-cylinder glow plug resistance, ohms
    GlowPlugResistance,
    /// Worst-bank swirl flap deviation from commanded, percent
    SwirlFlapDeviation,
    /// Worst-cylinder injector balance rate magnitude, mg/stroke
    InjectorBalance,
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Acquisition failures, mapped by sensors onto their error taxonomy.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transient: the bus gave no answer this cycle
    #[error("no response for {0}")]
    NoResponse(Pid),

    /// The module behind the PID reported a circuit/signal anomaly
    #[error("signal fault on {pid}: {message}")]
    SignalFault {
        /// PID that faulted
        pid: Pid,
        /// Driver-reported detail
        message: String,
    },
}

/// Capability to read one value per PID.
///
/// Real OBD-II / VAG-COM drivers and the in-tree [`SimulatedLink`] both
/// satisfy this; the core never knows which is wired in.
#[async_trait]
pub trait ObdLink: Send + Sync {
    /// Query the current value for `pid`.
    async fn query(&self, pid: Pid) -> Result<f64, LinkError>;
}
