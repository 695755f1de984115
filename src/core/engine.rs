//! Diagnostic engine - wires sensors, evaluators, bus and feed together

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{Event, EventBus, EventFeed, FeedStats, FeedStatsSnapshot, SensorCell, SharedCell};
use crate::config::Config;
use crate::detection::{FaultEvaluator, ThresholdConfigError};
use crate::obd::ObdLink;
use crate::reporting::{DiagnosticReport, ReportAssembler, ReportError};
use crate::sensors;

/// Construction and lifecycle failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed threshold configuration aborts startup
    #[error(transparent)]
    Threshold(#[from] ThresholdConfigError),

    /// `run` was called a second time
    #[error("engine is already running or has already run")]
    AlreadyRunning,
}

/// Top-level orchestrator for a diagnostic session.
///
/// Construction validates all threshold configuration fatally; afterwards
/// the engine exposes the bus for external subscribers, on-demand report
/// snapshots, and a `run` loop that drives the feed until `stop`.
pub struct DiagnosticEngine {
    config: Arc<Config>,
    bus: Arc<EventBus>,
    stats: Arc<FeedStats>,
    assembler: ReportAssembler,
    feed: Mutex<Option<EventFeed>>,
    shutdown: broadcast::Sender<()>,
}

impl DiagnosticEngine {
    /// Build the engine from configuration and an acquisition link.
    ///
    /// Must be called within a tokio runtime (the bus spawns subscriber
    /// workers on subscribe).
    pub fn new(config: Config, link: Arc<dyn ObdLink>) -> Result<Self, EngineError> {
        let fleet = sensors::build_fleet(link, &config)?;

        let cells: Vec<SharedCell> = fleet
            .iter()
            .map(|sensor| {
                Arc::new(Mutex::new(SensorCell::new(
                    sensor.id(),
                    FaultEvaluator::new(sensor.id(), sensor.thresholds()),
                )))
            })
            .collect();

        let bus = Arc::new(EventBus::new(config.bus_queue_capacity));
        let stats = Arc::new(FeedStats::default());
        let assembler = ReportAssembler::new(&config.vehicle_id, cells.clone());

        let pairs = fleet.into_iter().zip(cells).collect();
        let feed = EventFeed::new(bus.clone(), stats.clone(), pairs);

        let (shutdown, _) = broadcast::channel(1);

        info!(
            vehicle = %config.vehicle_id,
            poll_interval_ms = config.poll_interval_ms,
            "diagnostic engine initialised with 12 sensors"
        );

        Ok(Self {
            config: Arc::new(config),
            bus,
            stats,
            assembler,
            feed: Mutex::new(Some(feed)),
            shutdown,
        })
    }

    /// The event bus, for external subscribers (alerting, persistence).
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current feed counters.
    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }

    /// Take an on-demand diagnostic report snapshot.
    pub fn snapshot(&self) -> Result<DiagnosticReport, ReportError> {
        self.assembler.assemble()
    }

    /// Signal the feed and the run loop to stop.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// Run the feed until [`stop`](Self::stop), publishing a `ReportReady`
    /// event every `report_interval`.
    ///
    /// Shutdown is graceful and bounded: in-flight reads finish, bus
    /// workers drain, and stragglers are abandoned after the configured
    /// grace period.
    pub async fn run(&self, report_interval: Duration) -> Result<(), EngineError> {
        let feed = self
            .feed
            .lock()
            .take()
            .ok_or(EngineError::AlreadyRunning)?;

        let grace = Duration::from_millis(self.config.shutdown_timeout_ms);
        let feed_task = tokio::spawn(feed.run(self.shutdown.clone(), grace));

        let mut stop = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(report_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; skip it

        info!(
            report_interval_s = report_interval.as_secs(),
            "diagnostic session running"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.assembler.assemble() {
                        Ok(report) => self.bus.publish(Event::report(report)),
                        Err(error) => warn!(%error, "report assembly failed"),
                    }
                }
                _ = stop.recv() => break,
            }
        }

        // feed observes the same signal; give it the grace period plus
        // scheduling slack before giving up on it
        let mut feed_task = feed_task;
        if tokio::time::timeout(grace + Duration::from_millis(500), &mut feed_task)
            .await
            .is_err()
        {
            warn!("feed did not stop in time, aborting");
            feed_task.abort();
        }

        self.bus.shutdown(grace).await;

        let stats = self.stats.snapshot();
        info!(
            ticks = stats.ticks,
            readings = stats.readings,
            read_errors = stats.read_errors,
            faults_raised = stats.faults_raised,
            faults_cleared = stats.faults_cleared,
            "diagnostic session ended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SensorOverrides, ThresholdOverride};
    use crate::core::{EventPayload, EventType};
    use crate::obd::{SimulatedLink, SimulationConfig};
    use std::sync::Mutex as StdMutex;

    fn quiet_link() -> Arc<dyn ObdLink> {
        Arc::new(SimulatedLink::new(SimulationConfig {
            seed: Some(11),
            excursion_probability: 0.0,
            dropout_probability: 0.0,
            signal_fault_probability: 0.0,
        }))
    }

    fn fast_config() -> Config {
        Config {
            poll_interval_ms: 10,
            shutdown_timeout_ms: 500,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn bad_threshold_config_aborts_construction() {
        let mut config = fast_config();
        config.sensors.insert(
            "nox".to_string(),
            SensorOverrides {
                thresholds: vec![ThresholdOverride {
                    code: "P2200".to_string(),
                    raise: Some(100.0),
                    clear: Some(200.0),
                    debounce: None,
                }],
                ..Default::default()
            },
        );

        assert!(matches!(
            DiagnosticEngine::new(config, quiet_link()),
            Err(EngineError::Threshold(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_before_any_poll_is_clean() {
        let engine = DiagnosticEngine::new(fast_config(), quiet_link()).unwrap();
        let report = engine.snapshot().unwrap();

        assert!(report.readings.is_empty());
        assert!(report.faults.is_empty());
        assert_eq!(report.summary_severity, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_polls_all_sensors_and_stops_cleanly() {
        let engine =
            Arc::new(DiagnosticEngine::new(fast_config(), quiet_link()).unwrap());

        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.stop();
        runner.await.unwrap().unwrap();

        // nominal simulated values breach nothing
        let report = engine.snapshot().unwrap();
        assert_eq!(report.readings.len(), 12);
        assert!(report.faults.is_empty());
        assert_eq!(report.summary_severity, None);
        assert!(engine.stats().readings >= 12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn report_cadence_publishes_report_ready() {
        let engine =
            Arc::new(DiagnosticEngine::new(fast_config(), quiet_link()).unwrap());

        let reports = Arc::new(StdMutex::new(0usize));
        let sink = reports.clone();
        engine.bus().subscribe(
            move |event| {
                if matches!(event.payload, EventPayload::Report(_)) {
                    *sink.lock().unwrap() += 1;
                }
                Ok(())
            },
            Some(EventType::ReportReady),
        );

        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(Duration::from_millis(50)).await })
        };

        tokio::time::sleep(Duration::from_millis(220)).await;
        engine.stop();
        runner.await.unwrap().unwrap();

        assert!(*reports.lock().unwrap() >= 2);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let engine =
            Arc::new(DiagnosticEngine::new(fast_config(), quiet_link()).unwrap());

        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            engine.run(Duration::from_secs(60)).await,
            Err(EngineError::AlreadyRunning)
        ));

        engine.stop();
        let _ = runner.await;
    }
}
