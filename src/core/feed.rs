// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Event feed - drives sensor polling on independent, staggered intervals

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Event, EventBus, FeedStats, SharedCell};
use crate::detection::FaultTransition;
use crate::sensors::{Sensor, SensorError};

/// Polls every sensor on its own interval and publishes resulting events.
///
/// Each sensor gets a dedicated task; start times are staggered across the
/// sensor's interval so twelve timers do not burst simultaneously. One
/// sensor failing, or running slow, never delays another.
pub struct EventFeed {
    bus: Arc<EventBus>,
    stats: Arc<FeedStats>,
    pairs: Vec<(Box<dyn Sensor>, SharedCell)>,
}

impl EventFeed {
    /// Build a feed over sensor/cell pairs sharing one bus.
    pub fn new(bus: Arc<EventBus>, stats: Arc<FeedStats>, pairs: Vec<(Box<dyn Sensor>, SharedCell)>) -> Self {
        Self { bus, stats, pairs }
    }

    /// Run until the shutdown signal fires.
    ///
    /// In-flight reads are allowed to finish; no new cycles start after
    /// the signal, and tasks still running past `grace` are aborted.
    pub async fn run(self, shutdown: broadcast::Sender<()>, grace: Duration) {
        let count = self.pairs.len().max(1);
        let mut tasks = JoinSet::new();

        for (idx, (sensor, cell)) in self.pairs.into_iter().enumerate() {
            let stagger = sensor.interval().mul_f64(idx as f64 / count as f64);
            tasks.spawn(poll_sensor(
                sensor,
                cell,
                self.bus.clone(),
                self.stats.clone(),
                shutdown.subscribe(),
                stagger,
            ));
        }
        info!("event feed started: {} polling tasks", count);

        let mut stop = shutdown.subscribe();
        let _ = stop.recv().await;

        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("feed tasks did not stop within grace period, aborting");
            tasks.abort_all();
        }
        info!("event feed stopped");
    }
}

async fn poll_sensor(
    mut sensor: Box<dyn Sensor>,
    cell: SharedCell,
    bus: Arc<EventBus>,
    stats: Arc<FeedStats>,
    mut shutdown: broadcast::Receiver<()>,
    stagger: Duration,
) {
    use std::sync::atomic::Ordering::Relaxed;

    let mut ticker = interval_at(Instant::now() + stagger, sensor.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        sensor = sensor.id(),
        interval_ms = sensor.interval().as_millis() as u64,
        "sensor polling started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => break,
        }
        stats.ticks.fetch_add(1, Relaxed);

        match sensor.read().await {
            Ok(reading) => {
                stats.readings.fetch_add(1, Relaxed);
                // latest reading and fault state move together, one lock scope
                let transitions = {
                    let mut guard = cell.lock();
                    let transitions = guard.evaluator.observe(&reading);
                    guard.latest = Some(reading.clone());
                    transitions
                };
                bus.publish(Event::reading(reading));
                for transition in transitions {
                    match &transition {
                        FaultTransition::Raised(_) => stats.faults_raised.fetch_add(1, Relaxed),
                        FaultTransition::Cleared(_) => stats.faults_cleared.fetch_add(1, Relaxed),
                    };
                    bus.publish(Event::fault(transition));
                }
            }
            Err(SensorError::Unavailable(reason)) => {
                // transient: skip this cycle only, next interval retries
                stats.read_errors.fetch_add(1, Relaxed);
                warn!(sensor = sensor.id(), %reason, "sensor unavailable, skipping cycle");
            }
            Err(SensorError::Fault { code, message }) => {
                stats.read_errors.fetch_add(1, Relaxed);
                let transition = cell.lock().evaluator.hardware_fault(&code, &message);
                if let Some(transition) = transition {
                    stats.faults_raised.fetch_add(1, Relaxed);
                    warn!(sensor = sensor.id(), %code, %message, "hardware fault reported");
                    bus.publish(Event::fault(transition));
                }
            }
        }
    }

    debug!(sensor = sensor.id(), "sensor polling stopped");
}
