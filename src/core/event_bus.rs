// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Event bus - pub/sub with bounded per-subscriber delivery queues
//!
//! Each subscriber owns a bounded queue drained by its own worker task, so
//! a publish never waits on handler execution and a slow consumer only ever
//! loses its own oldest backlog. Liveness of telemetry outranks
//! completeness of backlog.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::detection::{FaultCode, FaultTransition, Severity};
use crate::reporting::DiagnosticReport;
use crate::sensors::SensorReading;

/// Event types in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A sensor produced a reading
    Reading,
    /// A fault crossed its debounce and went active
    FaultRaised,
    /// An active fault cleared
    FaultCleared,
    /// A diagnostic report snapshot is available
    ReportReady,
}

/// Event payload, one variant per event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Reading payload
    Reading(SensorReading),
    /// Fault payload for raise and clear events
    Fault(FaultCode),
    /// Report payload
    Report(DiagnosticReport),
}

/// Immutable event envelope. Ids are assigned by the bus at publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Bus-assigned sequence number
    pub id: u64,
    /// Discriminant for subscriber filters
    pub event_type: EventType,
    /// Event severity
    pub severity: Severity,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
    /// Typed payload
    pub payload: EventPayload,
}

impl Event {
    fn new(event_type: EventType, severity: Severity, payload: EventPayload) -> Self {
        Self {
            id: 0,
            event_type,
            severity,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wrap a sensor reading.
    pub fn reading(reading: SensorReading) -> Self {
        Self::new(EventType::Reading, Severity::Info, EventPayload::Reading(reading))
    }

    /// Wrap a fault transition, raise or clear.
    pub fn fault(transition: FaultTransition) -> Self {
        match transition {
            FaultTransition::Raised(fault) => Self::new(
                EventType::FaultRaised,
                fault.severity,
                EventPayload::Fault(fault),
            ),
            FaultTransition::Cleared(fault) => Self::new(
                EventType::FaultCleared,
                Severity::Info,
                EventPayload::Fault(fault),
            ),
        }
    }

    /// Wrap a diagnostic report; severity mirrors the report summary.
    pub fn report(report: DiagnosticReport) -> Self {
        let severity = report.summary_severity.unwrap_or(Severity::Info);
        Self::new(EventType::ReportReady, severity, EventPayload::Report(report))
    }
}

/// Handler invoked on the subscriber's own worker task.
pub type Handler = Box<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Opaque, revocable subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// A handler failure forwarded on the error side-channel.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Failing subscription
    pub subscription: SubscriptionHandle,
    /// Event the handler failed on
    pub event_id: u64,
    /// Rendered error
    pub message: String,
}

struct Subscriber {
    id: u64,
    filter: Option<EventType>,
    handler: Handler,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

struct SubEntry {
    sub: Arc<Subscriber>,
    worker: JoinHandle<()>,
}

/// Central event bus for pub/sub communication.
pub struct EventBus {
    capacity: usize,
    subscribers: RwLock<HashMap<u64, SubEntry>>,
    next_sub_id: AtomicU64,
    next_event_id: AtomicU64,
    failure_tx: mpsc::Sender<HandlerFailure>,
    failure_rx: Mutex<Option<mpsc::Receiver<HandlerFailure>>>,
}

impl EventBus {
    /// Build a bus whose subscribers each hold at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (failure_tx, failure_rx) = mpsc::channel(256);
        Self {
            capacity: capacity.max(1),
            subscribers: RwLock::new(HashMap::new()),
            next_sub_id: AtomicU64::new(0),
            next_event_id: AtomicU64::new(0),
            failure_tx,
            failure_rx: Mutex::new(Some(failure_rx)),
        }
    }

    /// Register a handler, optionally filtered to one event type.
    ///
    /// Must be called within a tokio runtime; the handler runs on its own
    /// worker task and never on the publisher.
    pub fn subscribe<F>(&self, handler: F, filter: Option<EventType>) -> SubscriptionHandle
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let sub = Arc::new(Subscriber {
            id,
            filter,
            handler: Box::new(handler),
            queue: Mutex::new(VecDeque::with_capacity(self.capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let worker = tokio::spawn(worker_loop(sub.clone(), self.failure_tx.clone()));
        self.subscribers.write().insert(id, SubEntry { sub, worker });
        debug!(subscription = id, ?filter, "subscriber registered");
        SubscriptionHandle(id)
    }

    /// Revoke a subscription; pending queued events are discarded.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if let Some(entry) = self.subscribers.write().remove(&handle.0) {
            entry.sub.queue.lock().clear();
            entry.sub.closed.store(true, Ordering::Release);
            entry.sub.notify.notify_one();
        }
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Returns without waiting for any handler; a full subscriber queue
    /// drops its oldest event and bumps that subscriber's dropped counter.
    pub fn publish(&self, mut event: Event) {
        event.id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        let subscribers = self.subscribers.read();
        for entry in subscribers.values() {
            let sub = &entry.sub;
            if sub.filter.map_or(true, |f| f == event.event_type) {
                {
                    let mut queue = sub.queue.lock();
                    if queue.len() >= self.capacity {
                        queue.pop_front();
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    queue.push_back(event.clone());
                }
                sub.notify.notify_one();
            }
        }
    }

    /// Events dropped so far for a subscription, `None` once revoked.
    pub fn dropped_events(&self, handle: &SubscriptionHandle) -> Option<u64> {
        self.subscribers
            .read()
            .get(&handle.0)
            .map(|e| e.sub.dropped.load(Ordering::Relaxed))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Take the handler-failure side-channel; available once.
    pub fn take_failures(&self) -> Option<mpsc::Receiver<HandlerFailure>> {
        self.failure_rx.lock().take()
    }

    /// Signal all workers to drain and exit, abandoning stragglers.
    ///
    /// Each worker finishes its queued backlog; any worker still running
    /// after `timeout` is aborted rather than awaited indefinitely.
    pub async fn shutdown(&self, timeout: Duration) {
        let entries: Vec<SubEntry> = {
            let mut subscribers = self.subscribers.write();
            subscribers.drain().map(|(_, entry)| entry).collect()
        };

        for entry in &entries {
            entry.sub.closed.store(true, Ordering::Release);
            entry.sub.notify.notify_one();
        }

        for entry in entries {
            let id = entry.sub.id;
            let mut worker = entry.worker;
            if tokio::time::timeout(timeout, &mut worker).await.is_err() {
                warn!(subscription = id, "bus worker did not drain in time, abandoning");
                worker.abort();
            }
        }
    }
}

async fn worker_loop(sub: Arc<Subscriber>, failures: mpsc::Sender<HandlerFailure>) {
    loop {
        let next = sub.queue.lock().pop_front();
        match next {
            Some(event) => {
                if let Err(error) = (sub.handler)(&event) {
                    warn!(
                        subscription = sub.id,
                        event = event.id,
                        %error,
                        "event handler failed"
                    );
                    // side-channel is best effort; overflow only loses reports
                    let _ = failures.try_send(HandlerFailure {
                        subscription: SubscriptionHandle(sub.id),
                        event_id: event.id,
                        message: format!("{error:#}"),
                    });
                }
            }
            None => {
                if sub.closed.load(Ordering::Acquire) {
                    break;
                }
                sub.notify.notified().await;
            }
        }
    }
    debug!(subscription = sub.id, "bus worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    fn reading_event(sensor_id: &str, value: f64) -> Event {
        Event::reading(SensorReading {
            sensor_id: sensor_id.to_string(),
            timestamp: Utc::now(),
            value,
            unit: "bar".to_string(),
            deviation: None,
        })
    }

    fn collector() -> (Arc<StdMutex<Vec<u64>>>, impl Fn(&Event) -> anyhow::Result<()>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |event: &Event| {
            sink.lock().unwrap().push(event.id);
            Ok(())
        };
        (seen, handler)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn both_subscribers_receive_in_publish_order() {
        let bus = EventBus::new(16);
        let (seen_a, handler_a) = collector();
        let (seen_b, handler_b) = collector();
        bus.subscribe(handler_a, None);
        bus.subscribe(handler_b, None);

        let first = reading_event("turbocharger", 2.0);
        let second = reading_event("turbocharger", 2.1);
        bus.publish(first);
        bus.publish(second);
        settle().await;

        let a = seen_a.lock().unwrap().clone();
        let b = seen_b.lock().unwrap().clone();
        assert_eq!(a, vec![0, 1]);
        assert_eq!(b, vec![0, 1]);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(16);
        bus.publish(reading_event("maf", 100.0));

        let (seen, handler) = collector();
        bus.subscribe(handler, None);
        bus.publish(reading_event("maf", 110.0));
        settle().await;

        let ids = seen.lock().unwrap().clone();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn filter_limits_delivery_to_one_event_type() {
        let bus = EventBus::new(16);
        let (seen, handler) = collector();
        bus.subscribe(handler, Some(EventType::FaultRaised));

        bus.publish(reading_event("dpf", 50.0));
        let fault = FaultCode {
            code: "P2002".to_string(),
            description: "DPF soot load high".to_string(),
            severity: Severity::Warning,
            sensor_id: "dpf".to_string(),
            raised_at: Utc::now(),
            cleared_at: None,
            active: true,
        };
        bus.publish(Event::fault(FaultTransition::Raised(fault)));
        settle().await;

        let ids = seen.lock().unwrap().clone();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn failing_handler_keeps_receiving_and_does_not_affect_others() {
        let bus = EventBus::new(16);

        let calls = Arc::new(StdMutex::new(0usize));
        let counted = calls.clone();
        bus.subscribe(
            move |_event| {
                let mut calls = counted.lock().unwrap();
                *calls += 1;
                anyhow::bail!("handler exploded")
            },
            None,
        );

        let (seen, healthy) = collector();
        bus.subscribe(healthy, None);

        for i in 0..3 {
            bus.publish(reading_event("nox", 100.0 + i as f64));
        }
        settle().await;

        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn handler_failures_reach_the_side_channel() {
        let bus = EventBus::new(16);
        let mut failures = bus.take_failures().unwrap();
        let handle = bus.subscribe(|_event| anyhow::bail!("boom"), None);

        bus.publish(reading_event("egr", 4.0));
        settle().await;

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.subscription, handle);
        assert!(failure.message.contains("boom"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overflow_drops_oldest_and_counts() {
        let bus = EventBus::new(2);

        // a handler that blocks until released, so the queue backs up
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let permit_gate = gate.clone();
        let (seen, sink) = {
            let seen = Arc::new(StdMutex::new(Vec::new()));
            let sink = seen.clone();
            (seen, sink)
        };
        let handle = bus.subscribe(
            move |event: &Event| {
                // first call parks until the test releases the gate
                while permit_gate.try_acquire().is_err() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                sink.lock().unwrap().push(event.id);
                Ok(())
            },
            None,
        );

        // one event in flight on the worker, then overfill the queue
        for i in 0..5 {
            bus.publish(reading_event("fuel_pressure", 900.0 + i as f64));
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(bus.dropped_events(&handle).unwrap() >= 1);

        gate.add_permits(16);
        settle().await;

        // newest events survive, oldest were dropped
        let ids = seen.lock().unwrap().clone();
        assert!(ids.contains(&4));
        assert!(ids.len() < 5);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(16);
        let (seen, handler) = collector();
        let handle = bus.subscribe(handler, None);

        bus.publish(reading_event("coolant_temperature", 95.0));
        settle().await;
        bus.unsubscribe(&handle);
        bus.publish(reading_event("coolant_temperature", 96.0));
        settle().await;

        assert_eq!(seen.lock().unwrap().clone(), vec![0]);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.dropped_events(&handle).is_none());
    }

    #[tokio::test]
    async fn shutdown_drains_queued_events() {
        let bus = EventBus::new(16);
        let (seen, handler) = collector();
        bus.subscribe(handler, None);

        for i in 0..4 {
            bus.publish(reading_event("oil_temperature", 100.0 + i as f64));
        }
        bus.shutdown(Duration::from_secs(1)).await;

        assert_eq!(seen.lock().unwrap().len(), 4);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
