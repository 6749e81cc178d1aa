//! Flush cycles: take a batch from the queue, send it, commit what landed
//!
//! One [`FlushEngine`] exists per manager and is shared with the timer task.
//! Cycles are serialized with a try-lock: a cycle requested while another is
//! running is skipped rather than queued, so the same events are never in
//! two requests at once.
//!
//! Each cycle looks only at the first `batch_size` events. If those all belong
//! to an endpoint that keeps asking for a retry, events for other endpoints
//! behind them wait until it recovers or the queue limit evicts the head.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

use super::event::{group_by_route, Event};
use super::queue::EventQueue;
use super::store::QueueStore;
use super::transport::{classify_status, Delivery, Transport};

/// Outcome of a single flush cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Events confirmed delivered (2xx) and removed from the queue
    pub delivered: usize,
    /// Events the server rejected permanently and that were removed
    pub dropped: usize,
    /// Events left queued for the next cycle
    pub retained: usize,
    /// Requests issued
    pub requests: usize,
    /// Requests that failed or asked to be retried
    pub failures: usize,
    /// True when another cycle was already in flight
    pub skipped: bool,
}

/// Cumulative delivery statistics for a manager
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushStats {
    /// Flush cycles that ran (skipped ones excluded)
    pub cycles: usize,
    /// Total events delivered
    pub events_sent: usize,
    /// Total events dropped after a permanent rejection
    pub events_dropped: usize,
    /// Total events evicted because the queue was full
    pub events_evicted: usize,
    /// Number of requests made
    pub requests: usize,
    /// Number of failed or retryable requests
    pub request_failures: usize,
}

/// Shared state behind a manager: queue, store, transport and cycle guard
pub struct FlushEngine {
    token: String,
    queue: EventQueue,
    store: QueueStore,
    transport: Arc<dyn Transport>,
    batch_size: usize,
    persist_on_flush: bool,
    in_flight: tokio::sync::Mutex<()>,
    /// Held across snapshot + write so an older snapshot never lands last
    archive_lock: Mutex<()>,
    stats: Mutex<FlushStats>,
}

impl FlushEngine {
    pub fn new(
        token: String,
        queue: EventQueue,
        store: QueueStore,
        transport: Arc<dyn Transport>,
        batch_size: usize,
        persist_on_flush: bool,
    ) -> Self {
        Self {
            token,
            queue,
            store,
            transport,
            batch_size: batch_size.max(1),
            persist_on_flush,
            in_flight: tokio::sync::Mutex::new(()),
            archive_lock: Mutex::new(()),
            stats: Mutex::new(FlushStats::default()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    fn stats_lock(&self) -> MutexGuard<'_, FlushStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn stats(&self) -> FlushStats {
        self.stats_lock().clone()
    }

    /// Admit an event, counting any eviction it causes
    pub fn enqueue(&self, event: Event) {
        if let Some(evicted) = self.queue.enqueue(event) {
            self.record_evictions(std::slice::from_ref(&evicted));
        }
    }

    pub fn record_evictions(&self, evicted: &[Event]) {
        if evicted.is_empty() {
            return;
        }
        tracing::debug!(
            evicted = evicted.len(),
            limit = self.queue.limit(),
            "Event queue full, dropped oldest events"
        );
        self.stats_lock().events_evicted += evicted.len();
    }

    /// Write the current queue contents to the store
    pub fn persist(&self) -> Result<()> {
        let _writer = self
            .archive_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = self.queue.snapshot();
        self.store.archive(&self.token, &snapshot)
    }

    /// Run one flush cycle
    pub async fn run_cycle(&self) -> FlushReport {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            tracing::debug!("Flush already in progress, skipping");
            return FlushReport {
                skipped: true,
                ..Default::default()
            };
        };

        let mut report = FlushReport::default();
        if self.queue.is_empty() {
            return report;
        }

        let batch = self.queue.peek_batch(self.batch_size);

        for group in group_by_route(batch) {
            let count = group.len();

            let body = match group.body() {
                Ok(body) => body,
                Err(e) => {
                    // Encoding will fail the same way next cycle.
                    tracing::warn!(
                        endpoint = %group.endpoint,
                        error = %e,
                        "Dropping events that cannot be encoded"
                    );
                    report.dropped += self.queue.commit(&group.ids());
                    continue;
                }
            };

            report.requests += 1;
            match self.transport.send(body, &group.endpoint, group.method).await {
                Ok(status) => match classify_status(status) {
                    Delivery::Delivered => {
                        report.delivered += self.queue.commit(&group.ids());
                        tracing::debug!(
                            endpoint = %group.endpoint,
                            method = %group.method,
                            events = count,
                            status,
                            "Delivered events"
                        );
                    }
                    Delivery::Rejected => {
                        report.dropped += self.queue.commit(&group.ids());
                        tracing::warn!(
                            endpoint = %group.endpoint,
                            method = %group.method,
                            events = count,
                            status,
                            "Server rejected events, dropping them"
                        );
                    }
                    Delivery::Retry => {
                        report.retained += count;
                        report.failures += 1;
                        tracing::warn!(
                            endpoint = %group.endpoint,
                            method = %group.method,
                            events = count,
                            status,
                            "Server asked to retry, keeping events queued"
                        );
                    }
                },
                Err(e) => {
                    report.retained += count;
                    report.failures += 1;
                    tracing::warn!(
                        endpoint = %group.endpoint,
                        method = %group.method,
                        events = count,
                        error = %e,
                        "Failed to send events, keeping them queued"
                    );
                }
            }
        }

        if self.persist_on_flush && report.delivered + report.dropped > 0 {
            if let Err(e) = self.persist() {
                tracing::warn!(error = %e, "Failed to archive queue after flush");
            }
        }

        {
            let mut stats = self.stats_lock();
            stats.cycles += 1;
            stats.events_sent += report.delivered;
            stats.events_dropped += report.dropped;
            stats.requests += report.requests;
            stats.request_failures += report.failures;
        }

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            retained = report.retained,
            pending = self.queue.len(),
            "Flush cycle finished"
        );

        report
    }
}
