//! Bounded FIFO of events waiting for delivery
//!
//! The queue is the only record of events not yet confirmed delivered. Every
//! operation runs under a single mutex, so a flush taking a batch and later
//! committing it never observes a half-applied enqueue from another thread.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::event::Event;

#[derive(Debug)]
struct Inner {
    events: VecDeque<Event>,
    limit: usize,
}

impl Inner {
    /// Drop events from the head until `len <= limit`
    fn evict_overflow(&mut self) -> Vec<Event> {
        let excess = self.events.len().saturating_sub(self.limit);
        self.events.drain(..excess).collect()
    }
}

/// Thread-safe, size-bounded event queue with drop-oldest admission
#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<Inner>,
}

impl EventQueue {
    /// Create an empty queue holding at most `limit` events (minimum 1)
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                limit: limit.max(1),
            }),
        }
    }

    /// Create a queue seeded with `events`, keeping only the newest `limit`
    ///
    /// Returns the queue and the older events that did not fit.
    pub fn with_events(limit: usize, events: Vec<Event>) -> (Self, Vec<Event>) {
        let queue = Self::new(limit);
        let overflow = {
            let mut inner = queue.lock();
            inner.events.extend(events);
            inner.evict_overflow()
        };
        (queue, overflow)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere must not take event delivery down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append to the tail, evicting the head first when full
    ///
    /// Returns the evicted event, if any.
    pub fn enqueue(&self, event: Event) -> Option<Event> {
        let mut inner = self.lock();
        let evicted = if inner.events.len() >= inner.limit {
            inner.events.pop_front()
        } else {
            None
        };
        inner.events.push_back(event);
        evicted
    }

    /// Clone up to `max` events from the head without removing them
    pub fn peek_batch(&self, max: usize) -> Vec<Event> {
        self.lock().events.iter().take(max).cloned().collect()
    }

    /// Remove the events with the given ids, keeping the rest in order
    ///
    /// Ids that are no longer queued (evicted since they were taken) are
    /// ignored. Returns how many events were removed.
    pub fn commit(&self, ids: &[Uuid]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut inner = self.lock();
        let before = inner.events.len();
        inner.events.retain(|e| !ids.contains(&e.id()));
        before - inner.events.len()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    /// Change the bound; shrinking evicts the oldest events immediately
    pub fn set_limit(&self, limit: usize) -> Vec<Event> {
        let mut inner = self.lock();
        inner.limit = limit.max(1);
        inner.evict_overflow()
    }

    /// Ordered copy of everything currently queued
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::event::{HttpMethod, Payload};
    use serde_json::json;
    use std::sync::Arc;

    fn event(name: &str) -> Event {
        let mut p = Payload::new();
        p.insert("name".to_string(), json!(name));
        Event::new(p, "events", HttpMethod::Post)
    }

    fn names(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.payload()["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_enqueue_evicts_oldest_when_full() {
        let queue = EventQueue::new(3);
        for name in ["A", "B", "C"] {
            assert!(queue.enqueue(event(name)).is_none());
        }

        let evicted = queue.enqueue(event("D")).expect("head should be evicted");

        assert_eq!(names(&[evicted]), vec!["A"]);
        assert_eq!(names(&queue.snapshot()), vec!["B", "C", "D"]);
    }

    #[test]
    fn test_length_never_exceeds_limit() {
        let queue = EventQueue::new(5);
        for i in 0..50 {
            queue.enqueue(event(&i.to_string()));
            assert!(queue.len() <= 5);
        }
        assert_eq!(names(&queue.snapshot()), vec!["45", "46", "47", "48", "49"]);
    }

    #[test]
    fn test_peek_batch_does_not_remove() {
        let queue = EventQueue::new(10);
        for name in ["A", "B", "C"] {
            queue.enqueue(event(name));
        }

        let batch = queue.peek_batch(2);

        assert_eq!(names(&batch), vec!["A", "B"]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_batch(10).len(), 3);
    }

    #[test]
    fn test_commit_removes_exactly_given_ids() {
        let queue = EventQueue::new(10);
        for name in ["A", "B", "C", "D"] {
            queue.enqueue(event(name));
        }
        let snapshot = queue.snapshot();

        let removed = queue.commit(&[snapshot[0].id(), snapshot[2].id()]);

        assert_eq!(removed, 2);
        assert_eq!(names(&queue.snapshot()), vec!["B", "D"]);
    }

    #[test]
    fn test_commit_ignores_evicted_ids() {
        let queue = EventQueue::new(2);
        queue.enqueue(event("A"));
        queue.enqueue(event("B"));
        let batch = queue.peek_batch(2);

        // A is evicted while the batch is in flight
        queue.enqueue(event("C"));
        let removed = queue.commit(&batch.iter().map(Event::id).collect::<Vec<_>>());

        assert_eq!(removed, 1);
        assert_eq!(names(&queue.snapshot()), vec!["C"]);
    }

    #[test]
    fn test_set_limit_shrinks_from_head() {
        let queue = EventQueue::new(5);
        for name in ["A", "B", "C", "D"] {
            queue.enqueue(event(name));
        }

        let evicted = queue.set_limit(2);

        assert_eq!(names(&evicted), vec!["A", "B"]);
        assert_eq!(names(&queue.snapshot()), vec!["C", "D"]);
        assert_eq!(queue.limit(), 2);
    }

    #[test]
    fn test_with_events_keeps_newest() {
        let events = ["A", "B", "C"].iter().map(|n| event(n)).collect();
        let (queue, overflow) = EventQueue::with_events(2, events);
        assert_eq!(names(&queue.snapshot()), vec!["B", "C"]);
        assert_eq!(names(&overflow), vec!["A"]);
    }

    #[test]
    fn test_concurrent_enqueue_respects_limit() {
        let queue = Arc::new(EventQueue::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        queue.enqueue(event(&format!("{t}-{i}")));
                        assert!(queue.len() <= 100);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 100);
    }
}
