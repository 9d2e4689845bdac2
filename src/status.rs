//! Status event stream shared by the Manager and the Save Coordinator
//! (spec.md §6 "Status event stream", §4.4 "Observable events").
//!
//! Grounded in the teacher's broker audit trail (`core::broker::BrokerEvent`):
//! same shape of "every operation emits a record", traded here for an
//! in-process pub/sub bus instead of an append-only JSONL file, since
//! status events are consumed by a live UI rather than replayed later.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::time::now_iso8601;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEventType {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub event_type: StatusEventType,
    pub message: String,
    pub timestamp: String,
}

impl StatusEvent {
    pub fn new(event_type: StatusEventType, message: impl Into<String>) -> Self {
        Self { event_type, message: message.into(), timestamp: now_iso8601() }
    }
}

type Handler = Box<dyn Fn(&StatusEvent) + Send + Sync>;

/// Bound on the replay ring buffer: a late-subscribing UI sees at most this
/// many of the most recent events rather than the whole session's history.
const RING_BUFFER_CAPACITY: usize = 50;

struct Inner {
    handlers: Mutex<Vec<(u64, Handler)>>,
    next_id: AtomicU64,
    recent: Mutex<VecDeque<StatusEvent>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
        }
    }
}

/// A registry of status subscribers. Cheaply cloneable (shares one inner
/// registry), so the Manager and Coordinator can each hold a handle to the
/// same bus without a lifetime dance. Keeps a bounded ring buffer of recent
/// events so a handler registered after the fact can replay recent history
/// instead of starting blind (spec.md §9 design notes; not a persistence
/// behavior, just a replay convenience for the status stream itself).
#[derive(Clone, Default)]
pub struct StatusBus {
    inner: Arc<Inner>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; call the returned closure to unsubscribe
    /// (spec.md §6 "onStatusChange(handler) → unsubscribe").
    pub fn on_status_change(&self, handler: Handler) -> impl FnOnce() + Send + Sync + 'static {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.handlers.lock().unwrap().push((id, handler));
        let inner = self.inner.clone();
        move || {
            inner.handlers.lock().unwrap().retain(|(h_id, _)| *h_id != id);
        }
    }

    pub fn emit(&self, event_type: StatusEventType, message: impl Into<String>) {
        let event = StatusEvent::new(event_type, message);
        {
            let mut recent = self.inner.recent.lock().unwrap();
            if recent.len() == RING_BUFFER_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }
        for (_, handler) in self.inner.handlers.lock().unwrap().iter() {
            handler(&event);
        }
    }

    /// The most recent events, oldest first, up to the ring buffer's
    /// capacity. A UI that subscribes late can call this once to backfill
    /// before relying on [`on_status_change`] for anything further.
    pub fn recent_events(&self) -> Vec<StatusEvent> {
        self.inner.recent.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscriber_receives_emitted_events() {
        let bus = StatusBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let _unsub = bus.on_status_change(Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.emit(StatusEventType::Info, "hello");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = StatusBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let unsub = bus.on_status_change(Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        unsub();
        bus.emit(StatusEventType::Info, "hello");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn recent_events_bounded_to_capacity() {
        let bus = StatusBus::new();
        for i in 0..(RING_BUFFER_CAPACITY + 10) {
            bus.emit(StatusEventType::Info, format!("event {i}"));
        }
        let recent = bus.recent_events();
        assert_eq!(recent.len(), RING_BUFFER_CAPACITY);
        assert_eq!(recent.last().unwrap().message, format!("event {}", RING_BUFFER_CAPACITY + 9));
        assert_eq!(recent.first().unwrap().message, "event 10");
    }
}
