use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Bridge counters, shared between recognition threads and the tick thread.
#[derive(Debug, Default)]
pub struct BridgeDiagnostics {
    pub events_enqueued: AtomicUsize,
    pub events_filtered: AtomicUsize,
    pub events_delivered: AtomicUsize,
    pub dispatch_failures: AtomicUsize,
    pub events_discarded: AtomicUsize,
    pub busy_ticks: AtomicUsize,
}

impl BridgeDiagnostics {
    pub fn reset(&self) {
        self.events_enqueued.store(0, Ordering::Relaxed);
        self.events_filtered.store(0, Ordering::Relaxed);
        self.events_delivered.store(0, Ordering::Relaxed);
        self.dispatch_failures.store(0, Ordering::Relaxed);
        self.events_discarded.store(0, Ordering::Relaxed);
        self.busy_ticks.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            events_discarded: self.events_discarded.load(Ordering::Relaxed),
            busy_ticks: self.busy_ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub events_enqueued: usize,
    /// Recognition results that were not final and never queued.
    pub events_filtered: usize,
    pub events_delivered: usize,
    pub dispatch_failures: usize,
    /// Queued events dropped at teardown without delivery.
    pub events_discarded: usize,
    /// Ticks that found at least one event.
    pub busy_ticks: usize,
}
