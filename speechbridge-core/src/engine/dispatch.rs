//! Tick-time drain of the event queue into host callbacks.
//!
//! ## Per tick
//!
//! ```text
//! 1. try_dequeue_all → batch fixed at entry (events arriving later wait a tick)
//! 2. for each event, in order:
//!      Direct:  host.invoke(callback_name, [payload])
//!      Relay:   host.invoke(relay, [callback_name, payload])
//! 3. a failed invocation is logged and counted; the batch continues
//! ```
//!
//! Runs on the host's script thread only and never waits on the engine.
//! Once closed, a tick discards whatever is queued and invokes nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::{
    buffering::EventQueue,
    engine::diagnostics::BridgeDiagnostics,
    error::{BridgeError, Result},
    host::ScriptHost,
    ipc::events::DeliveryEvent,
};

/// How queued events are addressed on the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DispatchRoute {
    /// Invoke each host callback by its own name.
    #[default]
    Direct,
    /// Invoke one host function with `(callbackName, payload)`.
    Relay(String),
}

impl DispatchRoute {
    pub fn from_relay(relay_function: Option<&str>) -> Self {
        match relay_function {
            Some(function) => DispatchRoute::Relay(function.to_string()),
            None => DispatchRoute::Direct,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

pub struct DrainDispatcher {
    queue: Arc<EventQueue>,
    route: DispatchRoute,
    diagnostics: Arc<BridgeDiagnostics>,
    closed: AtomicBool,
}

impl DrainDispatcher {
    pub fn new(
        queue: Arc<EventQueue>,
        route: DispatchRoute,
        diagnostics: Arc<BridgeDiagnostics>,
    ) -> Self {
        Self {
            queue,
            route,
            diagnostics,
            closed: AtomicBool::new(false),
        }
    }

    /// Stop delivering. A host that keeps ticking after teardown only
    /// drains the queue into the discard counter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver everything queued before this call, oldest first.
    ///
    /// Must not be called concurrently with itself.
    pub fn on_tick(&self, host: &dyn ScriptHost) -> DrainReport {
        if self.is_closed() {
            let discarded = self.discard_pending();
            if discarded > 0 {
                debug!(discarded, "tick after close; discarding late events");
            }
            return DrainReport::default();
        }

        let batch = self.queue.try_dequeue_all();
        if batch.is_empty() {
            return DrainReport::default();
        }

        let mut report = DrainReport::default();
        for event in &batch {
            match self.deliver(host, event) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        callback = event.callback_name(),
                        "host callback failed, continuing with remaining events: {e}"
                    );
                }
            }
        }

        self.diagnostics.busy_ticks.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .events_delivered
            .fetch_add(report.delivered, Ordering::Relaxed);
        self.diagnostics
            .dispatch_failures
            .fetch_add(report.failed, Ordering::Relaxed);
        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "tick drained"
        );
        report
    }

    /// Drop everything queued without delivering it. Returns the count.
    pub fn discard_pending(&self) -> usize {
        let discarded = self.queue.try_dequeue_all().len();
        self.diagnostics
            .events_discarded
            .fetch_add(discarded, Ordering::Relaxed);
        discarded
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn route(&self) -> &DispatchRoute {
        &self.route
    }

    fn deliver(&self, host: &dyn ScriptHost, event: &DeliveryEvent) -> Result<()> {
        let outcome = match &self.route {
            DispatchRoute::Direct => {
                host.invoke_named_callback(event.callback_name(), &[event.argument()])
            }
            DispatchRoute::Relay(function) => {
                host.invoke_named_callback(function, &[event.callback_name(), event.argument()])
            }
        };
        outcome.map_err(|e| match e {
            BridgeError::Dispatch { .. } => e,
            other => BridgeError::Dispatch {
                callback: event.callback_name().to_string(),
                reason: other.to_string(),
            },
        })
    }
}
