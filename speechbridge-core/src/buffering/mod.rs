//! Unbounded MPSC hand-off queue for delivery events.
//!
//! Backed by `crossbeam_channel::unbounded`, whose `send` is lock-free and
//! never waits, so it is safe to call from recognition-engine callback
//! threads. Any number of [`EventProducer`]s may feed the queue; only the
//! host tick thread drains it.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::trace;

use crate::ipc::events::DeliveryEvent;

/// Cloneable producer half, moved into engine callbacks.
#[derive(Debug, Clone)]
pub struct EventProducer {
    tx: Sender<DeliveryEvent>,
}

impl EventProducer {
    /// Append `event` at the tail. Never blocks.
    ///
    /// Once the queue itself has been dropped there is no receiver left and
    /// the event is discarded.
    pub fn enqueue(&self, event: DeliveryEvent) {
        if let Err(rejected) = self.tx.send(event) {
            trace!(
                callback = rejected.0.callback_name(),
                "queue closed; discarding late event"
            );
        }
    }
}

/// FIFO queue of events awaiting the next host tick.
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<DeliveryEvent>,
    rx: Receiver<DeliveryEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// A new producer handle feeding this queue.
    pub fn producer(&self) -> EventProducer {
        EventProducer {
            tx: self.tx.clone(),
        }
    }

    /// Append `event` at the tail. Never blocks.
    pub fn enqueue(&self, event: DeliveryEvent) {
        // Cannot fail: `self` holds the receiver.
        let _ = self.tx.send(event);
    }

    /// Remove and return every event present when the call starts, oldest
    /// first.
    ///
    /// Consumer-thread only. The batch size is fixed by the queue length at
    /// entry, so producers that keep enqueuing during the drain cannot extend
    /// it; their events wait for the next call.
    pub fn try_dequeue_all(&self) -> Vec<DeliveryEvent> {
        let pending = self.rx.len();
        let mut batch = Vec::with_capacity(pending);
        while batch.len() < pending {
            match self.rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
