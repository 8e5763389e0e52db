//! Recognition session adapter.
//!
//! Subscribes to the engine and turns each notification into at most one
//! [`DeliveryEvent`]. The subscription closure runs on engine threads and only
//! does an enqueue plus a counter bump.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::{
    buffering::EventProducer,
    engine::diagnostics::BridgeDiagnostics,
    error::{BridgeError, Result},
    ipc::events::{DeliveryEvent, HostCallback},
    recognizer::{EngineNotification, NotificationSink, RecognitionEngine, ResultReason},
};

/// Map an engine notification to the event the host should see, if any.
///
/// Only final recognitions carry text to the host; partial, no-match and
/// cancelled results are dropped here.
pub fn delivery_for(notification: EngineNotification) -> Option<DeliveryEvent> {
    match notification {
        EngineNotification::Recognized {
            reason: ResultReason::RecognizedSpeech,
            text,
        } => Some(DeliveryEvent::speech(text)),
        EngineNotification::Recognized { .. } => None,
        EngineNotification::SessionStarted => {
            Some(DeliveryEvent::notification(HostCallback::SessionStarted))
        }
        EngineNotification::SessionStopped => {
            Some(DeliveryEvent::notification(HostCallback::SessionStopped))
        }
        EngineNotification::SpeechStartDetected => {
            Some(DeliveryEvent::notification(HostCallback::SpeechStartDetected))
        }
        EngineNotification::SpeechEndDetected => {
            Some(DeliveryEvent::notification(HostCallback::SpeechEndDetected))
        }
    }
}

pub struct RecognitionSession {
    engine: Mutex<Box<dyn RecognitionEngine>>,
    listening: AtomicBool,
    /// Set once teardown begins; start/stop requests are refused from then on.
    closed: AtomicBool,
    detached: AtomicBool,
}

impl RecognitionSession {
    /// Subscribe to `engine`, forwarding notifications into `producer`.
    pub fn attach(
        mut engine: Box<dyn RecognitionEngine>,
        producer: EventProducer,
        diagnostics: Arc<BridgeDiagnostics>,
    ) -> Self {
        let sink: NotificationSink = Arc::new(move |notification| {
            match delivery_for(notification) {
                Some(event) => {
                    trace!(callback = event.callback_name(), "queueing engine event");
                    producer.enqueue(event);
                    diagnostics.events_enqueued.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    diagnostics.events_filtered.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        engine.subscribe(sink);

        Self {
            engine: Mutex::new(engine),
            listening: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }

    /// Ask the engine to begin continuous recognition. Returns immediately.
    ///
    /// # Errors
    /// `SessionClosed` once teardown has begun.
    pub fn start(&self) -> Result<()> {
        self.ensure_open("StartListening")?;
        info!("start listening requested");
        self.engine.lock().start_continuous_recognition();
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Ask the engine to end continuous recognition. Returns immediately.
    ///
    /// # Errors
    /// `SessionClosed` once teardown has begun.
    pub fn stop(&self) -> Result<()> {
        self.ensure_open("StopListening")?;
        info!("stop listening requested");
        self.engine.lock().stop_continuous_recognition();
        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Refuse further start/stop requests.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Close, stop the engine if it is still listening, and detach from it.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.close();
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut engine = self.engine.lock();
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!("stopping recognition before detaching");
            engine.stop_continuous_recognition();
        }
        engine.unsubscribe();
        debug!("recognition session detached");
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.is_closed() {
            return Err(BridgeError::SessionClosed { operation });
        }
        Ok(())
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
