//! `StubEngine` — in-process recognition backend with no speech service behind it.
//!
//! Lets the full bridge (queue, tick drain, host callbacks) be exercised
//! end-to-end without credentials for a real service.
//!
//! - [`StubTrigger`] emits arbitrary notifications on the caller's schedule,
//!   from whatever thread the caller likes.
//! - With [`StubEngine::announcing`], starting recognition spawns an engine
//!   thread that plays a short session script, and stopping plays
//!   `SessionStopped`, the way a real service reports its lifecycle.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::RecognizerConfig;
use crate::error::Result;
use crate::recognizer::{
    EngineFactory, EngineNotification, NotificationSink, RecognitionEngine, ResultReason,
};

type SinkSlot = Arc<Mutex<Option<NotificationSink>>>;

/// Stub recognition engine.
pub struct StubEngine {
    sink: SinkSlot,
    listening: bool,
    /// Transcript played after `start`; `None` means start/stop are silent.
    script: Option<String>,
}

/// Emits notifications into a [`StubEngine`]'s current subscriber.
#[derive(Clone)]
pub struct StubTrigger {
    sink: SinkSlot,
}

impl StubEngine {
    /// A silent engine plus the trigger that drives it.
    pub fn new() -> (Self, StubTrigger) {
        let sink: SinkSlot = Arc::new(Mutex::new(None));
        let trigger = StubTrigger {
            sink: Arc::clone(&sink),
        };
        let engine = Self {
            sink,
            listening: false,
            script: None,
        };
        (engine, trigger)
    }

    /// Play `SessionStarted → SpeechStartDetected → Recognized(transcript) →
    /// SpeechEndDetected` on an engine thread when recognition starts, and
    /// `SessionStopped` when it stops.
    pub fn announcing(mut self, transcript: impl Into<String>) -> Self {
        self.script = Some(transcript.into());
        self
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    fn spawn_emitter(&self, notifications: Vec<EngineNotification>) {
        let trigger = StubTrigger {
            sink: Arc::clone(&self.sink),
        };
        let spawned = thread::Builder::new()
            .name("stub-recognizer".into())
            .spawn(move || {
                for notification in notifications {
                    trigger.emit(notification);
                }
            });
        if let Err(e) = spawned {
            warn!("stub recognizer could not spawn its engine thread: {e}");
        }
    }
}

impl RecognitionEngine for StubEngine {
    fn subscribe(&mut self, sink: NotificationSink) {
        *self.sink.lock() = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.sink.lock().take();
    }

    fn start_continuous_recognition(&mut self) {
        if self.listening {
            debug!("StubEngine already listening");
            return;
        }
        self.listening = true;
        if let Some(transcript) = self.script.clone() {
            self.spawn_emitter(vec![
                EngineNotification::SessionStarted,
                EngineNotification::SpeechStartDetected,
                EngineNotification::Recognized {
                    reason: ResultReason::RecognizedSpeech,
                    text: transcript,
                },
                EngineNotification::SpeechEndDetected,
            ]);
        }
    }

    fn stop_continuous_recognition(&mut self) {
        if !self.listening {
            return;
        }
        self.listening = false;
        if self.script.is_some() {
            self.spawn_emitter(vec![EngineNotification::SessionStopped]);
        }
    }
}

impl StubTrigger {
    /// Deliver `notification` to the current subscriber on the calling thread.
    ///
    /// Returns `false` when nothing is subscribed.
    pub fn emit(&self, notification: EngineNotification) -> bool {
        // Clone out of the lock so the sink never runs while it is held.
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => {
                sink(notification);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

/// Factory that validates credentials and then builds an announcing
/// [`StubEngine`].
#[derive(Debug, Clone)]
pub struct StubEngineFactory {
    transcript: String,
}

impl StubEngineFactory {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

impl Default for StubEngineFactory {
    fn default() -> Self {
        Self::new("[stub recognition]")
    }
}

impl EngineFactory for StubEngineFactory {
    fn build(&self, config: &RecognizerConfig) -> Result<Box<dyn RecognitionEngine>> {
        config.validate()?;
        debug!(
            endpoint = %config.resolved_endpoint(),
            language = %config.language,
            "building stub recognizer"
        );
        let (engine, _trigger) = StubEngine::new();
        Ok(Box::new(engine.announcing(self.transcript.clone())))
    }
}
