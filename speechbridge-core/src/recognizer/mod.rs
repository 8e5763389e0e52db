//! Recognition engine abstraction.
//!
//! The `RecognitionEngine` trait decouples the session adapter from any
//! specific speech service. An engine is a black box that, once subscribed,
//! calls the sink from its own threads whenever something happens; start and
//! stop are fire-and-forget requests whose effects show up later as
//! notifications (or not at all).

pub mod stub;

use std::sync::Arc;

use crate::config::RecognizerConfig;
use crate::error::Result;

/// Outcome class of a recognition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    /// Final recognized text for an utterance.
    RecognizedSpeech,
    /// Streaming hypothesis; may still change.
    RecognizingSpeech,
    /// Speech was heard but nothing could be recognized.
    NoMatch,
    /// Recognition was cancelled (service error, auth failure, …).
    Canceled,
}

/// Discrete events emitted by a recognition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
    Recognized { reason: ResultReason, text: String },
    SessionStarted,
    SessionStopped,
    SpeechStartDetected,
    SpeechEndDetected,
}

/// Callback an engine invokes for every notification.
///
/// Called on engine-owned threads, possibly several at once.
pub type NotificationSink = Arc<dyn Fn(EngineNotification) + Send + Sync>;

/// Contract for recognition backends.
pub trait RecognitionEngine: Send + 'static {
    /// Attach the sink that receives every subsequent notification,
    /// replacing any previous one.
    fn subscribe(&mut self, sink: NotificationSink);

    /// Detach the current sink. Notifications emitted afterwards are dropped.
    fn unsubscribe(&mut self);

    /// Request continuous recognition. Returns immediately.
    fn start_continuous_recognition(&mut self);

    /// Request the end of continuous recognition. Returns immediately; safe
    /// to call when never started.
    fn stop_continuous_recognition(&mut self);
}

/// Builds a recognition engine from configuration at plugin init.
pub trait EngineFactory: Send + 'static {
    /// # Errors
    /// Any error is reported to the host as an initialization failure.
    fn build(&self, config: &RecognizerConfig) -> Result<Box<dyn RecognitionEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&RecognizerConfig) -> Result<Box<dyn RecognitionEngine>> + Send + 'static,
{
    fn build(&self, config: &RecognizerConfig) -> Result<Box<dyn RecognitionEngine>> {
        self(config)
    }
}
