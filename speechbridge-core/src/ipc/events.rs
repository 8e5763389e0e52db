//! Delivery events handed from recognition threads to the host tick.
//!
//! ## Host callbacks
//!
//! | Engine notification | Host callback | Payload |
//! |---------------------|---------------|---------|
//! | recognized speech | `onSpeech` | recognized text |
//! | session started | `onSpeechSessionStarted` | — |
//! | session stopped | `onSpeechSessionStopped` | — |
//! | speech start detected | `onSpeechStartDetected` | — |
//! | speech end detected | `onSpeechEndDetected` | — |
//!
//! Whether the host script actually defines these handlers is its own concern.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Host callback names
// ---------------------------------------------------------------------------

/// The fixed set of host-side named callbacks this bridge invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostCallback {
    #[serde(rename = "onSpeech")]
    Speech,
    #[serde(rename = "onSpeechSessionStarted")]
    SessionStarted,
    #[serde(rename = "onSpeechSessionStopped")]
    SessionStopped,
    #[serde(rename = "onSpeechStartDetected")]
    SpeechStartDetected,
    #[serde(rename = "onSpeechEndDetected")]
    SpeechEndDetected,
}

impl HostCallback {
    pub const ALL: [HostCallback; 5] = [
        HostCallback::Speech,
        HostCallback::SessionStarted,
        HostCallback::SessionStopped,
        HostCallback::SpeechStartDetected,
        HostCallback::SpeechEndDetected,
    ];

    /// Name of the script function the host resolves for this callback.
    pub fn name(self) -> &'static str {
        match self {
            HostCallback::Speech => "onSpeech",
            HostCallback::SessionStarted => "onSpeechSessionStarted",
            HostCallback::SessionStopped => "onSpeechSessionStopped",
            HostCallback::SpeechStartDetected => "onSpeechStartDetected",
            HostCallback::SpeechEndDetected => "onSpeechEndDetected",
        }
    }
}

impl std::fmt::Display for HostCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Delivery event
// ---------------------------------------------------------------------------

/// One queued host invocation.
///
/// Fields are private so an event cannot change between the recognition
/// thread that built it and the tick that delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    callback_name: HostCallback,
    payload: Option<String>,
}

impl DeliveryEvent {
    /// A parameterless notification (session/segment lifecycle).
    pub fn notification(callback: HostCallback) -> Self {
        Self {
            callback_name: callback,
            payload: None,
        }
    }

    /// A recognized-text result for `onSpeech`. Empty text is kept as-is.
    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            callback_name: HostCallback::Speech,
            payload: Some(text.into()),
        }
    }

    pub fn callback(&self) -> HostCallback {
        self.callback_name
    }

    pub fn callback_name(&self) -> &'static str {
        self.callback_name.name()
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// The string argument passed to the host: the payload, or `""` when absent.
    pub fn argument(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }
}
