//! # speechbridge-core
//!
//! Delivers results from a multi-threaded speech recognition engine into a
//! host application that only accepts calls on its own thread, once per tick.
//!
//! ## Architecture
//!
//! ```text
//! RecognitionEngine (engine threads)
//!        │ NotificationSink
//!        ▼
//! RecognitionSession::delivery_for ──► EventQueue (MPSC, unbounded)
//!                                          │
//!                        host tick ──► DrainDispatcher::on_tick
//!                                          │
//!                                          ▼
//!                              ScriptHost::invoke_named_callback
//! ```
//!
//! `LifecycleController` owns all of it between `init` and `cleanup`, along
//! with every callable the host has been handed.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod ipc;
pub mod recognizer;

// Convenience re-exports for downstream crates
pub use buffering::{EventProducer, EventQueue};
pub use config::{BridgeConfig, RecognizerConfig};
pub use engine::{
    DiagnosticsSnapshot, DispatchRoute, DrainDispatcher, DrainReport, LifecycleController,
    SessionState, START_LISTENING, STOP_LISTENING,
};
pub use error::{BridgeError, Result};
pub use host::{ControlFn, HandleId, HostRef, RegisteredHandle, ScriptHost, TickFn};
pub use ipc::events::{DeliveryEvent, HostCallback};
pub use recognizer::{
    EngineFactory, EngineNotification, NotificationSink, RecognitionEngine, ResultReason,
};
