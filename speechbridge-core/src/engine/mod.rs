//! `LifecycleController` — top-level plugin lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! LifecycleController::new(host, factory)          state = Uninitialized
//!     └─► init(config)     engine built, session attached,
//!                          StartListening / StopListening / tick registered
//!                                                  state = Active
//!         └─► cleanup()    state = ShuttingDown
//!                          session + dispatcher closed → tick + entry points unregistered
//!                          → handles released → engine stopped and detached
//!                          → leftover events discarded
//!                                                  state = Uninitialized
//! ```
//!
//! `init` and `cleanup` take `&mut self`: the host calls them serially from
//! its own thread, and the borrow checker keeps it that way. Calling either in
//! the wrong state is reported and ignored rather than treated as fatal.
//!
//! ## Ownership
//!
//! The host only ever receives [`HostRef`](crate::host::HostRef)s. The owning
//! [`RegisteredHandle`]s live in the active session and are released strictly
//! after the host has confirmed unregistration; see [`crate::host::handle`].

pub mod diagnostics;
pub mod dispatch;
pub mod session;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    buffering::EventQueue,
    config::BridgeConfig,
    error::{BridgeError, Result},
    host::{ControlFn, RegisteredHandle, ScriptHost, TickFn},
    recognizer::EngineFactory,
};

pub use diagnostics::{BridgeDiagnostics, DiagnosticsSnapshot};
pub use dispatch::{DispatchRoute, DrainDispatcher, DrainReport};
pub use session::RecognitionSession;

/// Script function that starts continuous recognition.
pub const START_LISTENING: &str = "StartListening";
/// Script function that stops continuous recognition.
pub const STOP_LISTENING: &str = "StopListening";
/// Label of the per-tick drain callback.
pub const TICK_DISPATCHER: &str = "SpeechBridgeTick";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Uninitialized,
    Active,
    ShuttingDown,
}

/// Everything that exists only while the plugin is `Active`.
struct ActiveSession {
    session: Arc<RecognitionSession>,
    dispatcher: Arc<DrainDispatcher>,
    start_listening: RegisteredHandle<ControlFn>,
    stop_listening: RegisteredHandle<ControlFn>,
    tick: RegisteredHandle<TickFn>,
}

pub struct LifecycleController<H: ScriptHost> {
    host: Arc<H>,
    factory: Box<dyn EngineFactory>,
    state: SessionState,
    active: Option<ActiveSession>,
    diagnostics: Arc<BridgeDiagnostics>,
}

impl<H: ScriptHost> LifecycleController<H> {
    pub fn new(host: Arc<H>, factory: impl EngineFactory) -> Self {
        Self {
            host,
            factory: Box::new(factory),
            state: SessionState::Uninitialized,
            active: None,
            diagnostics: Arc::new(BridgeDiagnostics::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Snapshot of bridge counters (reset on every successful `init`).
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Events waiting for the next tick.
    pub fn pending_events(&self) -> usize {
        self.active
            .as_ref()
            .map(|active| active.dispatcher.pending())
            .unwrap_or(0)
    }

    /// Build the engine and register everything with the host.
    ///
    /// Either every handle ends up registered, or none does and the state
    /// stays `Uninitialized`.
    ///
    /// # Errors
    /// - `InvalidTransition` if not `Uninitialized` (nothing changes).
    /// - `Initialization` if the engine cannot be constructed.
    /// - `Registration` if the host refuses a registration.
    pub fn init(&mut self, config: &BridgeConfig) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            warn!(state = ?self.state, "init requested while already initialized; ignoring");
            return Err(BridgeError::InvalidTransition {
                operation: "init",
                state: self.state,
            });
        }

        let engine = self.factory.build(&config.recognizer).map_err(|e| match e {
            BridgeError::Initialization(_) => e,
            other => BridgeError::Initialization(other.to_string()),
        });
        let engine = match engine {
            Ok(engine) => engine,
            Err(e) => {
                error!("plugin init failed: {e}");
                return Err(e);
            }
        };

        self.diagnostics.reset();
        let queue = Arc::new(EventQueue::new());
        let session = Arc::new(RecognitionSession::attach(
            engine,
            queue.producer(),
            Arc::clone(&self.diagnostics),
        ));
        let dispatcher = Arc::new(DrainDispatcher::new(
            queue,
            DispatchRoute::from_relay(config.relay_function.as_deref()),
            Arc::clone(&self.diagnostics),
        ));

        let mut active = ActiveSession {
            start_listening: RegisteredHandle::new(
                START_LISTENING,
                control_entry(&session, START_LISTENING, RecognitionSession::start),
            ),
            stop_listening: RegisteredHandle::new(
                STOP_LISTENING,
                control_entry(&session, STOP_LISTENING, RecognitionSession::stop),
            ),
            tick: RegisteredHandle::new(TICK_DISPATCHER, tick_entry(&dispatcher, &self.host)),
            session,
            dispatcher,
        };

        if let Err(e) = self.register_all(&mut active) {
            error!("plugin init failed: {e}");
            self.unregister_all(&mut active);
            Self::release(active);
            return Err(e);
        }

        self.active = Some(active);
        self.state = SessionState::Active;
        info!(
            relay = ?config.relay_function,
            "speech bridge active"
        );
        Ok(())
    }

    /// Unregister from the host, then tear the session down.
    ///
    /// A no-op while `Uninitialized`. The state is `Uninitialized` on return
    /// whether or not the host accepted every unregistration.
    ///
    /// # Errors
    /// `Registration` when the host refused an unregistration; the affected
    /// callable is leaked instead of freed.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            debug!("cleanup requested while uninitialized; nothing to do");
            return Ok(());
        };

        self.state = SessionState::ShuttingDown;
        active.session.close();
        active.dispatcher.close();

        let failure = self.unregister_all(&mut active);
        let discarded = Self::release(active);

        self.state = SessionState::Uninitialized;
        info!(discarded, "speech bridge shut down");
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Same as the `StartListening` script function.
    ///
    /// # Errors
    /// `InvalidTransition` when not `Active`; nothing is started or queued.
    pub fn start_listening(&self) -> Result<()> {
        self.active_session(START_LISTENING)?.start()
    }

    /// Same as the `StopListening` script function.
    ///
    /// # Errors
    /// `InvalidTransition` when not `Active`; nothing is stopped or queued.
    pub fn stop_listening(&self) -> Result<()> {
        self.active_session(STOP_LISTENING)?.stop()
    }

    fn active_session(&self, operation: &'static str) -> Result<&RecognitionSession> {
        match &self.active {
            Some(active) if self.state == SessionState::Active => Ok(&active.session),
            _ => {
                warn!(state = ?self.state, "{operation} called while not active; ignoring");
                Err(BridgeError::InvalidTransition {
                    operation,
                    state: self.state,
                })
            }
        }
    }

    fn register_all(&self, active: &mut ActiveSession) -> Result<()> {
        for handle in [&mut active.start_listening, &mut active.stop_listening] {
            let name = handle.label().to_string();
            self.host
                .register_global_function(&name, 0, handle.host_ref())
                .map_err(|e| registration_error(&name, e))?;
            handle.mark_registered();
            debug!(name = %name, handle = %handle.id(), "registered script function");
        }

        self.host
            .add_tick_callback(active.tick.host_ref())
            .map_err(|e| registration_error(TICK_DISPATCHER, e))?;
        active.tick.mark_registered();
        debug!(handle = %active.tick.id(), "registered tick callback");
        Ok(())
    }

    /// Unregister whatever is registered, tick first. Returns the first
    /// failure; handles the host refused stay marked registered.
    fn unregister_all(&self, active: &mut ActiveSession) -> Option<BridgeError> {
        let mut failure = None;

        if active.tick.is_registered() {
            match self.host.remove_tick_callback(active.tick.id()) {
                Ok(()) => active.tick.mark_unregistered(),
                Err(e) => {
                    error!(handle = %active.tick.id(), "host refused to remove tick callback: {e}");
                    failure.get_or_insert(registration_error(TICK_DISPATCHER, e));
                }
            }
        }

        for handle in [&mut active.stop_listening, &mut active.start_listening] {
            if !handle.is_registered() {
                continue;
            }
            let name = handle.label().to_string();
            match self.host.unregister_global_function(&name, handle.id()) {
                Ok(()) => handle.mark_unregistered(),
                Err(e) => {
                    error!(name = %name, "host refused to unregister script function: {e}");
                    failure.get_or_insert(registration_error(&name, e));
                }
            }
        }

        failure
    }

    /// Release the owning handles, detach the engine and discard whatever is
    /// still queued. Returns the number of discarded events.
    fn release(active: ActiveSession) -> usize {
        let ActiveSession {
            session,
            dispatcher,
            start_listening,
            stop_listening,
            tick,
        } = active;

        // A refused release leaks the callable when the handle drops.
        let _ = tick.release();
        let _ = stop_listening.release();
        let _ = start_listening.release();

        session.shutdown();
        dispatcher.discard_pending()
    }
}

impl<H: ScriptHost> Drop for LifecycleController<H> {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.cleanup() {
                warn!("cleanup on drop reported: {e}");
            }
        }
    }
}

fn registration_error(name: &str, e: BridgeError) -> BridgeError {
    match e {
        BridgeError::Registration { .. } => e,
        other => BridgeError::Registration {
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}

fn control_entry(
    session: &Arc<RecognitionSession>,
    name: &'static str,
    action: fn(&RecognitionSession) -> Result<()>,
) -> Arc<ControlFn> {
    let session = Arc::clone(session);
    Arc::new(move || {
        if let Err(e) = action(&session) {
            warn!("{name} ignored: {e}");
        }
    })
}

fn tick_entry<H: ScriptHost>(dispatcher: &Arc<DrainDispatcher>, host: &Arc<H>) -> Arc<TickFn> {
    let dispatcher = Arc::clone(dispatcher);
    let host = Arc::clone(host);
    Arc::new(move |_delta_seconds: f64| {
        dispatcher.on_tick(&*host);
    })
}
