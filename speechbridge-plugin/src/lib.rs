//! SpeechBridge host plugin.
//!
//! Exposes the `VRP*` C ABI and drives one process-wide
//! [`LifecycleController`] over the host's C function table. The ABI carries
//! no context pointer, so the controller lives in a static slot.

#![warn(clippy::all)]

mod exports;
pub mod ffi;
#[cfg(test)]
mod test_host;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use speechbridge_core::recognizer::stub::StubEngineFactory;
use speechbridge_core::{BridgeConfig, BridgeError, LifecycleController, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use exports::*;
pub use ffi::{FfiHost, HostApi};

/// Overrides the configured `logFilter`.
pub const LOG_ENV: &str = "SPEECHBRIDGE_LOG";

static HOST_API: Mutex<Option<HostApi>> = const_mutex(None);
static PLUGIN: Mutex<Option<LifecycleController<FfiHost>>> = const_mutex(None);

/// Install the fmt subscriber. Later calls are no-ops.
pub fn init_logging(config: &BridgeConfig) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Store the host function table used by the next [`initialize`].
pub fn register_host_api(api: HostApi) {
    *HOST_API.lock() = Some(api);
}

/// Bring the plugin up against the registered host table.
///
/// A second call while active is logged and reported as success.
///
/// # Errors
/// `Initialization` if no host table was registered, otherwise whatever
/// [`LifecycleController::init`] reports.
pub fn initialize(config: &BridgeConfig) -> Result<()> {
    let Some(api) = *HOST_API.lock() else {
        return Err(BridgeError::Initialization(
            "host API table was not registered".into(),
        ));
    };

    let mut slot = PLUGIN.lock();
    let controller = slot.get_or_insert_with(|| {
        LifecycleController::new(Arc::new(FfiHost::new(api)), StubEngineFactory::default())
    });
    match controller.init(config) {
        Ok(()) | Err(BridgeError::InvalidTransition { .. }) => Ok(()),
        Err(e) => {
            // Rebuild against whatever table is registered by the next attempt.
            slot.take();
            Err(e)
        }
    }
}

/// Tear the plugin down. Safe to call at any time, any number of times.
///
/// # Errors
/// `Registration` when the host refused an unregistration.
pub fn shutdown() -> Result<()> {
    let controller = PLUGIN.lock().take();
    match controller {
        Some(mut controller) => {
            let result = controller.cleanup();
            let outstanding = controller.host().outstanding();
            if outstanding > 0 {
                warn!(outstanding, "host kept callbacks after cleanup");
            }
            result
        }
        None => Ok(()),
    }
}

/// Run `f` without letting a panic cross the C boundary; `0` on success.
fn guarded(operation: &str, f: impl FnOnce() -> Result<()>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {
            info!("{operation} completed");
            0
        }
        Ok(Err(e)) => {
            error!("{operation} failed: {e}");
            1
        }
        Err(_) => {
            error!("{operation} panicked");
            1
        }
    }
}
