//! The host application's scripting bridge, as seen from this plugin.
//!
//! The host runs scripts on one thread and calls into the plugin only from
//! that thread: global functions when a script calls them, tick callbacks once
//! per frame. `ScriptHost` is the seam the lifecycle controller registers
//! against; the plugin crate implements it over the host's C function table
//! and tests implement it in memory.

pub mod handle;

pub use handle::{ControlFn, HandleId, HostRef, RegisteredHandle, TickFn};

use crate::error::Result;

/// Operations the plugin consumes from the host scripting bridge.
///
/// Implementations only ever hold [`HostRef`]s; ownership of the callables
/// stays with the caller until the matching unregister call has returned
/// `Ok`.
pub trait ScriptHost: Send + Sync + 'static {
    /// Expose `handle` to scripts as the global function `name`.
    fn register_global_function(
        &self,
        name: &str,
        arity: u32,
        handle: HostRef<ControlFn>,
    ) -> Result<()>;

    /// Remove the global function `name` registered with `handle`.
    fn unregister_global_function(&self, name: &str, handle: HandleId) -> Result<()>;

    /// Call `handle` once per host tick until removed.
    fn add_tick_callback(&self, handle: HostRef<TickFn>) -> Result<()>;

    fn remove_tick_callback(&self, handle: HandleId) -> Result<()>;

    /// Call the script function `name` with string arguments.
    ///
    /// # Errors
    /// `Dispatch` when the host call fails or no such function exists.
    fn invoke_named_callback(&self, name: &str, args: &[&str]) -> Result<()>;
}
