//! C function table supplied by the host, and the `ScriptHost` built on it.
//!
//! Every callable handed to the host travels as a boxed [`HostRef`] in the
//! `user_data` pointer. The box is reclaimed only after the host confirms the
//! matching unregistration; anything the host refuses to give back is leaked.

use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void, CString};
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use speechbridge_core::{
    BridgeError, ControlFn, HandleId, HostRef, Result, ScriptHost, TickFn,
};
use tracing::{error, warn};

/// Script-callable global function.
pub type ScriptFunction =
    unsafe extern "C" fn(argv: *const *const c_char, argc: c_int, user_data: *mut c_void);

/// Per-frame update callback.
pub type UpdateFunction = unsafe extern "C" fn(delta_seconds: f64, user_data: *mut c_void);

/// Host services, registered once through `VRPRegisterHostApi`.
///
/// Every entry returns `0` on success.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostApi {
    pub register_global_function: unsafe extern "C" fn(
        name: *const c_char,
        function: ScriptFunction,
        arity: c_int,
        user_data: *mut c_void,
    ) -> c_int,
    pub unregister_global_function:
        unsafe extern "C" fn(name: *const c_char, function: ScriptFunction) -> c_int,
    pub add_update_callback:
        unsafe extern "C" fn(function: UpdateFunction, user_data: *mut c_void) -> c_int,
    pub remove_update_callback:
        unsafe extern "C" fn(function: UpdateFunction, user_data: *mut c_void) -> c_int,
    pub invoke: unsafe extern "C" fn(
        name: *const c_char,
        argv: *const *const c_char,
        argc: c_int,
    ) -> c_int,
}

/// [`ScriptHost`] over a [`HostApi`] table.
pub struct FfiHost {
    api: HostApi,
    /// Address of each boxed `HostRef<ControlFn>` the host currently holds.
    functions: Mutex<HashMap<HandleId, usize>>,
    /// Same for `HostRef<TickFn>`.
    updates: Mutex<HashMap<HandleId, usize>>,
}

impl FfiHost {
    pub fn new(api: HostApi) -> Self {
        Self {
            api,
            functions: Mutex::new(HashMap::new()),
            updates: Mutex::new(HashMap::new()),
        }
    }

    /// Number of `user_data` boxes the host still holds.
    pub fn outstanding(&self) -> usize {
        self.functions.lock().len() + self.updates.lock().len()
    }
}

impl ScriptHost for FfiHost {
    fn register_global_function(
        &self,
        name: &str,
        arity: u32,
        handle: HostRef<ControlFn>,
    ) -> Result<()> {
        let c_name = c_string(name).map_err(|reason| registration(name, reason))?;
        let arity = c_int::try_from(arity)
            .map_err(|_| registration(name, format!("arity {arity} out of range")))?;
        let id = handle.id();
        let slot = Box::into_raw(Box::new(handle));

        // SAFETY: `c_name` outlives the call; `slot` stays valid until the
        // host gives it back through a successful unregistration.
        let status = unsafe {
            (self.api.register_global_function)(
                c_name.as_ptr(),
                control_trampoline,
                arity,
                slot.cast(),
            )
        };
        if status != 0 {
            // SAFETY: the host rejected the registration and kept nothing.
            drop(unsafe { Box::from_raw(slot) });
            return Err(registration(name, format!("host returned status {status}")));
        }

        self.functions.lock().insert(id, slot as usize);
        Ok(())
    }

    fn unregister_global_function(&self, name: &str, handle: HandleId) -> Result<()> {
        let c_name = c_string(name).map_err(|reason| registration(name, reason))?;

        // SAFETY: `c_name` outlives the call.
        let status =
            unsafe { (self.api.unregister_global_function)(c_name.as_ptr(), control_trampoline) };
        if status != 0 {
            return Err(registration(name, format!("host returned status {status}")));
        }

        if let Some(addr) = self.functions.lock().remove(&handle) {
            // SAFETY: `addr` came from `Box::into_raw` in
            // `register_global_function` and the host no longer holds it.
            drop(unsafe { Box::from_raw(addr as *mut HostRef<ControlFn>) });
        }
        Ok(())
    }

    fn add_tick_callback(&self, handle: HostRef<TickFn>) -> Result<()> {
        let label = handle.label().to_string();
        let id = handle.id();
        let slot = Box::into_raw(Box::new(handle));

        // SAFETY: `slot` stays valid until a successful removal.
        let status = unsafe { (self.api.add_update_callback)(update_trampoline, slot.cast()) };
        if status != 0 {
            // SAFETY: the host rejected the callback and kept nothing.
            drop(unsafe { Box::from_raw(slot) });
            return Err(registration(&label, format!("host returned status {status}")));
        }

        self.updates.lock().insert(id, slot as usize);
        Ok(())
    }

    fn remove_tick_callback(&self, handle: HandleId) -> Result<()> {
        let Some(addr) = self.updates.lock().get(&handle).copied() else {
            return Err(registration(
                &handle.to_string(),
                "tick callback was never added".into(),
            ));
        };

        // SAFETY: passes back the same pointer pair the host was given.
        let status =
            unsafe { (self.api.remove_update_callback)(update_trampoline, addr as *mut c_void) };
        if status != 0 {
            return Err(registration(
                &handle.to_string(),
                format!("host returned status {status}"),
            ));
        }

        self.updates.lock().remove(&handle);
        // SAFETY: `addr` came from `Box::into_raw` in `add_tick_callback` and
        // the host no longer holds it.
        drop(unsafe { Box::from_raw(addr as *mut HostRef<TickFn>) });
        Ok(())
    }

    fn invoke_named_callback(&self, name: &str, args: &[&str]) -> Result<()> {
        let c_name = c_string(name).map_err(|reason| dispatch(name, reason))?;
        let c_args = args
            .iter()
            .map(|arg| c_string(arg))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|reason| dispatch(name, reason))?;
        let argv: Vec<*const c_char> = c_args.iter().map(|arg| arg.as_ptr()).collect();
        let argc = c_int::try_from(argv.len())
            .map_err(|_| dispatch(name, format!("{} arguments", argv.len())))?;

        // SAFETY: `c_name`, `c_args` and `argv` all outlive the call.
        let status = unsafe { (self.api.invoke)(c_name.as_ptr(), argv.as_ptr(), argc) };
        if status != 0 {
            return Err(dispatch(name, format!("host returned status {status}")));
        }
        Ok(())
    }
}

impl Drop for FfiHost {
    fn drop(&mut self) {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            // Freeing these would leave the host with dangling user data.
            warn!(outstanding, "host still holds callbacks; leaking them");
        }
    }
}

extern "C" fn control_trampoline(
    _argv: *const *const c_char,
    _argc: c_int,
    user_data: *mut c_void,
) {
    // SAFETY: `user_data` is the box registered with this trampoline; it is
    // only freed after the host has unregistered it.
    let Some(handle) = (unsafe { user_data.cast::<HostRef<ControlFn>>().as_ref() }) else {
        warn!("script function called without user data");
        return;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| handle.invoke())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(label = handle.label(), "script function call dropped: {e}"),
        Err(_) => error!(label = handle.label(), "script function panicked"),
    }
}

extern "C" fn update_trampoline(delta_seconds: f64, user_data: *mut c_void) {
    // SAFETY: as in `control_trampoline`.
    let Some(handle) = (unsafe { user_data.cast::<HostRef<TickFn>>().as_ref() }) else {
        warn!("update callback called without user data");
        return;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| handle.invoke(delta_seconds))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(label = handle.label(), "update callback dropped: {e}"),
        Err(_) => error!(label = handle.label(), "update callback panicked"),
    }
}

fn c_string(value: &str) -> std::result::Result<CString, String> {
    CString::new(value).map_err(|e| format!("embedded NUL at byte {}", e.nul_position()))
}

fn registration(name: &str, reason: String) -> BridgeError {
    BridgeError::Registration {
        name: name.to_string(),
        reason,
    }
}

fn dispatch(name: &str, reason: String) -> BridgeError {
    BridgeError::Dispatch {
        callback: name.to_string(),
        reason,
    }
}
