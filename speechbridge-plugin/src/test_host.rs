//! In-process C host used by unit tests. Process-global, so tests that touch
//! it hold [`SERIAL`].

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{const_mutex, Mutex};

use crate::ffi::{HostApi, ScriptFunction, UpdateFunction};

pub static SERIAL: Mutex<()> = const_mutex(());

static FUNCTIONS: Mutex<Vec<(String, ScriptFunction, usize)>> = const_mutex(Vec::new());
static UPDATES: Mutex<Vec<(UpdateFunction, usize)>> = const_mutex(Vec::new());
static INVOCATIONS: Mutex<Vec<(String, Vec<String>)>> = const_mutex(Vec::new());
static REFUSE_UNREGISTER: AtomicBool = AtomicBool::new(false);
static FAIL_INVOCATIONS: AtomicBool = AtomicBool::new(false);

pub fn api() -> HostApi {
    HostApi {
        register_global_function: register,
        unregister_global_function: unregister,
        add_update_callback: add_update,
        remove_update_callback: remove_update,
        invoke,
    }
}

pub fn reset() {
    FUNCTIONS.lock().clear();
    UPDATES.lock().clear();
    INVOCATIONS.lock().clear();
    REFUSE_UNREGISTER.store(false, Ordering::SeqCst);
    FAIL_INVOCATIONS.store(false, Ordering::SeqCst);
}

pub fn refuse_unregister(refuse: bool) {
    REFUSE_UNREGISTER.store(refuse, Ordering::SeqCst);
}

pub fn fail_invocations(fail: bool) {
    FAIL_INVOCATIONS.store(fail, Ordering::SeqCst);
}

pub fn function_names() -> Vec<String> {
    FUNCTIONS.lock().iter().map(|(name, _, _)| name.clone()).collect()
}

pub fn update_count() -> usize {
    UPDATES.lock().len()
}

pub fn take_invocations() -> Vec<(String, Vec<String>)> {
    std::mem::take(&mut *INVOCATIONS.lock())
}

/// Call a registered global the way a script would. `false` if unknown.
pub fn call_function(name: &str) -> bool {
    let entry = FUNCTIONS
        .lock()
        .iter()
        .find(|(registered, _, _)| registered == name)
        .map(|&(_, function, user_data)| (function, user_data));
    match entry {
        Some((function, user_data)) => {
            unsafe { function(ptr::null(), 0, user_data as *mut c_void) };
            true
        }
        None => false,
    }
}

/// Run one frame of update callbacks.
pub fn tick() {
    let updates = UPDATES.lock().clone();
    for (function, user_data) in updates {
        unsafe { function(0.016, user_data as *mut c_void) };
    }
}

fn read(text: *const c_char) -> String {
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}

extern "C" fn register(
    name: *const c_char,
    function: ScriptFunction,
    _arity: c_int,
    user_data: *mut c_void,
) -> c_int {
    FUNCTIONS
        .lock()
        .push((read(name), function, user_data as usize));
    0
}

extern "C" fn unregister(name: *const c_char, _function: ScriptFunction) -> c_int {
    if REFUSE_UNREGISTER.load(Ordering::SeqCst) {
        return 1;
    }
    let name = read(name);
    let mut functions = FUNCTIONS.lock();
    let before = functions.len();
    functions.retain(|(registered, _, _)| *registered != name);
    if functions.len() == before {
        1
    } else {
        0
    }
}

extern "C" fn add_update(function: UpdateFunction, user_data: *mut c_void) -> c_int {
    UPDATES.lock().push((function, user_data as usize));
    0
}

extern "C" fn remove_update(_function: UpdateFunction, user_data: *mut c_void) -> c_int {
    let mut updates = UPDATES.lock();
    let before = updates.len();
    updates.retain(|&(_, registered)| registered != user_data as usize);
    if updates.len() == before {
        1
    } else {
        0
    }
}

extern "C" fn invoke(name: *const c_char, argv: *const *const c_char, argc: c_int) -> c_int {
    let args = (0..argc as usize)
        .map(|i| read(unsafe { *argv.add(i) }))
        .collect();
    INVOCATIONS.lock().push((read(name), args));
    if FAIL_INVOCATIONS.load(Ordering::SeqCst) {
        1
    } else {
        0
    }
}
