//! `VRP*` entry points looked up by the host loader.

#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, CString};
use std::sync::OnceLock;

use speechbridge_core::config;
use tracing::warn;

use crate::ffi::HostApi;
use crate::{guarded, init_logging, initialize, register_host_api, shutdown};

const API_VERSION_MAJOR: c_int = 1;
const API_VERSION_MINOR: c_int = 1;

const PLUGIN_NAME: &str = concat!("SpeechBridge", "\0");
const PLUGIN_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

static SIGNATURE: OnceLock<CString> = OnceLock::new();

#[no_mangle]
pub extern "C" fn VRPGetAPIVersionMajor() -> c_int {
    API_VERSION_MAJOR
}

#[no_mangle]
pub extern "C" fn VRPGetAPIVersionMinor() -> c_int {
    API_VERSION_MINOR
}

#[no_mangle]
pub extern "C" fn VRPName() -> *const c_char {
    PLUGIN_NAME.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn VRPShortName() -> *const c_char {
    PLUGIN_NAME.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn VRPVersion() -> *const c_char {
    PLUGIN_VERSION.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn VRPSignature() -> *const c_char {
    SIGNATURE
        .get_or_init(|| {
            CString::new(option_env!("SPEECHBRIDGE_SIGNATURE").unwrap_or("")).unwrap_or_default()
        })
        .as_ptr()
}

/// Hand over the host scripting-bridge table. Must precede `VRPInit`.
///
/// # Safety
/// `api` must be null or point to a valid `HostApi`; the table is copied.
#[no_mangle]
pub unsafe extern "C" fn VRPRegisterHostApi(api: *const HostApi) -> c_int {
    // SAFETY: upheld by the caller.
    match unsafe { api.as_ref() } {
        Some(api) => {
            register_host_api(*api);
            0
        }
        None => {
            warn!("VRPRegisterHostApi called with a null table");
            1
        }
    }
}

#[no_mangle]
pub extern "C" fn VRPInit() -> c_int {
    guarded("plugin init", || {
        let config = config::load_effective_config();
        init_logging(&config);
        initialize(&config)
    })
}

#[no_mangle]
pub extern "C" fn VRPCleanup() -> c_int {
    guarded("plugin cleanup", shutdown)
}
