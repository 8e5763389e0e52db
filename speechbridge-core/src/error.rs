use thiserror::Error;

use crate::engine::SessionState;

/// All errors produced by speechbridge-core.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("recognition engine could not be constructed: {0}")]
    Initialization(String),

    #[error("host rejected registration of '{name}': {reason}")]
    Registration { name: String, reason: String },

    #[error("failed to invoke host callback '{callback}': {reason}")]
    Dispatch { callback: String, reason: String },

    #[error("{operation} is not valid while the session is {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("{operation} refused: the recognition session is closed")]
    SessionClosed { operation: &'static str },

    #[error("handle '{label}' was invoked after it was released")]
    HandleReleased { label: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
