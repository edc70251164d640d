//! Engine error types

use thiserror::Error;

use crate::session::SessionPhase;

/// Errors raised by the engine itself
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Illegal session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error("Session has already ended ({0:?})")]
    SessionEnded(SessionPhase),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors reported by persistence collaborators
///
/// These never abort a session; the outbox logs them and moves on.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
