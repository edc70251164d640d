//! Persistence boundary
//!
//! The engine never talks to storage from the tick path. A finished session
//! hands its `SessionResult` to the `Outbox`, which delivers it through a
//! `SessionGateway` later:
//! - `MemoryGateway`: in-process, for tests and offline runs
//! - `FileGateway`: JSON files on disk (native only)
//! - `LocalStorageGateway`: browser LocalStorage (WASM only)

pub mod memory;
pub mod outbox;

#[cfg(not(target_arch = "wasm32"))]
pub mod file;
#[cfg(target_arch = "wasm32")]
pub mod local_storage;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::session::{SessionIdentity, SessionRecord};
use crate::sim::Concept;
use crate::telemetry::TelemetryEvent;

pub use memory::MemoryGateway;
pub use outbox::{FlushReport, Outbox, OutboxMessage};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileGateway;
#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageGateway;

/// Session registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    #[serde(flatten)]
    pub identity: SessionIdentity,
    pub concept: Concept,
}

/// External collaborator that stores sessions and their telemetry
pub trait SessionGateway {
    /// Register a session and return its id
    fn create_session(&mut self, request: &NewSession) -> Result<String, GatewayError>;

    /// Store the final session row
    fn complete_session(&mut self, record: &SessionRecord) -> Result<(), GatewayError>;

    /// Store the ordered telemetry batch
    fn submit_telemetry(&mut self, session_id: &str, events: &[TelemetryEvent]) -> Result<(), GatewayError>;

    /// Ask downstream scoring to recompute (fire and forget)
    fn request_risk_recalculation(&mut self, session_id: &str) -> Result<(), GatewayError>;

    /// Mark the invitation behind a session as fulfilled
    fn fulfil_invitation(
        &mut self,
        invitation_id: &str,
        session_id: &str,
        completed_at_ms: f64,
    ) -> Result<(), GatewayError>;
}
