//! Browser LocalStorage gateway (WASM only)
//!
//! Stores each delivery under a namespaced key so a backend sync job (or a
//! later page load) can pick them up.

use web_sys::Storage;

use super::{NewSession, SessionGateway};
use crate::error::GatewayError;
use crate::session::SessionRecord;
use crate::telemetry::TelemetryEvent;

/// Key prefix for everything this gateway writes
const PREFIX: &str = "wellbeing_sim";

#[derive(Debug, Clone, Default)]
pub struct LocalStorageGateway;

impl LocalStorageGateway {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Result<Storage, GatewayError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| GatewayError::Unavailable("LocalStorage not available".into()))
    }

    fn put(key: &str, json: &str) -> Result<(), GatewayError> {
        Self::storage()?
            .set_item(key, json)
            .map_err(|_| GatewayError::Rejected(format!("LocalStorage refused {key}")))?;
        log::debug!("Stored {} ({} bytes)", key, json.len());
        Ok(())
    }

    /// Append to a JSON array stored under `key`
    fn push(key: &str, value: serde_json::Value) -> Result<(), GatewayError> {
        let storage = Self::storage()?;
        let mut list: Vec<serde_json::Value> = match storage.get_item(key) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            _ => Vec::new(),
        };
        list.push(value);
        Self::put(key, &serde_json::to_string(&list)?)
    }
}

impl SessionGateway for LocalStorageGateway {
    fn create_session(&mut self, request: &NewSession) -> Result<String, GatewayError> {
        let id = uuid::Uuid::new_v4().to_string();
        Self::put(&format!("{PREFIX}_session_{id}"), &serde_json::to_string(request)?)?;
        Ok(id)
    }

    fn complete_session(&mut self, record: &SessionRecord) -> Result<(), GatewayError> {
        Self::put(
            &format!("{PREFIX}_completion_{}", record.session_id),
            &serde_json::to_string(record)?,
        )
    }

    fn submit_telemetry(&mut self, session_id: &str, events: &[TelemetryEvent]) -> Result<(), GatewayError> {
        Self::put(&format!("{PREFIX}_telemetry_{session_id}"), &serde_json::to_string(events)?)
    }

    fn request_risk_recalculation(&mut self, session_id: &str) -> Result<(), GatewayError> {
        Self::push(
            &format!("{PREFIX}_recalculations"),
            serde_json::json!({ "session_id": session_id }),
        )
    }

    fn fulfil_invitation(
        &mut self,
        invitation_id: &str,
        session_id: &str,
        completed_at_ms: f64,
    ) -> Result<(), GatewayError> {
        Self::push(
            &format!("{PREFIX}_invitations"),
            serde_json::json!({
                "invitation_id": invitation_id,
                "session_id": session_id,
                "status": "completed",
                "completed_at_ms": completed_at_ms,
            }),
        )
    }
}
