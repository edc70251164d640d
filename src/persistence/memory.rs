//! In-memory gateway

use super::{NewSession, SessionGateway};
use crate::error::GatewayError;
use crate::session::SessionRecord;
use crate::telemetry::TelemetryEvent;

/// Keeps everything it receives; can be told to fail
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    pub sessions: Vec<(String, NewSession)>,
    pub completions: Vec<SessionRecord>,
    pub telemetry: Vec<(String, Vec<TelemetryEvent>)>,
    pub recalculations: Vec<String>,
    pub fulfilled: Vec<(String, String)>,
    /// Reject every call
    pub unavailable: bool,
    /// Reject this many upcoming completion calls
    pub fail_next_completions: u32,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that rejects every call
    pub fn failing() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.unavailable {
            Err(GatewayError::Unavailable("memory gateway offline".into()))
        } else {
            Ok(())
        }
    }
}

impl SessionGateway for MemoryGateway {
    fn create_session(&mut self, request: &NewSession) -> Result<String, GatewayError> {
        self.check()?;
        let id = format!("session-{}", self.sessions.len() + 1);
        self.sessions.push((id.clone(), request.clone()));
        Ok(id)
    }

    fn complete_session(&mut self, record: &SessionRecord) -> Result<(), GatewayError> {
        self.check()?;
        if self.fail_next_completions > 0 {
            self.fail_next_completions -= 1;
            return Err(GatewayError::Unavailable("completion rejected".into()));
        }
        self.completions.push(record.clone());
        Ok(())
    }

    fn submit_telemetry(&mut self, session_id: &str, events: &[TelemetryEvent]) -> Result<(), GatewayError> {
        self.check()?;
        if events.iter().any(|e| e.session_id != session_id) {
            return Err(GatewayError::Rejected(format!("foreign events in batch for {session_id}")));
        }
        self.telemetry.push((session_id.to_string(), events.to_vec()));
        Ok(())
    }

    fn request_risk_recalculation(&mut self, session_id: &str) -> Result<(), GatewayError> {
        self.check()?;
        self.recalculations.push(session_id.to_string());
        Ok(())
    }

    fn fulfil_invitation(
        &mut self,
        invitation_id: &str,
        session_id: &str,
        _completed_at_ms: f64,
    ) -> Result<(), GatewayError> {
        self.check()?;
        self.fulfilled.push((invitation_id.to_string(), session_id.to_string()));
        Ok(())
    }
}
