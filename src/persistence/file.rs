//! JSON file gateway (native only)
//!
//! Layout under the root directory:
//! - `<session_id>/session.json`: registration
//! - `<session_id>/completion.json`: final session row
//! - `<session_id>/telemetry.json`: ordered event batch
//! - `recalculations.jsonl`, `invitations.jsonl`: append-only request logs

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{NewSession, SessionGateway};
use crate::error::GatewayError;
use crate::session::SessionRecord;
use crate::telemetry::TelemetryEvent;

#[derive(Debug, Clone)]
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, GatewayError> {
        if session_id.is_empty() || session_id.contains(['/', '\\', '.']) {
            return Err(GatewayError::Rejected(format!("invalid session id {session_id:?}")));
        }
        let dir = self.root.join(session_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), GatewayError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    fn append_line<T: Serialize>(&self, name: &str, value: &T) -> Result<(), GatewayError> {
        fs::create_dir_all(&self.root)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(name))?;
        let line = serde_json::to_string(value)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl SessionGateway for FileGateway {
    fn create_session(&mut self, request: &NewSession) -> Result<String, GatewayError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = self.session_dir(&id)?;
        Self::write_json(&dir.join("session.json"), request)?;
        Ok(id)
    }

    fn complete_session(&mut self, record: &SessionRecord) -> Result<(), GatewayError> {
        let dir = self.session_dir(&record.session_id)?;
        Self::write_json(&dir.join("completion.json"), record)
    }

    fn submit_telemetry(&mut self, session_id: &str, events: &[TelemetryEvent]) -> Result<(), GatewayError> {
        let dir = self.session_dir(session_id)?;
        Self::write_json(&dir.join("telemetry.json"), events)
    }

    fn request_risk_recalculation(&mut self, session_id: &str) -> Result<(), GatewayError> {
        self.append_line("recalculations.jsonl", &serde_json::json!({ "session_id": session_id }))
    }

    fn fulfil_invitation(
        &mut self,
        invitation_id: &str,
        session_id: &str,
        completed_at_ms: f64,
    ) -> Result<(), GatewayError> {
        self.append_line(
            "invitations.jsonl",
            &serde_json::json!({
                "invitation_id": invitation_id,
                "session_id": session_id,
                "status": "completed",
                "completed_at_ms": completed_at_ms,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionIdentity;
    use crate::sim::Concept;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wellbeing-sim-{}-{}", name, uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_create_and_submit() {
        let root = temp_root("create");
        let mut gateway = FileGateway::new(&root);
        let id = gateway
            .create_session(&NewSession {
                identity: SessionIdentity::default(),
                concept: Concept::BalanceUnderPressure,
            })
            .unwrap();
        assert!(root.join(&id).join("session.json").exists());

        gateway.submit_telemetry(&id, &[]).unwrap();
        let json = fs::read_to_string(root.join(&id).join("telemetry.json")).unwrap();
        assert_eq!(json.trim(), "[]");

        gateway.request_risk_recalculation(&id).unwrap();
        gateway.request_risk_recalculation(&id).unwrap();
        let lines = fs::read_to_string(root.join("recalculations.jsonl")).unwrap();
        assert_eq!(lines.lines().count(), 2);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let root = temp_root("reject");
        let mut gateway = FileGateway::new(&root);
        assert!(matches!(
            gateway.submit_telemetry("../escape", &[]),
            Err(GatewayError::Rejected(_))
        ));
        fs::remove_dir_all(&root).ok();
    }
}
