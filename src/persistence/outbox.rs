//! Outbox: ordered delivery of a finished session
//!
//! Failures are logged and counted, never surfaced to the session. Session
//! completion is retried once; everything else is best effort.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::SessionGateway;
use crate::session::{SessionRecord, SessionResult};
use crate::telemetry::TelemetryEvent;

/// Attempts made for the completion message
const COMPLETION_ATTEMPTS: u32 = 2;

/// One pending delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboxMessage {
    CompleteSession(SessionRecord),
    SubmitTelemetry {
        session_id: String,
        events: Vec<TelemetryEvent>,
    },
    RecalculateRisk {
        session_id: String,
    },
    FulfilInvitation {
        invitation_id: String,
        session_id: String,
        completed_at_ms: f64,
    },
}

impl OutboxMessage {
    fn name(&self) -> &'static str {
        match self {
            OutboxMessage::CompleteSession(_) => "complete_session",
            OutboxMessage::SubmitTelemetry { .. } => "submit_telemetry",
            OutboxMessage::RecalculateRisk { .. } => "recalculate_risk",
            OutboxMessage::FulfilInvitation { .. } => "fulfil_invitation",
        }
    }

    fn deliver(&self, gateway: &mut dyn SessionGateway) -> Result<(), crate::GatewayError> {
        match self {
            OutboxMessage::CompleteSession(record) => gateway.complete_session(record),
            OutboxMessage::SubmitTelemetry { session_id, events } => gateway.submit_telemetry(session_id, events),
            OutboxMessage::RecalculateRisk { session_id } => gateway.request_risk_recalculation(session_id),
            OutboxMessage::FulfilInvitation {
                invitation_id,
                session_id,
                completed_at_ms,
            } => gateway.fulfil_invitation(invitation_id, session_id, *completed_at_ms),
        }
    }
}

/// Outcome of a flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Pending deliveries, in order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outbox {
    queue: VecDeque<OutboxMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the deliveries for a finished session; returns how many
    ///
    /// Demo sessions queue nothing.
    pub fn enqueue(&mut self, result: &SessionResult) -> usize {
        let record = result.record();
        if record.demo {
            log::debug!("Demo session {} not queued", record.session_id);
            return 0;
        }

        let before = self.queue.len();
        self.queue.push_back(OutboxMessage::CompleteSession(record.clone()));

        let events = result.telemetry().events();
        if !events.is_empty() {
            self.queue.push_back(OutboxMessage::SubmitTelemetry {
                session_id: record.session_id.clone(),
                events: events.to_vec(),
            });
        }

        self.queue.push_back(OutboxMessage::RecalculateRisk {
            session_id: record.session_id.clone(),
        });

        if let (Some(invitation_id), false, Some(completed_at_ms)) =
            (&record.identity.invitation_id, record.abandoned, record.completed_at_ms)
        {
            self.queue.push_back(OutboxMessage::FulfilInvitation {
                invitation_id: invitation_id.clone(),
                session_id: record.session_id.clone(),
                completed_at_ms,
            });
        }

        let queued = self.queue.len() - before;
        log::info!("Queued {} deliveries for session {}", queued, record.session_id);
        queued
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &OutboxMessage> {
        self.queue.iter()
    }

    /// Deliver everything queued; failed messages are dropped after logging
    pub fn flush(&mut self, gateway: &mut dyn SessionGateway) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(message) = self.queue.pop_front() {
            let attempts = match message {
                OutboxMessage::CompleteSession(_) => COMPLETION_ATTEMPTS,
                _ => 1,
            };

            let mut delivered = false;
            for attempt in 1..=attempts {
                match message.deliver(gateway) {
                    Ok(()) => {
                        delivered = true;
                        break;
                    }
                    Err(e) => log::warn!(
                        "Delivery of {} failed (attempt {}/{}): {}",
                        message.name(),
                        attempt,
                        attempts,
                        e
                    ),
                }
            }

            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.failed > 0 {
            log::warn!("Outbox flush: {} delivered, {} failed", report.delivered, report.failed);
        } else {
            log::debug!("Outbox flush: {} delivered", report.delivered);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryGateway;
    use crate::session::{Session, SessionConfig, SessionIdentity};
    use crate::settings::Settings;
    use crate::sim::Concept;

    fn finished(demo: bool, invitation: Option<&str>, abandon: bool) -> SessionResult {
        let mut settings = Settings::default();
        settings.collector.duration_secs = 0.5;
        let identity = SessionIdentity {
            subject_id: "subject".into(),
            concept_id: "falling-objects".into(),
            tenant_id: "tenant".into(),
            invitation_id: invitation.map(str::to_string),
        };
        let mut session = Session::create(
            identity,
            SessionConfig {
                concept: Concept::FallingObjects,
                seed: 11,
                settings,
                demo,
            },
            None,
        );
        session.start(0.0).unwrap();
        if abandon {
            return session.abandon(1.0).unwrap().clone();
        }
        let mut n = 0.0;
        while session.result().is_none() {
            session.frame(n * 1000.0 / 60.0).unwrap();
            n += 1.0;
        }
        session.result().unwrap().clone()
    }

    #[test]
    fn test_enqueue_order() {
        let mut outbox = Outbox::new();
        assert_eq!(outbox.enqueue(&finished(false, Some("inv-1"), false)), 4);
        let names: Vec<_> = outbox.pending().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["complete_session", "submit_telemetry", "recalculate_risk", "fulfil_invitation"]
        );
    }

    #[test]
    fn test_demo_sessions_enqueue_nothing() {
        let mut outbox = Outbox::new();
        assert_eq!(outbox.enqueue(&finished(true, Some("inv-1"), false)), 0);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_abandoned_session_does_not_fulfil_invitation() {
        let mut outbox = Outbox::new();
        outbox.enqueue(&finished(false, Some("inv-2"), true));
        assert!(
            !outbox
                .pending()
                .any(|m| matches!(m, OutboxMessage::FulfilInvitation { .. }))
        );
    }

    #[test]
    fn test_completion_retried_once() {
        let mut outbox = Outbox::new();
        outbox.enqueue(&finished(false, None, false));

        let mut gateway = MemoryGateway::default();
        gateway.fail_next_completions = 1;
        let report = outbox.flush(&mut gateway);

        assert_eq!(report.failed, 0);
        assert_eq!(report.delivered, 3);
        assert_eq!(gateway.completions.len(), 1);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let mut outbox = Outbox::new();
        let result = finished(false, Some("inv-3"), false);
        outbox.enqueue(&result);

        let mut gateway = MemoryGateway::failing();
        let report = outbox.flush(&mut gateway);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 4);
        // The local result is untouched
        assert!(!result.record().abandoned);
    }
}
