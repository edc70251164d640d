//! Telemetry recorder
//!
//! Append-only, strictly ordered log of behaviourally relevant events. One
//! writer (the session) appends while running; nothing reads the log back
//! until it is sealed into a `ClosedLog` for the aggregator and the outbox.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::{ActionKind, Concept, EntityCategory, SimEvent, SimEventKind, StateSnapshot};

/// Closed set of event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    ActionTaken,
    PauseObserve,
    TargetShifted,
    ObjectCollected,
    TrapCollision,
    OvercorrectionDetected,
    Completed,
    Abandoned,
}

/// Risk level a subject chose with an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Risk of a collection given the hazards around it
    pub fn from_nearby_hazards(count: usize) -> Self {
        match count {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Event-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    Started {
        concept: Concept,
        seed: u64,
    },
    ActionTaken {
        action_type: ActionKind,
        intensity: f64,
        time_since_last_ms: Option<f64>,
    },
    PauseObserve {
        time_since_last_ms: Option<f64>,
    },
    TargetShifted {
        old_target: f64,
        new_target: f64,
    },
    ObjectCollected {
        category: EntityCategory,
        value: f64,
        score: f64,
        nearby_hazards: usize,
        reaction_time_ms: f64,
    },
    TrapCollision {
        health: f64,
        position: Vec2,
        reaction_time_ms: f64,
    },
    OvercorrectionDetected {
        correction_magnitude: f64,
        stability_loss: f64,
    },
    Completed {
        completion_rate: f64,
        raw_score: f64,
    },
    Abandoned {
        completion_rate: f64,
    },
}

impl EventDetail {
    pub fn event_type(&self) -> EventType {
        match self {
            EventDetail::Started { .. } => EventType::Started,
            EventDetail::ActionTaken { .. } => EventType::ActionTaken,
            EventDetail::PauseObserve { .. } => EventType::PauseObserve,
            EventDetail::TargetShifted { .. } => EventType::TargetShifted,
            EventDetail::ObjectCollected { .. } => EventType::ObjectCollected,
            EventDetail::TrapCollision { .. } => EventType::TrapCollision,
            EventDetail::OvercorrectionDetected { .. } => EventType::OvercorrectionDetected,
            EventDetail::Completed { .. } => EventType::Completed,
            EventDetail::Abandoned { .. } => EventType::Abandoned,
        }
    }
}

/// Structured event data: simulated time, state snapshot and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Simulated seconds at the event
    pub game_time: f64,
    pub system_state: StateSnapshot,
    pub detail: EventDetail,
}

/// One telemetry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub session_id: String,
    pub event_sequence: u64,
    pub event_type: EventType,
    /// Host wall-clock time (ms since the Unix epoch)
    pub event_timestamp_ms: f64,
    pub event_data: EventData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_speed_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level_chosen: Option<RiskLevel>,
}

impl TelemetryEvent {
    /// True for subject-initiated actions (including deliberate pauses)
    pub fn is_action(&self) -> bool {
        matches!(self.event_type, EventType::ActionTaken | EventType::PauseObserve)
    }
}

/// Append-only event log for one session
#[derive(Debug, Clone)]
pub struct TelemetryRecorder {
    session_id: String,
    events: Vec<TelemetryEvent>,
    next_sequence: u64,
    stability_samples: Vec<f64>,
    movement_samples: Vec<f32>,
}

impl TelemetryRecorder {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            events: Vec::new(),
            next_sequence: 0,
            stability_samples: Vec::new(),
            movement_samples: Vec::new(),
        }
    }

    /// Append an event and return its sequence number
    pub fn append(
        &mut self,
        detail: EventDetail,
        snapshot: StateSnapshot,
        game_time: f64,
        wall_clock_ms: f64,
        decision_speed_ms: Option<f64>,
        risk_level_chosen: Option<RiskLevel>,
    ) -> u64 {
        let event_sequence = self.next_sequence;
        self.next_sequence += 1;

        let event_type = detail.event_type();
        log::trace!("Telemetry #{} {:?}", event_sequence, event_type);
        self.events.push(TelemetryEvent {
            session_id: self.session_id.clone(),
            event_sequence,
            event_type,
            event_timestamp_ms: wall_clock_ms,
            event_data: EventData {
                game_time,
                system_state: snapshot,
                detail,
            },
            decision_speed_ms,
            risk_level_chosen,
        });
        event_sequence
    }

    /// Append the telemetry row for a simulation event
    pub fn record(&mut self, event: &SimEvent, wall_clock_ms: f64) -> u64 {
        let (detail, decision_speed_ms, risk) = match event.kind {
            SimEventKind::ActionApplied {
                action,
                since_last_ms,
            } => (
                EventDetail::ActionTaken {
                    action_type: action.kind,
                    intensity: action.intensity,
                    time_since_last_ms: since_last_ms,
                },
                since_last_ms,
                None,
            ),
            SimEventKind::PauseObserved { since_last_ms } => (
                EventDetail::PauseObserve {
                    time_since_last_ms: since_last_ms,
                },
                since_last_ms,
                Some(RiskLevel::None),
            ),
            SimEventKind::Overcorrection {
                magnitude,
                stability_loss,
            } => (
                EventDetail::OvercorrectionDetected {
                    correction_magnitude: magnitude,
                    stability_loss,
                },
                None,
                None,
            ),
            SimEventKind::TargetShifted { old, new } => (
                EventDetail::TargetShifted {
                    old_target: old,
                    new_target: new,
                },
                None,
                None,
            ),
            SimEventKind::Collected {
                category,
                value,
                score,
                nearby_hazards,
                reaction_ms,
            } => (
                EventDetail::ObjectCollected {
                    category,
                    value,
                    score,
                    nearby_hazards,
                    reaction_time_ms: reaction_ms,
                },
                Some(reaction_ms),
                Some(RiskLevel::from_nearby_hazards(nearby_hazards)),
            ),
            SimEventKind::HazardHit {
                health,
                position,
                reaction_ms,
            } => (
                EventDetail::TrapCollision {
                    health,
                    position,
                    reaction_time_ms: reaction_ms,
                },
                Some(reaction_ms),
                None,
            ),
        };
        self.append(
            detail,
            event.snapshot.clone(),
            event.game_time,
            wall_clock_ms,
            decision_speed_ms,
            risk,
        )
    }

    pub fn record_stability(&mut self, sample: f64) {
        self.stability_samples.push(sample);
    }

    pub fn record_movement(&mut self, sample: f32) {
        self.movement_samples.push(sample);
    }

    /// Number of subject actions so far (for HUDs)
    pub fn action_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_action()).count()
    }

    /// Close the log; no further appends are possible
    pub fn seal(self, elapsed_secs: f64) -> ClosedLog {
        log::debug!(
            "Sealed telemetry for {}: {} events, {} stability samples, {} movement samples",
            self.session_id,
            self.events.len(),
            self.stability_samples.len(),
            self.movement_samples.len()
        );
        ClosedLog {
            session_id: self.session_id,
            events: self.events,
            stability_samples: self.stability_samples,
            movement_samples: self.movement_samples,
            elapsed_secs,
        }
    }
}

/// Immutable, sealed session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedLog {
    session_id: String,
    events: Vec<TelemetryEvent>,
    stability_samples: Vec<f64>,
    movement_samples: Vec<f32>,
    elapsed_secs: f64,
}

impl ClosedLog {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }

    pub fn stability_samples(&self) -> &[f64] {
        &self.stability_samples
    }

    pub fn movement_samples(&self) -> &[f32] {
        &self.movement_samples
    }

    /// Simulated seconds the session ran
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn of_type(&self, event_type: EventType) -> impl Iterator<Item = &TelemetryEvent> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn actions(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.events.iter().filter(|e| e.is_action())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Action, BalanceSystem};
    use crate::settings::BalanceTuning;

    fn snapshot() -> StateSnapshot {
        BalanceSystem::new(&BalanceTuning::default()).snapshot()
    }

    #[test]
    fn test_sequence_starts_at_zero_and_increases() {
        let mut recorder = TelemetryRecorder::new("s-1");
        for i in 0..5 {
            let seq = recorder.append(
                EventDetail::PauseObserve {
                    time_since_last_ms: None,
                },
                snapshot(),
                i as f64,
                1_000.0,
                None,
                None,
            );
            assert_eq!(seq, i);
        }
        let log = recorder.seal(5.0);
        let seqs: Vec<u64> = log.events().iter().map(|e| e.event_sequence).collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seqs[0], 0);
        assert!(log.events().iter().all(|e| e.session_id == "s-1"));
    }

    #[test]
    fn test_record_maps_collection_risk() {
        let mut recorder = TelemetryRecorder::new("s-2");
        let event = SimEvent {
            kind: SimEventKind::Collected {
                category: EntityCategory::Bonus,
                value: 25.0,
                score: 25.0,
                nearby_hazards: 2,
                reaction_ms: 480.0,
            },
            snapshot: snapshot(),
            game_time: 3.0,
        };
        recorder.record(&event, 42.0);
        let log = recorder.seal(3.0);
        let row = &log.events()[0];
        assert_eq!(row.event_type, EventType::ObjectCollected);
        assert_eq!(row.risk_level_chosen, Some(RiskLevel::High));
        assert_eq!(row.decision_speed_ms, Some(480.0));
        assert_eq!(row.event_data.game_time, 3.0);
    }

    #[test]
    fn test_actions_include_pauses() {
        let mut recorder = TelemetryRecorder::new("s-3");
        let action = Action {
            kind: ActionKind::Strong,
            intensity: 2.0,
            timestamp_ms: 0.0,
        };
        recorder.record(
            &SimEvent {
                kind: SimEventKind::ActionApplied {
                    action,
                    since_last_ms: None,
                },
                snapshot: snapshot(),
                game_time: 0.0,
            },
            0.0,
        );
        recorder.record(
            &SimEvent {
                kind: SimEventKind::PauseObserved {
                    since_last_ms: Some(200.0),
                },
                snapshot: snapshot(),
                game_time: 0.2,
            },
            0.0,
        );
        recorder.record(
            &SimEvent {
                kind: SimEventKind::TargetShifted { old: 50.0, new: 40.0 },
                snapshot: snapshot(),
                game_time: 0.3,
            },
            0.0,
        );
        assert_eq!(recorder.action_count(), 2);
        assert_eq!(recorder.seal(1.0).actions().count(), 2);
    }

    #[test]
    fn test_event_serializes_with_snake_case_type() {
        let mut recorder = TelemetryRecorder::new("s-4");
        recorder.append(
            EventDetail::OvercorrectionDetected {
                correction_magnitude: 24.0,
                stability_loss: 3.0,
            },
            snapshot(),
            1.0,
            0.0,
            None,
            None,
        );
        let log = recorder.seal(1.0);
        let json = serde_json::to_value(&log.events()[0]).unwrap();
        assert_eq!(json["event_type"], "overcorrection_detected");
        assert_eq!(json["event_data"]["system_state"]["variant"], "balance");
        assert!(json.get("decision_speed_ms").is_none());
    }
}
