//! Session lifecycle
//!
//! A `Session` owns one simulation run end to end: identity, the phase
//! machine, the frame clock, the action queue, and the telemetry recorder.
//! When the run ends it seals the log, aggregates it once, and keeps a single
//! immutable `SessionResult` for the outbox to deliver.

use serde::{Deserialize, Serialize};

use crate::clamp_percent;
use crate::error::EngineError;
use crate::metrics::{DerivedMetrics, aggregate};
use crate::persistence::{NewSession, SessionGateway};
use crate::platform::{FrameClock, RawInput};
use crate::settings::Settings;
use crate::sim::{ActionDispatcher, ActionKind, Concept, SimEventKind, SimulationState, Termination, Variant, tick};
use crate::telemetry::{ClosedLog, EventDetail, TelemetryRecorder};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    Running,
    Paused,
    Completed,
    Abandoned,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Abandoned)
    }

    /// Legal transitions; nothing leaves a terminal phase
    pub fn can_transition_to(&self, to: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, to),
            (Created, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Created, Abandoned)
                | (Running, Abandoned)
                | (Paused, Abandoned)
        )
    }
}

/// Invitation that links a session to a subject and tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_id: String,
    pub subject_id: String,
    pub concept_id: String,
    pub tenant_id: String,
}

/// Who a session is for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub subject_id: String,
    pub concept_id: String,
    pub tenant_id: String,
    pub invitation_id: Option<String>,
}

impl From<&Invitation> for SessionIdentity {
    fn from(invitation: &Invitation) -> Self {
        Self {
            subject_id: invitation.subject_id.clone(),
            concept_id: invitation.concept_id.clone(),
            tenant_id: invitation.tenant_id.clone(),
            invitation_id: Some(invitation.invitation_id.clone()),
        }
    }
}

/// Options fixed at session creation
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub concept: Concept,
    pub seed: u64,
    pub settings: Settings,
    /// Demo sessions record locally but never reach the outbox
    pub demo: bool,
}

/// Variant-specific sub-scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum VariantScores {
    Balance {
        impulsivity_score: f64,
        overcorrection_rate: f64,
        patience_score: f64,
        average_stability: f64,
        action_count: usize,
        actions_per_minute: f64,
        decision_speed_variance: f64,
        risk_escalation_detected: bool,
    },
    Collector {
        risk_taking_ratio: f64,
        average_reaction_time_ms: f64,
        movement_variance: f64,
        collections: usize,
        risky_collections: usize,
        hazard_hits: usize,
        final_health: f64,
        final_score: f64,
        decision_speed_variance: f64,
        risk_escalation_detected: bool,
    },
}

/// Persistent session row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(flatten)]
    pub identity: SessionIdentity,
    pub concept: Concept,
    pub seed: u64,
    pub demo: bool,
    /// Host wall-clock (ms since the Unix epoch)
    pub started_at_ms: f64,
    pub completed_at_ms: Option<f64>,
    pub duration_seconds: u64,
    pub completion_rate: f64,
    pub abandoned: bool,
    pub raw_score: f64,
    pub behaviour_risk_index: f64,
    pub scores: Option<VariantScores>,
}

/// Everything a finished session produced; created once, never modified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    record: SessionRecord,
    metrics: DerivedMetrics,
    telemetry: ClosedLog,
}

impl SessionResult {
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn metrics(&self) -> &DerivedMetrics {
        &self.metrics
    }

    pub fn telemetry(&self) -> &ClosedLog {
        &self.telemetry
    }

    pub fn session_id(&self) -> &str {
        &self.record.session_id
    }
}

/// One simulation run
pub struct Session {
    phase: SessionPhase,
    record: SessionRecord,
    settings: Settings,
    state: SimulationState,
    dispatcher: ActionDispatcher,
    clock: FrameClock,
    recorder: Option<TelemetryRecorder>,
    result: Option<SessionResult>,
    last_action: Option<ActionKind>,
    /// Host time the current pause began
    paused_at_ms: Option<f64>,
}

impl Session {
    /// Create a session, registering it with the gateway when one is given
    ///
    /// Falls back to a local UUID if registration fails or there is no
    /// gateway; demo sessions never register.
    pub fn create(
        identity: SessionIdentity,
        config: SessionConfig,
        gateway: Option<&mut dyn SessionGateway>,
    ) -> Self {
        let request = NewSession {
            identity: identity.clone(),
            concept: config.concept,
        };
        let registered = match gateway {
            Some(gateway) if !config.demo => match gateway.create_session(&request) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Session registration failed, using local id: {}", e);
                    None
                }
            },
            _ => None,
        };
        let session_id = registered.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        log::info!(
            "Created {} session {} (seed {}, demo: {})",
            config.concept.slug(),
            session_id,
            config.seed,
            config.demo
        );

        Self {
            phase: SessionPhase::Created,
            record: SessionRecord {
                session_id: session_id.clone(),
                identity,
                concept: config.concept,
                seed: config.seed,
                demo: config.demo,
                started_at_ms: 0.0,
                completed_at_ms: None,
                duration_seconds: 0,
                completion_rate: 0.0,
                abandoned: false,
                raw_score: 0.0,
                behaviour_risk_index: 0.0,
                scores: None,
            },
            state: SimulationState::new(config.concept, config.seed, &config.settings),
            dispatcher: ActionDispatcher::new(config.concept),
            clock: FrameClock::new(),
            recorder: Some(TelemetryRecorder::new(session_id)),
            result: None,
            last_action: None,
            paused_at_ms: None,
            settings: config.settings,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> &str {
        &self.record.session_id
    }

    pub fn concept(&self) -> Concept {
        self.state.concept
    }

    pub fn is_demo(&self) -> bool {
        self.record.demo
    }

    /// Read-only view for the renderer
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Expected run length in simulated seconds
    pub fn expected_secs(&self) -> f64 {
        self.state.concept.duration_secs(&self.settings)
    }

    pub fn time_remaining_secs(&self) -> f64 {
        (self.expected_secs() - self.state.elapsed_secs).max(0.0)
    }

    /// Subject actions recorded so far
    pub fn action_count(&self) -> usize {
        match (&self.recorder, &self.result) {
            (Some(recorder), _) => recorder.action_count(),
            (None, Some(result)) => result.metrics.action_count,
            (None, None) => 0,
        }
    }

    /// Most recent subject action applied by the simulation
    pub fn last_action(&self) -> Option<ActionKind> {
        self.last_action
    }

    /// The finished result, once the session is terminal
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn start(&mut self, now_ms: f64) -> Result<(), EngineError> {
        self.transition(SessionPhase::Running)?;
        self.record.started_at_ms = now_ms;
        self.clock.suspend();

        let detail = EventDetail::Started {
            concept: self.state.concept,
            seed: self.state.seed,
        };
        let snapshot = self.state.snapshot();
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.append(detail, snapshot, 0.0, now_ms, None, None);
        }
        log::info!("Session {} started", self.record.session_id);
        Ok(())
    }

    /// Suspend the run; paused wall-clock time is never credited
    ///
    /// Neither the frame clock nor decision timing counts the paused
    /// interval, and gestures queued before the pause are dropped.
    pub fn pause(&mut self, now_ms: f64) -> Result<(), EngineError> {
        self.transition(SessionPhase::Paused)?;
        self.clock.suspend();
        let dropped = self.dispatcher.suspend();
        self.paused_at_ms = Some(now_ms);
        log::info!(
            "Session {} paused at {:.2}s ({} queued gestures dropped)",
            self.record.session_id,
            self.state.elapsed_secs,
            dropped
        );
        Ok(())
    }

    pub fn resume(&mut self, now_ms: f64) -> Result<(), EngineError> {
        self.transition(SessionPhase::Running)?;
        self.clock.suspend();
        if let Some(paused_at) = self.paused_at_ms.take() {
            self.dispatcher.credit_pause(now_ms - paused_at);
        }
        log::info!("Session {} resumed", self.record.session_id);
        Ok(())
    }

    /// Queue raw input; ignored unless running
    pub fn handle_input(&mut self, event: &RawInput) {
        if self.phase == SessionPhase::Running {
            self.dispatcher.handle(event);
        }
    }

    /// Advance by however many ticks the frame timestamp credits
    ///
    /// Returns the number of ticks run. Frames outside `Running` run nothing.
    pub fn frame(&mut self, now_ms: f64) -> Result<u32, EngineError> {
        match self.phase {
            SessionPhase::Running => {}
            SessionPhase::Created | SessionPhase::Paused => return Ok(0),
            phase => return Err(EngineError::SessionEnded(phase)),
        }

        let ticks = self.clock.advance(now_ms);
        for ran in 0..ticks {
            let input = self.dispatcher.drain();
            let outcome = tick(&mut self.state, &input, crate::consts::SIM_DT, &self.settings);

            if let Some(recorder) = self.recorder.as_mut() {
                for event in &outcome.events {
                    recorder.record(event, now_ms);
                }
                if let Some(sample) = outcome.stability_sample {
                    recorder.record_stability(sample);
                }
                if let Some(sample) = outcome.movement_sample {
                    recorder.record_movement(sample);
                }
            }
            for event in &outcome.events {
                if let SimEventKind::ActionApplied { action, .. } = &event.kind {
                    self.last_action = Some(action.kind);
                }
            }

            if let Some(termination) = outcome.termination {
                self.finish(SessionPhase::Completed, Some(termination), now_ms)?;
                return Ok(ran + 1);
            }
        }
        Ok(ticks)
    }

    /// External cancellation; still aggregates the partial log
    pub fn abandon(&mut self, now_ms: f64) -> Result<&SessionResult, EngineError> {
        self.finish(SessionPhase::Abandoned, None, now_ms)
    }

    /// Teardown hook: abandon if the session never reached a terminal phase
    pub fn abandon_if_unfinished(&mut self, now_ms: f64) -> Option<&SessionResult> {
        if self.phase.is_terminal() {
            return self.result.as_ref();
        }
        log::warn!("Recovering unfinished session {} as abandoned", self.record.session_id);
        self.abandon(now_ms).ok()
    }

    fn transition(&mut self, to: SessionPhase) -> Result<(), EngineError> {
        if !self.phase.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from: self.phase, to });
        }
        log::debug!("Session {}: {:?} -> {:?}", self.record.session_id, self.phase, to);
        self.phase = to;
        Ok(())
    }

    fn finish(
        &mut self,
        to: SessionPhase,
        termination: Option<Termination>,
        now_ms: f64,
    ) -> Result<&SessionResult, EngineError> {
        self.transition(to)?;

        let elapsed = self.state.elapsed_secs;
        let expected = self.expected_secs();
        let completion_rate = match termination {
            Some(Termination::TimeBudget) => 100.0,
            _ if expected > 0.0 => clamp_percent(elapsed / expected * 100.0),
            _ => 0.0,
        };
        let raw_score = self.state.raw_score();
        let abandoned = to == SessionPhase::Abandoned;

        let detail = if abandoned {
            EventDetail::Abandoned { completion_rate }
        } else {
            EventDetail::Completed {
                completion_rate,
                raw_score,
            }
        };
        let mut recorder = self
            .recorder
            .take()
            .unwrap_or_else(|| TelemetryRecorder::new(self.record.session_id.clone()));
        recorder.append(detail, self.state.snapshot(), elapsed, now_ms, None, None);
        let telemetry = recorder.seal(elapsed);

        let metrics = aggregate(&telemetry, self.state.concept, &self.settings);
        let scores = variant_scores(&self.state, &metrics);

        self.record.completed_at_ms = Some(now_ms);
        self.record.duration_seconds = elapsed.max(0.0).floor() as u64;
        self.record.completion_rate = completion_rate;
        self.record.abandoned = abandoned;
        self.record.raw_score = raw_score;
        self.record.behaviour_risk_index = metrics.behaviour_risk_index;
        self.record.scores = Some(scores);

        log::info!(
            "Session {} {:?} after {:.1}s: completion {:.0}%, index {:.1}",
            self.record.session_id,
            to,
            elapsed,
            completion_rate,
            metrics.behaviour_risk_index
        );

        Ok(self.result.insert(SessionResult {
            record: self.record.clone(),
            metrics,
            telemetry,
        }))
    }
}

fn variant_scores(state: &SimulationState, m: &DerivedMetrics) -> VariantScores {
    match &state.variant {
        Variant::Balance(_) => VariantScores::Balance {
            impulsivity_score: m.impulsivity_score,
            overcorrection_rate: m.overcorrection_rate,
            patience_score: m.patience_score,
            average_stability: m.average_stability,
            action_count: m.action_count,
            actions_per_minute: m.actions_per_minute,
            decision_speed_variance: m.decision_speed_variance,
            risk_escalation_detected: m.risk_escalation_detected,
        },
        Variant::Collector(field) => VariantScores::Collector {
            risk_taking_ratio: m.risk_taking_ratio,
            average_reaction_time_ms: m.average_reaction_time_ms,
            movement_variance: m.movement_variance,
            collections: m.collections,
            risky_collections: m.risky_collections,
            hazard_hits: m.hazard_hits,
            final_health: field.health,
            final_score: field.score,
            decision_speed_variance: m.decision_speed_variance,
            risk_escalation_detected: m.risk_escalation_detected,
        },
    }
}
