//! End-to-end session scenarios through the public API

use wellbeing_sim::autopilot::{self, Autopilot, FRAME_MS, Profile};
use wellbeing_sim::metrics::aggregate;
use wellbeing_sim::persistence::{MemoryGateway, Outbox};
use wellbeing_sim::platform::{Key, RawInput};
use wellbeing_sim::session::{SessionConfig, SessionIdentity, VariantScores};
use wellbeing_sim::sim::{Entity, EntityCategory, SimulationState, TickInput, Variant, tick};
use wellbeing_sim::telemetry::{EventDetail, EventType, TelemetryRecorder};
use wellbeing_sim::{Concept, EngineError, Invitation, Session, SessionPhase, Settings};

fn config(concept: Concept, settings: Settings) -> SessionConfig {
    SessionConfig {
        concept,
        seed: 2024,
        settings,
        demo: false,
    }
}

/// Run frames with no input until the session ends
fn run_idle(session: &mut Session) -> f64 {
    let mut n = 0u32;
    while session.phase() == SessionPhase::Running {
        session.frame(n as f64 * FRAME_MS).unwrap();
        n += 1;
        assert!(n < 100_000, "session never ended");
    }
    n as f64 * FRAME_MS
}

#[test]
fn test_zero_actions_is_fully_patient() {
    let mut settings = Settings::default();
    settings.balance.duration_secs = 5.0;
    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::BalanceUnderPressure, settings),
        None,
    );
    session.start(0.0).unwrap();
    run_idle(&mut session);

    let result = session.result().unwrap();
    let m = result.metrics();
    assert_eq!(session.phase(), SessionPhase::Completed);
    assert_eq!(result.record().completion_rate, 100.0);
    assert_eq!(m.patience_score, 100.0);
    assert_eq!(m.impulsivity_score, 0.0);
    assert_eq!(m.overcorrection_rate, 0.0);
    assert!((0.0..=100.0).contains(&m.behaviour_risk_index));
}

#[test]
fn test_rapid_actions_saturate_impulsivity() {
    let mut settings = Settings::default();
    settings.balance.duration_secs = 10.0;
    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::BalanceUnderPressure, settings),
        None,
    );
    session.start(0.0).unwrap();

    let mut presses = 0;
    let mut next_press = 0.0;
    let mut n = 0u32;
    while session.phase() == SessionPhase::Running {
        let now = n as f64 * FRAME_MS;
        if presses < 10 && now >= next_press {
            session.handle_input(&RawInput::KeyDown {
                key: Key::Up,
                repeat: false,
                timestamp_ms: now,
            });
            session.handle_input(&RawInput::KeyUp {
                key: Key::Up,
                timestamp_ms: now,
            });
            presses += 1;
            next_press = now + 500.0;
        }
        session.frame(now).unwrap();
        n += 1;
    }

    let m = session.result().unwrap().metrics();
    assert_eq!(m.action_count, 10);
    // 9 of 10 actions follow another within 1 s: 200 * 9 / 10 saturates
    assert_eq!(m.impulsivity_score, 100.0);
}

#[test]
fn test_collecting_next_to_a_hazard_is_risky() {
    let mut settings = Settings::default();
    settings.collector.spawn_interval_ms = 1.0e9;
    let mut state = SimulationState::new(Concept::FallingObjects, 7, &settings);
    if let Variant::Collector(field) = &mut state.variant {
        field.last_spawn_ms = Some(0.0);
        let (ax, ay) = (field.actor.x, field.actor.y);

        let mut reward = Entity::new(1, EntityCategory::Reward, ax - 17.5);
        reward.pos.y = ay - 5.0;
        let mut hazard = Entity::new(2, EntityCategory::Hazard, ax + 32.5);
        hazard.pos.y = ay - 60.0;
        field.entities.push(reward);
        field.entities.push(hazard);
    }

    let mut recorder = TelemetryRecorder::new("scenario-c");
    let outcome = tick(&mut state, &TickInput::default(), 1.0 / 60.0, &settings);
    for event in &outcome.events {
        recorder.record(event, 0.0);
    }
    let log = recorder.seal(state.elapsed_secs);
    let m = aggregate(&log, Concept::FallingObjects, &settings);

    assert_eq!(m.collections, 1);
    assert_eq!(m.risky_collections, 1);
    assert_eq!(m.risk_taking_ratio, 100.0);
    assert_eq!(m.hazard_hits, 0);
}

#[test]
fn test_hazard_hits_deplete_health_and_end_early() {
    let mut settings = Settings::default();
    settings.collector.duration_secs = 30.0;
    settings.collector.spawn_interval_ms = 50.0;
    settings.collector.initial_health = 45.0;
    // Actor spans the whole field so every entity lands on it
    settings.collector.actor_width = settings.collector.field_width;

    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::FallingObjects, settings),
        None,
    );
    session.start(0.0).unwrap();
    run_idle(&mut session);

    assert_eq!(session.phase(), SessionPhase::Completed);
    let result = session.result().unwrap();
    let record = result.record();
    assert!(!record.abandoned);
    assert!(record.completion_rate < 100.0);

    let expected = session.state().elapsed_secs / 30.0 * 100.0;
    assert!((record.completion_rate - expected).abs() < 1e-9);

    let healths: Vec<f64> = result
        .telemetry()
        .of_type(EventType::TrapCollision)
        .filter_map(|e| match e.event_data.detail {
            EventDetail::TrapCollision { health, .. } => Some(health),
            _ => None,
        })
        .collect();
    assert_eq!(&healths[..3], &[30.0, 15.0, 0.0]);
    assert!(healths.iter().all(|h| *h >= 0.0));

    match &record.scores {
        Some(VariantScores::Collector { final_health, hazard_hits, .. }) => {
            assert_eq!(*final_health, 0.0);
            assert!(*hazard_hits >= 3);
        }
        other => panic!("unexpected scores {other:?}"),
    }
}

#[test]
fn test_cancellation_keeps_a_valid_partial_result() {
    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::BalanceUnderPressure, Settings::default()),
        None,
    );
    let mut pilot = Autopilot::new(Profile::Impulsive, 11);
    session.start(0.0).unwrap();
    for n in 0..900 {
        let now = n as f64 * FRAME_MS;
        for event in pilot.inputs(session.state(), now) {
            session.handle_input(&event);
        }
        session.frame(now).unwrap();
    }

    let result = session.abandon(15_000.0).unwrap().clone();
    assert!(result.record().abandoned);
    assert!(result.record().completion_rate < 100.0);
    assert!((0.0..=100.0).contains(&result.metrics().behaviour_risk_index));

    // Terminal phases admit nothing further
    assert!(matches!(session.frame(16_000.0), Err(EngineError::SessionEnded(_))));
    assert!(matches!(session.start(16_000.0), Err(EngineError::InvalidTransition { .. })));
    assert!(session.resume(16_000.0).is_err());
    assert_eq!(session.result(), Some(&result));
}

#[test]
fn test_same_seed_and_script_replay_identically() {
    let run = |concept| {
        let mut settings = Settings::default();
        settings.balance.duration_secs = 8.0;
        settings.collector.duration_secs = 8.0;
        let mut gateway = MemoryGateway::new();
        let mut session = Session::create(SessionIdentity::default(), config(concept, settings), Some(&mut gateway));
        let mut pilot = Autopilot::new(Profile::Impulsive, 5);
        autopilot::drive(&mut session, &mut pilot, 1_000.0).unwrap();
        session.result().cloned().unwrap()
    };

    for concept in [Concept::BalanceUnderPressure, Concept::FallingObjects] {
        let a = run(concept);
        let b = run(concept);
        assert_eq!(a, b);
        assert!(a.metrics().action_count > 0);
    }
}

#[test]
fn test_event_sequence_is_strictly_increasing() {
    let mut settings = Settings::default();
    settings.collector.duration_secs = 10.0;
    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::FallingObjects, settings),
        None,
    );
    let mut pilot = Autopilot::new(Profile::Calm, 3);
    autopilot::drive(&mut session, &mut pilot, 0.0).unwrap();

    let events = session.result().unwrap().telemetry().events();
    assert!(events.len() > 2);
    assert_eq!(events[0].event_sequence, 0);
    assert!(events.windows(2).all(|w| w[0].event_sequence < w[1].event_sequence));
    assert!(events.iter().all(|e| e.session_id == session.session_id()));
}

#[test]
fn test_calm_subject_scores_lower_than_impulsive() {
    let score = |profile| {
        let mut settings = Settings::default();
        settings.balance.duration_secs = 30.0;
        let mut session = Session::create(
            SessionIdentity::default(),
            config(Concept::BalanceUnderPressure, settings),
            None,
        );
        let mut pilot = Autopilot::new(profile, 8);
        autopilot::drive(&mut session, &mut pilot, 0.0).unwrap();
        session.result().unwrap().metrics().behaviour_risk_index
    };
    assert!(score(Profile::Calm) < score(Profile::Impulsive));
}

#[test]
fn test_invited_session_delivers_everything_in_order() {
    let invitation = Invitation {
        invitation_id: "inv-9".into(),
        subject_id: "subject-3".into(),
        concept_id: "balance-under-pressure".into(),
        tenant_id: "tenant-1".into(),
    };
    let mut settings = Settings::default();
    settings.balance.duration_secs = 3.0;

    let mut gateway = MemoryGateway::new();
    let mut session = Session::create(
        SessionIdentity::from(&invitation),
        config(Concept::BalanceUnderPressure, settings),
        Some(&mut gateway),
    );
    assert_eq!(session.session_id(), "session-1");
    let mut pilot = Autopilot::new(Profile::Calm, 1);
    autopilot::drive(&mut session, &mut pilot, 0.0).unwrap();

    let mut outbox = Outbox::new();
    assert_eq!(outbox.enqueue(session.result().unwrap()), 4);
    let report = outbox.flush(&mut gateway);
    assert_eq!(report.delivered, 4);
    assert_eq!(report.failed, 0);

    assert_eq!(gateway.completions.len(), 1);
    assert_eq!(gateway.completions[0].identity.subject_id, "subject-3");
    let metrics = session.result().unwrap().metrics();
    match &gateway.completions[0].scores {
        Some(VariantScores::Balance {
            decision_speed_variance,
            risk_escalation_detected,
            ..
        }) => {
            assert_eq!(*decision_speed_variance, metrics.decision_speed_variance);
            assert_eq!(*risk_escalation_detected, metrics.risk_escalation_detected);
        }
        other => panic!("unexpected scores {other:?}"),
    }
    let json = serde_json::to_value(&gateway.completions[0]).unwrap();
    assert!(json["scores"]["decision_speed_variance"].is_number());
    assert!(json["scores"]["risk_escalation_detected"].is_boolean());
    assert_eq!(gateway.telemetry.len(), 1);
    assert_eq!(gateway.recalculations, vec!["session-1".to_string()]);
    assert_eq!(gateway.fulfilled, vec![("inv-9".to_string(), "session-1".to_string())]);
}

#[test]
fn test_offline_gateway_never_changes_the_local_result() {
    let mut settings = Settings::default();
    settings.collector.duration_secs = 3.0;
    let mut gateway = MemoryGateway::failing();
    let mut session = Session::create(
        SessionIdentity::default(),
        config(Concept::FallingObjects, settings),
        Some(&mut gateway),
    );
    let mut pilot = Autopilot::new(Profile::Calm, 2);
    autopilot::drive(&mut session, &mut pilot, 0.0).unwrap();
    let before = session.result().cloned().unwrap();

    let mut outbox = Outbox::new();
    outbox.enqueue(&before);
    let report = outbox.flush(&mut gateway);
    assert_eq!(report.delivered, 0);
    assert!(report.failed > 0);
    assert_eq!(session.result(), Some(&before));
}
