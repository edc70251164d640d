//! Fixed timestep simulation tick
//!
//! Advances one session's state deterministically. Everything the telemetry
//! layer needs to know comes back in the `TickOutcome`; nothing here records,
//! renders, or persists.

use glam::Vec2;
use rand::Rng;

use super::action::{Action, ActionKind, TickInput};
use super::collision::{Contact, discard_fallen, resolve_contacts};
use super::state::{
    BalanceSystem, CollectorField, Entity, EntityCategory, SimulationState, StateSnapshot, Variant,
};
use crate::settings::{BalanceTuning, CollectorTuning, Settings};

/// Why the simulation stopped on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Elapsed simulated time reached the configured duration
    TimeBudget,
    /// Health reached zero
    Depleted,
}

/// What happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimEventKind {
    /// A gentle/strong/movement/pointer action was applied
    ActionApplied {
        action: Action,
        /// Milliseconds since the previous action (None for the first)
        since_last_ms: Option<f64>,
    },
    /// The subject chose to wait
    PauseObserved { since_last_ms: Option<f64> },
    /// A large correction coincided with falling stability
    Overcorrection { magnitude: f64, stability_loss: f64 },
    TargetShifted { old: f64, new: f64 },
    Collected {
        category: EntityCategory,
        value: f64,
        score: f64,
        nearby_hazards: usize,
        reaction_ms: f64,
    },
    HazardHit {
        health: f64,
        position: Vec2,
        reaction_ms: f64,
    },
}

/// A tick event with the state it was observed in
#[derive(Debug, Clone, PartialEq)]
pub struct SimEvent {
    pub kind: SimEventKind,
    pub snapshot: StateSnapshot,
    /// Simulated seconds at emission
    pub game_time: f64,
}

/// Result of advancing one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub events: Vec<SimEvent>,
    /// Stability after the tick (balance variant)
    pub stability_sample: Option<f64>,
    /// Absolute actor displacement caused by input (collector variant)
    pub movement_sample: Option<f32>,
    pub termination: Option<Termination>,
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimulationState, input: &TickInput, dt: f64, settings: &Settings) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    state.time_ticks += 1;
    state.elapsed_secs = state.time_ticks as f64 * dt;
    let game_time = state.elapsed_secs;
    let now_ms = state.elapsed_ms();

    if !state.variant.is_finite() {
        log::warn!("Entered tick {} with non-finite state, restoring", state.time_ticks);
        state.variant.repair(&state.last_valid);
    }

    // Decision timing is shared by both variants
    let mut timed: Vec<(Action, Option<f64>)> = Vec::with_capacity(input.actions.len());
    for action in &input.actions {
        let since_last_ms = state
            .last_action_ms
            .map(|last| (action.timestamp_ms - last).max(0.0));
        state.last_action_ms = Some(action.timestamp_ms);
        timed.push((*action, since_last_ms));
    }

    let tick_no = state.time_ticks;
    let SimulationState {
        rng,
        variant,
        next_id,
        last_valid,
        ..
    } = state;
    match &mut *variant {
        Variant::Balance(sys) => {
            let tuning = &settings.balance;

            for (action, since_last_ms) in timed {
                let mut emit = |kind: SimEventKind, sys: &BalanceSystem| {
                    outcome.events.push(SimEvent {
                        kind,
                        snapshot: sys.snapshot(),
                        game_time,
                    });
                };
                match action.kind {
                    ActionKind::Pause => emit(SimEventKind::PauseObserved { since_last_ms }, &*sys),
                    ActionKind::Gentle | ActionKind::Strong => {
                        let overcorrection = apply_correction(sys, action.kind, tuning);
                        emit(
                            SimEventKind::ActionApplied {
                                action,
                                since_last_ms,
                            },
                            &*sys,
                        );
                        if let Some(kind) = overcorrection {
                            emit(kind, &*sys);
                        }
                    }
                    // Movement gestures have no effect on a balance system
                    _ => {}
                }
            }

            let shift = step_balance(sys, rng, tuning, dt);
            if !sys.is_finite() {
                log::warn!("Non-finite balance state at tick {}, restoring", tick_no);
                if let Variant::Balance(good) = &*last_valid {
                    sys.repair(good);
                }
            }
            sys.clamp();

            if let Some((old, new)) = shift {
                log::debug!("Target shifted {:.1} -> {:.1}", old, new);
                outcome.events.push(SimEvent {
                    kind: SimEventKind::TargetShifted { old, new },
                    snapshot: sys.snapshot(),
                    game_time,
                });
            }
            outcome.stability_sample = Some(sys.stability);

            if game_time >= tuning.duration_secs {
                outcome.termination = Some(Termination::TimeBudget);
            }
        }
        Variant::Collector(field) => {
            let tuning = &settings.collector;

            let mut taps = 0.0f32;
            for (action, since_last_ms) in timed {
                match action.kind {
                    ActionKind::MoveLeft => taps -= 1.0,
                    ActionKind::MoveRight => taps += 1.0,
                    _ => {}
                }
                outcome.events.push(SimEvent {
                    kind: SimEventKind::ActionApplied {
                        action,
                        since_last_ms,
                    },
                    snapshot: field.snapshot(),
                    game_time,
                });
            }

            outcome.movement_sample = move_actor(field, input, taps, tuning);
            spawn_if_due(field, rng, next_id, now_ms, tuning);

            for entity in &mut field.entities {
                entity.pos += entity.vel;
            }

            let reaction_ms = field.last_spawn_ms.map_or(0.0, |spawn| now_ms - spawn);
            for contact in resolve_contacts(field, tuning) {
                let kind = match contact {
                    Contact::Collected {
                        category,
                        value,
                        score,
                        nearby_hazards,
                    } => SimEventKind::Collected {
                        category,
                        value,
                        score,
                        nearby_hazards,
                        reaction_ms,
                    },
                    Contact::HazardHit { health, position } => SimEventKind::HazardHit {
                        health,
                        position,
                        reaction_ms,
                    },
                };
                outcome.events.push(SimEvent {
                    kind,
                    snapshot: field.snapshot(),
                    game_time,
                });
            }
            discard_fallen(field);
            if !field.is_finite() {
                log::warn!("Non-finite collector state at tick {}, restoring", tick_no);
                if let Variant::Collector(good) = &*last_valid {
                    field.repair(good);
                }
            }

            if field.health <= 0.0 {
                outcome.termination = Some(Termination::Depleted);
            } else if game_time >= tuning.duration_secs {
                outcome.termination = Some(Termination::TimeBudget);
            }
        }
    }

    if variant.is_finite() {
        last_valid.clone_from(variant);
    }
    outcome
}

/// Apply a gentle or strong correction; returns an overcorrection if detected
///
/// Stability is compared against its value before the previous tick.
fn apply_correction(sys: &mut BalanceSystem, kind: ActionKind, tuning: &BalanceTuning) -> Option<SimEventKind> {
    let factor = match kind {
        ActionKind::Strong => tuning.strong_factor,
        _ => tuning.gentle_factor,
    };
    let correction = (sys.target - sys.balance) * factor;
    sys.velocity += correction;

    if kind.is_correction()
        && correction.abs() > tuning.overcorrection_threshold
        && sys.stability < sys.prev_stability
    {
        Some(SimEventKind::Overcorrection {
            magnitude: correction.abs(),
            stability_loss: sys.prev_stability - sys.stability,
        })
    } else {
        None
    }
}

/// Drift, integrate and smooth one step; returns a target shift if one happened
fn step_balance<R: Rng>(
    sys: &mut BalanceSystem,
    rng: &mut R,
    tuning: &BalanceTuning,
    dt: f64,
) -> Option<(f64, f64)> {
    sys.pressure = (sys.pressure + tuning.pressure_rate * dt).clamp(0.0, 100.0);

    let drift = rng.random::<f64>() - 0.5;
    sys.velocity += drift * sys.pressure / 10.0;
    sys.balance += sys.velocity * dt;
    sys.velocity *= tuning.damping;

    if sys.balance < 0.0 || sys.balance > 100.0 {
        sys.balance = sys.balance.clamp(0.0, 100.0);
        sys.velocity *= tuning.restitution;
    }

    sys.prev_stability = sys.stability;
    let target_stability = (100.0 - 2.0 * sys.deviation()).max(0.0);
    sys.stability += (target_stability - sys.stability) * tuning.stability_smoothing;

    if rng.random::<f64>() < tuning.target_shift_chance {
        let old = sys.target;
        sys.target = tuning.target_min + rng.random::<f64>() * (tuning.target_max - tuning.target_min);
        Some((old, sys.target))
    } else {
        None
    }
}

/// Move the actor from held direction, taps or pointer; returns the displacement
fn move_actor(field: &mut CollectorField, input: &TickInput, taps: f32, tuning: &CollectorTuning) -> Option<f32> {
    let old = field.actor.x;
    let desired = if let Some(x) = input.pointer_x {
        x
    } else if input.steer.sign() != 0.0 {
        old + input.steer.sign() * tuning.actor_step
    } else if taps != 0.0 {
        // Key pressed and released between two ticks
        old + taps.signum() * tuning.actor_step
    } else {
        return None;
    };

    field.actor.x = field.clamp_actor_x(desired);
    Some((field.actor.x - old).abs())
}

/// Spawn one entity if the spawn interval has elapsed
fn spawn_if_due<R: Rng>(
    field: &mut CollectorField,
    rng: &mut R,
    next_id: &mut u32,
    now_ms: f64,
    tuning: &CollectorTuning,
) {
    if field
        .last_spawn_ms
        .is_some_and(|last| now_ms - last < tuning.spawn_interval_ms)
    {
        return;
    }
    field.last_spawn_ms = Some(now_ms);

    let category = EntityCategory::from_roll(rng.random::<f32>());
    let span = (field.width - category.size() - 40.0).max(0.0);
    let x = 20.0 + rng.random::<f32>() * span;

    let id = *next_id;
    *next_id += 1;
    log::trace!("Spawned {:?} #{} at x={:.1}", category, id, x);
    field.entities.push(Entity::new(id, category, x));
}
