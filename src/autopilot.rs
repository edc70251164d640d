//! Scripted subject for demo mode and headless runs
//!
//! The autopilot looks at the current state and emits the raw input a
//! subject with a given temperament would produce. It is seeded, so a fixed
//! (seed, profile) pair always plays the same session.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::platform::{Key, RawInput};
use crate::session::{Session, SessionPhase};
use crate::sim::{CollectorField, EntityCategory, SimulationState, Variant};

/// Host frame period used by headless drives (ms)
pub const FRAME_MS: f64 = 1000.0 / 60.0;

/// Temperament the autopilot plays with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Waits, observes, corrects gently, avoids hazards
    #[default]
    Calm,
    /// Acts constantly, corrects hard, chases bonuses regardless of hazards
    Impulsive,
}

impl Profile {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "calm" => Some(Profile::Calm),
            "impulsive" => Some(Profile::Impulsive),
            _ => None,
        }
    }

    /// Delay range between balance decisions (ms)
    fn decision_gap_ms(&self) -> (f64, f64) {
        match self {
            Profile::Calm => (4000.0, 7000.0),
            Profile::Impulsive => (150.0, 450.0),
        }
    }
}

/// Seeded input generator
#[derive(Debug, Clone)]
pub struct Autopilot {
    profile: Profile,
    rng: Pcg32,
    next_decision_ms: f64,
    held: Option<Key>,
}

impl Autopilot {
    pub fn new(profile: Profile, seed: u64) -> Self {
        Self {
            profile,
            rng: Pcg32::seed_from_u64(seed),
            next_decision_ms: 0.0,
            held: None,
        }
    }

    /// Input to deliver before the frame at `now_ms`
    pub fn inputs(&mut self, state: &SimulationState, now_ms: f64) -> Vec<RawInput> {
        match &state.variant {
            Variant::Balance(sys) => {
                if now_ms < self.next_decision_ms {
                    return Vec::new();
                }
                let (lo, hi) = self.profile.decision_gap_ms();
                self.next_decision_ms = now_ms + self.rng.random_range(lo..hi);

                let deviation = sys.deviation();
                let key = match self.profile {
                    Profile::Calm if deviation > 30.0 => Key::Down,
                    Profile::Calm if deviation > 6.0 => Key::Up,
                    Profile::Calm => Key::Space,
                    Profile::Impulsive if self.rng.random::<f32>() < 0.7 => Key::Down,
                    Profile::Impulsive => Key::Up,
                };
                log::trace!("Autopilot presses {:?} at deviation {:.1}", key, deviation);
                tap(key, now_ms)
            }
            Variant::Collector(field) => match self.profile {
                Profile::Calm => self.steer_calm(field, now_ms),
                Profile::Impulsive => self.chase_impulsive(field, now_ms),
            },
        }
    }

    /// Hold a direction key toward the safest reachable reward
    fn steer_calm(&mut self, field: &CollectorField, now_ms: f64) -> Vec<RawInput> {
        let actor_x = field.actor.x;
        let danger = field.entities.iter().find(|e| {
            e.category.is_hazard()
                && e.pos.y > field.actor.y - 160.0
                && (e.pos.x + e.size.x / 2.0 - actor_x).abs() < field.actor.width
        });

        let goal = match danger {
            // Step away from the hazard's side
            Some(hazard) if hazard.pos.x + hazard.size.x / 2.0 >= actor_x => Some(actor_x - field.actor.width),
            Some(_) => Some(actor_x + field.actor.width),
            None => field
                .entities
                .iter()
                .filter(|e| !e.category.is_hazard() && e.pos.y < field.actor.y)
                .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
                .map(|e| e.pos.x + e.size.x / 2.0),
        };

        let want = match goal {
            Some(x) if x < actor_x - 6.0 => Some(Key::Left),
            Some(x) if x > actor_x + 6.0 => Some(Key::Right),
            _ => None,
        };
        self.hold(want, now_ms)
    }

    /// Jump the pointer at bonuses and rewards, jittering constantly
    fn chase_impulsive(&mut self, field: &CollectorField, now_ms: f64) -> Vec<RawInput> {
        if now_ms < self.next_decision_ms {
            return Vec::new();
        }
        self.next_decision_ms = now_ms + self.rng.random_range(80.0..220.0);

        let target = field
            .entities
            .iter()
            .filter(|e| !e.category.is_hazard())
            .max_by_key(|e| (e.category == EntityCategory::Bonus, e.pos.y as i32))
            .map(|e| e.pos.x + e.size.x / 2.0)
            .unwrap_or(field.width / 2.0);
        let jitter = self.rng.random_range(-60.0..60.0_f32);
        let x = target + jitter;
        let y = field.actor.y;

        if self.rng.random::<f32>() < 0.5 {
            vec![
                RawInput::PointerDown { x, y, timestamp_ms: now_ms },
                RawInput::PointerUp { timestamp_ms: now_ms },
            ]
        } else {
            vec![RawInput::PointerMove { x, y, timestamp_ms: now_ms }]
        }
    }

    fn hold(&mut self, want: Option<Key>, now_ms: f64) -> Vec<RawInput> {
        if want == self.held {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(2);
        if let Some(key) = self.held.take() {
            out.push(RawInput::KeyUp { key, timestamp_ms: now_ms });
        }
        if let Some(key) = want {
            out.push(RawInput::KeyDown {
                key,
                repeat: false,
                timestamp_ms: now_ms,
            });
            self.held = Some(key);
        }
        out
    }
}

fn tap(key: Key, now_ms: f64) -> Vec<RawInput> {
    vec![
        RawInput::KeyDown {
            key,
            repeat: false,
            timestamp_ms: now_ms,
        },
        RawInput::KeyUp { key, timestamp_ms: now_ms },
    ]
}

/// Run a started session to a terminal phase at a steady frame rate
///
/// Frames are stamped from `start_ms` in `FRAME_MS` steps so simulated time
/// and input timestamps agree. Returns the timestamp of the final frame.
pub fn drive(session: &mut Session, pilot: &mut Autopilot, start_ms: f64) -> Result<f64, EngineError> {
    if session.phase() == SessionPhase::Created {
        session.start(start_ms)?;
    }

    // Generous bound: a full run needs expected_secs * 60 frames
    let max_frames = (session.expected_secs() * 60.0 * 2.0) as u64 + 120;
    let mut now_ms = start_ms;
    for _ in 0..max_frames {
        if session.phase().is_terminal() {
            return Ok(now_ms);
        }
        for event in pilot.inputs(session.state(), now_ms) {
            session.handle_input(&event);
        }
        session.frame(now_ms)?;
        now_ms += FRAME_MS;
    }

    log::warn!("Autopilot frame budget exhausted, abandoning session");
    session.abandon(now_ms)?;
    Ok(now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::{Concept, Entity};

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::from_name("calm"), Some(Profile::Calm));
        assert_eq!(Profile::from_name("impulsive"), Some(Profile::Impulsive));
        assert_eq!(Profile::from_name("reckless"), None);
    }

    #[test]
    fn test_balance_decisions_are_spaced() {
        let state = SimulationState::new(Concept::BalanceUnderPressure, 3, &Settings::default());
        let mut pilot = Autopilot::new(Profile::Calm, 9);
        assert_eq!(pilot.inputs(&state, 0.0).len(), 2);
        // Calm gap is at least 4 s
        assert!(pilot.inputs(&state, 3000.0).is_empty());
        assert_eq!(pilot.inputs(&state, 7500.0).len(), 2);
    }

    #[test]
    fn test_calm_observes_when_on_target() {
        let state = SimulationState::new(Concept::BalanceUnderPressure, 3, &Settings::default());
        let mut pilot = Autopilot::new(Profile::Calm, 9);
        let inputs = pilot.inputs(&state, 0.0);
        assert!(matches!(inputs[0], RawInput::KeyDown { key: Key::Space, .. }));
    }

    #[test]
    fn test_calm_steers_away_from_hazard() {
        let mut state = SimulationState::new(Concept::FallingObjects, 3, &Settings::default());
        if let Variant::Collector(field) = &mut state.variant {
            let mut hazard = Entity::new(1, EntityCategory::Hazard, field.actor.x);
            hazard.pos.y = field.actor.y - 60.0;
            field.entities.push(hazard);
        }
        let mut pilot = Autopilot::new(Profile::Calm, 1);
        let inputs = pilot.inputs(&state, 0.0);
        assert!(matches!(inputs[..], [RawInput::KeyDown { key: Key::Left, .. }]));
        // Already held: nothing new
        assert!(pilot.inputs(&state, 16.0).is_empty());
    }

    #[test]
    fn test_same_seed_same_inputs() {
        let state = SimulationState::new(Concept::FallingObjects, 3, &Settings::default());
        let mut a = Autopilot::new(Profile::Impulsive, 42);
        let mut b = Autopilot::new(Profile::Impulsive, 42);
        for frame in 0..100 {
            let now = frame as f64 * FRAME_MS;
            assert_eq!(a.inputs(&state, now), b.inputs(&state, now));
        }
    }
}
