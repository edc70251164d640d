//! Action dispatcher
//!
//! Converts raw host input into typed, timestamped actions. Input capture is
//! decoupled from simulation timing: actions queue up here and are drained
//! exactly once per tick into a `TickInput`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::state::Concept;
use crate::platform::{Key, RawInput};

/// Vertical swipe distance (px) that counts as one touch gesture
pub const SWIPE_THRESHOLD: f32 = 30.0;

/// Closed set of subject actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Small correction toward the target
    Gentle,
    /// Large correction toward the target
    Strong,
    /// Deliberately wait and observe
    Pause,
    MoveLeft,
    MoveRight,
    /// Pointer/touch press on the playfield
    Pointer,
}

impl ActionKind {
    /// Corrective actions feed the overcorrection rate
    pub fn is_correction(&self) -> bool {
        *self == ActionKind::Strong
    }

    /// Human-readable name for HUDs and logs
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Gentle => "Gentle stabilise",
            ActionKind::Strong => "Strong stabilise",
            ActionKind::Pause => "Observing",
            ActionKind::MoveLeft => "Move left",
            ActionKind::MoveRight => "Move right",
            ActionKind::Pointer => "Pointer",
        }
    }
}

/// One logical gesture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub intensity: f64,
    /// Arrival time (ms, monotonically non-decreasing)
    pub timestamp_ms: f64,
}

/// Held horizontal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Steer {
    #[default]
    None,
    Left,
    Right,
}

impl Steer {
    pub fn sign(&self) -> f32 {
        match self {
            Steer::None => 0.0,
            Steer::Left => -1.0,
            Steer::Right => 1.0,
        }
    }
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    /// Gestures that arrived since the previous tick, in arrival order
    pub actions: Vec<Action>,
    /// Direction currently held
    pub steer: Steer,
    /// Latest pointer x, if the pointer moved since the previous tick
    pub pointer_x: Option<f32>,
}

/// Maps raw input to actions for one concept
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    concept: Concept,
    queue: VecDeque<Action>,
    held_left: bool,
    held_right: bool,
    /// Keys held for debouncing
    held: Vec<Key>,
    pointer_x: Option<f32>,
    swipe_origin_y: Option<f32>,
    last_timestamp_ms: f64,
    /// Wall-clock time spent paused, removed from incoming timestamps
    paused_ms: f64,
}

impl ActionDispatcher {
    pub fn new(concept: Concept) -> Self {
        Self {
            concept,
            queue: VecDeque::new(),
            held_left: false,
            held_right: false,
            held: Vec::new(),
            pointer_x: None,
            swipe_origin_y: None,
            last_timestamp_ms: 0.0,
            paused_ms: 0.0,
        }
    }

    /// Feed one raw event; malformed or irrelevant events are ignored
    pub fn handle(&mut self, event: &RawInput) {
        if let Some((x, y)) = event.position() {
            if !x.is_finite() || !y.is_finite() {
                log::trace!("Ignoring non-finite pointer event");
                return;
            }
        }
        let timestamp_ms = self.monotonic(event.timestamp_ms() - self.paused_ms);

        match *event {
            RawInput::KeyDown { key, repeat, .. } => {
                if repeat || self.held.contains(&key) {
                    return;
                }
                self.held.push(key);
                self.key_pressed(key, timestamp_ms);
            }
            RawInput::KeyUp { key, .. } => {
                self.held.retain(|k| *k != key);
                match key {
                    Key::Left => self.held_left = false,
                    Key::Right => self.held_right = false,
                    _ => {}
                }
            }
            RawInput::PointerDown { x, y, .. } => match self.concept {
                Concept::BalanceUnderPressure => self.swipe_origin_y = Some(y),
                Concept::FallingObjects => {
                    self.pointer_x = Some(x);
                    self.push(ActionKind::Pointer, 1.0, timestamp_ms);
                }
            },
            RawInput::PointerMove { x, y, .. } => match self.concept {
                Concept::BalanceUnderPressure => self.swipe(y, timestamp_ms),
                Concept::FallingObjects => self.pointer_x = Some(x),
            },
            RawInput::PointerUp { .. } => self.swipe_origin_y = None,
        }
    }

    /// Drain everything that arrived since the previous tick
    pub fn drain(&mut self) -> TickInput {
        let steer = match (self.held_left, self.held_right) {
            (true, false) => Steer::Left,
            (false, true) => Steer::Right,
            _ => Steer::None,
        };
        TickInput {
            actions: self.queue.drain(..).collect(),
            steer,
            pointer_x: self.pointer_x.take(),
        }
    }

    /// Release everything held (focus loss)
    pub fn release_all(&mut self) {
        self.held.clear();
        self.held_left = false;
        self.held_right = false;
        self.swipe_origin_y = None;
    }

    /// Pause: release held input and drop gestures no tick has consumed
    ///
    /// Returns the number of dropped gestures.
    pub fn suspend(&mut self) -> usize {
        self.release_all();
        self.pointer_x = None;
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Shift later timestamps back by a paused interval
    pub fn credit_pause(&mut self, paused_ms: f64) {
        if paused_ms.is_finite() && paused_ms > 0.0 {
            self.paused_ms += paused_ms;
        }
    }

    fn key_pressed(&mut self, key: Key, timestamp_ms: f64) {
        match (self.concept, key) {
            (Concept::BalanceUnderPressure, Key::Up) => self.push(ActionKind::Gentle, 1.0, timestamp_ms),
            (Concept::BalanceUnderPressure, Key::Down) => self.push(ActionKind::Strong, 2.0, timestamp_ms),
            (Concept::BalanceUnderPressure, Key::Space) => self.push(ActionKind::Pause, 0.0, timestamp_ms),
            (Concept::FallingObjects, Key::Left) => {
                self.held_left = true;
                self.push(ActionKind::MoveLeft, 1.0, timestamp_ms);
            }
            (Concept::FallingObjects, Key::Right) => {
                self.held_right = true;
                self.push(ActionKind::MoveRight, 1.0, timestamp_ms);
            }
            _ => {}
        }
    }

    fn swipe(&mut self, y: f32, timestamp_ms: f64) {
        let Some(origin) = self.swipe_origin_y else {
            return;
        };
        let delta = origin - y;
        if delta.abs() > SWIPE_THRESHOLD {
            if delta > 0.0 {
                self.push(ActionKind::Gentle, 1.0, timestamp_ms);
            } else {
                self.push(ActionKind::Strong, 2.0, timestamp_ms);
            }
            self.swipe_origin_y = Some(y);
        }
    }

    fn push(&mut self, kind: ActionKind, intensity: f64, timestamp_ms: f64) {
        self.queue.push_back(Action {
            kind,
            intensity,
            timestamp_ms,
        });
    }

    /// Clamp timestamps so they never run backwards
    fn monotonic(&mut self, timestamp_ms: f64) -> f64 {
        if timestamp_ms.is_finite() && timestamp_ms > self.last_timestamp_ms {
            self.last_timestamp_ms = timestamp_ms;
        }
        self.last_timestamp_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_down(key: Key, t: f64) -> RawInput {
        RawInput::KeyDown {
            key,
            repeat: false,
            timestamp_ms: t,
        }
    }

    #[test]
    fn test_balance_key_mapping() {
        let mut dispatcher = ActionDispatcher::new(Concept::BalanceUnderPressure);
        dispatcher.handle(&key_down(Key::Up, 10.0));
        dispatcher.handle(&RawInput::KeyUp { key: Key::Up, timestamp_ms: 20.0 });
        dispatcher.handle(&key_down(Key::Down, 30.0));
        dispatcher.handle(&key_down(Key::Space, 40.0));
        dispatcher.handle(&key_down(Key::Left, 50.0));

        let input = dispatcher.drain();
        let kinds: Vec<_> = input.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Gentle, ActionKind::Strong, ActionKind::Pause]);
        assert_eq!(input.actions[1].intensity, 2.0);
        assert!(dispatcher.drain().actions.is_empty());
    }

    #[test]
    fn test_held_key_is_debounced() {
        let mut dispatcher = ActionDispatcher::new(Concept::BalanceUnderPressure);
        dispatcher.handle(&key_down(Key::Up, 0.0));
        dispatcher.handle(&RawInput::KeyDown {
            key: Key::Up,
            repeat: true,
            timestamp_ms: 30.0,
        });
        dispatcher.handle(&key_down(Key::Up, 60.0));
        assert_eq!(dispatcher.drain().actions.len(), 1);
    }

    #[test]
    fn test_steering_repeats_while_held() {
        let mut dispatcher = ActionDispatcher::new(Concept::FallingObjects);
        dispatcher.handle(&key_down(Key::Left, 0.0));

        let first = dispatcher.drain();
        assert_eq!(first.actions.len(), 1);
        assert_eq!(first.steer, Steer::Left);

        // Still held on the next tick, but no new gesture
        let second = dispatcher.drain();
        assert!(second.actions.is_empty());
        assert_eq!(second.steer, Steer::Left);

        dispatcher.handle(&RawInput::KeyUp { key: Key::Left, timestamp_ms: 100.0 });
        assert_eq!(dispatcher.drain().steer, Steer::None);
    }

    #[test]
    fn test_both_directions_cancel() {
        let mut dispatcher = ActionDispatcher::new(Concept::FallingObjects);
        dispatcher.handle(&key_down(Key::Left, 0.0));
        dispatcher.handle(&key_down(Key::Right, 1.0));
        assert_eq!(dispatcher.drain().steer, Steer::None);
    }

    #[test]
    fn test_timestamps_never_run_backwards() {
        let mut dispatcher = ActionDispatcher::new(Concept::BalanceUnderPressure);
        dispatcher.handle(&key_down(Key::Up, 500.0));
        dispatcher.handle(&key_down(Key::Down, 100.0));
        dispatcher.handle(&key_down(Key::Space, f64::NAN));
        let input = dispatcher.drain();
        assert!(input.actions.iter().all(|a| a.timestamp_ms == 500.0));
    }

    #[test]
    fn test_suspend_drops_queued_gestures() {
        let mut dispatcher = ActionDispatcher::new(Concept::FallingObjects);
        dispatcher.handle(&key_down(Key::Left, 0.0));
        dispatcher.handle(&RawInput::PointerMove { x: 50.0, y: 0.0, timestamp_ms: 5.0 });
        assert_eq!(dispatcher.suspend(), 1);

        let input = dispatcher.drain();
        assert!(input.actions.is_empty());
        assert_eq!(input.steer, Steer::None);
        assert_eq!(input.pointer_x, None);
    }

    #[test]
    fn test_paused_interval_is_removed_from_timestamps() {
        let mut dispatcher = ActionDispatcher::new(Concept::BalanceUnderPressure);
        dispatcher.handle(&key_down(Key::Up, 100.0));
        dispatcher.handle(&RawInput::KeyUp { key: Key::Up, timestamp_ms: 110.0 });
        dispatcher.credit_pause(600_000.0);
        dispatcher.credit_pause(f64::NAN);
        dispatcher.credit_pause(-5.0);
        dispatcher.handle(&key_down(Key::Up, 600_400.0));

        let stamps: Vec<_> = dispatcher.drain().actions.iter().map(|a| a.timestamp_ms).collect();
        assert_eq!(stamps, vec![100.0, 400.0]);
    }

    #[test]
    fn test_swipe_gestures() {
        let mut dispatcher = ActionDispatcher::new(Concept::BalanceUnderPressure);
        dispatcher.handle(&RawInput::PointerDown { x: 0.0, y: 300.0, timestamp_ms: 0.0 });
        dispatcher.handle(&RawInput::PointerMove { x: 0.0, y: 290.0, timestamp_ms: 5.0 });
        dispatcher.handle(&RawInput::PointerMove { x: 0.0, y: 260.0, timestamp_ms: 10.0 });
        dispatcher.handle(&RawInput::PointerMove { x: 0.0, y: 300.0, timestamp_ms: 20.0 });
        dispatcher.handle(&RawInput::PointerUp { timestamp_ms: 30.0 });
        dispatcher.handle(&RawInput::PointerMove { x: 0.0, y: 100.0, timestamp_ms: 40.0 });

        let kinds: Vec<_> = dispatcher.drain().actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Gentle, ActionKind::Strong]);
    }

    #[test]
    fn test_pointer_tracking_and_malformed_events() {
        let mut dispatcher = ActionDispatcher::new(Concept::FallingObjects);
        dispatcher.handle(&RawInput::PointerMove { x: 120.0, y: 0.0, timestamp_ms: 0.0 });
        dispatcher.handle(&RawInput::PointerMove { x: f32::NAN, y: 0.0, timestamp_ms: 1.0 });
        let input = dispatcher.drain();
        assert!(input.actions.is_empty());
        assert_eq!(input.pointer_x, Some(120.0));
        assert_eq!(dispatcher.drain().pointer_x, None);

        dispatcher.handle(&RawInput::PointerDown { x: 200.0, y: 0.0, timestamp_ms: 2.0 });
        let input = dispatcher.drain();
        assert_eq!(input.actions[0].kind, ActionKind::Pointer);
        assert_eq!(input.pointer_x, Some(200.0));
    }
}
