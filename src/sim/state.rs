//! Simulation state and core types
//!
//! `SimulationState` is owned by exactly one session and is never persisted;
//! telemetry stores `StateSnapshot` values instead.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::settings::{BalanceTuning, CollectorTuning, Settings};

/// Which simulation a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    /// Continuous dynamical system kept near a moving target
    BalanceUnderPressure,
    /// Discrete collection game with falling rewards and hazards
    FallingObjects,
}

impl Concept {
    pub fn slug(&self) -> &'static str {
        match self {
            Concept::BalanceUnderPressure => "balance-under-pressure",
            Concept::FallingObjects => "falling-objects",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "balance-under-pressure" | "balance" => Some(Concept::BalanceUnderPressure),
            "falling-objects" | "collector" | "falling" => Some(Concept::FallingObjects),
            _ => None,
        }
    }

    /// Configured time budget in simulated seconds
    pub fn duration_secs(&self, settings: &Settings) -> f64 {
        match self {
            Concept::BalanceUnderPressure => settings.balance.duration_secs,
            Concept::FallingObjects => settings.collector.duration_secs,
        }
    }
}

/// Scalar state of the continuous variant
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSystem {
    /// Current balance, [0, 100]
    pub balance: f64,
    /// Rate of change of balance (damped, unbounded)
    pub velocity: f64,
    /// Ambient pressure, [0, 100]
    pub pressure: f64,
    /// Smoothed closeness to target, [0, 100]
    pub stability: f64,
    /// Stability before the most recent tick
    pub prev_stability: f64,
    /// Balance the subject is asked to hold
    pub target: f64,
}

impl BalanceSystem {
    pub fn new(tuning: &BalanceTuning) -> Self {
        let target = (tuning.target_min + tuning.target_max) / 2.0;
        Self {
            balance: tuning.initial_balance.clamp(0.0, 100.0),
            velocity: 0.0,
            pressure: tuning.initial_pressure.clamp(0.0, 100.0),
            stability: 100.0,
            prev_stability: 100.0,
            target,
        }
    }

    /// True if every field is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.balance,
            self.velocity,
            self.pressure,
            self.stability,
            self.prev_stability,
            self.target,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Clamp bounded fields to their domains
    pub fn clamp(&mut self) {
        self.balance = self.balance.clamp(0.0, 100.0);
        self.pressure = self.pressure.clamp(0.0, 100.0);
        self.stability = self.stability.clamp(0.0, 100.0);
        self.target = self.target.clamp(0.0, 100.0);
    }

    /// Replace any non-finite field with the last valid value
    pub fn repair(&mut self, last_valid: &BalanceSystem) {
        fn pick(value: f64, fallback: f64) -> f64 {
            if value.is_finite() { value } else { fallback }
        }
        self.balance = pick(self.balance, last_valid.balance);
        self.velocity = pick(self.velocity, last_valid.velocity);
        self.pressure = pick(self.pressure, last_valid.pressure);
        self.stability = pick(self.stability, last_valid.stability);
        self.prev_stability = pick(self.prev_stability, last_valid.prev_stability);
        self.target = pick(self.target, last_valid.target);
    }

    /// |balance - target|
    pub fn deviation(&self) -> f64 {
        (self.balance - self.target).abs()
    }
}

/// Category of a falling entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Reward,
    Bonus,
    Hazard,
}

impl EntityCategory {
    /// Roll a category from a uniform sample in [0, 1)
    pub fn from_roll(roll: f32) -> Self {
        if roll > 0.85 {
            EntityCategory::Bonus
        } else if roll > 0.65 {
            EntityCategory::Hazard
        } else {
            EntityCategory::Reward
        }
    }

    /// Score (or damage, for hazards) carried by the entity
    pub fn value(&self) -> f64 {
        match self {
            EntityCategory::Reward => 10.0,
            EntityCategory::Bonus => 25.0,
            EntityCategory::Hazard => -15.0,
        }
    }

    /// Fall distance per tick
    pub fn fall_speed(&self) -> f32 {
        match self {
            EntityCategory::Reward => 2.8,
            EntityCategory::Bonus => 2.5,
            EntityCategory::Hazard => 3.5,
        }
    }

    /// Edge length of the square bounding box
    pub fn size(&self) -> f32 {
        match self {
            EntityCategory::Reward => 35.0,
            EntityCategory::Bonus => 40.0,
            EntityCategory::Hazard => 45.0,
        }
    }

    pub fn is_hazard(&self) -> bool {
        *self == EntityCategory::Hazard
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_top_left(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Strict overlap; touching edges do not count
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }
}

/// A falling entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub category: EntityCategory,
    /// Top-left corner
    pub pos: Vec2,
    /// Displacement per tick
    pub vel: Vec2,
    pub size: Vec2,
    pub value: f64,
}

impl Entity {
    pub fn new(id: u32, category: EntityCategory, x: f32) -> Self {
        let size = Vec2::splat(category.size());
        Self {
            id,
            category,
            pos: Vec2::new(x, -size.y),
            vel: Vec2::new(0.0, category.fall_speed()),
            size,
            value: category.value(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_top_left(self.pos, self.size)
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite() && self.size.is_finite() && self.value.is_finite()
    }
}

/// The controlled actor of the discrete variant
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    /// Horizontal centre
    pub x: f32,
    /// Top edge
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Actor {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_top_left(
            Vec2::new(self.x - self.width / 2.0, self.y),
            Vec2::new(self.width, self.height),
        )
    }
}

/// State of the discrete variant
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorField {
    pub width: f32,
    pub height: f32,
    pub actor: Actor,
    /// Live entities (sorted by id for determinism)
    pub entities: Vec<Entity>,
    /// Remaining health, [0, initial]
    pub health: f64,
    pub score: f64,
    /// Simulated time of the most recent spawn
    pub last_spawn_ms: Option<f64>,
}

impl CollectorField {
    pub fn new(tuning: &CollectorTuning) -> Self {
        Self {
            width: tuning.field_width,
            height: tuning.field_height,
            actor: Actor {
                x: tuning.field_width / 2.0,
                y: tuning.field_height - tuning.actor_height - tuning.actor_floor_gap,
                width: tuning.actor_width,
                height: tuning.actor_height,
            },
            entities: Vec::new(),
            health: tuning.initial_health.max(0.0),
            score: 0.0,
            last_spawn_ms: None,
        }
    }

    /// Clamp an actor centre so the actor stays inside the field
    pub fn clamp_actor_x(&self, x: f32) -> f32 {
        let half = self.actor.width / 2.0;
        x.clamp(half, (self.width - half).max(half))
    }

    /// Number of live hazards
    pub fn hazard_count(&self) -> usize {
        self.entities.iter().filter(|e| e.category.is_hazard()).count()
    }

    /// True if the actor, health, score and every entity are finite
    pub fn is_finite(&self) -> bool {
        self.actor.x.is_finite()
            && self.health.is_finite()
            && self.score.is_finite()
            && self.last_spawn_ms.is_none_or(f64::is_finite)
            && self.entities.iter().all(Entity::is_finite)
    }

    /// Restore non-finite scalars from the last valid field and drop broken entities
    pub fn repair(&mut self, last_valid: &CollectorField) {
        if !self.actor.x.is_finite() {
            self.actor.x = last_valid.actor.x;
        }
        if !self.health.is_finite() {
            self.health = last_valid.health;
        }
        if !self.score.is_finite() {
            self.score = last_valid.score;
        }
        if !self.last_spawn_ms.is_none_or(f64::is_finite) {
            self.last_spawn_ms = last_valid.last_spawn_ms;
        }
        self.entities.retain(Entity::is_finite);
    }
}

/// Variant-specific part of the simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Balance(BalanceSystem),
    Collector(CollectorField),
}

impl Variant {
    pub fn is_finite(&self) -> bool {
        match self {
            Variant::Balance(sys) => sys.is_finite(),
            Variant::Collector(field) => field.is_finite(),
        }
    }

    /// Repair non-finite fields from a known-good copy of the same variant
    pub fn repair(&mut self, last_valid: &Variant) {
        match (self, last_valid) {
            (Variant::Balance(sys), Variant::Balance(good)) => sys.repair(good),
            (Variant::Collector(field), Variant::Collector(good)) => field.repair(good),
            (this, good) => *this = good.clone(),
        }
    }
}

/// Snapshot of the relevant state, embedded in every telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum StateSnapshot {
    Balance {
        balance: f64,
        velocity: f64,
        pressure: f64,
        stability: f64,
        target: f64,
    },
    Collector {
        actor_x: f32,
        health: f64,
        score: f64,
        live_entities: usize,
        live_hazards: usize,
    },
}

impl BalanceSystem {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::Balance {
            balance: self.balance,
            velocity: self.velocity,
            pressure: self.pressure,
            stability: self.stability,
            target: self.target,
        }
    }
}

impl CollectorField {
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::Collector {
            actor_x: self.actor.x,
            health: self.health,
            score: self.score,
            live_entities: self.entities.len(),
            live_hazards: self.hazard_count(),
        }
    }
}

/// Complete simulation state (deterministic for a given seed and input)
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub concept: Concept,
    /// Run seed for reproducibility
    pub seed: u64,
    /// Drift/spawn RNG
    pub rng: Pcg32,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Simulated seconds elapsed
    pub elapsed_secs: f64,
    pub variant: Variant,
    /// Timestamp of the previous dispatched action
    pub last_action_ms: Option<f64>,
    /// Next entity ID
    pub(super) next_id: u32,
    /// Variant as of the most recent tick that ended finite
    pub(super) last_valid: Variant,
}

impl SimulationState {
    /// Create a fresh state for a concept
    pub fn new(concept: Concept, seed: u64, settings: &Settings) -> Self {
        let variant = match concept {
            Concept::BalanceUnderPressure => Variant::Balance(BalanceSystem::new(&settings.balance)),
            Concept::FallingObjects => Variant::Collector(CollectorField::new(&settings.collector)),
        };
        Self {
            concept,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            time_ticks: 0,
            elapsed_secs: 0.0,
            last_valid: variant.clone(),
            variant,
            last_action_ms: None,
            next_id: 1,
        }
    }

    /// Simulated milliseconds elapsed
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_secs * 1000.0
    }

    pub fn snapshot(&self) -> StateSnapshot {
        match &self.variant {
            Variant::Balance(sys) => sys.snapshot(),
            Variant::Collector(field) => field.snapshot(),
        }
    }

    /// Score reported as the session's raw score
    pub fn raw_score(&self) -> f64 {
        match &self.variant {
            Variant::Balance(sys) => sys.stability,
            Variant::Collector(field) => field.score,
        }
    }

    pub fn balance(&self) -> Option<&BalanceSystem> {
        match &self.variant {
            Variant::Balance(sys) => Some(sys),
            Variant::Collector(_) => None,
        }
    }

    pub fn collector(&self) -> Option<&CollectorField> {
        match &self.variant {
            Variant::Collector(field) => Some(field),
            Variant::Balance(_) => None,
        }
    }
}
