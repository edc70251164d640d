//! Deterministic simulation module
//!
//! All simulation logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, telemetry or platform dependencies

pub mod action;
pub mod collision;
pub mod state;
pub mod tick;

pub use action::{Action, ActionDispatcher, ActionKind, Steer, TickInput};
pub use collision::{Contact, discard_fallen, nearby_hazards, resolve_contacts};
pub use state::{
    Aabb, Actor, BalanceSystem, CollectorField, Concept, Entity, EntityCategory, SimulationState,
    StateSnapshot, Variant,
};
pub use tick::{SimEvent, SimEventKind, TickOutcome, Termination, tick};
