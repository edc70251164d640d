//! Wellbeing Sim - behavioural-assessment simulations
//!
//! Core modules:
//! - `sim`: Deterministic simulation (state, actions, collisions, tick)
//! - `telemetry`: Append-only, strictly ordered session event log
//! - `session`: Session lifecycle and the per-frame driver
//! - `metrics`: Behavioural metric aggregation and per-concept scoring
//! - `persistence`: Outbox and gateways to external collaborators
//! - `renderer`: Read-only projection of simulation state onto a surface
//! - `platform`: Raw input events and the frame clock
//! - `autopilot`: Seeded scripted subject for demo and headless runs
//! - `settings`: Data-driven tuning

pub mod autopilot;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod session;
pub mod settings;
pub mod sim;
pub mod telemetry;

pub use error::{EngineError, GatewayError};
pub use metrics::{DerivedMetrics, RiskBand};
pub use session::{Invitation, Session, SessionPhase, SessionRecord, SessionResult};
pub use settings::Settings;
pub use sim::Concept;

/// Engine timing constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one tick per display frame)
    pub const SIM_DT: f64 = 1.0 / 60.0;
    /// Largest frame delta credited to the simulation (seconds)
    pub const MAX_FRAME_DT: f64 = 0.1;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
}

/// Clamp to [0, 100], mapping NaN to 0
#[inline]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
