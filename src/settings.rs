//! Simulation tuning and preferences
//!
//! Every constant the simulations and the aggregator depend on lives here so a
//! concept can be re-tuned from JSON without touching code. Persisted
//! separately from session data (LocalStorage on web, a file on native).

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Continuous "balance under pressure" tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceTuning {
    /// Session length in simulated seconds
    pub duration_secs: f64,
    /// Starting balance
    pub initial_balance: f64,
    /// Starting pressure
    pub initial_pressure: f64,
    /// Pressure added per simulated second
    pub pressure_rate: f64,
    /// Velocity retained each tick (friction)
    pub damping: f64,
    /// Velocity multiplier when balance hits a boundary
    pub restitution: f64,
    /// Exponential smoothing factor for stability
    pub stability_smoothing: f64,
    /// Per-tick probability that the target moves
    pub target_shift_chance: f64,
    /// Lower bound of a shifted target
    pub target_min: f64,
    /// Upper bound of a shifted target
    pub target_max: f64,
    /// Correction factor for a gentle stabilise
    pub gentle_factor: f64,
    /// Correction factor for a strong stabilise
    pub strong_factor: f64,
    /// Correction magnitude above which a worsening correction is an overcorrection
    pub overcorrection_threshold: f64,
}

impl Default for BalanceTuning {
    fn default() -> Self {
        Self {
            duration_secs: 150.0,
            initial_balance: 50.0,
            initial_pressure: 10.0,
            pressure_rate: 0.5,
            damping: 0.92,
            restitution: -0.5,
            stability_smoothing: 0.05,
            target_shift_chance: 0.005,
            target_min: 30.0,
            target_max: 70.0,
            gentle_factor: 0.15,
            strong_factor: 0.4,
            overcorrection_threshold: 20.0,
        }
    }
}

/// Discrete "falling objects" tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorTuning {
    /// Session length in simulated seconds
    pub duration_secs: f64,
    /// Playfield width
    pub field_width: f32,
    /// Playfield height
    pub field_height: f32,
    /// Actor width
    pub actor_width: f32,
    /// Actor height
    pub actor_height: f32,
    /// Gap between the actor and the bottom edge
    pub actor_floor_gap: f32,
    /// Actor displacement per tick while a direction is held
    pub actor_step: f32,
    /// Milliseconds of simulated time between spawns
    pub spawn_interval_ms: f64,
    /// Starting health
    pub initial_health: f64,
    /// Health lost per hazard collision
    pub hazard_damage: f64,
    /// Axis distance within which a hazard makes a collection risky
    pub proximity_threshold: f32,
}

impl Default for CollectorTuning {
    fn default() -> Self {
        Self {
            duration_secs: 120.0,
            field_width: 800.0,
            field_height: 600.0,
            actor_width: 60.0,
            actor_height: 60.0,
            actor_floor_gap: 20.0,
            actor_step: 8.0,
            spawn_interval_ms: 600.0,
            initial_health: 100.0,
            hazard_damage: 15.0,
            proximity_threshold: 80.0,
        }
    }
}

/// Aggregator thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTuning {
    /// Actions closer together than this count as rapid
    pub rapid_action_ms: f64,
    /// Trailing stability samples averaged for the composite
    pub stability_window: usize,
    /// Upward risk steps needed to flag escalation
    pub escalation_steps: usize,
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            rapid_action_ms: 1000.0,
            stability_window: 300,
            escalation_steps: 3,
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub balance: BalanceTuning,
    pub collector: CollectorTuning,
    pub scoring: ScoringTuning,
}

impl Settings {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "wellbeing_sim_settings";

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file, falling back to defaults
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path)
            .map_err(EngineError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Using default settings ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Native hosts read settings through `load_from`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}
