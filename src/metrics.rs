//! Behavioural metric aggregation
//!
//! Runs exactly once over a sealed `ClosedLog` and derives the per-session
//! scores. The composite risk index is concept specific and supplied by a
//! `ScoringStrategy`.

use serde::{Deserialize, Serialize};

use crate::clamp_percent;
use crate::settings::Settings;
use crate::sim::Concept;
use crate::telemetry::{ClosedLog, EventDetail, EventType, RiskLevel};

/// Starting value of the stability series (a fresh system is fully stable)
const INITIAL_STABILITY: f64 = 100.0;
/// Reaction times at or below this are maximally urgent
const URGENT_REACTION_MS: f64 = 200.0;
/// Reaction times at or above this carry no urgency
const RELAXED_REACTION_MS: f64 = 1000.0;
/// Collection after a hazard hit faster than this is a reactive recovery
const REACTIVE_RECOVERY_MS: f64 = 800.0;
/// Hazard hits above which the session is flagged
const COLLISION_FLAG_COUNT: usize = 5;

/// Coarse interpretation of the composite index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    Elevated,
}

impl RiskBand {
    pub fn from_index(index: f64) -> Self {
        if index < 35.0 {
            RiskBand::Low
        } else if index < 65.0 {
            RiskBand::Medium
        } else {
            RiskBand::Elevated
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Medium => "Medium",
            RiskBand::Elevated => "Elevated",
        }
    }
}

/// Human-readable factors behind a score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub factors: Vec<String>,
    pub recommendations: Vec<String>,
    /// How much telemetry backs the score, [0, 100]
    pub confidence: f64,
}

/// Scores derived from one closed log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub impulsivity_score: f64,
    pub overcorrection_rate: f64,
    pub patience_score: f64,
    pub risk_taking_ratio: f64,
    pub average_reaction_time_ms: f64,
    /// Root mean square of actor displacement samples
    pub movement_variance: f64,
    pub behaviour_risk_index: f64,
    pub action_count: usize,
    pub actions_per_minute: f64,
    /// Mean of the trailing stability window
    pub average_stability: f64,
    pub decision_speed_variance: f64,
    pub risk_escalation_detected: bool,
    pub recovery_response_score: f64,
    pub corrections: usize,
    pub overcorrections: usize,
    pub pauses: usize,
    pub collections: usize,
    pub risky_collections: usize,
    pub hazard_hits: usize,
    pub risk_band: RiskBand,
    pub explanation: Explanation,
}

/// Concept-specific composite weighting
pub trait ScoringStrategy {
    /// Composite behaviour risk index before clamping
    fn composite(&self, metrics: &DerivedMetrics, settings: &Settings) -> f64;
}

/// Weighting for the continuous balance variant
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceScoring;

impl ScoringStrategy for BalanceScoring {
    fn composite(&self, m: &DerivedMetrics, _settings: &Settings) -> f64 {
        0.35 * m.impulsivity_score
            + 0.35 * m.overcorrection_rate
            + 0.20 * (100.0 - m.patience_score)
            + 0.10 * (100.0 - m.average_stability.min(100.0))
    }
}

/// Weighting for the discrete collector variant
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorScoring;

impl CollectorScoring {
    /// Fast reactions map to high urgency; 0 without samples
    pub fn reaction_urgency(m: &DerivedMetrics) -> f64 {
        if m.average_reaction_time_ms <= 0.0 {
            return 0.0;
        }
        clamp_percent(
            (RELAXED_REACTION_MS - m.average_reaction_time_ms) / (RELAXED_REACTION_MS - URGENT_REACTION_MS) * 100.0,
        )
    }

    /// Movement relative to the held-key step; steady steering scores 50
    pub fn movement_intensity(m: &DerivedMetrics, settings: &Settings) -> f64 {
        let step = f64::from(settings.collector.actor_step);
        if step <= 0.0 {
            return 0.0;
        }
        clamp_percent(50.0 * m.movement_variance / step)
    }
}

impl ScoringStrategy for CollectorScoring {
    fn composite(&self, m: &DerivedMetrics, settings: &Settings) -> f64 {
        0.45 * m.risk_taking_ratio
            + 0.25 * Self::reaction_urgency(m)
            + 0.15 * Self::movement_intensity(m, settings)
            + 0.15 * (100.0 - m.recovery_response_score)
    }
}

/// Scoring strategy for a concept
pub fn strategy_for(concept: Concept) -> &'static dyn ScoringStrategy {
    match concept {
        Concept::BalanceUnderPressure => &BalanceScoring,
        Concept::FallingObjects => &CollectorScoring,
    }
}

/// Derive every metric from a closed log
pub fn aggregate(log: &ClosedLog, concept: Concept, settings: &Settings) -> DerivedMetrics {
    let tuning = &settings.scoring;

    let actions: Vec<_> = log.actions().collect();
    let action_count = actions.len();
    let rapid = actions
        .iter()
        .filter(|e| e.decision_speed_ms.is_some_and(|ms| ms < tuning.rapid_action_ms))
        .count();
    let impulsivity_score = if action_count == 0 {
        0.0
    } else {
        (200.0 * rapid as f64 / action_count as f64).min(100.0)
    };

    let duration_secs = log.elapsed_secs().max(0.0).floor();
    let actions_per_minute = if action_count == 0 {
        0.0
    } else {
        action_count as f64 / (duration_secs.max(1.0) / 60.0)
    };
    let patience_score = (100.0 - 5.0 * actions_per_minute).max(0.0);

    let corrections = actions
        .iter()
        .filter(|e| {
            matches!(
                e.event_data.detail,
                EventDetail::ActionTaken { action_type, .. } if action_type.is_correction()
            )
        })
        .count();
    let overcorrections = log.of_type(EventType::OvercorrectionDetected).count();
    let overcorrection_rate = ratio_percent(overcorrections, corrections);
    let pauses = actions
        .iter()
        .filter(|e| e.event_type == EventType::PauseObserve)
        .count();

    let collections = log.of_type(EventType::ObjectCollected).count();
    let risky_collections = log
        .of_type(EventType::ObjectCollected)
        .filter(|e| matches!(e.event_data.detail, EventDetail::ObjectCollected { nearby_hazards, .. } if nearby_hazards > 0))
        .count();
    let risk_taking_ratio = ratio_percent(risky_collections, collections);
    let hazard_hits = log.of_type(EventType::TrapCollision).count();

    let reactions: Vec<f64> = log
        .events()
        .iter()
        .filter_map(|e| match e.event_data.detail {
            EventDetail::ObjectCollected { reaction_time_ms, .. }
            | EventDetail::TrapCollision { reaction_time_ms, .. } => Some(reaction_time_ms),
            _ => None,
        })
        .collect();
    let average_reaction_time_ms = mean(&reactions);

    let movement: Vec<f64> = log.movement_samples().iter().map(|d| f64::from(*d)).collect();
    let movement_variance = mean(&movement.iter().map(|d| d * d).collect::<Vec<_>>()).sqrt();

    let average_stability = trailing_stability(log.stability_samples(), tuning.stability_window);

    let speeds: Vec<f64> = actions.iter().filter_map(|e| e.decision_speed_ms).collect();
    let decision_speed_variance = variance(&speeds);

    let levels: Vec<RiskLevel> = log.events().iter().filter_map(|e| e.risk_level_chosen).collect();
    let risk_escalation_detected = upward_steps(&levels) >= tuning.escalation_steps;

    let recovery_response_score = recovery_response(log, hazard_hits);

    let mut metrics = DerivedMetrics {
        impulsivity_score,
        overcorrection_rate,
        patience_score,
        risk_taking_ratio,
        average_reaction_time_ms,
        movement_variance,
        behaviour_risk_index: 0.0,
        action_count,
        actions_per_minute,
        average_stability,
        decision_speed_variance,
        risk_escalation_detected,
        recovery_response_score,
        corrections,
        overcorrections,
        pauses,
        collections,
        risky_collections,
        hazard_hits,
        risk_band: RiskBand::Low,
        explanation: Explanation::default(),
    };

    metrics.behaviour_risk_index = clamp_percent(strategy_for(concept).composite(&metrics, settings));
    metrics.risk_band = RiskBand::from_index(metrics.behaviour_risk_index);
    metrics.explanation = explain(&metrics, log.events().len());

    log::info!(
        "Aggregated {} ({:?}): index {:.1} ({}), {} actions",
        log.session_id(),
        concept,
        metrics.behaviour_risk_index,
        metrics.risk_band.label(),
        action_count
    );
    metrics
}

/// Factors and recommendations for a set of metrics
pub fn explain(m: &DerivedMetrics, event_count: usize) -> Explanation {
    let mut factors = Vec::new();
    let mut recommendations = Vec::new();

    if m.impulsivity_score > 60.0 {
        factors.push("High impulsivity in decision timing".to_string());
        recommendations.push("Take a moment before each action".to_string());
    }
    if m.overcorrection_rate > 50.0 {
        factors.push("Frequent overcorrection under pressure".to_string());
        recommendations.push("Prefer small adjustments over large ones".to_string());
    }
    if m.risk_escalation_detected {
        factors.push("Escalating risk choices over the session".to_string());
        recommendations.push("Notice the urge to raise stakes over time".to_string());
    }
    if m.patience_score < 40.0 {
        factors.push("Limited patience shown during play".to_string());
        recommendations.push("Practise waiting and observing before acting".to_string());
    }
    if m.recovery_response_score < 40.0 {
        factors.push("Reactive responses after setbacks".to_string());
        recommendations.push("Pause after an unexpected loss".to_string());
    }
    if m.pauses > 2 {
        factors.push("Deliberate pauses show self-awareness".to_string());
    }
    if m.collections > 0 && m.risky_collections as f64 / m.collections as f64 > 0.6 {
        factors.push("High-risk collection pattern".to_string());
        recommendations.push("Weigh nearby hazards before reaching for rewards".to_string());
    }
    if m.hazard_hits > COLLISION_FLAG_COUNT {
        factors.push("Multiple collisions with hazards".to_string());
        recommendations.push("Assess risks before moving in".to_string());
    }
    if factors.is_empty() {
        factors.push("Balanced interaction patterns".to_string());
        recommendations.push("Keep up the balanced approach".to_string());
    }

    Explanation {
        factors,
        recommendations,
        confidence: clamp_percent(event_count as f64 * 10.0),
    }
}

fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        clamp_percent(100.0 * part as f64 / whole as f64)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population variance; 0 for fewer than two samples
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Mean over the last `window` entries of the stability series
fn trailing_stability(samples: &[f64], window: usize) -> f64 {
    let window = window.max(1);
    let series = std::iter::once(INITIAL_STABILITY).chain(samples.iter().copied());
    let total = samples.len() + 1;
    let skip = total.saturating_sub(window);
    let tail: Vec<f64> = series.skip(skip).collect();
    mean(&tail)
}

fn upward_steps(levels: &[RiskLevel]) -> usize {
    levels.windows(2).filter(|w| w[1] > w[0]).count()
}

/// Starts at 100; a collection hurried straight after a hazard hit costs 10,
/// a measured one earns 5 back
fn recovery_response(log: &ClosedLog, hazard_hits: usize) -> f64 {
    let mut score: f64 = 100.0;
    for pair in log.events().windows(2) {
        if pair[0].event_type != EventType::TrapCollision {
            continue;
        }
        if let EventDetail::ObjectCollected { reaction_time_ms, .. } = pair[1].event_data.detail {
            if reaction_time_ms < REACTIVE_RECOVERY_MS {
                score -= 10.0;
            } else {
                score = (score + 5.0).min(100.0);
            }
        }
    }
    if hazard_hits > COLLISION_FLAG_COUNT {
        score -= 10.0;
    }
    clamp_percent(score)
}
