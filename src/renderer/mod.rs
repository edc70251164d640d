//! Rendering presenter
//!
//! A read-only projection of `SimulationState` onto a `Surface`. Rendering
//! takes the state by shared reference and can never mutate it.
//!
//! Surfaces:
//! - `DrawList`: records commands (headless hosts, tests)
//! - `CanvasSurface`: HTML canvas 2D context (WASM only)

pub mod draw_list;
pub mod shapes;

#[cfg(target_arch = "wasm32")]
pub mod canvas;

use glam::Vec2;

use crate::session::Session;
use crate::sim::{ActionKind, BalanceSystem, CollectorField, EntityCategory, SimulationState, Variant};

pub use draw_list::{DrawCommand, DrawList};

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;

/// Linear RGBA, components in [0, 1]
pub type Color = [f32; 4];

/// Logical playfield size both variants are drawn in
pub const VIEW_WIDTH: f32 = 800.0;
pub const VIEW_HEIGHT: f32 = 600.0;

/// Palette
pub mod colors {
    use super::Color;

    pub const BACKGROUND: Color = [0.059, 0.090, 0.165, 1.0];
    pub const FIELD: Color = [0.118, 0.161, 0.231, 1.0];
    pub const TRACK: Color = [0.2, 0.255, 0.333, 1.0];
    pub const TEXT: Color = [0.886, 0.910, 0.941, 1.0];
    pub const MUTED: Color = [0.580, 0.639, 0.722, 1.0];
    pub const GOOD: Color = [0.133, 0.773, 0.369, 1.0];
    pub const WARN: Color = [0.918, 0.702, 0.031, 1.0];
    pub const BAD: Color = [0.937, 0.267, 0.267, 1.0];
    pub const TARGET: Color = [0.392, 0.784, 1.0, 1.0];
    pub const TARGET_GLOW: Color = [0.392, 0.784, 1.0, 0.25];
    pub const PRESSURE: Color = [0.976, 0.451, 0.086, 1.0];
    pub const ACTOR: Color = [0.231, 0.510, 0.965, 1.0];
    pub const REWARD: Color = [0.133, 0.773, 0.369, 1.0];
    pub const BONUS: Color = [0.984, 0.749, 0.141, 1.0];
    pub const HAZARD: Color = [0.937, 0.267, 0.267, 1.0];
    pub const OVERLAY: Color = [0.0, 0.0, 0.0, 0.55];
    pub const BANNER: Color = [0.545, 0.361, 0.965, 0.9];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Drawing target
pub trait Surface {
    /// Surface size in logical units
    fn size(&self) -> Vec2;
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, min: Vec2, size: Vec2, color: Color);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn fill_polygon(&mut self, points: &[Vec2], color: Color);
    fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color, align: TextAlign);
}

/// Session facts the HUD needs besides the simulation state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewInfo {
    pub demo: bool,
    pub paused: bool,
    pub action_count: usize,
    pub time_remaining_secs: f64,
    pub last_action: Option<ActionKind>,
}

impl ViewInfo {
    pub fn from_session(session: &Session) -> Self {
        Self {
            demo: session.is_demo(),
            paused: session.phase() == crate::SessionPhase::Paused,
            action_count: session.action_count(),
            time_remaining_secs: session.time_remaining_secs(),
            last_action: session.last_action(),
        }
    }
}

/// Colour band for a balance deviation from target
pub fn deviation_color(deviation: f64) -> Color {
    if deviation < 10.0 {
        colors::GOOD
    } else if deviation < 25.0 {
        colors::WARN
    } else {
        colors::BAD
    }
}

/// Draw one frame
pub fn render(state: &SimulationState, view: &ViewInfo, surface: &mut impl Surface) {
    surface.clear(colors::BACKGROUND);

    match &state.variant {
        Variant::Balance(sys) => render_balance(sys, view, surface),
        Variant::Collector(field) => render_collector(field, view, surface),
    }

    if view.demo {
        surface.fill_rect(Vec2::new(VIEW_WIDTH / 2.0 - 90.0, 8.0), Vec2::new(180.0, 26.0), colors::BANNER);
        surface.text(
            Vec2::new(VIEW_WIDTH / 2.0, 26.0),
            "DEMO MODE",
            16.0,
            colors::TEXT,
            TextAlign::Center,
        );
    }

    if view.paused {
        surface.fill_rect(Vec2::ZERO, Vec2::new(VIEW_WIDTH, VIEW_HEIGHT), colors::OVERLAY);
        surface.text(
            Vec2::new(VIEW_WIDTH / 2.0, VIEW_HEIGHT / 2.0),
            "Paused",
            36.0,
            colors::TEXT,
            TextAlign::Center,
        );
    }
}

fn render_balance(sys: &BalanceSystem, view: &ViewInfo, surface: &mut impl Surface) {
    // Balance column
    let column_min = Vec2::new(360.0, 100.0);
    let column_size = Vec2::new(80.0, 400.0);
    surface.fill_rect(column_min, column_size, colors::TRACK);

    let fill = column_size.y * (sys.balance as f32 / 100.0);
    surface.fill_rect(
        Vec2::new(column_min.x, column_min.y + column_size.y - fill),
        Vec2::new(column_size.x, fill),
        deviation_color(sys.deviation()),
    );

    // Target marker with glow
    let target_y = column_min.y + column_size.y * (1.0 - sys.target as f32 / 100.0);
    surface.fill_rect(
        Vec2::new(column_min.x - 20.0, target_y - 8.0),
        Vec2::new(column_size.x + 40.0, 16.0),
        colors::TARGET_GLOW,
    );
    surface.fill_rect(
        Vec2::new(column_min.x - 12.0, target_y - 2.0),
        Vec2::new(column_size.x + 24.0, 4.0),
        colors::TARGET,
    );

    // Pressure and stability bars
    meter(surface, Vec2::new(40.0, 60.0), "Pressure", sys.pressure, colors::PRESSURE);
    meter(
        surface,
        Vec2::new(40.0, 110.0),
        "Stability",
        sys.stability,
        deviation_color(100.0 - sys.stability),
    );

    surface.text(
        Vec2::new(VIEW_WIDTH - 40.0, 70.0),
        &format!("Time: {:.0}s", view.time_remaining_secs.ceil()),
        18.0,
        colors::TEXT,
        TextAlign::Right,
    );
    surface.text(
        Vec2::new(VIEW_WIDTH - 40.0, 100.0),
        &format!("Actions: {}", view.action_count),
        16.0,
        colors::MUTED,
        TextAlign::Right,
    );
    if let Some(action) = view.last_action {
        surface.text(
            Vec2::new(VIEW_WIDTH - 40.0, 130.0),
            action.label(),
            14.0,
            colors::MUTED,
            TextAlign::Right,
        );
    }
    surface.text(
        Vec2::new(VIEW_WIDTH / 2.0, 560.0),
        "Up: gentle  Down: strong  Space: observe",
        14.0,
        colors::MUTED,
        TextAlign::Center,
    );
}

fn render_collector(field: &CollectorField, view: &ViewInfo, surface: &mut impl Surface) {
    surface.fill_rect(Vec2::ZERO, Vec2::new(field.width, field.height), colors::FIELD);

    for entity in &field.entities {
        let center = entity.pos + entity.size / 2.0;
        let radius = entity.size.x / 2.0;
        match entity.category {
            EntityCategory::Reward => surface.fill_circle(center, radius, colors::REWARD),
            EntityCategory::Bonus => {
                surface.fill_polygon(&shapes::star(center, radius, radius * 0.45, 5), colors::BONUS)
            }
            EntityCategory::Hazard => surface.fill_polygon(&shapes::triangle(center, entity.size.x), colors::HAZARD),
        }
    }

    let actor = field.actor.bounds();
    surface.fill_rect(actor.min, actor.max - actor.min, colors::ACTOR);

    surface.text(
        Vec2::new(20.0, 30.0),
        &format!("Score: {:.0}", field.score),
        18.0,
        colors::TEXT,
        TextAlign::Left,
    );
    meter(
        surface,
        Vec2::new(20.0, 50.0),
        "Health",
        field.health,
        shapes::mix(colors::BAD, colors::GOOD, (field.health / 100.0) as f32),
    );
    surface.text(
        Vec2::new(field.width - 20.0, 30.0),
        &format!("Time: {:.0}s", view.time_remaining_secs.ceil()),
        18.0,
        colors::TEXT,
        TextAlign::Right,
    );
}

/// Labelled horizontal bar for a [0, 100] value
fn meter(surface: &mut impl Surface, origin: Vec2, label: &str, value: f64, color: Color) {
    let width = 200.0;
    let filled = width * (crate::clamp_percent(value) as f32 / 100.0);
    surface.text(origin, &format!("{label}: {value:.0}"), 14.0, colors::MUTED, TextAlign::Left);
    surface.fill_rect(origin + Vec2::new(0.0, 8.0), Vec2::new(width, 12.0), colors::TRACK);
    surface.fill_rect(origin + Vec2::new(0.0, 8.0), Vec2::new(filled, 12.0), color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::{Concept, Entity};

    #[test]
    fn test_deviation_bands() {
        assert_eq!(deviation_color(5.0), colors::GOOD);
        assert_eq!(deviation_color(10.0), colors::WARN);
        assert_eq!(deviation_color(30.0), colors::BAD);
    }

    #[test]
    fn test_balance_frame_has_hud() {
        let state = SimulationState::new(Concept::BalanceUnderPressure, 1, &Settings::default());
        let view = ViewInfo {
            action_count: 3,
            time_remaining_secs: 42.2,
            last_action: Some(ActionKind::Strong),
            ..Default::default()
        };
        let mut list = DrawList::new(VIEW_WIDTH, VIEW_HEIGHT);
        render(&state, &view, &mut list);

        assert!(matches!(list.commands[0], DrawCommand::Clear(_)));
        assert!(list.contains_text("Actions: 3"));
        assert!(list.contains_text("Time: 43s"));
        assert!(list.contains_text("Strong stabilise"));
        assert!(!list.contains_text("DEMO"));
    }

    #[test]
    fn test_collector_shapes_by_category() {
        let mut state = SimulationState::new(Concept::FallingObjects, 1, &Settings::default());
        if let Variant::Collector(field) = &mut state.variant {
            field.entities.push(Entity::new(1, EntityCategory::Reward, 100.0));
            field.entities.push(Entity::new(2, EntityCategory::Bonus, 200.0));
            field.entities.push(Entity::new(3, EntityCategory::Hazard, 300.0));
        }
        let mut list = DrawList::new(VIEW_WIDTH, VIEW_HEIGHT);
        render(&state, &ViewInfo::default(), &mut list);

        assert_eq!(list.count(|c| matches!(c, DrawCommand::Circle { .. })), 1);
        assert_eq!(list.count(|c| matches!(c, DrawCommand::Polygon { .. })), 2);
        assert!(list.contains_text("Score: 0"));
    }

    #[test]
    fn test_demo_banner_and_pause_overlay() {
        let state = SimulationState::new(Concept::FallingObjects, 1, &Settings::default());
        let view = ViewInfo {
            demo: true,
            paused: true,
            ..Default::default()
        };
        let mut list = DrawList::new(VIEW_WIDTH, VIEW_HEIGHT);
        render(&state, &view, &mut list);
        assert!(list.contains_text("DEMO MODE"));
        assert!(list.contains_text("Paused"));
    }
}
