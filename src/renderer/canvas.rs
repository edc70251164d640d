//! HTML canvas 2D surface (WASM only)

use glam::Vec2;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::{Color, Surface, TextAlign, VIEW_HEIGHT, VIEW_WIDTH};

/// CSS `rgba()` string for a colour
pub fn to_css(color: Color) -> String {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({}, {}, {}, {:.3})",
        channel(color[0]),
        channel(color[1]),
        channel(color[2]),
        color[3].clamp(0.0, 1.0)
    )
}

/// Draws the logical 800x600 view scaled to fit the canvas backing store
pub struct CanvasSurface {
    ctx: CanvasRenderingContext2d,
    canvas: HtmlCanvasElement,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Option<Self> {
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()?
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        Some(Self { ctx, canvas })
    }

    /// Resize the backing store to the element's CSS size times the device pixel ratio
    pub fn resize(&mut self, dpr: f64) {
        let width = (self.canvas.client_width() as f64 * dpr) as u32;
        let height = (self.canvas.client_height() as f64 * dpr) as u32;
        if width > 0 && height > 0 && (width != self.canvas.width() || height != self.canvas.height()) {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            log::debug!("Canvas resized to {}x{}", width, height);
        }
    }

    /// Map the logical view onto the canvas, letterboxed
    fn apply_transform(&self) {
        let sx = self.canvas.width() as f64 / VIEW_WIDTH as f64;
        let sy = self.canvas.height() as f64 / VIEW_HEIGHT as f64;
        let scale = sx.min(sy);
        let ox = (self.canvas.width() as f64 - VIEW_WIDTH as f64 * scale) / 2.0;
        let oy = (self.canvas.height() as f64 - VIEW_HEIGHT as f64 * scale) / 2.0;
        let _ = self.ctx.set_transform(scale, 0.0, 0.0, scale, ox, oy);
    }
}

impl Surface for CanvasSurface {
    fn size(&self) -> Vec2 {
        Vec2::new(VIEW_WIDTH, VIEW_HEIGHT)
    }

    fn clear(&mut self, color: Color) {
        let _ = self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        self.ctx.set_fill_style_str(&to_css(color));
        self.ctx
            .fill_rect(0.0, 0.0, self.canvas.width() as f64, self.canvas.height() as f64);
        self.apply_transform();
    }

    fn fill_rect(&mut self, min: Vec2, size: Vec2, color: Color) {
        self.ctx.set_fill_style_str(&to_css(color));
        self.ctx
            .fill_rect(min.x as f64, min.y as f64, size.x as f64, size.y as f64);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.ctx.set_fill_style_str(&to_css(color));
        self.ctx.begin_path();
        let _ = self.ctx.arc(
            center.x as f64,
            center.y as f64,
            radius.max(0.0) as f64,
            0.0,
            std::f64::consts::TAU,
        );
        self.ctx.fill();
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Color) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.ctx.set_fill_style_str(&to_css(color));
        self.ctx.begin_path();
        self.ctx.move_to(first.x as f64, first.y as f64);
        for p in rest {
            self.ctx.line_to(p.x as f64, p.y as f64);
        }
        self.ctx.close_path();
        self.ctx.fill();
    }

    fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color, align: TextAlign) {
        self.ctx.set_fill_style_str(&to_css(color));
        self.ctx.set_font(&format!("{}px system-ui, sans-serif", size.round()));
        self.ctx.set_text_align(match align {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        });
        let _ = self.ctx.fill_text(text, pos.x as f64, pos.y as f64);
    }
}
