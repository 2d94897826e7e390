//! Percentage/degree layer controls to pixel-space drawing parameters.

use crate::layers::Transform;

/// Overlay scales at or below this are drawn at this size instead.
pub const MIN_SCALE: f32 = 1e-3;

/// Fraction of the canvas width an overlay spans at `scale == 1`.
pub const OVERLAY_BASE_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn full_rect(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.width as f32,
            height: self.height as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// Centre anchor of a text layer.
///
/// `left` grows to the right, `top` grows upwards; both are measured from the
/// canvas centre.
pub fn text_anchor(left: f32, top: f32, canvas: CanvasSize) -> Point {
    Point {
        x: canvas.width as f32 * (left + 50.0) / 100.0,
        y: canvas.height as f32 * (50.0 - top) / 100.0,
    }
}

/// Centre anchor of an overlay.
pub fn overlay_anchor(x: f32, y: f32, canvas: CanvasSize) -> Point {
    Point {
        x: canvas.width as f32 * x / 100.0,
        y: canvas.height as f32 * y / 100.0,
    }
}

pub fn effective_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > MIN_SCALE {
        scale
    } else {
        MIN_SCALE
    }
}

/// Destination rectangle of an overlay whose intrinsic size is
/// `intrinsic_w x intrinsic_h`, centred on its anchor.
pub fn overlay_rect(
    transform: &Transform,
    canvas: CanvasSize,
    intrinsic_w: u32,
    intrinsic_h: u32,
) -> Rect {
    let aspect = intrinsic_w.max(1) as f32 / intrinsic_h.max(1) as f32;
    let base_width = canvas.width as f32 * OVERLAY_BASE_WIDTH;
    let base_height = base_width / aspect;
    let scale = effective_scale(transform.scale);
    let width = base_width * scale;
    let height = base_height * scale;
    let anchor = overlay_anchor(transform.x, transform.y, canvas);
    Rect {
        x: anchor.x - width / 2.0,
        y: anchor.y - height / 2.0,
        width,
        height,
    }
}
