//! Screen regions in scene units.
//!
//! The scene is Y-up with its origin at the frame center and a fixed height of
//! [`FRAME_HEIGHT`] units; its width follows the canvas aspect ratio. Every [`Rect`] here
//! stores its bottom edge in `y0` and its top edge in `y1`.

use serde::Serialize;

use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::scene::theme::{RenderProfile, Theme};

/// Height of the scene in units.
pub const FRAME_HEIGHT: f64 = 8.0;

/// The fixed layout of a lesson frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SceneRegions {
    /// Whole frame.
    pub frame: Rect,
    /// Problem statement band along the top.
    pub header: Rect,
    /// Subtitle band along the bottom.
    pub footer: Rect,
    /// Left body column holding the formula lines.
    pub solution: Rect,
    /// Right body column holding the figure (the fit viewport).
    pub figure: Rect,
}

impl SceneRegions {
    /// Split a frame with the canvas's proportions according to the theme ratios.
    pub fn new(canvas: Canvas, theme: &Theme) -> Self {
        let h = FRAME_HEIGHT;
        let w = frame_width(canvas);
        let header_h = h * theme.header_ratio;
        let footer_h = h * theme.footer_ratio;
        let left_w = w * theme.split_ratio;

        let top = h / 2.0;
        let bottom = -h / 2.0;
        let left = -w / 2.0;
        let right = w / 2.0;
        let body_top = top - header_h;
        let body_bottom = bottom + footer_h;

        Self {
            frame: Rect::new(left, bottom, right, top),
            header: Rect::new(left, body_top, right, top),
            footer: Rect::new(left, bottom, right, body_bottom),
            solution: Rect::new(left, body_bottom, left + left_w, body_top),
            figure: Rect::new(left + left_w, body_bottom, right, body_top),
        }
    }

    /// Where the first formula line's top-left corner goes.
    pub fn formula_cursor(&self, profile: RenderProfile) -> Point {
        let inset = profile.cursor_inset();
        Point::new(self.solution.x0 + inset.x, self.solution.y1 - inset.y)
    }
}

/// Scene width in units for `canvas`.
pub fn frame_width(canvas: Canvas) -> f64 {
    FRAME_HEIGHT * f64::from(canvas.width) / f64::from(canvas.height.max(1))
}

/// Pixels per scene unit for `canvas`.
pub fn pixels_per_unit(canvas: Canvas) -> f64 {
    f64::from(canvas.height) / FRAME_HEIGHT
}

/// Scene → pixel transform (Y flipped, origin moved to the top-left corner).
pub fn scene_to_pixels(canvas: Canvas) -> Affine {
    let k = pixels_per_unit(canvas);
    Affine::new([
        k,
        0.0,
        0.0,
        -k,
        f64::from(canvas.width) / 2.0,
        f64::from(canvas.height) / 2.0,
    ])
}
