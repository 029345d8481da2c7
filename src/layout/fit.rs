//! Auto-fit of a relative point layout into the figure viewport.
//!
//! Relative coordinates are centered on their bounding box, stretched horizontally by the
//! source aspect ratio so both axes measure the same physical distance, uniformly scaled so
//! the whole cloud fits `margin` of the viewport, flipped to Y-up and moved onto the
//! viewport center.

use serde::Serialize;

use crate::foundation::core::{Point, Rect};
use crate::layout::normalize::{LayoutInfo, RelativeLayout};

/// Scene units spanned by one relative unit before fitting (the scene frame height).
pub const BASE_UNIT: f64 = 8.0;

/// Spans below this (relative units) are floored to keep the scale finite.
pub const MIN_RELATIVE_SPAN: f64 = 0.1;

/// Fitted mapping from relative coordinates to scene coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FigureTransform {
    /// Uniform scale applied on top of [`BASE_UNIT`] on both axes.
    pub scale: f64,
    /// Bounding-box center of the layout in relative units.
    pub rel_center: Point,
    /// Horizontal correction applied before scaling.
    pub aspect_ratio: f64,
    /// Scene point the layout center lands on.
    pub viewport_center: Point,
}

impl FigureTransform {
    /// Fit every finite point of `layout` into `viewport` shrunk by `margin`.
    pub fn fit(layout: &LayoutInfo, viewport: Rect, margin: f64) -> Self {
        let aspect_ratio = sanitize_aspect_ratio(layout.aspect_ratio);
        let viewport_center = viewport.center();

        let Some(bounds) = relative_bounds(&layout.relative_layout) else {
            return Self {
                scale: 1.0,
                rel_center: Point::new(0.5, 0.5),
                aspect_ratio,
                viewport_center,
            };
        };

        let margin = if margin.is_finite() && margin > 0.0 {
            margin.min(1.0)
        } else {
            1.0
        };
        let span_x = bounds.width().max(MIN_RELATIVE_SPAN);
        let span_y = bounds.height().max(MIN_RELATIVE_SPAN);
        let target_w = viewport.width() * margin;
        let target_h = viewport.height() * margin;

        let scale_y_based = target_h / (span_y * BASE_UNIT);
        let scale_x_based = target_w / (span_x * BASE_UNIT * aspect_ratio);

        Self {
            scale: scale_x_based.min(scale_y_based),
            rel_center: bounds.center(),
            aspect_ratio,
            viewport_center,
        }
    }

    /// Scene units per (aspect-corrected) relative unit.
    pub fn units_per_relative(&self) -> f64 {
        BASE_UNIT * self.scale
    }

    /// Map one relative coordinate into the scene.
    pub fn apply(&self, rel: [f64; 2]) -> Point {
        let dx = (rel[0] - self.rel_center.x) * self.aspect_ratio;
        let dy = rel[1] - self.rel_center.y;
        let k = self.units_per_relative();
        Point::new(
            self.viewport_center.x + dx * k,
            self.viewport_center.y - dy * k,
        )
    }
}

/// Resolves point ids to scene coordinates through a fitted [`FigureTransform`].
#[derive(Clone, Debug)]
pub struct FigureMapper<'a> {
    layout: &'a RelativeLayout,
    transform: FigureTransform,
}

impl<'a> FigureMapper<'a> {
    /// Fit `info` into `viewport` and keep the layout for lookups.
    pub fn new(info: &'a LayoutInfo, viewport: Rect, margin: f64) -> Self {
        Self {
            layout: &info.relative_layout,
            transform: FigureTransform::fit(info, viewport, margin),
        }
    }

    /// The fitted transform.
    pub fn transform(&self) -> &FigureTransform {
        &self.transform
    }

    /// Scene position of `id`; unknown or non-finite points land on the viewport center.
    pub fn point(&self, id: &str) -> Point {
        match self.layout.get(id) {
            Some(rel) if rel.iter().all(|v| v.is_finite()) => self.transform.apply(*rel),
            Some(_) => {
                tracing::warn!(point = id, "non-finite coordinates, using viewport center");
                self.transform.viewport_center
            }
            None => {
                tracing::warn!(point = id, "unknown point id, using viewport center");
                self.transform.viewport_center
            }
        }
    }

    /// Scene positions of several ids, in order.
    pub fn points<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Point> {
        ids.iter().map(|id| self.point(id.as_ref())).collect()
    }
}

fn sanitize_aspect_ratio(ar: f64) -> f64 {
    if ar.is_finite() && ar > 0.0 {
        ar
    } else {
        tracing::warn!(aspect_ratio = ar, "invalid aspect ratio, assuming 1.0");
        1.0
    }
}

fn relative_bounds(layout: &RelativeLayout) -> Option<Rect> {
    let mut pts = layout
        .values()
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .map(|p| Point::new(p[0], p[1]));
    let first = pts.next()?;
    Some(pts.fold(Rect::from_points(first, first), |r, p| r.union_pt(p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(points: &[(&str, [f64; 2])], aspect_ratio: f64) -> LayoutInfo {
        LayoutInfo {
            aspect_ratio,
            relative_layout: points
                .iter()
                .map(|(id, p)| ((*id).to_owned(), *p))
                .collect(),
        }
    }

    fn viewport() -> Rect {
        // Right-hand figure region of a 16:9 frame, 8 units tall.
        Rect::new(0.711, -2.8, 7.111, 2.8)
    }

    fn assert_inside(p: Point, r: Rect) {
        assert!(
            p.x >= r.x0 - 1e-9 && p.x <= r.x1 + 1e-9 && p.y >= r.y0 - 1e-9 && p.y <= r.y1 + 1e-9,
            "{p:?} outside {r:?}"
        );
    }

    #[test]
    fn empty_layout_falls_back_to_unit_scale() {
        let t = FigureTransform::fit(&info(&[], 2.0), viewport(), 0.8);
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.rel_center, Point::new(0.5, 0.5));
        assert_eq!(t.viewport_center, viewport().center());
    }

    #[test]
    fn points_fit_inside_viewport_for_several_aspect_ratios() {
        let pts = [
            ("A", [0.05, 0.1]),
            ("B", [0.95, 0.15]),
            ("C", [0.4, 0.9]),
            ("D", [0.7, 0.6]),
        ];
        for ar in [0.25, 0.75, 1.0, 1.5, 2.0, 4.0] {
            for margin in [0.7, 0.8, 1.0] {
                let i = info(&pts, ar);
                let m = FigureMapper::new(&i, viewport(), margin);
                for (id, _) in pts {
                    assert_inside(m.point(id), viewport());
                }
            }
        }
    }

    #[test]
    fn scale_is_shared_by_both_axes() {
        let i = info(&[("A", [0.0, 0.0]), ("B", [1.0, 1.0])], 1.0);
        let m = FigureMapper::new(&i, viewport(), 0.8);
        let a = m.point("A");
        let b = m.point("B");
        // Square source, diagonal points: equal extents on both axes.
        assert!(((b.x - a.x).abs() - (b.y - a.y).abs()).abs() < 1e-9);
        // Y is flipped: larger relative y is lower on screen.
        assert!(b.y < a.y);
    }

    #[test]
    fn single_point_lands_on_viewport_center() {
        let i = info(&[("P", [0.3, 0.9])], 1.7);
        let m = FigureMapper::new(&i, viewport(), 0.7);
        let p = m.point("P");
        let c = viewport().center();
        assert!((p.x - c.x).abs() < 1e-9 && (p.y - c.y).abs() < 1e-9);
        assert!(m.transform().scale.is_finite());
    }

    #[test]
    fn collinear_points_do_not_divide_by_zero() {
        let i = info(&[("A", [0.2, 0.5]), ("B", [0.8, 0.5])], 1.0);
        let m = FigureMapper::new(&i, viewport(), 0.8);
        assert!(m.transform().scale.is_finite());
        assert!((m.point("A").y - viewport().center().y).abs() < 1e-9);
    }

    #[test]
    fn unknown_point_maps_to_center() {
        let i = info(&[("A", [0.2, 0.5])], 1.0);
        let m = FigureMapper::new(&i, viewport(), 0.8);
        assert_eq!(m.point("Z"), viewport().center());
    }

    #[test]
    fn aspect_ratio_preserves_physical_spacing() {
        // A 1000x500 image: horizontal 0.5 relative is 500px, vertical 0.5 is 250px.
        let i = LayoutInfo::from_dimensions(
            RelativeLayout::from([
                ("O".to_owned(), [0.25, 0.25]),
                ("X".to_owned(), [0.75, 0.25]),
                ("Y".to_owned(), [0.25, 0.75]),
            ]),
            1000,
            500,
        )
        .unwrap();
        let m = FigureMapper::new(&i, viewport(), 0.8);
        let o = m.point("O");
        let dx = (m.point("X") - o).hypot();
        let dy = (m.point("Y") - o).hypot();
        assert!((dx / dy - 2.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_aspect_ratio_is_treated_as_square() {
        let t = FigureTransform::fit(&info(&[("A", [0.1, 0.1])], f64::NAN), viewport(), 0.8);
        assert_eq!(t.aspect_ratio, 1.0);
    }
}
