use std::path::PathBuf;

use serde::Serialize;

use crate::assets::color::Color;
use crate::foundation::core::{Fps, Point, Rect, Vec2};
use crate::layout::fit::FigureTransform;

/// Half-open time interval `[start, end)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    /// Linear progress through the window: 0 before it, 1 at and after its end.
    pub fn progress(&self, t: f64) -> f64 {
        if t < self.start {
            0.0
        } else if t >= self.end || self.end <= self.start {
            1.0
        } else {
            (t - self.start) / (self.end - self.start)
        }
    }
}

/// Timing and narration of one played step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepTiming {
    /// Position in the timeline.
    pub index: usize,
    /// When the step's marks animate; the next step starts at `window.end`.
    pub window: TimeWindow,
    /// Narration length before the minimum step time was applied.
    pub narration_secs: f64,
    /// Text shown in the footer while the step is active.
    pub subtitle: String,
    /// Narration clip played from the step start, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
}

/// Anchor used to place text marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    TopLeft,
    Center,
}

/// Geometry of a mark in scene units.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkShape {
    Dot {
        center: Point,
        radius: f64,
    },
    Polygon {
        points: Vec<Point>,
    },
    Segment {
        from: Point,
        to: Point,
        dashed: bool,
    },
    Arc {
        center: Point,
        radius: f64,
        start_angle: f64,
        sweep: f64,
    },
    Tick {
        from: Point,
        to: Point,
    },
    RightAngle {
        points: [Point; 3],
    },
    Axes {
        bounds: Rect,
        x_range: [f64; 3],
        y_range: [f64; 3],
    },
    Text {
        text: String,
        anchor: Point,
        align: TextAlign,
        /// Font size in scene units.
        size: f64,
    },
}

impl MarkShape {
    /// Scene-space bounding box; text uses an estimate of its rendered size.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Dot { center, radius } => {
                Rect::from_center_size(*center, (2.0 * radius, 2.0 * radius))
            }
            Self::Polygon { points } => points_bounds(points),
            Self::Segment { from, to, .. } | Self::Tick { from, to } => {
                Rect::from_points(*from, *to)
            }
            Self::Arc {
                center, radius, ..
            } => Rect::from_center_size(*center, (2.0 * radius, 2.0 * radius)),
            Self::RightAngle { points } => points_bounds(points),
            Self::Axes { bounds, .. } => *bounds,
            Self::Text {
                text,
                anchor,
                align,
                size,
            } => {
                let est = estimate_text_size(text, *size);
                match align {
                    TextAlign::TopLeft => {
                        Rect::new(anchor.x, anchor.y - est.y, anchor.x + est.x, anchor.y)
                    }
                    TextAlign::Center => Rect::from_center_size(*anchor, est.to_size()),
                }
            }
        }
    }
}

fn points_bounds(points: &[Point]) -> Rect {
    let mut it = points.iter();
    let Some(first) = it.next() else {
        return Rect::ZERO;
    };
    it.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

/// Rough rendered size of `text` at `size` scene units: half-width glyphs for ASCII,
/// full-width for everything else, one line.
pub fn estimate_text_size(text: &str, size: f64) -> Vec2 {
    let em: f64 = text
        .chars()
        .map(|c| if c.is_ascii() { 0.55 } else { 1.0 })
        .sum();
    Vec2::new(em * size, size * LINE_HEIGHT)
}

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.25;

/// A temporary scale-and-tint pulse added by `HIGHLIGHT`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Emphasis {
    pub window: TimeWindow,
    /// Peak scale factor about the mark's center.
    pub scale: f64,
    /// Peak tint.
    pub color: Color,
}

/// Something drawn in the scene.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mark {
    pub shape: MarkShape,
    pub color: Color,
    /// The mark is drawn progressively over this window and stays afterwards.
    pub reveal: TimeWindow,
    /// Caption drawn just above the mark (point names).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emphasis: Vec<Emphasis>,
}

/// Counters collected while playing a timeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlayStats {
    /// Actions seen.
    pub actions: usize,
    /// Actions that produced marks or emphasis.
    pub applied: usize,
    /// Known actions that were skipped (bad arity, unknown ids, ...).
    pub skipped: usize,
    /// Actions with an unrecognized `op`.
    pub unknown: usize,
}

/// Renderer-agnostic result of playing a timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Storyboard {
    /// Header text, shown for the whole video.
    pub header: String,
    /// Total length in seconds (end of the last step).
    pub duration_secs: f64,
    pub steps: Vec<StepTiming>,
    /// Marks in draw order.
    pub marks: Vec<Mark>,
    /// Registry keys at the end of the run.
    pub registered: Vec<String>,
    /// Fit used to place the figure.
    pub figure: FigureTransform,
    pub stats: PlayStats,
}

impl Storyboard {
    /// The step whose subtitle is shown at `t` (the last step once the video has ended).
    pub fn step_at(&self, t: f64) -> Option<&StepTiming> {
        self.steps
            .iter()
            .take_while(|s| s.window.start <= t)
            .last()
    }

    /// Frames needed to show the whole storyboard at `fps`.
    pub fn frame_count(&self, fps: Fps) -> u64 {
        fps.secs_to_frames_ceil(self.duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_progress_clamps() {
        let w = TimeWindow::new(1.0, 3.0);
        assert_eq!(w.progress(0.0), 0.0);
        assert_eq!(w.progress(2.0), 0.5);
        assert_eq!(w.progress(3.0), 1.0);
        assert!(w.contains(1.0) && !w.contains(3.0));
        assert_eq!(TimeWindow::new(2.0, 2.0).progress(2.0), 1.0);
    }

    #[test]
    fn text_estimate_widens_for_cjk() {
        let ascii = estimate_text_size("ab", 1.0);
        let cjk = estimate_text_size("角度", 1.0);
        assert!(cjk.x > ascii.x);
        assert_eq!(ascii.y, LINE_HEIGHT);
    }

    #[test]
    fn top_left_text_bounds_hang_below_anchor() {
        let shape = MarkShape::Text {
            text: "x".to_owned(),
            anchor: Point::new(1.0, 2.0),
            align: TextAlign::TopLeft,
            size: 0.4,
        };
        let b = shape.bounds();
        assert_eq!(b.y1, 2.0);
        assert!(b.y0 < 2.0);
        assert_eq!(b.x0, 1.0);
    }
}
