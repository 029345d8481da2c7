//! Turning actions into marks.
//!
//! Every problem local to one action (wrong arity, unknown ids, degenerate geometry) is
//! logged and skipped; nothing here fails the run.

use crate::assets::color::Color;
use crate::foundation::core::{Point, Rect, Vec2};
use crate::foundation::math::normalize_sweep;
use crate::layout::fit::FigureMapper;
use crate::player::registry::{SceneObjectRegistry, canonical_id};
use crate::player::storyboard::{
    Emphasis, Mark, MarkShape, PlayStats, TextAlign, TimeWindow, estimate_text_size,
};
use crate::player::tex::tex_to_plain;
use crate::scene::regions::SceneRegions;
use crate::scene::theme::{RenderProfile, Theme};
use crate::task::model::{
    Action, AddMarker, Direction, DrawArc, DrawAxes, DrawLine, DrawShape, Highlight, LabelCoord,
    WriteMath,
};

/// Radius of point dots.
pub const DOT_RADIUS: f64 = 0.08;
/// Full length of an equal-segment tick.
pub const TICK_LENGTH: f64 = 0.2;
/// Side length of a right-angle elbow.
pub const RIGHT_ANGLE_SIDE: f64 = 0.3;
/// Gap between a labelled object and its label.
pub const LABEL_BUFF: f64 = 0.25;
/// Axes size relative to the figure viewport.
pub const AXES_FILL: f64 = 0.9;
/// Space kept free to the right of formula lines.
const FORMULA_RIGHT_PAD: f64 = 0.25;

const DEFAULT_AXIS_RANGE: [f64; 3] = [-5.0, 5.0, 1.0];

/// What a single dispatch did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped,
    Unknown,
}

/// Arc geometry in scene space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcGeometry {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    /// Signed sweep in `(-π, π]`.
    pub sweep: f64,
}

/// Arc around `center` from `start` towards `end`, taking the shorter way round.
/// `None` when `start` coincides with `center`.
pub fn arc_through(center: Point, start: Point, end: Point) -> Option<ArcGeometry> {
    let vs = start - center;
    let ve = end - center;
    let radius = vs.hypot();
    if !radius.is_finite() || radius < 1e-9 {
        return None;
    }
    let start_angle = vs.atan2();
    Some(ArcGeometry {
        center,
        radius,
        start_angle,
        sweep: normalize_sweep(ve.atan2() - start_angle),
    })
}

/// Resolve an action color: palette name or hex, else `fallback`.
pub fn resolve_color(requested: Option<&str>, fallback: Color) -> Color {
    match requested {
        None => fallback,
        Some(s) => Color::parse(s).unwrap_or_else(|e| {
            tracing::warn!(color = s, error = %e, "unparseable color, using theme color");
            fallback
        }),
    }
}

/// Applies actions against a borrowed registry, accumulating marks.
pub struct ActionDispatcher<'a> {
    mapper: &'a FigureMapper<'a>,
    regions: &'a SceneRegions,
    theme: &'a Theme,
    profile: RenderProfile,
    registry: &'a mut SceneObjectRegistry,
    marks: Vec<Mark>,
    last_formula: Option<Rect>,
    stats: PlayStats,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(
        mapper: &'a FigureMapper<'a>,
        regions: &'a SceneRegions,
        theme: &'a Theme,
        profile: RenderProfile,
        registry: &'a mut SceneObjectRegistry,
    ) -> Self {
        Self {
            mapper,
            regions,
            theme,
            profile,
            registry,
            marks: Vec::new(),
            last_formula: None,
            stats: PlayStats::default(),
        }
    }

    pub fn registry(&self) -> &SceneObjectRegistry {
        &*self.registry
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Hand over the accumulated marks and counters, releasing the registry.
    pub fn finish(self) -> (Vec<Mark>, PlayStats) {
        (self.marks, self.stats)
    }

    /// Apply one action whose animation runs over `window`.
    pub fn dispatch(&mut self, action: &Action, window: TimeWindow) -> Outcome {
        self.stats.actions += 1;
        let outcome = match action {
            Action::WriteMath(a) => self.write_math(a, window),
            Action::DrawAxes(a) => self.draw_axes(a, window),
            Action::DrawShape(a) => self.draw_shape(a, window),
            Action::DrawLine(a) => self.draw_line(a, window),
            Action::AddMarker(a) => self.add_marker(a, window),
            Action::DrawArc(a) => self.draw_arc(a, window),
            Action::Highlight(a) => self.highlight(a, window),
            Action::LabelCoord(a) => self.label_coord(a, window),
            Action::Unknown(raw) => {
                tracing::debug!(op = action.op(), action = %raw, "ignoring unknown action");
                Outcome::Unknown
            }
        };
        match outcome {
            Outcome::Applied => self.stats.applied += 1,
            Outcome::Skipped => self.stats.skipped += 1,
            Outcome::Unknown => self.stats.unknown += 1,
        }
        outcome
    }

    fn push(&mut self, shape: MarkShape, color: Color, window: TimeWindow) -> usize {
        self.marks.push(Mark {
            shape,
            color,
            reveal: window,
            label: None,
            emphasis: Vec::new(),
        });
        self.marks.len() - 1
    }

    fn write_math(&mut self, a: &WriteMath, window: TimeWindow) -> Outcome {
        let text = tex_to_plain(&a.content);
        if text.is_empty() {
            tracing::warn!("WRITE_MATH with empty content");
            return Outcome::Skipped;
        }

        let top_left = match self.last_formula {
            None => self.regions.formula_cursor(self.profile),
            Some(prev) => Point::new(prev.x0, prev.y0 - self.theme.math_line_buff),
        };
        let mut size = Theme::font_units(self.theme.math_font);
        let available = self.regions.solution.x1 - FORMULA_RIGHT_PAD - top_left.x;
        let est = estimate_text_size(&text, size);
        if available > 0.0 && est.x > available {
            size *= available / est.x;
        }

        let shape = MarkShape::Text {
            text,
            anchor: top_left,
            align: TextAlign::TopLeft,
            size,
        };
        self.last_formula = Some(shape.bounds());
        let color = self.theme.math;
        self.push(shape, color, window);
        Outcome::Applied
    }

    fn draw_axes(&mut self, a: &DrawAxes, window: TimeWindow) -> Outcome {
        let fig = self.regions.figure;
        let bounds = Rect::from_center_size(
            fig.center(),
            (fig.width() * AXES_FILL, fig.height() * AXES_FILL),
        );
        let shape = MarkShape::Axes {
            bounds,
            x_range: axis_range(a.params.x_range.as_deref(), "x"),
            y_range: axis_range(a.params.y_range.as_deref(), "y"),
        };
        let color = self.theme.axes;
        self.push(shape, color, window);
        Outcome::Applied
    }

    fn draw_shape(&mut self, a: &DrawShape, window: TimeWindow) -> Outcome {
        if a.targets.is_empty() {
            tracing::warn!("DRAW_SHAPE without targets");
            return Outcome::Skipped;
        }
        let color = resolve_color(a.color.as_deref(), self.theme.drawing);

        if a.is_points() {
            for id in &a.targets {
                let center = self.mapper.point(id);
                let shape = MarkShape::Dot {
                    center,
                    radius: DOT_RADIUS,
                };
                let bounds = shape.bounds();
                let idx = self.push(shape, color, window);
                self.marks[idx].label = Some(id.clone());
                self.registry.register(id.clone(), idx, bounds);
            }
            return Outcome::Applied;
        }

        let shape = MarkShape::Polygon {
            points: self.mapper.points(&a.targets),
        };
        let bounds = shape.bounds();
        let idx = self.push(shape, color, window);
        self.registry.register(canonical_id(&a.targets), idx, bounds);
        Outcome::Applied
    }

    fn draw_line(&mut self, a: &DrawLine, window: TimeWindow) -> Outcome {
        let [p, q, ..] = a.targets.as_slice() else {
            tracing::warn!(targets = ?a.targets, "DRAW_LINE needs two targets");
            return Outcome::Skipped;
        };
        let shape = MarkShape::Segment {
            from: self.mapper.point(p),
            to: self.mapper.point(q),
            dashed: a.is_dashed(),
        };
        let bounds = shape.bounds();
        let color = resolve_color(a.color.as_deref(), self.theme.drawing);
        let idx = self.push(shape, color, window);
        self.registry.register(canonical_id(&[p, q]), idx, bounds);
        Outcome::Applied
    }

    fn add_marker(&mut self, a: &AddMarker, window: TimeWindow) -> Outcome {
        let shape = match (a.style.as_deref(), a.targets.as_slice()) {
            (Some("tick"), [p, q]) => {
                let (a_pt, b_pt) = (self.mapper.point(p), self.mapper.point(q));
                let Some(dir) = unit(b_pt - a_pt) else {
                    tracing::warn!(targets = ?a.targets, "tick on a zero-length segment");
                    return Outcome::Skipped;
                };
                let half = Vec2::new(-dir.y, dir.x) * (TICK_LENGTH / 2.0);
                let mid = a_pt.midpoint(b_pt);
                MarkShape::Tick {
                    from: mid - half,
                    to: mid + half,
                }
            }
            (Some("right_angle"), [p, v, q]) => {
                let vertex = self.mapper.point(v);
                let (Some(u1), Some(u2)) = (
                    unit(self.mapper.point(p) - vertex),
                    unit(self.mapper.point(q) - vertex),
                ) else {
                    tracing::warn!(targets = ?a.targets, "right angle with a zero-length arm");
                    return Outcome::Skipped;
                };
                let (s1, s2) = (u1 * RIGHT_ANGLE_SIDE, u2 * RIGHT_ANGLE_SIDE);
                MarkShape::RightAngle {
                    points: [vertex + s1, vertex + s1 + s2, vertex + s2],
                }
            }
            (style, targets) => {
                tracing::warn!(?style, count = targets.len(), "unsupported ADD_MARKER");
                return Outcome::Skipped;
            }
        };
        let color = self.theme.marker;
        self.push(shape, color, window);
        Outcome::Applied
    }

    fn draw_arc(&mut self, a: &DrawArc, window: TimeWindow) -> Outcome {
        let [c, s, e] = a.targets.as_slice() else {
            tracing::warn!(targets = ?a.targets, "DRAW_ARC needs [center, start, end]");
            return Outcome::Skipped;
        };
        let Some(arc) = arc_through(
            self.mapper.point(c),
            self.mapper.point(s),
            self.mapper.point(e),
        ) else {
            tracing::warn!(targets = ?a.targets, "DRAW_ARC with zero radius");
            return Outcome::Skipped;
        };
        let color = resolve_color(a.color.as_deref(), self.theme.drawing);
        self.push(
            MarkShape::Arc {
                center: arc.center,
                radius: arc.radius,
                start_angle: arc.start_angle,
                sweep: arc.sweep,
            },
            color,
            window,
        );
        Outcome::Applied
    }

    fn highlight(&mut self, a: &Highlight, window: TimeWindow) -> Outcome {
        let mut any = false;
        for target in &a.targets {
            let Some(entry) = self.registry.resolve_highlight(target).copied() else {
                tracing::warn!(id = %target, "HIGHLIGHT target not drawn yet, skipping");
                continue;
            };
            self.marks[entry.mark].emphasis.push(Emphasis {
                window,
                scale: self.profile.highlight_scale(),
                color: self.theme.highlight,
            });
            any = true;
        }
        if any {
            Outcome::Applied
        } else {
            Outcome::Skipped
        }
    }

    fn label_coord(&mut self, a: &LabelCoord, window: TimeWindow) -> Outcome {
        let Some(target) = a.target_id() else {
            tracing::warn!("LABEL_COORD without target");
            return Outcome::Skipped;
        };
        let Some(entry) = self.registry.get(target).copied() else {
            tracing::warn!(id = target, "LABEL_COORD target not drawn yet, skipping");
            return Outcome::Skipped;
        };
        let text = tex_to_plain(&a.text);
        let size = Theme::font_units(self.theme.label_font);
        let est = estimate_text_size(&text, size);
        let b = entry.bounds;
        let c = b.center();
        let anchor = match Direction::parse_or_down(a.direction.as_deref()) {
            Direction::Up => Point::new(c.x, b.y1 + LABEL_BUFF + est.y / 2.0),
            Direction::Down => Point::new(c.x, b.y0 - LABEL_BUFF - est.y / 2.0),
            Direction::Left => Point::new(b.x0 - LABEL_BUFF - est.x / 2.0, c.y),
            Direction::Right => Point::new(b.x1 + LABEL_BUFF + est.x / 2.0, c.y),
        };
        let color = self.theme.math;
        self.push(
            MarkShape::Text {
                text,
                anchor,
                align: TextAlign::Center,
                size,
            },
            color,
            window,
        );
        Outcome::Applied
    }
}

fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len.is_finite() && len > 1e-9).then(|| v / len)
}

fn axis_range(raw: Option<&[f64]>, axis: &str) -> [f64; 3] {
    let Some(raw) = raw else {
        return DEFAULT_AXIS_RANGE;
    };
    let range = match raw {
        [min, max] => [*min, *max, 1.0],
        [min, max, step, ..] => [*min, *max, *step],
        _ => {
            tracing::warn!(axis, ?raw, "axis range needs [min, max(, step)], using default");
            return DEFAULT_AXIS_RANGE;
        }
    };
    let [min, max, step] = range;
    if !(min.is_finite() && max.is_finite() && step.is_finite()) || min >= max || step <= 0.0 {
        tracing::warn!(axis, ?raw, "invalid axis range, using default");
        return DEFAULT_AXIS_RANGE;
    }
    range
}
