use std::collections::HashMap;
use std::collections::hash_map::Entry;

use vello_cpu::kurbo::Shape as _;

use crate::assets::color::Color;
use crate::assets::fonts::{FontBytes, TextBrushRgba8, TextLayoutEngine, fill_layout};
use crate::foundation::core::{Affine, Canvas, Point, Rect, Vec2};
use crate::foundation::error::{GeoError, GeoResult};
use crate::player::storyboard::{Mark, MarkShape, Storyboard, TextAlign};
use crate::render::frame::FrameRGBA;
use crate::scene::regions::{SceneRegions, frame_width, pixels_per_unit, scene_to_pixels};
use crate::scene::theme::Theme;

/// Outline width of drawn figures, in scene units.
pub const STROKE_WIDTH: f64 = 0.04;
const AXES_STROKE_WIDTH: f64 = 0.02;
/// Dash and gap length of dashed segments, in scene units.
const DASH_PATTERN: [f64; 2] = [0.15, 0.1];
const AXIS_TICK: f64 = 0.12;
const MAX_AXIS_TICKS: usize = 200;
const ARC_SEGMENTS_PER_RADIAN: f64 = 24.0;
/// Gap between a point dot and its name.
const LABEL_GAP: f64 = 0.1;
const HEADER_WRAP: f64 = 0.95;
const SUBTITLE_WRAP: f64 = 0.9;
const TEXT_CACHE_LIMIT: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    size_bits: u32,
    wrap_bits: Option<u32>,
}

/// Text shaping state plus laid-out strings keyed by content and size.
struct TextCache {
    engine: TextLayoutEngine,
    layouts: HashMap<TextKey, parley::Layout<TextBrushRgba8>>,
}

impl TextCache {
    fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        wrap_px: Option<f32>,
    ) -> GeoResult<(
        &parley::Layout<TextBrushRgba8>,
        &vello_cpu::peniko::FontData,
    )> {
        let key = TextKey {
            text: text.to_owned(),
            size_bits: size_px.to_bits(),
            wrap_bits: wrap_px.map(f32::to_bits),
        };
        if self.layouts.len() >= TEXT_CACHE_LIMIT && !self.layouts.contains_key(&key) {
            self.layouts.clear();
        }
        let layout = match self.layouts.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(self.engine.layout_plain(
                text,
                size_px,
                TextBrushRgba8::default(),
                wrap_px,
            )?),
        };
        Ok((layout, self.engine.font_data()))
    }
}

/// How a piece of text is placed, tinted and faded.
struct TextDraw<'a> {
    text: &'a str,
    anchor: Point,
    align: TextAlign,
    size: f64,
    color: Color,
    opacity: f64,
    wrap: Option<f64>,
}

/// Draws storyboards into RGBA frames with `vello_cpu`.
///
/// One renderer serves every frame of a video; its raster context and text layouts are
/// reused between calls. Without a usable font, text is skipped and shapes still draw.
pub struct FrameRenderer {
    canvas: Canvas,
    width: u16,
    height: u16,
    theme: Theme,
    regions: SceneRegions,
    to_px: Affine,
    px_per_unit: f64,
    text: Option<TextCache>,
    ctx: Option<vello_cpu::RenderContext>,
}

impl FrameRenderer {
    pub fn new(canvas: Canvas, theme: Theme, font: Option<&FontBytes>) -> GeoResult<Self> {
        canvas.validate()?;
        theme.validate()?;
        let width = u16::try_from(canvas.width)
            .map_err(|_| GeoError::validation("canvas width exceeds u16"))?;
        let height = u16::try_from(canvas.height)
            .map_err(|_| GeoError::validation("canvas height exceeds u16"))?;

        let text = match font.map(TextLayoutEngine::new) {
            Some(Ok(engine)) => Some(TextCache {
                engine,
                layouts: HashMap::new(),
            }),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "font unusable, text will not be drawn");
                None
            }
            None => {
                tracing::warn!("no font available, text will not be drawn");
                None
            }
        };

        Ok(Self {
            canvas,
            width,
            height,
            regions: SceneRegions::new(canvas, &theme),
            theme,
            to_px: scene_to_pixels(canvas),
            px_per_unit: pixels_per_unit(canvas),
            text,
            ctx: None,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Whether text (header, subtitles, formulas, labels) can be drawn.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Draw `storyboard` as it looks `t` seconds in.
    pub fn render(&mut self, storyboard: &Storyboard, t: f64) -> GeoResult<FrameRGBA> {
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.with_ctx(|this, ctx| {
            this.draw_background(ctx);
            this.draw_header(ctx, &storyboard.header)?;
            for mark in &storyboard.marks {
                this.draw_mark(ctx, mark, t)?;
            }
            if let Some(step) = storyboard.step_at(t) {
                this.draw_subtitle(ctx, &step.subtitle)?;
            }
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;
        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn with_ctx<R>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> GeoResult<R>,
    ) -> GeoResult<R> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => vello_cpu::RenderContext::new(self.width, self.height),
        };
        ctx.reset();
        let out = f(self, &mut ctx);
        self.ctx = Some(ctx);
        out
    }

    fn draw_background(&self, ctx: &mut vello_cpu::RenderContext) {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(self.theme.background.to_cpu());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));
    }

    fn draw_header(&mut self, ctx: &mut vello_cpu::RenderContext, header: &str) -> GeoResult<()> {
        if header.is_empty() {
            return Ok(());
        }
        let draw = TextDraw {
            text: header,
            anchor: self.regions.header.center(),
            align: TextAlign::Center,
            size: Theme::font_units(self.theme.header_font),
            color: self.theme.text_main,
            opacity: 1.0,
            wrap: Some(frame_width(self.canvas) * HEADER_WRAP),
        };
        self.draw_text(ctx, &draw, Affine::IDENTITY)
    }

    fn draw_subtitle(&mut self, ctx: &mut vello_cpu::RenderContext, text: &str) -> GeoResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let draw = TextDraw {
            text,
            anchor: self.regions.footer.center(),
            align: TextAlign::Center,
            size: Theme::font_units(self.theme.subtitle_font),
            color: self.theme.subtitle,
            opacity: 1.0,
            wrap: Some(frame_width(self.canvas) * SUBTITLE_WRAP),
        };
        self.draw_text(ctx, &draw, Affine::IDENTITY)
    }

    fn draw_mark(&mut self, ctx: &mut vello_cpu::RenderContext, mark: &Mark, t: f64) -> GeoResult<()> {
        if t < mark.reveal.start {
            return Ok(());
        }
        let p = mark.reveal.progress(t);
        let (scale, color) = emphasis_at(mark, t);
        let pulse = if scale == 1.0 {
            Affine::IDENTITY
        } else {
            let c = (self.to_px * mark.shape.bounds().center()).to_vec2();
            Affine::translate(c) * Affine::scale(scale) * Affine::translate(-c)
        };
        let map = pulse * self.to_px;
        let stroke = STROKE_WIDTH * self.px_per_unit;

        match &mark.shape {
            MarkShape::Dot { center, radius } => {
                let c = map * *center;
                let r = radius * self.px_per_unit * scale * p;
                if r > 0.0 {
                    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                    ctx.set_paint(color.to_cpu());
                    ctx.fill_path(&vello_cpu::kurbo::Circle::new(cpu_point(c), r).to_path(0.1));
                }
                if let Some(label) = mark.label.as_deref() {
                    let size = Theme::font_units(self.theme.label_font);
                    let draw = TextDraw {
                        text: label,
                        anchor: *center + Vec2::new(0.0, radius + LABEL_GAP + size * 0.5),
                        align: TextAlign::Center,
                        size,
                        color: self.theme.text_main,
                        opacity: p,
                        wrap: None,
                    };
                    self.draw_text(ctx, &draw, pulse)?;
                }
            }
            MarkShape::Polygon { points } => {
                let mut closed: Vec<Point> = points.iter().map(|pt| map * *pt).collect();
                if let Some(first) = closed.first().copied() {
                    closed.push(first);
                }
                stroke_polyline(ctx, &partial_polyline(&closed, p), stroke, color, None);
            }
            MarkShape::Segment { from, to, dashed } => {
                let dash = dashed.then(|| DASH_PATTERN.map(|d| d * self.px_per_unit));
                let pts = partial_polyline(&[map * *from, map * *to], p);
                stroke_polyline(ctx, &pts, stroke, color, dash);
            }
            MarkShape::Tick { from, to } => {
                let pts = partial_polyline(&[map * *from, map * *to], p);
                stroke_polyline(ctx, &pts, stroke, color, None);
            }
            MarkShape::RightAngle { points } => {
                let pts: Vec<Point> = points.iter().map(|pt| map * *pt).collect();
                stroke_polyline(ctx, &partial_polyline(&pts, p), stroke, color, None);
            }
            MarkShape::Arc {
                center,
                radius,
                start_angle,
                sweep,
            } => {
                let pts: Vec<Point> = arc_points(*center, *radius, *start_angle, sweep * p)
                    .into_iter()
                    .map(|pt| map * pt)
                    .collect();
                stroke_polyline(ctx, &pts, stroke, color, None);
            }
            MarkShape::Axes {
                bounds,
                x_range,
                y_range,
            } => {
                self.draw_axes(ctx, map, *bounds, *x_range, *y_range, color, p);
            }
            MarkShape::Text {
                text,
                anchor,
                align,
                size,
            } => {
                let draw = TextDraw {
                    text,
                    anchor: *anchor,
                    align: *align,
                    size: *size,
                    color,
                    opacity: p,
                    wrap: None,
                };
                self.draw_text(ctx, &draw, pulse)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_axes(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        map: Affine,
        bounds: Rect,
        x_range: [f64; 3],
        y_range: [f64; 3],
        color: Color,
        p: f64,
    ) {
        let to_x = |v: f64| bounds.x0 + (v - x_range[0]) / (x_range[1] - x_range[0]) * bounds.width();
        let to_y = |v: f64| bounds.y0 + (v - y_range[0]) / (y_range[1] - y_range[0]) * bounds.height();
        let axis_y = to_y(0.0_f64.clamp(y_range[0], y_range[1]));
        let axis_x = to_x(0.0_f64.clamp(x_range[0], x_range[1]));
        let width = AXES_STROKE_WIDTH * self.px_per_unit;

        let x_axis = [Point::new(bounds.x0, axis_y), Point::new(bounds.x1, axis_y)];
        let y_axis = [Point::new(axis_x, bounds.y0), Point::new(axis_x, bounds.y1)];
        for axis in [x_axis, y_axis] {
            let pts = partial_polyline(&[map * axis[0], map * axis[1]], p);
            stroke_polyline(ctx, &pts, width, color, None);
        }

        let half = AXIS_TICK / 2.0;
        for v in tick_values(x_range) {
            if (v - x_range[0]) / (x_range[1] - x_range[0]) > p {
                break;
            }
            let x = to_x(v);
            let pts = [map * Point::new(x, axis_y - half), map * Point::new(x, axis_y + half)];
            stroke_polyline(ctx, &pts, width, color, None);
        }
        for v in tick_values(y_range) {
            if (v - y_range[0]) / (y_range[1] - y_range[0]) > p {
                break;
            }
            let y = to_y(v);
            let pts = [map * Point::new(axis_x - half, y), map * Point::new(axis_x + half, y)];
            stroke_polyline(ctx, &pts, width, color, None);
        }
    }

    /// Lay out and fill text; `pulse` is applied in pixel space on top of the placement.
    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        draw: &TextDraw<'_>,
        pulse: Affine,
    ) -> GeoResult<()> {
        if draw.opacity <= 0.0 || draw.text.is_empty() {
            return Ok(());
        }
        let anchor = self.to_px * draw.anchor;
        let size_px = (draw.size * self.px_per_unit) as f32;
        let wrap_px = draw.wrap.map(|w| (w * self.px_per_unit) as f32);
        let Some(text) = self.text.as_mut() else {
            return Ok(());
        };
        let (layout, font) = text.layout(draw.text, size_px, wrap_px)?;

        let top_left = match draw.align {
            TextAlign::TopLeft => anchor,
            TextAlign::Center => {
                anchor - Vec2::new(f64::from(layout.width()), f64::from(layout.height())) / 2.0
            }
        };
        let transform = pulse * Affine::translate(top_left.to_vec2());
        ctx.set_transform(vello_cpu::kurbo::Affine::new(transform.as_coeffs()));
        let faded = draw.opacity < 1.0;
        if faded {
            ctx.push_opacity_layer(draw.opacity as f32);
        }
        fill_layout(ctx, layout, font, Some(draw.color));
        if faded {
            ctx.pop_layer();
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }
}

/// Scale and tint of `mark` at `t`; the last active emphasis wins.
fn emphasis_at(mark: &Mark, t: f64) -> (f64, Color) {
    mark.emphasis
        .iter()
        .filter(|e| e.window.contains(t))
        .fold((1.0, mark.color), |_, e| {
            let k = there_and_back(e.window.progress(t));
            (1.0 + (e.scale - 1.0) * k, mark.color.lerp(e.color, k))
        })
}

/// 0 → 1 → 0 over `x ∈ [0, 1]`, eased at both ends.
fn there_and_back(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    let y = if x < 0.5 { 2.0 * x } else { 2.0 - 2.0 * x };
    y * y * (3.0 - 2.0 * y)
}

/// The leading `fraction` of a polyline, measured by length.
fn partial_polyline(points: &[Point], fraction: f64) -> Vec<Point> {
    if fraction >= 1.0 || points.len() < 2 {
        return points.to_vec();
    }
    if fraction <= 0.0 {
        return points[..1].to_vec();
    }
    let total: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    let mut left = total * fraction;
    let mut out = vec![points[0]];
    for w in points.windows(2) {
        let len = w[0].distance(w[1]);
        if left >= len {
            out.push(w[1]);
            left -= len;
            continue;
        }
        if len > 0.0 {
            out.push(w[0].lerp(w[1], left / len));
        }
        break;
    }
    out
}

fn arc_points(center: Point, radius: f64, start: f64, sweep: f64) -> Vec<Point> {
    let n = ((sweep.abs() * ARC_SEGMENTS_PER_RADIAN).ceil() as usize).max(1);
    (0..=n)
        .map(|i| {
            let a = start + sweep * (i as f64 / n as f64);
            center + Vec2::new(a.cos(), a.sin()) * radius
        })
        .collect()
}

fn tick_values(range: [f64; 3]) -> impl Iterator<Item = f64> {
    let [min, max, step] = range;
    let first = (min / step).ceil();
    (0..MAX_AXIS_TICKS)
        .map(move |i| (first + i as f64) * step)
        .take_while(move |v| *v <= max + 1e-9)
}

fn cpu_point(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

/// Stroke a pixel-space polyline.
fn stroke_polyline(
    ctx: &mut vello_cpu::RenderContext,
    points: &[Point],
    width: f64,
    color: Color,
    dash: Option<[f64; 2]>,
) {
    let [first, rest @ ..] = points else {
        return;
    };
    if rest.is_empty() {
        return;
    }
    let mut path = vello_cpu::kurbo::BezPath::new();
    path.move_to(cpu_point(*first));
    for p in rest {
        path.line_to(cpu_point(*p));
    }

    let mut stroke = vello_cpu::kurbo::Stroke::new(width)
        .with_caps(vello_cpu::kurbo::Cap::Round)
        .with_join(vello_cpu::kurbo::Join::Round);
    if let Some(pattern) = dash {
        stroke = stroke.with_caps(vello_cpu::kurbo::Cap::Butt).with_dashes(0.0, pattern);
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(color.to_cpu());
    ctx.set_stroke(stroke);
    ctx.stroke_path(&path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fit::FigureTransform;
    use crate::layout::normalize::LayoutInfo;
    use crate::player::storyboard::{Emphasis, PlayStats, StepTiming, TimeWindow};

    fn storyboard(marks: Vec<Mark>) -> Storyboard {
        let info = LayoutInfo {
            aspect_ratio: 1.0,
            relative_layout: Default::default(),
        };
        Storyboard {
            header: String::new(),
            duration_secs: 3.0,
            steps: vec![StepTiming {
                index: 0,
                window: TimeWindow::new(0.0, 3.0),
                narration_secs: 3.0,
                subtitle: String::new(),
                audio: None,
            }],
            marks,
            registered: Vec::new(),
            figure: FigureTransform::fit(&info, Rect::new(0.0, -3.0, 7.0, 3.0), 0.8),
            stats: PlayStats::default(),
        }
    }

    fn renderer() -> FrameRenderer {
        let canvas = Canvas {
            width: 640,
            height: 360,
        };
        FrameRenderer::new(canvas, Theme::default(), None).unwrap()
    }

    fn segment_mark(reveal: TimeWindow) -> Mark {
        Mark {
            shape: MarkShape::Segment {
                from: Point::new(2.0, 0.0),
                to: Point::new(6.0, 0.0),
                dashed: false,
            },
            color: Color::rgb(255, 0, 0),
            reveal,
            label: None,
            emphasis: Vec::new(),
        }
    }

    #[test]
    fn empty_storyboard_is_all_background() {
        let mut r = renderer();
        let frame = r.render(&storyboard(Vec::new()), 0.0).unwrap();
        assert_eq!((frame.width, frame.height), (640, 360));
        assert_eq!(frame.data.len(), 640 * 360 * 4);
        let bg = Theme::default().background;
        assert_eq!(frame.pixel(0, 0), Some([bg.r, bg.g, bg.b, 255]));
        assert_eq!(frame.pixel(639, 359), Some([bg.r, bg.g, bg.b, 255]));
    }

    #[test]
    fn marks_appear_only_once_revealed() {
        let mut r = renderer();
        let sb = storyboard(vec![segment_mark(TimeWindow::new(1.0, 2.0))]);
        let bg = Theme::default().background;
        let bg_px = Some([bg.r, bg.g, bg.b, 255]);
        // Scene (4, 0) → pixel (320 + 4·45, 180).
        let (x, y) = (500, 180);

        let before = r.render(&sb, 0.5).unwrap();
        assert_eq!(before.pixel(x, y), bg_px);
        assert_eq!(before.pixel(x, y - 1), bg_px);

        let after = r.render(&sb, 2.5).unwrap();
        assert!(after.pixel(x, y) != bg_px || after.pixel(x, y - 1) != bg_px);
    }

    #[test]
    fn partial_reveal_draws_the_leading_part() {
        let mut r = renderer();
        let sb = storyboard(vec![segment_mark(TimeWindow::new(0.0, 2.0))]);
        let bg = Theme::default().background;
        let bg_px = Some([bg.r, bg.g, bg.b, 255]);
        let half = r.render(&sb, 1.0).unwrap();
        let touched = |f: &FrameRGBA, x: u32| f.pixel(x, 180) != bg_px || f.pixel(x, 179) != bg_px;
        // Start at scene x=2 (pixel 410), end at x=6 (pixel 590); midpoint 500.
        assert!(touched(&half, 430));
        assert!(!touched(&half, 570));
    }

    #[test]
    fn there_and_back_peaks_mid_window() {
        assert_eq!(there_and_back(0.0), 0.0);
        assert_eq!(there_and_back(0.5), 1.0);
        assert_eq!(there_and_back(1.0), 0.0);
        assert!(there_and_back(0.25) > 0.0 && there_and_back(0.25) < 1.0);
    }

    #[test]
    fn emphasis_scales_and_tints_only_inside_its_window() {
        let mut mark = segment_mark(TimeWindow::new(0.0, 1.0));
        mark.emphasis.push(Emphasis {
            window: TimeWindow::new(2.0, 4.0),
            scale: 1.5,
            color: Color::rgb(255, 255, 0),
        });
        assert_eq!(emphasis_at(&mark, 1.0), (1.0, mark.color));
        let (s, c) = emphasis_at(&mark, 3.0);
        assert_eq!(s, 1.5);
        assert_eq!(c, Color::rgb(255, 255, 0));
        assert_eq!(emphasis_at(&mark, 4.0).0, 1.0);
    }

    #[test]
    fn partial_polyline_cuts_by_length() {
        let pts = [Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(2.0, 2.0)];
        assert_eq!(partial_polyline(&pts, 1.0), pts.to_vec());
        assert_eq!(
            partial_polyline(&pts, 0.25),
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]
        );
        assert_eq!(
            partial_polyline(&pts, 0.75),
            vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(2.0, 1.0)]
        );
        assert_eq!(partial_polyline(&pts, 0.0), vec![Point::new(0.0, 0.0)]);
    }

    #[test]
    fn ticks_cover_the_range() {
        let v: Vec<f64> = tick_values([-2.0, 2.0, 1.0]).collect();
        assert_eq!(v, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(tick_values([0.5, 0.9, 1.0]).count(), 0);
    }

    #[test]
    fn arcs_end_where_the_sweep_ends() {
        let pts = arc_points(Point::ORIGIN, 1.0, 0.0, std::f64::consts::FRAC_PI_2);
        let last = pts.last().copied().unwrap();
        assert!((last.x).abs() < 1e-9 && (last.y - 1.0).abs() < 1e-9);
    }
}
