use std::path::Path;
use std::sync::Arc;

use crate::foundation::error::{GeoError, GeoResult};

/// Family names tried, in order, when no font file is configured.
const PREFERRED_SYSTEM_FAMILIES: &[&str] = &["Arial", "Helvetica", "DejaVu Sans", "Noto Sans"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl From<crate::assets::color::Color> for TextBrushRgba8 {
    fn from(c: crate::assets::color::Color) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Raw bytes of a scalable (TTF/OTF) font plus where they came from.
#[derive(Clone, Debug)]
pub struct FontBytes {
    /// Human-readable origin (file path or system family).
    pub origin: String,
    /// Font file contents.
    pub bytes: Arc<Vec<u8>>,
}

impl FontBytes {
    /// Read a font file from disk.
    pub fn from_path(path: &Path) -> GeoResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GeoError::input(format!("failed to read font '{}': {e}", path.display()))
        })?;
        Ok(Self {
            origin: path.display().to_string(),
            bytes: Arc::new(bytes),
        })
    }

    /// Look up a sans-serif face among installed system fonts.
    pub fn from_system() -> Option<Self> {
        use usvg::fontdb::{Database, Family, Query};

        let mut db = Database::new();
        db.load_system_fonts();

        let id = PREFERRED_SYSTEM_FAMILIES
            .iter()
            .find_map(|name| {
                db.query(&Query {
                    families: &[Family::Name(*name)],
                    ..Query::default()
                })
            })
            .or_else(|| {
                db.query(&Query {
                    families: &[Family::SansSerif],
                    ..Query::default()
                })
            })
            .or_else(|| db.faces().next().map(|f| f.id))?;

        let origin = db
            .face(id)
            .and_then(|f| f.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| "system font".to_owned());
        let bytes = db.with_face_data(id, |data, _index| data.to_vec())?;
        Some(Self {
            origin,
            bytes: Arc::new(bytes),
        })
    }
}

/// Resolve the font used for all rendered text.
///
/// An explicit path wins; an unreadable explicit path is reported and then treated like an
/// absent one. Returns `None` when no scalable font can be found at all.
pub fn resolve_font(explicit: Option<&Path>) -> Option<FontBytes> {
    if let Some(path) = explicit {
        match FontBytes::from_path(path) {
            Ok(f) => return Some(f),
            Err(e) => tracing::warn!(error = %e, "configured font unusable, trying system fonts"),
        }
    }
    let found = FontBytes::from_system();
    match &found {
        Some(f) => tracing::debug!(origin = %f.origin, "using system font"),
        None => tracing::warn!("no scalable font available"),
    }
    found
}

/// Stateful helper for building Parley text layouts from one registered font.
pub(crate) struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font_data: vello_cpu::peniko::FontData,
}

impl TextLayoutEngine {
    /// Register `font` and prepare fresh Parley contexts.
    pub(crate) fn new(font: &FontBytes) -> GeoResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(font.bytes.as_ref().clone()),
            None,
        );
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            GeoError::validation(format!("no font families registered from '{}'", font.origin))
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| GeoError::validation("registered font family has no name"))?
            .to_string();

        let font_data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
            0,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font_data,
        })
    }

    pub(crate) fn font_data(&self) -> &vello_cpu::peniko::FontData {
        &self.font_data
    }

    /// Shape and lay out plain text, optionally wrapping at `max_width_px`.
    pub(crate) fn layout_plain(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: Option<f32>,
    ) -> GeoResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(GeoError::validation("text size_px must be finite and > 0"));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        if let Some(w) = max_width_px {
            layout.break_all_lines(Some(w));
            layout.align(
                Some(w),
                parley::Alignment::Start,
                parley::AlignmentOptions::default(),
            );
        } else {
            layout.break_all_lines(None);
        }

        Ok(layout)
    }
}

/// Draw every glyph run of `layout` with its top-left corner at the current transform origin.
///
/// `tint` replaces the brush each run was laid out with.
pub(crate) fn fill_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    tint: Option<crate::assets::color::Color>,
) {
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = tint.map_or(run.style().brush, TextBrushRgba8::from);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}
