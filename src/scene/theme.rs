use serde::{Deserialize, Serialize};

use crate::assets::color::Color;
use crate::foundation::core::Vec2;
use crate::foundation::error::{GeoError, GeoResult};

/// Scene units per font-size point: a 72pt line is one unit tall.
pub const UNITS_PER_FONT_POINT: f64 = 1.0 / 72.0;

/// Colors, region proportions and font sizes shared by every rendered lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Theme {
    /// Frame background.
    pub background: Color,
    /// Header and label text.
    pub text_main: Color,
    /// Formula text.
    pub math: Color,
    /// Default stroke/fill color for figure marks.
    pub drawing: Color,
    /// Tint applied by `HIGHLIGHT`.
    pub highlight: Color,
    /// Tick and right-angle markers.
    pub marker: Color,
    /// Subtitle text.
    pub subtitle: Color,
    /// Decorative axes.
    pub axes: Color,

    /// Header height as a fraction of the frame height.
    pub header_ratio: f64,
    /// Footer height as a fraction of the frame height.
    pub footer_ratio: f64,
    /// Solution column width as a fraction of the frame width.
    pub split_ratio: f64,

    /// Header font size in points.
    pub header_font: f64,
    /// Formula font size in points.
    pub math_font: f64,
    /// Subtitle font size in points.
    pub subtitle_font: f64,
    /// Coordinate label font size in points.
    pub label_font: f64,

    /// Vertical gap between consecutive formula lines, in scene units.
    pub math_line_buff: f64,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::rgb(0xF0, 0xF2, 0xF5),
            text_main: Color::rgb(0x2C, 0x3E, 0x50),
            math: Color::rgb(0x00, 0x00, 0x00),
            drawing: Color::rgb(0xE7, 0x4C, 0x3C),
            highlight: Color::rgb(0xF1, 0xC4, 0x0F),
            marker: Color::rgb(0x29, 0x80, 0xB9),
            subtitle: Color::BLACK,
            axes: Color::rgb(0x88, 0x88, 0x88),
            header_ratio: 0.15,
            footer_ratio: 0.10,
            split_ratio: 0.45,
            header_font: 24.0,
            math_font: 28.0,
            subtitle_font: 24.0,
            label_font: 30.0,
            math_line_buff: 0.5,
        }
    }
}

impl Theme {
    /// Reject proportions that leave no room for the body regions.
    pub fn validate(&self) -> GeoResult<()> {
        let ratio_ok = |r: f64| r.is_finite() && (0.0..1.0).contains(&r);
        if !ratio_ok(self.header_ratio) || !ratio_ok(self.footer_ratio) {
            return Err(GeoError::validation(
                "theme header/footer ratios must be in [0, 1)",
            ));
        }
        if self.header_ratio + self.footer_ratio >= 1.0 {
            return Err(GeoError::validation(
                "theme header and footer must leave room for the body",
            ));
        }
        if !(self.split_ratio.is_finite() && self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(GeoError::validation("theme split_ratio must be in (0, 1)"));
        }
        for (name, size) in [
            ("header_font", self.header_font),
            ("math_font", self.math_font),
            ("subtitle_font", self.subtitle_font),
            ("label_font", self.label_font),
        ] {
            if !(size.is_finite() && size > 0.0) {
                return Err(GeoError::validation(format!(
                    "theme {name} must be finite and > 0"
                )));
            }
        }
        if !(self.math_line_buff.is_finite() && self.math_line_buff >= 0.0) {
            return Err(GeoError::validation(
                "theme math_line_buff must be finite and >= 0",
            ));
        }
        Ok(())
    }

    /// Convert a font size in points into scene units.
    pub fn font_units(size_pt: f64) -> f64 {
        size_pt * UNITS_PER_FONT_POINT
    }
}

/// The two historical lesson styles.
///
/// `Classic` targets Chinese narration with a roomier figure; `Compact` targets English
/// narration with a tighter figure and a stronger highlight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderProfile {
    #[default]
    Classic,
    Compact,
}

impl RenderProfile {
    /// Fraction of the figure viewport the fitted layout may occupy.
    pub fn figure_margin(self) -> f64 {
        match self {
            Self::Classic => 0.8,
            Self::Compact => 0.7,
        }
    }

    /// Header characters kept before appending `...`.
    pub fn header_max_chars(self) -> usize {
        match self {
            Self::Classic => 50,
            Self::Compact => 45,
        }
    }

    /// Offset of the formula cursor from the solution region's top-left corner.
    pub fn cursor_inset(self) -> Vec2 {
        match self {
            Self::Classic => Vec2::new(0.5, 0.5),
            Self::Compact => Vec2::new(0.5, 0.8),
        }
    }

    /// Default narration language passed to the speech command.
    pub fn lang(self) -> &'static str {
        match self {
            Self::Classic => "zh-cn",
            Self::Compact => "en",
        }
    }

    /// Seconds of narration per character when estimating.
    pub fn secs_per_char(self) -> f64 {
        match self {
            Self::Classic => 0.28,
            Self::Compact => 0.1,
        }
    }

    /// Scale factor reached at the peak of a highlight.
    pub fn highlight_scale(self) -> f64 {
        match self {
            Self::Classic => 1.2,
            Self::Compact => 1.5,
        }
    }
}

impl std::str::FromStr for RenderProfile {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "compact" => Ok(Self::Compact),
            other => Err(GeoError::validation(format!(
                "unknown render profile '{other}' (expected classic or compact)"
            ))),
        }
    }
}
