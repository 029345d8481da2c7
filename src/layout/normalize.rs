use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::read_json;

/// Point id → `[x, y]` in relative (0..1) units of the source image.
pub type RelativeLayout = BTreeMap<String, [f64; 2]>;

/// Longest side of the logic canvas used by [`NormalizedLayout`].
pub const LOGIC_CANVAS_LONG_SIDE: u32 = 1000;

/// Relative layout packaged with the source image's true aspect ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    /// Source image width divided by height.
    pub aspect_ratio: f64,
    /// Model-estimated relative point coordinates.
    pub relative_layout: RelativeLayout,
}

impl LayoutInfo {
    /// Package `layout` with the aspect ratio of a `width`×`height` image.
    pub fn from_dimensions(layout: RelativeLayout, width: u32, height: u32) -> GeoResult<Self> {
        if width == 0 || height == 0 {
            return Err(GeoError::validation(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self {
            aspect_ratio: f64::from(width) / f64::from(height),
            relative_layout: layout,
        })
    }
}

/// The raw vision-model output file: `{"layout_map": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutMapFile {
    /// Point coordinates in relative units.
    pub layout_map: RelativeLayout,
}

/// Read a vision-model layout file, requiring the `layout_map` key.
pub fn read_layout_map(path: &Path) -> GeoResult<RelativeLayout> {
    let raw: serde_json::Value = read_json(path)?;
    let Some(map) = raw.get("layout_map") else {
        return Err(GeoError::validation(format!(
            "'{}' is missing the 'layout_map' field",
            path.display()
        )));
    };
    let layout: RelativeLayout = serde_json::from_value(map.clone()).map_err(|e| {
        GeoError::serde(format!("invalid 'layout_map' in '{}': {e}", path.display()))
    })?;
    tracing::info!(points = layout.len(), path = %path.display(), "read layout map");
    Ok(layout)
}

/// Read an image's true pixel dimensions from its header.
pub fn image_dimensions(path: &Path) -> GeoResult<(u32, u32)> {
    if !path.exists() {
        return Err(GeoError::input(format!(
            "image '{}' does not exist",
            path.display()
        )));
    }
    image::image_dimensions(path)
        .map_err(|e| GeoError::input(format!("read image header '{}': {e}", path.display())))
}

/// Source-image metadata recorded alongside a [`NormalizedLayout`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Path of the image the layout was estimated from.
    pub source_image: String,
    /// `[width, height]` in pixels.
    pub original_size: [u32; 2],
    /// `[width, height]` of the logic canvas the layout is expressed in.
    pub logic_canvas_size: [u32; 2],
}

/// Layout scaled from relative units onto a logic canvas with the image's proportions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLayout {
    /// Where the layout came from.
    pub meta_info: MetaInfo,
    /// Point coordinates in logic-canvas units.
    pub layout: BTreeMap<String, [f64; 2]>,
}

/// Logic canvas with the image's proportions and a longest side of 1000.
pub fn logic_canvas_size(width: u32, height: u32) -> GeoResult<[u32; 2]> {
    if width == 0 || height == 0 {
        return Err(GeoError::validation(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    let long = f64::from(LOGIC_CANVAS_LONG_SIDE);
    let short = |a: u32, b: u32| ((long * f64::from(a) / f64::from(b)).round() as u32).max(1);
    Ok(if width >= height {
        [LOGIC_CANVAS_LONG_SIDE, short(height, width)]
    } else {
        [short(width, height), LOGIC_CANVAS_LONG_SIDE]
    })
}

/// Project a relative layout onto the logic canvas of a `width`×`height` image.
#[tracing::instrument(skip(layout))]
pub fn normalize_to_logic_canvas(
    layout: &RelativeLayout,
    source_image: &str,
    width: u32,
    height: u32,
) -> GeoResult<NormalizedLayout> {
    let [cw, ch] = logic_canvas_size(width, height)?;
    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    let projected = layout
        .iter()
        .map(|(id, [x, y])| {
            (
                id.clone(),
                [round2(x * f64::from(cw)), round2(y * f64::from(ch))],
            )
        })
        .collect();

    Ok(NormalizedLayout {
        meta_info: MetaInfo {
            source_image: source_image.to_owned(),
            original_size: [width, height],
            logic_canvas_size: [cw, ch],
        },
        layout: projected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::json::write_json_pretty;

    fn triangle() -> RelativeLayout {
        RelativeLayout::from([
            ("A".to_owned(), [0.2, 0.2]),
            ("B".to_owned(), [0.8, 0.2]),
            ("C".to_owned(), [0.5, 0.8]),
        ])
    }

    #[test]
    fn aspect_ratio_is_width_over_height() {
        let info = LayoutInfo::from_dimensions(triangle(), 1000, 500).unwrap();
        assert_eq!(info.aspect_ratio, 2.0);
        assert_eq!(info.relative_layout, triangle());
    }

    #[test]
    fn zero_height_is_fatal() {
        assert!(matches!(
            LayoutInfo::from_dimensions(triangle(), 1000, 0),
            Err(GeoError::Validation(_))
        ));
    }

    #[test]
    fn logic_canvas_keeps_proportions() {
        assert_eq!(logic_canvas_size(1000, 500).unwrap(), [1000, 500]);
        assert_eq!(logic_canvas_size(600, 800).unwrap(), [750, 1000]);
        assert_eq!(logic_canvas_size(1920, 1080).unwrap(), [1000, 563]);
        assert!(logic_canvas_size(0, 10).is_err());
    }

    #[test]
    fn normalized_layout_scales_points() {
        let n = normalize_to_logic_canvas(&triangle(), "input/problem.jpg", 1000, 500).unwrap();
        assert_eq!(n.meta_info.original_size, [1000, 500]);
        assert_eq!(n.meta_info.logic_canvas_size, [1000, 500]);
        assert_eq!(n.layout["C"], [500.0, 400.0]);
    }

    #[test]
    fn layout_map_key_is_required() {
        let dir = Path::new("target/normalize_tests");
        let good = dir.join("good.json");
        write_json_pretty(&good, &serde_json::json!({"layout_map": {"A": [0.1, 0.9]}})).unwrap();
        assert_eq!(read_layout_map(&good).unwrap()["A"], [0.1, 0.9]);

        let bad = dir.join("bad.json");
        write_json_pretty(&bad, &serde_json::json!({"points": {}})).unwrap();
        assert!(matches!(read_layout_map(&bad), Err(GeoError::Validation(_))));
    }

    #[test]
    fn missing_image_is_an_input_error() {
        assert!(matches!(
            image_dimensions(Path::new("target/normalize_tests/none.jpg")),
            Err(GeoError::Input(_))
        ));
    }
}
