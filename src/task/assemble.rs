use std::path::Path;

use serde_json::{Value, json};

use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::read_json;
use crate::layout::normalize::image_dimensions;
use crate::task::model::RenderTask;

/// Source dimensions assumed when the problem image cannot be found (16:9).
pub const FALLBACK_IMAGE_SIZE: (u32, u32) = (1920, 1080);

/// Files merged into a render task.
#[derive(Clone, Copy, Debug)]
pub struct AssembleInputs<'a> {
    /// Problem metadata (any JSON object).
    pub meta: &'a Path,
    /// Vision-model output with a top-level `layout_map`.
    pub layout: &'a Path,
    /// Narration document with a top-level `timeline` array.
    pub timeline: &'a Path,
    /// Problem image, used only for its aspect ratio.
    pub image: Option<&'a Path>,
}

/// Pixel size of the problem image, or [`FALLBACK_IMAGE_SIZE`] when it does not exist.
pub fn source_dimensions(image: Option<&Path>) -> GeoResult<(u32, u32)> {
    match image {
        Some(path) if path.exists() => image_dimensions(path),
        Some(path) => {
            tracing::warn!(
                image = %path.display(),
                "problem image not found, assuming 16:9 (1920x1080)"
            );
            Ok(FALLBACK_IMAGE_SIZE)
        }
        None => {
            tracing::warn!("no problem image given, assuming 16:9 (1920x1080)");
            Ok(FALLBACK_IMAGE_SIZE)
        }
    }
}

/// Merge the three inputs into one render-task document.
///
/// Values are nested as-is, so unknown fields and unknown actions survive. The result is
/// checked to parse as a [`RenderTask`] before it is returned.
pub fn assemble_values(
    meta: Value,
    layout_doc: &Value,
    timeline_doc: &Value,
    (width, height): (u32, u32),
) -> GeoResult<Value> {
    if width == 0 || height == 0 {
        return Err(GeoError::validation(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    let layout_map = layout_doc
        .get("layout_map")
        .ok_or_else(|| GeoError::validation("layout document is missing 'layout_map'"))?;
    let timeline = timeline_doc
        .get("timeline")
        .ok_or_else(|| GeoError::validation("timeline document is missing 'timeline'"))?;

    let doc = json!({
        "meta": meta,
        "layout_info": {
            "aspect_ratio": f64::from(width) / f64::from(height),
            "relative_layout": layout_map,
        },
        "timeline": timeline,
    });

    serde_json::from_value::<RenderTask>(doc.clone())
        .map_err(|e| GeoError::validation(format!("assembled render task is invalid: {e}")))?;
    Ok(doc)
}

/// Read the inputs from disk and assemble them.
#[tracing::instrument(skip_all, fields(meta = %inputs.meta.display()))]
pub fn assemble_files(inputs: AssembleInputs<'_>) -> GeoResult<Value> {
    let meta: Value = read_json(inputs.meta)?;
    let layout: Value = read_json(inputs.layout)?;
    let timeline: Value = read_json(inputs.timeline)?;
    let dims = source_dimensions(inputs.image)?;
    let doc = assemble_values(meta, &layout, &timeline, dims)?;
    tracing::info!(
        width = dims.0,
        height = dims.1,
        steps = doc["timeline"].as_array().map_or(0, Vec::len),
        "assembled render task"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::Action;

    fn layout() -> Value {
        json!({"layout_map": {"A": [0.2, 0.2], "B": [0.8, 0.2], "C": [0.5, 0.8]}})
    }

    fn timeline() -> Value {
        json!({"timeline": [
            {"voice": "Draw the triangle.", "actions": [
                {"op": "DRAW_SHAPE", "type": "poly", "targets": ["A", "B", "C"], "extra": 1},
                {"op": "SPARKLE"}
            ]}
        ]})
    }

    #[test]
    fn merge_keeps_inputs_verbatim() {
        let meta = json!({"problem_text": "Find angle C", "source": {"book": 2}});
        let doc = assemble_values(meta.clone(), &layout(), &timeline(), (1000, 500)).unwrap();
        assert_eq!(doc["meta"], meta);
        assert_eq!(doc["layout_info"]["aspect_ratio"], 2.0);
        assert_eq!(doc["timeline"][0]["actions"][0]["extra"], 1);

        let task: RenderTask = serde_json::from_value(doc).unwrap();
        assert!(matches!(task.timeline[0].actions[1], Action::Unknown(_)));
    }

    #[test]
    fn missing_keys_are_validation_errors() {
        let meta = json!({});
        assert!(matches!(
            assemble_values(meta.clone(), &json!({}), &timeline(), (10, 10)),
            Err(GeoError::Validation(_))
        ));
        assert!(matches!(
            assemble_values(meta, &layout(), &json!({"steps": []}), (10, 10)),
            Err(GeoError::Validation(_))
        ));
    }

    #[test]
    fn action_without_op_fails_validation() {
        let bad = json!({"timeline": [{"actions": [{"targets": ["A"]}]}]});
        assert!(assemble_values(json!({}), &layout(), &bad, (10, 10)).is_err());
    }

    #[test]
    fn missing_image_degrades_to_16_9() {
        let dims = source_dimensions(Some(Path::new("target/assemble_tests/none.jpg"))).unwrap();
        assert_eq!(dims, FALLBACK_IMAGE_SIZE);
        assert_eq!(source_dimensions(None).unwrap(), FALLBACK_IMAGE_SIZE);
    }
}
