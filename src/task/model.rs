use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::GeoResult;
use crate::foundation::json::read_json;
use crate::layout::normalize::LayoutInfo;

/// Header text used when the metadata has no `problem_text`.
pub const DEFAULT_PROBLEM_TEXT: &str = "Geometry Problem";

/// The assembled lesson document: metadata, figure layout and narrated timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderTask {
    /// Free-form problem metadata, kept verbatim.
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Figure layout with its source aspect ratio.
    pub layout_info: LayoutInfo,
    /// Steps, played in order.
    pub timeline: Vec<TimelineStep>,
}

impl RenderTask {
    /// Read a render task file.
    pub fn load(path: &Path) -> GeoResult<Self> {
        let task: Self = read_json(path)?;
        tracing::info!(
            path = %path.display(),
            steps = task.timeline.len(),
            points = task.layout_info.relative_layout.len(),
            "loaded render task"
        );
        Ok(task)
    }

    /// `meta.problem_text`, or the generic header.
    pub fn problem_text(&self) -> &str {
        self.meta
            .get("problem_text")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROBLEM_TEXT)
    }
}

/// One narrated step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineStep {
    /// Narration text, also shown as the subtitle.
    pub voice: String,
    /// Drawing actions revealed together during the step.
    pub actions: Vec<Action>,
}

/// A drawing instruction. Any `op` outside the known set is kept as [`Action::Unknown`].
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    WriteMath(WriteMath),
    DrawAxes(DrawAxes),
    DrawShape(DrawShape),
    DrawLine(DrawLine),
    AddMarker(AddMarker),
    DrawArc(DrawArc),
    Highlight(Highlight),
    LabelCoord(LabelCoord),
    Unknown(Value),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteMath {
    /// LaTeX source of the formula line.
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawAxes {
    pub params: AxesParams,
}

/// Axis ranges as `[min, max]` or `[min, max, step]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_range: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_range: Option<Vec<f64>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawShape {
    pub targets: Vec<String>,
    /// `"point"` draws dots; anything else draws a polygon.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl DrawShape {
    pub fn is_points(&self) -> bool {
        self.kind.as_deref() == Some("point")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawLine {
    pub targets: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl DrawLine {
    /// `type` or `style` set to `"dashed"`.
    pub fn is_dashed(&self) -> bool {
        [&self.kind, &self.style]
            .iter()
            .any(|v| v.as_deref() == Some("dashed"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddMarker {
    /// `"tick"` or `"right_angle"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub targets: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawArc {
    /// `[center, start, end]`.
    pub targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Highlight {
    pub targets: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelCoord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl LabelCoord {
    /// `target`, falling back to the first of `targets`.
    pub fn target_id(&self) -> Option<&str> {
        self.target
            .as_deref()
            .or_else(|| self.targets.first().map(String::as_str))
    }
}

/// Placement side for labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    /// Case-insensitive parse; absent or unrecognized values mean `Down`.
    pub fn parse_or_down(s: Option<&str>) -> Self {
        let Some(s) = s else {
            return Self::Down;
        };
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            other => {
                tracing::warn!(direction = other, "unknown label direction, using DOWN");
                Self::Down
            }
        }
    }
}

impl Action {
    /// The `op` string this action was (or would be) written with.
    pub fn op(&self) -> &str {
        match self {
            Self::WriteMath(_) => "WRITE_MATH",
            Self::DrawAxes(_) => "DRAW_AXES",
            Self::DrawShape(_) => "DRAW_SHAPE",
            Self::DrawLine(_) => "DRAW_LINE",
            Self::AddMarker(_) => "ADD_MARKER",
            Self::DrawArc(_) => "DRAW_ARC",
            Self::Highlight(_) => "HIGHLIGHT",
            Self::LabelCoord(_) => "LABEL_COORD",
            Self::Unknown(raw) => raw.get("op").and_then(Value::as_str).unwrap_or(""),
        }
    }

    /// Decode one action object. Fails only when `op` is missing or a known op's fields have
    /// the wrong types.
    pub fn from_value(raw: Value) -> Result<Self, String> {
        let op = raw
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| "action is missing a string \"op\"".to_owned())?
            .to_owned();

        fn fields<T: serde::de::DeserializeOwned>(op: &str, raw: Value) -> Result<T, String> {
            serde_json::from_value(raw).map_err(|e| format!("invalid {op} action: {e}"))
        }

        Ok(match op.as_str() {
            "WRITE_MATH" => Self::WriteMath(fields(&op, raw)?),
            "DRAW_AXES" => Self::DrawAxes(fields(&op, raw)?),
            "DRAW_SHAPE" => Self::DrawShape(fields(&op, raw)?),
            "DRAW_LINE" => Self::DrawLine(fields(&op, raw)?),
            "ADD_MARKER" => Self::AddMarker(fields(&op, raw)?),
            "DRAW_ARC" => Self::DrawArc(fields(&op, raw)?),
            "HIGHLIGHT" => Self::Highlight(fields(&op, raw)?),
            "LABEL_COORD" => Self::LabelCoord(fields(&op, raw)?),
            _ => Self::Unknown(raw),
        })
    }

    /// Encode back to a JSON object carrying its `op`.
    pub fn to_value(&self) -> Value {
        let fields = match self {
            Self::WriteMath(a) => serde_json::to_value(a),
            Self::DrawAxes(a) => serde_json::to_value(a),
            Self::DrawShape(a) => serde_json::to_value(a),
            Self::DrawLine(a) => serde_json::to_value(a),
            Self::AddMarker(a) => serde_json::to_value(a),
            Self::DrawArc(a) => serde_json::to_value(a),
            Self::Highlight(a) => serde_json::to_value(a),
            Self::LabelCoord(a) => serde_json::to_value(a),
            Self::Unknown(raw) => return raw.clone(),
        };
        let mut obj = match fields {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        };
        obj.insert("op".to_owned(), Value::String(self.op().to_owned()));
        Value::Object(obj)
    }
}

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_ops_decode_with_defaults() {
        let a: Action = serde_json::from_value(json!({"op": "DRAW_SHAPE"})).unwrap();
        assert_eq!(a, Action::DrawShape(DrawShape::default()));

        let a: Action = serde_json::from_value(
            json!({"op": "DRAW_LINE", "targets": ["A", "B"], "style": "dashed", "color": "BLUE"}),
        )
        .unwrap();
        let Action::DrawLine(line) = a else {
            panic!("expected DRAW_LINE");
        };
        assert!(line.is_dashed());
        assert_eq!(line.color.as_deref(), Some("BLUE"));
    }

    #[test]
    fn unknown_op_is_preserved_verbatim() {
        let raw = json!({"op": "FLY_CAMERA", "speed": 3});
        let a: Action = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(a, Action::Unknown(raw.clone()));
        assert_eq!(a.op(), "FLY_CAMERA");
        assert_eq!(serde_json::to_value(&a).unwrap(), raw);
    }

    #[test]
    fn missing_op_is_a_load_error() {
        assert!(serde_json::from_value::<Action>(json!({"targets": ["A"]})).is_err());
        assert!(serde_json::from_value::<Action>(json!({"op": 7})).is_err());
    }

    #[test]
    fn serialized_action_carries_its_op() {
        let a = Action::Highlight(Highlight {
            targets: vec!["AB".to_owned()],
        });
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v, json!({"op": "HIGHLIGHT", "targets": ["AB"]}));
        assert_eq!(serde_json::from_value::<Action>(v).unwrap(), a);
    }

    #[test]
    fn step_fields_default() {
        let s: TimelineStep = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s.voice, "");
        assert!(s.actions.is_empty());
    }

    #[test]
    fn label_target_falls_back_to_targets() {
        let l = LabelCoord {
            targets: vec!["P".to_owned()],
            ..LabelCoord::default()
        };
        assert_eq!(l.target_id(), Some("P"));
        assert_eq!(Direction::parse_or_down(Some("left")), Direction::Left);
        assert_eq!(Direction::parse_or_down(Some("sideways")), Direction::Down);
        assert_eq!(Direction::parse_or_down(None), Direction::Down);
    }

    #[test]
    fn header_defaults_when_meta_has_no_problem_text() {
        let task: RenderTask = serde_json::from_value(json!({
            "meta": {"id": 3},
            "layout_info": {"aspect_ratio": 1.0, "relative_layout": {}},
            "timeline": []
        }))
        .unwrap();
        assert_eq!(task.problem_text(), DEFAULT_PROBLEM_TEXT);
    }
}
