use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::read_json;
use crate::scene::theme::{RenderProfile, Theme};

/// Everything a pipeline run can be tuned with. Every field has a default, so `{}` is a
/// valid configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Output frame size in pixels.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Lesson style.
    pub profile: RenderProfile,
    /// Colors, proportions and font sizes.
    pub theme: Theme,
    /// TTF/OTF file for all rendered text; a system sans-serif face when absent.
    pub font: Option<PathBuf>,
    /// How step narration is produced and timed.
    pub narration: NarrationConfig,
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> GeoResult<Self> {
        let cfg: Self = read_json(path)?;
        cfg.validate()?;
        tracing::debug!(path = %path.display(), profile = ?cfg.profile, "loaded config");
        Ok(cfg)
    }

    /// Load `path` when given, else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> GeoResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> GeoResult<()> {
        self.canvas.validate()?;
        Fps::new(self.fps.num, self.fps.den)?;
        self.theme.validate()?;
        self.narration.validate()
    }

    /// Narration language: the explicit override, else the profile's.
    pub fn narration_lang(&self) -> &str {
        self.narration
            .lang
            .as_deref()
            .unwrap_or_else(|| self.profile.lang())
    }
}

/// Narration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrationConfig {
    /// Where narration audio comes from.
    pub backend: NarrationBackend,
    /// Cache directory for command-generated clips.
    pub cache_dir: PathBuf,
    /// Language override for the speech command.
    pub lang: Option<String>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            backend: NarrationBackend::Estimate,
            cache_dir: PathBuf::from("temp"),
            lang: None,
        }
    }
}

impl NarrationConfig {
    fn validate(&self) -> GeoResult<()> {
        match &self.backend {
            NarrationBackend::Estimate => Ok(()),
            NarrationBackend::Command {
                program, extension, ..
            } => {
                if program.trim().is_empty() {
                    return Err(GeoError::validation(
                        "narration command program must be non-empty",
                    ));
                }
                validate_extension(extension)
            }
            NarrationBackend::Pregenerated { extension, .. } => validate_extension(extension),
        }
    }
}

fn validate_extension(ext: &str) -> GeoResult<()> {
    if ext.is_empty() || ext.contains(['/', '\\', '.']) {
        return Err(GeoError::validation(format!(
            "narration extension '{ext}' must be a bare file extension like \"mp3\""
        )));
    }
    Ok(())
}

/// Source of narration audio.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum NarrationBackend {
    /// No audio; durations are estimated from text length.
    #[default]
    Estimate,
    /// Run an external speech command per step. `{text}`, `{out}` and `{lang}` in `args`
    /// are substituted.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_audio_extension")]
        extension: String,
    },
    /// Use clips prepared ahead of time as `<dir>/step_<n>.<extension>` (1-based).
    Pregenerated {
        dir: PathBuf,
        #[serde(default = "default_audio_extension")]
        extension: String,
    },
}

fn default_audio_extension() -> String {
    "mp3".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default_config() {
        let cfg: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.canvas, Canvas::default());
        assert_eq!(cfg.fps, Fps { num: 30, den: 1 });
        assert_eq!(cfg.narration.cache_dir, PathBuf::from("temp"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn command_backend_parses_with_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{
                "profile": "compact",
                "narration": {
                    "backend": {"kind": "command", "program": "edge-tts",
                                "args": ["--text", "{text}", "--write-media", "{out}"]}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.profile, RenderProfile::Compact);
        assert_eq!(cfg.narration_lang(), "en");
        match &cfg.narration.backend {
            NarrationBackend::Command {
                program, extension, ..
            } => {
                assert_eq!(program, "edge-tts");
                assert_eq!(extension, "mp3");
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn odd_canvas_and_bad_extension_are_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.canvas.width = 1919;
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            narration: NarrationConfig {
                backend: NarrationBackend::Pregenerated {
                    dir: PathBuf::from("audio"),
                    extension: ".mp3".to_owned(),
                },
                ..NarrationConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_errors() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"canvass": {}}"#).is_err());
    }

    #[test]
    fn lang_override_wins() {
        let mut cfg = PipelineConfig::default();
        assert_eq!(cfg.narration_lang(), "zh-cn");
        cfg.narration.lang = Some("fr".to_owned());
        assert_eq!(cfg.narration_lang(), "fr");
    }
}
