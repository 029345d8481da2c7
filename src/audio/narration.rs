//! Narration clips and their durations.
//!
//! A [`Narrator`] turns one step's text into a [`NarrationClip`]. [`narration_for_step`]
//! wraps any narrator with the fixed rules for empty text and failures, so the player
//! always gets a duration.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::assets::media::audio_duration_secs;
use crate::config::{NarrationBackend, PipelineConfig};
use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::ensure_parent_dir;

/// Duration of a step without narration text.
pub const EMPTY_NARRATION_SECS: f64 = 0.5;
/// Duration used when the narration backend fails.
pub const NARRATION_FAILURE_SECS: f64 = 1.0;
/// Fixed pause added to text-length estimates.
pub const ESTIMATE_PAD_SECS: f64 = 0.5;

/// Narration for one step.
#[derive(Clone, Debug, PartialEq)]
pub struct NarrationClip {
    /// How long the narration lasts.
    pub secs: f64,
    /// Audio file to play, when one exists.
    pub audio: Option<PathBuf>,
}

impl NarrationClip {
    pub fn silent(secs: f64) -> Self {
        Self { secs, audio: None }
    }
}

/// Produces narration for non-empty step text.
pub trait Narrator {
    /// Narrate step `index` (0-based).
    fn narrate(&mut self, index: usize, text: &str) -> GeoResult<NarrationClip>;
}

/// `chars × secs_per_char + 0.5`.
pub fn estimate_secs(text: &str, secs_per_char: f64) -> f64 {
    text.chars().count() as f64 * secs_per_char + ESTIMATE_PAD_SECS
}

/// Narration for a step: 0.5 s of silence for empty text, the narrator's clip otherwise,
/// and 1.0 s of silence if the narrator fails.
pub fn narration_for_step(narrator: &mut dyn Narrator, index: usize, text: &str) -> NarrationClip {
    if text.trim().is_empty() {
        return NarrationClip::silent(EMPTY_NARRATION_SECS);
    }
    match narrator.narrate(index, text) {
        Ok(clip) => clip,
        Err(e) => {
            tracing::warn!(step = index, error = %e, "narration failed, using fixed duration");
            NarrationClip::silent(NARRATION_FAILURE_SECS)
        }
    }
}

/// Length of an existing clip, falling back to an estimate when it cannot be measured.
fn measure_or_estimate(path: &Path, text: &str, secs_per_char: f64) -> f64 {
    match audio_duration_secs(path) {
        Ok(secs) if secs > 0.0 => secs,
        Ok(_) => {
            tracing::debug!(path = %path.display(), "clip decoded empty, estimating");
            estimate_secs(text, secs_per_char)
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "clip not measurable, estimating");
            estimate_secs(text, secs_per_char)
        }
    }
}

/// No audio; durations come from text length.
#[derive(Clone, Copy, Debug)]
pub struct EstimateNarrator {
    pub secs_per_char: f64,
}

impl Narrator for EstimateNarrator {
    fn narrate(&mut self, _index: usize, text: &str) -> GeoResult<NarrationClip> {
        Ok(NarrationClip::silent(estimate_secs(text, self.secs_per_char)))
    }
}

/// File naming for generated clips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipNaming {
    /// `voice_<index>` (0-based), used by the render cache.
    Cache,
    /// `step_<index + 1>`, the layout [`PregeneratedNarrator`] reads.
    Steps,
}

impl ClipNaming {
    fn file_name(self, index: usize, extension: &str) -> String {
        match self {
            Self::Cache => format!("voice_{index}.{extension}"),
            Self::Steps => format!("step_{}.{extension}", index + 1),
        }
    }
}

/// Runs an external speech command and caches its output.
///
/// Existing files are reused as-is; a changed transcript needs its cache file deleted.
#[derive(Clone, Debug)]
pub struct CommandNarrator {
    pub program: String,
    /// Arguments; `{text}`, `{out}` and `{lang}` are substituted.
    pub args: Vec<String>,
    pub extension: String,
    pub dir: PathBuf,
    pub naming: ClipNaming,
    pub lang: String,
    pub secs_per_char: f64,
}

impl CommandNarrator {
    /// Where the clip for step `index` lives.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.dir.join(self.naming.file_name(index, &self.extension))
    }

    fn run(&self, text: &str, out: &Path) -> GeoResult<()> {
        ensure_parent_dir(out)?;
        let out_str = out.to_string_lossy();
        let values = [("text", text), ("out", &*out_str), ("lang", self.lang.as_str())];
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| fill_placeholders(a, &values))
            .collect();

        tracing::debug!(program = %self.program, out = %out.display(), "running speech command");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                GeoError::narration(format!("failed to run '{}': {e}", self.program))
            })?;
        if !output.status.success() {
            return Err(GeoError::narration(format!(
                "'{}' exited with status {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !out.exists() {
            return Err(GeoError::narration(format!(
                "'{}' did not write '{}'",
                self.program,
                out.display()
            )));
        }
        Ok(())
    }
}

/// Replace each `{name}` in `template` with its value in one left-to-right pass.
///
/// Inserted values are never scanned again; unknown `{...}` runs are copied through.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = tail.find('}').and_then(|close| {
            let name = &tail[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match hit {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

impl Narrator for CommandNarrator {
    fn narrate(&mut self, index: usize, text: &str) -> GeoResult<NarrationClip> {
        let path = self.clip_path(index);
        if path.exists() {
            tracing::debug!(step = index, path = %path.display(), "reusing cached narration");
        } else {
            self.run(text, &path)?;
        }
        Ok(NarrationClip {
            secs: measure_or_estimate(&path, text, self.secs_per_char),
            audio: Some(path),
        })
    }
}

/// Reads clips prepared ahead of time as `<dir>/step_<index + 1>.<extension>`.
#[derive(Clone, Debug)]
pub struct PregeneratedNarrator {
    pub dir: PathBuf,
    pub extension: String,
    pub secs_per_char: f64,
}

impl Narrator for PregeneratedNarrator {
    fn narrate(&mut self, index: usize, text: &str) -> GeoResult<NarrationClip> {
        let path = self
            .dir
            .join(ClipNaming::Steps.file_name(index, &self.extension));
        if !path.exists() {
            return Err(GeoError::narration(format!(
                "pre-generated clip '{}' is missing",
                path.display()
            )));
        }
        Ok(NarrationClip {
            secs: measure_or_estimate(&path, text, self.secs_per_char),
            audio: Some(path),
        })
    }
}

/// Build the narrator a configuration asks for.
pub fn narrator_from_config(cfg: &PipelineConfig) -> Box<dyn Narrator> {
    let secs_per_char = cfg.profile.secs_per_char();
    match &cfg.narration.backend {
        NarrationBackend::Estimate => Box::new(EstimateNarrator { secs_per_char }),
        NarrationBackend::Command {
            program,
            args,
            extension,
        } => Box::new(CommandNarrator {
            program: program.clone(),
            args: args.clone(),
            extension: extension.clone(),
            dir: cfg.narration.cache_dir.clone(),
            naming: ClipNaming::Cache,
            lang: cfg.narration_lang().to_owned(),
            secs_per_char,
        }),
        NarrationBackend::Pregenerated { dir, extension } => Box::new(PregeneratedNarrator {
            dir: dir.clone(),
            extension: extension.clone(),
            secs_per_char,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Narrator for Failing {
        fn narrate(&mut self, _index: usize, _text: &str) -> GeoResult<NarrationClip> {
            Err(GeoError::narration("engine offline"))
        }
    }

    #[test]
    fn empty_text_is_half_a_second_without_asking_the_narrator() {
        let clip = narration_for_step(&mut Failing, 0, "   ");
        assert_eq!(clip, NarrationClip::silent(EMPTY_NARRATION_SECS));
    }

    #[test]
    fn failures_fall_back_to_one_second() {
        let clip = narration_for_step(&mut Failing, 2, "hello");
        assert_eq!(clip, NarrationClip::silent(NARRATION_FAILURE_SECS));
    }

    #[test]
    fn estimate_counts_characters() {
        let mut n = EstimateNarrator { secs_per_char: 0.1 };
        let clip = narration_for_step(&mut n, 0, "abcdefghij");
        assert!((clip.secs - 1.5).abs() < 1e-12);
        assert!(clip.audio.is_none());
        // Characters, not bytes.
        assert!((estimate_secs("三角形", 0.28) - (3.0 * 0.28 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn clip_naming_matches_cache_and_step_layouts() {
        assert_eq!(ClipNaming::Cache.file_name(0, "mp3"), "voice_0.mp3");
        assert_eq!(ClipNaming::Steps.file_name(0, "mp3"), "step_1.mp3");
    }

    #[test]
    fn placeholders_are_filled_once_and_values_kept_verbatim() {
        let values = [("text", "say {lang} and {out}"), ("out", "/tmp/a.mp3"), ("lang", "en")];
        assert_eq!(
            fill_placeholders("--text={text} -o {out} -l {lang}", &values),
            "--text=say {lang} and {out} -o /tmp/a.mp3 -l en"
        );
        assert_eq!(fill_placeholders("{voice} {text", &values), "{voice} {text");
        assert_eq!(fill_placeholders("{{text}}", &values), "{say {lang} and {out}}");
    }

    #[cfg(unix)]
    #[test]
    fn command_output_is_generated_with_literal_text() {
        let dir = PathBuf::from("target/narration_tests/command_ok");
        let _ = std::fs::remove_file(dir.join("voice_0.txt"));
        let mut n = CommandNarrator {
            program: "sh".to_owned(),
            args: vec![
                "-c".to_owned(),
                "printf %s \"$1\" > \"$2\"".to_owned(),
                "sh".to_owned(),
                "{text}".to_owned(),
                "{out}".to_owned(),
            ],
            extension: "txt".to_owned(),
            dir: dir.clone(),
            naming: ClipNaming::Cache,
            lang: "en".to_owned(),
            secs_per_char: 0.1,
        };
        let text = "Say {lang} and {out} literally";
        let clip = n.narrate(0, text).unwrap();
        let path = dir.join("voice_0.txt");
        assert_eq!(clip.audio, Some(path.clone()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn missing_program_is_a_narration_error() {
        let mut n = CommandNarrator {
            program: "geolesson-no-such-tts".to_owned(),
            args: vec!["{text}".to_owned(), "{out}".to_owned()],
            extension: "mp3".to_owned(),
            dir: PathBuf::from("target/narration_tests/missing_program"),
            naming: ClipNaming::Cache,
            lang: "en".to_owned(),
            secs_per_char: 0.1,
        };
        let err = n.narrate(0, "hi").unwrap_err();
        assert!(matches!(err, GeoError::Narration(_)));
    }

    #[test]
    fn cached_clip_is_reused_without_running_the_command() {
        let dir = PathBuf::from("target/narration_tests/cache_hit");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("voice_4.mp3"), b"not really audio").unwrap();
        let mut n = CommandNarrator {
            program: "geolesson-no-such-tts".to_owned(),
            args: Vec::new(),
            extension: "mp3".to_owned(),
            dir: dir.clone(),
            naming: ClipNaming::Cache,
            lang: "en".to_owned(),
            secs_per_char: 0.1,
        };
        let clip = n.narrate(4, "abcde").unwrap();
        assert_eq!(clip.audio, Some(dir.join("voice_4.mp3")));
        // Undecodable cache file: the duration falls back to the estimate.
        assert!((clip.secs - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_pregenerated_clip_is_an_error() {
        let mut n = PregeneratedNarrator {
            dir: PathBuf::from("target/narration_tests/none"),
            extension: "mp3".to_owned(),
            secs_per_char: 0.28,
        };
        assert!(n.narrate(0, "text").is_err());
    }
}
