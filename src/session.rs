//! Render sessions: a played storyboard bound to a renderer.

use std::path::{Path, PathBuf};

use crate::assets::fonts::{FontBytes, resolve_font};
use crate::audio::mix::{MIX_CHANNELS, NarrationTrack, write_mix_to_f32le_file};
use crate::audio::narration::narrator_from_config;
use crate::config::PipelineConfig;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
use crate::foundation::error::{GeoError, GeoResult};
use crate::player::storyboard::Storyboard;
use crate::player::timeline::TimelinePlayer;
use crate::render::cpu::FrameRenderer;
use crate::render::frame::FrameRGBA;
use crate::task::model::RenderTask;

/// Options for range rendering.
#[derive(Clone, Debug)]
pub struct RenderSessionOpts {
    /// Mix step narration into the output when any step has a clip.
    pub enable_audio: bool,
}

impl Default for RenderSessionOpts {
    fn default() -> Self {
        Self { enable_audio: true }
    }
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_total: u64,
    /// Whether a narration track went to the sink.
    pub with_audio: bool,
}

/// A storyboard ready to be rendered frame by frame.
pub struct RenderSession {
    storyboard: Storyboard,
    renderer: FrameRenderer,
    canvas: Canvas,
    fps: Fps,
    opts: RenderSessionOpts,
}

impl RenderSession {
    pub fn new(
        storyboard: Storyboard,
        config: &PipelineConfig,
        font: Option<&FontBytes>,
        opts: RenderSessionOpts,
    ) -> GeoResult<Self> {
        config.validate()?;
        let renderer = FrameRenderer::new(config.canvas, config.theme.clone(), font)?;
        if !renderer.has_text() {
            tracing::warn!("no scalable font, text marks and subtitles are skipped");
        }
        Ok(Self {
            storyboard,
            renderer,
            canvas: config.canvas,
            fps: config.fps,
            opts,
        })
    }

    /// Play `task` with the narrator `config` selects and open a session on the result.
    #[tracing::instrument(skip_all)]
    pub fn from_task(task: &RenderTask, config: &PipelineConfig) -> GeoResult<Self> {
        let mut narrator = narrator_from_config(config);
        let storyboard = TimelinePlayer::new(config).play(task, narrator.as_mut())?;
        let font = resolve_font(config.font.as_deref());
        Self::new(
            storyboard,
            config,
            font.as_ref(),
            RenderSessionOpts::default(),
        )
    }

    pub fn storyboard(&self) -> &Storyboard {
        &self.storyboard
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Frames in the whole video.
    pub fn frame_count(&self) -> u64 {
        self.storyboard.frame_count(self.fps)
    }

    pub fn full_range(&self) -> GeoResult<FrameRange> {
        FrameRange::new(FrameIndex(0), FrameIndex(self.frame_count()))
    }

    /// Render the scene as it looks `t` seconds in.
    pub fn render_at(&mut self, t: f64) -> GeoResult<FrameRGBA> {
        if !t.is_finite() || t < 0.0 {
            return Err(GeoError::validation(format!(
                "time must be finite and >= 0, got {t}"
            )));
        }
        self.renderer.render(&self.storyboard, t)
    }

    pub fn render_frame(&mut self, frame: FrameIndex) -> GeoResult<FrameRGBA> {
        if frame.0 >= self.frame_count() {
            return Err(GeoError::validation(format!(
                "frame {} is past the end of the video ({} frames)",
                frame.0,
                self.frame_count()
            )));
        }
        let t = self.fps.frame_to_secs(frame);
        self.renderer.render(&self.storyboard, t)
    }

    /// Render `range` into `sink` in frame order.
    pub fn render_range(
        &mut self,
        range: FrameRange,
        sink: &mut dyn FrameSink,
    ) -> GeoResult<RenderStats> {
        if range.is_empty() {
            return Err(GeoError::validation("render range must be non-empty"));
        }
        if range.end.0 > self.frame_count() {
            return Err(GeoError::validation(format!(
                "render range ends at frame {} but the video has {} frames",
                range.end.0,
                self.frame_count()
            )));
        }

        let mut audio_tmp = TempFileGuard(None);
        let audio = if self.opts.enable_audio {
            self.prepare_audio(range, &mut audio_tmp)?
        } else {
            None
        };
        let with_audio = audio.is_some();

        sink.begin(SinkConfig {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.fps,
            audio,
        })?;
        for f in range.start.0..range.end.0 {
            let idx = FrameIndex(f);
            let t = self.fps.frame_to_secs(idx);
            let frame = self.renderer.render(&self.storyboard, t)?;
            sink.push_frame(idx, &frame)?;
            if f % 100 == 0 {
                tracing::debug!(frame = f, total = range.len_frames(), "rendering");
            }
        }
        sink.end()?;

        tracing::info!(frames = range.len_frames(), with_audio, "range rendered");
        Ok(RenderStats {
            frames_total: range.len_frames(),
            with_audio,
        })
    }

    /// Render the whole video to an MP4 at `out`.
    #[tracing::instrument(skip_all, fields(out = %out.display()))]
    pub fn render_mp4(&mut self, out: &Path, overwrite: bool) -> GeoResult<RenderStats> {
        if self.frame_count() == 0 {
            return Err(GeoError::validation(
                "the timeline is empty, there is nothing to render",
            ));
        }
        let range = self.full_range()?;
        let background = self.renderer.theme().background;
        let mut opts = FfmpegSinkOpts::new(out).with_background(background);
        opts.overwrite = overwrite;
        let mut sink = FfmpegSink::new(opts);
        self.render_range(range, &mut sink)
    }

    /// Mix the narration clips into a temporary `f32le` file in the system temp dir.
    fn prepare_audio(
        &self,
        range: FrameRange,
        guard: &mut TempFileGuard,
    ) -> GeoResult<Option<AudioInputConfig>> {
        let Some(track) = NarrationTrack::from_storyboard(&self.storyboard) else {
            return Ok(None);
        };
        if range.start.0 != 0 {
            tracing::warn!(
                start = range.start.0,
                "narration is only muxed for ranges starting at frame 0"
            );
            return Ok(None);
        }
        let path = std::env::temp_dir().join(format!(
            "geolesson_narration_{}_{}.f32le",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        write_mix_to_f32le_file(&track.mix(), &path)?;
        guard.0 = Some(path.clone());
        tracing::debug!(
            clips = track.segments.len(),
            path = %path.display(),
            "narration mixed"
        );
        Ok(Some(AudioInputConfig {
            path,
            sample_rate: track.sample_rate,
            channels: MIX_CHANNELS,
        }))
    }
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::narration::EstimateNarrator;
    use crate::encode::sink::InMemorySink;
    use serde_json::json;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            canvas: Canvas {
                width: 160,
                height: 90,
            },
            fps: Fps { num: 10, den: 1 },
            ..PipelineConfig::default()
        }
    }

    fn session(timeline: serde_json::Value) -> RenderSession {
        let cfg = small_config();
        let task: RenderTask = serde_json::from_value(json!({
            "layout_info": {
                "aspect_ratio": 1.0,
                "relative_layout": {"A": [0.1, 0.1], "B": [0.9, 0.1], "C": [0.5, 0.9]}
            },
            "timeline": timeline
        }))
        .unwrap();
        let mut narrator = EstimateNarrator { secs_per_char: 0.1 };
        let sb = TimelinePlayer::new(&cfg).play(&task, &mut narrator).unwrap();
        RenderSession::new(sb, &cfg, None, RenderSessionOpts::default()).unwrap()
    }

    #[test]
    fn range_render_pushes_every_frame_in_order() {
        let mut s = session(json!([
            {"voice": "", "actions": [{"op": "DRAW_SHAPE", "type": "poly", "targets": ["A", "B", "C"]}]}
        ]));
        // One silent step: 1.5 s at 10 fps.
        assert_eq!(s.frame_count(), 15);
        let mut sink = InMemorySink::new();
        let stats = s.render_range(s.full_range().unwrap(), &mut sink).unwrap();
        assert_eq!(stats.frames_total, 15);
        assert!(!stats.with_audio);
        assert!(sink.is_finished());
        let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
        assert_eq!(idx, (0..15).collect::<Vec<_>>());
        assert!(sink.config().is_some_and(|c| c.audio.is_none()));
    }

    #[test]
    fn frames_past_the_end_are_rejected() {
        let mut s = session(json!([{"voice": "", "actions": []}]));
        assert!(s.render_frame(FrameIndex(14)).is_ok());
        assert!(s.render_frame(FrameIndex(15)).is_err());
        assert!(s.render_at(-1.0).is_err());
    }

    #[test]
    fn empty_timeline_cannot_be_encoded() {
        let mut s = session(json!([]));
        assert_eq!(s.frame_count(), 0);
        let err = s
            .render_mp4(Path::new("target/geolesson-tests/empty.mp4"), true)
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn ranges_outside_the_video_are_rejected() {
        let mut s = session(json!([{"voice": "", "actions": []}]));
        let mut sink = InMemorySink::new();
        let too_long = FrameRange::new(FrameIndex(0), FrameIndex(16)).unwrap();
        assert!(s.render_range(too_long, &mut sink).is_err());
        let empty = FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap();
        assert!(s.render_range(empty, &mut sink).is_err());
    }
}
