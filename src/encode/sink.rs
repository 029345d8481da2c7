use std::path::PathBuf;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::GeoResult;
use crate::render::frame::FrameRGBA;

/// What a [`FrameSink`] is told before the first frame arrives.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Narration track to mux alongside the frames.
    pub audio: Option<AudioInputConfig>,
}

/// Raw interleaved `f32le` PCM file to encode next to the video.
#[derive(Debug, Clone)]
pub struct AudioInputConfig {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Consumer of rendered frames.
///
/// `push_frame` is called with strictly increasing frame indices between one `begin` and the
/// matching `end`.
pub trait FrameSink {
    fn begin(&mut self, cfg: SinkConfig) -> GeoResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GeoResult<()>;
    fn end(&mut self) -> GeoResult<()>;
}

/// Keeps every frame in memory. Meant for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured by the last `begin`.
    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Whether `end` was called after the last `begin`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> GeoResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> GeoResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> GeoResult<()> {
        self.finished = true;
        Ok(())
    }
}
