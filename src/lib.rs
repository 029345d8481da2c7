//! Geolesson turns a geometry-problem image into a narrated, annotated lesson video.
//!
//! The pipeline runs in stages, each usable on its own:
//!
//! - [`grid::annotate_grid`] overlays a labelled reference grid on the problem image
//! - [`layout`] packages model-estimated point positions with the image's aspect ratio
//! - [`task::assemble`] merges metadata, layout and timeline into a [`RenderTask`]
//! - [`TimelinePlayer`] plays the timeline into a timed [`Storyboard`]
//! - [`RenderSession`] renders the storyboard into frames, a PNG, or an MP4 with narration
#![forbid(unsafe_code)]

mod foundation;

/// Colors, fonts and media decoding.
pub mod assets;
/// Narration timing and mixing.
pub mod audio;
pub mod config;
/// Frame sinks.
pub mod encode;
pub mod grid;
/// Relative layouts and their fit into the figure viewport.
pub mod layout;
/// Timeline playback.
pub mod player;
pub mod render;
/// Scene geometry and styling.
pub mod scene;
pub mod session;
/// Render task documents.
pub mod task;

pub use crate::foundation::core::{
    Affine, BezPath, Canvas, Fps, FrameIndex, FrameRange, Point, Rect, Vec2,
};
pub use crate::foundation::error::{GeoError, GeoResult};
pub use crate::foundation::json::{read_json, write_json_pretty};
pub use crate::foundation::math::normalize_sweep;

pub use crate::assets::color::Color;
pub use crate::config::{NarrationBackend, NarrationConfig, PipelineConfig};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::layout::fit::{FigureMapper, FigureTransform};
pub use crate::layout::normalize::{LayoutInfo, RelativeLayout};
pub use crate::player::storyboard::{Mark, MarkShape, StepTiming, Storyboard, TimeWindow};
pub use crate::player::timeline::TimelinePlayer;
pub use crate::render::{FrameRGBA, FrameRenderer};
pub use crate::scene::theme::{RenderProfile, Theme};
pub use crate::session::{RenderSession, RenderSessionOpts, RenderStats};
pub use crate::task::model::{Action, RenderTask, TimelineStep};
