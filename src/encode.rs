//! Frame sinks: where rendered frames go.

/// MP4 output through the system `ffmpeg`.
pub mod ffmpeg;
/// The sink contract and an in-memory sink.
pub mod sink;

pub use ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
