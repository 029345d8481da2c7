//! Rasterizing storyboards into frames.
//!
//! [`cpu::FrameRenderer`] draws a [`crate::player::storyboard::Storyboard`] at a point in time
//! with `vello_cpu`; [`frame::FrameRGBA`] is what it hands to sinks and image writers.

/// CPU storyboard renderer.
pub mod cpu;
/// Rendered frame buffers.
pub mod frame;

pub use cpu::FrameRenderer;
pub use frame::FrameRGBA;
