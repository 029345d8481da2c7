/// Color parsing and the named palette.
pub mod color;
/// Scalable font discovery and text layout.
pub mod fonts;
/// `ffmpeg`-backed audio decoding.
pub mod media;
