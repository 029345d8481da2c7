/// Placing decoded narration clips on one output track.
pub mod mix;
/// Narration backends and per-step durations.
pub mod narration;
