/// Action → mark dispatch.
pub mod dispatch;
/// Registry of drawn objects by point id and canonical multi-id.
pub mod registry;
/// The timed result of playing a timeline.
pub mod storyboard;
/// LaTeX to plain-text conversion for formula lines.
pub mod tex;
/// Step sequencing and narration pacing.
pub mod timeline;
