/// Merging metadata, layout and timeline into one render task.
pub mod assemble;
/// The render-task document and its closed set of actions.
pub mod model;
