/// Fitting relative layouts into a scene viewport.
pub mod fit;
/// Aspect-ratio packaging and logic-canvas projection of model layouts.
pub mod normalize;
