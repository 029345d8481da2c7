/// Frame regions and the scene ↔ pixel mapping.
pub mod regions;
/// Colors, font sizes and render profiles.
pub mod theme;
