/// Convenience result type used across the pipeline.
pub type GeoResult<T> = Result<T, GeoError>;

/// Top-level error taxonomy used by pipeline stages.
#[derive(thiserror::Error, Debug)]
pub enum GeoError {
    /// Invalid user-provided data (bad dimensions, missing keys, bad config values).
    #[error("validation error: {0}")]
    Validation(String),

    /// A required input file is missing or unreadable.
    #[error("input error: {0}")]
    Input(String),

    /// Errors when serializing or deserializing JSON documents.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors while rasterizing or encoding frames.
    #[error("render error: {0}")]
    Render(String),

    /// Errors from the external narration (text-to-speech) backend.
    #[error("narration error: {0}")]
    Narration(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeoError {
    /// Build a [`GeoError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`GeoError::Input`] value.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Build a [`GeoError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`GeoError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`GeoError::Narration`] value.
    pub fn narration(msg: impl Into<String>) -> Self {
        Self::Narration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            GeoError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(GeoError::input("x").to_string().contains("input error:"));
        assert!(
            GeoError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert!(GeoError::render("x").to_string().contains("render error:"));
        assert!(
            GeoError::narration("x")
                .to_string()
                .contains("narration error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = GeoError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
