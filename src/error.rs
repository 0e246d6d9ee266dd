use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Failed to load image: {reason}")]
    ImageLoad { reason: String },

    #[error("Unsupported image source: {input}")]
    UnsupportedSource { input: String },

    #[error("Catalog unavailable: {reason}")]
    CatalogUnavailable { reason: String },

    #[error("Vision service error: {0}")]
    VisionService(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MatchError {
    pub(crate) fn image_load(reason: impl std::fmt::Display) -> Self {
        MatchError::ImageLoad {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported(input: impl Into<String>) -> Self {
        MatchError::UnsupportedSource {
            input: input.into(),
        }
    }

    pub(crate) fn catalog(reason: impl std::fmt::Display) -> Self {
        MatchError::CatalogUnavailable {
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may reasonably offer a manual retry.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MatchError::CatalogUnavailable { .. } | MatchError::VisionService(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
