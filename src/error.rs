//! Error types for tagmatch.
//!
//! All errors are strongly typed using thiserror. Matching itself never fails:
//! "no match" is an ordinary `None`/`false` result. Errors only arise while the
//! canonical dataset is being loaded and indexed.

use thiserror::Error;

use crate::dataset::Resource;

/// The canonical dataset does not have the shape the index builder expects.
#[derive(Debug, Error)]
pub enum DataShapeError {
    #[error("Category key '{tkv}' is not of the form tree/key/value")]
    MalformedTkv {
        tkv: String,
    },

    #[error("Category '{tkv}' references undefined tree '{tree}'")]
    UnknownTree {
        tkv: String,
        tree: String,
    },

    #[error("Invalid preserveTags pattern '{pattern}': {reason}")]
    InvalidPreservePattern {
        pattern: String,
        reason: String,
    },

    #[error("Resource '{resource}' could not be decoded: {message}")]
    Decode {
        resource: Resource,
        message: String,
    },
}

/// A stage of the asynchronous load pipeline rejected.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to fetch resource '{resource}': {message}")]
    Fetch {
        resource: Resource,
        message: String,
    },

    #[error("Dataset shape error: {0}")]
    Shape(#[from] DataShapeError),

    #[error("Location service failed: {message}")]
    Location {
        message: String,
    },

    #[error("Preset classifier failed: {message}")]
    Presets {
        message: String,
    },

    #[error("Dataset load already failed; loading is not retried")]
    AlreadyFailed,
}

/// Top-level error type for tagmatch.
#[derive(Debug, Error)]
pub enum TagMatchError {
    #[error("Dataset shape error: {0}")]
    Shape(#[from] DataShapeError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl TagMatchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a dataset shape error.
    #[must_use]
    pub const fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_) | Self::Load(LoadError::Shape(_)))
    }

    /// Returns true if this is a load pipeline error.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// The load pipeline has no retry policy, so nothing is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for tagmatch operations.
pub type TagMatchResult<T> = Result<T, TagMatchError>;
