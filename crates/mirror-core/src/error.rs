//! Error types for cache and informer operations.
//!
//! This module provides [`MirrorError`], the error type shared by the store,
//! the indexing layer, and the informer. Nothing in this workspace is fatal
//! to the process; every failure mode is represented here and returned to
//! the caller.

/// Comprehensive error type for cache and informer operations.
///
/// This error type is designed to:
/// - Cover all failure modes without using panics
/// - Provide detailed error messages for debugging
/// - Support error chaining via `source` fields
///
/// # Example
///
/// ```rust
/// use mirror_core::MirrorError;
///
/// fn lookup(index_name: &str) -> Result<(), MirrorError> {
///     Err(MirrorError::UnknownIndex {
///         name: index_name.to_string(),
///     })
/// }
///
/// let err = lookup("by-label").unwrap_err();
/// assert!(err.to_string().contains("by-label"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// A primary key could not be derived from an object.
    #[error("cannot derive key: {reason}")]
    Key {
        /// Why key derivation failed.
        reason: String,
    },

    /// A lookup referenced an index name that was never registered.
    #[error("index {name:?} does not exist")]
    UnknownIndex {
        /// The unregistered index name.
        name: String,
    },

    /// A user-supplied index function failed for an object.
    #[error("index function {index:?} failed: {message}")]
    IndexFunc {
        /// Name of the index whose function failed.
        index: String,
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Registering an index whose name is already taken.
    #[error("index {name:?} already exists")]
    IndexConflict {
        /// The conflicting index name.
        name: String,
    },

    /// An operation that must happen before start was attempted after start.
    #[error("informer has already started")]
    AlreadyStarted,

    /// Configuration error while building an informer.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MirrorError {
    /// Create a key derivation error.
    pub fn key(reason: impl Into<String>) -> Self {
        Self::Key {
            reason: reason.into(),
        }
    }

    /// Create an index function error without an underlying cause.
    pub fn index_func(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexFunc {
            index: index.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an index function error from any error type.
    pub fn index_func_with<E>(index: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::IndexFunc {
            index: index.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
