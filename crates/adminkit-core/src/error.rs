//! Core error types for adminkit.
//!
//! [`AdminKitError`] covers request errors, database errors, position
//! management failures, configuration errors, and image handling errors.
//! Each variant maps to an HTTP status code via [`AdminKitError::status_code`]
//! so admin endpoints can report failures uniformly.

use thiserror::Error;

/// The primary error type for adminkit.
#[derive(Error, Debug)]
pub enum AdminKitError {
    // ── Request errors ───────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 403 Forbidden.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Database errors ──────────────────────────────────────────────

    /// A query expected exactly one row but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one row but found several.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// An operational database error (connection failure, locking, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    /// A position update could not be applied. The surrounding transaction
    /// has been rolled back.
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The toolkit is improperly configured (e.g. an empty allow list).
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Images ───────────────────────────────────────────────────────

    /// An uploaded image was rejected or could not be processed.
    #[error("Image error: {0}")]
    ImageError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AdminKitError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ImageError` -> 400
    /// - `PermissionDenied` -> 403
    /// - `NotFound`, `DoesNotExist` -> 404
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ImageError(_) => 400,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) | Self::DoesNotExist(_) => 404,
            Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::UpdateFailed(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for errors meaning "the requested row is absent".
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DoesNotExist(_))
    }
}

impl From<serde_json::Error> for AdminKitError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, AdminKitError>`.
pub type AdminKitResult<T> = Result<T, AdminKitError>;
