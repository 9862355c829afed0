use thiserror::Error;

use crate::server::session::SessionIdentity;

/// Errors raised by a [`GalleryStore`](crate::store::GalleryStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique or primary key constraint rejected the write
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Any other database or connectivity failure
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let duplicate = err
            .as_database_error()
            .filter(|db_err| db_err.is_unique_violation())
            .map(|db_err| db_err.message().to_string());

        match duplicate {
            Some(message) => StoreError::Duplicate(message),
            None => StoreError::Database(err),
        }
    }
}

/// Errors from the on-disk image storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filename would escape the storage directory
    #[error("Invalid image filename: {0}")]
    InvalidName(String),

    /// Underlying filesystem failure
    #[error("Storage I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Input validation failures.
///
/// The `Display` text of each variant is shown to the user verbatim as a
/// flash message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent or blank
    #[error("Ensure all fields are filled out")]
    MissingField(&'static str),

    /// A field exceeds its column width
    #[error("The {field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Rating outside the accepted scale
    #[error("Rating must be a number between 1 and 5")]
    InvalidRating,

    /// Upload with no usable file extension
    #[error("Unsupported file type")]
    UnsupportedFileType,
}

/// Handler-level error returned by every route.
///
/// The HTTP mapping lives in [`crate::server::handlers`].
#[derive(Debug, Error)]
pub enum GalleryError {
    /// Caller lacks the required role; answered with 401 pointing at login
    #[error("Must be signed in with sufficient permissions")]
    Unauthorized,

    /// Form input rejected; answered with 400, a flash, and a location to retry
    #[error("{message}")]
    Rejected {
        message: String,
        redirect_to: String,
    },

    /// Credentials did not match; answered with a redirect back to login
    #[error("{message}")]
    LoginFailed {
        message: String,
        redirect_to: String,
    },

    /// Unknown or malformed image id
    #[error("No Image Found")]
    ImageNotFound { viewer: Option<SessionIdentity> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Unexpected failure outside the store (hashing, task join)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GalleryError {
    /// Reject a form submission, sending the user back to `redirect_to`.
    pub fn rejected(message: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        GalleryError::Rejected {
            message: message.into(),
            redirect_to: redirect_to.into(),
        }
    }

    /// Reject a form submission that failed field validation.
    pub fn invalid(err: ValidationError, redirect_to: impl Into<String>) -> Self {
        Self::rejected(err.to_string(), redirect_to)
    }
}
