//! Error types for the image service

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use storage::{StorageError, StorageErrorKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for image service operations
pub type TellerResult<T> = Result<T, TellerError>;

/// Error types for image service operations
#[derive(Debug, thiserror::Error)]
pub enum TellerError {
    /// The request named a registry which is not configured
    #[error("Unknown registry '{0}'")]
    UnknownRegistry(String),

    /// The registry has no image with this id
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// The operation is not offered by this service
    #[error("not implemented")]
    NotImplemented,

    /// The registry could not be reached, or answered with an unexpected status
    #[error("registry {registry} unavailable: {source}")]
    RegistryUnavailable {
        /// Name of the registry
        registry: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// The registry answered, but the image metadata could not be decoded
    #[error("invalid image metadata from {registry}: {source}")]
    InvalidMetadata {
        /// Name of the registry
        registry: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Reading the image data failed before anything was sent
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TellerError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TellerError::UnknownRegistry(_) => StatusCode::BAD_REQUEST,
            TellerError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            TellerError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            TellerError::RegistryUnavailable { .. } | TellerError::InvalidMetadata { .. } => {
                StatusCode::BAD_GATEWAY
            }
            TellerError::Storage(error) => match error.kind() {
                StorageErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// The plain text sent to the client.
    ///
    /// Server-side failures only name the status, their details go to the log.
    pub fn body(&self) -> String {
        match self {
            TellerError::UnknownRegistry(_) => self.to_string(),
            TellerError::ImageNotFound(_) => "Image not found".to_owned(),
            TellerError::NotImplemented => "Not Implemented".to_owned(),
            _ => self
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_owned(),
        }
    }

    fn log(&self) {
        match self {
            TellerError::UnknownRegistry(_)
            | TellerError::ImageNotFound(_)
            | TellerError::NotImplemented => {
                tracing::debug!("{self}");
            }
            TellerError::Storage(error) if error.is_retryable() => {
                tracing::warn!(location = error.location(), "{self}");
            }
            TellerError::Storage(error) => {
                tracing::error!(
                    location = error.location(),
                    kind = %error.kind(),
                    "{self}\n{}",
                    error.span_trace()
                );
            }
            _ => {
                tracing::error!("{self}");
            }
        }
    }
}

impl IntoResponse for TellerError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_bodies() {
        let err = TellerError::UnknownRegistry("bogus".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body(), "Unknown registry 'bogus'");

        let err = TellerError::ImageNotFound("42".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.body(), "Image not found");
    }

    #[test]
    fn storage_statuses() {
        let err: TellerError =
            StorageError::new("test", StorageErrorKind::ServiceUnavailable, "down").into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body(), "Service Unavailable");

        let err: TellerError = StorageError::size_mismatch("test", "memory://a/b", 4, 2).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: TellerError = StorageError::unsupported_backend("s3://a/b", "s3").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
