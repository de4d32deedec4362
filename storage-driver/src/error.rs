use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes storage errors by their semantic meaning, independent of
/// the underlying storage backend implementation.
///
/// This enum helps callers understand what went wrong and how to respond,
/// without needing to inspect error messages or know backend-specific details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The requested location does not exist in the backend.
    ///
    /// **Retryable:** No - the resource doesn't exist.
    /// **Caller action:** Treat as a data error; the metadata points at nothing.
    NotFound,

    /// The caller lacks permission to read the requested location.
    ///
    /// **Retryable:** No - unless credentials are updated.
    PermissionDenied,

    /// The operation failed due to I/O errors while reading.
    ///
    /// **Retryable:** No - the read may already have produced data.
    Io,

    /// The backing storage service is temporarily unavailable.
    ///
    /// **Retryable:** Yes - the service should recover.
    /// **Caller action:** Retry with exponential backoff.
    ServiceUnavailable,

    /// No backend is registered for the location's URI scheme.
    ///
    /// **Retryable:** No - this is a configuration problem.
    UnsupportedBackend,

    /// The location was read, but the number of bytes differs from the
    /// expected size.
    ///
    /// **Retryable:** No - indicates backend corruption or metadata drift.
    SizeMismatch,

    /// The request was invalid (malformed location, wrong scheme, etc.).
    ///
    /// **Retryable:** No - the request itself is invalid.
    InvalidRequest,

    /// An unexpected or uncategorized error occurred.
    Other,
}

impl StorageErrorKind {
    /// Returns whether this error kind indicates a transient condition,
    /// which a caller may retry before giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageErrorKind::ServiceUnavailable)
    }

    /// Returns whether this error indicates that stored data does not
    /// agree with its metadata.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, StorageErrorKind::SizeMismatch)
    }

    /// Returns whether this error points at deployment configuration or
    /// registry metadata, rather than at the backend itself.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            StorageErrorKind::UnsupportedBackend
                | StorageErrorKind::NotFound
                | StorageErrorKind::InvalidRequest
        )
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::NotFound => write!(f, "location not found"),
            StorageErrorKind::PermissionDenied => write!(f, "permission denied"),
            StorageErrorKind::Io => write!(f, "I/O error"),
            StorageErrorKind::ServiceUnavailable => write!(f, "backend unavailable"),
            StorageErrorKind::UnsupportedBackend => write!(f, "unsupported backend"),
            StorageErrorKind::SizeMismatch => write!(f, "size mismatch"),
            StorageErrorKind::InvalidRequest => write!(f, "invalid request"),
            StorageErrorKind::Other => write!(f, "other error"),
        }
    }
}

impl From<std::io::ErrorKind> for StorageErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut => StorageErrorKind::ServiceUnavailable,
            _ => StorageErrorKind::Io,
        }
    }
}

/// The byte count read from a location disagreed with the expected size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} bytes, read {actual}")]
pub struct SizeMismatch {
    /// The size recorded in the image metadata.
    pub expected: u64,

    /// The number of bytes read before the mismatch was detected.
    pub actual: u64,
}

#[derive(Debug)]
struct ErrorTrace {
    /// Captured backtrace for debugging.
    ///
    /// Note: Backtrace capture is controlled by RUST_BACKTRACE environment variable.
    backtrace: Backtrace,

    /// Captured span trace from tracing for async context.
    span_trace: SpanTrace,
}

impl ErrorTrace {
    #[track_caller]
    fn capture() -> Self {
        ErrorTrace {
            backtrace: Backtrace::capture(),
            span_trace: SpanTrace::capture(),
        }
    }
}

/// Storage error with context and diagnostic capabilities.
///
/// This error type provides:
/// - **Semantic categorization** via `StorageErrorKind`
/// - **Operation context** (location, engine)
/// - **Error chain preservation** via `Box<dyn Error + Send + Sync>`
/// - **Backtrace capture** for debugging
/// - **Spantrace support** via `tracing_error::SpanTrace`
///
/// # Example
///
/// ```rust
/// use storage_driver::{StorageError, StorageErrorKind};
///
/// fn open_file() -> Result<std::fs::File, StorageError> {
///     std::fs::File::open("missing.txt").map_err(|err| {
///         StorageError::builder("file", StorageErrorKind::NotFound, err)
///             .location("file:///missing.txt")
///             .build()
///     })
/// }
/// ```
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,

    /// The name of the storage engine that produced this error.
    engine: &'static str,

    /// The location being read, if applicable.
    location: Option<String>,

    /// Additional context about the error.
    context: Option<String>,

    source: Box<dyn StdError + Send + Sync + 'static>,

    traces: Box<ErrorTrace>,
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StorageError {
    /// Create a new storage error with the minimum required information.
    ///
    /// For more control, use `StorageError::builder()`.
    pub fn new<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            engine,
            location: None,
            context: None,
            source: error.into(),
            traces: Box::new(ErrorTrace::capture()),
        }
    }

    /// Create a builder for constructing a storage error with full context.
    ///
    /// # Example
    ///
    /// ```rust
    /// use storage_driver::{StorageError, StorageErrorKind};
    ///
    /// let error = StorageError::builder("memory", StorageErrorKind::NotFound,
    ///     std::io::Error::new(std::io::ErrorKind::NotFound, "object not found"))
    ///     .location("memory://images/kernel")
    ///     .context("open")
    ///     .build();
    ///
    /// assert_eq!(error.location(), Some("memory://images/kernel"));
    /// ```
    pub fn builder<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> StorageErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StorageErrorBuilder {
            engine,
            kind,
            source: error.into(),
            location: None,
            context: None,
        }
    }

    /// Returns a boxed closure that creates a storage error from a downstream error.
    ///
    /// This is useful with `.map_err()` for simple error conversion.
    pub fn with<E>(
        engine: &'static str,
        kind: StorageErrorKind,
    ) -> Box<dyn FnOnce(E) -> StorageError + Send + Sync>
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Box::new(move |error: E| StorageError::new(engine, kind, error))
    }

    /// Convert an I/O error, picking the kind from the I/O error kind.
    pub fn from_io(engine: &'static str, error: std::io::Error) -> StorageErrorBuilder {
        StorageError::builder(engine, error.kind().into(), error)
    }

    /// An error for a location whose byte count disagrees with its metadata.
    pub fn size_mismatch(
        engine: &'static str,
        location: impl Into<String>,
        expected: u64,
        actual: u64,
    ) -> Self {
        StorageError::builder(
            engine,
            StorageErrorKind::SizeMismatch,
            SizeMismatch { expected, actual },
        )
        .location(location)
        .build()
    }

    /// An error for a location whose scheme has no registered backend.
    pub fn unsupported_backend(location: impl Into<String>, scheme: &str) -> Self {
        StorageError::builder(
            "resolver",
            StorageErrorKind::UnsupportedBackend,
            format!("no backend registered for {scheme}://"),
        )
        .location(location)
        .build()
    }

    /// Returns the error kind.
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Returns the storage engine name.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Returns the location, if available.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns additional context, if available.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns whether this error is likely retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns whether stored data disagreed with its metadata.
    pub fn is_integrity_failure(&self) -> bool {
        self.kind.is_integrity_failure()
    }

    /// Returns a reference to the captured backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.traces.backtrace
    }

    /// Returns a reference to the captured span trace.
    ///
    /// The span trace provides the tracing span context at the point where
    /// this error was created, showing the logical async call stack.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.traces.span_trace
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage error [{}] from {}", self.kind, self.engine)?;

        if let Some(location) = &self.location {
            write!(f, " (location: {})", location)?;
        }

        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }

        write!(f, ": {}", self.source)
    }
}

/// Builder for constructing `StorageError` with optional context fields.
#[derive(Debug)]
pub struct StorageErrorBuilder {
    kind: StorageErrorKind,
    engine: &'static str,
    source: Box<dyn StdError + Send + Sync + 'static>,
    location: Option<String>,
    context: Option<String>,
}

impl StorageErrorBuilder {
    /// Set the location.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set additional context.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Build the `StorageError`.
    pub fn build(self) -> StorageError {
        StorageError {
            kind: self.kind,
            engine: self.engine,
            location: self.location,
            context: self.context,
            source: self.source,
            traces: Box::new(ErrorTrace::capture()),
        }
    }
}
