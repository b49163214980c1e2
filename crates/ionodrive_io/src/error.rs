//! Error types for ionodrive_io crate.
//!
//! Covers run-config loading, output-directory validation and the output
//! writer.

use ionodrive_core::DriverError;
use thiserror::Error;

/// Main error type for ionodrive_io operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Missing, unreadable or malformed run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Output directory argument rejected
    #[error("Path error: {0}")]
    Path(String),

    /// File system errors
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<IoError>,
    },
}

/// Result type alias for ionodrive_io operations.
pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn path<S: Into<String>>(msg: S) -> Self {
        Self::Path(msg.into())
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound(resource.into())
    }

    /// Wraps an error with additional context.
    #[must_use]
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for failures that happen before a run starts.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        match self {
            Self::Config(_) | Self::Path(_) | Self::NotFound(_) => true,
            Self::FileSystem(_) | Self::Json(_) => false,
            Self::Context { source, .. } => source.is_startup(),
        }
    }
}

impl From<IoError> for DriverError {
    fn from(err: IoError) -> Self {
        if err.is_startup() {
            DriverError::config(err.to_string())
        } else {
            DriverError::output("file output", anyhow::Error::new(err))
        }
    }
}
