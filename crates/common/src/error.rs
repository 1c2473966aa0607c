//! Status type shared by every LayerKV crate.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the storage core.
///
/// The variants mirror the status kinds the write path, table reader and
/// TTL layer distinguish between. `Error` is `Clone` so that an iterator can
/// hand out its saved status more than once; I/O errors are kept behind an
/// `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed on-disk or in-memory data (bad batch, bad block, short TTL value).
    #[error("corruption: {0}")]
    Corruption(String),

    /// A caller-supplied argument or encoding could not be used.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation the callee deliberately does not implement.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Data is not available yet; the operation may be retried.
    #[error("incomplete: {0}")]
    Incomplete(String),

    /// A looked-up entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
}

impl Error {
    /// Shorthand for [`Error::Corruption`].
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete(_))
    }

    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// Result alias used throughout the storage core.
pub type Result<T> = std::result::Result<T, Error>;
