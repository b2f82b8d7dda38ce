//! # Error Types
//!
//! The fixture defines exactly two failure modes and performs no resilience
//! logic of its own; it exists to test the resilience logic of its callers.
//!
//! | Variant | Cause | Recoverable? |
//! |---------|-------|--------------|
//! | [`Error::Closed`] | Listener was closed | No (permanent for that listener) |
//! | [`Error::Http`] | Protocol error from the HTTP engine | Depends on the caller |
//!
//! Per-call cancellation of a dial is not an error variant: in Rust the
//! caller cancels by dropping the future, typically via
//! [`tokio::time::timeout`], and observes the timeout's own error.

use std::fmt;
use std::io;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for all fixture operations.
#[derive(Debug)]
pub enum Error {
    /// The listener has been closed.
    ///
    /// Returned by [`MemoryListener::accept`](crate::MemoryListener::accept)
    /// and [`MemoryConnector::dial`](crate::MemoryConnector::dial) once the
    /// close signal has fired. Closing is one-shot: this error is permanent
    /// for the listener instance that produced it.
    Closed,

    /// An error from the HTTP client engine.
    ///
    /// Surfaced unwrapped by [`MemoryClient`](crate::MemoryClient); the
    /// fixture adds no retry, backoff, or wrapping of its own.
    Http(hyper::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "listener closed"),
            Self::Http(e) => write!(f, "HTTP error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Closed => None,
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Self::Http(e)
    }
}

/// Lets the listener slot into accept loops that expect `io::Result`, the
/// role `net.ErrClosed` plays for real listeners.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Closed => io::Error::new(io::ErrorKind::NotConnected, "listener closed"),
            Error::Http(e) => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}
