//! Client error type
//!
//! Every failure reaches the caller through the same channel: construction
//! errors are returned from the constructor, everything else rejects the
//! request's `ResponseFuture`.

use crate::http;
use crate::http::tls::TlsError;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the Deadline client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection configuration is invalid
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Connecting, writing the request or reading the response failed
    #[error("Transport error: {0}")]
    Transport(#[from] http::Error),

    /// The secure context could not be built or the handshake failed
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// The service answered with status 400 or above
    ///
    /// Displays as the reason phrase alone.
    #[error("{reason}")]
    Remote { status: u16, reason: String },

    /// A success response body was not valid UTF-8
    #[error("Response body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A success response body was not valid JSON, or did not match the
    /// requested type
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request worker stopped before the request settled
    #[error("Request worker terminated before the request settled")]
    Abandoned,
}

impl Error {
    /// Reason phrase of a remote failure
    pub fn status_message(&self) -> Option<&str> {
        match self {
            Error::Remote { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Status code of a remote failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the connection, handshake or stream failed
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Tls(_))
    }

    /// Check if a success response could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::InvalidUtf8(_) | Error::Decode(_))
    }
}
