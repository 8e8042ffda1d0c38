//! HTTP/1.1 wire layer for the Deadline client
//!
//! This module turns a byte stream into HTTP messages and back. It knows
//! nothing about JSON or about the Deadline REST resources.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction so that plain TCP and
//! TLS connections are interchangeable:
//!
//! - `SessionOps` trait defines the operations (read, write, flush, close)
//! - `PlainSession` implements it over a `TcpStream`
//! - `tls::TlsSession` implements it over an OpenSSL stream
//! - `HttpClient` drives one request/response exchange over any session and
//!   reports response events to a `ResponseSink`
//!
//! # Examples
//!
//! ```no_run
//! use deadline_client::http::{session, HttpClient, HttpRequest, Method};
//!
//! let stream = session::connect_tcp("127.0.0.1", 8080).unwrap();
//! let mut client = HttpClient::new(session::PlainSession::new(stream));
//!
//! let request = HttpRequest::builder()
//!     .method(Method::Get)
//!     .uri("/db/version")
//!     .header("Host", "127.0.0.1:8080")
//!     .build();
//! client.send_request(&request).unwrap();
//! ```

pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod session;
pub mod tls;

pub use client::{HttpClient, ResponseSink};
pub use headers::Headers;
pub use message::{HttpRequest, Method, ResponseHead, Status, Version};
pub use parser::{ResponseEvent, ResponseParser};
pub use session::{PlainSession, SessionOps};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Maximum number of headers accepted in a response
pub const MAX_HEADERS: usize = 64;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// Find the next CRLF in a buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
