//! TLS support for HTTP connections
//!
//! # Architecture
//!
//! The TLS implementation uses the session operations abstraction pattern:
//!
//! 1. `SecureContextOptions` lists the TLS material to attach, one named entry
//!    per piece of material that is actually present
//! 2. A `ContextFactory` turns those options into a `SecureContext` once
//! 3. `SecureContext::connect` performs the handshake over a TCP stream and
//!    returns a session implementing `SessionOps`
//! 4. All HTTP code remains unchanged - it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use deadline_client::http::session::connect_tcp;
//! use deadline_client::http::tls::{
//!     ContextFactory, OpensslContextFactory, SecureContextOptions, TlsOption,
//! };
//!
//! let mut options = SecureContextOptions::new();
//! options.push(TlsOption::CertificateAuthority(std::fs::read("ca.pem").unwrap()));
//!
//! let context = OpensslContextFactory.build(options).unwrap();
//! let stream = connect_tcp("deadline.internal", 4433).unwrap();
//! let session = context.connect(stream, "deadline.internal").unwrap();
//! ```

pub mod context;
pub mod options;
pub mod session;

pub use context::{ContextFactory, OpensslContext, OpensslContextFactory, SecureContext};
pub use options::{SecureContextOptions, TlsOption};
pub use session::TlsSession;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}
