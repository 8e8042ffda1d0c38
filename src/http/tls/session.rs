//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use crate::http::session::SessionOps;
use crate::http::{Error, Result};
use openssl::ssl::SslStream;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

/// TLS session operations
///
/// Wraps an established OpenSSL stream. Once an I/O operation fails the
/// session is marked failed and `close` skips the TLS close_notify.
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSession {
    /// Wrap a stream whose handshake has completed
    pub fn new(stream: SslStream<TcpStream>) -> Self {
        TlsSession {
            stream,
            failed: false,
        }
    }

    /// Negotiated protocol version, e.g. "TLSv1.3"
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }
}

impl SessionOps for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn close(&mut self) -> Result<()> {
        if !self.failed {
            // close_notify is best effort; the peer may already be gone
            let _ = self.stream.shutdown();
        }

        self.stream
            .get_mut()
            .shutdown(Shutdown::Both)
            .map_err(Error::from)
    }
}
