//! Session operations abstraction
//!
//! This module provides the session operations pattern that allows
//! transparent switching between plain TCP and TLS connections.
//!
//! The session operations abstraction is the key to supporting both
//! plain and encrypted HTTP connections with the same code.

use super::{Error, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over plain TCP and TLS connections. Reads block until data
/// is available; a read of zero bytes means the peer closed the stream.
pub trait SessionOps {
    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()>;

    /// Close the session
    fn close(&mut self) -> Result<()>;
}

impl<S: SessionOps + ?Sized> SessionOps for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Plain TCP session operations
pub struct PlainSession {
    stream: TcpStream,
}

impl PlainSession {
    /// Create a plain session from a connected TCP stream
    pub fn new(stream: TcpStream) -> Self {
        PlainSession { stream }
    }
}

impl SessionOps for PlainSession {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }
}

/// Open a TCP connection to `host:port`
///
/// Every address the host resolves to is tried in order; the error from the
/// last attempt is returned if none accepts the connection.
pub fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        let attempt = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .and_then(|socket| {
                socket.set_nodelay(true)?;
                socket.connect(&SockAddr::from(addr))?;
                Ok(socket)
            });

        match attempt {
            Ok(socket) => return Ok(socket.into()),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connection attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(Error::Io(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", host),
        )
    })))
}
