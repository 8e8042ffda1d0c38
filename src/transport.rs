//! Transport selection
//!
//! `Transport::select` looks at the configured transport kind once, at client
//! construction. The secure variant carries the one secure context shared by
//! every request of the client.

use crate::config::{ConnectionConfig, TransportKind};
use crate::error::Result;
use crate::http::session::{connect_tcp, PlainSession};
use crate::http::tls::{ContextFactory, OpensslContextFactory, SecureContext};
use crate::http::SessionOps;
use std::fmt;
use std::sync::Arc;

/// Boxed session as handed to the request dispatcher
pub type Session = Box<dyn SessionOps + Send>;

/// Transport bound to one client
#[derive(Clone)]
pub enum Transport {
    /// Clear-text TCP
    Plain,
    /// TLS over TCP using a shared secure context
    Secure(Arc<dyn SecureContext>),
}

impl Transport {
    /// Select the transport using the OpenSSL backend
    pub fn select(config: &ConnectionConfig) -> Result<Self> {
        Self::select_with(config, &OpensslContextFactory)
    }

    /// Select the transport, building any secure context with `factory`
    ///
    /// The factory is invoked exactly once for the secure transport and
    /// never for the plain one, whatever TLS material the configuration
    /// carries.
    pub fn select_with(config: &ConnectionConfig, factory: &dyn ContextFactory) -> Result<Self> {
        match config.transport() {
            TransportKind::Plain => {
                if !config.tls().is_empty() {
                    tracing::debug!("ignoring TLS material for plain transport");
                }
                tracing::debug!(
                    host = config.host(),
                    port = config.port(),
                    "selected plain transport"
                );
                Ok(Transport::Plain)
            }
            TransportKind::Secure => {
                let options = config.tls().context_options();
                tracing::debug!(
                    host = config.host(),
                    port = config.port(),
                    options = ?options.names(),
                    "building secure context"
                );
                let context = factory.build(options)?;
                Ok(Transport::Secure(context))
            }
        }
    }

    /// Open a connected session to the configured endpoint
    pub fn open(&self, config: &ConnectionConfig) -> Result<Session> {
        let stream = connect_tcp(config.host(), config.port())?;

        match self {
            Transport::Plain => Ok(Box::new(PlainSession::new(stream))),
            Transport::Secure(context) => Ok(context.connect(stream, config.server_name())?),
        }
    }

    /// The shared secure context, for the secure transport
    pub fn secure_context(&self) -> Option<&Arc<dyn SecureContext>> {
        match self {
            Transport::Plain => None,
            Transport::Secure(context) => Some(context),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Plain => TransportKind::Plain,
            Transport::Secure(_) => TransportKind::Secure,
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Plain => f.write_str("Plain"),
            Transport::Secure(context) => f
                .debug_tuple("Secure")
                .field(context.options())
                .finish(),
        }
    }
}
