//! Secure contexts
//!
//! A secure context is built once per client from its `SecureContextOptions`
//! and then shared read-only by every request the client issues.

use super::options::SecureContextOptions;
use super::session::TlsSession;
use super::{Result, TlsError};
use crate::http::SessionOps;
use openssl::pkcs12::Pkcs12;
use openssl::ssl::{SslConnector, SslMethod};
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::net::TcpStream;
use std::sync::Arc;

/// Reusable TLS client configuration
///
/// Implementations are immutable after construction; `connect` may be
/// called concurrently from many request threads.
pub trait SecureContext: Send + Sync {
    /// Options the context was built from
    fn options(&self) -> &SecureContextOptions;

    /// Perform a client handshake over `stream`
    ///
    /// `server_name` is used for SNI and for verifying the peer certificate.
    fn connect(&self, stream: TcpStream, server_name: &str)
        -> Result<Box<dyn SessionOps + Send>>;
}

/// Builds a secure context from options
pub trait ContextFactory {
    fn build(&self, options: SecureContextOptions) -> Result<Arc<dyn SecureContext>>;
}

/// Factory for the OpenSSL-backed context
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslContextFactory;

impl ContextFactory for OpensslContextFactory {
    fn build(&self, options: SecureContextOptions) -> Result<Arc<dyn SecureContext>> {
        Ok(Arc::new(OpensslContext::new(options)?))
    }
}

/// OpenSSL-backed secure context
pub struct OpensslContext {
    connector: SslConnector,
    options: SecureContextOptions,
}

impl OpensslContext {
    /// Build the OpenSSL connector from the attached options
    ///
    /// Peer and hostname verification are always on. Without a CA bundle the
    /// system trust store is used.
    pub fn new(options: SecureContextOptions) -> Result<Self> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;

        if let Some(ca) = options.ca() {
            let certs = X509::stack_from_pem(ca)
                .map_err(|e| TlsError::Certificate(format!("Failed to load CA bundle: {}", e)))?;
            if certs.is_empty() {
                return Err(TlsError::Certificate(
                    "CA bundle contains no certificates".to_string(),
                ));
            }

            let mut store = X509StoreBuilder::new()?;
            for cert in certs {
                store.add_cert(cert)?;
            }
            builder.set_cert_store(store.build());
        }

        if let Some(bundle) = options.client_certificate() {
            let passphrase = options.passphrase().unwrap_or_default();
            let parsed = Pkcs12::from_der(bundle)
                .and_then(|pkcs12| pkcs12.parse2(passphrase))
                .map_err(|e| {
                    TlsError::Certificate(format!(
                        "Failed to load client certificate bundle: {}",
                        e
                    ))
                })?;

            let (Some(cert), Some(key)) = (parsed.cert, parsed.pkey) else {
                return Err(TlsError::Certificate(
                    "Client certificate bundle lacks a certificate or private key".to_string(),
                ));
            };
            builder.set_certificate(&cert)?;
            builder.set_private_key(&key)?;
            builder.check_private_key()?;

            if let Some(chain) = parsed.ca {
                for intermediate in chain {
                    builder.add_extra_chain_cert(intermediate)?;
                }
            }
        }

        Ok(OpensslContext {
            connector: builder.build(),
            options,
        })
    }
}

impl SecureContext for OpensslContext {
    fn options(&self) -> &SecureContextOptions {
        &self.options
    }

    fn connect(
        &self,
        stream: TcpStream,
        server_name: &str,
    ) -> Result<Box<dyn SessionOps + Send>> {
        let stream = self
            .connector
            .connect(server_name, stream)
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        let session = TlsSession::new(stream);
        tracing::debug!(
            server_name,
            version = session.version(),
            "TLS session established"
        );
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tls::TlsOption;

    #[test]
    fn test_build_without_material() {
        let context = OpensslContextFactory
            .build(SecureContextOptions::new())
            .unwrap();
        assert!(context.options().is_empty());
    }

    #[test]
    fn test_invalid_ca_bundle() {
        let mut options = SecureContextOptions::new();
        options.push(TlsOption::CertificateAuthority(b"cacontent".to_vec()));

        let result = OpensslContext::new(options);
        assert!(matches!(result, Err(TlsError::Certificate(_))));
    }

    #[test]
    fn test_invalid_client_bundle() {
        let mut options = SecureContextOptions::new();
        options.push(TlsOption::ClientCertificate(b"pfxcontent".to_vec()));
        options.push(TlsOption::Passphrase("passphrasecontent".to_string()));

        let result = OpensslContext::new(options);
        assert!(matches!(result, Err(TlsError::Certificate(_))));
    }

    #[test]
    fn test_passphrase_alone_is_accepted() {
        let mut options = SecureContextOptions::new();
        options.push(TlsOption::Passphrase("unused".to_string()));

        let context = OpensslContext::new(options).unwrap();
        assert_eq!(context.options().names(), vec!["passphrase"]);
    }
}
