//! Secure context options
//!
//! The options record is built by appending one named entry per piece of
//! TLS material. Material that was not supplied has no entry at all, so a
//! backend never sees an empty CA bundle or an empty passphrase standing in
//! for "absent".

use std::fmt;

/// One piece of TLS material to attach to a secure context
#[derive(Clone, PartialEq, Eq)]
pub enum TlsOption {
    /// PEM bundle of trusted CA certificates; replaces the default trust store
    CertificateAuthority(Vec<u8>),
    /// PKCS#12 bundle holding the client certificate and private key
    ClientCertificate(Vec<u8>),
    /// Passphrase protecting the PKCS#12 bundle
    Passphrase(String),
}

impl TlsOption {
    /// Name of the option, safe to log
    pub fn name(&self) -> &'static str {
        match self {
            TlsOption::CertificateAuthority(_) => "ca",
            TlsOption::ClientCertificate(_) => "pfx",
            TlsOption::Passphrase(_) => "passphrase",
        }
    }
}

impl fmt::Debug for TlsOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TlsOption({})", self.name())
    }
}

/// Ordered set of TLS options for one secure context
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecureContextOptions {
    entries: Vec<TlsOption>,
}

impl SecureContextOptions {
    /// Create an empty options record
    pub fn new() -> Self {
        SecureContextOptions {
            entries: Vec::new(),
        }
    }

    /// Attach an option, replacing an earlier option of the same kind
    pub fn push(&mut self, option: TlsOption) {
        self.entries.retain(|o| o.name() != option.name());
        self.entries.push(option);
    }

    /// CA bundle, if attached
    pub fn ca(&self) -> Option<&[u8]> {
        self.entries.iter().find_map(|o| match o {
            TlsOption::CertificateAuthority(pem) => Some(pem.as_slice()),
            _ => None,
        })
    }

    /// PKCS#12 client bundle, if attached
    pub fn client_certificate(&self) -> Option<&[u8]> {
        self.entries.iter().find_map(|o| match o {
            TlsOption::ClientCertificate(der) => Some(der.as_slice()),
            _ => None,
        })
    }

    /// Passphrase, if attached
    pub fn passphrase(&self) -> Option<&str> {
        self.entries.iter().find_map(|o| match o {
            TlsOption::Passphrase(p) => Some(p.as_str()),
            _ => None,
        })
    }

    /// Names of the attached options, in attachment order
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(TlsOption::name).collect()
    }

    /// Iterate over the attached options
    pub fn iter(&self) -> impl Iterator<Item = &TlsOption> {
        self.entries.iter()
    }

    /// Number of attached options
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no option is attached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SecureContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
