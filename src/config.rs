//! Connection configuration
//!
//! `ConnectionConfig` is the immutable description of one Deadline endpoint:
//! where it lives, whether it speaks TLS, which headers go on every request,
//! and the optional TLS material. It is validated once, at `build()`.
//!
//! Configuration can also be loaded from a JSON settings document:
//!
//! ```json
//! {
//!   "host": "renderqueue.internal",
//!   "port": 4433,
//!   "protocol": "HTTPS",
//!   "headers": { "X-Deadline-Pool": "gpu" },
//!   "tls": { "caFile": "/etc/deadline/ca.pem", "pfxFile": "/etc/deadline/client.pfx", "passphrase": "secret" }
//! }
//! ```

use crate::error::{Error, Result};
use crate::http::tls::{SecureContextOptions, TlsOption};
use crate::http::Headers;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Transport used to reach the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum TransportKind {
    /// Clear-text HTTP
    Plain,
    /// HTTP over TLS, optionally with a client certificate
    Secure,
}

impl TransportKind {
    /// Keyword for this transport
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Plain => "HTTP",
            TransportKind::Secure => "HTTPS",
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    /// Parse a transport keyword (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "HTTP" | "PLAIN" => Ok(TransportKind::Plain),
            "HTTPS" | "SECURE" | "TLS" => Ok(TransportKind::Secure),
            _ => Err(Error::Configuration(format!(
                "Unknown transport: {} (expected HTTP or HTTPS)",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TransportKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional TLS material
///
/// Every field is independently optional. The material is only consulted
/// for `TransportKind::Secure`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    ca_bundle: Option<Vec<u8>>,
    client_certificate: Option<Vec<u8>>,
    passphrase: Option<String>,
}

impl TlsMaterial {
    /// PEM bundle of trusted CA certificates
    pub fn ca_bundle(&self) -> Option<&[u8]> {
        self.ca_bundle.as_deref()
    }

    /// PKCS#12 client certificate bundle
    pub fn client_certificate(&self) -> Option<&[u8]> {
        self.client_certificate.as_deref()
    }

    /// Passphrase for the client certificate bundle
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Check if no material was supplied
    pub fn is_empty(&self) -> bool {
        self.ca_bundle.is_none() && self.client_certificate.is_none() && self.passphrase.is_none()
    }

    /// Options for a secure context, with one entry per field present
    pub fn context_options(&self) -> SecureContextOptions {
        let mut options = SecureContextOptions::new();
        if let Some(ca) = &self.ca_bundle {
            options.push(TlsOption::CertificateAuthority(ca.clone()));
        }
        if let Some(pfx) = &self.client_certificate {
            options.push(TlsOption::ClientCertificate(pfx.clone()));
        }
        if let Some(passphrase) = &self.passphrase {
            options.push(TlsOption::Passphrase(passphrase.clone()));
        }
        options
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_bundle", &self.ca_bundle.is_some())
            .field("client_certificate", &self.client_certificate.is_some())
            .field("passphrase", &self.passphrase.is_some())
            .finish()
    }
}

/// Immutable connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    transport: TransportKind,
    default_headers: Headers,
    tls: TlsMaterial,
    server_name: Option<String>,
}

impl ConnectionConfig {
    /// Create a configuration builder
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Headers sent with every request
    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    /// TLS material; meaningful only for the secure transport
    pub fn tls(&self) -> &TlsMaterial {
        &self.tls
    }

    /// Name used for SNI and certificate verification
    ///
    /// Defaults to the host.
    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }

    /// Value of the `Host` request header
    ///
    /// The port is omitted when it is the default for the transport.
    pub fn authority(&self) -> String {
        let default_port = match self.transport {
            TransportKind::Plain => crate::http::DEFAULT_HTTP_PORT,
            TransportKind::Secure => crate::http::DEFAULT_HTTPS_PORT,
        };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        if self.port == default_port {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

/// Builder for `ConnectionConfig`
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    transport: Option<TransportKind>,
    default_headers: Headers,
    tls: TlsMaterial,
    server_name: Option<String>,
}

impl ConnectionConfigBuilder {
    /// Set the service host name or address
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the service port; 0 is accepted
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Select the transport (defaults to plain)
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a header sent with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.set(name, value);
        self
    }

    /// Trust the CA certificates in this PEM bundle
    pub fn ca_bundle(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.tls.ca_bundle = Some(pem.into());
        self
    }

    /// Present the client certificate in this PKCS#12 bundle
    pub fn client_certificate(mut self, pfx: impl Into<Vec<u8>>) -> Self {
        self.tls.client_certificate = Some(pfx.into());
        self
    }

    /// Passphrase for the PKCS#12 bundle
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.tls.passphrase = Some(passphrase.into());
        self
    }

    /// Verify the server certificate against this name instead of the host
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ConnectionConfig> {
        let host = self
            .host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Configuration("host must not be empty".to_string()))?;
        let port = self
            .port
            .ok_or_else(|| Error::Configuration("port is required".to_string()))?;

        if let Some(name) = &self.server_name {
            if name.trim().is_empty() {
                return Err(Error::Configuration(
                    "server name must not be empty".to_string(),
                ));
            }
        }

        Ok(ConnectionConfig {
            host,
            port,
            transport: self.transport.unwrap_or(TransportKind::Plain),
            default_headers: self.default_headers,
            tls: self.tls,
            server_name: self.server_name,
        })
    }
}

/// Connection settings as supplied by an external configuration document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientSettings {
    pub host: String,
    pub port: i64,
    pub protocol: TransportKind,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub tls: Option<TlsSettings>,
    #[serde(default)]
    pub server_name: Option<String>,
}

/// TLS section of the settings document; material is referenced by path
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsSettings {
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub pfx_file: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("ca_file", &self.ca_file)
            .field("pfx_file", &self.pfx_file)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientSettings {
    /// Parse settings from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid client settings: {}", e)))
    }

    /// Read and parse a JSON settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Validate the settings and load any referenced TLS files
    pub fn into_config(self) -> Result<ConnectionConfig> {
        let port = u16::try_from(self.port).map_err(|_| {
            Error::Configuration(format!(
                "port must be between 0 and {}, got {}",
                u16::MAX,
                self.port
            ))
        })?;

        let mut builder = ConnectionConfig::builder()
            .host(self.host)
            .port(port)
            .transport(self.protocol);

        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        // TLS files are only read for the secure transport
        let tls = self.tls.filter(|_| self.protocol == TransportKind::Secure);
        if let Some(tls) = tls {
            if let Some(path) = &tls.ca_file {
                builder = builder.ca_bundle(read_material(path)?);
            }
            if let Some(path) = &tls.pfx_file {
                builder = builder.client_certificate(read_material(path)?);
            }
            if let Some(passphrase) = tls.passphrase {
                builder = builder.passphrase(passphrase);
            }
        }

        if let Some(name) = self.server_name {
            builder = builder.server_name(name);
        }

        builder.build()
    }
}

fn read_material(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::Configuration(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_transport_parsing() {
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Plain);
        assert_eq!("plain".parse::<TransportKind>().unwrap(), TransportKind::Plain);
        assert_eq!("https".parse::<TransportKind>().unwrap(), TransportKind::Secure);
        assert_eq!("SECURE".parse::<TransportKind>().unwrap(), TransportKind::Secure);
        assert!(matches!(
            "ftp".parse::<TransportKind>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(8080)
            .build()
            .unwrap();

        assert_eq!(config.host(), "hostname");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.transport(), TransportKind::Plain);
        assert!(config.default_headers().is_empty());
        assert!(config.tls().is_empty());
        assert_eq!(config.server_name(), "hostname");
    }

    #[test]
    fn test_port_zero_is_accepted() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(0)
            .build()
            .unwrap();
        assert_eq!(config.port(), 0);
    }

    #[test]
    fn test_missing_host_or_port() {
        assert!(matches!(
            ConnectionConfig::builder().port(8080).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ConnectionConfig::builder().host("  ").port(8080).build(),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ConnectionConfig::builder().host("hostname").build(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_secure_without_material() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(4433)
            .transport(TransportKind::Secure)
            .build()
            .unwrap();

        assert!(config.tls().is_empty());
        assert!(config.tls().context_options().is_empty());
    }

    #[test]
    fn test_context_options_only_for_present_fields() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(4433)
            .transport(TransportKind::Secure)
            .client_certificate("pfxcontent")
            .build()
            .unwrap();

        let options = config.tls().context_options();
        assert_eq!(options.names(), vec!["pfx"]);
        assert_eq!(options.client_certificate(), Some(&b"pfxcontent"[..]));
        assert_eq!(options.ca(), None);
        assert_eq!(options.passphrase(), None);
    }

    #[test]
    fn test_context_options_full_material() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(4433)
            .transport(TransportKind::Secure)
            .ca_bundle("cacontent")
            .client_certificate("pfxcontent")
            .passphrase("passphrasecontent")
            .build()
            .unwrap();

        let options = config.tls().context_options();
        assert_eq!(options.names(), vec!["ca", "pfx", "passphrase"]);
        assert_eq!(options.ca(), Some(&b"cacontent"[..]));
        assert_eq!(options.client_certificate(), Some(&b"pfxcontent"[..]));
        assert_eq!(options.passphrase(), Some("passphrasecontent"));
    }

    #[test]
    fn test_debug_hides_material() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(4433)
            .transport(TransportKind::Secure)
            .passphrase("passphrasecontent")
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("passphrasecontent"));
        assert!(rendered.contains("passphrase: true"));
    }

    #[test]
    fn test_authority() {
        let plain = |port| {
            ConnectionConfig::builder()
                .host("renderqueue")
                .port(port)
                .build()
                .unwrap()
        };
        assert_eq!(plain(80).authority(), "renderqueue");
        assert_eq!(plain(8080).authority(), "renderqueue:8080");

        let secure = ConnectionConfig::builder()
            .host("::1")
            .port(443)
            .transport(TransportKind::Secure)
            .build()
            .unwrap();
        assert_eq!(secure.authority(), "[::1]");
    }

    #[test]
    fn test_header_builder_replaces_duplicates() {
        let config = ConnectionConfig::builder()
            .host("hostname")
            .port(8080)
            .header("Accept", "text/plain")
            .header("accept", "application/json")
            .build()
            .unwrap();

        assert_eq!(config.default_headers().get_all("Accept"), vec!["application/json"]);
    }

    #[test]
    fn test_settings_from_json() {
        let settings = ClientSettings::from_json(
            r#"{"host":"hostname","port":8080,"protocol":"HTTP","headers":{"X-Pool":"gpu"}}"#,
        )
        .unwrap();
        let config = settings.into_config().unwrap();

        assert_eq!(config.transport(), TransportKind::Plain);
        assert_eq!(config.default_headers().get("x-pool"), Some("gpu"));
    }

    #[test]
    fn test_settings_reject_negative_port() {
        let settings =
            ClientSettings::from_json(r#"{"host":"hostname","port":-1,"protocol":"HTTP"}"#)
                .unwrap();
        assert!(matches!(settings.into_config(), Err(Error::Configuration(_))));

        let settings =
            ClientSettings::from_json(r#"{"host":"hostname","port":70000,"protocol":"HTTP"}"#)
                .unwrap();
        assert!(matches!(settings.into_config(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_settings_reject_unknown_protocol() {
        let result =
            ClientSettings::from_json(r#"{"host":"hostname","port":80,"protocol":"GOPHER"}"#);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_settings_load_tls_files() {
        let mut ca = tempfile::NamedTempFile::new().unwrap();
        ca.write_all(b"cacontent").unwrap();
        let mut pfx = tempfile::NamedTempFile::new().unwrap();
        pfx.write_all(b"pfxcontent").unwrap();

        let json = serde_json::json!({
            "host": "hostname",
            "port": 4433,
            "protocol": "HTTPS",
            "tls": {
                "caFile": ca.path(),
                "pfxFile": pfx.path(),
                "passphrase": "passphrasecontent"
            }
        })
        .to_string();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = ClientSettings::from_file(file.path())
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.transport(), TransportKind::Secure);
        assert_eq!(config.tls().ca_bundle(), Some(&b"cacontent"[..]));
        assert_eq!(config.tls().client_certificate(), Some(&b"pfxcontent"[..]));
        assert_eq!(config.tls().passphrase(), Some("passphrasecontent"));
    }

    #[test]
    fn test_settings_missing_tls_file() {
        let settings = ClientSettings::from_json(
            r#"{"host":"hostname","port":4433,"protocol":"HTTPS","tls":{"caFile":"/nonexistent/ca.pem"}}"#,
        )
        .unwrap();
        assert!(matches!(settings.into_config(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_plain_settings_ignore_tls_files() {
        let settings = ClientSettings::from_json(
            r#"{"host":"h","port":80,"protocol":"HTTP","tls":{"caFile":"/nonexistent/ca.pem","pfxFile":"/nonexistent/client.pfx","passphrase":"secret"}}"#,
        )
        .unwrap();

        let config = settings.into_config().unwrap();
        assert_eq!(config.transport(), TransportKind::Plain);
        assert!(config.tls().is_empty());
    }
}
