//! Shared helpers for integration tests
//!
//! `ScriptedServer` accepts connections on a loopback port, records each
//! request and answers with a scripted list of byte chunks. `Pki` generates a
//! throwaway CA with server and client certificates for mutual TLS tests.

#![allow(dead_code)]

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Delay between scripted chunks so they arrive in separate reads
pub const CHUNK_DELAY: Duration = Duration::from_millis(10);

/// A request as seen by the scripted server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// All values of a header, matched case-insensitively
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.head
            .lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .filter(|(n, _)| n.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }
}

/// Read one request: head up to the blank line, then `Content-Length` bytes
pub fn read_request<S: Read>(stream: &mut S) -> RecordedRequest {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "client closed before sending a full request head");
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8(data[..head_end].to_vec()).unwrap();
    let mut request = RecordedRequest {
        head,
        body: data[head_end..].to_vec(),
    };

    let length: usize = request
        .header("Content-Length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    while request.body.len() < length {
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "client closed before sending the full body");
        request.body.extend_from_slice(&buf[..n]);
    }
    request
}

/// Write chunks with a short pause between them
pub fn write_chunks<S: Write>(stream: &mut S, chunks: &[Vec<u8>]) {
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            thread::sleep(CHUNK_DELAY);
        }
        // The client may already have given up; the test asserts on its side.
        if stream.write_all(chunk).is_err() || stream.flush().is_err() {
            return;
        }
    }
}

/// Builds the response chunks for a recorded request
pub type Responder = Arc<dyn Fn(&RecordedRequest) -> Vec<Vec<u8>> + Send + Sync>;

/// Loopback HTTP server answering a fixed number of connections
pub struct ScriptedServer {
    port: u16,
    requests: Receiver<RecordedRequest>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedServer {
    /// Serve `connections` plain connections, one request each
    pub fn plain(connections: usize, responder: Responder) -> Self {
        Self::start(connections, responder, |mut stream, tx, responder| {
            serve_one(&mut stream, tx, responder);
        })
    }

    /// Serve `connections` TLS connections through `acceptor`
    ///
    /// Failed handshakes are dropped without a response.
    pub fn tls(connections: usize, acceptor: SslAcceptor, responder: Responder) -> Self {
        Self::start(connections, responder, move |stream, tx, responder| {
            let Ok(mut stream) = acceptor.accept(stream) else {
                return;
            };
            serve_one(&mut stream, tx, responder);
            let _ = stream.shutdown();
        })
    }

    fn start<F>(connections: usize, responder: Responder, handler: F) -> Self
    where
        F: Fn(TcpStream, &Sender<RecordedRequest>, &Responder) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, requests) = mpsc::channel();
        let handler = Arc::new(handler);

        let handle = thread::spawn(move || {
            let mut workers = Vec::new();
            for _ in 0..connections {
                let (stream, _) = listener.accept().unwrap();
                let tx = tx.clone();
                let responder = Arc::clone(&responder);
                let handler = Arc::clone(&handler);
                workers.push(thread::spawn(move || handler(stream, &tx, &responder)));
            }
            for worker in workers {
                let _ = worker.join();
            }
        });

        ScriptedServer {
            port,
            requests,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the next recorded request
    pub fn next_request(&self) -> RecordedRequest {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("no request recorded")
    }

    /// Wait until every scripted connection has been served
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn serve_one<S: Read + Write>(stream: &mut S, tx: &Sender<RecordedRequest>, responder: &Responder) {
    let request = read_request(stream);
    let chunks = responder(&request);
    let _ = tx.send(request);
    write_chunks(stream, &chunks);
}

/// Responder that ignores the request and always sends the same chunks
pub fn fixed(chunks: &[&[u8]]) -> Responder {
    let chunks: Vec<Vec<u8>> = chunks.iter().map(|c| c.to_vec()).collect();
    Arc::new(move |_| chunks.clone())
}

/// A complete response with `Content-Length` framing
pub fn response(status_line: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
    .into_bytes()
}

/// Throwaway PKI for mutual TLS tests
pub struct Pki {
    pub ca_cert: X509,
    pub ca_pem: Vec<u8>,
    pub server_cert: X509,
    pub server_key: PKey<Private>,
    pub client_pfx: Vec<u8>,
    pub passphrase: String,
}

impl Pki {
    pub fn generate() -> Self {
        let (ca_cert, ca_key) = certificate_authority();
        let (server_cert, server_key) = leaf(&ca_cert, &ca_key, "127.0.0.1", true);
        let (client_cert, client_key) = leaf(&ca_cert, &ca_key, "render-node-01", false);

        let passphrase = "passphrasecontent".to_string();
        let client_pfx = Pkcs12::builder()
            .name("render-node-01")
            .pkey(&client_key)
            .cert(&client_cert)
            .build2(&passphrase)
            .unwrap()
            .to_der()
            .unwrap();

        Pki {
            ca_pem: ca_cert.to_pem().unwrap(),
            ca_cert,
            server_cert,
            server_key,
            client_pfx,
            passphrase,
        }
    }

    /// Server acceptor that requires a client certificate signed by the CA
    pub fn acceptor(&self) -> SslAcceptor {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        builder.set_certificate(&self.server_cert).unwrap();
        builder.set_private_key(&self.server_key).unwrap();

        let mut store = X509StoreBuilder::new().unwrap();
        store.add_cert(self.ca_cert.clone()).unwrap();
        builder.set_verify_cert_store(store.build()).unwrap();
        builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        builder.build()
    }
}

fn keypair() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

fn serial() -> Asn1Integer {
    let mut bn = BigNum::new().unwrap();
    bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    bn.to_asn1_integer().unwrap()
}

fn certificate_authority() -> (X509, PKey<Private>) {
    let key = keypair();
    let subject = name("Deadline Test CA");

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}

fn leaf(
    ca: &X509,
    ca_key: &PKey<Private>,
    common_name: &str,
    server: bool,
) -> (X509, PKey<Private>) {
    let key = keypair();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&name(common_name)).unwrap();
    builder.set_issuer_name(ca.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()
                .unwrap(),
        )
        .unwrap();

    let usage = if server {
        ExtendedKeyUsage::new().server_auth().build().unwrap()
    } else {
        ExtendedKeyUsage::new().client_auth().build().unwrap()
    };
    builder.append_extension(usage).unwrap();

    if server {
        let san = SubjectAlternativeName::new()
            .ip("127.0.0.1")
            .dns("localhost")
            .build(&builder.x509v3_context(Some(ca), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    let aki = AuthorityKeyIdentifier::new()
        .keyid(false)
        .issuer(false)
        .build(&builder.x509v3_context(Some(ca), None))
        .unwrap();
    builder.append_extension(aki).unwrap();
    builder.sign(ca_key, MessageDigest::sha256()).unwrap();

    (builder.build(), key)
}
