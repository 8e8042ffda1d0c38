//! Deadline REST client
//!
//! `DeadlineClient` issues GET and POST requests against one configured
//! endpoint. Every call runs on its own worker thread over its own
//! connection and hands back a `ResponseFuture` that settles exactly once.

use crate::assembler::ResponseAssembler;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::http::tls::ContextFactory;
use crate::http::{Headers, HttpClient, HttpRequest, Method};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Headers,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header that overrides any default header of the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// Client for the Deadline render-farm REST API
///
/// Cloning is cheap; clones share the configuration and secure context.
#[derive(Debug, Clone)]
pub struct DeadlineClient {
    config: Arc<ConnectionConfig>,
    transport: Transport,
}

impl DeadlineClient {
    /// Create a client, building the secure context with OpenSSL if the
    /// configuration selects the secure transport
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = Transport::select(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client whose secure context is built by `factory`
    pub fn with_context_factory(
        config: ConnectionConfig,
        factory: &dyn ContextFactory,
    ) -> Result<Self> {
        let transport = Transport::select_with(&config, factory)?;
        Ok(Self::with_transport(config, transport))
    }

    fn with_transport(config: ConnectionConfig, transport: Transport) -> Self {
        DeadlineClient {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Issue a GET request for `path`
    pub fn get(&self, path: &str, options: Option<&RequestOptions>) -> ResponseFuture {
        self.dispatch(Method::Get, path, None, options)
    }

    /// Issue a POST request for `path` with a raw body
    ///
    /// No content type is added; describe the body with a header in
    /// `options` or in the default headers.
    pub fn post(
        &self,
        path: &str,
        body: impl Into<Vec<u8>>,
        options: Option<&RequestOptions>,
    ) -> ResponseFuture {
        self.dispatch(Method::Post, path, Some(body.into()), options)
    }

    fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        options: Option<&RequestOptions>,
    ) -> ResponseFuture {
        let request = self.build_request(method, path, body, options);
        let pending = PendingRequest {
            config: Arc::clone(&self.config),
            transport: self.transport.clone(),
            request,
        };

        let spawned = thread::Builder::new()
            .name("deadline-request".to_string())
            .spawn(move || pending.run());

        match spawned {
            Ok(handle) => ResponseFuture::pending(handle),
            Err(e) => ResponseFuture::ready(Err(Error::Transport(e.into()))),
        }
    }

    /// Build the request: `Host`, then default headers with per-call
    /// overrides, then framing headers the caller did not set
    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        options: Option<&RequestOptions>,
    ) -> HttpRequest {
        let mut base = Headers::new();
        base.insert("Host", self.config.authority());
        let base = base.merged(self.config.default_headers());
        let mut headers = match options {
            Some(options) => base.merged(options.headers()),
            None => base,
        };

        if let Some(body) = &body {
            if !headers.contains("Content-Length") && !headers.contains("Transfer-Encoding") {
                headers.insert("Content-Length", body.len().to_string());
            }
        }
        if !headers.contains("Connection") {
            headers.insert("Connection", "close");
        }

        HttpRequest::builder()
            .method(method)
            .uri(path)
            .headers(headers)
            .body(body.unwrap_or_default())
            .build()
    }
}

/// State of one in-flight call, owned by its worker thread
struct PendingRequest {
    config: Arc<ConnectionConfig>,
    transport: Transport,
    request: HttpRequest,
}

impl PendingRequest {
    fn run(self) -> Result<Value> {
        let span = tracing::debug_span!(
            "deadline_request",
            method = %self.request.method(),
            path = self.request.uri()
        );
        let _enter = span.enter();

        let session = self.transport.open(&self.config)?;
        let mut client = HttpClient::new(session);
        let mut assembler = ResponseAssembler::new();

        debug!(bytes = self.request.body().len(), "sending request");
        client.send_request(&self.request)?;
        client.receive(&mut assembler)?;

        if let Err(e) = client.close() {
            debug!(error = %e, "closing connection failed");
        }

        let outcome = assembler.into_outcome()?;
        debug!(?outcome, "request settled");
        outcome.into_result()
    }
}

/// Handle to the eventual result of one request
///
/// Settles exactly once: `wait` consumes the handle.
pub struct ResponseFuture {
    state: FutureState,
}

enum FutureState {
    Pending(JoinHandle<Result<Value>>),
    Ready(Result<Value>),
}

impl ResponseFuture {
    fn pending(handle: JoinHandle<Result<Value>>) -> Self {
        ResponseFuture {
            state: FutureState::Pending(handle),
        }
    }

    fn ready(result: Result<Value>) -> Self {
        ResponseFuture {
            state: FutureState::Ready(result),
        }
    }

    /// Check if the request has settled without blocking
    pub fn is_settled(&self) -> bool {
        match &self.state {
            FutureState::Pending(handle) => handle.is_finished(),
            FutureState::Ready(_) => true,
        }
    }

    /// Block until the request settles
    ///
    /// There is no timeout: a request whose transport never completes
    /// blocks forever.
    pub fn wait(self) -> Result<Value> {
        match self.state {
            FutureState::Pending(handle) => handle.join().unwrap_or(Err(Error::Abandoned)),
            FutureState::Ready(result) => result,
        }
    }

    /// Block until the request settles and deserialize the JSON body
    pub fn wait_json<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.wait()?;
        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("settled", &self.is_settled())
            .finish()
    }
}
