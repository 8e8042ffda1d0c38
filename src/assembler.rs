//! Response assembly
//!
//! `ResponseAssembler` collects the response of one request and decides its
//! outcome only after the whole body has arrived:
//!
//! ```text
//! AwaitingHeaders --on_head--> ReceivingBody --on_end--> Complete
//!                                  |    ^
//!                                  +----+ on_data (append in order)
//! ```
//!
//! The status recorded at `on_head` is not acted upon until `on_end`, so the
//! body is always drained before the request settles.

use crate::error::{Error, Result};
use crate::http::{ResponseHead, ResponseSink, Status};
use bytes::BytesMut;
use serde_json::Value;

/// Terminal result of a request that reached the service
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Status below 400 and a JSON body
    Success(Value),
    /// Status 400 or above
    Failure { status: Status, status_message: String },
}

impl Outcome {
    /// Turn a failure outcome into `Error::Remote`
    pub fn into_result(self) -> Result<Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure {
                status,
                status_message,
            } => Err(Error::Remote {
                status: status.code(),
                reason: status_message,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AssemblyState {
    AwaitingHeaders,
    ReceivingBody { status: Status, reason: String },
    Complete { status: Status, reason: String },
}

/// Accumulates one response
#[derive(Debug)]
pub struct ResponseAssembler {
    state: AssemblyState,
    buffer: BytesMut,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        ResponseAssembler {
            state: AssemblyState::AwaitingHeaders,
            buffer: BytesMut::new(),
        }
    }

    /// Check if the end of the response has been observed
    pub fn is_complete(&self) -> bool {
        matches!(self.state, AssemblyState::Complete { .. })
    }

    /// Bytes received so far
    pub fn body(&self) -> &[u8] {
        &self.buffer
    }

    /// Decide the outcome of a complete response
    ///
    /// A success status with a body that is not UTF-8 JSON is an error, not
    /// an outcome. Calling this before the response is complete is a
    /// protocol error.
    pub fn into_outcome(self) -> Result<Outcome> {
        let AssemblyState::Complete { status, reason } = self.state else {
            return Err(Error::Transport(crate::http::Error::Protocol(
                "Response ended before it was complete".to_string(),
            )));
        };

        if status.is_failure() {
            return Ok(Outcome::Failure {
                status,
                status_message: reason,
            });
        }

        let text = std::str::from_utf8(&self.buffer)?;
        let value = serde_json::from_str(text)?;
        Ok(Outcome::Success(value))
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseAssembler {
    fn on_head(&mut self, head: &ResponseHead) {
        if self.state == AssemblyState::AwaitingHeaders {
            tracing::debug!(status = head.status.code(), "response headers received");
            self.state = AssemblyState::ReceivingBody {
                status: head.status,
                reason: head.reason.clone(),
            };
        }
    }

    fn on_data(&mut self, chunk: &[u8]) {
        if matches!(self.state, AssemblyState::ReceivingBody { .. }) {
            self.buffer.extend_from_slice(chunk);
        }
    }

    fn on_end(&mut self) {
        let state = std::mem::replace(&mut self.state, AssemblyState::AwaitingHeaders);
        self.state = match state {
            AssemblyState::ReceivingBody { status, reason } => {
                tracing::debug!(bytes = self.buffer.len(), "response body complete");
                AssemblyState::Complete { status, reason }
            }
            other => other,
        };
    }
}
