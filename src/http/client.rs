//! HTTP client exchange
//!
//! `HttpClient` drives exactly one request/response exchange over a session:
//! it writes the request, then reads until the parser reports the end of the
//! response, passing every event to a `ResponseSink` as it is recognized.

use super::{Error, HttpRequest, ResponseEvent, ResponseHead, ResponseParser, Result, SessionOps};

/// Size of each read from the session
const READ_BUFFER_SIZE: usize = 8192;

/// Receiver of response events, in wire order
pub trait ResponseSink {
    /// Status line and headers arrived
    fn on_head(&mut self, head: &ResponseHead);

    /// A piece of the body arrived
    fn on_data(&mut self, chunk: &[u8]);

    /// The body is complete
    fn on_end(&mut self);
}

/// HTTP client
pub struct HttpClient<S: SessionOps> {
    session: S,
    parser: ResponseParser,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client over a connected session
    pub fn new(session: S) -> Self {
        HttpClient {
            session,
            parser: ResponseParser::new(),
        }
    }

    /// Write a complete request to the session
    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        let wire = request.to_wire();
        let mut written = 0;

        while written < wire.len() {
            let n = self.session.write(&wire[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }

        self.session.flush()
    }

    /// Read the response, reporting events to `sink` until it is complete
    ///
    /// Returns once `on_end` has been delivered. Transport and framing errors
    /// abort the exchange; the sink then never sees `on_end`.
    pub fn receive<R: ResponseSink + ?Sized>(&mut self, sink: &mut R) -> Result<()> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        while !self.parser.is_complete() {
            let n = self.session.read(&mut buf)?;
            let events = if n == 0 {
                self.parser.finish()?
            } else {
                self.parser.feed(&buf[..n])?
            };

            for event in events {
                match event {
                    ResponseEvent::Head(head) => sink.on_head(&head),
                    ResponseEvent::Data(chunk) => sink.on_data(&chunk),
                    ResponseEvent::End => sink.on_end(),
                }
            }
        }

        Ok(())
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}
