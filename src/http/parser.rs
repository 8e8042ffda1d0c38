//! HTTP response parsing
//!
//! `ResponseParser` is fed raw bytes as they arrive from the session and
//! reports what it recognized as a sequence of `ResponseEvent`s: one `Head`,
//! zero or more `Data` pieces in wire order, and one `End`.

use super::chunked::ChunkedDecoder;
use super::{find_crlf, Error, Headers, ResponseHead, Result, Status, Version, MAX_HEADERS};
use bytes::{Bytes, BytesMut};

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
///
/// A missing or empty reason phrase is replaced by the canonical phrase for
/// the status code.
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::parse(parts[0])?;
    let code = parts[1];
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Parse(format!("Invalid status code: {}", code)));
    }
    let status_code = code
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", code)))?;
    let status = Status::new(status_code)?;

    // Everything after the separator space is the reason phrase, verbatim
    let reason = match parts.get(2) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Something the parser recognized in the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Status line and headers are complete
    Head(ResponseHead),
    /// A piece of the (de-chunked) body
    Data(Bytes),
    /// The body is complete
    End,
}

/// How the end of the body is detected
enum BodyFraming {
    Length(usize),
    Chunked(ChunkedDecoder),
    UntilClose,
}

enum ParserState {
    StatusLine,
    Headers,
    Body(BodyFraming),
    Complete,
}

/// Incremental HTTP/1.x response parser
pub struct ResponseParser {
    state: ParserState,
    buffer: BytesMut,
    status_line: Option<(Version, Status, String)>,
    headers: Headers,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::StatusLine,
            buffer: BytesMut::with_capacity(8192),
            status_line: None,
            headers: Headers::new(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns the events completed by this data, possibly none if more
    /// input is needed. Bytes arriving after the end of the response are
    /// ignored.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<ResponseEvent>> {
        let mut events = Vec::new();
        if matches!(self.state, ParserState::Complete) {
            return Ok(events);
        }

        self.buffer.extend_from_slice(data);
        self.advance(&mut events)?;
        Ok(events)
    }

    /// Signal that the peer closed the connection
    ///
    /// Completes a read-until-close body; anywhere else before the end of
    /// the response this is `Error::ConnectionClosed`.
    pub fn finish(&mut self) -> Result<Vec<ResponseEvent>> {
        match self.state {
            ParserState::Complete => Ok(Vec::new()),
            ParserState::Body(BodyFraming::UntilClose) => {
                let mut events = Vec::new();
                if !self.buffer.is_empty() {
                    events.push(ResponseEvent::Data(self.buffer.split().freeze()));
                }
                events.push(ResponseEvent::End);
                self.state = ParserState::Complete;
                Ok(events)
            }
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Check if a full response has been parsed
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ParserState::Complete)
    }

    fn advance(&mut self, events: &mut Vec<ResponseEvent>) -> Result<()> {
        loop {
            match &mut self.state {
                ParserState::StatusLine => {
                    let Some(crlf_pos) = find_crlf(&self.buffer[..]) else {
                        return Ok(());
                    };
                    let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).into_owned();
                    let _ = self.buffer.split_to(crlf_pos + 2);

                    self.status_line = Some(parse_status_line(&line)?);
                    self.state = ParserState::Headers;
                }

                ParserState::Headers => {
                    let Some(crlf_pos) = find_crlf(&self.buffer[..]) else {
                        return Ok(());
                    };

                    if crlf_pos > 0 {
                        let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).into_owned();
                        let _ = self.buffer.split_to(crlf_pos + 2);

                        if self.headers.len() >= MAX_HEADERS {
                            return Err(Error::Protocol(format!(
                                "More than {} response headers",
                                MAX_HEADERS
                            )));
                        }
                        let (name, value) = Headers::parse_header_line(&line)?;
                        self.headers.insert(name, value);
                        continue;
                    }

                    // Empty line marks end of headers
                    let _ = self.buffer.split_to(2);
                    let (version, status, reason) = self
                        .status_line
                        .take()
                        .ok_or_else(|| Error::Protocol("Headers without status line".into()))?;
                    let headers = std::mem::take(&mut self.headers);

                    // Interim responses precede the real one
                    if status.is_informational() && status.code() != 101 {
                        self.state = ParserState::StatusLine;
                        continue;
                    }

                    let framing = body_framing(status, &headers)?;
                    events.push(ResponseEvent::Head(ResponseHead {
                        version,
                        status,
                        reason,
                        headers,
                    }));

                    match framing {
                        Some(framing) => self.state = ParserState::Body(framing),
                        None => {
                            events.push(ResponseEvent::End);
                            self.state = ParserState::Complete;
                        }
                    }
                }

                ParserState::Body(BodyFraming::Length(remaining)) => {
                    if *remaining == 0 {
                        events.push(ResponseEvent::End);
                        self.state = ParserState::Complete;
                        continue;
                    }
                    if self.buffer.is_empty() {
                        return Ok(());
                    }
                    let take = (*remaining).min(self.buffer.len());
                    *remaining -= take;
                    events.push(ResponseEvent::Data(self.buffer.split_to(take).freeze()));
                }

                ParserState::Body(BodyFraming::Chunked(decoder)) => {
                    let mut pieces = Vec::new();
                    let done = decoder.decode(&mut self.buffer, &mut pieces)?;
                    events.extend(pieces.into_iter().map(ResponseEvent::Data));
                    if !done {
                        return Ok(());
                    }
                    events.push(ResponseEvent::End);
                    self.state = ParserState::Complete;
                }

                ParserState::Body(BodyFraming::UntilClose) => {
                    if !self.buffer.is_empty() {
                        events.push(ResponseEvent::Data(self.buffer.split().freeze()));
                    }
                    return Ok(());
                }

                ParserState::Complete => return Ok(()),
            }
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide how the body is delimited; `None` when there is no body at all
fn body_framing(status: Status, headers: &Headers) -> Result<Option<BodyFraming>> {
    if status.is_bodiless() {
        return Ok(None);
    }

    if let Some(encoding) = headers.get("Transfer-Encoding") {
        let last = encoding.rsplit(',').next().unwrap_or_default().trim();
        if last.eq_ignore_ascii_case("chunked") {
            return Ok(Some(BodyFraming::Chunked(ChunkedDecoder::new())));
        }
        return Ok(Some(BodyFraming::UntilClose));
    }

    if let Some(cl_str) = headers.get("Content-Length") {
        let content_length = cl_str
            .parse::<usize>()
            .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl_str)))?;
        return Ok(Some(BodyFraming::Length(content_length)));
    }

    Ok(Some(BodyFraming::UntilClose))
}
