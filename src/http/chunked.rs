//! Chunked transfer encoding support
//!
//! Incremental decoder for `Transfer-Encoding: chunked` response bodies.
//! The decoder consumes from a shared input buffer and hands out the chunk
//! payloads as they become available, so a body split across many reads is
//! reported piece by piece.

use super::{find_crlf, Error, Result};
use bytes::{Buf, Bytes, BytesMut};

/// Chunked decoder
pub struct ChunkedDecoder {
    state: DecoderState,
    remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            remaining: 0,
        }
    }

    /// Decode as much of `input` as possible
    ///
    /// Consumed bytes are removed from `input`; decoded payload pieces are
    /// appended to `output`. Returns true once the terminating chunk and its
    /// trailer section have been consumed.
    pub fn decode(&mut self, input: &mut BytesMut, output: &mut Vec<Bytes>) -> Result<bool> {
        loop {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[..]) else {
                        return Ok(false);
                    };
                    let line = String::from_utf8_lossy(&input[..crlf_pos]).into_owned();
                    input.advance(crlf_pos + 2);

                    // Chunk extensions after ';' are ignored
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    self.remaining = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    self.state = if self.remaining == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    if input.is_empty() {
                        return Ok(false);
                    }
                    let take = self.remaining.min(input.len());
                    output.push(input.split_to(take).freeze());
                    self.remaining -= take;

                    if self.remaining == 0 {
                        self.state = DecoderState::ChunkEnd;
                    } else {
                        return Ok(false);
                    }
                }

                DecoderState::ChunkEnd => {
                    if input.len() < 2 {
                        return Ok(false);
                    }
                    if &input[..2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    input.advance(2);
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    let Some(crlf_pos) = find_crlf(&input[..]) else {
                        return Ok(false);
                    };
                    input.advance(crlf_pos + 2);
                    // An empty line ends the trailer section
                    if crlf_pos == 0 {
                        self.state = DecoderState::Complete;
                    }
                }

                DecoderState::Complete => return Ok(true),
            }
        }
    }

    /// Check if the terminating chunk has been decoded
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
