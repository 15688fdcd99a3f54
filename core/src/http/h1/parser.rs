/*
 * parser.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tramite, a pluggable synchronous HTTP client.
 *
 * Tramite is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tramite is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tramite.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length or chunked).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    /// Status line. `code` is -1 when the status code does not parse.
    fn status(&mut self, version: &str, code: i32, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; caller must call `set_body_mode()`.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed. Incomplete input stays in the buffer.
pub struct ResponseParser {
    state: ParseState,
    /// Content-Length when known (-1 for chunked or read-until-close).
    content_length: i64,
    bytes_received: i64,
    /// Remaining bytes of the current chunk.
    chunk_remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            content_length: -1,
            bytes_received: 0,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.content_length = -1;
        self.bytes_received = 0;
        self.chunk_remaining = 0;
    }

    /// True while reading a body delimited only by connection close.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.content_length < 0
    }

    /// Offset of the first CRLF in `buf`.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    fn line(buf: &mut BytesMut, line_end: usize, what: &str) -> io::Result<String> {
        let line = buf.split_to(line_end + 2);
        std::str::from_utf8(&line[..line_end])
            .map(str::to_string)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("invalid {} UTF-8", what)))
    }

    /// Chunk size line: hex digits only, no sign.
    fn chunk_size(hex: &str) -> io::Result<u64> {
        let invalid = || io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size");
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u64::from_str_radix(hex, 16).map_err(|_| invalid())
    }

    fn split_header(line: &str) -> Option<(&str, &str)> {
        let colon = line.find(':')?;
        Some((line[..colon].trim(), line[colon + 1..].trim()))
    }

    /// Consume and parse as much as possible from `buf`.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = Self::line(buf, line_end, "status line")?;
                    // HTTP/1.1 200 OK or HTTP/1.1 200
                    let parts: Vec<&str> = line.splitn(3, ' ').collect();
                    let version = parts.first().copied().unwrap_or("");
                    let code = parts
                        .get(1)
                        .and_then(|s| s.trim().parse::<i32>().ok())
                        .unwrap_or(-1);
                    let reason = parts.get(2).map(|s| s.trim()).filter(|s| !s.is_empty());
                    handler.status(version, code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = Self::line(buf, line_end, "header")?;
                    if let Some((name, value)) = Self::split_header(&line) {
                        handler.header(name, value);
                    }
                }
                ParseState::Body => {
                    if self.content_length >= 0 {
                        let remaining = (self.content_length - self.bytes_received) as usize;
                        let to_read = remaining.min(buf.len());
                        if to_read > 0 {
                            let chunk = buf.split_to(to_read);
                            handler.body_chunk(&chunk);
                            self.bytes_received += to_read as i64;
                        }
                        if self.bytes_received >= self.content_length {
                            handler.complete();
                            self.state = ParseState::Idle;
                        }
                        // bytes past the declared length are ignored
                        return Ok(());
                    } else {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                        return Ok(());
                    }
                }
                ParseState::ChunkSize => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    let line = Self::line(buf, line_end, "chunk size")?;
                    let hex_part = line.split(';').next().unwrap_or(&line).trim();
                    self.chunk_remaining = Self::chunk_size(hex_part)?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let to_read = usize::try_from(self.chunk_remaining)
                        .unwrap_or(usize::MAX)
                        .min(buf.len());
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.chunk_remaining -= to_read as u64;
                    }
                    if self.chunk_remaining > 0 || buf.len() < 2 {
                        return Ok(());
                    }
                    // trailing CRLF of the chunk
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line_end) = Self::find_crlf(buf) else {
                        return Ok(());
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        handler.complete();
                        self.state = ParseState::Idle;
                    } else {
                        let line = Self::line(buf, line_end, "trailer")?;
                        if let Some((name, value)) = Self::split_header(&line) {
                            handler.trailer(name, value);
                        }
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
            }
        }
        Ok(())
    }

    /// Called after headers are received (state `HeadersComplete`). `content_length == Some(0)`
    /// completes the response immediately.
    pub fn set_body_mode<H: H1ResponseHandler>(
        &mut self,
        content_length: Option<u64>,
        chunked: bool,
        handler: &mut H,
    ) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        if chunked {
            self.content_length = -1;
            self.state = ParseState::ChunkSize;
        } else if let Some(cl) = content_length {
            self.content_length = cl as i64;
            self.bytes_received = 0;
            if cl == 0 {
                handler.complete();
                self.state = ParseState::Idle;
            } else {
                self.state = ParseState::Body;
            }
        } else {
            self.content_length = -1;
            self.state = ParseState::Body;
        }
    }

    /// Connection closed by the peer. Completes a read-until-close body; anything else is a
    /// truncated response.
    pub fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::Body if self.content_length < 0 => {
                handler.complete();
                self.state = ParseState::Idle;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "HTTP connection closed",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
