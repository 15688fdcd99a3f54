/*
 * connection.rs
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

//! One HTTP/1.1 exchange over one stream: write the request (fixed length or chunked, optionally
//! compressed), parse the response head, then hand out the body as a pull reader driving the H1
//! parser.

use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::http::body::Outgoing;
use crate::http::error::malformed;
use crate::http::h1::{H1ResponseHandler, ParseState, ResponseParser};
use crate::http::method::Method;
use crate::http::multimap::MultiMap;
use crate::http::options::{Options, ProxyType};
use crate::http::request::Request;
use crate::net::{self, HttpStream};
use crate::uri::{self, UrlParts};

/// Size of each chunk written with chunked transfer coding.
pub const CHUNK_SIZE: usize = 8192;

/// Upper bound for a response status line plus headers.
const MAX_HEAD_SIZE: usize = 64 * 1024;

const USER_AGENT: &str = concat!("tramite/", env!("CARGO_PKG_VERSION"));

/// Response protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1_0,
    Http1_1,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http1_0 => "HTTP/1.0",
            HttpVersion::Http1_1 => "HTTP/1.1",
        }
    }
}

/// Request body compression requested by the `Content-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Gzip,
    Deflate,
}

impl Coding {
    fn from_header(value: &str) -> Option<Coding> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Coding::Gzip),
            "deflate" => Some(Coding::Deflate),
            _ => None,
        }
    }
}

/// Writes chunked transfer coding in `CHUNK_SIZE` pieces. `finish` writes the last chunk.
pub(crate) struct ChunkedWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn write_chunk(&mut self, len: usize) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        write!(self.inner, "{:x}\r\n", len)?;
        self.inner.write_all(&self.buf[..len])?;
        self.inner.write_all(b"\r\n")?;
        self.buf.drain(..len);
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        let pending = self.buf.len();
        self.write_chunk(pending)?;
        self.inner.write_all(b"0\r\n\r\n")?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= CHUNK_SIZE {
            self.write_chunk(CHUNK_SIZE)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let pending = self.buf.len();
        self.write_chunk(pending)?;
        self.inner.flush()
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: Option<String>,
    pub headers: MultiMap,
}

/// Collects the status line and headers.
struct HeadCollector {
    version: String,
    code: i32,
    reason: Option<String>,
    headers: MultiMap,
}

impl HeadCollector {
    fn new() -> Self {
        Self {
            version: String::new(),
            code: -1,
            reason: None,
            headers: MultiMap::headers(),
        }
    }

    fn into_head(self) -> io::Result<ResponseHead> {
        let version = match self.version.as_str() {
            "HTTP/1.0" => HttpVersion::Http1_0,
            v if v.starts_with("HTTP/1.") => HttpVersion::Http1_1,
            v => return Err(malformed(format!("unsupported protocol version: {:?}", v))),
        };
        let status = u16::try_from(self.code)
            .map_err(|_| malformed(format!("invalid status code: {}", self.code)))?;
        Ok(ResponseHead {
            version,
            status,
            reason: self.reason,
            headers: self.headers,
        })
    }
}

impl H1ResponseHandler for HeadCollector {
    fn status(&mut self, version: &str, code: i32, reason: Option<&str>) {
        self.version = version.to_string();
        self.code = code;
        self.reason = reason.map(str::to_string);
    }

    fn header(&mut self, name: &str, value: &str) {
        log::trace!("< {}: {}", name, value);
        self.headers.add(name, value);
    }

    fn body_chunk(&mut self, _data: &[u8]) {}

    fn trailer(&mut self, _name: &str, _value: &str) {}

    fn complete(&mut self) {}
}

/// Collects decoded body bytes between reads.
#[derive(Default)]
struct BodySink {
    data: BytesMut,
    done: bool,
}

impl H1ResponseHandler for BodySink {
    fn status(&mut self, _version: &str, _code: i32, _reason: Option<&str>) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn trailer(&mut self, name: &str, value: &str) {
        log::trace!("< trailer {}: {}", name, value);
    }

    fn complete(&mut self) {
        self.done = true;
    }
}

/// Response body still on the wire. Reading drives the parser; the stream is shut down once the
/// body is complete or the reader is closed.
pub struct WireBody {
    stream: Option<HttpStream>,
    buf: BytesMut,
    parser: ResponseParser,
    sink: BodySink,
    content_length: Option<u64>,
}

impl WireBody {
    /// Declared `Content-Length`, when the body is not chunked.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Release the connection; later reads return EOF.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.sink.data.clear();
        self.sink.done = true;
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Read for WireBody {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.sink.data.is_empty() {
                let n = out.len().min(self.sink.data.len());
                out[..n].copy_from_slice(&self.sink.data[..n]);
                self.sink.data.advance(n);
                return Ok(n);
            }
            if self.sink.done {
                if let Some(mut stream) = self.stream.take() {
                    stream.shutdown();
                }
                return Ok(0);
            }
            if !self.buf.is_empty() {
                self.parser.receive(&mut self.buf, &mut self.sink)?;
                if !self.sink.data.is_empty() || self.sink.done {
                    continue;
                }
            }
            let Some(stream) = self.stream.as_mut() else {
                return Ok(0);
            };
            let mut tmp = [0u8; CHUNK_SIZE];
            let n = stream.read(&mut tmp)?;
            if n == 0 {
                self.parser.finish(&mut self.sink)?;
                continue;
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }
}

/// Completed exchange: the response head and, unless the response has none, its body.
pub struct Exchange {
    pub head: ResponseHead,
    pub body: Option<WireBody>,
}

/// Send `request` and read the response head. Multipart streams in the request body are closed
/// afterwards whatever the outcome.
pub fn send(request: &Request, options: &Options) -> io::Result<Exchange> {
    let result = send_request(request, options);
    if let Some(body) = request.body() {
        body.close_parts();
    }
    result
}

fn send_request(request: &Request, options: &Options) -> io::Result<Exchange> {
    let url = request.encoded_url();
    let target = uri::parse_url(&url)?;
    let mut stream = net::connect(&target, options)?;
    let via_http_proxy = options.proxy().proxy_type() == ProxyType::Http && !target.secure;
    write_request(&mut stream, request, &target, via_http_proxy, options)?;
    read_response(stream, request.method())
}

fn push_header(head: &mut String, name: &str, value: &str) {
    log::trace!("> {}: {}", name, value);
    head.push_str(name);
    head.push_str(": ");
    head.push_str(value);
    head.push_str("\r\n");
}

/// Headers the exchange writes itself.
fn is_framing_header(name: &str) -> bool {
    ["host", "content-length", "transfer-encoding", "connection"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

fn write_request(
    stream: &mut HttpStream,
    request: &Request,
    target: &UrlParts,
    via_http_proxy: bool,
    options: &Options,
) -> io::Result<()> {
    let request_target = if via_http_proxy {
        target.absolute.as_str()
    } else {
        target.path_and_query.as_str()
    };
    log::debug!("{} {}", request.method(), target.absolute);
    let mut head = format!("{} {} HTTP/1.1\r\n", request.method(), request_target);
    let host = request
        .header("Host")
        .map(str::to_string)
        .unwrap_or_else(|| target.host_header());
    push_header(&mut head, "Host", &host);

    let mut coding = None;
    for (name, value) in request.headers().pairs() {
        if is_framing_header(name) {
            continue;
        }
        if name.eq_ignore_ascii_case("content-encoding") {
            coding = Coding::from_header(value);
        }
        push_header(&mut head, name, value);
    }
    if !request.headers().contains("Accept") {
        push_header(&mut head, "Accept", "*/*");
    }
    if !request.headers().contains("User-Agent") {
        push_header(&mut head, "User-Agent", USER_AGENT);
    }
    if via_http_proxy && !request.headers().contains("Proxy-Authorization") {
        if let Some(credentials) = options.proxy().credentials() {
            push_header(&mut head, "Proxy-Authorization", &net::basic_auth(credentials));
        }
    }
    push_header(&mut head, "Connection", "close");

    let outgoing = request.body().map(|b| b.outgoing());
    let fixed_length = match &outgoing {
        Some(body) => {
            if !request.headers().contains("Content-Type") {
                push_header(&mut head, "Content-Type", &body.content_type());
            }
            match (body.content_length(), coding) {
                (Some(len), None) => {
                    push_header(&mut head, "Content-Length", &len.to_string());
                    true
                }
                _ => {
                    push_header(&mut head, "Transfer-Encoding", "chunked");
                    false
                }
            }
        }
        None => true,
    };
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;

    if let Some(body) = &outgoing {
        if fixed_length {
            body.write_to(stream)?;
        } else {
            write_chunked(stream, body, coding)?;
        }
    }
    stream.flush()
}

fn write_chunked(stream: &mut HttpStream, body: &Outgoing<'_>, coding: Option<Coding>) -> io::Result<()> {
    let mut chunked = ChunkedWriter::new(stream);
    match coding {
        Some(Coding::Gzip) => {
            let mut encoder = GzEncoder::new(chunked, Compression::default());
            body.write_to(&mut encoder)?;
            chunked = encoder.finish()?;
        }
        Some(Coding::Deflate) => {
            let mut encoder = ZlibEncoder::new(chunked, Compression::default());
            body.write_to(&mut encoder)?;
            chunked = encoder.finish()?;
        }
        None => body.write_to(&mut chunked)?,
    }
    chunked.finish().map(|_| ())
}

/// Read the response head, skipping interim 1xx responses other than 101.
fn read_response(mut stream: HttpStream, method: Method) -> io::Result<Exchange> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    let mut parser = ResponseParser::new();
    loop {
        let mut collector = HeadCollector::new();
        loop {
            parser.receive(&mut buf, &mut collector)?;
            if parser.state() == ParseState::HeadersComplete {
                break;
            }
            if buf.len() > MAX_HEAD_SIZE {
                return Err(malformed("response head too large"));
            }
            let mut tmp = [0u8; CHUNK_SIZE];
            let n = stream.read(&mut tmp)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response head",
                ));
            }
            buf.extend_from_slice(&tmp[..n]);
        }
        let head = collector.into_head()?;
        log::debug!("{} {} {}", head.version.as_str(), head.status, head.reason.as_deref().unwrap_or(""));
        if (100..200).contains(&head.status) && head.status != 101 {
            parser.reset();
            continue;
        }
        let body = body_reader(stream, buf, parser, &head, method)?;
        return Ok(Exchange { head, body });
    }
}

/// Body framing: none for HEAD, 1xx, 204 and 304; otherwise chunked, Content-Length, or
/// read-until-close.
fn body_reader(
    mut stream: HttpStream,
    buf: BytesMut,
    mut parser: ResponseParser,
    head: &ResponseHead,
    method: Method,
) -> io::Result<Option<WireBody>> {
    let status = head.status;
    if method == Method::Head || (100..200).contains(&status) || status == 204 || status == 304 {
        stream.shutdown();
        return Ok(None);
    }
    let chunked = head
        .headers
        .get_all("Transfer-Encoding")
        .iter()
        .flat_map(|v| v.split(','))
        .last()
        .map(|c| c.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);
    let content_length = if chunked {
        None
    } else {
        match head.headers.get("Content-Length") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| malformed(format!("invalid Content-Length: {}", v)))?,
            ),
            None => None,
        }
    };
    let mut sink = BodySink::default();
    parser.set_body_mode(content_length, chunked, &mut sink);
    Ok(Some(WireBody {
        stream: Some(stream),
        buf,
        parser,
        sink,
        content_length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    #[test]
    fn chunked_writer_splits_and_terminates() {
        let mut out = Vec::new();
        let mut w = ChunkedWriter::new(&mut out);
        w.write_all(&vec![b'a'; CHUNK_SIZE + 3]).unwrap();
        w.finish().unwrap();
        let expected_head = format!("{:x}\r\n", CHUNK_SIZE);
        assert!(out.starts_with(expected_head.as_bytes()));
        assert!(out.ends_with(b"3\r\naaa\r\n0\r\n\r\n"));
    }

    #[test]
    fn gzip_through_chunked_writer() {
        let mut out = Vec::new();
        let mut enc = GzEncoder::new(ChunkedWriter::new(&mut out), Compression::default());
        enc.write_all(b"hello hello hello").unwrap();
        enc.finish().unwrap().finish().unwrap();

        // strip the chunk framing
        let mut parser = ResponseParser::new();
        let mut sink = BodySink::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\n\r\n"[..]);
        buf.extend_from_slice(&out);
        parser.receive(&mut buf, &mut HeadCollector::new()).unwrap();
        parser.set_body_mode(None, true, &mut sink);
        parser.receive(&mut buf, &mut sink).unwrap();
        assert!(sink.done);
        let mut text = String::new();
        GzDecoder::new(&sink.data[..]).read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello hello hello");
    }

    #[test]
    fn coding_names() {
        assert_eq!(Coding::from_header(" GZIP "), Some(Coding::Gzip));
        assert_eq!(Coding::from_header("deflate"), Some(Coding::Deflate));
        assert_eq!(Coding::from_header("br"), None);
    }

    #[test]
    fn head_requires_numeric_status() {
        let mut c = HeadCollector::new();
        c.status("HTTP/1.1", -1, None);
        assert_eq!(c.into_head().unwrap_err().kind(), io::ErrorKind::InvalidData);
        let mut c = HeadCollector::new();
        c.status("HTTP/1.0", 999, Some("Odd"));
        let head = c.into_head().unwrap();
        assert_eq!(head.version, HttpVersion::Http1_0);
        assert_eq!(head.status, 999);
    }
}
