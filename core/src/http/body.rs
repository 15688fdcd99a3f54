/*
 * body.rs
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

//! Request bodies: plain (content type + bytes), URL-encoded form, multipart.
//!
//! Plain bodies are always materialized in memory: strings, files and readers are read fully when
//! the body is created, never lazily while sending.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use bytes::Bytes;

use crate::http::charset::Charset;
use crate::http::form::FormBody;
use crate::http::media_type::{MediaType, APPLICATION_OCTET_STREAM};
use crate::http::multipart::{generate_boundary, MultipartBody};

/// Content type plus an in-memory payload.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestBody {
    content_type: MediaType,
    payload: Bytes,
}

impl RequestBody {
    pub fn new(content_type: MediaType, payload: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            payload: payload.into(),
        }
    }

    /// Text encoded with the content type's charset (UTF-8 when it has none).
    pub fn from_string(text: &str, content_type: MediaType) -> Self {
        let charset = content_type.charset().unwrap_or(Charset::Utf8);
        let payload = charset.encode(text);
        Self::new(content_type, payload)
    }

    /// `text/plain; charset=UTF-8` body.
    pub fn text(text: &str) -> Self {
        let content_type = MediaType::new("text", "plain").with_charset(Charset::Utf8);
        Self::from_string(text, content_type)
    }

    pub fn from_bytes(payload: impl Into<Bytes>, content_type: MediaType) -> Self {
        Self::new(content_type, payload)
    }

    /// Read a whole file. Without an explicit content type, it is derived from the extension.
    pub fn from_file(path: impl AsRef<Path>, content_type: Option<MediaType>) -> io::Result<Self> {
        let path = path.as_ref();
        let payload = fs::read(path)?;
        let content_type = content_type.unwrap_or_else(|| MediaType::for_path(path));
        Ok(Self::new(content_type, payload))
    }

    /// Drain a reader to the end.
    pub fn from_reader(mut reader: impl Read, content_type: MediaType) -> io::Result<Self> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok(Self::new(content_type, payload))
    }

    pub fn content_type(&self) -> &MediaType {
        &self.content_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn content_length(&self) -> Option<u64> {
        Some(self.payload.len() as u64)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("content_type", &self.content_type.to_string())
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Any request body.
#[derive(Debug)]
pub enum Body {
    Plain(RequestBody),
    Form(FormBody),
    Multipart(MultipartBody),
}

impl Body {
    /// Known payload length; `None` for multipart (streamed with chunked transfer).
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Body::Plain(b) => b.content_length(),
            Body::Form(f) => Some(f.encode().len() as u64),
            Body::Multipart(_) => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&MultipartBody> {
        match self {
            Body::Multipart(m) => Some(m),
            _ => None,
        }
    }

    /// Fix the multipart boundary (caller's or generated) for one send.
    pub(crate) fn outgoing(&self) -> Outgoing<'_> {
        let boundary = match self {
            Body::Multipart(m) => m
                .boundary()
                .map(str::to_string)
                .unwrap_or_else(generate_boundary),
            _ => String::new(),
        };
        Outgoing { body: self, boundary }
    }

    /// Close stream-backed multipart parts, including those in nested bodies.
    pub fn close_parts(&self) -> usize {
        match self {
            Body::Multipart(m) => m.close_parts(),
            _ => 0,
        }
    }
}

impl From<RequestBody> for Body {
    fn from(b: RequestBody) -> Self {
        Body::Plain(b)
    }
}

impl From<FormBody> for Body {
    fn from(f: FormBody) -> Self {
        Body::Form(f)
    }
}

impl From<MultipartBody> for Body {
    fn from(m: MultipartBody) -> Self {
        Body::Multipart(m)
    }
}

/// A body prepared for one send: the multipart boundary is fixed.
pub(crate) struct Outgoing<'a> {
    body: &'a Body,
    boundary: String,
}

impl Outgoing<'_> {
    pub fn content_type(&self) -> String {
        match self.body {
            Body::Plain(b) => b.content_type().to_string(),
            Body::Form(f) => f.content_type().to_string(),
            Body::Multipart(m) => m.content_type_with(&self.boundary).to_string(),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.body.content_length()
    }

    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.body {
            Body::Plain(b) => out.write_all(b.payload()),
            Body::Form(f) => out.write_all(&f.encode()),
            Body::Multipart(m) => m.write_to(&self.boundary, out),
        }
    }
}

/// Default content type for a stream part given without one.
pub(crate) fn default_stream_type() -> MediaType {
    MediaType::parse(APPLICATION_OCTET_STREAM)
        .unwrap_or_else(|_| MediaType::new("application", "octet-stream"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_body_uses_declared_charset() {
        let ct = MediaType::parse("text/plain; charset=ISO-8859-1").unwrap();
        let body = RequestBody::from_string("é", ct);
        assert_eq!(body.payload().as_ref(), &[0xE9]);
        assert_eq!(body.content_length(), Some(1));
        let body = RequestBody::text("é");
        assert_eq!(body.payload().as_ref(), "é".as_bytes());
    }

    #[test]
    fn reader_body_is_drained() {
        let body = RequestBody::from_reader(&b"abc"[..], default_stream_type()).unwrap();
        assert_eq!(body.payload().as_ref(), b"abc");
    }

    #[test]
    fn file_body_infers_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, b"{}").unwrap();
        let body = RequestBody::from_file(&path, None).unwrap();
        assert_eq!(body.content_type().essence(), "application/json");
        assert_eq!(body.payload().as_ref(), b"{}");
    }
}
