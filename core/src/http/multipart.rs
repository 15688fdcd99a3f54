/*
 * multipart.rs
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

//! Multipart body (RFC 7578 form-data by default).
//!
//! Parts are written in order as
//! `--B CRLF Content-Disposition CRLF [Content-Type CRLF] CRLF payload CRLF`, closed by `--B--`.
//! Stream parts are read once, while sending; `close_parts` drops every stream afterwards.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::http::body::{default_stream_type, Body};
use crate::http::media_type::{MediaType, MULTIPART_FORM_DATA};

/// Random boundary for bodies built without one.
pub(crate) fn generate_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("----tramite{}", suffix)
}

type PartStream = Box<dyn Read + Send>;

/// What a part carries.
pub enum PartPayload {
    /// In-memory value.
    Value(Bytes),
    /// File, opened and read while sending.
    File(PathBuf),
    /// Stream, read once while sending. `None` once consumed or closed.
    Stream(Mutex<Option<PartStream>>),
    /// Nested body.
    Body(Box<Body>),
}

impl fmt::Debug for PartPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartPayload::Value(v) => write!(f, "Value({} bytes)", v.len()),
            PartPayload::File(p) => write!(f, "File({})", p.display()),
            PartPayload::Stream(_) => f.write_str("Stream"),
            PartPayload::Body(b) => write!(f, "Body({:?})", b),
        }
    }
}

/// One named section of a multipart body.
#[derive(Debug)]
pub struct Part {
    name: String,
    content_type: Option<MediaType>,
    filename: Option<String>,
    payload: PartPayload,
}

impl Part {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&MediaType> {
        self.content_type.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn payload(&self) -> &PartPayload {
        &self.payload
    }

    /// True while a stream part still holds its stream.
    pub fn is_open(&self) -> bool {
        match &self.payload {
            PartPayload::Stream(s) => lock_stream(s).is_some(),
            _ => false,
        }
    }

    fn write_header(&self, out: &mut dyn Write, content_type: Option<String>) -> io::Result<()> {
        write!(
            out,
            "Content-Disposition: form-data; name=\"{}\"",
            escape_quoted(&self.name)
        )?;
        if let Some(filename) = &self.filename {
            write!(out, "; filename=\"{}\"", escape_quoted(filename))?;
        }
        out.write_all(b"\r\n")?;
        if let Some(ct) = content_type {
            write!(out, "Content-Type: {}\r\n", ct)?;
        }
        out.write_all(b"\r\n")
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let declared = self.content_type.as_ref().map(ToString::to_string);
        match &self.payload {
            PartPayload::Value(v) => {
                self.write_header(out, declared)?;
                out.write_all(v)
            }
            PartPayload::File(path) => {
                self.write_header(out, declared)?;
                let mut file = File::open(path)?;
                io::copy(&mut file, out).map(|_| ())
            }
            PartPayload::Stream(slot) => {
                self.write_header(out, declared)?;
                let mut guard = lock_stream(slot);
                let stream = guard.as_mut().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Other,
                        format!("stream for part \"{}\" already consumed", self.name),
                    )
                })?;
                io::copy(stream, out).map(|_| ())
            }
            PartPayload::Body(body) => {
                let nested = body.outgoing();
                self.write_header(out, declared.or_else(|| Some(nested.content_type())))?;
                nested.write_to(out)
            }
        }
    }
}

fn lock_stream(slot: &Mutex<Option<PartStream>>) -> std::sync::MutexGuard<'_, Option<PartStream>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Boundary-delimited sequence of parts.
pub struct MultipartBody {
    boundary: Option<String>,
    content_type: MediaType,
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn builder() -> MultipartBuilder {
        MultipartBuilder::default()
    }

    /// Caller-supplied boundary, if any.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Content type without the boundary parameter.
    pub fn content_type(&self) -> &MediaType {
        &self.content_type
    }

    /// Content type carrying `boundary`.
    pub fn content_type_with(&self, boundary: &str) -> MediaType {
        self.content_type.clone().with_parameter("boundary", boundary)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Write every part followed by the closing delimiter.
    pub fn write_to(&self, boundary: &str, out: &mut dyn Write) -> io::Result<()> {
        for part in &self.parts {
            write!(out, "--{}\r\n", boundary)?;
            part.write_to(out)?;
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{}--\r\n", boundary)
    }

    /// Close every stream part (nested bodies included). Already-closed parts are skipped, so each
    /// stream is closed exactly once however often this runs. Returns how many were closed.
    pub fn close_parts(&self) -> usize {
        let mut closed = 0;
        for part in &self.parts {
            match &part.payload {
                PartPayload::Stream(slot) => {
                    if lock_stream(slot).take().is_some() {
                        closed += 1;
                    }
                }
                PartPayload::Body(body) => closed += body.close_parts(),
                _ => {}
            }
        }
        if closed > 0 {
            log::debug!("closed {} multipart stream(s)", closed);
        }
        closed
    }
}

impl fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("content_type", &self.content_type.to_string())
            .field("parts", &self.parts)
            .finish()
    }
}

/// Accumulates parts; `build` freezes them.
pub struct MultipartBuilder {
    boundary: Option<String>,
    content_type: MediaType,
    parts: Vec<Part>,
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self {
            boundary: None,
            content_type: MediaType::parse(MULTIPART_FORM_DATA)
                .unwrap_or_else(|_| MediaType::new("multipart", "form-data")),
            parts: Vec::new(),
        }
    }
}

impl MultipartBuilder {
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Override `multipart/form-data` (e.g. `multipart/mixed`).
    pub fn content_type(mut self, content_type: MediaType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Text field.
    pub fn add(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value: String = value.into();
        self.push(name.into(), None, None, PartPayload::Value(Bytes::from(value)))
    }

    /// Value with an explicit content type.
    pub fn add_typed(
        self,
        name: impl Into<String>,
        value: impl Into<Bytes>,
        content_type: MediaType,
    ) -> Self {
        self.push(name.into(), Some(content_type), None, PartPayload::Value(value.into()))
    }

    /// File part: content type from the extension, filename from the path.
    pub fn add_file(self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content_type = MediaType::for_path(path);
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned());
        self.push(
            name.into(),
            Some(content_type),
            filename,
            PartPayload::File(path.to_path_buf()),
        )
    }

    /// Stream part; `application/octet-stream` when no content type is given.
    pub fn add_stream(
        self,
        name: impl Into<String>,
        filename: Option<String>,
        content_type: Option<MediaType>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        let content_type = content_type.unwrap_or_else(default_stream_type);
        self.push(
            name.into(),
            Some(content_type),
            filename,
            PartPayload::Stream(Mutex::new(Some(Box::new(reader)))),
        )
    }

    /// Nested body; the part's content type is the body's own.
    pub fn add_body(
        self,
        name: impl Into<String>,
        filename: Option<String>,
        body: impl Into<Body>,
    ) -> Self {
        self.push(name.into(), None, filename, PartPayload::Body(Box::new(body.into())))
    }

    fn push(
        mut self,
        name: String,
        content_type: Option<MediaType>,
        filename: Option<String>,
        payload: PartPayload,
    ) -> Self {
        self.parts.push(Part {
            name,
            content_type,
            filename,
            payload,
        });
        self
    }

    pub fn build(self) -> MultipartBody {
        MultipartBody {
            boundary: self.boundary,
            content_type: self.content_type,
            parts: self.parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::RequestBody;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Reader that counts how often it is dropped (closed).
    struct CountingReader {
        data: io::Cursor<Vec<u8>>,
        drops: Arc<AtomicUsize>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Drop for CountingReader {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(data: &[u8], drops: &Arc<AtomicUsize>) -> CountingReader {
        CountingReader {
            data: io::Cursor::new(data.to_vec()),
            drops: drops.clone(),
        }
    }

    #[test]
    fn file_part_uses_extension_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let body = MultipartBody::builder().add_file("upload", &path).build();
        let part = &body.parts()[0];
        assert_eq!(part.name(), "upload");
        assert_eq!(part.filename(), Some("photo.jpg"));
        assert_eq!(part.content_type().unwrap().essence(), "image/jpeg");
    }

    #[test]
    fn writes_parts_in_order() {
        let body = MultipartBody::builder()
            .boundary("XyZ")
            .add("field", "value")
            .add_typed("json", "{}", MediaType::parse("application/json").unwrap())
            .build();
        let mut out = Vec::new();
        body.write_to("XyZ", &mut out).unwrap();
        let expected = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"field\"\r\n\r\n\
            value\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"json\"\r\n\
            Content-Type: application/json\r\n\r\n\
            {}\r\n\
            --XyZ--\r\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
        assert_eq!(
            body.content_type_with("XyZ").to_string(),
            "multipart/form-data; boundary=XyZ"
        );
    }

    #[test]
    fn nested_body_part_uses_its_content_type() {
        let body = MultipartBody::builder()
            .add_body("note", Some("n.txt".to_string()), RequestBody::text("hi"))
            .build();
        let mut out = Vec::new();
        body.write_to("b", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("name=\"note\"; filename=\"n.txt\"\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\nhi\r\n"));
    }

    #[test]
    fn close_parts_closes_each_stream_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let body = MultipartBody::builder()
            .add_stream("a", None, None, counting(b"aaa", &drops))
            .add("plain", "x")
            .add_stream("b", Some("b.bin".to_string()), None, counting(b"bbb", &drops))
            .build();
        assert!(body.parts()[0].is_open());
        assert_eq!(body.close_parts(), 2);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert_eq!(body.close_parts(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert!(!body.parts()[0].is_open());
    }

    #[test]
    fn consumed_stream_cannot_be_sent_again() {
        let drops = Arc::new(AtomicUsize::new(0));
        let body = MultipartBody::builder()
            .add_stream("a", None, None, counting(b"data", &drops))
            .build();
        let mut out = Vec::new();
        body.write_to("b", &mut out).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("data"));
        body.close_parts();
        assert!(body.write_to("b", &mut Vec::new()).is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn generated_boundaries_differ() {
        let a = generate_boundary();
        assert!(a.starts_with("----tramite"));
        assert_ne!(a, generate_boundary());
    }
}
