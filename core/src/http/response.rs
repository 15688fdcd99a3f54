/*
 * response.rs
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

//! HTTP response: status, headers, originating request and a body that is either still on the
//! wire or buffered in memory.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Cursor, Read};

use bytes::Bytes;

use crate::http::charset::Charset;
use crate::http::connection::{HttpVersion, WireBody};
use crate::http::error::{HttpError, Result, StatusError};
use crate::http::media_type::MediaType;
use crate::http::multimap::MultiMap;
use crate::http::request::Request;
use crate::http::status::{self, Series};

/// Response payload.
pub enum ResponseBody {
    /// Fully read; can be read any number of times.
    Buffered(Bytes),
    /// Still on the connection; readable once.
    Stream(WireBody),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(b) => write!(f, "Buffered({} bytes)", b.len()),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response to an executed `Request`.
#[derive(Debug)]
pub struct Response {
    request: Request,
    version: HttpVersion,
    status: u16,
    reason: Option<String>,
    headers: MultiMap,
    body: Option<ResponseBody>,
    accepted: BTreeSet<u16>,
    /// A stream body was handed out or closed.
    consumed: bool,
}

fn consumed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "body already consumed")
}

impl Response {
    /// `accepted` is the set of status codes that count as success for this exchange.
    pub fn new(
        request: Request,
        version: HttpVersion,
        status: u16,
        reason: Option<String>,
        headers: MultiMap,
        body: Option<ResponseBody>,
        accepted: BTreeSet<u16>,
    ) -> Self {
        Self {
            request,
            version,
            status,
            reason,
            headers,
            body,
            accepted,
            consumed: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn accepted_status_codes(&self) -> &BTreeSet<u16> {
        &self.accepted
    }

    /// True unless the status is one of the accepted codes.
    pub fn has_error(&self) -> bool {
        !self.accepted.contains(&self.status)
    }

    /// `Ok(self)` for an accepted status. Otherwise the body is drained into memory and returned
    /// inside the matching status error.
    pub fn check_status(mut self) -> Result<Response> {
        if !self.has_error() {
            return Ok(self);
        }
        let body = match self.bytes() {
            Ok(body) => body,
            // caller already took the stream
            Err(_) if self.consumed => Bytes::new(),
            Err(e) => return Err(e.into()),
        };
        self.close();
        let error = Box::new(StatusError {
            status: self.status,
            reason: self.reason.clone(),
            headers: self.headers.clone(),
            body,
            request: self.request.clone(),
        });
        log::debug!("status error: {}", error);
        Err(match Series::of(self.status) {
            Some(Series::ClientError) => HttpError::ClientError(error),
            Some(Series::ServerError) => HttpError::ServerError(error),
            _ if status::is_registered(self.status) => HttpError::UnacceptedStatus(error),
            _ => HttpError::UnknownStatus(error),
        })
    }

    /// Release the connection. A buffered body stays readable. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(ResponseBody::Stream(wire)) = &mut self.body {
            wire.close();
            self.consumed = true;
        }
    }

    pub fn body(&self) -> Option<&ResponseBody> {
        self.body.as_ref()
    }

    /// Reader over the body; empty when the response has none. A stream body can be read once.
    pub fn reader(&mut self) -> io::Result<Box<dyn Read + '_>> {
        match &mut self.body {
            Some(ResponseBody::Buffered(b)) => Ok(Box::new(Cursor::new(b.clone()))),
            Some(ResponseBody::Stream(_)) if self.consumed => Err(consumed_error()),
            Some(ResponseBody::Stream(wire)) => {
                self.consumed = true;
                Ok(Box::new(wire))
            }
            None => Ok(Box::new(io::empty())),
        }
    }

    /// Read the stream (if any) into memory so the body can be read repeatedly.
    pub fn buffer(&mut self) -> io::Result<&mut Self> {
        if let Some(ResponseBody::Stream(wire)) = &mut self.body {
            if self.consumed {
                return Err(consumed_error());
            }
            let mut data = Vec::with_capacity(wire.content_length().unwrap_or(0).min(1 << 20) as usize);
            wire.read_to_end(&mut data)?;
            wire.close();
            self.body = Some(ResponseBody::Buffered(Bytes::from(data)));
        }
        Ok(self)
    }

    /// Whole body; empty when the response has none.
    pub fn bytes(&mut self) -> io::Result<Bytes> {
        self.buffer()?;
        Ok(match &self.body {
            Some(ResponseBody::Buffered(b)) => b.clone(),
            _ => Bytes::new(),
        })
    }

    /// Body decoded with the Content-Type charset (UTF-8 when absent or unsupported).
    pub fn text(&mut self) -> io::Result<String> {
        let charset = self
            .content_type()
            .and_then(|ct| ct.charset())
            .unwrap_or(Charset::Utf8);
        let bytes = self.bytes()?;
        Ok(charset.decode(&bytes))
    }

    /// Declared Content-Length, or the length of a buffered body.
    pub fn content_length(&self) -> Option<u64> {
        match &self.body {
            Some(ResponseBody::Buffered(b)) => Some(b.len() as u64),
            Some(ResponseBody::Stream(wire)) => wire.content_length(),
            None => Some(0),
        }
    }

    pub fn content_type(&self) -> Option<MediaType> {
        self.header("Content-Type").and_then(|v| MediaType::parse(v).ok())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.version.as_str(), self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " {}", reason)?;
        }
        f.write_str("\r\n")?;
        for (name, value) in self.headers.pairs() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        f.write_str("\r\n")?;
        match &self.body {
            Some(ResponseBody::Buffered(b)) => f.write_str(&String::from_utf8_lossy(b)),
            Some(ResponseBody::Stream(_)) => f.write_str("<streamed body>"),
            None => Ok(()),
        }
    }
}
