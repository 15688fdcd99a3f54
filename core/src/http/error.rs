/*
 * error.rs
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

//! Client errors: construction-time violations, transport failures, and status errors raised by
//! `Response::check_status`.

use std::fmt;
use std::io;

use bytes::Bytes;

use crate::http::multimap::MultiMap;
use crate::http::request::Request;

/// Diagnostics captured from a response whose status was not accepted.
/// The body has been read fully into memory, so it outlives the connection.
#[derive(Clone)]
pub struct StatusError {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: MultiMap,
    pub body: Bytes,
    pub request: Request,
}

impl StatusError {
    /// Body decoded as UTF-8 (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl fmt::Debug for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusError")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("url", &self.request.url())
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} returned {}", self.request.method(), self.request.url(), self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " {}", reason)?;
        }
        Ok(())
    }
}

/// Errors from building requests, executing them, or checking their status.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Construction-time invariant violation (body/method mismatch, bad option value).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any I/O failure while connecting, writing or reading.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 4xx response.
    #[error("client error: {0}")]
    ClientError(Box<StatusError>),

    /// 5xx response.
    #[error("server error: {0}")]
    ServerError(Box<StatusError>),

    /// Status code outside the status registry.
    #[error("unknown status: {0}")]
    UnknownStatus(Box<StatusError>),

    /// Registered 1xx/2xx/3xx status that the request did not accept.
    #[error("unaccepted status: {0}")]
    UnacceptedStatus(Box<StatusError>),

    /// Malformed configuration document.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HttpError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Status diagnostics, for the status error kinds.
    pub fn status_error(&self) -> Option<&StatusError> {
        match self {
            HttpError::ClientError(e)
            | HttpError::ServerError(e)
            | HttpError::UnknownStatus(e)
            | HttpError::UnacceptedStatus(e) => Some(e),
            _ => None,
        }
    }

    /// Status code, for the status error kinds.
    pub fn status(&self) -> Option<u16> {
        self.status_error().map(|e| e.status)
    }

    pub fn is_io(&self) -> bool {
        matches!(self, HttpError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// I/O error for a response that does not parse as HTTP.
pub(crate) fn malformed(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
