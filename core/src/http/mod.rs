/*
 * mod.rs
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

//! HTTP client: pluggable providers over an immutable request/response model.
//!
//! - Values: `Method`, status registry, `MediaType`/`Charset`, case-insensitive header `MultiMap`.
//! - Requests are built once with `RequestBuilder` and can be executed any number of times.
//! - Bodies: plain (`RequestBody`), URL-encoded `FormBody`, `MultipartBody` with streamed parts.
//! - `Registry` resolves a `ClientBuilder`; the built-in `direct` provider speaks HTTP/1.1 over
//!   blocking sockets (rustls for https, HTTP and SOCKS5 proxies).
//! - `Response::check_status` turns unaccepted statuses into typed errors.

mod body;
pub(crate) mod charset;
mod client;
mod connection;
pub(crate) mod error;
mod form;
mod media_type;
mod method;
pub(crate) mod multimap;
mod multipart;
pub(crate) mod options;
mod provider;
mod request;
mod response;

pub mod h1;
pub mod status;

pub use body::{Body, RequestBody};
pub use charset::Charset;
pub use client::{Client, DirectClient, MAX_REDIRECTS};
pub use connection::{HttpVersion, WireBody, CHUNK_SIZE};
pub use error::{HttpError, Result, StatusError};
pub use form::{FormBody, FormBuilder};
pub use media_type::{
    mime_from_extension, MediaType, APPLICATION_FORM_URLENCODED, APPLICATION_JSON,
    APPLICATION_OCTET_STREAM, MULTIPART_FORM_DATA, TEXT_PLAIN,
};
pub use method::Method;
pub use multimap::{MultiMap, ParamValues};
pub use multipart::{MultipartBody, MultipartBuilder, Part, PartPayload};
pub use options::{Credentials, Options, OptionsBuilder, ProxyInfo, ProxyType, DEFAULT_TIMEOUT_MS};
pub use provider::{ClientBuilder, DirectClientBuilder, Registry, DIRECT};
pub use request::{Request, RequestBuilder, DEFAULT_DECODE_STATUS};
pub use response::{Response, ResponseBody};
pub use status::Series;
