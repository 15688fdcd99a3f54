/*
 * request.rs
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

//! HTTP request: method, URL, query parameters, headers, optional body, accepted status codes.
//!
//! Built once via `RequestBuilder`; the built value is immutable and cheap to clone, so the same
//! request can be executed many times and from several threads.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::http::body::Body;
use crate::http::error::{HttpError, Result};
use crate::http::method::Method;
use crate::http::multimap::{MultiMap, ParamValues};
use crate::uri;

/// Status code every request accepts.
pub const DEFAULT_DECODE_STATUS: u16 = 200;

struct Inner {
    method: Method,
    url: String,
    query_params: MultiMap,
    headers: MultiMap,
    body: Option<Body>,
    decode_status_codes: BTreeSet<u16>,
}

/// Immutable HTTP request.
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn method(&self) -> Method {
        self.inner.method
    }

    /// URL without its query string.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn query_params(&self) -> &MultiMap {
        &self.inner.query_params
    }

    pub fn headers(&self) -> &MultiMap {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name)
    }

    pub fn body(&self) -> Option<&Body> {
        self.inner.body.as_ref()
    }

    /// Status codes considered non-error; always contains 200.
    pub fn decode_status_codes(&self) -> &BTreeSet<u16> {
        &self.inner.decode_status_codes
    }

    /// URL with the percent-encoded query parameters appended.
    pub fn encoded_url(&self) -> String {
        uri::with_query(&self.inner.url, &self.inner.query_params)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("query_params", &self.inner.query_params)
            .field("headers", &self.inner.headers)
            .field("body", &self.inner.body)
            .field("decode_status_codes", &self.inner.decode_status_codes)
            .finish()
    }
}

/// Mutable request draft. `method` checks the body rule at once; `build` checks the rest.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    query_params: MultiMap,
    headers: MultiMap,
    body: Option<Body>,
    decode_status_codes: BTreeSet<u16>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::Get,
            url: None,
            query_params: MultiMap::new(),
            headers: MultiMap::headers(),
            body: None,
            decode_status_codes: BTreeSet::from([DEFAULT_DECODE_STATUS]),
        }
    }

    /// Set the URL. A query string is split off and merged into the query parameters on `build`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set method and body; GET/HEAD must not have a body, POST/PUT/PATCH must.
    pub fn method(mut self, method: Method, body: Option<Body>) -> Result<Self> {
        method.check_body(body.is_some())?;
        self.method = method;
        self.body = body;
        Ok(self)
    }

    pub fn get(self) -> Self {
        self.bodiless(Method::Get)
    }

    pub fn head(self) -> Self {
        self.bodiless(Method::Head)
    }

    pub fn delete(self) -> Self {
        self.bodiless(Method::Delete)
    }

    pub fn options(self) -> Self {
        self.bodiless(Method::Options)
    }

    fn bodiless(mut self, method: Method) -> Self {
        self.method = method;
        self.body = None;
        self
    }

    pub fn post(self, body: impl Into<Body>) -> Self {
        self.with_body(Method::Post, body.into())
    }

    pub fn put(self, body: impl Into<Body>) -> Self {
        self.with_body(Method::Put, body.into())
    }

    pub fn patch(self, body: impl Into<Body>) -> Self {
        self.with_body(Method::Patch, body.into())
    }

    fn with_body(mut self, method: Method, body: Body) -> Self {
        self.method = method;
        self.body = Some(body);
        self
    }

    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Discard prior values for `name`.
    pub fn replace_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.replace(name, value);
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Bulk-merge headers; collection values become repeated headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ParamValues,
    {
        for (name, values) in headers {
            self.headers.add_all(name, values.into_values());
        }
        self
    }

    pub fn add_query_param(mut self, name: impl Into<String>, value: impl ParamValues) -> Self {
        self.query_params.add_all(name, value.into_values());
        self
    }

    /// Bulk-merge query parameters; collection values become repeated parameters.
    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ParamValues,
    {
        for (name, values) in params {
            self.query_params.add_all(name, values.into_values());
        }
        self
    }

    /// Additional accepted status codes; 200 always stays accepted.
    pub fn decode_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.decode_status_codes.extend(codes);
        self
    }

    /// Freeze the draft.
    pub fn build(self) -> Result<Request> {
        let raw_url = self
            .url
            .ok_or_else(|| HttpError::invalid("request URL is required"))?;
        self.method.check_body(self.body.is_some())?;
        let (base, query) = uri::split_query(raw_url.trim());
        if !uri::is_http_url(base) {
            return Err(HttpError::invalid(format!("not an http(s) URL: {}", raw_url)));
        }
        let mut query_params = self.query_params;
        if let Some(query) = query {
            for (name, value) in uri::decode_query(query) {
                query_params.add(name, value);
            }
        }
        Ok(Request {
            inner: Arc::new(Inner {
                method: self.method,
                url: base.to_string(),
                query_params,
                headers: self.headers,
                body: self.body,
                decode_status_codes: self.decode_status_codes,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::RequestBody;

    #[test]
    fn query_string_is_split_off() {
        let req = Request::builder().url("http://x/y?a=1&b=2").build().unwrap();
        assert_eq!(req.url(), "http://x/y");
        assert_eq!(req.query_params().get_all("a"), &["1".to_string()]);
        assert_eq!(req.query_params().get_all("b"), &["2".to_string()]);
        assert_eq!(req.query_params().len(), 2);
        assert_eq!(req.encoded_url(), "http://x/y?a=1&b=2");
    }

    #[test]
    fn url_params_merge_with_explicit_ones() {
        let req = Request::builder()
            .add_query_param("a", 0)
            .url("http://x/y?a=1&c=x+y")
            .query_params([("d", vec!["p", "q"])])
            .build()
            .unwrap();
        assert_eq!(req.query_params().get_all("a"), &["0".to_string(), "1".to_string()]);
        assert_eq!(req.query_params().get("c"), Some("x y"));
        assert_eq!(req.query_params().get_all("d").len(), 2);
    }

    #[test]
    fn body_rules_at_call_site() {
        let body = || Some(Body::from(RequestBody::text("x")));
        for m in [Method::Post, Method::Put, Method::Patch] {
            assert!(matches!(
                Request::builder().url("http://h/").method(m, None),
                Err(HttpError::InvalidArgument(_))
            ));
        }
        for m in [Method::Get, Method::Head] {
            assert!(matches!(
                Request::builder().url("http://h/").method(m, body()),
                Err(HttpError::InvalidArgument(_))
            ));
        }
        assert!(Request::builder()
            .url("http://h/")
            .method(Method::Delete, body())
            .unwrap()
            .build()
            .is_ok());
    }

    #[test]
    fn build_validates_url() {
        assert!(matches!(Request::builder().build(), Err(HttpError::InvalidArgument(_))));
        assert!(Request::builder().url("mailto:x@y").build().is_err());
    }

    #[test]
    fn headers_add_replace_remove() {
        let req = Request::builder()
            .url("https://h/")
            .add_header("X-A", "1")
            .add_header("x-a", "2")
            .add_header("X-B", "1")
            .replace_header("X-B", "2")
            .add_header("X-C", "gone")
            .remove_header("x-c")
            .headers([("X-D", vec!["1", "2"])])
            .build()
            .unwrap();
        assert_eq!(req.headers().get_all("X-A").len(), 2);
        assert_eq!(req.headers().get_all("X-B"), &["2".to_string()]);
        assert!(req.header("X-C").is_none());
        assert_eq!(req.headers().get_all("x-d").len(), 2);
    }

    #[test]
    fn decode_status_codes_extend_default() {
        let req = Request::builder()
            .url("http://h/")
            .decode_status_codes([201, 204])
            .build()
            .unwrap();
        assert_eq!(
            req.decode_status_codes().iter().copied().collect::<Vec<_>>(),
            vec![200, 201, 204]
        );
    }
}
