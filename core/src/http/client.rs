/*
 * client.rs
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

//! HTTP client interface and the built-in direct transport.

use std::collections::BTreeSet;
use std::io;

use crate::http::connection;
use crate::http::error::Result;
use crate::http::method::Method;
use crate::http::options::Options;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBody};
use crate::http::status;
use crate::uri;

/// Maximum number of redirects followed for one `execute`.
pub const MAX_REDIRECTS: usize = 20;

/// Executes requests. Implementations are shareable across threads; each call blocks until the
/// response head has been read.
pub trait Client: Send + Sync {
    /// Options this client was built with.
    fn options(&self) -> &Options;

    /// Execute with the client's own options.
    fn execute(&self, request: &Request) -> Result<Response> {
        self.execute_with(request, self.options())
    }

    /// Execute with `options` in place of the client's own.
    fn execute_with(&self, request: &Request, options: &Options) -> Result<Response>;
}

/// Built-in transport: one blocking HTTP/1.1 connection per exchange.
#[derive(Debug, Clone, Default)]
pub struct DirectClient {
    options: Options,
}

impl DirectClient {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    fn exchange(&self, request: &Request, options: &Options) -> Result<Response> {
        let exchange = connection::send(request, options)?;
        let head = exchange.head;
        let accepted: BTreeSet<u16> = request
            .decode_status_codes()
            .union(options.decode_status_codes())
            .copied()
            .collect();
        Ok(Response::new(
            request.clone(),
            head.version,
            head.status,
            head.reason,
            head.headers,
            exchange.body.map(ResponseBody::Stream),
            accepted,
        ))
    }
}

impl Client for DirectClient {
    fn options(&self) -> &Options {
        &self.options
    }

    fn execute_with(&self, request: &Request, options: &Options) -> Result<Response> {
        let mut current = request.clone();
        let mut hops = 0;
        loop {
            let mut response = self.exchange(&current, options)?;
            if !options.follow_redirects() {
                return Ok(response);
            }
            let Some(next) = redirect_for(&current, &response)? else {
                return Ok(response);
            };
            response.close();
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("too many redirects (more than {})", MAX_REDIRECTS),
                )
                .into());
            }
            log::debug!(
                "redirect {} -> {} {}",
                response.status(),
                next.method(),
                next.encoded_url()
            );
            current = next;
        }
    }
}

/// Follow-up request for a redirect response, or `None` when it is not followed.
fn redirect_for(current: &Request, response: &Response) -> Result<Option<Request>> {
    let code = response.status();
    if !status::is_redirect(code) {
        return Ok(None);
    }
    let Some(location) = response.header("Location") else {
        return Ok(None);
    };
    let method = match (code, current.method()) {
        (307 | 308, _) if current.body().is_some() => return Ok(None),
        (307 | 308, m) => m,
        (303, Method::Head) => Method::Head,
        (303, _) => Method::Get,
        (_, m @ (Method::Get | Method::Head)) => m,
        _ => Method::Get,
    };
    let target = uri::resolve_location(&current.encoded_url(), location)?;
    let same_origin = match (uri::parse_url(&current.encoded_url()), uri::parse_url(&target)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    };
    let mut builder = Request::builder()
        .url(target)
        .method(method, None)?
        .decode_status_codes(current.decode_status_codes().iter().copied());
    for (name, values) in current.headers().iter() {
        if is_body_header(name) || (!same_origin && is_credential_header(name)) {
            continue;
        }
        builder = builder.headers([(name, values.to_vec())]);
    }
    Ok(Some(builder.build()?))
}

fn is_body_header(name: &str) -> bool {
    ["content-type", "content-length", "content-encoding", "transfer-encoding"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

fn is_credential_header(name: &str) -> bool {
    ["authorization", "cookie", "proxy-authorization"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::body::RequestBody;
    use crate::http::connection::HttpVersion;
    use crate::http::multimap::MultiMap;

    fn redirect(current: &Request, code: u16, location: &str) -> Response {
        let mut headers = MultiMap::headers();
        headers.add("Location", location);
        Response::new(
            current.clone(),
            HttpVersion::Http1_1,
            code,
            None,
            headers,
            None,
            BTreeSet::from([200]),
        )
    }

    #[test]
    fn see_other_switches_to_get() {
        let post = Request::builder()
            .url("http://h/a/b")
            .post(RequestBody::text("x"))
            .add_header("Content-Type", "text/plain")
            .add_header("Authorization", "Bearer t")
            .build()
            .unwrap();
        let next = redirect_for(&post, &redirect(&post, 303, "c?q=1")).unwrap().unwrap();
        assert_eq!(next.method(), Method::Get);
        assert!(next.body().is_none());
        assert_eq!(next.url(), "http://h/a/c");
        assert_eq!(next.query_params().get("q"), Some("1"));
        assert!(next.header("Content-Type").is_none());
        assert_eq!(next.header("Authorization"), Some("Bearer t"));
    }

    #[test]
    fn temporary_redirect_keeps_method_without_body() {
        let get = Request::builder()
            .url("http://h/a")
            .add_header("Authorization", "Bearer t")
            .build()
            .unwrap();
        let next = redirect_for(&get, &redirect(&get, 307, "https://other/x")).unwrap().unwrap();
        assert_eq!(next.method(), Method::Get);
        assert_eq!(next.url(), "https://other/x");
        assert!(next.header("Authorization").is_none());

        let put = Request::builder()
            .url("http://h/a")
            .put(RequestBody::text("x"))
            .build()
            .unwrap();
        assert!(redirect_for(&put, &redirect(&put, 308, "/y")).unwrap().is_none());
    }

    #[test]
    fn dot_segment_location_is_normalised() {
        let get = Request::builder().url("http://h/a/b/c").build().unwrap();
        let next = redirect_for(&get, &redirect(&get, 302, "../d")).unwrap().unwrap();
        assert_eq!(next.url(), "http://h/a/d");
        let next = redirect_for(&get, &redirect(&get, 301, "./e f")).unwrap().unwrap();
        assert_eq!(next.url(), "http://h/a/b/e%20f");
    }

    #[test]
    fn not_a_redirect() {
        let get = Request::builder().url("http://h/a").build().unwrap();
        assert!(redirect_for(&get, &redirect(&get, 200, "/y")).unwrap().is_none());
        assert!(redirect_for(&get, &redirect(&get, 304, "/y")).unwrap().is_none());
    }
}
