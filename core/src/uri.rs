/*
 * uri.rs
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

//! http/https URL helpers: query splitting, form-style percent coding, authority parsing and
//! redirect resolution.

use std::io;

use percent_encoding::{percent_decode, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::{Host, Url};

use crate::http::charset::Charset;
use crate::http::multimap::MultiMap;

/// Form component set: everything except ALPHA / DIGIT / `-` `_` `.` `*` is encoded.
const FORM_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// Split `url` into the part before `?` and the query string. Any fragment is dropped.
pub fn split_query(url: &str) -> (&str, Option<&str>) {
    let url = match url.find('#') {
        Some(i) => &url[..i],
        None => url,
    };
    match url.find('?') {
        Some(i) => (&url[..i], Some(&url[i + 1..])),
        None => (url, None),
    }
}

/// Decode one form component: `+` is a space, then percent-decoding (UTF-8, lossy).
pub fn decode_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    percent_decode(plus_decoded.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

/// Decode a query string into (name, value) pairs. A pair without `=` has an empty value; empty
/// segments are skipped.
pub fn decode_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.find('=') {
            Some(i) => (decode_component(&pair[..i]), decode_component(&pair[i + 1..])),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

/// Percent-encode one form component in `charset`; space becomes `+`.
pub fn encode_component(s: &str, charset: Charset) -> String {
    let bytes = charset.encode(s);
    percent_encode(&bytes, FORM_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// Encode (name, value) pairs as `n=v&n=v` in `charset`.
pub fn encode_pairs<'a, I>(pairs: I, charset: Charset) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (name, value) in pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode_component(name, charset));
        out.push('=');
        out.push_str(&encode_component(value, charset));
    }
    out
}

/// Base URL plus the UTF-8 encoded query parameters (unchanged when there are none).
pub fn with_query(base: &str, params: &MultiMap) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query = encode_pairs(params.pairs(), Charset::Utf8);
    if query.is_empty() {
        return base.to_string();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, sep, query)
}

/// Connection-relevant parts of an absolute http/https URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    /// Path plus query, always starting with `/`, percent-encoded for the request line.
    pub path_and_query: String,
    /// Normalised absolute form without fragment, for requests through an HTTP proxy.
    pub absolute: String,
}

impl UrlParts {
    /// Host header value: port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        let host = bracket(&self.host);
        if (self.secure && self.port == 443) || (!self.secure && self.port == 80) {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `scheme://authority` prefix.
    pub fn origin(&self) -> String {
        format!("{}://{}", if self.secure { "https" } else { "http" }, self.host_header())
    }
}

/// IPv6 literals in brackets, as they appear in an authority.
pub(crate) fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

fn invalid_url(url: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid URL: {}", url))
}

/// Parse `url` and require an http or https scheme with a host.
fn parse_http(url: &str) -> io::Result<Url> {
    let parsed = Url::parse(url).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("invalid URL {}: {}", url, e))
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed),
        _ => Err(invalid_url(url)),
    }
}

fn parts_of(mut url: Url) -> io::Result<UrlParts> {
    url.set_fragment(None);
    let secure = url.scheme() == "https";
    let host = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(invalid_url(url.as_str())),
    };
    if host.is_empty() {
        return Err(invalid_url(url.as_str()));
    }
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid_url(url.as_str()))?;
    let path_and_query = match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    };
    // userinfo is never sent
    let _ = url.set_username("");
    let _ = url.set_password(None);
    Ok(UrlParts {
        secure,
        host,
        port,
        path_and_query,
        absolute: url.into(),
    })
}

/// Parse an absolute http or https URL. User info is dropped; the path is percent-encoded and
/// dot segments are removed.
pub fn parse_url(url: &str) -> io::Result<UrlParts> {
    parts_of(parse_http(url)?)
}

/// True if `url` is an absolute http or https URL.
pub fn is_http_url(url: &str) -> bool {
    parse_url(url).is_ok()
}

/// Resolve a redirect `Location` against the URL that produced it (RFC 3986 reference
/// resolution). The result must itself be http or https.
pub fn resolve_location(current: &str, location: &str) -> io::Result<String> {
    let base = parse_http(current)?;
    let mut next = base.join(location.trim()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid redirect location {}: {}", location, e),
        )
    })?;
    next.set_fragment(None);
    let next: String = next.into();
    parse_http(&next)?;
    Ok(next)
}
