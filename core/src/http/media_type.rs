/*
 * media_type.rs
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

//! Content-Type values (RFC 9110 §8.3) and file-extension lookup.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::http::charset::Charset;
use crate::http::error::HttpError;

pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const TEXT_PLAIN: &str = "text/plain";

/// Parsed media type: `type/subtype` plus ordered parameters (names lowercased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    primary_type: String,
    sub_type: String,
    parameters: Vec<(String, String)>,
}

fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

impl MediaType {
    pub fn new(primary_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            primary_type: primary_type.into().to_ascii_lowercase(),
            sub_type: sub_type.into().to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    /// Parse a Content-Type header value.
    pub fn parse(value: &str) -> Result<MediaType, HttpError> {
        let value = value.trim();
        let (type_part, params_part) = match value.find(';') {
            Some(i) => (value[..i].trim(), &value[i + 1..]),
            None => (value, ""),
        };
        let slash = type_part
            .find('/')
            .ok_or_else(|| HttpError::invalid(format!("invalid media type: {}", value)))?;
        let primary = type_part[..slash].trim();
        let sub = type_part[slash + 1..].trim();
        if !is_token(primary) || !is_token(sub) {
            return Err(HttpError::invalid(format!("invalid media type: {}", value)));
        }
        let mut media_type = MediaType::new(primary, sub);
        for param in split_parameters(params_part) {
            let Some(eq) = param.find('=') else { continue };
            let name = param[..eq].trim();
            if !is_token(name) {
                continue;
            }
            let raw = param[eq + 1..].trim();
            let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
                unquote(&raw[1..raw.len() - 1])
            } else {
                raw.to_string()
            };
            media_type = media_type.with_parameter(name, value);
        }
        Ok(media_type)
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary_type, self.sub_type)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(primary) && self.sub_type.eq_ignore_ascii_case(sub)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace a parameter.
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.parameters.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.parameters.push((name, value)),
        }
        self
    }

    /// Charset parameter, if present and supported.
    pub fn charset(&self) -> Option<Charset> {
        self.parameter("charset").and_then(|c| Charset::for_name(c).ok())
    }

    pub fn with_charset(self, charset: Charset) -> Self {
        self.with_parameter("charset", charset.name())
    }

    /// Media type for a file name, from its extension.
    pub fn for_path(path: &Path) -> MediaType {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let essence = mime_from_extension(&ext);
        // table entries are always valid
        MediaType::parse(essence).unwrap_or_else(|_| MediaType::new("application", "octet-stream"))
    }
}

fn split_parameters(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn unquote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary_type, self.sub_type)?;
        for (name, value) in &self.parameters {
            if is_token(value) {
                write!(f, "; {}={}", name, value)?;
            } else {
                write!(f, "; {}=\"{}\"", name, value.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

/// Media type essence for a lowercase file extension.
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext {
        "txt" | "text" | "log" => "text/plain",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "eml" => "message/rfc822",
        "wasm" => "application/wasm",
        _ => APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_quoted_parameter() {
        let mt = MediaType::parse("Multipart/Form-Data; boundary=\"a;b\"; charset=utf-8").unwrap();
        assert!(mt.is_mime_type("multipart", "form-data"));
        assert_eq!(mt.parameter("boundary"), Some("a;b"));
        assert_eq!(mt.charset(), Some(Charset::Utf8));
        assert_eq!(mt.to_string(), "multipart/form-data; boundary=\"a;b\"; charset=utf-8");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(MediaType::parse("nonsense").is_err());
        assert!(MediaType::parse("text/ plain oops").is_err());
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(MediaType::for_path(Path::new("/tmp/a.PNG")).essence(), "image/png");
        assert_eq!(MediaType::for_path(Path::new("noext")).essence(), "application/octet-stream");
    }
}
