/*
 * config.rs
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

//! Client options from XML. All parsing goes through quick_xml.
//!
//! ```xml
//! <options>
//!   <connect-timeout>5000</connect-timeout>
//!   <read-timeout>10000</read-timeout>
//!   <write-timeout>10000</write-timeout>
//!   <follow-redirects>false</follow-redirects>
//!   <retry-count>2</retry-count>
//!   <decode-status>201</decode-status>
//!   <proxy type="http" host="proxy.local" port="3128" username="u" password="p"/>
//! </options>
//! ```
//!
//! Elements not listed are ignored; missing elements keep their defaults.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::http::error::{HttpError, Result};
use crate::http::options::{Options, OptionsBuilder, ProxyInfo, ProxyType};

fn config_error(msg: impl Into<String>) -> HttpError {
    HttpError::Config(msg.into())
}

fn parse_number<T: std::str::FromStr>(element: &str, text: &str) -> Result<T> {
    text.trim()
        .parse::<T>()
        .map_err(|_| config_error(format!("<{}>: not a number: {:?}", element, text)))
}

fn parse_bool(element: &str, text: &str) -> Result<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(config_error(format!("<{}>: not a boolean: {:?}", element, text))),
    }
}

/// `<proxy>` attributes.
fn parse_proxy(e: &BytesStart<'_>) -> Result<ProxyInfo> {
    let mut proxy_type = ProxyType::None;
    let mut host = String::new();
    let mut port = 0u32;
    let mut username = None;
    let mut password = String::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| config_error(format!("<proxy>: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| config_error(format!("<proxy>: {}", e)))?;
        match attr.key.as_ref() {
            b"type" => proxy_type = value.parse()?,
            b"host" => host = value.into_owned(),
            b"port" => port = parse_number("proxy port", &value)?,
            b"username" => username = Some(value.into_owned()),
            b"password" => password = value.into_owned(),
            other => log::warn!(
                "ignoring unknown proxy attribute {}",
                String::from_utf8_lossy(other)
            ),
        }
    }
    let proxy = ProxyInfo::new(proxy_type, host, port)?;
    Ok(match username {
        Some(u) => proxy.with_credentials(u, password),
        None => proxy,
    })
}

fn apply(builder: OptionsBuilder, element: &str, text: &str) -> Result<OptionsBuilder> {
    Ok(match element {
        "connect-timeout" => builder.connect_timeout_ms(parse_number(element, text)?),
        "read-timeout" => builder.read_timeout_ms(parse_number(element, text)?),
        "write-timeout" => builder.write_timeout_ms(parse_number(element, text)?),
        "timeout" => builder.timeout_ms(parse_number(element, text)?),
        "follow-redirects" => builder.follow_redirects(parse_bool(element, text)?),
        "retry-count" => builder.retry_count(parse_number(element, text)?),
        "decode-status" => builder.decode_status_codes([parse_number::<u16>(element, text)?]),
        _ => {
            log::warn!("ignoring unknown option <{}>", element);
            builder
        }
    })
}

/// Parse an `<options>` document, starting from the process defaults.
pub fn parse_options(content: &str) -> Result<Options> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut builder = Options::builder();
    let mut depth = 0usize;
    let mut element = String::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(config_error(format!("XML parse error: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == 1 {
                    if name != "options" {
                        return Err(config_error(format!("expected <options>, found <{}>", name)));
                    }
                    seen_root = true;
                } else if depth == 2 {
                    if name == "proxy" {
                        builder = builder.proxy(parse_proxy(&e)?);
                    }
                    element = name;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if depth == 0 && name == "options" {
                    seen_root = true;
                } else if depth == 1 && name == "proxy" {
                    builder = builder.proxy(parse_proxy(&e)?);
                }
            }
            Ok(Event::Text(e)) => {
                if depth == 2 && !element.is_empty() && element != "proxy" {
                    let text = e
                        .unescape()
                        .map_err(|e| config_error(format!("<{}>: {}", element, e)))?;
                    builder = apply(builder, &element, &text)?;
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    element.clear();
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        buf.clear();
    }
    if !seen_root {
        return Err(config_error("missing <options> element"));
    }
    Ok(builder.build())
}

/// Read and parse an options file.
pub fn load_options(path: impl AsRef<Path>) -> Result<Options> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    log::debug!("loading HTTP options from {}", path.display());
    parse_options(&content)
}
