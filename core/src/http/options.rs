/*
 * options.rs
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

//! Connection options and proxy configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::http::error::{HttpError, Result};
use crate::http::request::DEFAULT_DECODE_STATUS;

/// Default connect/read/write timeout (60 s).
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// How to reach the origin server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyType {
    /// No proxy configured.
    #[default]
    None,
    /// Explicitly direct.
    Direct,
    Http,
    Socks,
}

impl FromStr for ProxyType {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ProxyType::None),
            "direct" => Ok(ProxyType::Direct),
            "http" => Ok(ProxyType::Http),
            "socks" | "socks5" => Ok(ProxyType::Socks),
            other => Err(HttpError::invalid(format!("unknown proxy type: {}", other))),
        }
    }
}

/// Proxy username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Proxy configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxyInfo {
    proxy_type: ProxyType,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl ProxyInfo {
    /// No proxy.
    pub fn none() -> Self {
        Self::default()
    }

    /// Direct connection.
    pub fn direct() -> Self {
        Self {
            proxy_type: ProxyType::Direct,
            ..Self::default()
        }
    }

    /// Proxy at `host:port`. HTTP and SOCKS proxies need a host and a port in 1..=65535.
    pub fn new(proxy_type: ProxyType, host: impl Into<String>, port: u32) -> Result<Self> {
        let host = host.into();
        if matches!(proxy_type, ProxyType::None | ProxyType::Direct) {
            return Ok(Self {
                proxy_type,
                ..Self::default()
            });
        }
        if host.trim().is_empty() {
            return Err(HttpError::invalid("proxy host is required"));
        }
        if !(1..=65535).contains(&port) {
            return Err(HttpError::invalid(format!("proxy port out of range: {}", port)));
        }
        Ok(Self {
            proxy_type,
            host,
            port: port as u16,
            credentials: None,
        })
    }

    pub fn http(host: impl Into<String>, port: u32) -> Result<Self> {
        Self::new(ProxyType::Http, host, port)
    }

    pub fn socks(host: impl Into<String>, port: u32) -> Result<Self> {
        Self::new(ProxyType::Socks, host, port)
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn proxy_type(&self) -> ProxyType {
        self.proxy_type
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// True for HTTP and SOCKS proxies.
    pub fn is_proxied(&self) -> bool {
        matches!(self.proxy_type, ProxyType::Http | ProxyType::Socks)
    }
}

/// Connection options. Immutable once built; `Options::default()` is the process default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    connect_timeout_ms: u64,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
    follow_redirects: bool,
    retry_count: u32,
    proxy: ProxyInfo,
    decode_status_codes: BTreeSet<u16>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            retry_count: 0,
            proxy: ProxyInfo::none(),
            decode_status_codes: BTreeSet::from([DEFAULT_DECODE_STATUS]),
        }
    }
}

fn timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Shared process-wide default instance.
    pub fn global() -> &'static Options {
        static DEFAULT: OnceLock<Options> = OnceLock::new();
        DEFAULT.get_or_init(Options::default)
    }

    /// Builder seeded with these options.
    pub fn to_builder(&self) -> OptionsBuilder {
        OptionsBuilder {
            options: self.clone(),
        }
    }

    pub fn connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }

    pub fn write_timeout_ms(&self) -> u64 {
        self.write_timeout_ms
    }

    /// Connect timeout; `None` when configured as 0 (wait indefinitely).
    pub fn connect_timeout(&self) -> Option<Duration> {
        timeout(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        timeout(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        timeout(self.write_timeout_ms)
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Configured retry count. The client never retries by itself; callers wanting retries wrap
    /// `execute`.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn proxy(&self) -> &ProxyInfo {
        &self.proxy
    }

    /// Accepted status codes; always contains 200.
    pub fn decode_status_codes(&self) -> &BTreeSet<u16> {
        &self.decode_status_codes
    }
}

/// Options draft.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Milliseconds; 0 disables the timeout.
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.options.connect_timeout_ms = ms;
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.options.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.options.write_timeout_ms = ms;
        self
    }

    /// Set all three timeouts.
    pub fn timeout_ms(self, ms: u64) -> Self {
        self.connect_timeout_ms(ms).read_timeout_ms(ms).write_timeout_ms(ms)
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.options.follow_redirects = follow;
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.options.retry_count = count;
        self
    }

    pub fn proxy(mut self, proxy: ProxyInfo) -> Self {
        self.options.proxy = proxy;
        self
    }

    /// Additional accepted status codes; 200 always stays accepted.
    pub fn decode_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.options.decode_status_codes.extend(codes);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert_eq!(o.connect_timeout_ms(), 60_000);
        assert_eq!(o.read_timeout(), Some(Duration::from_secs(60)));
        assert!(o.follow_redirects());
        assert_eq!(o.retry_count(), 0);
        assert_eq!(o.proxy().proxy_type(), ProxyType::None);
        assert!(o.decode_status_codes().contains(&200));
        assert_eq!(Options::global(), &o);
    }

    #[test]
    fn zero_timeout_means_none() {
        let o = Options::builder().timeout_ms(0).build();
        assert_eq!(o.connect_timeout(), None);
        assert_eq!(o.write_timeout(), None);
    }

    #[test]
    fn proxy_port_validated() {
        assert!(matches!(ProxyInfo::http("p", 0), Err(HttpError::InvalidArgument(_))));
        assert!(matches!(ProxyInfo::socks("p", 70000), Err(HttpError::InvalidArgument(_))));
        assert!(ProxyInfo::http("", 8080).is_err());
        let p = ProxyInfo::http("p", 3128).unwrap().with_credentials("u", "pw");
        assert_eq!(p.port(), 3128);
        assert!(!format!("{:?}", p).contains("pw"));
    }

    #[test]
    fn builder_round_trip() {
        let o = Options::builder()
            .read_timeout_ms(5)
            .retry_count(3)
            .decode_status_codes([204])
            .build();
        let o2 = o.to_builder().follow_redirects(false).build();
        assert_eq!(o2.read_timeout_ms(), 5);
        assert_eq!(o2.retry_count(), 3);
        assert!(!o2.follow_redirects());
        assert_eq!(o2.decode_status_codes().len(), 2);
    }
}
