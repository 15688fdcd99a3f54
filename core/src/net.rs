/*
 * net.rs
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

//! Blocking transport: TCP connect with timeouts, rustls for https, HTTP CONNECT tunnels and
//! SOCKS5 proxies.
//!
//! A connection is either plain or secure. Through an HTTP proxy, https targets are tunnelled with
//! CONNECT and http targets talk to the proxy directly (the request line then carries the
//! absolute URL). Through a SOCKS proxy, the handshake runs first and TLS, if any, on top.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::BytesMut;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::http::error::malformed;
use crate::http::options::{Credentials, Options, ProxyType};
use crate::uri::{bracket, UrlParts};

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => log::debug!("native certificates unavailable: {}", e),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// TLS client config for HTTP/1.1 (ALPN http/1.1). Built once per process.
pub fn http_client_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let mut config = ClientConfig::builder()
                .with_root_certificates(build_root_store())
                .with_no_client_auth();
            config.alpn_protocols = vec![b"http/1.1".to_vec()];
            Arc::new(config)
        })
        .clone()
}

/// Plain TCP or TLS stream.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl HttpStream {
    fn tcp(&self) -> &TcpStream {
        match self {
            HttpStream::Plain(s) => s,
            HttpStream::Tls(s) => s.get_ref(),
        }
    }

    /// Close both directions of the underlying socket.
    pub fn shutdown(&mut self) {
        if let HttpStream::Tls(s) = self {
            s.conn.send_close_notify();
            let _ = s.flush();
        }
        let _ = self.tcp().shutdown(Shutdown::Both);
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.read(buf),
            // servers routinely close without close_notify; the response framing decides
            // whether the body was complete
            HttpStream::Tls(s) => match s.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                other => other,
            },
        }
    }
}

impl Write for HttpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.write(buf),
            HttpStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            HttpStream::Plain(s) => s.flush(),
            HttpStream::Tls(s) => s.flush(),
        }
    }
}

/// Resolve `host:port`; IP literals skip the resolver.
fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {}", host),
        ));
    }
    Ok(addrs)
}

/// Connect to the first reachable address, then apply read/write timeouts.
fn connect_tcp(host: &str, port: u16, options: &Options) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in resolve(host, port)? {
        let attempt = match options.connect_timeout() {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(options.read_timeout())?;
                stream.set_write_timeout(options.write_timeout())?;
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                log::debug!("connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotConnected, format!("cannot connect to {}", host))
    }))
}

fn tls_handshake(tcp: TcpStream, host: &str) -> io::Result<HttpStream> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
    let conn = ClientConnection::new(http_client_config(), server_name)
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
    let mut tls = StreamOwned::new(conn, tcp);
    // drive the handshake now so certificate errors surface at connect time
    while tls.conn.is_handshaking() {
        tls.conn.complete_io(&mut tls.sock)?;
    }
    Ok(HttpStream::Tls(Box::new(tls)))
}

/// `Proxy-Authorization` value for basic credentials.
pub(crate) fn basic_auth(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", BASE64.encode(raw.as_bytes()))
}

/// Open a stream to `target`, honouring the proxy in `options`.
pub fn connect(target: &UrlParts, options: &Options) -> io::Result<HttpStream> {
    let proxy = options.proxy();
    let tcp = match proxy.proxy_type() {
        ProxyType::Http => {
            log::debug!("connecting to {} via HTTP proxy {}:{}", target.host, proxy.host(), proxy.port());
            let tcp = connect_tcp(proxy.host(), proxy.port(), options)?;
            if !target.secure {
                return Ok(HttpStream::Plain(tcp));
            }
            connect_tunnel(tcp, target, proxy.credentials())?
        }
        ProxyType::Socks => {
            log::debug!("connecting to {} via SOCKS proxy {}:{}", target.host, proxy.host(), proxy.port());
            let tcp = connect_tcp(proxy.host(), proxy.port(), options)?;
            socks5_handshake(tcp, &target.host, target.port, proxy.credentials())?
        }
        ProxyType::None | ProxyType::Direct => connect_tcp(&target.host, target.port, options)?,
    };
    if target.secure {
        tls_handshake(tcp, &target.host)
    } else {
        Ok(HttpStream::Plain(tcp))
    }
}

/// Establish an HTTP CONNECT tunnel through a proxy.
fn connect_tunnel(
    mut tcp: TcpStream,
    target: &UrlParts,
    credentials: Option<&Credentials>,
) -> io::Result<TcpStream> {
    let authority = format!("{}:{}", bracket(&target.host), target.port);
    let mut req = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", authority, authority);
    if let Some(c) = credentials {
        req.push_str("Proxy-Authorization: ");
        req.push_str(&basic_auth(c));
        req.push_str("\r\n");
    }
    req.push_str("\r\n");
    tcp.write_all(req.as_bytes())?;
    tcp.flush()?;

    // read byte-wise up to the blank line so nothing past the proxy response is consumed
    let mut head = BytesMut::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if tcp.read(&mut byte)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed connection during CONNECT",
            ));
        }
        head.extend_from_slice(&byte);
        if head.len() > 16 * 1024 {
            return Err(malformed("CONNECT response too large"));
        }
    }
    let status_line = String::from_utf8_lossy(&head);
    let status_line = status_line.lines().next().unwrap_or("");
    let code = status_line.split(' ').nth(1).and_then(|c| c.parse::<u16>().ok());
    match code {
        Some(c) if (200..300).contains(&c) => Ok(tcp),
        _ => Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("CONNECT failed: {}", status_line.trim()),
        )),
    }
}

fn socks_error(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, msg.into())
}

/// SOCKS5 CONNECT (RFC 1928), with username/password authentication (RFC 1929) when credentials
/// are configured.
fn socks5_handshake(
    mut stream: TcpStream,
    host: &str,
    port: u16,
    credentials: Option<&Credentials>,
) -> io::Result<TcpStream> {
    let greeting: &[u8] = if credentials.is_some() {
        &[0x05, 0x02, 0x00, 0x02]
    } else {
        &[0x05, 0x01, 0x00]
    };
    stream.write_all(greeting)?;
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice)?;
    if choice[0] != 0x05 {
        return Err(socks_error("not a SOCKS5 proxy"));
    }
    match (choice[1], credentials) {
        (0x00, _) => {}
        (0x02, Some(c)) => {
            let user = c.username.as_bytes();
            let pass = c.password.as_bytes();
            if user.len() > 255 || pass.len() > 255 {
                return Err(socks_error("SOCKS5 credentials too long"));
            }
            let mut auth = Vec::with_capacity(3 + user.len() + pass.len());
            auth.push(0x01);
            auth.push(user.len() as u8);
            auth.extend_from_slice(user);
            auth.push(pass.len() as u8);
            auth.extend_from_slice(pass);
            stream.write_all(&auth)?;
            let mut status = [0u8; 2];
            stream.read_exact(&mut status)?;
            if status[1] != 0x00 {
                return Err(socks_error("SOCKS5 authentication failed"));
            }
        }
        _ => return Err(socks_error("SOCKS5 proxy offered no acceptable authentication method")),
    }

    let mut request = vec![0x05, 0x01, 0x00];
    match host.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(ip)) => {
            request.push(0x01);
            request.extend_from_slice(&ip.octets());
        }
        Ok(std::net::IpAddr::V6(ip)) => {
            request.push(0x04);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            if host.len() > 255 {
                return Err(socks_error("host name too long for SOCKS5"));
            }
            request.push(0x03);
            request.push(host.len() as u8);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply)?;
    if reply[1] != 0x00 {
        return Err(socks_error(format!("SOCKS5 connect rejected: {}", reply[1])));
    }
    // skip the bound address
    let remaining = match reply[3] {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len)?;
            len[0] as usize + 2
        }
        other => return Err(socks_error(format!("invalid SOCKS5 address type {}", other))),
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound)?;
    Ok(stream)
}
