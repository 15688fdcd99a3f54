/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the direct HTTP client. Each test runs a scripted HTTP/1.1 server on a
 * loopback listener, so no network access is needed.
 *
 * Run with:
 *   cargo test -p tramite_core --test http_integration -- --nocapture
 */

use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use flate2::read::{GzDecoder, ZlibDecoder};

use tramite_core::http::{
    Client, DirectClient, FormBody, HttpError, HttpVersion, Method, MultipartBody, Options,
    Registry, Request, RequestBody,
};

/// One request as the server saw it: head (request line + headers) and de-chunked body.
#[derive(Debug)]
struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

fn read_request(stream: &TcpStream) -> Captured {
    let mut reader = BufReader::new(stream);
    let mut head = String::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line == "\r\n" || line.is_empty() {
            break;
        }
        head.push_str(&line);
    }
    let mut captured = Captured {
        head,
        body: Vec::new(),
    };
    if let Some(len) = captured.header("Content-Length") {
        let mut body = vec![0u8; len.parse().unwrap()];
        reader.read_exact(&mut body).unwrap();
        captured.body = body;
    } else if captured.header("Transfer-Encoding").as_deref() == Some("chunked") {
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).unwrap();
            let size = usize::from_str_radix(size.trim(), 16).unwrap();
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).unwrap();
            if size == 0 {
                break;
            }
            captured.body.extend_from_slice(&chunk[..size]);
        }
    }
    captured
}

/// Serve one scripted response per connection, in order; returns what each request carried.
fn serve(responses: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().unwrap();
            seen.push(read_request(&stream));
            stream.write_all(&response).unwrap();
            stream.flush().unwrap();
        }
        seen
    });
    (base, handle)
}

fn client() -> DirectClient {
    DirectClient::new(Options::builder().timeout_ms(5000).build())
}

#[test]
fn get_with_query_params() {
    let (base, server) = serve(vec![
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
    ]);
    let request = Request::builder()
        .url(format!("{}/path?a=1", base))
        .add_query_param("b", vec!["x y", "z"])
        .add_header("X-Trace", "t1")
        .build()
        .unwrap();
    let mut response = client().execute(&request).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.reason(), Some("OK"));
    assert!(!response.has_error());
    assert_eq!(response.content_length(), Some(5));
    assert_eq!(response.text().unwrap(), "hello");

    let seen = server.join().unwrap();
    let line = seen[0].request_line();
    assert!(line.starts_with("GET /path?"), "{}", line);
    assert!(line.contains("a=1"));
    assert!(line.contains("b=x+y&b=z"));
    assert!(line.ends_with(" HTTP/1.1"));
    let host = base.trim_start_matches("http://");
    assert_eq!(seen[0].header("Host").as_deref(), Some(host));
    assert_eq!(seen[0].header("Accept").as_deref(), Some("*/*"));
    assert_eq!(seen[0].header("Connection").as_deref(), Some("close"));
    assert_eq!(seen[0].header("X-Trace").as_deref(), Some("t1"));
    assert!(seen[0].header("User-Agent").is_some());
}

#[test]
fn form_post_uses_content_length() {
    let (base, server) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()]);
    let form = FormBody::builder().add("user", "jo smith").add("n", "1").build();
    let request = Request::builder()
        .url(format!("{}/login", base))
        .post(form)
        .build()
        .unwrap();
    let mut response = client().execute(&request).unwrap();
    assert_eq!(response.bytes().unwrap().len(), 0);

    let seen = server.join().unwrap();
    assert_eq!(seen[0].request_line(), "POST /login HTTP/1.1");
    assert_eq!(seen[0].header("Content-Length").as_deref(), Some("17"));
    assert!(seen[0].header("Transfer-Encoding").is_none());
    assert_eq!(
        seen[0].header("Content-Type").as_deref(),
        Some("application/x-www-form-urlencoded; charset=UTF-8")
    );
    assert_eq!(seen[0].body, b"user=jo+smith&n=1");
}

#[test]
fn multipart_is_chunked_and_streams_are_closed() {
    let (base, server) = serve(vec![b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n".to_vec()]);
    let multipart = MultipartBody::builder()
        .boundary("XyZ")
        .add("field", "v")
        .add_stream(
            "up",
            Some("a.bin".to_string()),
            None,
            Cursor::new(b"data".to_vec()),
        )
        .build();
    let request = Request::builder()
        .url(format!("{}/upload", base))
        .post(multipart)
        .decode_status_codes([201])
        .build()
        .unwrap();
    let response = client().execute(&request).unwrap();
    assert!(!response.has_error());
    let parts = request.body().unwrap().as_multipart().unwrap().parts();
    assert!(!parts[1].is_open());

    let seen = server.join().unwrap();
    assert_eq!(seen[0].header("Transfer-Encoding").as_deref(), Some("chunked"));
    assert!(seen[0].header("Content-Length").is_none());
    assert_eq!(
        seen[0].header("Content-Type").as_deref(),
        Some("multipart/form-data; boundary=XyZ")
    );
    let expected = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"field\"\r\n",
        "\r\n",
        "v\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"up\"; filename=\"a.bin\"\r\n",
        "Content-Type: application/octet-stream\r\n",
        "\r\n",
        "data\r\n",
        "--XyZ--\r\n",
    );
    assert_eq!(String::from_utf8_lossy(&seen[0].body), expected);
}

#[test]
fn gzip_request_body_round_trips() {
    let (base, server) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()]);
    let text = "compress me ".repeat(2000);
    let request = Request::builder()
        .url(format!("{}/gz", base))
        .put(RequestBody::text(&text))
        .add_header("Content-Encoding", "gzip")
        .build()
        .unwrap();
    client().execute(&request).unwrap();

    let seen = server.join().unwrap();
    assert_eq!(seen[0].header("Transfer-Encoding").as_deref(), Some("chunked"));
    assert_eq!(seen[0].header("Content-Encoding").as_deref(), Some("gzip"));
    let mut decoded = String::new();
    GzDecoder::new(&seen[0].body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, text);
}

#[test]
fn deflate_request_body_round_trips() {
    let (base, server) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()]);
    let text = "deflate me ".repeat(3000);
    let request = Request::builder()
        .url(format!("{}/zz", base))
        .post(RequestBody::text(&text))
        .add_header("Content-Encoding", "deflate")
        .build()
        .unwrap();
    client().execute(&request).unwrap();

    let seen = server.join().unwrap();
    assert_eq!(seen[0].header("Transfer-Encoding").as_deref(), Some("chunked"));
    assert!(seen[0].header("Content-Length").is_none());
    assert_eq!(seen[0].header("Content-Encoding").as_deref(), Some("deflate"));
    let mut decoded = String::new();
    ZlibDecoder::new(&seen[0].body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, text);
}

#[test]
fn request_target_is_normalised_and_escaped() {
    let (base, server) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec()]);
    let request = Request::builder()
        .url(format!("{}/a/./b/../c d", base))
        .add_query_param("q", "x y")
        .build()
        .unwrap();
    client().execute(&request).unwrap();

    let seen = server.join().unwrap();
    assert_eq!(seen[0].request_line(), "GET /a/c%20d?q=x+y HTTP/1.1");
}

#[test]
fn status_errors_carry_body() {
    let (base, server) = serve(vec![
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 7\r\n\r\nmissing".to_vec(),
        b"HTTP/1.1 500 Internal Server Error\r\nTransfer-Encoding: chunked\r\n\r\n4\r\noops\r\n0\r\n\r\n".to_vec(),
        b"HTTP/1.1 999 Odd\r\n\r\nstrange".to_vec(),
    ]);
    let request = Request::builder().url(format!("{}/e", base)).build().unwrap();
    let c = client();

    let response = c.execute(&request).unwrap();
    assert!(response.has_error());
    let err = response.check_status().unwrap_err();
    assert!(matches!(err, HttpError::ClientError(_)));
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.status_error().unwrap().body_text(), "missing");

    let err = c.execute(&request).unwrap().check_status().unwrap_err();
    assert!(matches!(err, HttpError::ServerError(_)));
    assert_eq!(err.status_error().unwrap().body_text(), "oops");

    let err = c.execute(&request).unwrap().check_status().unwrap_err();
    assert!(matches!(err, HttpError::UnknownStatus(_)));
    let status_error = err.status_error().unwrap();
    assert_eq!(status_error.body_text(), "strange");
    assert_eq!(status_error.reason.as_deref(), Some("Odd"));
    assert_eq!(status_error.request.url(), request.url());

    server.join().unwrap();
}

#[test]
fn redirects_followed() {
    let (base, server) = serve(vec![
        b"HTTP/1.1 302 Found\r\nLocation: /final?x=1\r\nContent-Length: 0\r\n\r\n".to_vec(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone".to_vec(),
    ]);
    let request = Request::builder().url(format!("{}/start", base)).build().unwrap();
    let mut response = client().execute(&request).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().unwrap(), "done");
    assert_eq!(response.request().url(), format!("{}/final", base));

    let seen = server.join().unwrap();
    assert_eq!(seen[0].request_line(), "GET /start HTTP/1.1");
    assert_eq!(seen[1].request_line(), "GET /final?x=1 HTTP/1.1");
}

#[test]
fn redirects_not_followed() {
    let (base, server) = serve(vec![
        b"HTTP/1.1 301 Moved Permanently\r\nLocation: /elsewhere\r\nContent-Length: 0\r\n\r\n".to_vec(),
    ]);
    let request = Request::builder().url(format!("{}/old", base)).build().unwrap();
    let options = Options::builder()
        .timeout_ms(5000)
        .follow_redirects(false)
        .build();
    let response = client().execute_with(&request, &options).unwrap();
    assert_eq!(response.status(), 301);
    assert_eq!(response.header("location"), Some("/elsewhere"));
    assert!(matches!(
        response.check_status(),
        Err(HttpError::UnacceptedStatus(_))
    ));
    server.join().unwrap();
}

#[test]
fn stream_body_reads_once_and_close_twice() {
    let (base, server) = serve(vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n".to_vec(),
    ]);
    let request = Request::builder().url(format!("{}/s", base)).build().unwrap();
    let mut response = client().execute(&request).unwrap();
    assert_eq!(response.content_length(), None);
    let mut text = String::new();
    response.reader().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "hello world");
    assert!(response.reader().is_err());
    response.close();
    response.close();
    server.join().unwrap();
}

#[test]
fn body_until_close_and_head_without_body() {
    let (base, server) = serve(vec![
        b"HTTP/1.0 200 OK\r\nContent-Type: text/plain; charset=ISO-8859-1\r\n\r\ncaf\xe9".to_vec(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n".to_vec(),
    ]);
    let c = client();
    let get = Request::builder().url(format!("{}/r", base)).build().unwrap();
    let mut response = c.execute(&get).unwrap();
    assert_eq!(response.version(), HttpVersion::Http1_0);
    assert_eq!(response.text().unwrap(), "café");

    let head = Request::builder()
        .url(format!("{}/r", base))
        .method(Method::Head, None)
        .unwrap()
        .build()
        .unwrap();
    let mut response = c.execute(&head).unwrap();
    assert!(response.body().is_none());
    assert_eq!(response.header("Content-Length"), Some("10"));
    assert!(response.bytes().unwrap().is_empty());

    let seen = server.join().unwrap();
    assert_eq!(seen[1].request_line(), "HEAD /r HTTP/1.1");
}

#[test]
fn failed_send_still_closes_streams() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let multipart = MultipartBody::builder()
        .add_stream("s", None, None, Cursor::new(vec![1u8, 2, 3]))
        .build();
    let request = Request::builder()
        .url(format!("http://127.0.0.1:{}/x", port))
        .post(multipart)
        .build()
        .unwrap();
    let err = client().execute(&request).unwrap_err();
    assert!(err.is_io());
    let parts = request.body().unwrap().as_multipart().unwrap().parts();
    assert!(!parts[0].is_open());
}

#[test]
fn registry_default_client_executes() {
    let (base, server) = serve(vec![b"HTTP/1.1 204 No Content\r\n\r\n".to_vec()]);
    let registry = Registry::new();
    let client = registry.client(Options::builder().timeout_ms(5000).build());
    let request = Request::builder()
        .url(format!("{}/ping", base))
        .decode_status_codes([204])
        .build()
        .unwrap();
    let response = client.execute(&request).unwrap();
    assert_eq!(response.status(), 204);
    assert!(response.body().is_none());
    assert!(response.check_status().is_ok());
    server.join().unwrap();
}
