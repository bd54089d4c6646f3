//! End-to-end checks against a running accept loop on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use csp_serve::config::{AppState, Config};
use csp_serve::error::StartupError;
use csp_serve::server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const EXPECTED_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-eval' 'wasm-unsafe-eval' https://cdn.jsdelivr.net blob:; style-src 'self'; font-src 'self'; img-src 'self' data: blob:; connect-src 'self' vitals.vercel-insights.com https://cdn.jsdelivr.net https://huggingface.co https://cdn-lfs.hf.co https://cdn-lfs-us-1.hf.co https://cdn-lfs.huggingface.co; worker-src 'self' blob:; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
    dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let www = root.path().join("www");
        std::fs::create_dir(&www).unwrap();
        std::fs::write(www.join("index.html"), "<html></html>").unwrap();
        std::fs::write(root.path().join("secret.txt"), "top secret").unwrap();

        let mut cfg = Config::defaults().unwrap();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.port = 0;
        cfg.server.root = www;
        cfg.logging.access_log = false;
        configure(&mut cfg);

        let state = Arc::new(AppState::new(cfg).unwrap());
        let addr = state.config.get_socket_addr().unwrap();
        let listener = server::create_listener(addr).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(server::start_server_loop(
            listener,
            state,
            Arc::clone(&shutdown),
        ));

        Self {
            addr,
            shutdown,
            handle,
            dir: root,
        }
    }

    async fn stop(self) {
        self.shutdown.notify_one();
        self.handle.await.unwrap();
    }
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn assert_security_headers(&self) {
        assert_eq!(self.header_values("content-security-policy"), [EXPECTED_CSP]);
        assert_eq!(self.header_values("x-content-type-options"), ["nosniff"]);
        assert_eq!(self.header_values("x-frame-options"), ["DENY"]);
    }
}

async fn send_raw(addr: SocketAddr, raw: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    buf
}

async fn request(addr: SocketAddr, method: &str, path: &str) -> RawResponse {
    let raw =
        format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    parse_response(&send_raw(addr, &raw).await)
}

fn parse_response(bytes: &[u8]) -> RawResponse {
    let split = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has a header terminator");
    let head = std::str::from_utf8(&bytes[..split]).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    RawResponse {
        status,
        headers,
        body: bytes[split + 4..].to_vec(),
    }
}

/// Read exactly one response from a connection that stays open
async fn read_one_response(stream: &mut TcpStream) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = parse_response(&buf[..split + 4]);
            let length: usize = head
                .header_values("content-length")
                .first()
                .map_or(0, |v| v.parse().unwrap());
            if buf.len() >= split + 4 + length {
                return parse_response(&buf[..split + 4 + length]);
            }
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-response");
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn keep_alive_get(stream: &mut TcpStream, path: &str) -> RawResponse {
    let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream.write_all(raw.as_bytes()).await.unwrap();
    read_one_response(stream).await
}

#[tokio::test]
async fn test_index_file_served_with_headers() {
    let server = TestServer::start().await;

    let response = request(server.addr, "GET", "/index.html").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html></html>");
    assert_eq!(response.header_values("x-frame-options"), ["DENY"]);
    response.assert_security_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_missing_file_is_404_with_headers() {
    let server = TestServer::start().await;

    let response = request(server.addr, "GET", "/missing.txt").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.header_values("x-content-type-options"), ["nosniff"]);
    response.assert_security_headers();

    server.stop().await;
}

#[tokio::test]
async fn test_every_outcome_carries_headers() {
    let server = TestServer::start().await;
    std::fs::create_dir(server.dir.path().join("www/sub")).unwrap();

    let cases = [
        ("GET", "/", 200),
        ("HEAD", "/index.html", 200),
        ("GET", "/sub", 301),
        ("GET", "/sub/", 200),
        ("GET", "/nope", 404),
        ("POST", "/index.html", 501),
        ("DELETE", "/", 501),
    ];
    for (method, path, status) in cases {
        let response = request(server.addr, method, path).await;
        assert_eq!(response.status, status, "{method} {path}");
        response.assert_security_headers();
        assert_eq!(response.header_values("server").len(), 1);
    }

    server.stop().await;
}

#[tokio::test]
async fn test_head_has_no_body() {
    let server = TestServer::start().await;

    let response = request(server.addr, "HEAD", "/index.html").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header_values("content-length"), ["13"]);
    assert!(response.body.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_traversal_never_leaves_root() {
    let server = TestServer::start().await;

    let attempts = [
        "/../secret.txt",
        "/%2e%2e/secret.txt",
        "/..%2fsecret.txt",
        "/./../../secret.txt",
    ];
    for path in attempts {
        let response = request(server.addr, "GET", path).await;
        assert_eq!(response.status, 404, "{path}");
        assert!(
            !String::from_utf8_lossy(&response.body).contains("top secret"),
            "{path} leaked a file outside the root"
        );
        response.assert_security_headers();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let server = TestServer::start().await;

    let bytes = send_raw(server.addr, "THIS IS NOT HTTP\r\n\r\n").await;
    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("200 OK"));
    assert!(!text.contains("<html></html>"));

    // The server keeps serving after rejecting a bad connection
    let response = request(server.addr, "GET", "/index.html").await;
    assert_eq!(response.status, 200);

    server.stop().await;
}

#[tokio::test]
async fn test_second_instance_fails_to_bind() {
    let server = TestServer::start().await;

    let result = server::create_listener(server.addr);
    assert!(matches!(result, Err(StartupError::Bind { .. })));

    // The first instance is unaffected
    let response = request(server.addr, "GET", "/index.html").await;
    assert_eq!(response.status, 200);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_releases_port() {
    let server = TestServer::start().await;
    let addr = server.addr;
    server.stop().await;

    let rebound = server::create_listener(addr);
    assert!(rebound.is_ok(), "port still held after shutdown: {rebound:?}");
}

#[tokio::test]
async fn test_idle_keep_alive_connection_closed_after_timeout() {
    let server = TestServer::start_with(|cfg| cfg.performance.keep_alive_timeout = 1).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let response = keep_alive_get(&mut stream, "/index.html").await;
    assert_eq!(response.status, 200);

    // No further request: the server hangs up once the idle timeout passes
    let mut rest = Vec::new();
    let read = timeout(Duration::from_secs(10), stream.read_to_end(&mut rest)).await;
    assert!(read.is_ok(), "idle connection was never closed");

    server.stop().await;
}

#[tokio::test]
async fn test_busy_connection_outlives_idle_timeout() {
    let server = TestServer::start_with(|cfg| cfg.performance.keep_alive_timeout = 2).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    // Four requests spread over about three seconds, each gap under the
    // idle timeout, all on one connection
    for _ in 0..4 {
        let response = keep_alive_get(&mut stream, "/index.html").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"<html></html>");
        response.assert_security_headers();
        sleep(Duration::from_millis(1000)).await;
    }

    server.stop().await;
}
