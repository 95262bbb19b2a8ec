//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use factory_gateway::config::{ApiKeyConfig, GatewayConfig};
use factory_gateway::{HttpServer, Shutdown};

pub const DASHBOARD_KEY: &str = "fk_dashboard_secret";
pub const BATCH_KEY: &str = "fk_batch_secret";
pub const ORIGIN: &str = "https://factory.example";

pub fn key(id: &str, name: &str, secret: &str, rate_limit: Option<u32>) -> ApiKeyConfig {
    ApiKeyConfig {
        id: id.to_string(),
        name: name.to_string(),
        key: secret.to_string(),
        rate_limit,
    }
}

/// Two keys: `dashboard` with a quota of 3, `batch` on the default quota.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.cors.allowed_origins = vec![ORIGIN.to_string(), "https://ops.example".to_string()];
    config.auth.default_rate_limit = 100;
    config.auth.keys = vec![
        key("1", "dashboard", DASHBOARD_KEY, Some(3)),
        key("2", "batch", BATCH_KEY, None),
    ];
    config.rate_limit.purge_interval_secs = 0;
    config
}

pub fn get(path: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(path)
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn empty() -> Body {
    Body::empty()
}

/// A gateway serving on an ephemeral loopback port.
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> RunningGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    RunningGateway {
        addr,
        shutdown,
        config_updates,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..40 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// One request received by a [`start_capturing_backend`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

/// Start a mock backend that records every request and answers `status`.
pub async fn start_capturing_backend(status: u16) -> (SocketAddr, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let sink = sink.clone();
                    tokio::spawn(async move {
                        if let Some(request) = read_request(&mut socket).await {
                            sink.lock().unwrap().push(request);
                        }
                        let status_text = match status {
                            200 => "200 OK",
                            201 => "201 Created",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {status_text}\r\nContent-Length: 2\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{{}}"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, captured)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = buf.len().min(header_end + content_length);
    Some(CapturedRequest {
        request_line,
        headers,
        body: String::from_utf8_lossy(&buf[header_end..end]).to_string(),
    })
}
