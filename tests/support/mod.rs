//! Scripted HTTP server standing in for Azure AD and Microsoft Graph.
//!
//! Routes match on method and exact path. Each route replays its responses
//! in order and keeps repeating the last one. Unmatched requests get a Graph
//! style 404.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sharepoint_access::graph::GraphSession;
use sharepoint_access::{ClientOptions, Config, SecureString, SharePointClient, WaitOptions};

pub const TENANT: &str = "test-tenant";
pub const TOKEN_PATH: &str = "/test-tenant/oauth2/v2.0/token";

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Close the connection without answering.
    pub disconnect: bool,
    /// Announce more body bytes than are sent, then close.
    pub truncate: bool,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.to_string().into_bytes(),
            disconnect: false,
            truncate: false,
        }
    }

    pub fn bytes(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/octet-stream".into())],
            body: body.to_vec(),
            disconnect: false,
            truncate: false,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            disconnect: false,
            truncate: false,
        }
    }

    /// Drop the connection after reading the request.
    pub fn disconnect() -> Self {
        Self {
            disconnect: true,
            ..Self::empty(500)
        }
    }

    /// Send the status and part of the body, then close mid-body.
    pub fn truncated(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn graph_error(status: u16, code: &str, message: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "error": { "code": code, "message": message } }),
        )
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

struct Route {
    method: String,
    path: String,
    responses: VecDeque<MockResponse>,
}

#[derive(Default)]
struct State {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

pub struct MockServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl MockServer {
    /// Start a server with the token endpoint already mounted.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state).await;
                });
            }
        });

        let server = Self { addr, state };
        server.mount(
            "POST",
            TOKEN_PATH,
            vec![MockResponse::json(
                200,
                serde_json::json!({
                    "access_token": "token-1",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }),
            )],
        );
        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Register (or replace) the scripted responses for a route.
    pub fn mount(&self, method: &str, path: &str, responses: Vec<MockResponse>) {
        let mut state = self.state.lock().unwrap();
        state.routes.retain(|r| !(r.method == method && r.path == path));
        state.routes.push(Route {
            method: method.to_string(),
            path: path.to_string(),
            responses: responses.into(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests that hit `method path`.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn token_requests(&self) -> usize {
        self.requests_to("POST", TOKEN_PATH).len()
    }

    /// Configuration pointing both the authority and Graph at this server.
    pub fn config(&self) -> Config {
        let mut config = Config::defaults().unwrap();
        config.auth.tenant_id = TENANT.into();
        config.auth.client_id = "client-id".into();
        config.auth.client_secret = Some(SecureString::from("client-secret"));
        config.auth.authority_host = self.url("");
        config.api.graph_base_url = self.url("/v1.0");
        config.api.graph_beta_url = self.url("/beta");
        config.http.timeout_seconds = 5;
        config.http.connect_timeout_seconds = 5;
        config.retry.base_delay_ms = 10;
        config.retry.max_delay_seconds = 1;
        config
    }

    /// Client with fast retries and small upload thresholds.
    pub fn client(&self, download_dir: &std::path::Path) -> SharePointClient {
        let config = self.config();
        let session = GraphSession::from_config(&config).unwrap();
        SharePointClient::new(
            session,
            ClientOptions {
                download_dir: download_dir.to_path_buf(),
                simple_upload_limit: 10,
                chunk_size: 8,
                wait: fast_wait(Duration::from_millis(500)),
            },
        )
    }
}

pub fn fast_wait(timeout: Duration) -> WaitOptions {
    WaitOptions {
        timeout,
        poll_interval: Duration::from_millis(50),
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let response = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            headers,
            body,
        });
        state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
            .and_then(|route| {
                if route.responses.len() > 1 {
                    route.responses.pop_front()
                } else {
                    route.responses.front().cloned()
                }
            })
            .unwrap_or_else(|| {
                MockResponse::graph_error(404, "itemNotFound", "The resource could not be found.")
            })
    };

    if response.disconnect {
        return Ok(());
    }

    let mut head = format!("HTTP/1.1 {} Mock\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if response.status != 204 {
        let declared = if response.truncate {
            response.body.len() + 64
        } else {
            response.body.len()
        };
        head.push_str(&format!("Content-Length: {}\r\n", declared));
    }
    head.push_str("Connection: close\r\n\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    stream.shutdown().await
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}
