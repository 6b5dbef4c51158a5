//! # Control Channel
//!
//! A small HTTP server on `127.0.0.1` that lets the child of a PTY session
//! ask the session to show a widget. The child learns the address and a
//! random bearer token from [`ENV_TUI_ADDR`] and [`ENV_TUI_TOKEN`], posts a
//! [`Request`] to `/tui`, and blocks until the user finishes the widget.
//!
//! ## Endpoints
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /health` | `200 ok` |
//! | `POST /tui` | `200` + [`Response`] once the widget is done |
//! | `/tui`, other methods | `405` |
//! | `/tui`, wrong token | `401` |
//! | `/tui`, malformed body | `400 {"error": "invalid JSON: ..."}` |
//! | `/tui`, server stopping | `503 {"error": "server shutting down"}` |
//!
//! Each request is handled on its own thread, but only one `/tui` request
//! is forwarded at a time.

pub mod client;
pub mod protocol;

pub use client::Client;
pub use protocol::{OverlayRequest, Request, Response, ENV_TUI_ADDR, ENV_TUI_TOKEN};

use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tiny_http::{Header, Method};

use crate::error::TuiError;

/// How often blocked threads re-check the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerState::Created => "created",
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
        })
    }
}

pub struct Server {
    http: Arc<tiny_http::Server>,
    port: u16,
    token: String,
    state: ServerState,
    shutdown: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind to a free port on the loopback interface and pick a token.
    pub fn new() -> Result<Self> {
        let http = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| TuiError::Server(e.to_string()))
            .context("Failed to bind control server")?;
        let port = http
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| TuiError::Server("listener has no TCP address".to_string()))?;

        Ok(Self {
            http: Arc::new(http),
            port,
            token: uuid::Uuid::new_v4().simple().to_string(),
            state: ServerState::Created,
            shutdown: Arc::new(AtomicBool::new(false)),
            accept: None,
        })
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Start accepting requests. Each accepted `/tui` request is wrapped
    /// with `wrap` and sent through `tx`.
    pub fn start<E, F>(&mut self, tx: Sender<E>, wrap: F) -> Result<()>
    where
        E: Send + 'static,
        F: Fn(OverlayRequest) -> E + Send + Sync + 'static,
    {
        if self.state != ServerState::Created {
            return Err(TuiError::Server(format!(
                "server cannot be started (state: {})",
                self.state
            ))
            .into());
        }

        let handler = Arc::new(Handler {
            expected_auth: format!("Bearer {}", self.token),
            tx,
            wrap,
            shutdown: Arc::clone(&self.shutdown),
            serial: Mutex::new(()),
        });
        let http = Arc::clone(&self.http);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = std::thread::Builder::new()
            .name("tuibridge-control".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    match http.recv_timeout(POLL_INTERVAL) {
                        Ok(Some(request)) => {
                            let handler = Arc::clone(&handler);
                            std::thread::spawn(move || handler.handle(request));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::debug!(error = %e, "control server stopped accepting");
                            break;
                        }
                    }
                }
            })
            .context("Failed to start control server thread")?;

        self.accept = Some(handle);
        self.state = ServerState::Running;
        tracing::debug!(port = self.port, "control server running");
        Ok(())
    }

    /// Stop accepting and fail any request still waiting with 503. Safe to
    /// call more than once.
    pub fn stop(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }
        self.shutdown.store(true, Ordering::Relaxed);
        self.http.unblock();
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }
        self.state = ServerState::Stopped;
        tracing::debug!(port = self.port, "control server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Handler<E, F> {
    expected_auth: String,
    tx: Sender<E>,
    wrap: F,
    shutdown: Arc<AtomicBool>,
    /// Held while a `/tui` request is forwarded and answered.
    serial: Mutex<()>,
}

impl<E, F> Handler<E, F>
where
    F: Fn(OverlayRequest) -> E,
{
    fn handle(&self, request: tiny_http::Request) {
        let path = request.url().split('?').next().unwrap_or_default().to_string();
        let result = match path.as_str() {
            "/health" => respond_text(request, 200, "ok"),
            "/tui" => self.handle_tui(request),
            _ => respond_text(request, 404, "not found"),
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, path = %path, "failed to answer control request");
        }
    }

    fn handle_tui(&self, mut request: tiny_http::Request) -> std::io::Result<()> {
        if *request.method() != Method::Post {
            return respond_text(request, 405, "method not allowed");
        }

        let authorized = request
            .headers()
            .iter()
            .any(|h| h.field.equiv("Authorization") && h.value.as_str() == self.expected_auth);
        if !authorized {
            tracing::debug!("rejecting control request with a bad token");
            return respond_text(request, 401, "unauthorized");
        }

        let mut body = String::new();
        if request.as_reader().read_to_string(&mut body).is_err() {
            return respond_json(request, 400, &Response::error("failed to read request body"));
        }
        let parsed: Request = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return respond_json(request, 400, &Response::error(format!("invalid JSON: {}", e)));
            }
        };

        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shutdown.load(Ordering::Relaxed) {
            return respond_json(request, 503, &Response::error("server shutting down"));
        }

        tracing::debug!(component = %parsed.component, "forwarding control request");
        let (respond, replies) = mpsc::channel();
        let overlay = OverlayRequest {
            component: parsed.component,
            options: parsed.options,
            respond,
        };
        if self.tx.send((self.wrap)(overlay)).is_err() {
            return respond_json(request, 503, &Response::error("server shutting down"));
        }

        loop {
            match replies.recv_timeout(POLL_INTERVAL) {
                Ok(reply) => return respond_json(request, 200, &reply),
                Err(RecvTimeoutError::Timeout) if !self.shutdown.load(Ordering::Relaxed) => {}
                Err(_) => {
                    return respond_json(request, 503, &Response::error("server shutting down"));
                }
            }
        }
    }
}

fn respond_text(request: tiny_http::Request, status: u16, body: &str) -> std::io::Result<()> {
    request.respond(tiny_http::Response::from_string(body).with_status_code(status))
}

fn respond_json(request: tiny_http::Request, status: u16, body: &Response) -> std::io::Result<()> {
    let text = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = tiny_http::Response::from_string(text).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    request.respond(response)
}
