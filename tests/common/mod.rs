//! Shared fixtures: a fake control API and a fake engine executable.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vortex_core::config::Settings;
use vortex_core::controller::ControllerEndpoint;

/// A request as seen by the fake controller.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

type Handler = dyn Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync;

/// HTTP/1.1 server standing in for the engine's control API.
pub struct FakeController {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl FakeController {
    /// Serve every request with `handler`.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        let recorded = recorded.clone();
                        async move {
                            let request = record(req).await;
                            let (status, body) = handler(&request);
                            recorded.lock().unwrap().push(request);
                            let response = Response::builder()
                                .status(status)
                                .header(CONTENT_TYPE, "application/json")
                                .body(Full::new(Bytes::from(body)))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    /// A controller that behaves like the engine's API.
    ///
    /// Counters grow by 1000 up / 2000 down on every `/traffic` call. With a
    /// secret, requests lacking the matching bearer token get 401.
    pub async fn engine_like(secret: Option<&str>) -> Self {
        let expected = secret.map(|s| format!("Bearer {}", s));
        let samples = AtomicU64::new(0);

        Self::start(move |req| {
            if expected.is_some() && req.authorization != expected {
                return (StatusCode::UNAUTHORIZED, r#"{"message":"Unauthorized"}"#.into());
            }

            let path = req.path.split('?').next().unwrap_or_default();
            match (req.method.as_str(), path) {
                ("GET", "/version") => (
                    StatusCode::OK,
                    r#"{"meta":true,"version":"v1.18.0"}"#.into(),
                ),
                ("GET", "/traffic") => {
                    let n = samples.fetch_add(1, Ordering::SeqCst) + 1;
                    (
                        StatusCode::OK,
                        format!("{{\"up\":{},\"down\":{}}}\n", n * 1000, n * 2000),
                    )
                }
                ("GET", "/connections") => (
                    StatusCode::OK,
                    r#"{"downloadTotal":0,"uploadTotal":0,"connections":[]}"#.into(),
                ),
                ("GET", p) if p.starts_with("/proxies/") && p.ends_with("/delay") => {
                    (StatusCode::OK, r#"{"delay":42}"#.into())
                }
                ("PUT", p) if p.starts_with("/proxies/") => (StatusCode::NO_CONTENT, String::new()),
                ("PUT", "/configs") => (StatusCode::NO_CONTENT, String::new()),
                _ => (StatusCode::NOT_FOUND, r#"{"message":"not found"}"#.into()),
            }
        })
        .await
    }

    /// Endpoint pointing at this server.
    pub fn endpoint(&self) -> ControllerEndpoint {
        ControllerEndpoint::new("127.0.0.1", self.addr.port())
    }

    /// Engine config text that points at this server.
    pub fn config_yaml(&self, secret: Option<&str>) -> String {
        let mut yaml = format!(
            "mixed-port: 7890\nmode: rule\nexternal-controller: 127.0.0.1:{}\n",
            self.addr.port()
        );
        if let Some(secret) = secret {
            yaml.push_str(&format!("secret: \"{}\"\n", secret));
        }
        yaml
    }

    /// Everything received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record(req: Request<Incoming>) -> RecordedRequest {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();

    RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.to_string(),
        authorization: parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Settings with short timings so tests run quickly.
pub fn fast_settings(controller_port: u16) -> Settings {
    let mut settings = Settings::default();
    settings.supervisor.startup_grace_ms = 200;
    settings.supervisor.poll_interval_ms = 50;
    settings.supervisor.stop_timeout_ms = 2000;
    settings.controller.port = controller_port;
    settings.controller.request_timeout_ms = 1000;
    settings
}

/// Write an engine config file into `dir`.
pub fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// How the fake engine behaves once launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeEngine {
    /// Prints a line and stays up until killed.
    LongRunning,
    /// Exits with status 1 right away.
    ExitsImmediately,
    /// Survives startup, then exits on its own after a second.
    ExitsLater,
    /// Writes a line that is not valid UTF-8, then keeps printing.
    InvalidOutput,
}

/// Name of the file the fake engine appends its arguments to.
pub const SPAWN_LOG: &str = "spawns.log";

/// Install a fake engine executable in `work_dir`.
///
/// Every launch appends its argument list to [`SPAWN_LOG`] in the working
/// directory.
#[cfg(unix)]
pub fn install_fake_engine(work_dir: &Path, behavior: FakeEngine) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let tail = match behavior {
        FakeEngine::LongRunning => "echo \"engine started\"\nexec sleep 30\n",
        FakeEngine::ExitsImmediately => "echo \"bad config\" >&2\nexit 1\n",
        FakeEngine::ExitsLater => "echo \"engine started\"\nsleep 1\nexit 0\n",
        FakeEngine::InvalidOutput => {
            "printf 'hello\\377\\n'\nwhile true; do echo tick; sleep 0.05; done\n"
        }
    };
    let script = format!("#!/bin/sh\necho \"$@\" >> {}\n{}", SPAWN_LOG, tail);

    let path = work_dir.join(Settings::default().engine.executable_name());
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Launches recorded by the fake engine.
pub fn spawn_lines(work_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(work_dir.join(SPAWN_LOG))
        .map(|s| s.lines().map(String::from).collect())
        .unwrap_or_default()
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
