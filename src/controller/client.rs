//! HTTP client for the engine's local control API.
//!
//! Every request opens a fresh HTTP/1.1 connection to the current endpoint,
//! sends one request, reads the body and tears the connection down. The
//! connection driver task is owned by a guard that aborts it on drop, so the
//! socket is released on every exit path including timeouts and errors.
//!
//! The high-level [`ControlClient::get`] and [`ControlClient::put`] never fail:
//! transport and status errors are logged at debug level and degrade to an
//! empty body or `false`. Callers treat that as "control API unreachable".

use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::endpoint::ControllerEndpoint;
use super::error::ControlError;

/// User agent sent with every control request.
pub const CLIENT_USER_AGENT: &str = "Vortex/1.0";

/// Client for the engine control API.
///
/// The endpoint sits behind a lock because the traffic poller reads it from
/// its own task while lifecycle calls may re-resolve it.
#[derive(Debug)]
pub struct ControlClient {
    endpoint: RwLock<ControllerEndpoint>,
    request_timeout: Duration,
}

impl ControlClient {
    /// Create a client for the given endpoint.
    pub fn new(endpoint: ControllerEndpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
            request_timeout,
        }
    }

    /// Snapshot of the current endpoint.
    pub fn endpoint(&self) -> ControllerEndpoint {
        match self.endpoint.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the endpoint.
    pub fn set_endpoint(&self, endpoint: ControllerEndpoint) {
        match self.endpoint.write() {
            Ok(mut guard) => *guard = endpoint,
            Err(poisoned) => *poisoned.into_inner() = endpoint,
        }
    }

    /// Re-resolve the endpoint from an engine config file.
    ///
    /// Returns false if the file could not be read.
    pub fn update_from_file(&self, path: &std::path::Path) -> bool {
        let mut endpoint = self.endpoint();
        let read = endpoint.update_from_file(path);
        self.set_endpoint(endpoint);
        read
    }

    /// Default per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// GET `path` and return the body, or an empty string on any failure.
    pub async fn get(&self, path: &str) -> String {
        self.get_with_timeout(path, self.request_timeout).await
    }

    /// GET with an explicit timeout, degrading to an empty string.
    pub async fn get_with_timeout(&self, path: &str, timeout: Duration) -> String {
        match self.try_get_with_timeout(path, timeout).await {
            Ok(body) => body,
            Err(e) => {
                debug!("GET {} failed: {}", path, e);
                String::new()
            }
        }
    }

    /// GET `path` and return only the first line of the body.
    ///
    /// Used for streaming endpoints that emit one JSON document per line and
    /// never finish the body on their own.
    pub async fn get_first_line(&self, path: &str) -> String {
        match self.try_get_first_line(path).await {
            Ok(line) => line,
            Err(e) => {
                debug!("GET {} (first line) failed: {}", path, e);
                String::new()
            }
        }
    }

    /// PUT `body` as JSON to `path`. True only for a 2xx status.
    pub async fn put(&self, path: &str, body: &str) -> bool {
        match self.try_put(path, body).await {
            Ok(()) => true,
            Err(e) => {
                debug!("PUT {} failed: {}", path, e);
                false
            }
        }
    }

    /// GET `path`, surfacing the failure cause.
    pub async fn try_get(&self, path: &str) -> Result<String, ControlError> {
        self.try_get_with_timeout(path, self.request_timeout).await
    }

    /// GET with an explicit timeout, surfacing the failure cause.
    pub async fn try_get_with_timeout(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<String, ControlError> {
        bounded(timeout, async {
            let (response, _connection) = self.exchange(Method::GET, path, None).await?;
            let response = require_success(response)?;
            let body = response.into_body().collect().await?.to_bytes();
            Ok(String::from_utf8_lossy(&body).into_owned())
        })
        .await
    }

    /// GET `path` and read up to the first newline, surfacing the failure cause.
    pub async fn try_get_first_line(&self, path: &str) -> Result<String, ControlError> {
        bounded(self.request_timeout, async {
            let (response, _connection) = self.exchange(Method::GET, path, None).await?;
            let mut body = require_success(response)?.into_body();

            let mut buf: Vec<u8> = Vec::new();
            while let Some(frame) = body.frame().await {
                let Ok(data) = frame?.into_data() else {
                    continue;
                };
                buf.extend_from_slice(&data);
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    buf.truncate(pos);
                    break;
                }
            }

            Ok(String::from_utf8_lossy(&buf).trim().to_string())
        })
        .await
    }

    /// PUT `body` as JSON to `path`, surfacing the failure cause.
    pub async fn try_put(&self, path: &str, body: &str) -> Result<(), ControlError> {
        bounded(self.request_timeout, async {
            let (response, _connection) = self
                .exchange(Method::PUT, path, Some(body.to_string()))
                .await?;
            let response = require_success(response)?;
            // Drain so the connection shuts down cleanly.
            response.into_body().collect().await?;
            Ok(())
        })
        .await
    }

    /// Open a connection and send one request.
    ///
    /// The returned guard must outlive reading the response body.
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<(Response<Incoming>, ConnectionGuard), ControlError> {
        let endpoint = self.endpoint();
        let authority = endpoint.authority();

        let stream = TcpStream::connect(authority.as_str())
            .await
            .map_err(|source| ControlError::Connect {
                addr: authority.clone(),
                source,
            })?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        let guard = ConnectionGuard(tokio::spawn(async move {
            if let Err(e) = connection.await {
                trace!("Control connection ended with error: {}", e);
            }
        }));

        let request = build_request(&endpoint, method, path, body)?;
        trace!("{} {} -> {}", request.method(), request.uri(), authority);

        let response = sender.send_request(request).await?;
        Ok((response, guard))
    }
}

/// Aborts the connection driver when dropped.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn build_request(
    endpoint: &ControllerEndpoint,
    method: Method,
    path: &str,
    body: Option<String>,
) -> Result<Request<Full<Bytes>>, ControlError> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, endpoint.authority())
        .header(USER_AGENT, CLIENT_USER_AGENT);

    if let Some(secret) = endpoint.secret.as_deref().filter(|s| !s.is_empty()) {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", secret));
    }

    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body))),
        None => builder.body(Full::new(Bytes::new())),
    };

    request.map_err(|e| ControlError::InvalidRequest(e.to_string()))
}

fn require_success(response: Response<Incoming>) -> Result<Response<Incoming>, ControlError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ControlError::Status(response.status()))
    }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, ControlError>>,
) -> Result<T, ControlError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ControlError::Timeout(timeout))?
}
