//! Typed queries against the engine control API.
//!
//! Each query degrades rather than fails: an unreachable controller or an
//! unexpected body yields the documented fallback value.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::client::ControlClient;
use super::error::ControlError;

/// Version reported when the controller cannot be reached.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Delay reported when a proxy test fails.
pub const DELAY_UNAVAILABLE: i64 = -1;

/// Cumulative byte counters as reported by `/traffic`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrafficCounters {
    /// Total bytes uploaded.
    pub up: u64,
    /// Total bytes downloaded.
    pub down: u64,
}

impl TrafficCounters {
    /// Parse a `/traffic` body. Missing fields or an unparsable body read as zero.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DelayResponse {
    delay: Option<i64>,
}

impl ControlClient {
    /// Engine version string, or [`UNKNOWN_VERSION`].
    pub async fn version(&self) -> String {
        let body = self.get("/version").await;
        match serde_json::from_str::<VersionResponse>(&body) {
            Ok(VersionResponse {
                version: Some(version),
            }) if !version.is_empty() => version,
            Ok(_) => UNKNOWN_VERSION.to_string(),
            Err(e) => {
                if !body.is_empty() {
                    debug!("Unexpected /version body: {}", ControlError::from(e));
                }
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    /// Current cumulative counters. Zero when unavailable.
    pub async fn traffic(&self) -> TrafficCounters {
        TrafficCounters::parse(&self.get_first_line("/traffic").await)
    }

    /// Probe a proxy's latency in milliseconds, or [`DELAY_UNAVAILABLE`].
    ///
    /// The engine performs the probe itself and may take up to `timeout_ms`
    /// before answering, so the HTTP timeout is extended by that amount.
    pub async fn delay(&self, proxy: &str, test_url: &str, timeout_ms: u64) -> i64 {
        let path = match delay_path(proxy, test_url, timeout_ms) {
            Ok(path) => path,
            Err(e) => {
                debug!("Cannot build delay request for {:?}: {}", proxy, e);
                return DELAY_UNAVAILABLE;
            }
        };

        let timeout = self.request_timeout() + Duration::from_millis(timeout_ms);
        let body = self.get_with_timeout(&path, timeout).await;

        serde_json::from_str::<DelayResponse>(&body)
            .ok()
            .and_then(|r| r.delay)
            .unwrap_or(DELAY_UNAVAILABLE)
    }

    /// Select `proxy` inside the selector group `selector`.
    pub async fn switch_proxy(&self, selector: &str, proxy: &str) -> bool {
        let path = match control_path(&["proxies", selector], &[]) {
            Ok(path) => path,
            Err(e) => {
                debug!("Cannot build switch request for {:?}: {}", selector, e);
                return false;
            }
        };
        let body = serde_json::json!({ "name": proxy }).to_string();
        self.put(&path, &body).await
    }

    /// Raw `/connections` body, empty when unavailable.
    pub async fn connections(&self) -> String {
        self.get("/connections").await
    }

    /// Ask the engine to load a different config file.
    pub async fn reload_config(&self, config: &Path) -> bool {
        let body = serde_json::json!({ "path": config.to_string_lossy() }).to_string();
        self.put("/configs?force=true", &body).await
    }
}

fn delay_path(proxy: &str, test_url: &str, timeout_ms: u64) -> Result<String, ControlError> {
    let timeout = timeout_ms.to_string();
    control_path(
        &["proxies", proxy, "delay"],
        &[("timeout", timeout.as_str()), ("url", test_url)],
    )
}

/// Build an origin-form request target with each segment and query value encoded.
fn control_path(segments: &[&str], query: &[(&str, &str)]) -> Result<String, ControlError> {
    let mut url = Url::parse("http://controller/")
        .map_err(|e| ControlError::InvalidRequest(e.to_string()))?;

    url.path_segments_mut()
        .map_err(|()| ControlError::InvalidRequest("URL cannot have a path".to_string()))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_counters_parse() {
        assert_eq!(
            TrafficCounters::parse(r#"{"up":1500,"down":2400}"#),
            TrafficCounters {
                up: 1500,
                down: 2400
            }
        );
        assert_eq!(
            TrafficCounters::parse(r#"{"down":7}"#),
            TrafficCounters { up: 0, down: 7 }
        );
        assert_eq!(TrafficCounters::parse(""), TrafficCounters::default());
        assert_eq!(TrafficCounters::parse("garbage"), TrafficCounters::default());
    }

    #[test]
    fn test_delay_path_encodes_name_and_url() {
        let path = delay_path(
            "HK 01/fast",
            "http://www.gstatic.com/generate_204",
            5000,
        )
        .unwrap();

        assert_eq!(
            path,
            "/proxies/HK%2001%2Ffast/delay?timeout=5000&url=http%3A%2F%2Fwww.gstatic.com%2Fgenerate_204"
        );
    }

    #[test]
    fn test_switch_path() {
        assert_eq!(control_path(&["proxies", "GLOBAL"], &[]).unwrap(), "/proxies/GLOBAL");
    }
}
