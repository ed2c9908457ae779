//! Controller endpoint resolution from the engine configuration file.
//!
//! The engine's YAML config is owned by the engine. We only care about two keys:
//!
//! ```yaml
//! external-controller: 127.0.0.1:9090
//! secret: "s3cret"
//! ```
//!
//! Resolution is permissive and never fails: an unreadable file, malformed YAML
//! or absent keys leave the previously held values untouched. Malformed YAML
//! falls back to a line scan so a config the engine itself tolerates still
//! yields its controller address.

use std::fs;
use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, trace};

use crate::config::{DEFAULT_CONTROLLER_HOST, DEFAULT_CONTROLLER_PORT};

const CONTROLLER_KEY: &str = "external-controller";
const SECRET_KEY: &str = "secret";

/// Address and credentials of the engine's control API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    /// Host name or IP literal (IPv6 without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Bearer secret, if the engine requires one.
    pub secret: Option<String>,
}

impl Default for ControllerEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROLLER_HOST, DEFAULT_CONTROLLER_PORT)
    }
}

impl ControllerEndpoint {
    /// Create an endpoint without a secret.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secret: None,
        }
    }

    /// Set the bearer secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// `host:port` form suitable for connecting and for the `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Re-resolve from an engine config file.
    ///
    /// Returns false if the file could not be read; the endpoint is unchanged then.
    pub fn update_from_file(&mut self, path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(content) => {
                self.update_from_str(&content);
                debug!("Resolved controller {} from {:?}", self.authority(), path);
                true
            }
            Err(e) => {
                debug!("Could not read engine config {:?}: {}", path, e);
                false
            }
        }
    }

    /// Re-resolve from engine config text.
    pub fn update_from_str(&mut self, content: &str) {
        let fields = ControllerFields::parse(content);

        if let Some(address) = fields.controller {
            let (host, port) = split_address(&address);
            if let Some(host) = host {
                self.host = host;
            }
            if let Some(port) = port {
                self.port = port;
            }
        }

        if let Some(secret) = fields.secret {
            self.secret = Some(secret);
        }
    }
}

/// The two controller keys as found in the config text.
#[derive(Debug, Default, PartialEq, Eq)]
struct ControllerFields {
    controller: Option<String>,
    secret: Option<String>,
}

impl ControllerFields {
    fn parse(content: &str) -> Self {
        match serde_yaml::from_str::<Value>(content) {
            Ok(doc) => Self::from_yaml(&doc),
            Err(e) => {
                trace!("Engine config is not valid YAML ({}), scanning lines", e);
                Self::scan_lines(content)
            }
        }
    }

    fn from_yaml(doc: &Value) -> Self {
        Self {
            controller: doc.get(CONTROLLER_KEY).and_then(scalar_to_string),
            secret: doc.get(SECRET_KEY).and_then(scalar_to_string),
        }
    }

    fn scan_lines(content: &str) -> Self {
        let mut fields = Self::default();
        for line in content.lines() {
            let line = strip_comment(line.trim_start());
            if fields.controller.is_none() {
                fields.controller = value_after(line, CONTROLLER_KEY);
            }
            if fields.secret.is_none() {
                fields.secret = value_after(line, SECRET_KEY);
            }
        }
        fields
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn strip_comment(line: &str) -> &str {
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn value_after(line: &str, key: &str) -> Option<String> {
    let rest = line.strip_prefix(key)?.strip_prefix(':')?;
    let value = rest.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Split `host:port`, `[v6]:port`, `host` or `:port`.
///
/// An empty host or an unparsable port yields `None` for that half.
fn split_address(address: &str) -> (Option<String>, Option<u16>) {
    let address = address.trim();

    if let Some(rest) = address.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, tail)) => {
                let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
                (non_empty(host), port)
            }
            None => (None, None),
        };
    }

    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (non_empty(host), Some(port)),
            Err(_) => (non_empty(host), None),
        },
        None => (non_empty(address), None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_endpoint() {
        let endpoint = ControllerEndpoint::default();
        assert_eq!(endpoint.authority(), "127.0.0.1:9090");
        assert!(endpoint.secret.is_none());
    }

    #[test]
    fn test_resolve_host_port_and_secret() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str(
            "mixed-port: 7890\nexternal-controller: 127.0.0.1:9191\nsecret: abc123\n",
        );

        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 9191);
        assert_eq!(endpoint.secret.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_quoted_values() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str("external-controller: '0.0.0.0:9999'\nsecret: \"quoted\"\n");

        assert_eq!(endpoint.host, "0.0.0.0");
        assert_eq!(endpoint.port, 9999);
        assert_eq!(endpoint.secret.as_deref(), Some("quoted"));
    }

    #[test]
    fn test_numeric_secret() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str("external-controller: 127.0.0.1:9090\nsecret: 123456\n");
        assert_eq!(endpoint.secret.as_deref(), Some("123456"));
    }

    #[test]
    fn test_missing_port_keeps_previous_port() {
        let mut endpoint = ControllerEndpoint::new("127.0.0.1", 9191);
        endpoint.update_from_str("external-controller: localhost\n");

        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 9191);
    }

    #[test]
    fn test_empty_host_updates_port_only() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str("external-controller: ':9292'\n");

        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 9292);
    }

    #[test]
    fn test_ipv6_controller() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str("external-controller: '[::1]:9090'\n");

        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.authority(), "[::1]:9090");
    }

    #[test]
    fn test_absent_fields_retain_previous_values() {
        let mut endpoint = ControllerEndpoint::new("10.0.0.2", 9999).with_secret("old");
        endpoint.update_from_str("mixed-port: 7890\nmode: rule\n");

        assert_eq!(endpoint.host, "10.0.0.2");
        assert_eq!(endpoint.port, 9999);
        assert_eq!(endpoint.secret.as_deref(), Some("old"));
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let mut endpoint = ControllerEndpoint::default().with_secret("old");
        endpoint.update_from_str("secret: ''\n");
        assert_eq!(endpoint.secret.as_deref(), Some("old"));
    }

    #[test]
    fn test_malformed_yaml_falls_back_to_line_scan() {
        let mut endpoint = ControllerEndpoint::default();
        endpoint.update_from_str(
            "proxies: [unterminated\nexternal-controller: 192.168.1.5:9097 # lan\nsecret: s3cret\n",
        );

        assert_eq!(endpoint.host, "192.168.1.5");
        assert_eq!(endpoint.port, 9097);
        assert_eq!(endpoint.secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_missing_file_keeps_endpoint() {
        let dir = tempdir().unwrap();
        let mut endpoint = ControllerEndpoint::new("127.0.0.1", 9191);

        assert!(!endpoint.update_from_file(&dir.path().join("missing.yaml")));
        assert_eq!(endpoint, ControllerEndpoint::new("127.0.0.1", 9191));
    }

    #[test]
    fn test_update_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "external-controller: 127.0.0.1:19090\n").unwrap();

        let mut endpoint = ControllerEndpoint::default();
        assert!(endpoint.update_from_file(&path));
        assert_eq!(endpoint.port, 19090);
    }

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("127.0.0.1:9090"),
            (Some("127.0.0.1".to_string()), Some(9090))
        );
        assert_eq!(split_address(":9090"), (None, Some(9090)));
        assert_eq!(split_address("localhost"), (Some("localhost".to_string()), None));
        assert_eq!(split_address("[::1]:80"), (Some("::1".to_string()), Some(80)));
        assert_eq!(split_address(""), (None, None));
    }

    #[test]
    fn test_unparsable_port_keeps_host_and_previous_port() {
        assert_eq!(
            split_address("127.0.0.1:abc"),
            (Some("127.0.0.1".to_string()), None)
        );

        let mut endpoint = ControllerEndpoint::new("10.0.0.1", 9097);
        endpoint.update_from_str("external-controller: 127.0.0.1:abc\n");
        assert_eq!(endpoint.authority(), "127.0.0.1:9097");
    }
}
