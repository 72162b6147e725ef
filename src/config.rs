//! Widget configuration.
//!
//! Resolution order, lowest to highest precedence:
//!
//! 1. [`ChatConfig::default`]
//! 2. a TOML file (`--config`)
//! 3. `CHATWIRE_*` environment variables
//! 4. command-line flags (see [`crate::cli::Args`])
//!
//! ```toml
//! base_url = "http://127.0.0.1:5000"
//! session_id = "5d1c3c7e-3f0e-4d5c-9d55-0a6f7e0b9a11"
//! reconnect_delay_ms = 3000
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//! ```

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Delay before the widget reopens a stream that has fully closed.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

pub const ENV_BASE_URL: &str = "CHATWIRE_BASE_URL";
pub const ENV_SESSION_ID: &str = "CHATWIRE_SESSION_ID";
pub const ENV_RECONNECT_DELAY_MS: &str = "CHATWIRE_RECONNECT_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// Origin prefix for every endpoint, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
    /// Opaque session identifier, sent with every call. Never generated here.
    pub session_id: String,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_secs: u64,
    /// Applies to submissions only; the event stream is long-lived.
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_id: String::new(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl ChatConfig {
    pub fn new(base_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(src: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(src)
    }

    /// Read and parse a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let src = std::fs::read_to_string(path).map_err(|source| ChatError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src).map_err(|source| ChatError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `CHATWIRE_*` overrides read through `lookup`; empty values are
    /// ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(id) = get(ENV_SESSION_ID) {
            self.session_id = id;
        }
        if let Some(raw) = get(ENV_RECONNECT_DELAY_MS) {
            self.reconnect_delay_ms = raw.trim().parse().map_err(|_| {
                ChatError::Config(format!(
                    "{ENV_RECONNECT_DELAY_MS} must be a whole number of milliseconds, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.session_id.trim().is_empty() {
            return Err(ChatError::Config("session_id must not be empty".into()));
        }
        let url = Url::parse(&self.base_url).map_err(|e| ChatError::InvalidUrl {
            url: self.base_url.clone(),
            detail: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ChatError::Config("reconnect_delay_ms must be >= 1".into()));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `{base_url}{path}` as a parsed URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ChatError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| ChatError::InvalidUrl {
            url: raw,
            detail: e.to_string(),
        })
    }

    /// `GET /events?session_id=<id>`, with the id percent-encoded.
    pub fn events_url(&self) -> Result<Url, ChatError> {
        let mut url = self.endpoint("/events")?;
        url.query_pairs_mut()
            .append_pair("session_id", &self.session_id);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_default_reconnect_delay_is_three_seconds() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.reconnect_delay(), Duration::from_millis(3000));
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let cfg = ChatConfig::from_toml_str(r#"session_id = "abc""#).expect("parse");
        assert_eq!(cfg.session_id, "abc");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        assert!(ChatConfig::from_toml_str("sesion_id = \"typo\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "base_url = \"http://chat.local:8080\"\nsession_id = \"s-1\"\nreconnect_delay_ms = 500"
        )
        .expect("write");
        let cfg = ChatConfig::load(file.path()).expect("load");
        assert_eq!(cfg.base_url, "http://chat.local:8080");
        assert_eq!(cfg.session_id, "s-1");
        assert_eq!(cfg.reconnect_delay_ms, 500);
    }

    #[test]
    fn test_load_missing_file_is_config_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ChatConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ChatError::ConfigIo { .. }));
    }

    #[test]
    fn test_load_bad_toml_is_config_parse() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "session_id = ").expect("write");
        let err = ChatConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ChatError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = ChatConfig::default();
        cfg.apply_env_from(env(&[
            (ENV_BASE_URL, "https://example.org"),
            (ENV_SESSION_ID, "from-env"),
            (ENV_RECONNECT_DELAY_MS, "1500"),
        ]))
        .expect("apply");
        assert_eq!(cfg.base_url, "https://example.org");
        assert_eq!(cfg.session_id, "from-env");
        assert_eq!(cfg.reconnect_delay_ms, 1500);
    }

    #[test]
    fn test_env_empty_values_ignored() {
        let mut cfg = ChatConfig::new("http://a", "keep");
        cfg.apply_env_from(env(&[(ENV_SESSION_ID, "  ")])).expect("apply");
        assert_eq!(cfg.session_id, "keep");
    }

    #[test]
    fn test_env_bad_delay_rejected() {
        let mut cfg = ChatConfig::default();
        let err = cfg
            .apply_env_from(env(&[(ENV_RECONNECT_DELAY_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_RECONNECT_DELAY_MS));
    }

    #[test]
    fn test_validate_requires_session_id() {
        let cfg = ChatConfig::new("http://127.0.0.1:5000", "");
        assert!(matches!(cfg.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let cfg = ChatConfig::new("ftp://host", "s");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_garbage_url() {
        let cfg = ChatConfig::new("not a url", "s");
        assert!(matches!(cfg.validate(), Err(ChatError::InvalidUrl { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_delay() {
        let cfg = ChatConfig {
            reconnect_delay_ms: 0,
            ..ChatConfig::new("http://h", "s")
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(ChatConfig::new("https://h:9000", "s").validate().is_ok());
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let cfg = ChatConfig::new("http://h:1/", "s");
        assert_eq!(
            cfg.endpoint("/send_message").expect("url").as_str(),
            "http://h:1/send_message"
        );
    }

    #[test]
    fn test_events_url_encodes_session_id() {
        let cfg = ChatConfig::new("http://h", "a b&c");
        let url = cfg.events_url().expect("url");
        assert_eq!(url.path(), "/events");
        assert_eq!(url.query(), Some("session_id=a+b%26c"));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let cfg = ChatConfig::new("http://h", "s");
        let text = toml::to_string(&cfg).expect("serialize");
        assert_eq!(ChatConfig::from_toml_str(&text).expect("parse"), cfg);
    }
}
