use std::path::PathBuf;

/// Every failure the crate can report.
///
/// The widget never lets one of these escape to its host; each ends up as a
/// log line and possibly a status update or inline error message.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// An endpoint URL could not be built from the configured base URL.
    #[error("invalid endpoint URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered, but the body was not the expected JSON shape.
    #[error("could not decode response from {url} (HTTP {status}): {detail}")]
    Decode {
        url: String,
        status: u16,
        detail: String,
    },

    /// An inbound stream frame was not a JSON object.
    #[error("malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::MalformedEvent(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_display() {
        let e = ChatError::InvalidUrl {
            url: "nope".to_string(),
            detail: "relative URL without a base".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid endpoint URL 'nope': relative URL without a base"
        );
    }

    #[test]
    fn test_decode_display_carries_status() {
        let e = ChatError::Decode {
            url: "http://x/control".to_string(),
            status: 502,
            detail: "expected value".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("HTTP 502"));
        assert!(s.contains("http://x/control"));
    }

    #[test]
    fn test_json_error_becomes_malformed_event() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: ChatError = err.into();
        assert!(matches!(e, ChatError::MalformedEvent(_)));
    }

    #[test]
    fn test_config_io_display_includes_path() {
        let e = ChatError::ConfigIo {
            path: PathBuf::from("/tmp/missing.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(e.to_string().contains("/tmp/missing.toml"));
    }
}
