use std::path::PathBuf;

use clap::Parser;

use crate::config::ChatConfig;
use crate::error::ChatError;

#[derive(Parser, Debug)]
#[command(name = "chatwire")]
#[command(version = "0.3.0")]
#[command(about = "Terminal chat client for a streaming agent server")]
pub struct Args {
    /// TOML config file (base_url, session_id, reconnect_delay_ms, ...)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Server origin, e.g. http://127.0.0.1:5000
    #[arg(long)]
    pub base_url: Option<String>,

    /// Session to join; a fresh UUID is used when none is configured
    #[arg(long)]
    pub session_id: Option<String>,

    /// Delay before reopening a closed event stream
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,
}

impl Args {
    /// Defaults, then `--config`, then `CHATWIRE_*`, then flags.
    pub fn resolve_config(&self) -> Result<ChatConfig, ChatError> {
        self.resolve_config_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_config_with<F>(&self, env: F) -> Result<ChatConfig, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => ChatConfig::load(path)?,
            None => ChatConfig::default(),
        };
        config.apply_env_from(env)?;

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(id) = &self.session_id {
            config.session_id = id.clone();
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay_ms = ms;
        }
        if config.session_id.trim().is_empty() {
            config.session_id = uuid::Uuid::new_v4().to_string();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_BASE_URL, ENV_BASE_URL, ENV_SESSION_ID};
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["chatwire"]);
        assert!(args.config.is_none());
        assert!(args.base_url.is_none());
        assert!(args.session_id.is_none());
        assert!(args.reconnect_delay_ms.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_parse_all_flags() {
        let args = Args::parse_from([
            "chatwire",
            "--config",
            "chat.toml",
            "--base-url",
            "http://h:1",
            "--session-id",
            "abc",
            "--reconnect-delay-ms",
            "250",
            "-v",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("chat.toml")));
        assert_eq!(args.base_url.as_deref(), Some("http://h:1"));
        assert_eq!(args.session_id.as_deref(), Some("abc"));
        assert_eq!(args.reconnect_delay_ms, Some(250));
        assert!(args.verbose);
    }

    #[test]
    fn test_args_rejects_non_numeric_delay() {
        assert!(Args::try_parse_from(["chatwire", "--reconnect-delay-ms", "soon"]).is_err());
    }

    #[test]
    fn test_resolve_generates_session_id() {
        let cfg = Args::parse_from(["chatwire"])
            .resolve_config_with(no_env)
            .expect("resolve");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert!(uuid::Uuid::parse_str(&cfg.session_id).is_ok());
    }

    #[test]
    fn test_resolve_flag_beats_env() {
        let env = |key: &str| match key {
            k if k == ENV_SESSION_ID => Some("from-env".to_string()),
            k if k == ENV_BASE_URL => Some("http://env:1".to_string()),
            _ => None,
        };
        let cfg = Args::parse_from(["chatwire", "--session-id", "from-flag"])
            .resolve_config_with(env)
            .expect("resolve");
        assert_eq!(cfg.session_id, "from-flag");
        assert_eq!(cfg.base_url, "http://env:1");
    }

    #[test]
    fn test_resolve_env_beats_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "session_id = \"from-file\"\nreconnect_delay_ms = 900").expect("write");
        let path = file.path().to_string_lossy().to_string();

        let env = |key: &str| (key == ENV_SESSION_ID).then(|| "from-env".to_string());
        let cfg = Args::parse_from(["chatwire", "--config", &path])
            .resolve_config_with(env)
            .expect("resolve");
        assert_eq!(cfg.session_id, "from-env");
        assert_eq!(cfg.reconnect_delay_ms, 900);
    }

    #[test]
    fn test_resolve_invalid_url_rejected() {
        let err = Args::parse_from(["chatwire", "--base-url", "ftp://nope"])
            .resolve_config_with(no_env)
            .unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_resolve_zero_delay_rejected() {
        let result = Args::parse_from(["chatwire", "--reconnect-delay-ms", "0"])
            .resolve_config_with(no_env);
        assert!(result.is_err());
    }
}
