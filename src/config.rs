//! Configuration
//!
//! Settings come from an optional TOML file layered under command-line flags
//! and environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::client::DEFAULT_API_URL;
use crate::error::ConfigError;
use crate::forward::CommitPolicy;
use crate::poller::DEFAULT_INTERVAL;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "uh-ring.toml";

pub const DEFAULT_PORT: u16 = 8080;

/// One layer of optional settings (file or command line)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub api_token: Option<String>,
    pub api_url: Option<String>,
    pub port: Option<u16>,
    pub interval_seconds: Option<u64>,
    pub remote_write_url: Option<String>,
    pub commit_before_send: Option<bool>,
}

impl ConfigLayer {
    /// Values from `self`, falling back to `base` where unset
    pub fn over(self, base: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            api_token: self.api_token.or(base.api_token),
            api_url: self.api_url.or(base.api_url),
            port: self.port.or(base.port),
            interval_seconds: self.interval_seconds.or(base.interval_seconds),
            remote_write_url: self.remote_write_url.or(base.remote_write_url),
            commit_before_send: self.commit_before_send.or(base.commit_before_send),
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_token: String,
    pub api_url: String,
    pub port: u16,
    pub interval: Duration,
    pub remote_write_url: Option<String>,
    pub commit_policy: CommitPolicy,
}

impl Settings {
    /// Merge `cli` over `file` and validate the result
    pub fn resolve(file: Option<ConfigLayer>, cli: ConfigLayer) -> Result<Self, ConfigError> {
        let merged = cli.over(file.unwrap_or_default());

        let api_token = merged
            .api_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let interval = match merged.interval_seconds {
            Some(0) => return Err(ConfigError::InvalidInterval(0)),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_INTERVAL,
        };

        let commit_policy = if merged.commit_before_send.unwrap_or(false) {
            CommitPolicy::BeforeSend
        } else {
            CommitPolicy::OnSuccess
        };

        Ok(Settings {
            api_token,
            api_url: merged.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            port: merged.port.unwrap_or(DEFAULT_PORT),
            interval,
            remote_write_url: merged.remote_write_url.filter(|u| !u.is_empty()),
            commit_policy,
        })
    }

    /// Remote write URL, required by serve mode
    pub fn require_remote_write(&self) -> Result<&str, ConfigError> {
        self.remote_write_url
            .as_deref()
            .ok_or(ConfigError::MissingRemoteWrite)
    }
}

/// Load the config file at `path`, or `uh-ring.toml` if it exists.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<Option<ConfigLayer>, ConfigError> {
    if let Some(path) = path {
        return load_config_file(path).map(Some);
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return load_config_file(&default_path).map(Some);
    }

    Ok(None)
}

fn load_config_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_only() -> ConfigLayer {
        ConfigLayer {
            api_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(None, token_only()).unwrap();
        assert_eq!(
            settings,
            Settings {
                api_token: "token".to_string(),
                api_url: DEFAULT_API_URL.to_string(),
                port: 8080,
                interval: Duration::from_secs(60),
                remote_write_url: None,
                commit_policy: CommitPolicy::OnSuccess,
            }
        );
        assert!(matches!(
            settings.require_remote_write(),
            Err(ConfigError::MissingRemoteWrite)
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: ConfigLayer = toml::from_str(
            r#"
            api_token = "file-token"
            port = 9000
            interval_seconds = 300
            remote_write_url = "http://prometheus:9090/api/v1/write"
            commit_before_send = true
            "#,
        )
        .unwrap();
        let cli = ConfigLayer {
            port: Some(9100),
            ..Default::default()
        };

        let settings = Settings::resolve(Some(file), cli).unwrap();
        assert_eq!(settings.api_token, "file-token");
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.interval, Duration::from_secs(300));
        assert_eq!(
            settings.require_remote_write().unwrap(),
            "http://prometheus:9090/api/v1/write"
        );
        assert_eq!(settings.commit_policy, CommitPolicy::BeforeSend);
    }

    #[test]
    fn test_missing_token() {
        let blank = ConfigLayer {
            api_token: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Settings::resolve(None, blank),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cli = ConfigLayer {
            interval_seconds: Some(0),
            ..token_only()
        };
        assert!(matches!(
            Settings::resolve(None, cli),
            Err(ConfigError::InvalidInterval(0))
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result: Result<ConfigLayer, _> = toml::from_str("api_tokn = \"typo\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/uh-ring.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
