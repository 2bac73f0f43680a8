//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Login tokens come from BACKEND_ACCESS_TOKEN / BACKEND_REFRESH_TOKEN or
//! from token files, never from the TOML directly.

use common::Secret;
use serde::Deserialize;
use session_auth::{ANONYMOUS_ID_HEADER, DEFAULT_REFRESH_PATH, DEFAULT_SESSION_FILE};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session persistence and auth header settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_anonymous_id_header")]
    pub anonymous_id_header: String,
    #[serde(default)]
    pub send_anonymous_id_with_token: bool,
    /// File holding an access token for `login` (alternative to BACKEND_ACCESS_TOKEN)
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    /// File holding a refresh token for `login` (alternative to BACKEND_REFRESH_TOKEN)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            refresh_path: default_refresh_path(),
            anonymous_id_header: default_anonymous_id_header(),
            send_anonymous_id_with_token: false,
            access_token_file: None,
            refresh_token_file: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_anonymous_id_header() -> String {
    ANONYMOUS_ID_HEADER.to_string()
}

/// Tokens supplied to the `login` command.
pub struct LoginTokens {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("BACKEND_BASE_URL") {
            config.backend.base_url = url;
        }
        config.backend.base_url = config.backend.base_url.trim_end_matches('/').to_string();

        if !config.backend.base_url.starts_with("http://")
            && !config.backend.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.backend.base_url
            )));
        }

        if config.backend.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !config.session.refresh_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "refresh_path must start with '/', got: {}",
                config.session.refresh_path
            )));
        }

        if reqwest::header::HeaderName::from_bytes(config.session.anonymous_id_header.as_bytes())
            .is_err()
        {
            return Err(common::Error::Config(format!(
                "anonymous_id_header is not a valid header name: {}",
                config.session.anonymous_id_header
            )));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("backend-client.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Absolute URL for a backend path such as `/folders`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.backend.base_url, path)
    }

    pub fn refresh_url(&self) -> String {
        self.endpoint(&self.session.refresh_path)
    }

    /// Resolve the tokens for `login`. Env vars take precedence over files.
    ///
    /// Returns `Ok(None)` when no access token is configured anywhere.
    pub fn login_tokens(&self) -> common::Result<Option<LoginTokens>> {
        let Some(access_token) = Secret::<String>::from_env_or_file(
            "BACKEND_ACCESS_TOKEN",
            self.session.access_token_file.as_deref(),
        )?
        else {
            return Ok(None);
        };
        let refresh_token = Secret::<String>::from_env_or_file(
            "BACKEND_REFRESH_TOKEN",
            self.session.refresh_token_file.as_deref(),
        )?;
        Ok(Some(LoginTokens {
            access_token,
            refresh_token,
        }))
    }
}
