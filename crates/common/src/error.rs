//! Configuration and secret-loading errors

use thiserror::Error;

/// Errors raised while loading configuration or secrets from disk
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read secret from {path}: {source}")]
    SecretFile {
        path: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("base_url must start with http".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: base_url must start with http"
        );

        let secret_err = Error::SecretFile {
            path: "/run/secrets/token".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let rendered = secret_err.to_string();
        assert!(rendered.contains("/run/secrets/token"), "got: {rendered}");
        assert!(rendered.contains("gone"), "got: {rendered}");
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("not valid {{{{ toml");
        let err: Error = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("TOML parse error:"));
    }
}
