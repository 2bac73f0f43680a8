//! Error types surfaced to callers of the request executor

/// Error codes callers can match on.
pub mod codes {
    /// Token refresh failed; the session has been cleared
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    /// 401 without a more specific marker
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// The caller cancelled the request
    pub const ABORTED: &str = "ABORTED";
    /// The request never produced a response
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
}

/// A classified request failure, as shown to the user.
///
/// `code` is either one of [`codes`], `HTTP_<status>`, or a backend-supplied
/// `error_code`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RequestError {
    pub code: String,
    pub message: String,
}

impl RequestError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn auth_failed() -> Self {
        Self::new(codes::AUTH_ERROR, "Token refresh failed")
    }
}

/// Non-success result of [`crate::RequestExecutor::send`].
///
/// Login and subscription prompts are handled UI flows rather than failures;
/// they get their own variants so callers can stop without reporting an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("login required")]
    LoginRequired,

    #[error("subscription required")]
    SubscriptionRequired,

    #[error(transparent)]
    Failed(#[from] RequestError),

    #[error("unexpected response payload: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_display_is_code_and_message() {
        let err = RequestError::new("HTTP_404", "Not Found");
        assert_eq!(err.to_string(), "HTTP_404: Not Found");
    }

    #[test]
    fn auth_failed_uses_fixed_text() {
        assert_eq!(
            RequestError::auth_failed(),
            RequestError::new("AUTH_ERROR", "Token refresh failed")
        );
    }

    #[test]
    fn call_error_failed_is_transparent() {
        let err: CallError = RequestError::new("NETWORK_ERROR", "connection refused").into();
        assert_eq!(err.to_string(), "NETWORK_ERROR: connection refused");
    }
}
