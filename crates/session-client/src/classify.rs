//! Response classification
//!
//! Maps a backend response onto the closed outcome set the executor branches
//! on. Login and subscription markers are honored on any status code, since
//! the backend does not restrict them to 401/403.
//!
//! Every 401 is a refresh candidate unless its body says the user must log in
//! or subscribe. A body carrying the `TOKEN_EXPIRED` marker is a refresh
//! candidate on any status.

use serde_json::Value;

use crate::error::{RequestError, codes};

/// Body markers the backend uses to signal auth conditions.
pub mod markers {
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const LOGIN_REQUIRED: &str = "LOGIN_REQUIRED";
    pub const SUBSCRIPTION_REQUIRED: &str = "SUBSCRIPTION_REQUIRED";
}

/// Fields a marker may be carried in, checked in order.
const MARKER_FIELDS: &[&str] = &["error_code", "errorCode", "code"];

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedOutcome {
    Success(Value),
    TokenExpired,
    LoginRequired,
    SubscriptionRequired,
    Unauthorized { code: String, message: String },
    HttpError { code: String, message: String },
    Aborted,
    NetworkError(String),
}

impl ClassifiedOutcome {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ClassifiedOutcome::Success(_) => "success",
            ClassifiedOutcome::TokenExpired => "token_expired",
            ClassifiedOutcome::LoginRequired => "login_required",
            ClassifiedOutcome::SubscriptionRequired => "subscription_required",
            ClassifiedOutcome::Unauthorized { .. } => "unauthorized",
            ClassifiedOutcome::HttpError { .. } => "http_error",
            ClassifiedOutcome::Aborted => "aborted",
            ClassifiedOutcome::NetworkError(_) => "network_error",
        }
    }

    /// The `(code, message)` pair surfaced to callers for failure outcomes.
    ///
    /// `TokenExpired` only reaches callers on the post-refresh retry, where
    /// it is reported as a plain `UNAUTHORIZED`.
    pub fn into_error(self) -> Option<RequestError> {
        match self {
            ClassifiedOutcome::Success(_)
            | ClassifiedOutcome::LoginRequired
            | ClassifiedOutcome::SubscriptionRequired => None,
            ClassifiedOutcome::TokenExpired => Some(RequestError::new(
                codes::UNAUTHORIZED,
                "Session expired, please sign in again",
            )),
            ClassifiedOutcome::Unauthorized { code, message }
            | ClassifiedOutcome::HttpError { code, message } => {
                Some(RequestError::new(code, message))
            }
            ClassifiedOutcome::Aborted => {
                Some(RequestError::new(codes::ABORTED, "Request was aborted"))
            }
            ClassifiedOutcome::NetworkError(message) => {
                Some(RequestError::new(codes::NETWORK_ERROR, message))
            }
        }
    }
}

/// Best-effort JSON parse of a response body.
///
/// Empty or unparseable bodies become an empty object, never an error.
pub fn parse_body(raw: &[u8]) -> Value {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_slice(raw).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

/// Classify a response by status and parsed body.
pub fn classify(status: u16, status_text: &str, body: Value) -> ClassifiedOutcome {
    let marker = marker(&body);
    let is_marker = |expected: &str| marker.as_deref() == Some(expected);

    let prompt_marker =
        is_marker(markers::LOGIN_REQUIRED) || is_marker(markers::SUBSCRIPTION_REQUIRED);
    if (status == 401 && !prompt_marker) || is_marker(markers::TOKEN_EXPIRED) {
        return ClassifiedOutcome::TokenExpired;
    }
    if is_marker(markers::LOGIN_REQUIRED) {
        return ClassifiedOutcome::LoginRequired;
    }
    if is_marker(markers::SUBSCRIPTION_REQUIRED) {
        return ClassifiedOutcome::SubscriptionRequired;
    }
    if !(200..300).contains(&status) {
        let fallback_message = if status_text.is_empty() {
            format!("Request failed with status {status}")
        } else {
            status_text.to_string()
        };
        let (code, message) = extract_error(&body, &format!("HTTP_{status}"), &fallback_message);
        return ClassifiedOutcome::HttpError { code, message };
    }
    ClassifiedOutcome::Success(body)
}

/// Classify the response to the single post-refresh retry.
///
/// No second refresh is attempted, so a refresh candidate here becomes
/// `Unauthorized` with the body's code and message. The internal
/// `TOKEN_EXPIRED` code is reported as `UNAUTHORIZED`.
pub fn classify_retry(status: u16, status_text: &str, body: Value) -> ClassifiedOutcome {
    let fallback = if status_text.is_empty() {
        "Unauthorized"
    } else {
        status_text
    };
    let (code, message) = extract_error(&body, codes::UNAUTHORIZED, fallback);
    match classify(status, status_text, body) {
        ClassifiedOutcome::TokenExpired => {
            let code = if code.trim().eq_ignore_ascii_case(markers::TOKEN_EXPIRED) {
                codes::UNAUTHORIZED.to_string()
            } else {
                code
            };
            ClassifiedOutcome::Unauthorized { code, message }
        }
        other => other,
    }
}

/// Extract the caller-facing `(code, message)` from an error body.
///
/// Code: `error_code`, else `default_code`. Message: `error_message`, then
/// `detail` (a string, or an object's `message`), then `fallback_message`.
/// camelCase spellings are accepted for both fields.
pub fn extract_error(body: &Value, default_code: &str, fallback_message: &str) -> (String, String) {
    let code = string_field(body, &["error_code", "errorCode"])
        .unwrap_or(default_code)
        .to_string();

    let message = string_field(body, &["error_message", "errorMessage"])
        .or_else(|| detail_message(body))
        .unwrap_or(fallback_message)
        .to_string();

    (code, message)
}

/// The auth marker carried by the body, at the top level or inside `detail`.
fn marker(body: &Value) -> Option<String> {
    string_field(body, MARKER_FIELDS)
        .or_else(|| {
            body.get("detail")
                .filter(|d| d.is_object())
                .and_then(|d| string_field(d, MARKER_FIELDS))
        })
        .map(|m| m.trim().to_ascii_uppercase())
}

fn detail_message(body: &Value) -> Option<&str> {
    match body.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        Value::Object(detail) => detail
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty()),
        _ => None,
    }
}

/// First non-blank string among `fields`.
fn string_field<'a>(body: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|field| {
        body.get(*field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    })
}
