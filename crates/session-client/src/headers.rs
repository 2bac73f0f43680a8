//! Auth header construction
//!
//! Reads one credentials snapshot from the store and turns it into the
//! headers every backend request carries: a bearer token when signed in,
//! the anonymous-user id when known.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use session_auth::{CredentialStore, SessionState};
use tracing::warn;

/// Headers for one request, plus the access token they were built from.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    pub headers: HeaderMap,
    /// Access token placed in `Authorization`, if any
    pub access_token: Option<String>,
}

pub struct AuthHeaderBuilder {
    store: Arc<dyn CredentialStore>,
    anonymous_id_header: HeaderName,
    /// Send the anonymous id alongside a bearer token, not only when signed out
    send_anonymous_id_with_token: bool,
}

impl AuthHeaderBuilder {
    pub fn new(store: Arc<dyn CredentialStore>, anonymous_id_header: HeaderName) -> Self {
        Self {
            store,
            anonymous_id_header,
            send_anonymous_id_with_token: false,
        }
    }

    pub fn send_anonymous_id_with_token(mut self, enabled: bool) -> Self {
        self.send_anonymous_id_with_token = enabled;
        self
    }

    pub async fn build(&self) -> AuthHeaders {
        let SessionState {
            credentials,
            anonymous_id,
        } = self.store.snapshot().await;
        let mut out = AuthHeaders::default();

        if let Some(credentials) = credentials.filter(|c| !c.access_token.is_empty()) {
            match HeaderValue::from_str(&format!("Bearer {}", credentials.access_token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    out.headers.insert(AUTHORIZATION, value);
                    out.access_token = Some(credentials.access_token);
                }
                Err(e) => warn!(error = %e, "stored access token is not a valid header value"),
            }
        }

        if (out.access_token.is_none() || self.send_anonymous_id_with_token)
            && let Some(id) = anonymous_id
        {
            match HeaderValue::from_str(&id) {
                Ok(value) => {
                    out.headers.insert(self.anonymous_id_header.clone(), value);
                }
                Err(e) => warn!(error = %e, "stored anonymous id is not a valid header value"),
            }
        }

        out
    }
}
