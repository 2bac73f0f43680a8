//! Token refresh
//!
//! The refresh operation exchanges a refresh token for a new credential set.
//! `TokenRefresher` is the seam the refresh coordinator calls through;
//! `HttpTokenRefresher` is the production implementation that POSTs to the
//! backend's refresh endpoint.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::{Credentials, now_millis};
use crate::error::{Error, Result};

/// Response from the refresh endpoint.
///
/// Expiries are deltas in seconds from the response time; they are turned
/// into absolute unix millisecond timestamps when converted to `Credentials`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

impl TokenResponse {
    /// Build credentials from this response.
    ///
    /// Servers that don't rotate refresh tokens omit `refresh_token`; the
    /// previous one is carried over in that case.
    pub fn into_credentials(self, previous_refresh: &str, now_millis: u64) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: Some(
                self.refresh_token
                    .unwrap_or_else(|| previous_refresh.to_string()),
            ),
            access_token_expires_at: self.expires_in.map(|s| now_millis + s * 1000),
            refresh_token_expires_at: self.refresh_expires_in.map(|s| now_millis + s * 1000),
        }
    }
}

/// POST a refresh token to the refresh endpoint.
///
/// 401/403 from the endpoint mean the refresh token is revoked or expired
/// and map to `InvalidCredentials`; other non-2xx statuses are
/// `TokenRefresh`. The whole exchange, body included, is bounded by
/// `timeout`; a stalled endpoint surfaces as `Http`.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoint: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint)
        .timeout(timeout)
        .json(&serde_json::json!({ "refresh_token": refresh }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRefresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRefresh(format!("invalid refresh response: {e}")))
}

/// The refresh operation consumed by the refresh coordinator.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenRefresher>`).
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials>> + Send + 'a>>;
}

/// Refreshes tokens against the backend's HTTP refresh endpoint.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token_value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials>> + Send + 'a>> {
        Box::pin(async move {
            debug!(endpoint = %self.endpoint, "refreshing access token");
            let response = refresh_token(
                &self.client,
                &self.endpoint,
                refresh_token_value,
                self.timeout,
            )
            .await?;
            Ok(response.into_credentials(refresh_token_value, now_millis()))
        })
    }
}
