//! Session wiring for the CLI
//!
//! Builds the file-backed credential store and the request executor from
//! config, and implements the local `login` / `logout` / `status` commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::header::HeaderName;
use serde::Serialize;
use session_auth::{
    CredentialStore, Credentials, FileCredentialStore, HttpTokenRefresher, now_millis,
};
use session_client::{ReqwestTransport, RequestExecutor, SessionNotifier};
use tracing::info;

use crate::api::Backend;
use crate::config::{Config, LoginTokens};

pub struct Session {
    store: Arc<FileCredentialStore>,
    backend: Backend,
}

/// Output of `status`. Never carries token values.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub signed_in: bool,
    pub has_refresh_token: bool,
    pub access_token_expired: bool,
    pub anonymous_id: Option<String>,
    pub credentials_path: String,
}

impl Session {
    pub async fn open(config: &Config, notifier: Arc<dyn SessionNotifier>) -> Result<Self> {
        let store = Arc::new(
            FileCredentialStore::load(config.session.credentials_path.clone())
                .await
                .with_context(|| {
                    format!(
                        "failed to load session from {}",
                        config.session.credentials_path.display()
                    )
                })?,
        );

        let client = reqwest::Client::new();
        let transport = Arc::new(ReqwestTransport::new(client.clone(), config.timeout()));
        let refresher = Arc::new(HttpTokenRefresher::new(
            client,
            config.refresh_url(),
            config.timeout(),
        ));
        let header = HeaderName::from_bytes(config.session.anonymous_id_header.as_bytes())
            .context("invalid anonymous_id_header")?;

        let executor = RequestExecutor::new(transport, store.clone(), refresher, notifier, header)
            .send_anonymous_id_with_token(config.session.send_anonymous_id_with_token);

        Ok(Self {
            store,
            backend: Backend::new(Arc::new(executor), config.backend.base_url.clone()),
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Store the supplied tokens as the signed-in session.
    pub async fn login(&self, tokens: LoginTokens) -> Result<()> {
        let mut credentials = Credentials::bearer(tokens.access_token.expose().clone());
        if let Some(refresh) = tokens.refresh_token {
            credentials = credentials.with_refresh_token(refresh.expose().clone());
        }
        self.store
            .set_credentials(credentials)
            .await
            .context("failed to save credentials")?;
        info!(path = %self.store.path().display(), "signed in");
        Ok(())
    }

    /// Drop the credentials. The anonymous id survives so the backend still
    /// recognizes this client.
    pub async fn logout(&self) -> Result<()> {
        self.store
            .clear_credentials()
            .await
            .context("failed to clear credentials")?;
        info!("signed out");
        Ok(())
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.store.snapshot().await;
        let now = now_millis();
        SessionStatus {
            signed_in: state.credentials.is_some(),
            has_refresh_token: state
                .credentials
                .as_ref()
                .is_some_and(|c| c.usable_refresh_token(now).is_some()),
            access_token_expired: state
                .credentials
                .as_ref()
                .is_some_and(|c| c.access_token_expired(now)),
            anonymous_id: state.anonymous_id,
            credentials_path: self.store.path().display().to_string(),
        }
    }
}
