use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use session_client::{CallError, RequestDescriptor};
use tokio_util::sync::CancellationToken;

use super::Backend;

/// Server copy of the user's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default)]
    pub settings: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSaved {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Settings sync between devices. Requires sign-in.
pub struct SettingsService {
    backend: Backend,
}

impl SettingsService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<SettingsSnapshot, CallError> {
        let request = RequestDescriptor::get(self.backend.url("/settings"));
        self.backend.executor().send_json(request, cancel).await
    }

    pub async fn save(
        &self,
        settings: Value,
        cancel: &CancellationToken,
    ) -> Result<SettingsSaved, CallError> {
        let request =
            RequestDescriptor::put(self.backend.url("/settings"), json!({ "settings": settings }));
        self.backend.executor().send_json(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBackend, sign_in};

    #[tokio::test]
    async fn save_then_fetch_round_trips_through_backend() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;
        sign_in(&session, crate::test_support::VALID_TOKEN, None).await;
        let service = session.backend().settings();
        let cancel = CancellationToken::new();

        let saved = service.save(json!({"theme": "dark"}), &cancel).await.unwrap();
        assert!(saved.updated_at.is_some());

        let snapshot = service.fetch(&cancel).await.unwrap();
        assert_eq!(snapshot.settings, json!({"theme": "dark"}));
        assert_eq!(mock.state.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_fetch_is_aborted() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = session.backend().settings().fetch(&cancel).await;
        match result {
            Err(CallError::Failed(error)) => assert_eq!(error.code, "ABORTED"),
            other => panic!("expected ABORTED, got {other:?}"),
        }
    }
}
