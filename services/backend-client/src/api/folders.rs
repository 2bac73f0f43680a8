use serde::{Deserialize, Serialize};
use session_client::{CallError, RequestDescriptor};
use tokio_util::sync::CancellationToken;

use super::Backend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Deserialize)]
struct FoldersResponse {
    #[serde(default)]
    folders: Vec<Folder>,
}

/// The signed-in user's saved folders.
pub struct FoldersService {
    backend: Backend,
}

impl FoldersService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Folder>, CallError> {
        let request = RequestDescriptor::get(self.backend.url("/folders"));
        let response: FoldersResponse = self.backend.executor().send_json(request, cancel).await?;
        Ok(response.folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBackend, sign_in};

    #[tokio::test]
    async fn expired_token_is_refreshed_transparently() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;
        sign_in(&session, "at_stale", Some("rt_good")).await;

        let folders = session
            .backend()
            .folders()
            .list(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[1].parent_id.as_deref(), Some("f-1"));
        assert_eq!(mock.state.refresh_calls(), 1);
        assert!(session.status().await.signed_in);
    }

    #[tokio::test]
    async fn signed_out_list_requires_login() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;

        let result = session
            .backend()
            .folders()
            .list(&CancellationToken::new())
            .await;

        assert_eq!(result, Err(CallError::LoginRequired));
        assert_eq!(mock.state.refresh_calls(), 0);
        assert!(mock.notifier.prompted());
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;
        sign_in(&session, "at_stale", Some("rt_revoked")).await;

        let result = session
            .backend()
            .folders()
            .list(&CancellationToken::new())
            .await;

        match result {
            Err(CallError::Failed(error)) => assert_eq!(error.code, "AUTH_ERROR"),
            other => panic!("expected AUTH_ERROR, got {other:?}"),
        }
        assert!(!session.status().await.signed_in);
    }
}
