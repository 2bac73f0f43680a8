use serde::{Deserialize, Serialize};
use session_client::{CallError, RequestDescriptor};
use tokio_util::sync::CancellationToken;

use super::Backend;

/// A user-submitted problem report.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReport {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCreated {
    pub issue_id: String,
}

pub struct IssuesService {
    backend: Backend,
}

impl IssuesService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn report(
        &self,
        report: &IssueReport,
        cancel: &CancellationToken,
    ) -> Result<IssueCreated, CallError> {
        let body = serde_json::to_value(report).map_err(|e| CallError::Decode(e.to_string()))?;
        let request = RequestDescriptor::post(self.backend.url("/issues"), body);
        self.backend.executor().send_json(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockBackend;

    #[tokio::test]
    async fn report_posts_body_and_returns_id() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;

        let created = session
            .backend()
            .issues()
            .report(
                &IssueReport {
                    title: "Button broken".into(),
                    description: "Nothing happens".into(),
                    page_url: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(created.issue_id, "issue-1");
        let body = mock.state.last_issue().unwrap();
        assert_eq!(body["title"], "Button broken");
        assert!(body.get("page_url").is_none());
    }

    #[tokio::test]
    async fn validation_error_surfaces_backend_code() {
        let mock = MockBackend::start().await;
        let session = mock.open_session().await;

        let result = session
            .backend()
            .issues()
            .report(
                &IssueReport {
                    title: String::new(),
                    description: "x".into(),
                    page_url: None,
                },
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(CallError::Failed(error)) => {
                assert_eq!(error.code, "VALIDATION_FAILED");
                assert_eq!(error.message, "title is required");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
