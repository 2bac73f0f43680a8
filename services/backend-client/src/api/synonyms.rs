use serde::{Deserialize, Serialize};
use serde_json::json;
use session_client::{CallError, RequestDescriptor};
use tokio_util::sync::CancellationToken;

use super::Backend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub word: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Deserialize)]
struct SynonymsResponse {
    #[serde(default)]
    results: Vec<SynonymGroup>,
}

/// Synonym lookup. Works signed out; the backend tracks usage by anonymous id.
pub struct SynonymsService {
    backend: Backend,
}

impl SynonymsService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn lookup(
        &self,
        words: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<SynonymGroup>, CallError> {
        let request =
            RequestDescriptor::post(self.backend.url("/synonyms"), json!({ "words": words }));
        let response: SynonymsResponse = self.backend.executor().send_json(request, cancel).await?;
        Ok(response.results)
    }
}
