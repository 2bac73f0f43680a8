//! Anonymous-user id synchronization
//!
//! The backend may assign or rotate the anonymous id on any response,
//! including errors. The executor runs this on every response before it
//! looks at the status code.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName};
use session_auth::CredentialStore;
use tracing::{debug, warn};

pub struct AnonymousIdSynchronizer {
    store: Arc<dyn CredentialStore>,
    header: HeaderName,
}

impl AnonymousIdSynchronizer {
    pub fn new(store: Arc<dyn CredentialStore>, header: HeaderName) -> Self {
        Self { store, header }
    }

    /// Store the id carried by `headers`, if present and changed.
    ///
    /// Returns whether the stored id was updated. Store write failures are
    /// logged and reported as "not updated".
    pub async fn sync(&self, headers: &HeaderMap) -> bool {
        let Some(incoming) = headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return false;
        };

        if self.store.anonymous_id().await.as_deref() == Some(incoming) {
            return false;
        }

        match self.store.set_anonymous_id(incoming.to_string()).await {
            Ok(()) => {
                debug!(anonymous_id = incoming, "anonymous id updated from response");
                crate::metrics::record_anonymous_id_update();
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to persist anonymous id");
                false
            }
        }
    }
}
