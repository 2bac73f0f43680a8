use serde::{Deserialize, Serialize};
use session_client::{CallError, RequestDescriptor};
use tokio_util::sync::CancellationToken;

use super::Backend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Deserialize)]
struct CouponsResponse {
    #[serde(default)]
    coupons: Vec<Coupon>,
}

/// Subscriber-only coupon listing.
pub struct CouponsService {
    backend: Backend,
}

impl CouponsService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Coupon>, CallError> {
        let request = RequestDescriptor::get(self.backend.url("/coupons"));
        let response: CouponsResponse = self.backend.executor().send_json(request, cancel).await?;
        Ok(response.coupons)
    }
}
