//! Typed backend endpoints
//!
//! Each service is a thin wrapper that names a path, a method and a body
//! shape. Auth headers, anonymous-id adoption, refresh and retry all happen
//! in the shared `RequestExecutor`.

pub mod coupons;
pub mod folders;
pub mod issues;
pub mod settings;
pub mod synonyms;

use std::sync::Arc;

use session_client::RequestExecutor;

pub use coupons::{Coupon, CouponsService};
pub use folders::{Folder, FoldersService};
pub use issues::{IssueCreated, IssueReport, IssuesService};
pub use settings::{SettingsSaved, SettingsService, SettingsSnapshot};
pub use synonyms::{SynonymGroup, SynonymsService};

/// Executor plus base URL, shared by every endpoint service.
#[derive(Clone)]
pub struct Backend {
    executor: Arc<RequestExecutor>,
    base_url: String,
}

impl Backend {
    pub fn new(executor: Arc<RequestExecutor>, base_url: impl Into<String>) -> Self {
        Self {
            executor,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn synonyms(&self) -> SynonymsService {
        SynonymsService::new(self.clone())
    }

    pub fn folders(&self) -> FoldersService {
        FoldersService::new(self.clone())
    }

    pub fn issues(&self) -> IssuesService {
        IssuesService::new(self.clone())
    }

    pub fn settings(&self) -> SettingsService {
        SettingsService::new(self.clone())
    }

    pub fn coupons(&self) -> CouponsService {
        CouponsService::new(self.clone())
    }
}
