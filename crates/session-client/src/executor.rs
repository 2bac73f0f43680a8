//! Authenticated request execution
//!
//! One call goes through:
//! 1. auth headers from a credentials snapshot
//! 2. transport call, raced against the caller's cancellation token
//! 3. anonymous-id sync on the raw response
//! 4. classification
//! 5. on `TokenExpired`: one shared refresh, then exactly one retry with the
//!    refreshed credentials, classified without a second refresh
//!
//! Every failure path ends in a classified outcome; nothing escapes as a
//! transport or parse error.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use session_auth::{CredentialStore, TokenRefresher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::anonymous::AnonymousIdSynchronizer;
use crate::classify::{ClassifiedOutcome, classify, classify_retry, parse_body};
use crate::error::{CallError, RequestError};
use crate::headers::AuthHeaderBuilder;
use crate::metrics::record_request;
use crate::notify::SessionNotifier;
use crate::refresh::{RefreshOutcome, TokenRefreshCoordinator};
use crate::request::{RequestDescriptor, Transport, TransportError};

/// Header carrying the per-call correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Final result of one logical call, before it is dispatched to handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Success(Value),
    LoginRequired,
    SubscriptionRequired,
    Failed(RequestError),
}

impl Completion {
    fn label(&self) -> &'static str {
        match self {
            Completion::Success(_) => "success",
            Completion::LoginRequired => "login_required",
            Completion::SubscriptionRequired => "subscription_required",
            Completion::Failed(_) => "error",
        }
    }
}

impl From<ClassifiedOutcome> for Completion {
    fn from(outcome: ClassifiedOutcome) -> Self {
        match outcome {
            ClassifiedOutcome::Success(payload) => Completion::Success(payload),
            ClassifiedOutcome::LoginRequired => Completion::LoginRequired,
            ClassifiedOutcome::SubscriptionRequired => Completion::SubscriptionRequired,
            other => match other.into_error() {
                Some(error) => Completion::Failed(error),
                None => Completion::Failed(RequestError::new(
                    "UNEXPECTED",
                    "Unclassified response",
                )),
            },
        }
    }
}

type SuccessFn<'a> = Box<dyn FnOnce(Value) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnOnce(&str, &str) + Send + 'a>;
type PromptFn<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Per-call outcome callbacks.
pub struct Handlers<'a> {
    on_success: SuccessFn<'a>,
    on_error: ErrorFn<'a>,
    on_login_required: Option<PromptFn<'a>>,
    on_subscription_required: Option<PromptFn<'a>>,
}

impl<'a> Handlers<'a> {
    pub fn new(
        on_success: impl FnOnce(Value) + Send + 'a,
        on_error: impl FnOnce(&str, &str) + Send + 'a,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
            on_login_required: None,
            on_subscription_required: None,
        }
    }

    pub fn on_login_required(mut self, f: impl FnOnce() + Send + 'a) -> Self {
        self.on_login_required = Some(Box::new(f));
        self
    }

    pub fn on_subscription_required(mut self, f: impl FnOnce() + Send + 'a) -> Self {
        self.on_subscription_required = Some(Box::new(f));
        self
    }
}

pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    headers: AuthHeaderBuilder,
    anonymous: AnonymousIdSynchronizer,
    refresh: TokenRefreshCoordinator,
    notifier: Arc<dyn SessionNotifier>,
}

impl RequestExecutor {
    /// Wire an executor around one credential store.
    ///
    /// Every collaborator shares `store`, so the retry after a refresh reads
    /// the same state the refresh wrote.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        notifier: Arc<dyn SessionNotifier>,
        anonymous_id_header: HeaderName,
    ) -> Self {
        Self {
            transport,
            headers: AuthHeaderBuilder::new(store.clone(), anonymous_id_header.clone()),
            anonymous: AnonymousIdSynchronizer::new(store.clone(), anonymous_id_header),
            refresh: TokenRefreshCoordinator::new(store, refresher, notifier.clone()),
            notifier,
        }
    }

    /// Send the anonymous id even when a bearer token is present.
    pub fn send_anonymous_id_with_token(mut self, enabled: bool) -> Self {
        self.headers = self.headers.send_anonymous_id_with_token(enabled);
        self
    }

    /// Run a call and dispatch its outcome to `handlers`.
    ///
    /// Login and subscription prompts call the caller's hook first, then the
    /// global notifier; neither reaches `on_error`.
    pub async fn execute(
        &self,
        request: RequestDescriptor,
        handlers: Handlers<'_>,
        cancel: &CancellationToken,
    ) {
        match self.run(request, cancel).await {
            Completion::Success(payload) => (handlers.on_success)(payload),
            Completion::LoginRequired => {
                if let Some(hook) = handlers.on_login_required {
                    hook();
                }
                self.notifier.notify_login_required();
            }
            Completion::SubscriptionRequired => {
                if let Some(hook) = handlers.on_subscription_required {
                    hook();
                }
                self.notifier.notify_subscription_required();
            }
            Completion::Failed(error) => (handlers.on_error)(&error.code, &error.message),
        }
    }

    /// Run a call and return its payload, for `?`-style callers.
    ///
    /// Prompts fire the global notifier and come back as
    /// `CallError::LoginRequired` / `CallError::SubscriptionRequired`.
    pub async fn send(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Value, CallError> {
        match self.run(request, cancel).await {
            Completion::Success(payload) => Ok(payload),
            Completion::LoginRequired => {
                self.notifier.notify_login_required();
                Err(CallError::LoginRequired)
            }
            Completion::SubscriptionRequired => {
                self.notifier.notify_subscription_required();
                Err(CallError::SubscriptionRequired)
            }
            Completion::Failed(error) => Err(CallError::Failed(error)),
        }
    }

    /// `send`, then decode the payload into `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<T, CallError> {
        let payload = self.send(request, cancel).await?;
        serde_json::from_value(payload).map_err(|e| CallError::Decode(e.to_string()))
    }

    /// Run the protocol and return the completion without dispatching it.
    pub async fn run(&self, request: RequestDescriptor, cancel: &CancellationToken) -> Completion {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.run_traced(request, cancel, &request_id).await
    }

    #[instrument(
        name = "session_request",
        skip_all,
        fields(request_id = %request_id, method = %request.method(), url = %request.url())
    )]
    async fn run_traced(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
        request_id: &str,
    ) -> Completion {
        let request = match HeaderValue::from_str(request_id) {
            Ok(value) => request.with_header(REQUEST_ID_HEADER, value),
            Err(_) => request,
        };

        let completion = self.run_protocol(request, cancel).await;
        match &completion {
            Completion::Failed(error) => {
                debug!(code = %error.code, message = %error.message, "request failed");
            }
            other => debug!(outcome = other.label(), "request completed"),
        }
        record_request(completion.label());
        completion
    }

    /// Headers, send, sync, classify; on an expired token, one shared
    /// refresh and one retry.
    async fn run_protocol(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Completion {
        let auth = self.headers.build().await;
        let first = request.merged_with(&auth.headers);
        match self.attempt(&first, cancel, false).await {
            ClassifiedOutcome::TokenExpired => {
                debug!("access token rejected, refreshing");
            }
            other => return Completion::from(other),
        }

        let refreshed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Completion::from(ClassifiedOutcome::Aborted),
            refreshed = self.refresh.refresh(auth.access_token.as_deref()) => refreshed,
        };
        if let RefreshOutcome::Failed(reason) = refreshed {
            warn!(reason = %reason, "token refresh failed, not retrying");
            return Completion::Failed(RequestError::auth_failed());
        }

        let retry_auth = self.headers.build().await;
        let retry = request.merged_with(&retry_auth.headers);
        Completion::from(self.attempt(&retry, cancel, true).await)
    }

    /// One transport round trip: send, sync the anonymous id, classify.
    ///
    /// Cancellation before a response arrives short-circuits to `Aborted`
    /// without syncing or classifying.
    async fn attempt(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
        is_retry: bool,
    ) -> ClassifiedOutcome {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            sent = self.transport.send(request) => sent,
        };

        let response = match sent {
            Ok(response) => response,
            Err(TransportError::Aborted) => {
                debug!(is_retry, "request aborted by caller");
                return ClassifiedOutcome::Aborted;
            }
            Err(TransportError::Network(message)) => {
                debug!(is_retry, error = %message, "transport failure");
                return ClassifiedOutcome::NetworkError(message);
            }
        };

        self.anonymous.sync(&response.headers).await;

        let body = parse_body(&response.body);
        let outcome = if is_retry {
            classify_retry(response.status, &response.status_text, body)
        } else {
            classify(response.status, &response.status_text, body)
        };
        debug!(
            status = response.status,
            is_retry,
            outcome = outcome.label(),
            "response classified"
        );
        outcome
    }
}
