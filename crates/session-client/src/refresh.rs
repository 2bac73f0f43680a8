//! Single-flight token refresh
//!
//! Any number of requests can hit an expired token at the same moment; only
//! one refresh call may go out. The coordinator is a two-state machine:
//!
//! - `Idle` → `Refreshing`: first caller spawns the refresh task
//! - `Refreshing`: later callers attach to the same shared result
//! - `Refreshing` → `Idle`: the task resets the state when it finishes,
//!   success or failure, so the next expiry starts a fresh attempt
//!
//! The refresh runs as its own task. A waiter that is cancelled only drops
//! its own continuation; the refresh keeps going for everyone else.
//!
//! On failure the credentials are cleared and `notify_logout` fires once,
//! from the refresh task itself, never from the individual waiters.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use session_auth::{CredentialStore, Credentials, TokenRefresher, now_millis};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::record_refresh;
use crate::notify::SessionNotifier;

/// Result shared by every waiter of one refresh episode.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Retry with these credentials (already written to the store)
    Refreshed(Credentials),
    Failed(String),
}

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Refreshing(PendingRefresh),
}

pub struct TokenRefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<RefreshState>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    notifier: Arc<dyn SessionNotifier>,
}

impl TokenRefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RefreshState::Idle),
                store,
                refresher,
                notifier,
            }),
        }
    }

    /// Refresh the access token, or join the refresh already in flight.
    ///
    /// `stale_access_token` is the token the failing request was sent with.
    /// If the store already holds a different one, an earlier refresh has
    /// superseded it and that token is returned without a network call.
    pub async fn refresh(&self, stale_access_token: Option<&str>) -> RefreshOutcome {
        let pending = {
            let mut state = self.inner.state.lock().await;
            match &*state {
                RefreshState::Refreshing(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                RefreshState::Idle => {
                    if let Some(stale) = stale_access_token
                        && let Some(current) = self.inner.store.credentials().await
                        && current.access_token != stale
                    {
                        debug!("access token already replaced, skipping refresh");
                        return RefreshOutcome::Refreshed(current);
                    }
                    let pending = self.start();
                    *state = RefreshState::Refreshing(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Whether a refresh is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, RefreshState::Refreshing(_))
    }

    /// Spawn the refresh task and wrap its handle in a shareable future.
    ///
    /// Called with the state lock held; the task's own reset to `Idle` waits
    /// on that lock, so it always lands after `Refreshing` was stored.
    fn start(&self) -> PendingRefresh {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = inner.run().await;
            *inner.state.lock().await = RefreshState::Idle;
            outcome
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "token refresh task did not complete");
                    *inner.state.lock().await = RefreshState::Idle;
                    RefreshOutcome::Failed(format!("refresh task failed: {e}"))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn run(&self) -> RefreshOutcome {
        let Some(credentials) = self.store.credentials().await else {
            // Already signed out: nothing to invalidate, no logout to announce.
            debug!("no credentials to refresh");
            record_refresh("skipped");
            return RefreshOutcome::Failed("not signed in".into());
        };

        let Some(refresh_token) = credentials
            .usable_refresh_token(now_millis())
            .map(str::to_owned)
        else {
            return self.fail("refresh token missing or expired".into()).await;
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(fresh) => {
                if let Err(e) = self.store.set_credentials(fresh.clone()).await {
                    warn!(error = %e, "failed to persist refreshed credentials");
                }
                info!("token refresh succeeded");
                record_refresh("success");
                RefreshOutcome::Refreshed(fresh)
            }
            Err(e) => self.fail(e.to_string()).await,
        }
    }

    async fn fail(&self, reason: String) -> RefreshOutcome {
        warn!(reason = %reason, "token refresh failed, signing out");
        if let Err(e) = self.store.clear_credentials().await {
            warn!(error = %e, "failed to clear credentials after refresh failure");
        }
        self.notifier.notify_logout();
        record_refresh("failure");
        RefreshOutcome::Failed(reason)
    }
}
