//! UI notification seam
//!
//! The protocol decides *when* the user must be prompted; the host decides
//! *how*. Notifications are fire-and-forget.

pub trait SessionNotifier: Send + Sync {
    fn notify_login_required(&self);

    fn notify_subscription_required(&self);

    /// The session was invalidated after a failed token refresh.
    fn notify_logout(&self);
}

/// Notifier that only logs, for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl SessionNotifier for LogNotifier {
    fn notify_login_required(&self) {
        tracing::info!("login required");
    }

    fn notify_subscription_required(&self) {
        tracing::info!("subscription required");
    }

    fn notify_logout(&self) {
        tracing::info!("session invalidated, signed out");
    }
}
