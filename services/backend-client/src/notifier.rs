//! Terminal rendition of the session prompts

use session_client::SessionNotifier;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Prints sign-in and subscription prompts to stderr.
///
/// Remembers whether a prompt was shown so `main` can pick the exit code.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    prompted: AtomicBool,
}

impl ConsoleNotifier {
    pub fn prompted(&self) -> bool {
        self.prompted.load(Ordering::SeqCst)
    }
}

impl SessionNotifier for ConsoleNotifier {
    fn notify_login_required(&self) {
        self.prompted.store(true, Ordering::SeqCst);
        eprintln!("Sign in required. Run `backend-client login` and try again.");
    }

    fn notify_subscription_required(&self) {
        self.prompted.store(true, Ordering::SeqCst);
        eprintln!("This feature needs an active subscription.");
    }

    fn notify_logout(&self) {
        info!("session expired, credentials cleared");
        eprintln!("Your session has expired and you have been signed out.");
    }
}
