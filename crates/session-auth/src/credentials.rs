//! Session credential storage
//!
//! `CredentialStore` is the contract every request reads credentials and the
//! anonymous-user id through. Two implementations ship here: an in-memory
//! store for embedding and tests, and a JSON file store that persists the
//! session across process runs. File writes use atomic temp-file + rename so
//! a crash never leaves a half-written session behind.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Short-lived credentials for the signed-in user.
///
/// Expiry fields are unix timestamps in milliseconds (absolute, not deltas).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<u64>,
}

impl Credentials {
    /// Credentials holding only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            access_token_expires_at: None,
            refresh_token_expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// The refresh token, if present and not past its expiry at `now_millis`.
    pub fn usable_refresh_token(&self, now_millis: u64) -> Option<&str> {
        let token = self.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        match self.refresh_token_expires_at {
            Some(expires) if expires <= now_millis => None,
            _ => Some(token),
        }
    }

    /// Whether the access token is known to be expired at `now_millis`.
    /// Credentials without an expiry are never considered expired.
    pub fn access_token_expired(&self, now_millis: u64) -> bool {
        self.access_token_expires_at
            .is_some_and(|expires| expires <= now_millis)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .finish()
    }
}

/// Everything the client persists about its session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub anonymous_id: Option<String>,
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Storage for the session's credentials and anonymous-user id.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`). Reads return owned snapshots, so a request
/// keeps the credentials it started with even if a refresh lands mid-flight.
pub trait CredentialStore: Send + Sync {
    /// Credentials and anonymous id read under one lock.
    fn snapshot(&self) -> Pin<Box<dyn Future<Output = SessionState> + Send + '_>>;

    fn credentials(&self) -> Pin<Box<dyn Future<Output = Option<Credentials>> + Send + '_>>;

    fn set_credentials(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn anonymous_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    fn set_anonymous_id(&self, id: String)
    -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Drop the credentials (logout). The anonymous id is kept.
    fn clear_credentials(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<SessionState>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SessionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self::with_state(SessionState {
            credentials: Some(credentials),
            anonymous_id: None,
        })
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn snapshot(&self) -> Pin<Box<dyn Future<Output = SessionState> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn credentials(&self) -> Pin<Box<dyn Future<Output = Option<Credentials>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.credentials.clone() })
    }

    fn set_credentials(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.credentials = Some(credentials);
            Ok(())
        })
    }

    fn anonymous_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.anonymous_id.clone() })
    }

    fn set_anonymous_id(
        &self,
        id: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.anonymous_id = Some(id);
            Ok(())
        })
    }

    fn clear_credentials(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.credentials = None;
            Ok(())
        })
    }
}

/// Session store backed by a JSON file.
///
/// The Mutex serializes all writes. Reads acquire the lock briefly to clone
/// the in-memory state, so request-time reads don't wait on disk I/O.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<SessionState>,
}

impl FileCredentialStore {
    /// Load the session from the given file path.
    ///
    /// If the file doesn't exist, starts signed out with no anonymous id and
    /// writes an empty session so later loads skip the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let state: SessionState = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(
                path = %path.display(),
                signed_in = state.credentials.is_some(),
                "loaded session"
            );
            state
        } else {
            info!(path = %path.display(), "session file not found, starting signed out");
            let state = SessionState::default();
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a change to the in-memory state and persist it.
    async fn update(&self, change: impl FnOnce(&mut SessionState)) -> Result<()> {
        let mut state = self.state.lock().await;
        change(&mut state);
        write_atomic(&self.path, &state).await
    }
}

impl CredentialStore for FileCredentialStore {
    fn snapshot(&self) -> Pin<Box<dyn Future<Output = SessionState> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn credentials(&self) -> Pin<Box<dyn Future<Output = Option<Credentials>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.credentials.clone() })
    }

    fn set_credentials(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.update(|state| state.credentials = Some(credentials))
                .await?;
            debug!("stored credentials");
            Ok(())
        })
    }

    fn anonymous_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.anonymous_id.clone() })
    }

    fn set_anonymous_id(
        &self,
        id: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.update(|state| state.anonymous_id = Some(id)).await })
    }

    fn clear_credentials(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.update(|state| state.credentials = None).await?;
            debug!("cleared credentials");
            Ok(())
        })
    }
}

/// Write the session to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains bearer tokens.
async fn write_atomic(path: &Path, state: &SessionState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
