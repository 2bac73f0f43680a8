//! Session credentials for the backend client
//!
//! Holds the credential model shared by every backend call, the storage
//! contract it is persisted through, and the token refresh operation. This
//! crate knows nothing about request execution, so it can be tested and used
//! independently of the protocol crate.
//!
//! Credential flow:
//! 1. `login` writes `Credentials` via `CredentialStore::set_credentials()`
//! 2. Requests read a snapshot via `CredentialStore::credentials()`
//! 3. On expiry the refresh coordinator calls `TokenRefresher::refresh()`
//! 4. New tokens are written back, or cleared on refresh failure (logout)

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore, SessionState,
    now_millis,
};
pub use error::{Error, Result};
pub use token::{HttpTokenRefresher, TokenRefresher, TokenResponse, refresh_token};
