//! Authenticated request protocol for the backend client
//!
//! `RequestExecutor` runs every backend call through the same protocol:
//! attach auth headers, send, adopt the anonymous id the server echoes back,
//! classify the response, and on an expired token refresh once (shared by
//! all concurrent callers) and retry once.
//!
//! Outcomes reach the caller either as handler callbacks (`execute`) or as a
//! `Result` (`send`). Login and subscription prompts also go to the host's
//! `SessionNotifier`.

pub mod anonymous;
pub mod classify;
pub mod error;
pub mod executor;
pub mod headers;
pub mod metrics;
pub mod notify;
pub mod refresh;
pub mod request;

#[cfg(test)]
mod test_support;

pub use anonymous::AnonymousIdSynchronizer;
pub use classify::{ClassifiedOutcome, classify, classify_retry, extract_error, markers, parse_body};
pub use error::{CallError, RequestError, codes};
pub use executor::{Completion, Handlers, REQUEST_ID_HEADER, RequestExecutor};
pub use headers::{AuthHeaderBuilder, AuthHeaders};
pub use notify::{LogNotifier, SessionNotifier};
pub use refresh::{RefreshOutcome, TokenRefreshCoordinator};
pub use request::{
    ReqwestTransport, RequestDescriptor, Transport, TransportError, TransportResponse,
};
