//! Wire-level names shared by the session crates

/// Header carrying the anonymous-user id, in both directions
pub const ANONYMOUS_ID_HEADER: &str = "x-anonymous-user-id";

/// Path of the refresh endpoint, relative to the backend base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Default file name for the persisted session state
pub const DEFAULT_SESSION_FILE: &str = "session.json";
