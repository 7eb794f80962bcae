//! Unified error types for swcache.
//!
//! Every variant renders with a stable code prefix so tool callers can match
//! on the failure class without parsing free text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the cache controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// No cache entry found for the given request.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored data could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// The request never produced a response (offline, DNS, connection reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Pre-caching a core asset failed; nothing was written.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Lifecycle operation attempted in the wrong worker state.
    #[error("INVALID_STATE: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl Error {
    /// Whether this error is a per-request network failure.
    ///
    /// These are the failures the fetch strategies recover from by falling
    /// back to cached content.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::InstallFailed { .. } => (-32009, err.to_string()),
            Error::InvalidState { .. } => (-32010, err.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("GET https://example.com/".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("https://example.com/"));
    }

    #[test]
    fn test_install_failed_display() {
        let err = Error::InstallFailed { url: "/500.html".into(), reason: "status 404".into() };
        assert_eq!(err.to_string(), "INSTALL_FAILED: /500.html: status 404");
    }

    #[test]
    fn test_is_network() {
        assert!(Error::Network("offline".into()).is_network());
        assert!(Error::FetchTimeout("20s".into()).is_network());
        assert!(!Error::CacheMiss("x".into()).is_network());
        assert!(!Error::InvalidUrl("ftp://x".into()).is_network());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("abc123".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let err = Error::InstallFailed { url: "/".into(), reason: "offline".into() };
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32009);
        assert!(mcp_err.message.contains("INSTALL_FAILED"));
    }
}
