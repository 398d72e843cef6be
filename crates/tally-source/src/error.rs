//! Errors a [`crate::RecordFetcher`] may return.
//!
//! Every variant is fatal for the current pass: callers must not merge
//! against a partial fetch. Variants stay distinct so the caller can log
//! and report a timeout differently from a bad status or a bad payload.

use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum FetchError {
    /// The request did not complete within the per-request timeout.
    Timeout { url: String, after: Duration },
    /// Network or transport failure (DNS, connect, TLS, reset).
    Transport(String),
    /// The upstream API answered with a non-success HTTP status.
    Status { code: u16, url: String },
    /// The response body was not the expected JSON shape.
    Decode(String),
    /// The HTTP client could not be initialised. A local fault, not a
    /// settings problem.
    ClientInit(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout { url, after } => {
                write!(f, "timeout after {}s requesting {url}", after.as_secs())
            }
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Status { code, url } => {
                write!(f, "http status {code} from {url}; check credentials and API url")
            }
            FetchError::Decode(msg) => write!(f, "decode error: {msg}"),
            FetchError::ClientInit(msg) => write!(f, "http client init failed: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let err = FetchError::Timeout {
            url: "http://x/v2/time_entries".to_string(),
            after: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "timeout after 30s requesting http://x/v2/time_entries"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn display_status() {
        let err = FetchError::Status {
            code: 401,
            url: "http://x".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "http status 401 from http://x; check credentials and API url"
        );
        assert!(!err.is_timeout());
    }

    #[test]
    fn display_client_init() {
        let err = FetchError::ClientInit("tls backend unavailable".to_string());
        assert_eq!(err.to_string(), "http client init failed: tls backend unavailable");
        assert!(!err.is_timeout());
    }

    #[test]
    fn display_transport_and_decode() {
        assert_eq!(
            FetchError::Transport("connection refused".to_string()).to_string(),
            "transport error: connection refused"
        );
        assert_eq!(
            FetchError::Decode("expected value".to_string()).to_string(),
            "decode error: expected value"
        );
    }
}
