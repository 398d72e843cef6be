use std::fmt;

use tally_config::ConfigError;
use tally_reconcile::RecordError;
use tally_source::FetchError;

/// Errors that abort a pass. Storage read and write failures are not here:
/// reads fall back to an empty snapshot and writes only clear the summary's
/// success flag.
#[derive(Debug)]
pub enum PassError {
    /// Raised before any IO.
    Config(ConfigError),
    /// Nothing was merged or persisted.
    Fetch(FetchError),
    /// A fetched or stored record has no usable identity.
    Record(RecordError),
    /// A pass or storage task panicked or was cancelled.
    Task(String),
}

impl PassError {
    /// HTTP-style status class: 400 for client faults, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            PassError::Config(_) => 400,
            PassError::Fetch(_) | PassError::Record(_) | PassError::Task(_) => 500,
        }
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Config(e) => write!(f, "configuration error: {e}"),
            PassError::Fetch(e) => write!(f, "fetch failed: {e}"),
            PassError::Record(e) => write!(f, "data format error: {e}"),
            PassError::Task(msg) => write!(f, "pass task failed: {msg}"),
        }
    }
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PassError::Config(e) => Some(e),
            PassError::Fetch(e) => Some(e),
            PassError::Record(e) => Some(e),
            PassError::Task(_) => None,
        }
    }
}

impl From<ConfigError> for PassError {
    fn from(e: ConfigError) -> Self {
        PassError::Config(e)
    }
}

impl From<FetchError> for PassError {
    fn from(e: FetchError) -> Self {
        PassError::Fetch(e)
    }
}

impl From<RecordError> for PassError {
    fn from(e: RecordError) -> Self {
        PassError::Record(e)
    }
}
