use std::fmt;
use std::io;

/// Whether retrying the same operation later could succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Fatal => f.write_str("fatal"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StoreFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }

    /// Classify an IO error. Permission and path problems will not fix
    /// themselves; everything else is worth another try.
    pub fn from_io(err: &io::Error, what: impl fmt::Display) -> Self {
        let message = format!("{what}: {err}");
        match err.kind() {
            io::ErrorKind::PermissionDenied
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::Unsupported => Self::fatal(message),
            _ => Self::transient(message),
        }
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} store failure: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreFailure {}

/// Tagged result of a whole-object read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Found(Vec<u8>),
    /// The key has never been written. Not an error.
    NotFound,
    Failed(StoreFailure),
}
