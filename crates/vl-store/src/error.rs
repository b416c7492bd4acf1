use thiserror::Error;
use vl_codec::CodecError;
use vl_remote::RemoteError;

/// A mutation rejected by a ledger invariant. Never changes state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "no local data; check the connection and make sure the host and {url} are reachable"
    )]
    NotLoaded { url: String },

    #[error("{field} must not be empty")]
    MissingField { field: &'static str },

    #[error("component with the same id or name already exists: {id} / {name}")]
    DuplicateComponent { id: String, name: String },

    #[error("components array must contain at least one component id")]
    EmptySetup,

    #[error("setup with the same id or name already exists: {id} / {name}")]
    DuplicateSetup { id: String, name: String },

    #[error("setup {existing} already has the same list of components")]
    DuplicateComponentSet { existing: String },

    #[error("components with the following ids do not exist: {}", .ids.join(", "))]
    UnknownComponents { ids: Vec<String> },

    #[error("component with id {id:?} does not exist")]
    UnknownComponent { id: String },

    #[error("test result must contain a non-empty status string")]
    EmptyStatus,

    #[error("test result must specify at least one component version")]
    EmptyComponentVersionMap,
}

/// Errors produced by ledger store operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// The stored document cannot be used for the rest of the session.
    #[error("stored ledger is unreadable: {0}")]
    Decode(#[from] CodecError),

    #[error("failed to load ledger data (status {status}): {message}")]
    RemoteRead { status: u16, message: String },

    #[error("failed to update ledger data (status {status}): {message}")]
    RemoteWrite { status: u16, message: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} with id {id:?} is not found")]
    NotFound { kind: &'static str, id: String },

    #[error("ledger document has not been fetched")]
    NotLoaded,

    /// The confirmation read disagrees with the hash the write reported.
    /// The stored document may not reflect the write.
    #[error(
        "CRITICAL ERROR: post-update hash check failed (written {written_sha}, found {confirmed_sha}); \
         the stored ledger may not contain this change"
    )]
    ConsistencyFault {
        written_sha: String,
        confirmed_sha: String,
    },

    /// The write was accepted but the confirmation read failed.
    #[error("write {written_sha} was accepted but could not be confirmed: {reason}")]
    Unconfirmed { written_sha: String, reason: String },

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Faults that must be surfaced with more urgency than a rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsistencyFault { .. } | Self::Decode(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<RemoteError> for LedgerError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::NotAuthenticated(reason) => Self::NotAuthenticated(reason),
            RemoteError::ReadFailed { status, message } => Self::RemoteRead { status, message },
            RemoteError::WriteFailed { status, message } => Self::RemoteWrite { status, message },
            other => Self::Remote(other),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
