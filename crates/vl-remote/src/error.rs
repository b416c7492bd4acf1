use thiserror::Error;

/// Errors from the remote seam.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("failed to load ledger data (status {status}): {message}")]
    ReadFailed { status: u16, message: String },

    #[error("failed to update ledger data (status {status}): {message}")]
    WriteFailed { status: u16, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;
