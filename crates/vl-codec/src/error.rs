use thiserror::Error;

/// Errors produced while decoding or encoding a ledger document.
///
/// Every decode variant means the stored document cannot be used for the
/// rest of the session.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("stored document is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("stored document is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("stored document is not a valid ledger: {0}")]
    InvalidJson(String),

    #[error("stored document uses schema version {found}, newest supported is {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
