use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use vl_types::LedgerDocument;

use crate::error::{CodecError, CodecResult};
use crate::schema::check_compatibility;

/// Codec between a [`LedgerDocument`] and its base64 file content.
pub struct DocumentCodec;

impl DocumentCodec {
    /// Decode file content as returned by the hosting API.
    ///
    /// The API wraps base64 content at 60 columns, so ASCII whitespace is
    /// dropped before decoding.
    pub fn decode(content: &str) -> CodecResult<LedgerDocument> {
        let compact: String = content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;
        let text = String::from_utf8(bytes)?;
        let document: LedgerDocument =
            serde_json::from_str(&text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
        check_compatibility(&document)?;
        tracing::debug!(
            components = document.components.len(),
            versions = document.versions.len(),
            setups = document.setups.len(),
            tests = document.tests.len(),
            "decoded ledger document"
        );
        Ok(document)
    }

    /// Encode a document as unwrapped base64 file content.
    pub fn encode(document: &LedgerDocument) -> CodecResult<String> {
        let json =
            serde_json::to_vec(document).map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }
}
