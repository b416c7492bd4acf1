use vl_types::{LedgerDocument, CURRENT_SCHEMA_VERSION};

use crate::error::{CodecError, CodecResult};

/// Reject documents stamped with a schema newer than this release.
///
/// Unversioned documents predate the field and are read as version 1.
pub fn check_compatibility(document: &LedgerDocument) -> CodecResult<()> {
    match document.schema_version {
        Some(found) if found > CURRENT_SCHEMA_VERSION => Err(CodecError::UnsupportedSchema {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unversioned_is_accepted() {
        check_compatibility(&LedgerDocument::default()).unwrap();
    }

    #[test]
    fn current_is_accepted() {
        check_compatibility(&LedgerDocument::empty()).unwrap();
    }

    #[test]
    fn newer_is_rejected() {
        let doc = LedgerDocument {
            schema_version: Some(CURRENT_SCHEMA_VERSION + 1),
            ..Default::default()
        };
        let err = check_compatibility(&doc).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedSchema { found, supported }
                if found == CURRENT_SCHEMA_VERSION + 1 && supported == CURRENT_SCHEMA_VERSION
        ));
    }
}
