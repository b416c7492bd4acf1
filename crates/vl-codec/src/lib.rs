//! Wire codec for the Version Ledger.
//!
//! The hosting API stores the ledger as a file whose content travels as
//! base64. This crate turns that blob into a [`vl_types::LedgerDocument`]
//! and back, and rejects documents written by a newer schema.

pub mod codec;
pub mod error;
pub mod schema;

pub use codec::DocumentCodec;
pub use error::{CodecError, CodecResult};
pub use schema::check_compatibility;
