//! Ledger store for the Version Ledger (VL).
//!
//! This crate is the heart of VL. It provides:
//! - [`LedgerStore`], owning the fetched document and its persistence hash
//! - Validated additive mutations (components, setups, versions, tests)
//! - The guarded write protocol: precondition write, confirmation read,
//!   and a loud [`LedgerError::ConsistencyFault`] on hash divergence
//! - Derived queries (latest versions, setup membership, filtering)

pub mod clock;
pub mod error;
pub mod mutation;
pub mod query;
pub mod store;
pub mod warning;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use mutation::{Collection, Mutation, NewComponent, NewSetup, NewTest, NewVersion, Plan};
pub use query::TestFilter;
pub use store::{Commit, LedgerStore, Snapshot};
pub use warning::{LedgerWarning, Warned};
