//! Foundation types for the Version Ledger (VL).
//!
//! The ledger is a single JSON document holding four collections. This crate
//! defines their shapes and the ordering rules queries rely on. Every other
//! VL crate depends on `vl-types`.
//!
//! # Key Types
//!
//! - [`LedgerDocument`]: The persisted aggregate
//! - [`Component`]: A named, independently versioned unit
//! - [`Version`]: A released tag of a component
//! - [`Setup`]: A fixed collection of components tested together
//! - [`TestResult`]: An outcome recorded against a setup
//! - [`TagOrder`]: Semantic-version ordering for free-form tags

pub mod document;
pub mod tag;

pub use document::{
    Component, ComponentVersionMap, LedgerDocument, Setup, TestResult, Version,
    CURRENT_SCHEMA_VERSION,
};
pub use tag::{compare_tags, TagOrder};
