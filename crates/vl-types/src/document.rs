use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on documents written by this release.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Mapping from component id to the version tag exercised by a test.
pub type ComponentVersionMap = BTreeMap<String, String>;

/// A named, independently versioned unit tracked by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A released tag of a component.
///
/// `date` is assigned when the version is recorded and is persisted as epoch
/// milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub component_id: String,
    pub tag: String,
}

/// A named, fixed collection of components exercised together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub id: String,
    pub name: String,
    /// Kept sorted ascending by the store.
    pub component_ids: Vec<String>,
}

impl Setup {
    /// The order-independent identity of this setup's component list.
    pub fn component_set(&self) -> BTreeSet<&str> {
        self.component_ids.iter().map(String::as_str).collect()
    }

    pub fn includes(&self, component_id: &str) -> bool {
        self.component_ids.iter().any(|id| id == component_id)
    }
}

/// An outcome recorded against a setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub setup_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub component_version_map: ComponentVersionMap,
}

/// The single persisted aggregate.
///
/// Documents written before schema versioning have no `schemaVersion`
/// field; they decode with `schema_version == None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub components: Vec<Component>,
    pub versions: Vec<Version>,
    pub setups: Vec<Setup>,
    pub tests: Vec<TestResult>,
}

impl LedgerDocument {
    /// An empty ledger stamped with the current schema version.
    pub fn empty() -> Self {
        Self {
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            ..Default::default()
        }
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn has_component(&self, id: &str) -> bool {
        self.component(id).is_some()
    }

    pub fn setup(&self, id: &str) -> Option<&Setup> {
        self.setups.iter().find(|s| s.id == id)
    }

    /// First recorded version matching `(component_id, tag)`.
    pub fn find_version(&self, component_id: &str, tag: &str) -> Option<&Version> {
        self.versions
            .iter()
            .find(|v| v.component_id == component_id && v.tag == tag)
    }

    /// Versions of one component in append order.
    pub fn component_versions<'a, 'b>(
        &'a self,
        component_id: &'b str,
    ) -> impl Iterator<Item = &'a Version> + 'b
    where
        'a: 'b,
    {
        self.versions
            .iter()
            .filter(move |v| v.component_id == component_id)
    }
}
