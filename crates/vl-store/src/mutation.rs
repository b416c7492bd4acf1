use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use vl_types::{
    Component, ComponentVersionMap, LedgerDocument, Setup, TestResult, Version,
    CURRENT_SCHEMA_VERSION,
};

use crate::error::ValidationError;
use crate::warning::LedgerWarning;

/// The document collection a mutation appends to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Components,
    Versions,
    Setups,
    Tests,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Components => "components",
            Self::Versions => "versions",
            Self::Setups => "setups",
            Self::Tests => "tests",
        }
    }

    /// Commit message recorded by the host for a write to this collection.
    pub fn commit_message(&self) -> String {
        format!("new {}", self.as_str())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSetup {
    pub id: String,
    pub name: String,
    pub component_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub component_id: String,
    pub tag: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTest {
    pub setup_id: String,
    pub status: String,
    pub description: Option<String>,
    pub component_version_map: ComponentVersionMap,
}

/// One additive change to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    AddComponent(NewComponent),
    AddSetup(NewSetup),
    AddVersion(NewVersion),
    AddTest(NewTest),
}

/// The validated outcome of a mutation against a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub collection: Collection,
    /// The snapshot with the new entity appended.
    pub document: LedgerDocument,
    pub warnings: Vec<LedgerWarning>,
}

impl Mutation {
    pub fn collection(&self) -> Collection {
        match self {
            Self::AddComponent(_) => Collection::Components,
            Self::AddSetup(_) => Collection::Setups,
            Self::AddVersion(_) => Collection::Versions,
            Self::AddTest(_) => Collection::Tests,
        }
    }

    /// Validate against `current` and build the next document.
    ///
    /// `current` is never modified. `now` stamps versions and tests, cut to
    /// the whole milliseconds the document format stores.
    pub fn plan(&self, current: &LedgerDocument, now: DateTime<Utc>) -> Result<Plan, ValidationError> {
        let now = now.trunc_subsecs(3);
        let mut document = current.clone();
        let mut warnings = Vec::new();

        match self {
            Self::AddComponent(new) => {
                require("id", &new.id)?;
                require("name", &new.name)?;
                if current
                    .components
                    .iter()
                    .any(|c| c.id == new.id || c.name == new.name)
                {
                    return Err(ValidationError::DuplicateComponent {
                        id: new.id.clone(),
                        name: new.name.clone(),
                    });
                }
                document.components.push(Component::new(&new.id, &new.name));
            }
            Self::AddSetup(new) => {
                document.setups.push(plan_setup(current, new)?);
            }
            Self::AddVersion(new) => {
                require("tag", &new.tag)?;
                if !current.has_component(&new.component_id) {
                    return Err(ValidationError::UnknownComponent {
                        id: new.component_id.clone(),
                    });
                }
                if let Some(existing) = current.find_version(&new.component_id, &new.tag) {
                    warnings.push(LedgerWarning::DuplicateVersion {
                        component_id: new.component_id.clone(),
                        tag: new.tag.clone(),
                        created_at: existing.date,
                    });
                }
                document.versions.push(Version {
                    date: now,
                    component_id: new.component_id.clone(),
                    tag: new.tag.clone(),
                });
            }
            Self::AddTest(new) => {
                if new.status.trim().is_empty() {
                    return Err(ValidationError::EmptyStatus);
                }
                if new.component_version_map.is_empty() {
                    return Err(ValidationError::EmptyComponentVersionMap);
                }
                if current.setup(&new.setup_id).is_none() {
                    warnings.push(LedgerWarning::UnknownSetup {
                        setup_id: new.setup_id.clone(),
                    });
                }
                let unknown: Vec<(String, String)> = new
                    .component_version_map
                    .iter()
                    .filter(|(component, tag)| current.find_version(component, tag).is_none())
                    .map(|(component, tag)| (component.clone(), tag.clone()))
                    .collect();
                if !unknown.is_empty() {
                    warnings.push(LedgerWarning::UnknownVersions { pairs: unknown });
                }
                document.tests.push(TestResult {
                    date: now,
                    setup_id: new.setup_id.clone(),
                    status: new.status.clone(),
                    description: new.description.clone().filter(|d| !d.trim().is_empty()),
                    component_version_map: new.component_version_map.clone(),
                });
            }
        }

        document.schema_version = Some(CURRENT_SCHEMA_VERSION);
        Ok(Plan {
            collection: self.collection(),
            document,
            warnings,
        })
    }
}

fn plan_setup(current: &LedgerDocument, new: &NewSetup) -> Result<Setup, ValidationError> {
    if new.component_ids.is_empty() {
        return Err(ValidationError::EmptySetup);
    }
    require("id", &new.id)?;
    require("name", &new.name)?;
    if current
        .setups
        .iter()
        .any(|s| s.id == new.id || s.name == new.name)
    {
        return Err(ValidationError::DuplicateSetup {
            id: new.id.clone(),
            name: new.name.clone(),
        });
    }

    let wanted: BTreeSet<&str> = new.component_ids.iter().map(String::as_str).collect();
    if let Some(existing) = current.setups.iter().find(|s| s.component_set() == wanted) {
        return Err(ValidationError::DuplicateComponentSet {
            existing: existing.id.clone(),
        });
    }

    let missing: Vec<String> = wanted
        .iter()
        .filter(|id| !current.has_component(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::UnknownComponents { ids: missing });
    }

    Ok(Setup {
        id: new.id.clone(),
        name: new.name.clone(),
        // BTreeSet iteration is ascending and duplicate-free.
        component_ids: wanted.into_iter().map(str::to_string).collect(),
    })
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { field })
    } else {
        Ok(())
    }
}
