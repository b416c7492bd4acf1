use std::fmt;

use chrono::{DateTime, Utc};

/// A soft inconsistency. The operation still went ahead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerWarning {
    /// The `(component, tag)` pair was already recorded; the new entry takes
    /// display priority.
    DuplicateVersion {
        component_id: String,
        tag: String,
        created_at: DateTime<Utc>,
    },
    /// A test names a setup that does not exist. It stays visible only in
    /// raw test listings.
    UnknownSetup { setup_id: String },
    /// A test references versions that were never recorded.
    UnknownVersions { pairs: Vec<(String, String)> },
    /// A setup's component list resolved to nothing.
    EmptySetup { setup_id: String },
}

impl fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateVersion {
                component_id,
                tag,
                created_at,
            } => write!(
                f,
                "version {component_id}:{tag} already exists; it was created at {}. \
                 The duplicate is added and takes priority over the previous one",
                created_at.format("%d/%m/%y %H:%M:%S")
            ),
            Self::UnknownSetup { setup_id } => write!(
                f,
                "setup with id {setup_id} doesn't exist; the test result is saved but only \
                 appears in raw test listings. Make sure to add {setup_id} to the setups list"
            ),
            Self::UnknownVersions { pairs } => {
                let listed: Vec<String> = pairs.iter().map(|(c, t)| format!("{c}:{t}")).collect();
                write!(
                    f,
                    "{} do not exist; the test result is saved, but make sure to add these versions",
                    listed.join(", ")
                )
            }
            Self::EmptySetup { setup_id } => {
                write!(f, "setup {setup_id} appears to have no components")
            }
        }
    }
}

/// A value together with the warnings raised while producing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warned<T> {
    pub value: T,
    pub warnings: Vec<LedgerWarning>,
}

impl<T> Warned<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn new(value: T, warnings: Vec<LedgerWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Warned<U> {
        Warned {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duplicate_version_names_creation_time() {
        let w = LedgerWarning::DuplicateVersion {
            component_id: "fw".into(),
            tag: "1.0.0".into(),
            created_at: Utc.with_ymd_and_hms(2021, 3, 4, 17, 5, 9).unwrap(),
        };
        let text = w.to_string();
        assert!(text.contains("fw:1.0.0"));
        assert!(text.contains("04/03/21 17:05:09"));
    }

    #[test]
    fn unknown_versions_lists_every_pair() {
        let w = LedgerWarning::UnknownVersions {
            pairs: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
        };
        assert!(w.to_string().starts_with("a:1, b:2 do not exist"));
    }

    #[test]
    fn warned_map_keeps_warnings() {
        let w = Warned::new(2, vec![LedgerWarning::EmptySetup { setup_id: "s".into() }]);
        let mapped = w.map(|n| n * 10);
        assert_eq!(mapped.value, 20);
        assert!(mapped.has_warnings());
        assert!(!Warned::clean(()).has_warnings());
    }
}
